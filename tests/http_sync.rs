//! End-to-end sync against a mock Kavita server over real HTTP.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::Duration;

use kavita_sync::kavita::HttpRequest;
use kavita_sync::snapshot::load_snapshot;
use kavita_sync::sync::run_sync;
use kavita_sync::{Config, KavitaClient, ReqwestTransport, SyncError, Transport};
use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "api-key";

// The mock server runs on its own thread; this runtime only drives setup.
fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(Duration::from_secs(5)).unwrap()
}

fn mount(rt: &Runtime, server: &MockServer, mock: Mock) {
    rt.block_on(mock.mount(server));
}

fn mount_login(rt: &Runtime, server: &MockServer) {
    mount(
        rt,
        server,
        Mock::given(method("POST"))
            .and(path("/api/Account/login"))
            .and(body_json(json!({ "apiKey": KEY })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "jwt" }))),
    );
}

fn feed(ids: &[&str]) -> String {
    let entries: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<entry><id>{id}</id><title>Book {id}</title><dcterms:format>Epub</dcterms:format>
<link rel="http://opds-spec.org/acquisition" type="application/epub+zip" href="/api/opds/{KEY}/download/{id}"/></entry>"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><feed xmlns="http://www.w3.org/2005/Atom" xmlns:dcterms="http://purl.org/dc/terms/">{entries}</feed>"#
    )
}

fn config(base_url: &str) -> Config {
    Config::parse(&format!(
        r#"
[server]
base_url = "{base_url}"
api_key = "{KEY}"

[[queries]]
name = "Fantasy"
join_type = "And"

[[queries.filters]]
field = "Genres"
comparison = "Equal"
value = "Fantasy"
"#
    ))
    .unwrap()
}

#[test]
fn test_login_sends_api_key_and_reads_token() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    mount_login(&rt, &server);

    let client = KavitaClient::login(transport(), &server.uri(), KEY).unwrap();
    assert_eq!(client.base_url(), server.uri());
}

#[test]
fn test_login_rejected_by_server() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    mount(
        &rt,
        &server,
        Mock::given(method("POST"))
            .and(path("/api/Account/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key")),
    );

    let err = KavitaClient::login(transport(), &server.uri(), KEY).unwrap_err();
    assert!(matches!(err, SyncError::Auth(_)));
    assert!(err.to_string().contains("401"), "{err}");
}

#[test]
fn test_sync_over_http() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    mount_login(&rt, &server);
    mount(
        &rt,
        &server,
        Mock::given(method("POST"))
            .and(path("/api/Series/v2"))
            .and(header("Authorization", "Bearer jwt"))
            .and(body_json(json!({
                "name": "Fantasy",
                "combination": 1,
                "statements": [{ "field": 18, "comparison": 0, "value": "Fantasy" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 5 }]))),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path(format!("/api/opds/{KEY}/series/5")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(feed(&["10", "11"]), "application/atom+xml"),
            ),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path(format!("/api/opds/{KEY}/download/10")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04epub".to_vec())),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path(format!("/api/opds/{KEY}/download/11")))
            .respond_with(ResponseTemplate::new(500)),
    );

    let dir = tempfile::tempdir().unwrap();
    let report = run_sync(&config(&server.uri()), transport(), dir.path()).unwrap();

    assert_eq!(report.downloaded, vec!["10"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].subject, "11");
    assert!(matches!(
        report.failures[0].error,
        SyncError::Status { status: 500, .. }
    ));
    assert_eq!(
        std::fs::read(dir.path().join("10.epub")).unwrap(),
        b"PK\x03\x04epub"
    );

    let snapshot = load_snapshot(dir.path()).unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].shelves, vec!["Fantasy"]);
    assert_eq!(
        snapshot[0].url,
        format!("{}/api/opds/{KEY}/download/10", server.uri())
    );
}

/// Serves `body` one byte at a time with `pause` between bytes.
fn trickle_server(body: &'static [u8], pause: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }

        write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .unwrap();
        stream.flush().unwrap();
        for byte in body {
            std::thread::sleep(pause);
            stream.write_all(&[*byte]).unwrap();
            stream.flush().unwrap();
        }
    });

    format!("http://{addr}/book")
}

#[test]
fn test_slow_download_outlasting_timeout_completes() {
    let url = trickle_server(b"PK\x03\x04ep", Duration::from_millis(300));
    let transport = ReqwestTransport::new(Duration::from_secs(1)).unwrap();

    let mut sink = Vec::new();
    let written = transport.send_to(&HttpRequest::get(url), &mut sink).unwrap();

    assert_eq!(written, 6);
    assert_eq!(sink, b"PK\x03\x04ep");
}
