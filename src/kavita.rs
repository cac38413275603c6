//! Kavita API client.

mod transport;

pub use transport::{
    DEFAULT_USER_AGENT, HttpRequest, HttpResponse, Method, ReqwestTransport, Transport,
};

use crate::catalog::{Series, SeriesDto, SeriesMap, merge_series};
use crate::error::{Harvest, Result, SyncError};
use crate::library::{Book, BookMap, merge_book};
use crate::opds;
use crate::query::Query;
use crate::snapshot::Downloader;
use serde::Deserialize;
use std::io::Write;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// An authenticated session against one Kavita server.
#[derive(Debug)]
pub struct KavitaClient<T> {
    transport: T,
    base_url: String,
    api_key: String,
    token: String,
}

impl<T: Transport> KavitaClient<T> {
    /// Exchange the API key for a bearer token.
    pub fn login(transport: T, base_url: &str, api_key: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let url = format!("{}/api/Account/login", base_url);
        let request = HttpRequest::post_json(&url, serde_json::json!({ "apiKey": api_key }));

        let body = transport
            .send(&request)?
            .into_success(&url)
            .map_err(|e| SyncError::Auth(e.to_string()))?;
        let login: LoginResponse = serde_json::from_slice(&body)
            .map_err(|e| SyncError::Auth(format!("Unreadable login response: {}", e)))?;
        let token = login
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::Auth("Login response carries no token".to_string()))?;

        tracing::info!(server = %base_url, "Logged in");

        Ok(Self {
            transport,
            base_url,
            api_key: api_key.to_string(),
            token,
        })
    }

    /// Server base URL, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `url` with the session token and return the body of a 2xx response.
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.transport
            .send(&HttpRequest::get(url).bearer(&self.token))?
            .into_success(url)
    }

    /// Run one query and tag every returned series with its name.
    pub fn run_query(&self, query: &Query) -> Result<Vec<Series>> {
        let url = format!("{}/api/Series/v2", self.base_url);
        let request =
            HttpRequest::post_json(&url, serde_json::to_value(query)?).bearer(&self.token);
        let body = self.transport.send(&request)?.into_success(&url)?;
        let found: Vec<SeriesDto> = serde_json::from_slice(&body)?;

        Ok(found
            .into_iter()
            .map(|s| Series::tagged(s.id, &query.name))
            .collect())
    }

    /// Run every query in order and merge the results by series id.
    ///
    /// A failing query is recorded and skipped.
    pub fn query_series(&self, queries: &[Query]) -> Harvest<SeriesMap> {
        let mut harvest = Harvest::new(SeriesMap::new());

        for query in queries {
            match self.run_query(query) {
                Ok(found) => {
                    tracing::info!(query = %query.name, series = found.len(), "Query matched");
                    for series in found {
                        merge_series(&mut harvest.value, series);
                    }
                }
                Err(e) => {
                    tracing::warn!(query = %query.name, error = %e, "Query failed, skipping");
                    harvest.fail(format!("query {}", query.name), e);
                }
            }
        }

        harvest
    }

    /// OPDS feed URL of a series.
    pub fn series_feed_url(&self, series_id: i64) -> String {
        format!(
            "{}/api/opds/{}/series/{}",
            self.base_url, self.api_key, series_id
        )
    }

    /// Fetch the feed of one series and extract its EPUBs.
    pub fn fetch_series_books(&self, series: &Series) -> Result<Vec<Book>> {
        let body = self.get(&self.series_feed_url(series.id))?;
        let xml = String::from_utf8(body)
            .map_err(|e| SyncError::InvalidFeed(format!("feed is not UTF-8: {}", e)))?;
        let feed = opds::parse_feed(&xml)?;

        Ok(opds::extract_books(&feed, &series.shelves, &self.base_url))
    }

    /// Collect the books of every series, merged by book id.
    ///
    /// A series whose feed cannot be fetched or parsed is recorded and
    /// skipped.
    pub fn fetch_books(&self, series: &SeriesMap) -> Harvest<BookMap> {
        let mut harvest = Harvest::new(BookMap::new());

        for s in series.values() {
            match self.fetch_series_books(s) {
                Ok(books) => {
                    tracing::debug!(series = s.id, books = books.len(), "Read series feed");
                    for book in books {
                        merge_book(&mut harvest.value, book);
                    }
                }
                Err(e) => {
                    tracing::warn!(series = s.id, error = %e, "Series feed failed, skipping");
                    harvest.fail(format!("series {}", s.id), e);
                }
            }
        }

        harvest
    }
}

impl<T: Transport> Downloader for KavitaClient<T> {
    fn download_to(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        self.transport
            .send_to(&HttpRequest::get(url).bearer(&self.token), sink)
    }
}
