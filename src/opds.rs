//! Reading the subset of OPDS feeds Kavita serves for a series.

use crate::error::{Result, SyncError};
use crate::library::Book;
use roxmltree::{Document, Node};

/// The only entry format we mirror.
pub const SUPPORTED_FORMAT: &str = "Epub";

/// MIME type of an EPUB acquisition link.
pub const EPUB_MIME: &str = "application/epub+zip";

/// Prefix shared by every acquisition link relation.
pub const ACQUISITION_REL: &str = "http://opds-spec.org/acquisition";

/// OPDS feed link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    /// Link relation type.
    pub rel: String,
    /// MIME type of the linked resource.
    pub link_type: String,
    /// URL of the linked resource, usually server-relative.
    pub href: String,
}

impl Link {
    /// Whether this link downloads the entry as an EPUB.
    pub fn is_epub_acquisition(&self) -> bool {
        self.link_type == EPUB_MIME && self.rel.starts_with(ACQUISITION_REL)
    }
}

/// OPDS feed entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    /// Catalog identifier.
    pub id: String,
    /// Entry title.
    pub title: String,
    /// Media format label (Kavita's `dcterms:format`).
    pub format: String,
    /// Links associated with this entry.
    pub links: Vec<Link>,
}

impl Entry {
    /// The href of the EPUB acquisition link, if the entry is a mirrorable
    /// EPUB. The last qualifying link wins.
    pub fn epub_href(&self) -> Option<&str> {
        if self.format != SUPPORTED_FORMAT {
            return None;
        }
        self.links
            .iter()
            .rev()
            .find(|l| l.is_epub_acquisition())
            .map(|l| l.href.as_str())
    }
}

/// A parsed feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    /// Entries in document order.
    pub entries: Vec<Entry>,
}

/// Parse a feed document.
pub fn parse_feed(xml: &str) -> Result<Feed> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "feed" {
        return Err(SyncError::InvalidFeed(format!(
            "expected <feed> root, found <{}>",
            root.tag_name().name()
        )));
    }

    let entries = root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "entry")
        .map(parse_entry)
        .collect();

    Ok(Feed { entries })
}

fn parse_entry(node: Node<'_, '_>) -> Entry {
    let mut entry = Entry::default();

    // Matched by local name, so `dcterms:format` and `format` both count.
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "id" => entry.id = child_text(child),
            "title" => entry.title = child_text(child),
            "format" => entry.format = child_text(child),
            "link" => entry.links.push(Link {
                rel: child.attribute("rel").unwrap_or_default().to_string(),
                link_type: child.attribute("type").unwrap_or_default().to_string(),
                href: child.attribute("href").unwrap_or_default().to_string(),
            }),
            _ => {}
        }
    }

    entry
}

fn child_text(node: Node<'_, '_>) -> String {
    node.text().map(str::trim).unwrap_or_default().to_string()
}

/// Resolve a feed href against the server base URL.
pub fn resolve_href(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{}{}", base, href)
    } else {
        format!("{}/{}", base, href)
    }
}

/// Turn the mirrorable entries of `feed` into books carrying `shelves`.
///
/// Entries that are not EPUBs, or have no EPUB acquisition link, are dropped.
pub fn extract_books(feed: &Feed, shelves: &[String], base_url: &str) -> Vec<Book> {
    feed.entries
        .iter()
        .filter_map(|entry| {
            let href = entry.epub_href()?;
            let mut book = Book::new(&entry.id, &entry.title, resolve_href(base_url, href));
            book.shelves = shelves.to_vec();
            Some(book)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:dcterms="http://purl.org/dc/terms/">
  <id>series-12</id>
  <title>Dune</title>
  <link rel="self" type="application/atom+xml;profile=opds-catalog" href="/api/opds/key/series/12"/>
  <entry>
    <id>301</id>
    <title>Dune - Vol. 1</title>
    <dcterms:format>Epub</dcterms:format>
    <link rel="http://opds-spec.org/image" type="image/jpeg" href="/api/image/301"/>
    <link rel="http://opds-spec.org/acquisition/open-access" type="application/epub+zip" href="/api/opds/key/series/12/volume/1/chapter/301/download/dune1.epub"/>
  </entry>
  <entry>
    <id>302</id>
    <title>Dune - Scan</title>
    <dcterms:format>PDF</dcterms:format>
    <link rel="http://opds-spec.org/acquisition" type="application/epub+zip" href="/dl/302"/>
  </entry>
  <entry>
    <id>303</id>
    <title>Dune - Preview</title>
    <dcterms:format>Epub</dcterms:format>
    <link rel="http://opds-spec.org/image" type="application/epub+zip" href="/dl/303"/>
    <link rel="http://opds-spec.org/acquisition" type="application/pdf" href="/dl/303.pdf"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed_entries() {
        let feed = parse_feed(FEED).unwrap();
        assert_eq!(feed.entries.len(), 3);

        let first = &feed.entries[0];
        assert_eq!(first.id, "301");
        assert_eq!(first.title, "Dune - Vol. 1");
        assert_eq!(first.format, "Epub");
        assert_eq!(first.links.len(), 2);
    }

    #[test]
    fn test_only_epub_with_acquisition_link_is_extracted() {
        let feed = parse_feed(FEED).unwrap();
        let shelves = vec!["Sci-Fi".to_string()];
        let books = extract_books(&feed, &shelves, "http://kavita.local/");

        assert_eq!(books.len(), 1);
        assert_eq!(books[0].id, "301");
        assert_eq!(
            books[0].url,
            "http://kavita.local/api/opds/key/series/12/volume/1/chapter/301/download/dune1.epub"
        );
        assert_eq!(books[0].shelves, shelves);
        assert!(!books[0].is_downloaded());
    }

    #[test]
    fn test_non_feed_root_is_rejected() {
        let err = parse_feed("<html><body/></html>").unwrap_err();
        assert!(matches!(err, SyncError::InvalidFeed(_)));
        assert!(matches!(parse_feed("<feed>"), Err(SyncError::Xml(_))));
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("http://k:5000/", "/a/b"), "http://k:5000/a/b");
        assert_eq!(resolve_href("http://k:5000", "a/b"), "http://k:5000/a/b");
        assert_eq!(resolve_href("http://k", "https://cdn/x"), "https://cdn/x");
    }
}
