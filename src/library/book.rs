//! Book record shared by the sync pass and the shelf pass.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A downloadable book, as persisted in the index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Book title.
    #[serde(default)]
    pub title: String,

    /// File name inside the output folder; empty until downloaded.
    #[serde(rename = "path", default)]
    pub relative_path: String,

    /// Absolute download URL.
    #[serde(default)]
    pub url: String,

    /// Shelves this book belongs to.
    #[serde(default)]
    pub shelves: Vec<String>,

    /// Catalog identifier, stable across syncs.
    pub id: String,
}

/// Books keyed by identity.
pub type BookMap = BTreeMap<String, Book>;

impl Book {
    /// Create a book that has not been downloaded yet.
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            relative_path: String::new(),
            url: url.into(),
            shelves: Vec::new(),
            id: id.into(),
        }
    }

    /// Whether a file for this book is on disk.
    pub fn is_downloaded(&self) -> bool {
        !self.relative_path.is_empty()
    }

    /// File name a fresh download of this book is written to.
    ///
    /// The id is percent-encoded, so distinct ids never share a file and
    /// separators cannot leave the output folder.
    pub fn file_name(&self) -> String {
        format!("{}.epub", urlencoding::encode(&self.id))
    }
}

/// Add every shelf of `incoming` that `shelves` does not list yet.
pub fn union_shelves(shelves: &mut Vec<String>, incoming: &[String]) {
    for shelf in incoming {
        if !shelves.contains(shelf) {
            shelves.push(shelf.clone());
        }
    }
}

/// Insert `book`, or extend the shelves of the entry already holding its id.
pub fn merge_book(books: &mut BookMap, book: Book) {
    match books.get_mut(&book.id) {
        Some(existing) => union_shelves(&mut existing.shelves, &book.shelves),
        None => {
            books.insert(book.id.clone(), book);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shelved(id: &str, shelves: &[&str]) -> Book {
        let mut book = Book::new(id, id, format!("http://k/{}", id));
        book.shelves = shelves.iter().map(|s| s.to_string()).collect();
        book
    }

    #[test]
    fn test_merge_unions_shelves() {
        let mut books = BookMap::new();
        merge_book(&mut books, shelved("1", &["A"]));
        merge_book(&mut books, shelved("1", &["B", "A"]));
        merge_book(&mut books, shelved("2", &["B"]));

        assert_eq!(books.len(), 2);
        assert_eq!(books["1"].shelves, vec!["A", "B"]);
        assert_eq!(books["2"].shelves, vec!["B"]);
    }

    #[test]
    fn test_index_json_field_names() {
        let mut book = shelved("42", &["Fantasy"]);
        book.relative_path = book.file_name();

        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "42",
                "path": "42.epub",
                "url": "http://k/42",
                "shelves": ["Fantasy"],
                "id": "42"
            })
        );
    }

    #[test]
    fn test_file_name_is_unique_per_id() {
        let name = |id: &str| Book::new(id, "t", "u").file_name();

        assert_eq!(name("301"), "301.epub");
        assert_eq!(name("a/b"), "a%2Fb.epub");
        assert_eq!(name("a\\b"), "a%5Cb.epub");
        assert_ne!(name("a/b"), name("a_b"));
        assert_ne!(name("a%2Fb"), name("a/b"));
    }
}
