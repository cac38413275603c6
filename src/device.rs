//! Kobo device database access.
//!
//! Only two tables are touched: `Shelf` is read to learn which collections
//! exist on the device, and `ShelfContent` receives one row per
//! (shelf, book file) pair.

use crate::error::{ItemFailure, Result, SyncError};
use crate::snapshot::read_snapshot;
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OpenFlags, params};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// Handle on an existing `KoboReader.sqlite`.
pub struct DeviceDatabase {
    conn: Connection,
}

/// Outcome of a shelf pass.
#[derive(Debug, Default)]
pub struct ShelfReport {
    /// Shelf-content rows written.
    pub upserted: usize,
    /// Shelves referenced by books but unknown to the device.
    pub unrecognized: BTreeSet<String>,
    /// Books without a downloaded file.
    pub skipped_books: usize,
    /// Rows that could not be written.
    pub failures: Vec<ItemFailure>,
}

/// `ContentId` of a synced book file as the device stores it.
pub fn content_id(books_folder: &Path, relative_path: &str) -> Result<String> {
    let path = std::path::absolute(books_folder.join(relative_path))?;
    Ok(format!("file://{}", path.display()))
}

impl DeviceDatabase {
    /// Open the database at `path`. It is never created.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SyncError::MissingDatabase(path.display().to_string()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Names of the shelves present on the device.
    ///
    /// Rows whose internal name differs from the display name are skipped.
    pub fn list_shelves(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT InternalName, Name FROM Shelf")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut shelves = Vec::with_capacity(rows.len());
        for (internal_name, name) in rows {
            match (internal_name, name) {
                (Some(internal_name), Some(name)) if internal_name == name => shelves.push(name),
                (internal_name, name) => {
                    tracing::warn!(
                        internal_name = ?internal_name,
                        name = ?name,
                        "Shelf internal name differs from its name, skipping"
                    );
                }
            }
        }

        Ok(shelves)
    }

    /// Put a book file on a shelf, replacing any existing row for the pair.
    pub fn upsert_shelf_content(&self, shelf: &str, content_id: &str, modified: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO ShelfContent (ShelfName, ContentId, DateModified, _IsDeleted, _IsSynced)
             VALUES (?1, ?2, ?3, false, false)",
            params![shelf, content_id, modified],
        )?;
        Ok(())
    }

    /// Add every book of the index in `books_folder` to the device shelves
    /// named after its queries.
    ///
    /// The index must exist. Unknown shelves and failed rows are reported
    /// and skipped.
    pub fn apply_shelves(&self, books_folder: &Path, device_shelves: &[String]) -> Result<ShelfReport> {
        let books = read_snapshot(books_folder)?;
        let known: HashSet<&str> = device_shelves.iter().map(String::as_str).collect();
        let modified = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut report = ShelfReport::default();

        for book in &books {
            if !book.is_downloaded() {
                tracing::debug!(id = %book.id, "Book has no file, skipping");
                report.skipped_books += 1;
                continue;
            }
            let file_id = content_id(books_folder, &book.relative_path)?;

            for shelf in &book.shelves {
                if !known.contains(shelf.as_str()) {
                    tracing::warn!(shelf = %shelf, book = %book.id, "Unrecognized shelf");
                    report.unrecognized.insert(shelf.clone());
                    continue;
                }

                match self.upsert_shelf_content(shelf, &file_id, &modified) {
                    Ok(()) => report.upserted += 1,
                    Err(e) => {
                        tracing::warn!(shelf = %shelf, book = %book.id, error = %e, "Failed to add book to shelf");
                        report
                            .failures
                            .push(ItemFailure::new(format!("{} on {}", book.id, shelf), e));
                    }
                }
            }
        }

        Ok(report)
    }
}
