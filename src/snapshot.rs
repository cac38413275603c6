//! The persisted book index and reconciliation against it.
//!
//! `kavita-books.json` in the output folder records which books are on disk.
//! A sync pass reads it fully, deletes and downloads the difference, then
//! replaces it with the new book list.

use crate::error::{ItemFailure, Result, SyncError};
use crate::library::Book;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

/// Name of the index file inside the output folder.
pub const INDEX_FILE_NAME: &str = "kavita-books.json";

/// Fetches the raw content of a book.
pub trait Downloader {
    /// Stream `url` into `sink` and return the bytes written, failing on
    /// transport errors and non-success statuses.
    fn download_to(&self, url: &str, sink: &mut dyn Write) -> Result<u64>;
}

/// Path of the index file in `folder`.
pub fn index_path(folder: &Path) -> PathBuf {
    folder.join(INDEX_FILE_NAME)
}

/// Join an index `path` onto `folder`. Absolute paths and parent
/// components are rejected so the index can only name files inside it.
pub fn book_path(folder: &Path, relative_path: &str) -> Result<PathBuf> {
    let relative = Path::new(relative_path);
    if relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Ok(folder.join(relative))
    } else {
        Err(SyncError::UnsafePath(relative_path.to_string()))
    }
}

/// Read the index file, failing if it is missing.
pub fn read_snapshot(folder: &Path) -> Result<Vec<Book>> {
    let path = index_path(folder);
    let corrupt = |message: String| SyncError::Snapshot {
        path: path.display().to_string(),
        message,
    };
    let content = std::fs::read(&path).map_err(|e| corrupt(e.to_string()))?;
    serde_json::from_slice(&content).map_err(|e| corrupt(e.to_string()))
}

/// Read the index file; a missing file is an empty snapshot.
pub fn load_snapshot(folder: &Path) -> Result<Vec<Book>> {
    let path = index_path(folder);
    let exists = path.try_exists().map_err(|e| SyncError::Snapshot {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    if !exists {
        tracing::info!(folder = %folder.display(), "No index file yet, starting fresh");
        return Ok(Vec::new());
    }
    read_snapshot(folder)
}

/// Replace the index file with `books`.
///
/// The new content is written to a temporary file next to the index and
/// renamed over it, so readers never see a half-written index.
pub fn save_snapshot(folder: &Path, books: &[Book]) -> Result<()> {
    let mut file = tempfile::NamedTempFile::new_in(folder)?;
    serde_json::to_writer_pretty(&mut file, books)?;
    file.write_all(b"\n")?;
    file.as_file().sync_all()?;
    file.persist(index_path(folder)).map_err(|e| e.error)?;
    Ok(())
}

/// Books to fetch and books to remove, compared by id only.
#[derive(Debug, PartialEq, Eq)]
pub struct SnapshotDiff<'a> {
    /// In the new set but not on disk.
    pub to_download: Vec<&'a Book>,
    /// On disk but no longer in the new set.
    pub to_delete: Vec<&'a Book>,
}

/// Compare a fresh book list with the previous snapshot.
///
/// Old entries without a path never finished downloading and count as
/// absent, so they are fetched again.
pub fn diff<'a>(new_books: &'a [Book], old_books: &'a [Book]) -> SnapshotDiff<'a> {
    let old_ids: HashSet<&str> = old_books
        .iter()
        .filter(|b| b.is_downloaded())
        .map(|b| b.id.as_str())
        .collect();
    let new_ids: HashSet<&str> = new_books.iter().map(|b| b.id.as_str()).collect();

    SnapshotDiff {
        to_download: new_books
            .iter()
            .filter(|b| !old_ids.contains(b.id.as_str()))
            .collect(),
        to_delete: old_books
            .iter()
            .filter(|b| b.is_downloaded() && !new_ids.contains(b.id.as_str()))
            .collect(),
    }
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Ids downloaded in this run.
    pub downloaded: Vec<String>,
    /// Ids whose files were removed.
    pub deleted: Vec<String>,
    /// Books carried over from the previous snapshot.
    pub kept: usize,
    /// Everything that was skipped.
    pub failures: Vec<ItemFailure>,
    /// What the index file now lists.
    pub snapshot: Vec<Book>,
}

/// Bring `folder` in line with `new_books` and persist the new snapshot.
///
/// Deletions run before downloads, and the index is written once both are
/// done. Per-book failures are recorded in the report; only failing to
/// write the index is fatal.
pub fn reconcile<D: Downloader + ?Sized>(
    downloader: &D,
    new_books: Vec<Book>,
    old_books: &[Book],
    folder: &Path,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    let (download_ids, deletions): (HashSet<String>, Vec<Book>) = {
        let d = diff(&new_books, old_books);
        (
            d.to_download.iter().map(|b| b.id.clone()).collect(),
            d.to_delete.into_iter().cloned().collect(),
        )
    };
    tracing::info!(
        download = download_ids.len(),
        delete = deletions.len(),
        "Computed snapshot difference"
    );

    for book in deletions {
        let path = match book_path(folder, &book.relative_path) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(id = %book.id, path = %book.relative_path, "Index path leaves the output folder, not deleting");
                report.failures.push(ItemFailure::new(book.id, e));
                continue;
            }
        };
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(id = %book.id, path = %path.display(), "Deleted book");
                report.deleted.push(book.id);
            }
            Err(e) => {
                tracing::warn!(id = %book.id, path = %path.display(), error = %e, "Failed to delete book");
                report.failures.push(ItemFailure::new(book.id, e.into()));
            }
        }
    }

    let old_paths: HashMap<&str, &str> = old_books
        .iter()
        .filter(|b| b.is_downloaded())
        .map(|b| (b.id.as_str(), b.relative_path.as_str()))
        .collect();

    for mut book in new_books {
        if !download_ids.contains(&book.id) {
            if let Some(path) = old_paths.get(book.id.as_str()) {
                book.relative_path = path.to_string();
            }
            report.kept += 1;
            report.snapshot.push(book);
            continue;
        }

        book.relative_path = book.file_name();
        match fetch_to_file(downloader, &book, folder) {
            Ok(size) => {
                tracing::info!(id = %book.id, title = %book.title, bytes = size, "Downloaded book");
                report.downloaded.push(book.id.clone());
                report.snapshot.push(book);
            }
            Err(e) => {
                tracing::warn!(id = %book.id, url = %book.url, error = %e, "Failed to download book");
                report.failures.push(ItemFailure::new(book.id, e));
            }
        }
    }

    save_snapshot(folder, &report.snapshot)?;
    Ok(report)
}

fn fetch_to_file<D: Downloader + ?Sized>(downloader: &D, book: &Book, folder: &Path) -> Result<u64> {
    let path = book_path(folder, &book.relative_path)?;
    let mut file = BufWriter::new(File::create(&path)?);

    let result = downloader.download_to(&book.url, &mut file).and_then(|size| {
        file.flush()?;
        file.get_ref().sync_all()?;
        Ok(size)
    });
    if result.is_err() {
        drop(file);
        let _ = std::fs::remove_file(&path);
    }
    result
}
