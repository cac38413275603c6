//! The two passes run by the CLI.

use crate::config::Config;
use crate::device::{DeviceDatabase, ShelfReport};
use crate::error::Result;
use crate::kavita::{KavitaClient, Transport};
use crate::snapshot::{SyncReport, load_snapshot, reconcile};
use std::path::Path;

/// Mirror the books matched by the configured queries into `folder`.
///
/// Failures of single queries, feeds, deletions or downloads end up in the
/// report; login, index and folder errors abort the pass.
pub fn run_sync<T: Transport>(config: &Config, transport: T, folder: &Path) -> Result<SyncReport> {
    let client = KavitaClient::login(transport, &config.server.base_url, &config.server.api_key)?;

    let series = client.query_series(&config.queries);
    tracing::info!(series = series.value.len(), "Aggregated series");

    let books = client.fetch_books(&series.value);
    tracing::info!(books = books.value.len(), "Collected books");

    std::fs::create_dir_all(folder)?;
    let old_books = load_snapshot(folder)?;

    let mut report = reconcile(&client, books.value.into_values().collect(), &old_books, folder)?;

    let mut failures = series.failures;
    failures.extend(books.failures);
    failures.append(&mut report.failures);
    report.failures = failures;

    tracing::info!(
        downloaded = report.downloaded.len(),
        deleted = report.deleted.len(),
        kept = report.kept,
        failures = report.failures.len(),
        "Sync finished"
    );
    Ok(report)
}

/// Put every synced book in `books_folder` on its device shelves.
pub fn run_shelves(db_path: &Path, books_folder: &Path) -> Result<ShelfReport> {
    let db = DeviceDatabase::open(db_path)?;
    let shelves = db.list_shelves()?;
    tracing::info!(shelves = shelves.len(), "Read device shelves");

    let report = db.apply_shelves(books_folder, &shelves)?;

    tracing::info!(
        upserted = report.upserted,
        unrecognized = report.unrecognized.len(),
        failures = report.failures.len(),
        "Shelves updated"
    );
    Ok(report)
}
