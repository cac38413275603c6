//! kavita-sync: mirror Kavita queries onto a Kobo e-reader.
//!
//! Each configured query is a shelf. A `sync` pass runs the queries against
//! a Kavita server, collects the EPUBs of every matching series from their
//! OPDS feeds and brings a local folder in line with them, recording what is
//! on disk in `kavita-books.json`. A `shelves` pass, run on the device, reads
//! that index and fills the matching collections of the Kobo database.
//!
//! # Features
//!
//! - Shelf membership unioned across queries
//! - Incremental downloads diffed by book id
//! - Best-effort passes that report skipped items instead of aborting
//! - Idempotent shelf updates

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Series and their aggregation.
pub mod catalog;
/// Configuration and CLI.
pub mod config;
/// Kobo database access.
pub mod device;
/// Error types.
pub mod error;
/// Kavita API client and HTTP transport.
pub mod kavita;
/// Book model.
pub mod library;
/// OPDS feed reading.
pub mod opds;
/// Catalog queries.
pub mod query;
/// Persisted index and reconciliation.
pub mod snapshot;
/// Sync and shelf passes.
pub mod sync;


pub use config::{Cli, Command, Config};
pub use device::DeviceDatabase;
pub use error::{Result, SyncError};
pub use kavita::{KavitaClient, ReqwestTransport, Transport};
pub use library::Book;
