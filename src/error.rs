use thiserror::Error;

/// Main error type for the sync engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Device database error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The request never produced a response.
    #[error("HTTP transport error for {url}: {message}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying failure.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("Bad status {status} from {url}: {body}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, lossily decoded.
        body: String,
    },

    /// Login against the server failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Feed document does not have the expected shape.
    #[error("Invalid feed: {0}")]
    InvalidFeed(String),

    /// The persisted index file exists but cannot be used.
    #[error("Corrupt index file {path}: {message}")]
    Snapshot {
        /// Path of the index file.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// An index entry names a file outside the output folder.
    #[error("Path escapes the output folder: {0}")]
    UnsafePath(String),

    /// The device database file does not exist.
    #[error("Database doesn't exist: {0}")]
    MissingDatabase(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Build a status error, keeping the body readable in logs.
    pub fn status(url: &str, status: u16, body: &[u8]) -> Self {
        SyncError::Status {
            url: url.to_string(),
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

/// Result type alias for the sync engine.
pub type Result<T> = std::result::Result<T, SyncError>;

/// A recoverable failure for one item of a best-effort loop.
#[derive(Debug)]
pub struct ItemFailure {
    /// What was being processed (query name, series id, book id, shelf).
    pub subject: String,
    /// Why it failed.
    pub error: SyncError,
}

impl ItemFailure {
    /// Record a failure for `subject`.
    pub fn new(subject: impl Into<String>, error: SyncError) -> Self {
        Self {
            subject: subject.into(),
            error,
        }
    }
}

/// Output of a best-effort loop: the accumulated value plus every item that
/// was skipped along the way.
#[derive(Debug, Default)]
pub struct Harvest<T> {
    /// Accumulated result.
    pub value: T,
    /// Items that failed and were skipped.
    pub failures: Vec<ItemFailure>,
}

impl<T> Harvest<T> {
    /// Wrap a value with no failures.
    pub fn new(value: T) -> Self {
        Self {
            value,
            failures: Vec::new(),
        }
    }

    /// Record a skipped item.
    pub fn fail(&mut self, subject: impl Into<String>, error: SyncError) {
        self.failures.push(ItemFailure::new(subject, error));
    }
}
