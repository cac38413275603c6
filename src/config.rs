use crate::error::{Result, SyncError};
use crate::query::Query;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Mirror Kavita queries onto a Kobo e-reader.
#[derive(Parser, Debug, Clone)]
#[command(name = "kavita-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "KAVITA_SYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Download the books matched by the configured queries.
    Sync {
        /// Folder to mirror books into (overrides the config file).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Add synced books to the matching shelves of the device database.
    Shelves {
        /// Path to the KoboReader.sqlite file.
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Path where the books are synced to.
        #[arg(long)]
        books_path: Option<PathBuf>,
    },

    /// Create a default config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Kavita server access.
    #[serde(default)]
    pub server: ServerConfig,

    /// Local mirror folder.
    #[serde(default)]
    pub output: OutputConfig,

    /// E-reader paths used by the `shelves` command.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Queries, each one becoming a shelf.
    #[serde(default)]
    pub queries: Vec<Query>,
}

/// Kavita server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the Kavita instance.
    #[serde(default)]
    pub base_url: String,

    /// API key of the syncing user.
    #[serde(default)]
    pub api_key: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    60
}

/// Output configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Folder the books and the index file are written to.
    #[serde(default)]
    pub folder: PathBuf,
}

/// Device configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Path to the device database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Folder the books were synced to, as seen from the device.
    #[serde(default = "default_books_path")]
    pub books_path: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            books_path: default_books_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/mnt/onboard/.kobo/KoboReader.sqlite")
}

fn default_books_path() -> PathBuf {
    PathBuf::from("/mnt/onboard/kavita-sync")
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SyncError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Check the settings required by the `sync` command.
    pub fn validate_for_sync(&self) -> Result<()> {
        if self.server.base_url.trim().is_empty() {
            return Err(SyncError::Config(
                "Specify a base_url in the [server] section".to_string(),
            ));
        }
        Url::parse(&self.server.base_url).map_err(|e| {
            SyncError::Config(format!("Invalid base_url '{}': {}", self.server.base_url, e))
        })?;
        if self.server.api_key.trim().is_empty() {
            return Err(SyncError::Config(
                "Specify an api_key in the [server] section".to_string(),
            ));
        }
        if self.output.folder.as_os_str().is_empty() {
            return Err(SyncError::Config(
                "Specify a folder in the [output] section".to_string(),
            ));
        }
        if self.queries.is_empty() {
            tracing::warn!("No queries configured, every synced book will be removed");
        }
        Ok(())
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("kavita-sync.toml"),
            PathBuf::from("config.toml"),
            dirs::config_dir()
                .map(|p| p.join("kavita-sync").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/kavita-sync/config.toml"),
        ];

        candidates
            .into_iter()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# kavita-sync configuration

[server]
base_url = "https://kavita.example.com"
api_key = ""
# timeout_seconds = 60

[output]
folder = "/mnt/onboard/kavita-sync"

[device]
# db_path = "/mnt/onboard/.kobo/KoboReader.sqlite"
# books_path = "/mnt/onboard/kavita-sync"

# Each query becomes a shelf named after it.
# join_type: "And" or "Or"
# field: Summary, SeriesName, PublicationStatus, Languages, AgeRating,
#   UserRating, Tags, CollectionTags, Translators, Characters, Publisher,
#   Editor, CoverArtist, Letterer, Colorist, Inker, Penciller, Writers,
#   Genres, Libraries, ReadProgress, Formats, ReleaseYear, ReadTime
# comparison: Equal, GreaterThan, GreaterThanEqual, LessThan, LessThanEqual,
#   Contains, Matches, NotContains, NotEqual, BeginsWith, EndsWith,
#   IsBefore, IsAfter, IsInLast, IsNotInLast

# [[queries]]
# name = "Want to Read"
# join_type = "And"
#
# [[queries.filters]]
# field = "ReadProgress"
# comparison = "Equal"
# value = "0"
"#
        .to_string()
    }
}
