//! kavita-sync entry point.

use clap::Parser;
use kavita_sync::{
    Config, ReqwestTransport,
    config::{Cli, Command},
    error::ItemFailure,
    sync,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kavita_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    match cli.command {
        Command::Init { force } => cmd_init(force),
        Command::Sync { output } => {
            let Some(path) = config_path else {
                anyhow::bail!("No config file found. Create one with: kavita-sync init");
            };
            cmd_sync(Config::load(&path)?, output)
        }
        Command::Shelves {
            db_path,
            books_path,
        } => {
            let config = match config_path {
                Some(path) => Config::load(&path)?,
                None => Config::default(),
            };
            cmd_shelves(config, db_path, books_path)
        }
    }
}

/// Write a default config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("kavita-sync.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());
    println!("\nSet base_url, api_key and your queries, then run: kavita-sync sync");

    Ok(())
}

/// Download the books of the configured queries.
fn cmd_sync(mut config: Config, output: Option<PathBuf>) -> anyhow::Result<()> {
    if let Some(folder) = output {
        config.output.folder = folder;
    }
    config.validate_for_sync()?;

    tracing::info!(
        server = %config.server.base_url,
        folder = %config.output.folder.display(),
        queries = config.queries.len(),
        "Starting sync"
    );

    let transport = ReqwestTransport::new(Duration::from_secs(config.server.timeout_seconds))?;
    let report = sync::run_sync(&config, transport, &config.output.folder)?;

    println!(
        "Downloaded {}, deleted {}, kept {}.",
        report.downloaded.len(),
        report.deleted.len(),
        report.kept
    );
    print_failures(&report.failures);

    Ok(())
}

/// Fill device shelves from the synced index.
fn cmd_shelves(
    config: Config,
    db_path: Option<PathBuf>,
    books_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let db_path = db_path.unwrap_or(config.device.db_path);
    let books_path = books_path.unwrap_or(config.device.books_path);

    tracing::info!(
        database = %db_path.display(),
        books = %books_path.display(),
        "Updating shelves"
    );

    let report = sync::run_shelves(&db_path, &books_path)?;

    println!("Added {} shelf entries.", report.upserted);
    if !report.unrecognized.is_empty() {
        let names: Vec<&str> = report.unrecognized.iter().map(String::as_str).collect();
        println!(
            "Shelves missing on the device (create them first): {}",
            names.join(", ")
        );
    }
    print_failures(&report.failures);

    Ok(())
}

fn print_failures(failures: &[ItemFailure]) {
    if failures.is_empty() {
        return;
    }
    println!("{} items skipped:", failures.len());
    for failure in failures {
        println!("  {}: {}", failure.subject, failure.error);
    }
}
