use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use shelfmark::config::Config;
use shelfmark::db::{Database, ImportSource, ImportStatus};
use shelfmark::import::{ImportConfig, ImportStore, ImportWorker, RandomThrottle};
use shelfmark::library::LibraryManager;
use shelfmark::messages::NotificationSink;
use shelfmark::metadata::{MetadataProvider, OpenLibraryProvider};

#[derive(Parser)]
#[command(name = "shelfmark", about = "Personal reading tracker", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a reading-tracker export file
    Import {
        /// Export file to import (CSV, or one ISBN per line)
        file: PathBuf,
        /// Export dialect of the file
        #[arg(long, value_enum)]
        source: Source,
        /// User to import for
        #[arg(long, default_value = "default")]
        user: String,
        /// Enrich records from Open Library
        #[arg(long)]
        fetch_metadata: bool,
        /// Also fetch cover images (implies metadata fetching)
        #[arg(long)]
        fetch_covers: bool,
    },
    /// Show queue counts for a user
    Status {
        #[arg(long, default_value = "default")]
        user: String,
    },
}

#[derive(Copy, Clone, ValueEnum)]
enum Source {
    Goodreads,
    Storygraph,
    Librarything,
    IsbnList,
}

impl From<Source> for ImportSource {
    fn from(source: Source) -> Self {
        match source {
            Source::Goodreads => ImportSource::Goodreads,
            Source::Storygraph => ImportSource::Storygraph,
            Source::Librarything => ImportSource::Librarything,
            Source::IsbnList => ImportSource::IsbnList,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load();

    let database_path = config.get_database_path();
    if let Some(parent) = database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let database = Database::new(database_path.to_str().ok_or("invalid database path")?).await?;

    match cli.command {
        Command::Import {
            file,
            source,
            user,
            fetch_metadata,
            fetch_covers,
        } => {
            let import_config = ImportConfig {
                source: source.into(),
                fetch_metadata: fetch_metadata || fetch_covers,
                fetch_covers,
            };

            let metadata: Option<Arc<dyn MetadataProvider>> = if import_config.fetch_metadata {
                Some(Arc::new(OpenLibraryProvider::new(&config.open_library_url)?))
            } else {
                None
            };

            let worker = ImportWorker::new(
                ImportStore::new(database.clone()),
                LibraryManager::new(database.clone()),
                NotificationSink::new(database),
                metadata,
                Arc::new(RandomThrottle::default()),
                tokio::runtime::Handle::current(),
            );

            let handle = worker.start_import(&file, &user, &import_config).await?;
            info!("ingestion finished, draining queue");
            let summary = handle.join().await?;
            println!(
                "imported {} records, {} failures, in {} seconds",
                summary.imported, summary.failed, summary.elapsed_secs
            );
        }
        Command::Status { user } => {
            let store = ImportStore::new(database);
            for status in [
                ImportStatus::Saved,
                ImportStatus::Processing,
                ImportStatus::Imported,
                ImportStatus::Error,
            ] {
                let count = store.count_by_status(&user, status).await?;
                println!("{:>12}: {}", status.as_str(), count);
            }
        }
    }

    Ok(())
}
