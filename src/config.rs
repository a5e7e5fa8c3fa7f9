use std::path::PathBuf;

/// Application configuration
/// In debug builds: loads from .env file first, then the environment
#[derive(Clone, Debug)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_path: Option<PathBuf>,
    /// Base URL for the Open Library metadata backend
    pub open_library_url: String,
}

const DEFAULT_OPEN_LIBRARY_URL: &str = "https://openlibrary.org";

impl Config {
    /// Load configuration from the environment
    pub fn load() -> Self {
        #[cfg(debug_assertions)]
        if dotenvy::dotenv().is_ok() {
            tracing::debug!("Config: loaded .env file");
        }

        Self::from_env()
    }

    fn from_env() -> Self {
        let database_path = std::env::var("SHELFMARK_DATABASE_PATH")
            .ok()
            .map(PathBuf::from);

        let open_library_url = std::env::var("SHELFMARK_OPENLIBRARY_URL")
            .unwrap_or_else(|_| DEFAULT_OPEN_LIBRARY_URL.to_string());

        Self {
            database_path,
            open_library_url,
        }
    }

    /// Resolve the database path, defaulting to ~/.shelfmark/shelfmark.db
    pub fn get_database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }

        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_dir.join(".shelfmark").join("shelfmark.db")
    }
}
