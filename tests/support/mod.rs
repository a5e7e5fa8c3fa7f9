use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use shelfmark::db::Database;
use shelfmark::import::{ImportStore, ImportWorker, NoThrottle};
use shelfmark::library::LibraryManager;
use shelfmark::messages::NotificationSink;
use shelfmark::metadata::{FetchedMetadata, MetadataError, MetadataProvider, MetadataRequest};

/// Initialize tracing for a test, ignoring repeat initialization
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("shelfmark=debug")
        .with_test_writer()
        .try_init();
}

/// File-backed test database in a temp directory. The pool needs a real
/// file: with in-memory SQLite every pooled connection would get its own
/// database.
pub async fn test_database(dir: &Path) -> Database {
    let path = dir.join("test.db");
    Database::new(path.to_str().unwrap()).await.unwrap()
}

/// Import worker wired for tests: no throttling, optional metadata backend
pub fn test_worker(database: Database, metadata: Option<Arc<dyn MetadataProvider>>) -> ImportWorker {
    ImportWorker::new(
        ImportStore::new(database.clone()),
        LibraryManager::new(database.clone()),
        NotificationSink::new(database),
        metadata,
        Arc::new(NoThrottle),
        tokio::runtime::Handle::current(),
    )
}

/// Metadata backend that always returns the same canned response
pub struct MockMetadataProvider {
    pub response: FetchedMetadata,
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    async fn fetch(&self, _request: &MetadataRequest) -> Result<FetchedMetadata, MetadataError> {
        Ok(self.response.clone())
    }
}

/// Metadata backend that always fails, for fallback tests
pub struct FailingMetadataProvider;

#[async_trait]
impl MetadataProvider for FailingMetadataProvider {
    async fn fetch(&self, request: &MetadataRequest) -> Result<FetchedMetadata, MetadataError> {
        Err(MetadataError::NotFound(
            request.isbn.clone().unwrap_or_default(),
        ))
    }
}
