use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::db::{
    DbImportRecord, DbUserBook, ImportSource, ImportStatus, MessageCategory, ReadingEventType,
    Visibility,
};
use crate::import::history;
use crate::import::ingest::ImportIngestor;
use crate::import::merge;
use crate::import::store::ImportStore;
use crate::import::throttle::ImportThrottle;
use crate::import::types::{is_blank, push_unique, ImportConfig};
use crate::import::ImportError;
use crate::library::LibraryManager;
use crate::messages::NotificationSink;
use crate::metadata::{FetchedMetadata, MetadataProvider, MetadataRequest};

// Shelf names that encode a reading status rather than a topic tag
pub const TO_READ: &str = "to-read";
pub const READ: &str = "read";
pub const CURRENTLY_READING: &str = "currently-reading";
pub const DROPPED: &str = "did-not-finish";

/// Counters for one completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: u64,
    pub failed: u64,
    pub elapsed_secs: u64,
}

/// Handle to a running drain loop
pub struct ImportHandle {
    join: JoinHandle<ImportSummary>,
}

impl ImportHandle {
    /// Wait for the drain loop to finish and return the run summary
    pub async fn join(self) -> Result<ImportSummary, ImportError> {
        Ok(self.join.await?)
    }
}

/// Orchestrates one import run: synchronous ingestion into the queue, a
/// crash-resume reset, then an asynchronous drain loop that moves every
/// queued record to a terminal status.
#[derive(Clone)]
pub struct ImportWorker {
    store: ImportStore,
    library: LibraryManager,
    messages: NotificationSink,
    metadata: Option<Arc<dyn MetadataProvider>>,
    throttle: Arc<dyn ImportThrottle>,
    runtime: tokio::runtime::Handle,
}

impl ImportWorker {
    pub fn new(
        store: ImportStore,
        library: LibraryManager,
        messages: NotificationSink,
        metadata: Option<Arc<dyn MetadataProvider>>,
        throttle: Arc<dyn ImportThrottle>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        ImportWorker {
            store,
            library,
            messages,
            metadata,
            throttle,
            runtime,
        }
    }

    /// Ingest a file and start draining the queue. The returned future
    /// resolves once ingestion is done; the drain loop keeps running on
    /// the runtime and is observable through the handle.
    pub async fn start_import(
        &self,
        file: &Path,
        user_id: &str,
        config: &ImportConfig,
    ) -> Result<ImportHandle, ImportError> {
        let started = Instant::now();
        self.messages
            .post(
                user_id,
                &format!("Import started at {}", Utc::now().format("%Y-%m-%dT%H:%M:%S")),
                None,
                MessageCategory::Info,
            )
            .await;

        let ingestor = ImportIngestor::new(self.store.clone());
        let count = ingestor.parse(file, user_id, config).await?;
        info!(
            "parsing of {} ended after {} seconds, {} entries recorded",
            file.display(),
            started.elapsed().as_secs(),
            count
        );

        // rows stranded in Processing by a crashed run go back to Saved,
        // so this run picks them up too
        let reset = self
            .store
            .update_status_bulk(user_id, ImportStatus::Processing, ImportStatus::Saved)
            .await?;
        if reset > 0 {
            warn!("requeued {} stale processing records for user {}", reset, user_id);
        }

        let worker = self.clone();
        let file = file.to_path_buf();
        let user_id = user_id.to_string();
        let config = config.clone();
        let join = self
            .runtime
            .spawn(async move { worker.drain(file, user_id, config, started).await });
        Ok(ImportHandle { join })
    }

    /// Fetch one page of Saved records at a time until none remain. Every
    /// processed record must land in Imported or Error; a record left in
    /// Saved would be refetched forever, so store-level failures abort the
    /// loop instead.
    async fn drain(
        &self,
        file: PathBuf,
        user_id: String,
        config: ImportConfig,
        started: Instant,
    ) -> ImportSummary {
        let mut imported = 0u64;
        let mut failed = 0u64;
        'drain: loop {
            let page = match self.store.find_by_status(&user_id, ImportStatus::Saved).await {
                Ok(page) => page,
                Err(e) => {
                    error!("failed to fetch queued records for user {}: {}", user_id, e);
                    break;
                }
            };
            if page.is_empty() {
                break;
            }
            for record in page {
                match self.process_record(&record, &user_id, &config).await {
                    Ok(ImportStatus::Imported) => imported += 1,
                    Ok(_) => failed += 1,
                    Err(e) => {
                        error!("aborting import drain for user {}: {}", user_id, e);
                        failed += 1;
                        break 'drain;
                    }
                }
            }
        }

        // mark the source file consumed so it isn't re-imported by mistake
        let mut consumed = file.clone().into_os_string();
        consumed.push(".imported");
        match std::fs::rename(&file, PathBuf::from(consumed)) {
            Ok(()) => debug!("renamed imported file {}", file.display()),
            Err(e) => warn!("could not rename imported file {}: {}", file.display(), e),
        }

        let elapsed_secs = started.elapsed().as_secs();
        let message = format!(
            "Import of {} ended after {} seconds, with {} imports and {} failures",
            file.display(),
            elapsed_secs,
            imported,
            failed
        );
        info!("{}", message);
        self.messages
            .post(&user_id, &message, None, MessageCategory::Success)
            .await;
        ImportSummary {
            imported,
            failed,
            elapsed_secs,
        }
    }

    /// Process one record through Processing to a terminal status.
    /// Reconciliation failures mark the record Error and are not propagated;
    /// only status-write failures surface as Err.
    async fn process_record(
        &self,
        record: &DbImportRecord,
        user_id: &str,
        config: &ImportConfig,
    ) -> Result<ImportStatus, ImportError> {
        tokio::time::sleep(self.throttle.next_delay()).await;
        self.store
            .update_status(&record.id, ImportStatus::Processing)
            .await?;
        let status = match self.reconcile_record(record, user_id, config).await {
            Ok(status) => status,
            Err(e) => {
                error!("failed to import record {:?}: {}", record.title, e);
                ImportStatus::Error
            }
        };
        self.store.update_status(&record.id, status).await?;
        Ok(status)
    }

    async fn reconcile_record(
        &self,
        record: &DbImportRecord,
        user_id: &str,
        config: &ImportConfig,
    ) -> Result<ImportStatus, ImportError> {
        // metadata lookup is best-effort; the record's own data still imports
        let mut metadata = FetchedMetadata::default();
        if record.fetch_metadata {
            if let Some(provider) = &self.metadata {
                match preferred_isbn(record) {
                    Some(isbn) => {
                        let request = MetadataRequest {
                            isbn: Some(isbn.clone()),
                            title: record.title.clone(),
                            authors: record.authors.clone(),
                            fetch_cover: config.fetch_covers,
                        };
                        match provider.fetch(&request).await {
                            Ok(fetched) => metadata = fetched,
                            Err(e) => warn!(
                                "metadata fetch failed for isbn {}, importing local data only: {}",
                                isbn, e
                            ),
                        }
                    }
                    None => debug!("no isbn on record {}, skipping metadata fetch", record.id),
                }
            }
        }

        let mut candidate = merge::build_candidate(record, &metadata);
        if candidate.title.is_empty() && candidate.authors.is_empty() {
            error!(
                "no title nor authors on record {} (isbn10 {:?}, isbn13 {:?}), not saving",
                record.id, record.isbn10, record.isbn13
            );
            if record.source == ImportSource::IsbnList {
                self.messages
                    .post(
                        user_id,
                        &format!(
                            "no title nor authors found for input {} {}, not saving",
                            record.isbn10.as_deref().unwrap_or(""),
                            record.isbn13.as_deref().unwrap_or("")
                        ),
                        None,
                        MessageCategory::Warning,
                    )
                    .await;
            }
            return Ok(ImportStatus::Error);
        }

        // shelves that encode a reading status are peeled off the tag set;
        // they are mutually exclusive, last one parsed wins
        let mut tags: Vec<String> = Vec::new();
        for tag in &metadata.tags {
            let tag = tag.trim();
            if !tag.is_empty() {
                push_unique(&mut tags, tag);
            }
        }
        let mut status_shelf = String::new();
        if let Some(raw) = &record.tags {
            for shelf in raw.split(',') {
                let shelf = shelf.trim();
                if shelf.is_empty() {
                    continue;
                }
                if is_read_status_shelf(shelf) {
                    status_shelf = shelf.to_string();
                } else {
                    push_unique(&mut tags, shelf);
                }
            }
        }
        candidate.tags = tags;
        let read_status = reading_status(&status_shelf);
        let to_read = status_shelf.eq_ignore_ascii_case(TO_READ);

        let user_book = match self
            .library
            .find_book_by_isbn(record.isbn10.as_deref(), record.isbn13.as_deref())
            .await?
        {
            Some(existing) => {
                let merged = merge::merge(&candidate, &existing);
                self.library.update_book(&existing.book, &merged).await?;
                match self.library.find_user_book(user_id, &existing.book.id).await? {
                    Some(mut user_book) => {
                        // only fill per-user fields that are currently empty
                        let mut changed = false;
                        if is_blank(&user_book.personal_notes) && record.personal_notes.is_some() {
                            user_book.personal_notes = record.personal_notes.clone();
                            changed = true;
                        }
                        if user_book.owned.is_none() && record.owned.is_some() {
                            user_book.owned = record.owned;
                            changed = true;
                        }
                        if user_book.to_read.is_none() && to_read {
                            user_book.to_read = Some(true);
                            changed = true;
                        }
                        if changed {
                            self.library.update_user_book(&user_book).await?;
                        }
                        user_book
                    }
                    None => {
                        self.create_association(user_id, &existing.book.id, record, to_read)
                            .await?
                    }
                }
            }
            None => {
                let book = self.library.create_book(&candidate).await?;
                self.create_association(user_id, &book.id, record, to_read)
                    .await?
            }
        };

        // an in-progress or abandoned shelf becomes an initial event, but
        // only when the association has no history at all
        let events = self.library.reading_events(&user_book.id).await?;
        if events.is_empty() {
            if let Some(status) = read_status {
                if status == ReadingEventType::CurrentlyReading
                    || status == ReadingEventType::Dropped
                {
                    self.library
                        .add_reading_event(&user_book.id, status, Utc::now())
                        .await?;
                }
            }
        }

        let events = self.library.reading_events(&user_book.id).await?;
        let planned =
            history::plan_finished_events(record.read_dates.as_deref(), record.read_count, read_status, &events);
        for event_date in planned {
            self.library
                .add_reading_event(&user_book.id, ReadingEventType::Finished, event_date)
                .await?;
        }

        // star ratings are doubled onto the 0-10 scale; never overwrite an
        // existing review
        let rating = record.rating.unwrap_or(0) * 2;
        let review_text = record.review.clone().unwrap_or_default();
        if (!review_text.is_empty() || rating > 0)
            && self
                .library
                .find_review(user_id, &user_book.book_id)
                .await?
                .is_none()
        {
            self.library
                .add_review(
                    user_id,
                    &user_book.book_id,
                    &review_text,
                    rating as f64,
                    Visibility::Public,
                )
                .await?;
        }

        Ok(ImportStatus::Imported)
    }

    async fn create_association(
        &self,
        user_id: &str,
        book_id: &str,
        record: &DbImportRecord,
        to_read: bool,
    ) -> Result<DbUserBook, ImportError> {
        let mut user_book = DbUserBook::new(user_id, book_id);
        user_book.personal_notes = record.personal_notes.clone();
        user_book.owned = record.owned;
        user_book.to_read = if to_read { Some(true) } else { None };
        self.library.create_user_book(&user_book).await?;
        Ok(user_book)
    }
}

fn preferred_isbn(record: &DbImportRecord) -> Option<String> {
    record
        .isbn13
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| record.isbn10.as_deref().filter(|s| !s.trim().is_empty()))
        .map(|s| s.to_string())
}

fn is_read_status_shelf(shelf: &str) -> bool {
    reading_status(shelf).is_some() || shelf.eq_ignore_ascii_case(TO_READ)
}

fn reading_status(shelf: &str) -> Option<ReadingEventType> {
    if shelf.eq_ignore_ascii_case(READ) {
        Some(ReadingEventType::Finished)
    } else if shelf.eq_ignore_ascii_case(CURRENTLY_READING) {
        Some(ReadingEventType::CurrentlyReading)
    } else if shelf.eq_ignore_ascii_case(DROPPED) {
        Some(ReadingEventType::Dropped)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_shelves_are_recognized_case_insensitively() {
        assert_eq!(reading_status("read"), Some(ReadingEventType::Finished));
        assert_eq!(reading_status("Read"), Some(ReadingEventType::Finished));
        assert_eq!(
            reading_status("currently-reading"),
            Some(ReadingEventType::CurrentlyReading)
        );
        assert_eq!(
            reading_status("Did-Not-Finish"),
            Some(ReadingEventType::Dropped)
        );
        assert_eq!(reading_status("sci-fi"), None);
        assert_eq!(reading_status("to-read"), None);
    }

    #[test]
    fn to_read_is_a_status_shelf_but_not_an_event() {
        assert!(is_read_status_shelf("to-read"));
        assert!(is_read_status_shelf("TO-READ"));
        assert!(is_read_status_shelf("read"));
        assert!(!is_read_status_shelf("favorites"));
    }

    #[test]
    fn isbn13_preferred_for_metadata_lookups() {
        let mut record = DbImportRecord {
            id: "r1".to_string(),
            user_id: "u1".to_string(),
            source: ImportSource::Goodreads,
            status: ImportStatus::Saved,
            title: None,
            authors: None,
            isbn10: Some("0441013597".to_string()),
            isbn13: Some("9780441013593".to_string()),
            publisher: None,
            page_count: None,
            published_date: None,
            read_dates: None,
            tags: None,
            personal_notes: None,
            read_count: None,
            fetch_metadata: true,
            owned: None,
            rating: None,
            review: None,
            goodreads_id: None,
            librarything_id: None,
            created_at: Utc::now(),
            modified_at: Utc::now(),
        };
        assert_eq!(preferred_isbn(&record).as_deref(), Some("9780441013593"));
        record.isbn13 = None;
        assert_eq!(preferred_isbn(&record).as_deref(), Some("0441013597"));
        record.isbn10 = Some("  ".to_string());
        assert_eq!(preferred_isbn(&record), None);
    }
}
