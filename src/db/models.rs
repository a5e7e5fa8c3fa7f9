use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// String constants for SQL values (keep in sync with as_str())
const IMPORT_STATUS_SAVED: &str = "saved";
const IMPORT_STATUS_PROCESSING: &str = "processing";
const IMPORT_STATUS_IMPORTED: &str = "imported";
const IMPORT_STATUS_ERROR: &str = "error";

/// Database models for the shelfmark catalog and import queue
///
/// The import queue (`import_records`) is a durable work queue: rows are
/// written during ingestion and drained asynchronously by the import worker.
/// Records are never deleted individually; they persist as an audit trail.
///
/// Processing status of one import record.
///
/// Status only ever advances Saved -> Processing -> {Imported, Error}.
/// The single exception is the bulk Processing -> Saved reset that runs at
/// the start of a new worker run to recover rows stranded by a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportStatus {
    Saved,      // Parsed and queued, waiting for the drain loop
    Processing, // Claimed by the worker
    Imported,   // Successfully reconciled into the catalog
    Error,      // Terminal failure, isolated to this record
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Saved => IMPORT_STATUS_SAVED,
            ImportStatus::Processing => IMPORT_STATUS_PROCESSING,
            ImportStatus::Imported => IMPORT_STATUS_IMPORTED,
            ImportStatus::Error => IMPORT_STATUS_ERROR,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            IMPORT_STATUS_SAVED => Some(ImportStatus::Saved),
            IMPORT_STATUS_PROCESSING => Some(ImportStatus::Processing),
            IMPORT_STATUS_IMPORTED => Some(ImportStatus::Imported),
            IMPORT_STATUS_ERROR => Some(ImportStatus::Error),
            _ => None,
        }
    }
}

/// Which export format a record came from. Always selected explicitly by
/// the caller, never auto-detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportSource {
    Goodreads,
    Storygraph,
    Librarything,
    IsbnList,
}

impl ImportSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportSource::Goodreads => "goodreads",
            ImportSource::Storygraph => "storygraph",
            ImportSource::Librarything => "librarything",
            ImportSource::IsbnList => "isbn_list",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "goodreads" => Some(ImportSource::Goodreads),
            "storygraph" => Some(ImportSource::Storygraph),
            "librarything" => Some(ImportSource::Librarything),
            "isbn_list" => Some(ImportSource::IsbnList),
            _ => None,
        }
    }
}

/// Kind of reading event on a user's book association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadingEventType {
    Finished,
    CurrentlyReading,
    Dropped,
}

impl ReadingEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingEventType::Finished => "finished",
            ReadingEventType::CurrentlyReading => "currently_reading",
            ReadingEventType::Dropped => "dropped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "finished" => Some(ReadingEventType::Finished),
            "currently_reading" => Some(ReadingEventType::CurrentlyReading),
            "dropped" => Some(ReadingEventType::Dropped),
            _ => None,
        }
    }
}

/// Category of a user-visible notification message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageCategory {
    Info,
    Success,
    Warning,
    Error,
}

impl MessageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageCategory::Info => "info",
            MessageCategory::Success => "success",
            MessageCategory::Warning => "warning",
            MessageCategory::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "info" => Some(MessageCategory::Info),
            "success" => Some(MessageCategory::Success),
            "warning" => Some(MessageCategory::Warning),
            "error" => Some(MessageCategory::Error),
            _ => None,
        }
    }
}

/// Review visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// One row of parsed, not-yet-reconciled import data
///
/// Written once by the ingestor with status Saved; afterwards only the
/// status ever changes, never the content. Authors and tags are stored as
/// comma-delimited strings, read dates as a semicolon-delimited string of
/// `yyyy/MM/dd` values, exactly as the exports carry them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbImportRecord {
    pub id: String,
    pub user_id: String,
    pub source: ImportSource,
    pub status: ImportStatus,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub publisher: Option<String>,
    pub page_count: Option<i32>,
    pub published_date: Option<String>,
    pub read_dates: Option<String>,
    pub tags: Option<String>,
    pub personal_notes: Option<String>,
    pub read_count: Option<i32>,
    pub fetch_metadata: bool,
    /// Tri-state: exports may not carry ownership at all
    pub owned: Option<bool>,
    /// 0-5 stars as exported; scaled x2 when a review is created
    pub rating: Option<i32>,
    pub review: Option<String>,
    pub goodreads_id: Option<String>,
    pub librarything_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Book metadata in the catalog
///
/// Imports only ever fill blank fields or add cross-references here; they
/// never overwrite user-curated data (see the merge rules in the import
/// module).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbBook {
    pub id: String,
    pub title: String,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub summary: Option<String>,
    pub publisher: Option<String>,
    pub page_count: Option<i32>,
    /// Kept as the raw export/provider string; exports disagree on format
    pub published_date: Option<String>,
    pub language: Option<String>,
    /// Cover image URL or path
    pub image: Option<String>,
    pub google_id: Option<String>,
    pub amazon_id: Option<String>,
    pub goodreads_id: Option<String>,
    pub librarything_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author, deduplicated by case-insensitive name across the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbAuthor {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Tag, deduplicated by case-insensitive name across the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbTag {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Series, deduplicated by case-insensitive name across the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbSeries {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user association with a book ("this user has/reads this book")
///
/// Carries the user-curated fields the import pipeline must never clobber:
/// personal notes, the owned flag and the to-read flag are only filled by
/// an import when they are currently empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbUserBook {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub personal_notes: Option<String>,
    pub owned: Option<bool>,
    pub to_read: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One reading-history event on a user-book association
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbReadingEvent {
    pub id: String,
    pub user_book_id: String,
    pub event_type: ReadingEventType,
    pub event_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A user's review of a book. Rating is on a 0-10 scale (star ratings
/// from exports are doubled on import).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbReview {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub text: String,
    pub rating: f64,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

/// User-visible notification, written best-effort by the import worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbUserMessage {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub link: Option<String>,
    pub category: MessageCategory,
    pub created_at: DateTime<Utc>,
}

impl DbBook {
    #[cfg(test)]
    pub fn new_test(title: &str) -> Self {
        let now = Utc::now();
        DbBook {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            isbn10: None,
            isbn13: None,
            summary: None,
            publisher: None,
            page_count: None,
            published_date: None,
            language: None,
            image: None,
            google_id: None,
            amazon_id: None,
            goodreads_id: None,
            librarything_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl DbAuthor {
    pub fn new(name: &str) -> Self {
        DbAuthor {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }
}

impl DbTag {
    pub fn new(name: &str) -> Self {
        DbTag {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }
}

impl DbSeries {
    pub fn new(name: &str) -> Self {
        DbSeries {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }
}

impl DbUserBook {
    pub fn new(user_id: &str, book_id: &str) -> Self {
        let now = Utc::now();
        DbUserBook {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            book_id: book_id.to_string(),
            personal_notes: None,
            owned: None,
            to_read: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl DbReadingEvent {
    pub fn new(user_book_id: &str, event_type: ReadingEventType, event_date: DateTime<Utc>) -> Self {
        DbReadingEvent {
            id: Uuid::new_v4().to_string(),
            user_book_id: user_book_id.to_string(),
            event_type,
            event_date,
            created_at: Utc::now(),
        }
    }
}

impl DbReview {
    pub fn new(user_id: &str, book_id: &str, text: &str, rating: f64, visibility: Visibility) -> Self {
        DbReview {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            book_id: book_id.to_string(),
            text: text.to_string(),
            rating,
            visibility,
            created_at: Utc::now(),
        }
    }
}

impl DbUserMessage {
    pub fn new(user_id: &str, message: &str, link: Option<&str>, category: MessageCategory) -> Self {
        DbUserMessage {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            message: message.to_string(),
            link: link.map(|l| l.to_string()),
            category,
            created_at: Utc::now(),
        }
    }
}
