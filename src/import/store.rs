use chrono::Utc;
use uuid::Uuid;

use crate::db::{Database, DbImportRecord, ImportStatus};
use crate::import::types::ParsedRow;
use crate::import::ImportError;

/// How many records one drain-loop fetch returns
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Durable work queue of import records, queryable and updatable in bulk
/// by (status, owner). Every operation is scoped to one owner; there are
/// no cross-user queries.
#[derive(Debug, Clone)]
pub struct ImportStore {
    database: Database,
}

impl ImportStore {
    pub fn new(database: Database) -> Self {
        ImportStore { database }
    }

    /// Persist one parsed row as an import record
    pub async fn save(
        &self,
        row: &ParsedRow,
        status: ImportStatus,
        user_id: &str,
        fetch_metadata: bool,
    ) -> Result<DbImportRecord, ImportError> {
        let now = Utc::now();
        let record = DbImportRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            source: row.source,
            status,
            title: row.title.clone(),
            authors: row.authors.clone(),
            isbn10: row.isbn10.clone(),
            isbn13: row.isbn13.clone(),
            publisher: row.publisher.clone(),
            page_count: row.page_count,
            published_date: row.published_date.clone(),
            read_dates: row.read_dates.clone(),
            tags: if row.tags.is_empty() {
                None
            } else {
                Some(row.tags.join(","))
            },
            personal_notes: row.personal_notes.clone(),
            read_count: row.read_count,
            fetch_metadata,
            owned: row.owned,
            rating: row.rating,
            review: row.review.clone(),
            goodreads_id: row.goodreads_id.clone(),
            librarything_id: row.librarything_id.clone(),
            created_at: now,
            modified_at: now,
        };
        self.database.insert_import_record(&record).await?;
        Ok(record)
    }

    /// Fetch one bounded page of a user's records in the given status
    pub async fn find_by_status(
        &self,
        user_id: &str,
        status: ImportStatus,
    ) -> Result<Vec<DbImportRecord>, ImportError> {
        Ok(self
            .database
            .get_import_records_by_status(user_id, status, DEFAULT_PAGE_SIZE)
            .await?)
    }

    /// Count a user's records in the given status
    pub async fn count_by_status(
        &self,
        user_id: &str,
        status: ImportStatus,
    ) -> Result<i64, ImportError> {
        Ok(self.database.count_import_records(user_id, status).await?)
    }

    /// Bulk-transition all of a user's records from one status to another.
    /// Used for the crash-resume reset at the start of a run.
    pub async fn update_status_bulk(
        &self,
        user_id: &str,
        old_status: ImportStatus,
        new_status: ImportStatus,
    ) -> Result<u64, ImportError> {
        Ok(self
            .database
            .update_import_records_status(user_id, old_status, new_status)
            .await?)
    }

    /// Transition a single record by id
    pub async fn update_status(
        &self,
        record_id: &str,
        new_status: ImportStatus,
    ) -> Result<(), ImportError> {
        self.database
            .update_import_record_status(record_id, new_status)
            .await?;
        Ok(())
    }

    /// Delete all of a user's records in the given status
    pub async fn delete_by_status(
        &self,
        user_id: &str,
        status: ImportStatus,
    ) -> Result<u64, ImportError> {
        Ok(self.database.delete_import_records(user_id, status).await?)
    }
}
