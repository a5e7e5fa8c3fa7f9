use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::{
    Database, DbAuthor, DbBook, DbReadingEvent, DbReview, DbSeries, DbTag, DbUserBook,
    ReadingEventType, Visibility,
};

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// An incoming candidate for a catalog entry, assembled from parsed import
/// data and (optionally) fetched metadata. This is what the import pipeline
/// hands to the catalog; it never touches book rows directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookCandidate {
    pub title: String,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub summary: Option<String>,
    pub publisher: Option<String>,
    pub page_count: Option<i32>,
    pub published_date: Option<String>,
    pub language: Option<String>,
    pub image: Option<String>,
    pub google_id: Option<String>,
    pub amazon_id: Option<String>,
    pub goodreads_id: Option<String>,
    pub librarything_id: Option<String>,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub series: Vec<SeriesOrder>,
}

/// A series membership with an optional position in the series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesOrder {
    pub name: String,
    pub number: Option<f64>,
}

/// A catalog book with its collections loaded, as returned by ISBN lookup
#[derive(Debug, Clone)]
pub struct CatalogBook {
    pub book: DbBook,
    pub authors: Vec<DbAuthor>,
    pub tags: Vec<DbTag>,
    pub series: Vec<(DbSeries, Option<f64>)>,
}

/// The catalog collaborator: opaque CRUD over books, per-user associations,
/// reading events and reviews, plus lookup by ISBN.
///
/// Collection attachment (authors/tags/series) deduplicates by
/// case-insensitive name and is idempotent, which is what makes repeated
/// imports of the same file additive instead of destructive.
#[derive(Debug, Clone)]
pub struct LibraryManager {
    database: Database,
}

impl LibraryManager {
    pub fn new(database: Database) -> Self {
        LibraryManager { database }
    }

    /// Look up a book by either ISBN, with collections loaded
    pub async fn find_book_by_isbn(
        &self,
        isbn10: Option<&str>,
        isbn13: Option<&str>,
    ) -> Result<Option<CatalogBook>, LibraryError> {
        let book = match self.database.get_book_by_isbn(isbn10, isbn13).await? {
            Some(book) => book,
            None => return Ok(None),
        };
        let authors = self.database.get_authors_for_book(&book.id).await?;
        let tags = self.database.get_tags_for_book(&book.id).await?;
        let series = self.database.get_series_for_book(&book.id).await?;
        Ok(Some(CatalogBook {
            book,
            authors,
            tags,
            series,
        }))
    }

    /// Create a new catalog entry from a candidate
    pub async fn create_book(&self, candidate: &BookCandidate) -> Result<DbBook, LibraryError> {
        let now = Utc::now();
        let book = DbBook {
            id: Uuid::new_v4().to_string(),
            title: candidate.title.clone(),
            isbn10: candidate.isbn10.clone(),
            isbn13: candidate.isbn13.clone(),
            summary: candidate.summary.clone(),
            publisher: candidate.publisher.clone(),
            page_count: candidate.page_count,
            published_date: candidate.published_date.clone(),
            language: candidate.language.clone(),
            image: candidate.image.clone(),
            google_id: candidate.google_id.clone(),
            amazon_id: candidate.amazon_id.clone(),
            goodreads_id: candidate.goodreads_id.clone(),
            librarything_id: candidate.librarything_id.clone(),
            created_at: now,
            updated_at: now,
        };
        self.database.insert_book(&book).await?;
        self.attach_collections(&book.id, candidate).await?;
        Ok(book)
    }

    /// Update an existing catalog entry from a (merged) candidate.
    /// Collections in the candidate are attached on top of what the book
    /// already has; nothing is ever detached.
    pub async fn update_book(
        &self,
        existing: &DbBook,
        candidate: &BookCandidate,
    ) -> Result<(), LibraryError> {
        let book = DbBook {
            id: existing.id.clone(),
            title: candidate.title.clone(),
            isbn10: candidate.isbn10.clone(),
            isbn13: candidate.isbn13.clone(),
            summary: candidate.summary.clone(),
            publisher: candidate.publisher.clone(),
            page_count: candidate.page_count,
            published_date: candidate.published_date.clone(),
            language: candidate.language.clone(),
            image: candidate.image.clone(),
            google_id: candidate.google_id.clone(),
            amazon_id: candidate.amazon_id.clone(),
            goodreads_id: candidate.goodreads_id.clone(),
            librarything_id: candidate.librarything_id.clone(),
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };
        self.database.update_book(&book).await?;
        self.attach_collections(&existing.id, candidate).await?;
        Ok(())
    }

    async fn attach_collections(
        &self,
        book_id: &str,
        candidate: &BookCandidate,
    ) -> Result<(), LibraryError> {
        for name in &candidate.authors {
            let author = self.find_or_create_author(name).await?;
            self.database.link_book_author(book_id, &author.id).await?;
        }
        for name in &candidate.tags {
            let tag = self.find_or_create_tag(name).await?;
            self.database.link_book_tag(book_id, &tag.id).await?;
        }
        for series_order in &candidate.series {
            let series = self.find_or_create_series(&series_order.name).await?;
            self.database
                .link_book_series(book_id, &series.id, series_order.number)
                .await?;
        }
        Ok(())
    }

    async fn find_or_create_author(&self, name: &str) -> Result<DbAuthor, LibraryError> {
        if let Some(author) = self.database.find_author_by_name(name).await? {
            return Ok(author);
        }
        let author = DbAuthor::new(name);
        self.database.insert_author(&author).await?;
        Ok(author)
    }

    async fn find_or_create_tag(&self, name: &str) -> Result<DbTag, LibraryError> {
        if let Some(tag) = self.database.find_tag_by_name(name).await? {
            return Ok(tag);
        }
        let tag = DbTag::new(name);
        self.database.insert_tag(&tag).await?;
        Ok(tag)
    }

    async fn find_or_create_series(&self, name: &str) -> Result<DbSeries, LibraryError> {
        if let Some(series) = self.database.find_series_by_name(name).await? {
            return Ok(series);
        }
        let series = DbSeries::new(name);
        self.database.insert_series(&series).await?;
        Ok(series)
    }

    /// Get a user's association with a book, if any
    pub async fn find_user_book(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> Result<Option<DbUserBook>, LibraryError> {
        Ok(self.database.get_user_book(user_id, book_id).await?)
    }

    /// Create a per-user association
    pub async fn create_user_book(&self, user_book: &DbUserBook) -> Result<(), LibraryError> {
        self.database.insert_user_book(user_book).await?;
        Ok(())
    }

    /// Update the user-curated fields of an association
    pub async fn update_user_book(&self, user_book: &DbUserBook) -> Result<(), LibraryError> {
        self.database.update_user_book(user_book).await?;
        Ok(())
    }

    /// Get all reading events for an association, oldest first
    pub async fn reading_events(
        &self,
        user_book_id: &str,
    ) -> Result<Vec<DbReadingEvent>, LibraryError> {
        Ok(self.database.get_reading_events(user_book_id).await?)
    }

    /// Record a reading event on an association
    pub async fn add_reading_event(
        &self,
        user_book_id: &str,
        event_type: ReadingEventType,
        event_date: DateTime<Utc>,
    ) -> Result<DbReadingEvent, LibraryError> {
        let event = DbReadingEvent::new(user_book_id, event_type, event_date);
        self.database.insert_reading_event(&event).await?;
        Ok(event)
    }

    /// Get a user's review of a book, if any
    pub async fn find_review(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> Result<Option<DbReview>, LibraryError> {
        Ok(self.database.get_review(user_id, book_id).await?)
    }

    /// Create a review
    pub async fn add_review(
        &self,
        user_id: &str,
        book_id: &str,
        text: &str,
        rating: f64,
        visibility: Visibility,
    ) -> Result<DbReview, LibraryError> {
        let review = DbReview::new(user_id, book_id, text, rating, visibility);
        self.database.insert_review(&review).await?;
        Ok(review)
    }
}
