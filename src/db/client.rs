use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::db::models::*;

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Initialize database connection and create tables
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        // Use sqlite:// with ?mode=rwc to create if it doesn't exist
        let database_url = format!("sqlite://{}?mode=rwc", database_path);
        info!("Connecting to {}", database_url);
        let pool = SqlitePool::connect(&database_url).await?;

        let db = Database { pool };
        db.create_tables().await?;
        Ok(db)
    }

    /// Create all necessary tables
    async fn create_tables(&self) -> Result<(), sqlx::Error> {
        // Import queue. Rows are written once by the ingestor and drained by
        // the worker; only the status column ever changes afterwards.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS import_records (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                source TEXT NOT NULL,
                status TEXT NOT NULL,
                title TEXT,
                authors TEXT,
                isbn10 TEXT,
                isbn13 TEXT,
                publisher TEXT,
                page_count INTEGER,
                published_date TEXT,
                read_dates TEXT,
                tags TEXT,
                personal_notes TEXT,
                read_count INTEGER,
                fetch_metadata BOOLEAN NOT NULL DEFAULT FALSE,
                owned BOOLEAN,
                rating INTEGER,
                review TEXT,
                goodreads_id TEXT,
                librarything_id TEXT,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Books table (catalog entries)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                isbn10 TEXT,
                isbn13 TEXT,
                summary TEXT,
                publisher TEXT,
                page_count INTEGER,
                published_date TEXT,
                language TEXT,
                image TEXT,
                google_id TEXT,
                amazon_id TEXT,
                goodreads_id TEXT,
                librarything_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Authors, tags and series are shared across books and deduplicated
        // by case-insensitive name.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS authors (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL COLLATE NOCASE UNIQUE,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS book_authors (
                id TEXT PRIMARY KEY,
                book_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books (id) ON DELETE CASCADE,
                FOREIGN KEY (author_id) REFERENCES authors (id) ON DELETE CASCADE,
                UNIQUE(book_id, author_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tags (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL COLLATE NOCASE UNIQUE,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS book_tags (
                id TEXT PRIMARY KEY,
                book_id TEXT NOT NULL,
                tag_id TEXT NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books (id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags (id) ON DELETE CASCADE,
                UNIQUE(book_id, tag_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS series (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL COLLATE NOCASE UNIQUE,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS book_series (
                id TEXT PRIMARY KEY,
                book_id TEXT NOT NULL,
                series_id TEXT NOT NULL,
                number_in_series REAL,
                FOREIGN KEY (book_id) REFERENCES books (id) ON DELETE CASCADE,
                FOREIGN KEY (series_id) REFERENCES series (id) ON DELETE CASCADE,
                UNIQUE(book_id, series_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Per-user book associations
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_books (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                book_id TEXT NOT NULL,
                personal_notes TEXT,
                owned BOOLEAN,
                to_read BOOLEAN,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books (id) ON DELETE CASCADE,
                UNIQUE(user_id, book_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Reading history events belong to user-book associations
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reading_events (
                id TEXT PRIMARY KEY,
                user_book_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                event_date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_book_id) REFERENCES user_books (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                book_id TEXT NOT NULL,
                text TEXT NOT NULL,
                rating REAL NOT NULL,
                visibility TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_messages (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                message TEXT NOT NULL,
                link TEXT,
                category TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes for performance
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_import_records_user_status ON import_records (user_id, status)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_isbn10 ON books (isbn10)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_isbn13 ON books (isbn13)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_user_books_user_id ON user_books (user_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reading_events_user_book_id ON reading_events (user_book_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reviews_user_book ON reviews (user_id, book_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_user_messages_user_id ON user_messages (user_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ----- import queue -----

    /// Insert a new import record
    pub async fn insert_import_record(&self, record: &DbImportRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO import_records (
                id, user_id, source, status, title, authors, isbn10, isbn13,
                publisher, page_count, published_date, read_dates, tags,
                personal_notes, read_count, fetch_metadata, owned, rating,
                review, goodreads_id, librarything_id, created_at, modified_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.source.as_str())
        .bind(record.status.as_str())
        .bind(&record.title)
        .bind(&record.authors)
        .bind(&record.isbn10)
        .bind(&record.isbn13)
        .bind(&record.publisher)
        .bind(record.page_count)
        .bind(&record.published_date)
        .bind(&record.read_dates)
        .bind(&record.tags)
        .bind(&record.personal_notes)
        .bind(record.read_count)
        .bind(record.fetch_metadata)
        .bind(record.owned)
        .bind(record.rating)
        .bind(&record.review)
        .bind(&record.goodreads_id)
        .bind(&record.librarything_id)
        .bind(record.created_at.to_rfc3339())
        .bind(record.modified_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get one bounded page of import records in a given status for a user
    pub async fn get_import_records_by_status(
        &self,
        user_id: &str,
        status: ImportStatus,
        limit: i64,
    ) -> Result<Vec<DbImportRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM import_records WHERE user_id = ? AND status = ? ORDER BY created_at LIMIT ?",
        )
        .bind(user_id)
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_import_record).collect())
    }

    /// Count import records in a given status for a user
    pub async fn count_import_records(
        &self,
        user_id: &str,
        status: ImportStatus,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM import_records WHERE user_id = ? AND status = ?",
        )
        .bind(user_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("count"))
    }

    /// Bulk-transition all of a user's records from one status to another.
    /// Returns the number of rows changed.
    pub async fn update_import_records_status(
        &self,
        user_id: &str,
        old_status: ImportStatus,
        new_status: ImportStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE import_records SET status = ?, modified_at = ? WHERE user_id = ? AND status = ?",
        )
        .bind(new_status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .bind(old_status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Transition a single record by id
    pub async fn update_import_record_status(
        &self,
        record_id: &str,
        new_status: ImportStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE import_records SET status = ?, modified_at = ? WHERE id = ?")
            .bind(new_status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(record_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete all of a user's records in a given status. Returns the number
    /// of rows deleted.
    pub async fn delete_import_records(
        &self,
        user_id: &str,
        status: ImportStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM import_records WHERE user_id = ? AND status = ?")
            .bind(user_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // ----- books -----

    /// Insert a new book
    pub async fn insert_book(&self, book: &DbBook) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO books (
                id, title, isbn10, isbn13, summary, publisher, page_count,
                published_date, language, image, google_id, amazon_id,
                goodreads_id, librarything_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.isbn10)
        .bind(&book.isbn13)
        .bind(&book.summary)
        .bind(&book.publisher)
        .bind(book.page_count)
        .bind(&book.published_date)
        .bind(&book.language)
        .bind(&book.image)
        .bind(&book.google_id)
        .bind(&book.amazon_id)
        .bind(&book.goodreads_id)
        .bind(&book.librarything_id)
        .bind(book.created_at.to_rfc3339())
        .bind(book.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Update a book's scalar fields
    pub async fn update_book(&self, book: &DbBook) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE books SET
                title = ?, isbn10 = ?, isbn13 = ?, summary = ?, publisher = ?,
                page_count = ?, published_date = ?, language = ?, image = ?,
                google_id = ?, amazon_id = ?, goodreads_id = ?,
                librarything_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&book.title)
        .bind(&book.isbn10)
        .bind(&book.isbn13)
        .bind(&book.summary)
        .bind(&book.publisher)
        .bind(book.page_count)
        .bind(&book.published_date)
        .bind(&book.language)
        .bind(&book.image)
        .bind(&book.google_id)
        .bind(&book.amazon_id)
        .bind(&book.goodreads_id)
        .bind(&book.librarything_id)
        .bind(Utc::now().to_rfc3339())
        .bind(&book.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a book by id
    pub async fn get_book_by_id(&self, book_id: &str) -> Result<Option<DbBook>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM books WHERE id = ?")
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_book))
    }

    /// Find a book by either of its ISBNs
    pub async fn get_book_by_isbn(
        &self,
        isbn10: Option<&str>,
        isbn13: Option<&str>,
    ) -> Result<Option<DbBook>, sqlx::Error> {
        if isbn10.is_none() && isbn13.is_none() {
            return Ok(None);
        }

        let row = sqlx::query(
            r#"
            SELECT * FROM books
            WHERE (?1 IS NOT NULL AND isbn10 = ?1)
               OR (?2 IS NOT NULL AND isbn13 = ?2)
            LIMIT 1
            "#,
        )
        .bind(isbn10)
        .bind(isbn13)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_book))
    }

    // ----- authors -----

    /// Find an author by case-insensitive name (for deduplication)
    pub async fn find_author_by_name(&self, name: &str) -> Result<Option<DbAuthor>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM authors WHERE name = ? COLLATE NOCASE")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(|row| DbAuthor {
            id: row.get("id"),
            name: row.get("name"),
            created_at: parse_timestamp(row, "created_at"),
        }))
    }

    /// Insert a new author
    pub async fn insert_author(&self, author: &DbAuthor) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO authors (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&author.id)
            .bind(&author.name)
            .bind(author.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Attach an author to a book, idempotently
    pub async fn link_book_author(&self, book_id: &str, author_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO book_authors (id, book_id, author_id) VALUES (?, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(book_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Get authors for a book
    pub async fn get_authors_for_book(&self, book_id: &str) -> Result<Vec<DbAuthor>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT a.* FROM authors a
            JOIN book_authors ba ON ba.author_id = a.id
            WHERE ba.book_id = ?
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DbAuthor {
                id: row.get("id"),
                name: row.get("name"),
                created_at: parse_timestamp(row, "created_at"),
            })
            .collect())
    }

    // ----- tags -----

    /// Find a tag by case-insensitive name (for deduplication)
    pub async fn find_tag_by_name(&self, name: &str) -> Result<Option<DbTag>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM tags WHERE name = ? COLLATE NOCASE")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(|row| DbTag {
            id: row.get("id"),
            name: row.get("name"),
            created_at: parse_timestamp(row, "created_at"),
        }))
    }

    /// Insert a new tag
    pub async fn insert_tag(&self, tag: &DbTag) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO tags (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&tag.id)
            .bind(&tag.name)
            .bind(tag.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Attach a tag to a book, idempotently
    pub async fn link_book_tag(&self, book_id: &str, tag_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO book_tags (id, book_id, tag_id) VALUES (?, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(book_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Get tags for a book
    pub async fn get_tags_for_book(&self, book_id: &str) -> Result<Vec<DbTag>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT t.* FROM tags t
            JOIN book_tags bt ON bt.tag_id = t.id
            WHERE bt.book_id = ?
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DbTag {
                id: row.get("id"),
                name: row.get("name"),
                created_at: parse_timestamp(row, "created_at"),
            })
            .collect())
    }

    // ----- series -----

    /// Find a series by case-insensitive name (for deduplication)
    pub async fn find_series_by_name(&self, name: &str) -> Result<Option<DbSeries>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM series WHERE name = ? COLLATE NOCASE")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(|row| DbSeries {
            id: row.get("id"),
            name: row.get("name"),
            created_at: parse_timestamp(row, "created_at"),
        }))
    }

    /// Insert a new series
    pub async fn insert_series(&self, series: &DbSeries) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO series (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&series.id)
            .bind(&series.name)
            .bind(series.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Attach a series to a book, idempotently
    pub async fn link_book_series(
        &self,
        book_id: &str,
        series_id: &str,
        number_in_series: Option<f64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT OR IGNORE INTO book_series (id, book_id, series_id, number_in_series) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(book_id)
        .bind(series_id)
        .bind(number_in_series)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get series (with position in series) for a book
    pub async fn get_series_for_book(
        &self,
        book_id: &str,
    ) -> Result<Vec<(DbSeries, Option<f64>)>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT s.*, bs.number_in_series FROM series s
            JOIN book_series bs ON bs.series_id = s.id
            WHERE bs.book_id = ?
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                (
                    DbSeries {
                        id: row.get("id"),
                        name: row.get("name"),
                        created_at: parse_timestamp(row, "created_at"),
                    },
                    row.get("number_in_series"),
                )
            })
            .collect())
    }

    // ----- user books -----

    /// Insert a new user-book association
    pub async fn insert_user_book(&self, user_book: &DbUserBook) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_books (
                id, user_id, book_id, personal_notes, owned, to_read,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user_book.id)
        .bind(&user_book.user_id)
        .bind(&user_book.book_id)
        .bind(&user_book.personal_notes)
        .bind(user_book.owned)
        .bind(user_book.to_read)
        .bind(user_book.created_at.to_rfc3339())
        .bind(user_book.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Update the user-curated fields of an association
    pub async fn update_user_book(&self, user_book: &DbUserBook) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE user_books SET personal_notes = ?, owned = ?, to_read = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&user_book.personal_notes)
        .bind(user_book.owned)
        .bind(user_book.to_read)
        .bind(Utc::now().to_rfc3339())
        .bind(&user_book.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a user's association with a book, if any
    pub async fn get_user_book(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> Result<Option<DbUserBook>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM user_books WHERE user_id = ? AND book_id = ?")
            .bind(user_id)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_user_book))
    }

    // ----- reading events -----

    /// Insert a new reading event
    pub async fn insert_reading_event(&self, event: &DbReadingEvent) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO reading_events (id, user_book_id, event_type, event_date, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(&event.user_book_id)
        .bind(event.event_type.as_str())
        .bind(event.event_date.to_rfc3339())
        .bind(event.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get all reading events for an association, oldest first
    pub async fn get_reading_events(
        &self,
        user_book_id: &str,
    ) -> Result<Vec<DbReadingEvent>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM reading_events WHERE user_book_id = ? ORDER BY event_date",
        )
        .bind(user_book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DbReadingEvent {
                id: row.get("id"),
                user_book_id: row.get("user_book_id"),
                event_type: ReadingEventType::parse(&row.get::<String, _>("event_type")).unwrap(),
                event_date: parse_timestamp(row, "event_date"),
                created_at: parse_timestamp(row, "created_at"),
            })
            .collect())
    }

    // ----- reviews -----

    /// Insert a new review
    pub async fn insert_review(&self, review: &DbReview) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO reviews (id, user_id, book_id, text, rating, visibility, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&review.id)
        .bind(&review.user_id)
        .bind(&review.book_id)
        .bind(&review.text)
        .bind(review.rating)
        .bind(review.visibility.as_str())
        .bind(review.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a user's review of a book, if any
    pub async fn get_review(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> Result<Option<DbReview>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM reviews WHERE user_id = ? AND book_id = ? LIMIT 1")
            .bind(user_id)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(|row| DbReview {
            id: row.get("id"),
            user_id: row.get("user_id"),
            book_id: row.get("book_id"),
            text: row.get("text"),
            rating: row.get("rating"),
            visibility: Visibility::parse(&row.get::<String, _>("visibility")).unwrap(),
            created_at: parse_timestamp(row, "created_at"),
        }))
    }

    // ----- user messages -----

    /// Insert a user-visible notification message
    pub async fn insert_user_message(&self, message: &DbUserMessage) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_messages (id, user_id, message, link, category, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.user_id)
        .bind(&message.message)
        .bind(&message.link)
        .bind(message.category.as_str())
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get all messages for a user, oldest first
    pub async fn get_user_messages(&self, user_id: &str) -> Result<Vec<DbUserMessage>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM user_messages WHERE user_id = ? ORDER BY created_at")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| DbUserMessage {
                id: row.get("id"),
                user_id: row.get("user_id"),
                message: row.get("message"),
                link: row.get("link"),
                category: MessageCategory::parse(&row.get::<String, _>("category")).unwrap(),
                created_at: parse_timestamp(row, "created_at"),
            })
            .collect())
    }
}

// Row mapping helpers. Timestamps are stored as rfc3339 TEXT and written
// exclusively by this module, so parse failures indicate corruption.

fn parse_timestamp(row: &sqlx::sqlite::SqliteRow, column: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&row.get::<String, _>(column))
        .unwrap()
        .with_timezone(&Utc)
}

fn row_to_import_record(row: &sqlx::sqlite::SqliteRow) -> DbImportRecord {
    DbImportRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        source: ImportSource::parse(&row.get::<String, _>("source")).unwrap(),
        status: ImportStatus::parse(&row.get::<String, _>("status")).unwrap(),
        title: row.get("title"),
        authors: row.get("authors"),
        isbn10: row.get("isbn10"),
        isbn13: row.get("isbn13"),
        publisher: row.get("publisher"),
        page_count: row.get("page_count"),
        published_date: row.get("published_date"),
        read_dates: row.get("read_dates"),
        tags: row.get("tags"),
        personal_notes: row.get("personal_notes"),
        read_count: row.get("read_count"),
        fetch_metadata: row.get("fetch_metadata"),
        owned: row.get("owned"),
        rating: row.get("rating"),
        review: row.get("review"),
        goodreads_id: row.get("goodreads_id"),
        librarything_id: row.get("librarything_id"),
        created_at: parse_timestamp(row, "created_at"),
        modified_at: parse_timestamp(row, "modified_at"),
    }
}

fn row_to_book(row: &sqlx::sqlite::SqliteRow) -> DbBook {
    DbBook {
        id: row.get("id"),
        title: row.get("title"),
        isbn10: row.get("isbn10"),
        isbn13: row.get("isbn13"),
        summary: row.get("summary"),
        publisher: row.get("publisher"),
        page_count: row.get("page_count"),
        published_date: row.get("published_date"),
        language: row.get("language"),
        image: row.get("image"),
        google_id: row.get("google_id"),
        amazon_id: row.get("amazon_id"),
        goodreads_id: row.get("goodreads_id"),
        librarything_id: row.get("librarything_id"),
        created_at: parse_timestamp(row, "created_at"),
        updated_at: parse_timestamp(row, "updated_at"),
    }
}

fn row_to_user_book(row: &sqlx::sqlite::SqliteRow) -> DbUserBook {
    DbUserBook {
        id: row.get("id"),
        user_id: row.get("user_id"),
        book_id: row.get("book_id"),
        personal_notes: row.get("personal_notes"),
        owned: row.get("owned"),
        to_read: row.get("to_read"),
        created_at: parse_timestamp(row, "created_at"),
        updated_at: parse_timestamp(row, "updated_at"),
    }
}
