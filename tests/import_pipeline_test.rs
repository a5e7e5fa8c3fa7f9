mod support;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shelfmark::db::{
    Database, ImportSource, ImportStatus, MessageCategory, ReadingEventType,
};
use shelfmark::import::{ImportConfig, ImportStore, ParsedRow};
use shelfmark::library::{BookCandidate, LibraryManager};
use shelfmark::metadata::FetchedMetadata;

use support::{
    test_database, test_worker, tracing_init, FailingMetadataProvider, MockMetadataProvider,
};

const USER: &str = "user-1";

fn goodreads_config() -> ImportConfig {
    ImportConfig {
        source: ImportSource::Goodreads,
        fetch_metadata: false,
        fetch_covers: false,
    }
}

fn write_goodreads_csv(dir: &Path, name: &str, rows: &[Vec<&str>]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer
        .write_record([
            "Book Id", "Title", "Author", "Author l-f", "Additional Authors", "ISBN", "ISBN13",
            "My Rating", "Average Rating", "Publisher", "Binding", "Number of Pages",
            "Year Published", "Original Publication Year", "Date Read", "Date Added",
            "Bookshelves", "Bookshelves with positions", "Exclusive Shelf", "My Review",
            "Spoiler", "Private Notes", "Read Count", "Owned Copies",
        ])
        .unwrap();
    for row in rows {
        writer.write_record(row).unwrap();
    }
    writer.flush().unwrap();
    path
}

fn dune_row() -> Vec<&'static str> {
    vec![
        "44767458",
        "Dune",
        "Frank Herbert",
        "Herbert, Frank",
        "",
        "=\"0441013597\"",
        "=\"9780441013593\"",
        "5",
        "4.25",
        "Ace Books",
        "Paperback",
        "535",
        "1990",
        "1965",
        "2021/06/01",
        "2021/05/12",
        "sci-fi, favorites",
        "read (#1)",
        "read",
        "A masterpiece.",
        "",
        "lent to Ana",
        "1",
        "1",
    ]
}

async fn run_import(
    database: &Database,
    file: &Path,
    config: &ImportConfig,
) -> shelfmark::import::ImportSummary {
    let worker = test_worker(database.clone(), None);
    let handle = worker.start_import(file, USER, config).await.unwrap();
    handle.join().await.unwrap()
}

#[tokio::test]
async fn goodreads_row_becomes_book_history_and_review() {
    tracing_init();
    let dir = tempfile::tempdir().unwrap();
    let database = test_database(dir.path()).await;
    let file = write_goodreads_csv(dir.path(), "export.csv", &[dune_row()]);

    let summary = run_import(&database, &file, &goodreads_config()).await;
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.failed, 0);

    let book = database
        .get_book_by_isbn(None, Some("9780441013593"))
        .await
        .unwrap()
        .expect("book should exist");
    assert_eq!(book.title, "Dune");
    assert_eq!(book.isbn10.as_deref(), Some("0441013597"));
    assert_eq!(book.publisher.as_deref(), Some("Ace Books"));
    assert_eq!(book.page_count, Some(535));

    let authors = database.get_authors_for_book(&book.id).await.unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].name, "Frank Herbert");

    // the read-status shelf never becomes a tag
    let tags = database.get_tags_for_book(&book.id).await.unwrap();
    let mut names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["favorites", "sci-fi"]);

    let user_book = database
        .get_user_book(USER, &book.id)
        .await
        .unwrap()
        .expect("association should exist");
    assert_eq!(user_book.personal_notes.as_deref(), Some("lent to Ana"));
    assert_eq!(user_book.owned, Some(true));
    assert_eq!(user_book.to_read, None);

    let events = database.get_reading_events(&user_book.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, ReadingEventType::Finished);
    assert_eq!(events[0].event_date.date_naive().to_string(), "2021-06-01");

    let review = database
        .get_review(USER, &book.id)
        .await
        .unwrap()
        .expect("review should exist");
    assert_eq!(review.text, "A masterpiece.");
    assert_eq!(review.rating, 10.0);

    // the source file is marked consumed
    assert!(!file.exists());
    assert!(dir.path().join("export.csv.imported").exists());
}

#[tokio::test]
async fn reimporting_the_same_export_is_additive_not_duplicating() {
    tracing_init();
    let dir = tempfile::tempdir().unwrap();
    let database = test_database(dir.path()).await;

    let file = write_goodreads_csv(dir.path(), "export.csv", &[dune_row()]);
    run_import(&database, &file, &goodreads_config()).await;

    // the first run renamed the file; write it again
    let file = write_goodreads_csv(dir.path(), "export.csv", &[dune_row()]);
    let summary = run_import(&database, &file, &goodreads_config()).await;
    assert_eq!(summary.imported, 1);

    let book = database
        .get_book_by_isbn(None, Some("9780441013593"))
        .await
        .unwrap()
        .unwrap();
    let authors = database.get_authors_for_book(&book.id).await.unwrap();
    assert_eq!(authors.len(), 1);
    let tags = database.get_tags_for_book(&book.id).await.unwrap();
    assert_eq!(tags.len(), 2);

    let user_book = database.get_user_book(USER, &book.id).await.unwrap().unwrap();
    // same calendar day: no second finished event
    let events = database.get_reading_events(&user_book.id).await.unwrap();
    assert_eq!(events.len(), 1);

    // the existing review is never overwritten
    let review = database.get_review(USER, &book.id).await.unwrap().unwrap();
    assert_eq!(review.text, "A masterpiece.");
}

#[tokio::test]
async fn duplicate_rows_in_one_file_produce_one_finished_event() {
    tracing_init();
    let dir = tempfile::tempdir().unwrap();
    let database = test_database(dir.path()).await;

    // same book finished on the same day, twice in one export
    let file = write_goodreads_csv(dir.path(), "export.csv", &[dune_row(), dune_row()]);
    let summary = run_import(&database, &file, &goodreads_config()).await;
    assert_eq!(summary.imported, 2);

    let book = database
        .get_book_by_isbn(None, Some("9780441013593"))
        .await
        .unwrap()
        .unwrap();
    let user_book = database.get_user_book(USER, &book.id).await.unwrap().unwrap();
    let events = database.get_reading_events(&user_book.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_date.date_naive().to_string(), "2021-06-01");
}

#[tokio::test]
async fn import_merges_into_an_existing_catalog_entry() {
    tracing_init();
    let dir = tempfile::tempdir().unwrap();
    let database = test_database(dir.path()).await;
    let library = LibraryManager::new(database.clone());

    // pre-existing entry with a gap (no publisher) and a curated title
    let candidate = BookCandidate {
        title: "Dune (Folio Society)".to_string(),
        isbn13: Some("9780441013593".to_string()),
        authors: vec!["Frank Herbert".to_string()],
        ..Default::default()
    };
    let existing = library.create_book(&candidate).await.unwrap();

    let file = write_goodreads_csv(dir.path(), "export.csv", &[dune_row()]);
    let summary = run_import(&database, &file, &goodreads_config()).await;
    assert_eq!(summary.imported, 1);

    let book = database.get_book_by_id(&existing.id).await.unwrap().unwrap();
    // curated title survives, the gap is filled
    assert_eq!(book.title, "Dune (Folio Society)");
    assert_eq!(book.publisher.as_deref(), Some("Ace Books"));
    assert_eq!(book.isbn10.as_deref(), Some("0441013597"));

    // still a single catalog entry for that ISBN
    let found = database
        .get_book_by_isbn(Some("0441013597"), Some("9780441013593"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, existing.id);
}

#[tokio::test]
async fn isbn_list_with_metadata_backend_imports_valid_lines() {
    tracing_init();
    let dir = tempfile::tempdir().unwrap();
    let database = test_database(dir.path()).await;

    let file = dir.path().join("isbns.txt");
    std::fs::write(&file, "9780441013593\nnot-an-isbn\n978-0-441-01359-3\n").unwrap();

    let metadata = MockMetadataProvider {
        response: FetchedMetadata {
            title: Some("Dune".to_string()),
            authors: vec!["Frank Herbert".to_string()],
            publisher: Some("Ace Books".to_string()),
            ..Default::default()
        },
    };
    let worker = test_worker(database.clone(), Some(Arc::new(metadata)));
    let config = ImportConfig {
        source: ImportSource::IsbnList,
        fetch_metadata: true,
        fetch_covers: false,
    };
    let handle = worker.start_import(&file, USER, &config).await.unwrap();
    let summary = handle.join().await.unwrap();

    // the invalid line never reached the queue; the two valid lines both
    // resolve to the same catalog entry
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.failed, 0);

    let book = database
        .get_book_by_isbn(None, Some("9780441013593"))
        .await
        .unwrap()
        .expect("book should exist");
    assert_eq!(book.title, "Dune");
    assert_eq!(book.publisher.as_deref(), Some("Ace Books"));
}

#[tokio::test]
async fn metadata_backend_failure_falls_back_to_local_data() {
    tracing_init();
    let dir = tempfile::tempdir().unwrap();
    let database = test_database(dir.path()).await;

    let file = write_goodreads_csv(dir.path(), "export.csv", &[dune_row()]);
    let worker = test_worker(database.clone(), Some(Arc::new(FailingMetadataProvider)));
    let config = ImportConfig {
        source: ImportSource::Goodreads,
        fetch_metadata: true,
        fetch_covers: false,
    };
    let handle = worker.start_import(&file, USER, &config).await.unwrap();
    let summary = handle.join().await.unwrap();
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.failed, 0);

    let book = database
        .get_book_by_isbn(None, Some("9780441013593"))
        .await
        .unwrap()
        .expect("book should exist from local data alone");
    assert_eq!(book.title, "Dune");
}

#[tokio::test]
async fn isbn_list_without_identity_marks_record_error_and_warns() {
    tracing_init();
    let dir = tempfile::tempdir().unwrap();
    let database = test_database(dir.path()).await;

    let file = dir.path().join("isbns.txt");
    std::fs::write(&file, "9780441013593\n").unwrap();

    // no metadata backend: nothing can supply a title or authors
    let config = ImportConfig {
        source: ImportSource::IsbnList,
        fetch_metadata: true,
        fetch_covers: false,
    };
    let summary = run_import(&database, &file, &config).await;
    assert_eq!(summary.imported, 0);
    assert_eq!(summary.failed, 1);

    let store = ImportStore::new(database.clone());
    assert_eq!(
        store.count_by_status(USER, ImportStatus::Error).await.unwrap(),
        1
    );

    let messages = database.get_user_messages(USER).await.unwrap();
    assert!(messages.iter().any(|m| {
        m.category == MessageCategory::Warning && m.message.contains("9780441013593")
    }));

    // clearing failed records is scoped to one owner and one status
    let mut other = ParsedRow::new(ImportSource::IsbnList);
    other.isbn13 = Some("9780441013593".to_string());
    store
        .save(&other, ImportStatus::Error, "user-2", false)
        .await
        .unwrap();

    let deleted = store.delete_by_status(USER, ImportStatus::Error).await.unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(
        store.count_by_status(USER, ImportStatus::Error).await.unwrap(),
        0
    );
    assert_eq!(
        store
            .count_by_status("user-2", ImportStatus::Error)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn stale_processing_records_are_requeued_and_drained() {
    tracing_init();
    let dir = tempfile::tempdir().unwrap();
    let database = test_database(dir.path()).await;
    let store = ImportStore::new(database.clone());

    // simulate a crash mid-run: a record left in Processing
    let mut row = ParsedRow::new(ImportSource::Goodreads);
    row.title = Some("Dune".to_string());
    row.authors = Some("Frank Herbert".to_string());
    row.isbn13 = Some("9780441013593".to_string());
    store
        .save(&row, ImportStatus::Processing, USER, false)
        .await
        .unwrap();

    // next run over an empty file still picks the stale record up
    let file = dir.path().join("empty.txt");
    std::fs::write(&file, "").unwrap();
    let config = ImportConfig {
        source: ImportSource::IsbnList,
        fetch_metadata: false,
        fetch_covers: false,
    };
    let summary = run_import(&database, &file, &config).await;
    assert_eq!(summary.imported, 1);

    // every record ends in a terminal status
    assert_eq!(
        store.count_by_status(USER, ImportStatus::Saved).await.unwrap(),
        0
    );
    assert_eq!(
        store
            .count_by_status(USER, ImportStatus::Processing)
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        store
            .count_by_status(USER, ImportStatus::Imported)
            .await
            .unwrap(),
        1
    );

    let book = database
        .get_book_by_isbn(None, Some("9780441013593"))
        .await
        .unwrap();
    assert!(book.is_some());
}

#[tokio::test]
async fn to_read_shelf_sets_flag_without_reading_events() {
    tracing_init();
    let dir = tempfile::tempdir().unwrap();
    let database = test_database(dir.path()).await;

    let mut row = dune_row();
    row[14] = ""; // Date Read
    row[16] = "sci-fi";
    row[18] = "to-read";
    row[19] = ""; // My Review
    row[7] = "0"; // My Rating
    row[22] = "0"; // Read Count
    let file = write_goodreads_csv(dir.path(), "export.csv", &[row]);
    let summary = run_import(&database, &file, &goodreads_config()).await;
    assert_eq!(summary.imported, 1);

    let book = database
        .get_book_by_isbn(None, Some("9780441013593"))
        .await
        .unwrap()
        .unwrap();
    let user_book = database.get_user_book(USER, &book.id).await.unwrap().unwrap();
    assert_eq!(user_book.to_read, Some(true));

    let events = database.get_reading_events(&user_book.id).await.unwrap();
    assert!(events.is_empty());

    let review = database.get_review(USER, &book.id).await.unwrap();
    assert!(review.is_none());
}

#[tokio::test]
async fn currently_reading_shelf_creates_one_initial_event() {
    tracing_init();
    let dir = tempfile::tempdir().unwrap();
    let database = test_database(dir.path()).await;

    let mut row = dune_row();
    row[14] = "";
    row[18] = "currently-reading";
    row[19] = "";
    row[7] = "0";
    row[22] = "0";
    let file = write_goodreads_csv(dir.path(), "export.csv", &[row.clone()]);
    run_import(&database, &file, &goodreads_config()).await;

    let book = database
        .get_book_by_isbn(None, Some("9780441013593"))
        .await
        .unwrap()
        .unwrap();
    let user_book = database.get_user_book(USER, &book.id).await.unwrap().unwrap();
    let events = database.get_reading_events(&user_book.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, ReadingEventType::CurrentlyReading);

    // a second import must not stack another in-progress event
    let file = write_goodreads_csv(dir.path(), "export.csv", &[row]);
    run_import(&database, &file, &goodreads_config()).await;
    let events = database.get_reading_events(&user_book.id).await.unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn read_count_beyond_dates_creates_synthetic_past_events() {
    tracing_init();
    let dir = tempfile::tempdir().unwrap();
    let database = test_database(dir.path()).await;

    let mut row = dune_row();
    row[22] = "3"; // Read Count, one dated read plus two undated re-reads
    let file = write_goodreads_csv(dir.path(), "export.csv", &[row]);
    run_import(&database, &file, &goodreads_config()).await;

    let book = database
        .get_book_by_isbn(None, Some("9780441013593"))
        .await
        .unwrap()
        .unwrap();
    let user_book = database.get_user_book(USER, &book.id).await.unwrap().unwrap();
    let events = database.get_reading_events(&user_book.id).await.unwrap();
    assert_eq!(events.len(), 3);
    let mut days: Vec<String> = events
        .iter()
        .map(|e| e.event_date.date_naive().to_string())
        .collect();
    days.sort();
    assert_eq!(days, vec!["1970-01-01", "1970-01-02", "2021-06-01"]);
}
