use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::db::{ImportSource, ImportStatus};
use crate::import::store::ImportStore;
use crate::import::types::{non_blank, push_unique, ImportConfig, ParsedRow};
use crate::import::ImportError;
use crate::isbn;

/// Spreadsheet-literal prefix Goodreads wraps ISBN cells in, as in `="0441013597"`
pub const ISBN_PREFIX: &str = "=\"";

/// Parses an export file and persists every usable row as a Saved import
/// record. Ingestion is synchronous and sequential; the caller drains the
/// queue afterwards.
pub struct ImportIngestor {
    store: ImportStore,
}

impl ImportIngestor {
    pub fn new(store: ImportStore) -> Self {
        ImportIngestor { store }
    }

    /// Returns the number of records written to the queue
    pub async fn parse(
        &self,
        path: &Path,
        user_id: &str,
        config: &ImportConfig,
    ) -> Result<u64, ImportError> {
        match config.source {
            ImportSource::IsbnList => self.parse_isbn_list(path, user_id, config).await,
            _ => self.parse_csv(path, user_id, config).await,
        }
    }

    /// One ISBN per line, validated by checksum. Invalid lines are logged
    /// and skipped; they never reach the queue.
    async fn parse_isbn_list(
        &self,
        path: &Path,
        user_id: &str,
        config: &ImportConfig,
    ) -> Result<u64, ImportError> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let mut count = 0u64;
        for line in reader.lines() {
            let line = line?;
            let token = line.trim();
            if token.is_empty() {
                continue;
            }
            let mut row = ParsedRow::new(ImportSource::IsbnList);
            if isbn::is_valid_isbn13(token) {
                row.isbn13 = Some(isbn::normalize(token));
            } else if isbn::is_valid_isbn10(token) {
                row.isbn10 = Some(isbn::normalize(token));
            } else {
                info!("input line {} is not a valid ISBN, line is ignored", token);
                continue;
            }
            self.store
                .save(&row, ImportStatus::Saved, user_id, config.fetch_metadata)
                .await?;
            count += 1;
        }
        debug!("isbn list parsing finished, {} entries recorded", count);
        Ok(count)
    }

    async fn parse_csv(
        &self,
        path: &Path,
        user_id: &str,
        config: &ImportConfig,
    ) -> Result<u64, ImportError> {
        let file = std::fs::File::open(path)?;
        // header line is always skipped; exports disagree on its contents,
        // so columns are addressed by position
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);
        let mut count = 0u64;
        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    error!("failed to read line from {}: {}", path.display(), e);
                    continue;
                }
            };
            let Some(row) = parse_line(&record, config.source) else {
                continue;
            };
            // one bad row must not abort the whole file
            match self
                .store
                .save(&row, ImportStatus::Saved, user_id, config.fetch_metadata)
                .await
            {
                Ok(_) => count += 1,
                Err(e) => error!("failed to save parsed row {:?}: {}", row.title, e),
            }
        }
        debug!(
            "csv parsing of {} finished, {} entries recorded",
            path.display(),
            count
        );
        Ok(count)
    }
}

fn parse_line(record: &csv::StringRecord, source: ImportSource) -> Option<ParsedRow> {
    match source {
        ImportSource::Goodreads => parse_goodreads_line(record),
        ImportSource::Storygraph | ImportSource::Librarything => {
            warn!(
                "{} exports have no field mapping yet, storing a placeholder record",
                source.as_str()
            );
            Some(ParsedRow::new(source))
        }
        ImportSource::IsbnList => None,
    }
}

/// Goodreads CSV columns, by position:
/// 0 Book Id, 1 Title, 2 Author, 4 Additional Authors, 5 ISBN, 6 ISBN13,
/// 7 My Rating, 9 Publisher, 11 Number of Pages, 12 Year Published,
/// 14 Date Read, 16 Bookshelves, 18 Exclusive Shelf, 19 My Review,
/// 21 Private Notes, 22 Read Count, 23 or 25 Owned Copies depending on
/// export vintage.
fn parse_goodreads_line(record: &csv::StringRecord) -> Option<ParsedRow> {
    let isbn10 = parse_isbn(record.get(5).unwrap_or(""));
    let isbn13 = parse_isbn(record.get(6).unwrap_or(""));
    if isbn10.is_empty() && isbn13.is_empty() {
        debug!(
            "no isbn on row {:?}, row is ignored",
            record.get(1).unwrap_or("")
        );
        return None;
    }

    let mut row = ParsedRow::new(ImportSource::Goodreads);
    row.goodreads_id = non_blank(clean(record.get(0)));
    row.title = non_blank(clean(record.get(1)));
    row.isbn10 = non_blank(isbn10);
    row.isbn13 = non_blank(isbn13);

    let mut authors: Vec<String> = Vec::new();
    let author = clean(record.get(2));
    if !author.is_empty() {
        push_unique(&mut authors, &author);
    }
    for additional in clean(record.get(4)).split(',') {
        let additional = additional.trim();
        if !additional.is_empty() {
            push_unique(&mut authors, additional);
        }
    }
    if !authors.is_empty() {
        row.authors = Some(authors.join(","));
    }

    row.rating = parse_number(record.get(7));
    row.publisher = non_blank(clean(record.get(9)));
    row.page_count = parse_number(record.get(11));
    row.published_date = non_blank(clean(record.get(12)));
    row.read_dates = non_blank(clean(record.get(14)));

    for shelf in clean(record.get(16)).split(',') {
        let shelf = shelf.trim();
        if !shelf.is_empty() {
            push_unique(&mut row.tags, shelf);
        }
    }
    let exclusive = clean(record.get(18));
    if !exclusive.is_empty() {
        push_unique(&mut row.tags, &exclusive);
    }

    row.review = non_blank(clean(record.get(19)));
    row.personal_notes = non_blank(clean(record.get(21)));
    row.read_count = parse_number(record.get(22));

    // exports from before 2020 have more columns, with Owned Copies at 25
    let owned_copies = if record.len() > 24 && record.get(25).is_some() {
        parse_number(record.get(25))
    } else {
        parse_number(record.get(23))
    };
    if let Some(copies) = owned_copies {
        if copies > 0 {
            row.owned = Some(true);
        }
    }

    Some(row)
}

/// Unwraps Goodreads' spreadsheet-literal ISBN cells: strip the `="`
/// prefix, then drop the trailing quote. Cells without the prefix, and
/// cells too short to hold an ISBN, come back empty.
fn parse_isbn(input: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        return String::new();
    }
    let isbn = input.strip_prefix(ISBN_PREFIX).unwrap_or("");
    if isbn.chars().count() < 10 {
        return String::new();
    }
    // drop the last character, not the last byte; a mangled cell may end
    // mid multi-byte sequence
    let mut chars = isbn.chars();
    chars.next_back();
    chars.as_str().to_string()
}

fn clean(input: Option<&str>) -> String {
    input.unwrap_or("").trim().to_string()
}

fn parse_number(input: Option<&str>) -> Option<i32> {
    let raw = input.unwrap_or("").trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<i32>() {
        Ok(number) => Some(number),
        Err(e) => {
            warn!("failed to parse number from {}: {}", raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // a row in the modern 24-column layout
    fn goodreads_record(fields: Vec<&str>) -> csv::StringRecord {
        csv::StringRecord::from(fields)
    }

    fn modern_row() -> Vec<&'static str> {
        vec![
            "44767458",                // 0 Book Id
            "Dune",                    // 1 Title
            "Frank Herbert",           // 2 Author
            "Herbert, Frank",          // 3 Author l-f
            "Brian Herbert",           // 4 Additional Authors
            "=\"0441013597\"",         // 5 ISBN
            "=\"9780441013593\"",      // 6 ISBN13
            "5",                       // 7 My Rating
            "4.25",                    // 8 Average Rating
            "Ace Books",               // 9 Publisher
            "Paperback",               // 10 Binding
            "535",                     // 11 Number of Pages
            "1990",                    // 12 Year Published
            "1965",                    // 13 Original Publication Year
            "2021/06/01",              // 14 Date Read
            "2021/05/12",              // 15 Date Added
            "sci-fi, favorites",       // 16 Bookshelves
            "read (#1)",               // 17 Bookshelves with positions
            "read",                    // 18 Exclusive Shelf
            "A masterpiece.",          // 19 My Review
            "",                        // 20 Spoiler
            "lent to Ana",             // 21 Private Notes
            "2",                       // 22 Read Count
            "1",                       // 23 Owned Copies
        ]
    }

    #[test]
    fn unwraps_spreadsheet_literal_isbn() {
        assert_eq!(parse_isbn("=\"0441013597\""), "0441013597");
        assert_eq!(parse_isbn("=\"9780441013593\""), "9780441013593");
    }

    #[test]
    fn short_or_unwrapped_isbn_cells_come_back_empty() {
        assert_eq!(parse_isbn("=\"\""), "");
        assert_eq!(parse_isbn("=\"123\""), "");
        assert_eq!(parse_isbn("0441013597"), "");
        assert_eq!(parse_isbn(""), "");
        assert_eq!(parse_isbn("   "), "");
    }

    #[test]
    fn mangled_cell_ending_in_multibyte_character_does_not_panic() {
        // a truncated cell can end mid-text instead of with the closing quote
        assert_eq!(parse_isbn("=\"1234567890é"), "1234567890");
        assert_eq!(parse_isbn("=\"é234567890\""), "é234567890");
    }

    #[test]
    fn unparsable_numbers_become_none() {
        assert_eq!(parse_number(Some("535")), Some(535));
        assert_eq!(parse_number(Some(" 2 ")), Some(2));
        assert_eq!(parse_number(Some("five")), None);
        assert_eq!(parse_number(Some("")), None);
        assert_eq!(parse_number(None), None);
    }

    #[test]
    fn parses_modern_goodreads_row() {
        let row = parse_goodreads_line(&goodreads_record(modern_row())).unwrap();
        assert_eq!(row.goodreads_id.as_deref(), Some("44767458"));
        assert_eq!(row.title.as_deref(), Some("Dune"));
        assert_eq!(row.authors.as_deref(), Some("Frank Herbert,Brian Herbert"));
        assert_eq!(row.isbn10.as_deref(), Some("0441013597"));
        assert_eq!(row.isbn13.as_deref(), Some("9780441013593"));
        assert_eq!(row.rating, Some(5));
        assert_eq!(row.publisher.as_deref(), Some("Ace Books"));
        assert_eq!(row.page_count, Some(535));
        assert_eq!(row.published_date.as_deref(), Some("1990"));
        assert_eq!(row.read_dates.as_deref(), Some("2021/06/01"));
        assert_eq!(row.tags, vec!["sci-fi", "favorites", "read"]);
        assert_eq!(row.review.as_deref(), Some("A masterpiece."));
        assert_eq!(row.personal_notes.as_deref(), Some("lent to Ana"));
        assert_eq!(row.read_count, Some(2));
        assert_eq!(row.owned, Some(true));
    }

    #[test]
    fn rows_without_any_isbn_are_dropped() {
        let mut fields = modern_row();
        fields[5] = "=\"\"";
        fields[6] = "";
        assert!(parse_goodreads_line(&goodreads_record(fields)).is_none());
    }

    #[test]
    fn zero_owned_copies_leaves_ownership_unknown() {
        let mut fields = modern_row();
        fields[23] = "0";
        let row = parse_goodreads_line(&goodreads_record(fields)).unwrap();
        assert_eq!(row.owned, None);
    }

    #[test]
    fn old_vintage_export_reads_owned_copies_from_column_25() {
        let mut fields = modern_row();
        fields[23] = "0";
        fields.push("");  // 24
        fields.push("3"); // 25 Owned Copies in the old layout
        let row = parse_goodreads_line(&goodreads_record(fields)).unwrap();
        assert_eq!(row.owned, Some(true));
    }

    #[test]
    fn exclusive_shelf_joins_tags_once() {
        let mut fields = modern_row();
        fields[16] = "read, sci-fi";
        fields[18] = "read";
        let row = parse_goodreads_line(&goodreads_record(fields)).unwrap();
        assert_eq!(row.tags, vec!["read", "sci-fi"]);
    }
}
