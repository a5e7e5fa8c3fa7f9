use crate::db::DbImportRecord;
use crate::import::types::push_unique;
use crate::library::{BookCandidate, CatalogBook, SeriesOrder};
use crate::metadata::FetchedMetadata;

/// Assemble a catalog candidate from a queued record and whatever metadata
/// was fetched for it. Locally-parsed values win over fetched ones for the
/// fields both carry; summary, language, cover image and external ids only
/// ever come from metadata.
pub fn build_candidate(record: &DbImportRecord, metadata: &FetchedMetadata) -> BookCandidate {
    let mut authors: Vec<String> = Vec::new();
    for name in &metadata.authors {
        let name = name.trim();
        if !name.is_empty() {
            push_unique(&mut authors, name);
        }
    }
    if let Some(raw) = &record.authors {
        for name in raw.split(',') {
            let name = name.trim();
            if !name.is_empty() {
                push_unique(&mut authors, name);
            }
        }
    }

    let series = metadata
        .series
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .map(|name| SeriesOrder {
            name: name.to_string(),
            number: metadata.number_in_series,
        })
        .into_iter()
        .collect();

    BookCandidate {
        title: prefer(record.title.as_deref(), metadata.title.as_deref()).unwrap_or_default(),
        isbn10: prefer(record.isbn10.as_deref(), metadata.isbn10.as_deref()),
        isbn13: prefer(record.isbn13.as_deref(), metadata.isbn13.as_deref()),
        summary: metadata.summary.clone(),
        publisher: prefer(record.publisher.as_deref(), metadata.publisher.as_deref()),
        page_count: record.page_count.or(metadata.page_count),
        published_date: prefer(
            record.published_date.as_deref(),
            metadata.published_date.as_deref(),
        ),
        language: metadata.language.clone(),
        image: metadata.image.clone(),
        google_id: metadata.google_id.clone(),
        amazon_id: metadata.amazon_id.clone(),
        goodreads_id: record.goodreads_id.clone(),
        librarything_id: record.librarything_id.clone(),
        authors,
        // tags are shelf-filtered by the worker before this candidate is used
        tags: Vec::new(),
        series,
    }
}

/// Merge an incoming candidate into an existing catalog entry. Scalars keep
/// the existing value wherever one is present and only fill gaps from the
/// incoming side. Collections carry additions only; the result's author/tag/
/// series lists hold exactly the names the existing entry is missing, so
/// attaching them on top is additive.
pub fn merge(incoming: &BookCandidate, existing: &CatalogBook) -> BookCandidate {
    let book = &existing.book;

    let mut authors = Vec::new();
    for name in &incoming.authors {
        if !existing
            .authors
            .iter()
            .any(|a| a.name.eq_ignore_ascii_case(name))
        {
            push_unique(&mut authors, name);
        }
    }

    let mut tags = Vec::new();
    for name in &incoming.tags {
        if !existing.tags.iter().any(|t| t.name.eq_ignore_ascii_case(name)) {
            push_unique(&mut tags, name);
        }
    }

    let series = incoming
        .series
        .iter()
        .filter(|order| {
            !existing
                .series
                .iter()
                .any(|(s, _)| s.name.eq_ignore_ascii_case(&order.name))
        })
        .cloned()
        .collect();

    BookCandidate {
        title: if book.title.trim().is_empty() {
            incoming.title.clone()
        } else {
            book.title.clone()
        },
        isbn10: keep(&book.isbn10, &incoming.isbn10),
        isbn13: keep(&book.isbn13, &incoming.isbn13),
        summary: keep(&book.summary, &incoming.summary),
        publisher: keep(&book.publisher, &incoming.publisher),
        page_count: book.page_count.or(incoming.page_count),
        published_date: keep(&book.published_date, &incoming.published_date),
        language: keep(&book.language, &incoming.language),
        image: keep(&book.image, &incoming.image),
        google_id: keep(&book.google_id, &incoming.google_id),
        amazon_id: keep(&book.amazon_id, &incoming.amazon_id),
        goodreads_id: keep(&book.goodreads_id, &incoming.goodreads_id),
        librarything_id: keep(&book.librarything_id, &incoming.librarything_id),
        authors,
        tags,
        series,
    }
}

fn prefer(local: Option<&str>, fetched: Option<&str>) -> Option<String> {
    first_non_blank(local).or_else(|| first_non_blank(fetched))
}

fn keep(existing: &Option<String>, incoming: &Option<String>) -> Option<String> {
    first_non_blank(existing.as_deref()).or_else(|| first_non_blank(incoming.as_deref()))
}

fn first_non_blank(value: Option<&str>) -> Option<String> {
    value
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbAuthor, DbBook, DbTag, ImportSource, ImportStatus};
    use chrono::Utc;

    fn record_with(
        title: Option<&str>,
        authors: Option<&str>,
        publisher: Option<&str>,
    ) -> DbImportRecord {
        let now = Utc::now();
        DbImportRecord {
            id: "r1".to_string(),
            user_id: "u1".to_string(),
            source: ImportSource::Goodreads,
            status: ImportStatus::Processing,
            title: title.map(|s| s.to_string()),
            authors: authors.map(|s| s.to_string()),
            isbn10: None,
            isbn13: Some("9780441013593".to_string()),
            publisher: publisher.map(|s| s.to_string()),
            page_count: Some(535),
            published_date: None,
            read_dates: None,
            tags: None,
            personal_notes: None,
            read_count: None,
            fetch_metadata: false,
            owned: None,
            rating: None,
            review: None,
            goodreads_id: Some("44767458".to_string()),
            librarything_id: None,
            created_at: now,
            modified_at: now,
        }
    }

    fn existing_book() -> CatalogBook {
        let mut book = DbBook::new_test("Dune");
        book.isbn13 = Some("9780441013593".to_string());
        book.image = Some("covers/dune.jpg".to_string());
        CatalogBook {
            book,
            authors: vec![DbAuthor::new("Frank Herbert")],
            tags: vec![DbTag::new("sci-fi")],
            series: vec![],
        }
    }

    #[test]
    fn local_values_win_over_fetched() {
        let record = record_with(Some("Dune"), Some("Frank Herbert"), Some("Ace Books"));
        let metadata = FetchedMetadata {
            title: Some("Dune (Open Library)".to_string()),
            publisher: Some("Chilton Books".to_string()),
            summary: Some("Desert planet.".to_string()),
            ..Default::default()
        };
        let candidate = build_candidate(&record, &metadata);
        assert_eq!(candidate.title, "Dune");
        assert_eq!(candidate.publisher.as_deref(), Some("Ace Books"));
        // summary only ever comes from metadata
        assert_eq!(candidate.summary.as_deref(), Some("Desert planet."));
    }

    #[test]
    fn fetched_values_fill_local_gaps() {
        let record = record_with(None, Some("Frank Herbert"), None);
        let metadata = FetchedMetadata {
            title: Some("Dune".to_string()),
            publisher: Some("Chilton Books".to_string()),
            ..Default::default()
        };
        let candidate = build_candidate(&record, &metadata);
        assert_eq!(candidate.title, "Dune");
        assert_eq!(candidate.publisher.as_deref(), Some("Chilton Books"));
    }

    #[test]
    fn author_lists_union_without_duplicates() {
        let record = record_with(Some("Dune"), Some("Frank Herbert,Brian Herbert"), None);
        let metadata = FetchedMetadata {
            authors: vec!["Frank Herbert".to_string()],
            ..Default::default()
        };
        let candidate = build_candidate(&record, &metadata);
        assert_eq!(candidate.authors, vec!["Frank Herbert", "Brian Herbert"]);
    }

    #[test]
    fn merge_keeps_existing_scalars_and_fills_gaps() {
        let incoming = BookCandidate {
            title: "Dune: 40th Anniversary".to_string(),
            isbn13: Some("9999999999999".to_string()),
            publisher: Some("Ace Books".to_string()),
            ..Default::default()
        };
        let merged = merge(&incoming, &existing_book());
        assert_eq!(merged.title, "Dune");
        assert_eq!(merged.isbn13.as_deref(), Some("9780441013593"));
        // publisher was a gap on the existing entry
        assert_eq!(merged.publisher.as_deref(), Some("Ace Books"));
    }

    #[test]
    fn merge_never_replaces_an_existing_cover() {
        let incoming = BookCandidate {
            title: "Dune".to_string(),
            image: Some("https://example.com/other.jpg".to_string()),
            ..Default::default()
        };
        let merged = merge(&incoming, &existing_book());
        assert_eq!(merged.image.as_deref(), Some("covers/dune.jpg"));
    }

    #[test]
    fn merge_collections_carry_additions_only() {
        let incoming = BookCandidate {
            title: "Dune".to_string(),
            authors: vec!["frank herbert".to_string(), "Brian Herbert".to_string()],
            tags: vec!["Sci-Fi".to_string(), "classics".to_string()],
            ..Default::default()
        };
        let merged = merge(&incoming, &existing_book());
        assert_eq!(merged.authors, vec!["Brian Herbert"]);
        assert_eq!(merged.tags, vec!["classics"]);
    }
}
