use crate::db::ImportSource;

/// Caller-selected import configuration. The source is always explicit;
/// there is no format auto-detection.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub source: ImportSource,
    pub fetch_metadata: bool,
    pub fetch_covers: bool,
}

/// One parsed export row, before it is persisted as an import record.
/// Fields mirror what the exports carry; nothing is reconciled yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub source: ImportSource,
    pub goodreads_id: Option<String>,
    pub librarything_id: Option<String>,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub publisher: Option<String>,
    pub page_count: Option<i32>,
    pub published_date: Option<String>,
    pub read_dates: Option<String>,
    pub tags: Vec<String>,
    pub personal_notes: Option<String>,
    pub read_count: Option<i32>,
    pub owned: Option<bool>,
    pub review: Option<String>,
    pub rating: Option<i32>,
}

impl ParsedRow {
    pub fn new(source: ImportSource) -> Self {
        ParsedRow {
            source,
            goodreads_id: None,
            librarything_id: None,
            title: None,
            authors: None,
            isbn10: None,
            isbn13: None,
            publisher: None,
            page_count: None,
            published_date: None,
            read_dates: None,
            tags: Vec::new(),
            personal_notes: None,
            read_count: None,
            owned: None,
            review: None,
            rating: None,
        }
    }
}

pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

pub(crate) fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

pub(crate) fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|existing| existing == value) {
        values.push(value.to_string());
    }
}
