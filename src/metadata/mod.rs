pub mod openlibrary;

use async_trait::async_trait;
use thiserror::Error;

pub use openlibrary::OpenLibraryProvider;

/// What the import pipeline asks a metadata backend for. ISBN-13 is
/// preferred upstream; title/authors are hints some backends can use.
#[derive(Debug, Clone, Default)]
pub struct MetadataRequest {
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub fetch_cover: bool,
}

/// Bibliographic data returned by a metadata backend. Everything is
/// optional; the import pipeline prefers locally-parsed values anyway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub series: Option<String>,
    pub number_in_series: Option<f64>,
    pub summary: Option<String>,
    pub publisher: Option<String>,
    pub page_count: Option<i32>,
    pub published_date: Option<String>,
    pub language: Option<String>,
    pub image: Option<String>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub google_id: Option<String>,
    pub amazon_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Metadata API error: {0}")]
    Api(String),
    #[error("No metadata found for ISBN: {0}")]
    NotFound(String),
}

/// A bibliographic lookup backend. May be unavailable or disabled; the
/// import worker treats every failure here as non-fatal and falls back to
/// locally-parsed data.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch(&self, request: &MetadataRequest) -> Result<FetchedMetadata, MetadataError>;
}
