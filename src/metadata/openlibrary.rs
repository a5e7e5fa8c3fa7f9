use async_trait::async_trait;
use tracing::{debug, warn};

use crate::metadata::{FetchedMetadata, MetadataError, MetadataProvider, MetadataRequest};

const USER_AGENT: &str = "shelfmark/0.1 (+https://github.com/shelfmark/shelfmark)";

/// Open Library bibliographic lookup (https://openlibrary.org)
///
/// Fetches the edition record for an ISBN and resolves author names with
/// follow-up requests. Author resolution failures are tolerated: an
/// edition with an unresolvable author list is still useful.
pub struct OpenLibraryProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OpenLibraryProvider {
    pub fn new(base_url: &str) -> Result<Self, MetadataError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MetadataError::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(OpenLibraryProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, MetadataError> {
        debug!("Open Library API request: {}", url);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| MetadataError::Api(format!("HTTP request failed: {}", e)))?;

        if response.status() == 404 {
            return Err(MetadataError::NotFound(url.to_string()));
        }
        if !response.status().is_success() {
            return Err(MetadataError::Api(format!(
                "Open Library returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MetadataError::Api(format!("Failed to parse JSON: {}", e)))
    }

    /// Resolve author names from `/authors/{key}.json` references
    async fn resolve_authors(&self, edition: &serde_json::Value) -> Vec<String> {
        let mut names = Vec::new();
        let Some(refs) = edition.get("authors").and_then(|a| a.as_array()) else {
            return names;
        };
        for author_ref in refs {
            let Some(key) = author_ref.get("key").and_then(|k| k.as_str()) else {
                continue;
            };
            let url = format!("{}{}.json", self.base_url, key);
            match self.get_json(&url).await {
                Ok(author) => {
                    if let Some(name) = author.get("name").and_then(|n| n.as_str()) {
                        names.push(name.to_string());
                    }
                }
                Err(e) => warn!("failed to resolve author {}: {}", key, e),
            }
        }
        names
    }
}

#[async_trait]
impl MetadataProvider for OpenLibraryProvider {
    async fn fetch(&self, request: &MetadataRequest) -> Result<FetchedMetadata, MetadataError> {
        let isbn = request
            .isbn
            .as_deref()
            .ok_or_else(|| MetadataError::Api("no ISBN in metadata request".to_string()))?;

        let url = format!("{}/isbn/{}.json", self.base_url, isbn);
        let edition = self.get_json(&url).await.map_err(|e| match e {
            MetadataError::NotFound(_) => MetadataError::NotFound(isbn.to_string()),
            other => other,
        })?;

        let mut metadata = FetchedMetadata {
            title: json_str(&edition, "title"),
            publisher: edition
                .get("publishers")
                .and_then(|p| p.as_array())
                .and_then(|p| p.first())
                .and_then(|p| p.as_str())
                .map(|s| s.to_string()),
            published_date: json_str(&edition, "publish_date"),
            page_count: edition
                .get("number_of_pages")
                .and_then(|n| n.as_i64())
                .map(|n| n as i32),
            ..Default::default()
        };

        metadata.authors = self.resolve_authors(&edition).await;

        if let Some(subjects) = edition.get("subjects").and_then(|s| s.as_array()) {
            metadata.tags = subjects
                .iter()
                .filter_map(|s| s.as_str())
                .map(|s| s.to_string())
                .collect();
        }

        // Language codes come as "/languages/eng" references
        metadata.language = edition
            .get("languages")
            .and_then(|l| l.as_array())
            .and_then(|l| l.first())
            .and_then(|l| l.get("key"))
            .and_then(|k| k.as_str())
            .and_then(|k| k.rsplit('/').next())
            .map(|code| code.to_string());

        metadata.isbn10 = first_string(&edition, "isbn_10");
        metadata.isbn13 = first_string(&edition, "isbn_13");

        if request.fetch_cover {
            metadata.image = edition
                .get("covers")
                .and_then(|c| c.as_array())
                .and_then(|c| c.first())
                .and_then(|c| c.as_i64())
                .map(|id| format!("https://covers.openlibrary.org/b/id/{}-L.jpg", id));
        }

        debug!(
            "Open Library metadata for {}: title={:?}, {} authors",
            isbn,
            metadata.title,
            metadata.authors.len()
        );
        Ok(metadata)
    }
}

fn json_str(value: &serde_json::Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn first_string(value: &serde_json::Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(|v| v.as_array())
        .and_then(|v| v.first())
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
