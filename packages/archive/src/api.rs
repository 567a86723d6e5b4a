//! Remote API access.
//!
//! The pipeline only ever talks to the archive through [`ArchiveApi`].
//! [`HttpArchiveApi`] implements it over `reqwest`: one attempt per call,
//! bounded by the per-call timeout the caller passes in. Failed pages and
//! batches are handled (and not retried) by the pagination and join
//! stages, so no retry loop lives here.

use std::time::Duration;

use async_trait::async_trait;

use crate::query::SearchQuery;
use crate::{ArchiveConfig, ArchiveError};

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Read-only access to the archive's search and vocabulary endpoints.
#[async_trait]
pub trait ArchiveApi: Send + Sync {
    /// Runs one search request and returns the decoded JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] if the request fails, times out, returns a
    /// non-success status, or the body is not JSON.
    async fn search(
        &self,
        query: &SearchQuery,
        timeout: Duration,
    ) -> Result<serde_json::Value, ArchiveError>;

    /// Downloads the code → label vocabulary document.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] if the request fails, times out, returns a
    /// non-success status, or the body is not JSON.
    async fn vocabulary(&self, timeout: Duration) -> Result<serde_json::Value, ArchiveError>;
}

/// [`ArchiveApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpArchiveApi {
    client: reqwest::Client,
    search_url: String,
    vocabulary_url: String,
}

impl HttpArchiveApi {
    /// Creates a client for the endpoints in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &ArchiveConfig) -> Result<Self, ArchiveError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("amcr/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(client, config))
    }

    /// Creates an API handle sharing an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &ArchiveConfig) -> Self {
        Self {
            client,
            search_url: config.search_url.clone(),
            vocabulary_url: config.vocabulary_url.clone(),
        }
    }
}

#[async_trait]
impl ArchiveApi for HttpArchiveApi {
    async fn search(
        &self,
        query: &SearchQuery,
        timeout: Duration,
    ) -> Result<serde_json::Value, ArchiveError> {
        let request = self
            .client
            .get(&self.search_url)
            .query(query.pairs())
            .timeout(timeout);
        send_json(request).await
    }

    async fn vocabulary(&self, timeout: Duration) -> Result<serde_json::Value, ArchiveError> {
        let request = self.client.get(&self.vocabulary_url).timeout(timeout);
        send_json(request).await
    }
}

/// Sends a request and parses the response body as JSON.
///
/// Non-success statuses become [`ArchiveError::Status`]. When the body is
/// not valid JSON, a preview of it is logged before the error is
/// returned.
async fn send_json(request: reqwest::RequestBuilder) -> Result<serde_json::Value, ArchiveError> {
    let response = request.send().await?;

    let url = response.url().to_string();
    let status = response.status();
    log::debug!("GET {url} -> {status}");

    if !status.is_success() {
        return Err(ArchiveError::Status {
            status: status.as_u16(),
            url,
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|json_err| {
        log::warn!(
            "JSON parse failed\n  \
             url: {url}\n  \
             status: {status}\n  \
             content-type: {content_type:?}\n  \
             received: {} bytes\n  \
             parse error: {json_err}\n  \
             body preview: {}",
            text.len(),
            preview(&text),
        );
        ArchiveError::Json(json_err)
    })
}

/// Truncates `text` to [`BODY_PREVIEW_LEN`] bytes on a char boundary.
fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
