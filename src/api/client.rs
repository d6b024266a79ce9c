use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use super::types::{Article, ArticleRecord, WeeklyArticle, WeeklyArticleRecord};

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Errors that can occur while talking to the article backend.
///
/// Every variant is surfaced to the user as a retry prompt via
/// [`FetchError::user_message`]; none of them clear already-loaded articles.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Body was not the JSON envelope we expect
    #[error("Malformed response: {0}")]
    Malformed(String),
    /// Envelope arrived with `success: false`
    #[error("Server rejected request: {0}")]
    Rejected(String),
    /// Response body exceeded the 5MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    #[error("Article not found")]
    NotFound,
    #[error("Base URL cannot carry a path: {0}")]
    InvalidBaseUrl(String),
}

impl FetchError {
    /// Text for the retry prompt shown in place of (or above) the feed.
    pub fn user_message(&self) -> &'static str {
        match self {
            FetchError::Timeout => "Request timed out. Please check your internet connection.",
            FetchError::Network(_) | FetchError::IncompleteResponse { .. } => {
                "Network error. Please check your internet connection."
            }
            FetchError::HttpStatus(code) if *code >= 500 => "Server error. Please try again later.",
            FetchError::NotFound => "Article not found.",
            _ => "Failed to load articles.",
        }
    }

    /// Whether repeating the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_)
            | FetchError::Timeout
            | FetchError::IncompleteResponse { .. }
            | FetchError::Rejected(_) => true,
            FetchError::HttpStatus(code) => *code >= 500 || *code == 429 || *code == 408,
            FetchError::Malformed(_)
            | FetchError::ResponseTooLarge
            | FetchError::NotFound
            | FetchError::InvalidBaseUrl(_) => false,
        }
    }
}

/// Result of a feed fetch.
///
/// `skipped` counts records dropped at ingestion (no id, or not an object).
#[derive(Debug, Clone, Default)]
pub struct FetchedArticles {
    pub articles: Vec<Article>,
    pub skipped: usize,
}

/// The `{ success, data }` wrapper every endpoint responds with.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> Envelope<T> {
    /// Unwraps `data`, treating an absent or null payload as `None`.
    fn into_data(self) -> Result<Option<T>, FetchError> {
        if !self.success {
            let reason = self
                .error
                .or(self.message)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(FetchError::Rejected(reason));
        }
        Ok(self.data)
    }
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the article backend.
///
/// Cheap to clone: the underlying `reqwest::Client` is reference-counted.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base: Url, timeout: Duration) -> Self {
        Self {
            http,
            base,
            timeout,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Fetches the short-article feed, newest first as the backend orders it.
    pub async fn fetch_articles(&self) -> Result<FetchedArticles, FetchError> {
        let mut url = self.endpoint(&["api", "articles"])?;
        add_cache_buster(&mut url);

        let bytes = self.get_bytes(url).await?;
        let envelope: Envelope<Vec<serde_json::Value>> = parse_json(&bytes)?;
        let records = envelope.into_data()?.unwrap_or_default();

        let total = records.len();
        let articles: Vec<Article> = records
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<ArticleRecord>(value) {
                Ok(record) => record.into_article(),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unparseable article record");
                    None
                }
            })
            .collect();

        let skipped = total - articles.len();
        if skipped > 0 {
            tracing::warn!(skipped = skipped, total = total, "Article records skipped at ingestion");
        }
        tracing::info!(count = articles.len(), "Fetched articles");

        Ok(FetchedArticles { articles, skipped })
    }

    /// Fetches one article by id.
    pub async fn fetch_article(&self, id: &str) -> Result<Article, FetchError> {
        let url = self.endpoint(&["api", "articles", id])?;

        let bytes = match self.get_bytes(url).await {
            Err(FetchError::HttpStatus(404)) => return Err(FetchError::NotFound),
            other => other?,
        };
        let envelope: Envelope<ArticleRecord> = parse_json(&bytes)?;
        envelope
            .into_data()?
            .and_then(ArticleRecord::into_article)
            .ok_or(FetchError::NotFound)
    }

    /// Fetches the long-form weekly breakdowns.
    pub async fn fetch_weekly_articles(&self) -> Result<Vec<WeeklyArticle>, FetchError> {
        let mut url = self.endpoint(&["api", "weekly-articles"])?;
        add_cache_buster(&mut url);

        let bytes = self.get_bytes(url).await?;
        let envelope: Envelope<Vec<serde_json::Value>> = parse_json(&bytes)?;
        let weekly = envelope
            .into_data()?
            .unwrap_or_default()
            .into_iter()
            .filter_map(|value| {
                serde_json::from_value::<WeeklyArticleRecord>(value)
                    .ok()
                    .and_then(WeeklyArticleRecord::into_weekly)
            })
            .collect::<Vec<_>>();

        tracing::info!(count = weekly.len(), "Fetched weekly articles");
        Ok(weekly)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidBaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET with the whole exchange (headers and body) bounded by the timeout.
    async fn get_bytes(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let request = async {
            let response = self
                .http
                .get(url.clone())
                .header(reqwest::header::ACCEPT, "application/json")
                .header(reqwest::header::CACHE_CONTROL, "no-cache")
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }

            read_limited_bytes(response, MAX_RESPONSE_SIZE).await
        };

        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => {
                if let Err(e) = &result {
                    tracing::warn!(url = %url.path(), error = %e, "Backend request failed");
                }
                result
            }
            Err(_) => {
                tracing::warn!(
                    url = %url.path(),
                    timeout_secs = self.timeout.as_secs(),
                    "Backend request timed out"
                );
                Err(FetchError::Timeout)
            }
        }
    }
}

fn add_cache_buster(url: &mut Url) {
    let millis = chrono::Utc::now().timestamp_millis();
    url.query_pairs_mut().append_pair("t", &millis.to_string());
}

fn parse_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, FetchError> {
    serde_json::from_slice(bytes).map_err(|e| FetchError::Malformed(e.to_string()))
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
