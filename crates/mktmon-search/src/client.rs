use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::SearchError;
use crate::retry::retry_with_backoff;
use crate::types::{ProviderErrorBody, SearchHit, SearchQuery, SearchRequestBody, SearchResponseBody};

const DEFAULT_BASE_URL: &str = "https://api.tavily.com/";
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// Client for the web-search provider's REST API.
///
/// Manages the HTTP client, API key, base URL, and retry policy. Use
/// [`SearchClient::new`] for production or [`SearchClient::with_base_url`]
/// to point at a mock server in tests.
pub struct SearchClient {
    client: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl SearchClient {
    /// Creates a new client pointed at the production search API.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, timeout_secs: u64, max_retries: u32) -> Result<Self, SearchError> {
        Self::with_base_url(api_key, timeout_secs, max_retries, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`SearchError::ApiError`] if `base_url`
    /// is not a valid URL.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        max_retries: u32,
        base_url: &str,
    ) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("mktmon/0.1 (market-monitoring)")
            .build()?;

        // Ensure the base URL ends with exactly one slash so join() appends
        // rather than replacing the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| SearchError::ApiError(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            max_retries,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        })
    }

    /// Overrides the back-off base delay; tests use `0` to avoid sleeping.
    #[must_use]
    pub fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Runs one search, retrying transient failures.
    ///
    /// Returns the provider's result list; an empty list is a valid answer.
    ///
    /// # Errors
    ///
    /// - [`SearchError::ApiError`] if the provider reports an error for the
    ///   query or the request is rejected (non-retriable 4xx).
    /// - [`SearchError::Http`] on network failure or a non-2xx status that
    ///   survives retries.
    /// - [`SearchError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.search_once(query)
        })
        .await
    }

    async fn search_once(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchError> {
        let url = self
            .base_url
            .join("search")
            .map_err(|e| SearchError::ApiError(format!("invalid search URL: {e}")))?;

        let body = SearchRequestBody {
            api_key: &self.api_key,
            query: &query.query,
            days: query.recency_days,
            max_results: query.max_results,
            include_domains: &query.include_domains,
        };

        tracing::debug!(query = %query.query, "search provider request");

        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            // 4xx carries an application-level detail; keep 5xx/429 as HTTP
            // errors so the retry layer can classify them.
            if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
                let detail = response
                    .json::<ProviderErrorBody>()
                    .await
                    .ok()
                    .and_then(|b| b.detail)
                    .unwrap_or_else(|| format!("request rejected with status {status}"));
                return Err(SearchError::ApiError(detail));
            }
            return Err(SearchError::Http(
                response.error_for_status().expect_err("status is not 2xx"),
            ));
        }

        let raw = response.text().await?;
        let parsed: SearchResponseBody =
            serde_json::from_str(&raw).map_err(|e| SearchError::Deserialize {
                context: format!("search(query={})", query.query),
                source: e,
            })?;

        if let Some(error) = parsed.error {
            return Err(SearchError::ApiError(error));
        }

        Ok(parsed.results)
    }
}
