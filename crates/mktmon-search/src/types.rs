use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One search request against the provider.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    /// Restrict results to this many days back, when the provider supports it.
    pub recency_days: Option<u32>,
    pub max_results: u32,
    /// Restrict results to these domains (the monitored sources).
    pub include_domains: Vec<String>,
}

impl SearchQuery {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            recency_days: None,
            max_results: 10,
            include_domains: Vec::new(),
        }
    }
}

/// One result returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub published_date: Option<NaiveDate>,
    /// MIME-type hint, when the provider knows the result is a file.
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Wire shape of the provider's `/search` request body.
#[derive(Debug, Serialize)]
pub(crate) struct SearchRequestBody<'a> {
    pub api_key: &'a str,
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
    pub max_results: u32,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub include_domains: &'a [String],
}

/// Wire shape of the provider's `/search` response.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponseBody {
    #[serde(default)]
    pub results: Vec<SearchHit>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Wire shape of the provider's non-2xx error body.
#[derive(Debug, Deserialize)]
pub(crate) struct ProviderErrorBody {
    pub detail: Option<String>,
}
