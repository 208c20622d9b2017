use mktmon_ai::{AiClient, AiConfig};
use mktmon_core::AppConfig;
use mktmon_fetcher::Fetcher;
use mktmon_search::SearchClient;

use crate::error::PipelineError;

/// Shared clients and knobs the stages run with.
///
/// Search and AI clients are optional: a stage that needs a missing client
/// fails with a credentials error when it actually runs, which keeps runs
/// over empty profiles working without any upstream configured.
pub struct PipelineContext {
    pub(crate) search: Option<SearchClient>,
    pub(crate) fetcher: Fetcher,
    pub(crate) ai: Option<AiClient>,
    pub(crate) inter_request_delay_ms: u64,
}

impl PipelineContext {
    /// Builds a context with explicit clients (tests point these at mocks).
    #[must_use]
    pub fn new(
        search: Option<SearchClient>,
        fetcher: Fetcher,
        ai: Option<AiClient>,
        inter_request_delay_ms: u64,
    ) -> Self {
        Self {
            search,
            fetcher,
            ai,
            inter_request_delay_ms,
        }
    }

    /// Builds a context from the application config.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Fetch`] if the HTTP fetcher cannot be
    /// constructed, or the underlying client errors for the configured
    /// search/AI endpoints.
    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        let search = match &config.search_api_key {
            Some(key) => Some(
                SearchClient::with_base_url(
                    key,
                    config.search_timeout_secs,
                    config.search_max_retries,
                    config
                        .search_base_url
                        .as_deref()
                        .unwrap_or("https://api.tavily.com/"),
                )
                .map_err(|e| PipelineError::Stage {
                    stage: "source_hunter",
                    message: e.to_string(),
                })?,
            ),
            None => None,
        };

        let fetcher = Fetcher::new(config.fetch_timeout_secs, &config.fetch_user_agent)?;

        let ai_config = AiConfig {
            api_key: config.ai_api_key.clone(),
            base_url: config.ai_base_url.clone(),
            chat_model: config.ai_chat_model.clone(),
            embed_model: config.ai_embed_model.clone(),
            timeout_secs: config.ai_timeout_secs,
        };
        let ai = match AiClient::new(&ai_config) {
            Ok(client) => Some(client),
            Err(mktmon_ai::AiError::MissingCredentials) => None,
            Err(e) => return Err(PipelineError::Ai(e)),
        };

        Ok(Self {
            search,
            fetcher,
            ai,
            inter_request_delay_ms: config.fetch_inter_request_delay_ms,
        })
    }
}
