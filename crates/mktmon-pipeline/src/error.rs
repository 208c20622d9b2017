use thiserror::Error;

/// Errors surfaced by the pipeline.
///
/// A stage that returns any of these fails its stage record and the run;
/// per-item provider failures inside a stage are aggregated into the stage
/// outcome instead and never appear here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("search provider is not configured (set MKTMON_SEARCH_API_KEY)")]
    SearchNotConfigured,

    #[error(transparent)]
    Db(#[from] mktmon_db::DbError),

    #[error(transparent)]
    Ai(#[from] mktmon_ai::AiError),

    #[error(transparent)]
    Fetch(#[from] mktmon_fetcher::FetchError),

    #[error("{stage} stage failed: {message}")]
    Stage {
        stage: &'static str,
        message: String,
    },
}
