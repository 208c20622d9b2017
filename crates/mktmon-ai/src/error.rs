use thiserror::Error;

/// Errors returned by the AI client.
#[derive(Debug, Error)]
pub enum AiError {
    /// No API key is configured; the whole call cannot proceed.
    #[error("AI credentials are not configured (set MKTMON_AI_API_KEY)")]
    MissingCredentials,

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-2xx status and an error body.
    #[error("AI API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The model's answer was empty or not the JSON object we asked for.
    #[error("model returned an unusable answer: {0}")]
    BadAnswer(String),
}
