use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("document not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("response body exceeds {max_bytes} bytes for {url}")]
    TooLarge { url: String, max_bytes: usize },

    #[error("text extraction failed for {url}: {reason}")]
    Extract { url: String, reason: String },
}
