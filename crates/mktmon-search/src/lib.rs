//! HTTP client for the external web-search provider used by source hunting.
//!
//! Wraps `reqwest` with provider-specific error handling, API key management,
//! typed response deserialization, and bounded retry with exponential
//! back-off on transient failures.

mod client;
mod error;
mod retry;
mod types;

pub use client::SearchClient;
pub use error::SearchError;
pub use types::{SearchHit, SearchQuery};
