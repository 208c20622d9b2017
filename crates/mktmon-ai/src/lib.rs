//! OpenAI-compatible client for classification and embeddings.
//!
//! [`AiClient`] wraps the chat-completions and embeddings endpoints;
//! [`classifier`] builds the JSON-mode classification and event-extraction
//! calls on top of it, enumerating the reference catalog in the prompt and
//! filtering the model's answers back against it.

mod client;
pub mod classifier;
mod error;
mod types;

pub use classifier::{
    classify_document, extract_events, DocumentClassification, ExtractedEvent, ReferenceCatalog,
    ReferenceItem,
};
pub use client::{AiClient, AiConfig};
pub use error::AiError;
