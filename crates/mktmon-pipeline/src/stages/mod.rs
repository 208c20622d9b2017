//! The three pipeline stages, each a typed async function consuming the
//! prior stage's output.

pub mod content_fetcher;
pub mod document_processor;
pub mod source_hunter;

pub use content_fetcher::FetchOutcome;
pub use document_processor::ProcessOutcome;
pub use source_hunter::{HuntInput, HuntOutcome};
