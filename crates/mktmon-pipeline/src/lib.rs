//! The document-pipeline orchestrator.
//!
//! One run drives three typed stages in fixed order — source hunting,
//! content fetching, document processing — persisting every run and stage
//! transition to `search_runs` / `search_run_stages` before and after the
//! stage executes. A failed stage aborts the rest of the run; per-item
//! failures inside a stage are recorded and the stage continues.

mod context;
mod error;
mod runner;
pub mod stages;

pub use context::PipelineContext;
pub use error::PipelineError;
pub use runner::{run_search, RunSummary, STAGE_ORDER};
