//! Stage 2: download and extract content for hunted document stubs.

use std::time::Duration;

use mktmon_core::DocumentType;
use mktmon_db::documents;
use sqlx::PgPool;

use crate::context::PipelineContext;
use crate::error::PipelineError;

/// Output of the fetch stage.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Documents whose content was written successfully.
    pub fetched_ids: Vec<i64>,
    /// Documents that failed, with the recorded error message.
    pub failed: Vec<(i64, String)>,
}

impl FetchOutcome {
    #[must_use]
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "fetched": self.fetched_ids.len(),
            "failed": self.failed.iter().map(|(id, msg)| {
                serde_json::json!({ "document_id": id, "error": msg })
            }).collect::<Vec<_>>(),
        })
    }

    #[must_use]
    pub fn documents_processed(&self) -> i32 {
        i32::try_from(self.fetched_ids.len()).unwrap_or(i32::MAX)
    }
}

/// Fetches each document sequentially with a politeness delay between
/// requests. A per-document failure (HTTP error, parse failure) records
/// `error_message` on that row and the batch continues; only a database
/// error aborts the stage.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if reading or writing document rows fails.
pub async fn run(
    pool: &PgPool,
    ctx: &PipelineContext,
    document_ids: &[i64],
) -> Result<FetchOutcome, PipelineError> {
    let mut outcome = FetchOutcome::default();

    if document_ids.is_empty() {
        return Ok(outcome);
    }

    let rows = documents::list_documents_by_ids(pool, document_ids).await?;

    for (index, row) in rows.iter().enumerate() {
        if index > 0 && ctx.inter_request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(ctx.inter_request_delay_ms)).await;
        }

        let declared = row
            .document_type
            .parse::<DocumentType>()
            .unwrap_or(DocumentType::Unknown);

        match ctx.fetcher.fetch(&row.source_url, declared).await {
            Ok(fetched) => {
                documents::update_document_content(
                    pool,
                    row.id,
                    &fetched.content_text,
                    fetched.content_html.as_deref(),
                    fetched.content_length,
                    fetched.file_size,
                )
                .await?;
                outcome.fetched_ids.push(row.id);
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    document_id = row.id,
                    url = %row.source_url,
                    error = %message,
                    "document fetch failed"
                );
                documents::set_document_error(pool, row.id, &message).await?;
                outcome.failed.push((row.id, message));
            }
        }
    }

    tracing::info!(
        fetched = outcome.fetched_ids.len(),
        failed = outcome.failed.len(),
        "fetch stage finished"
    );

    Ok(outcome)
}
