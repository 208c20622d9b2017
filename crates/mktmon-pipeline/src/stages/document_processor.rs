//! Stage 3: classify fetched documents, store embeddings, create events.

use std::collections::HashMap;

use mktmon_ai::{classifier, ReferenceCatalog, ReferenceItem};
use mktmon_db::{documents, market_events, reference, NewMarketEvent};
use sqlx::PgPool;
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::PipelineError;

/// Output of the processing stage.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    pub processed_ids: Vec<i64>,
    /// Documents whose classification or embedding failed.
    pub failed: Vec<(i64, String)>,
    /// Documents skipped because they have no content (failed fetch).
    pub skipped_ids: Vec<i64>,
    pub events_created: usize,
}

impl ProcessOutcome {
    /// `partial` when some documents failed, `success` otherwise.
    #[must_use]
    pub fn status(&self) -> &'static str {
        if self.failed.is_empty() {
            "success"
        } else {
            "partial"
        }
    }

    #[must_use]
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status(),
            "processed": self.processed_ids.len(),
            "skipped": self.skipped_ids,
            "events_created": self.events_created,
            "errors": self.failed.iter().map(|(id, msg)| {
                serde_json::json!({ "document_id": id, "error": msg })
            }).collect::<Vec<_>>(),
        })
    }

    #[must_use]
    pub fn documents_processed(&self) -> i32 {
        i32::try_from(self.processed_ids.len()).unwrap_or(i32::MAX)
    }
}

/// Maps reference rows to the classifier catalog plus a lookup from public
/// UUID back to the internal id the linking tables need.
struct CatalogIndex {
    catalog: ReferenceCatalog,
    segment_ids: HashMap<Uuid, i64>,
    event_type_ids: HashMap<Uuid, i64>,
    brand_ids: HashMap<Uuid, i64>,
    geography_ids: HashMap<Uuid, i64>,
}

async fn load_catalog(pool: &PgPool) -> Result<CatalogIndex, PipelineError> {
    let segments = reference::list_segments(pool).await?;
    let event_types = reference::list_event_types(pool).await?;
    let brands = mktmon_db::list_active_brands(pool).await?;
    let geographies = reference::list_geographies(pool).await?;

    Ok(CatalogIndex {
        catalog: ReferenceCatalog {
            segments: segments
                .iter()
                .map(|s| ReferenceItem {
                    id: s.public_id,
                    name: s.name.clone(),
                })
                .collect(),
            event_types: event_types
                .iter()
                .map(|e| ReferenceItem {
                    id: e.public_id,
                    name: e.label.clone(),
                })
                .collect(),
            brands: brands
                .iter()
                .map(|b| ReferenceItem {
                    id: b.public_id,
                    name: b.name.clone(),
                })
                .collect(),
            geographies: geographies
                .iter()
                .map(|g| ReferenceItem {
                    id: g.public_id,
                    name: g.name.clone(),
                })
                .collect(),
        },
        segment_ids: segments.iter().map(|s| (s.public_id, s.id)).collect(),
        event_type_ids: event_types.iter().map(|e| (e.public_id, e.id)).collect(),
        brand_ids: brands.iter().map(|b| (b.public_id, b.id)).collect(),
        geography_ids: geographies.iter().map(|g| (g.public_id, g.id)).collect(),
    })
}

/// Processes each document with content: one classification call, one
/// embedding call, then linking rows, the stored vector, and a market event
/// per extracted event. A per-document AI failure records the error and the
/// batch continues; documents without content (failed fetch) are skipped.
///
/// An empty input is a successful no-op — the stage still runs and reports
/// zero documents. With documents present but no AI credentials, the whole
/// stage fails.
///
/// # Errors
///
/// - [`PipelineError::Ai`] with `MissingCredentials` when documents exist
///   but no AI client is configured.
/// - [`PipelineError::Db`] on any reference-load or write failure.
pub async fn run(
    pool: &PgPool,
    ctx: &PipelineContext,
    document_ids: &[i64],
    search_run_id: i64,
) -> Result<ProcessOutcome, PipelineError> {
    let mut outcome = ProcessOutcome::default();

    if document_ids.is_empty() {
        return Ok(outcome);
    }

    let ai = ctx
        .ai
        .as_ref()
        .ok_or(PipelineError::Ai(mktmon_ai::AiError::MissingCredentials))?;

    let index = load_catalog(pool).await?;
    let rows = documents::list_documents_by_ids(pool, document_ids).await?;

    for row in &rows {
        let Some(content_text) = row.content_text.as_deref().filter(|t| !t.trim().is_empty())
        else {
            outcome.skipped_ids.push(row.id);
            continue;
        };

        let classification = match classifier::classify_document(ai, &index.catalog, content_text)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                let message = format!("classification failed: {e}");
                tracing::warn!(document_id = row.id, error = %e, "classification failed");
                documents::set_document_error(pool, row.id, &message).await?;
                outcome.failed.push((row.id, message));
                continue;
            }
        };

        let embedding = match ai.embed_one(content_text).await {
            Ok(vector) => vector,
            Err(e) => {
                let message = format!("embedding failed: {e}");
                tracing::warn!(document_id = row.id, error = %e, "embedding failed");
                documents::set_document_error(pool, row.id, &message).await?;
                outcome.failed.push((row.id, message));
                continue;
            }
        };

        // All writes below are persistence-level; a failure aborts the stage.
        if let Some(segment_id) = classification
            .segment_id
            .and_then(|id| index.segment_ids.get(&id))
        {
            documents::link_document_segment(pool, row.id, *segment_id).await?;
        }
        for event_type_id in classification
            .event_type_ids
            .iter()
            .filter_map(|id| index.event_type_ids.get(id))
        {
            documents::link_document_event_type(pool, row.id, *event_type_id).await?;
        }
        for brand_id in classification
            .brand_ids
            .iter()
            .filter_map(|id| index.brand_ids.get(id))
        {
            documents::link_document_brand(pool, row.id, *brand_id).await?;
        }
        for geography_id in classification
            .geography_ids
            .iter()
            .filter_map(|id| index.geography_ids.get(id))
        {
            documents::link_document_geography(pool, row.id, *geography_id).await?;
        }

        documents::mark_document_processed(pool, row.id, &pgvector::Vector::from(embedding))
            .await?;

        for event in &classification.events {
            let new_event = NewMarketEvent {
                title: event.title.clone(),
                description: event.description.clone(),
                event_date: event.event_date,
                segment_id: event
                    .segment_id
                    .and_then(|id| index.segment_ids.get(&id).copied()),
                event_type_id: event
                    .event_type_id
                    .and_then(|id| index.event_type_ids.get(&id).copied()),
                brand_id: event
                    .brand_id
                    .and_then(|id| index.brand_ids.get(&id).copied()),
                criticality: event.criticality,
                source_url: Some(row.source_url.clone()),
                document_id: Some(row.id),
                search_run_id: Some(search_run_id),
            };
            market_events::insert_market_event(pool, &new_event).await?;
            outcome.events_created += 1;
        }

        outcome.processed_ids.push(row.id);
    }

    tracing::info!(
        processed = outcome.processed_ids.len(),
        failed = outcome.failed.len(),
        skipped = outcome.skipped_ids.len(),
        events = outcome.events_created,
        status = outcome.status(),
        "processing stage finished"
    );

    Ok(outcome)
}
