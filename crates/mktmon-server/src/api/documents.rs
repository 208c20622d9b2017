use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, require_non_empty, ApiError, ApiResponse, AppState, ResponseMeta};

const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

#[derive(Debug, Serialize)]
pub(super) struct DocumentItem {
    id: Uuid,
    title: String,
    source_url: String,
    document_type: String,
    content_length: Option<i32>,
    file_size: Option<i64>,
    error_message: Option<String>,
    fetched_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
    published_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl From<mktmon_db::DocumentRow> for DocumentItem {
    fn from(row: mktmon_db::DocumentRow) -> Self {
        Self {
            id: row.public_id,
            title: row.title,
            source_url: row.source_url,
            document_type: row.document_type,
            content_length: row.content_length,
            file_size: row.file_size,
            error_message: row.error_message,
            fetched_at: row.fetched_at,
            processed_at: row.processed_at,
            published_date: row.published_date,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct DocumentsQuery {
    pub limit: Option<i64>,
    pub search_run_id: Option<Uuid>,
}

pub(super) async fn list_documents(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<DocumentsQuery>,
) -> Result<Json<ApiResponse<Vec<DocumentItem>>>, ApiError> {
    let run_id = match query.search_run_id {
        Some(public_id) => Some(
            mktmon_db::get_search_run(&state.pool, public_id)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?
                .id,
        ),
        None => None,
    };

    let rows = mktmon_db::list_documents(&state.pool, super::normalize_limit(query.limit), run_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(DocumentItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_document(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DocumentItem>>, ApiError> {
    let row = mktmon_db::get_document(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: DocumentItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

// ---------------------------------------------------------------------------
// Semantic search
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct SemanticSearchBody {
    query: String,
    limit: Option<i64>,
    threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(super) struct SemanticHitItem {
    id: Uuid,
    title: String,
    source_url: String,
    document_type: String,
    published_date: Option<NaiveDate>,
    similarity: f64,
}

/// Results plus an explanatory message when the search is degraded.
#[derive(Debug, Serialize)]
pub(super) struct SemanticSearchData {
    results: Vec<SemanticHitItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Embed the query and rank stored documents by cosine similarity.
///
/// When the embedding backend or the vector store is unavailable the
/// endpoint answers 200 with an empty result set and an explanatory
/// message instead of failing the request.
pub(super) async fn semantic_search(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<SemanticSearchBody>,
) -> Result<Json<ApiResponse<SemanticSearchData>>, ApiError> {
    require_non_empty(&req_id.0, "query", &body.query)?;

    let limit = body.limit.unwrap_or(10).clamp(1, 50);
    let threshold = body.threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "threshold must be between 0.0 and 1.0",
        ));
    }

    let Some(ai) = state.ai.as_ref() else {
        return Ok(Json(ApiResponse {
            data: degraded("semantic search is unavailable: AI credentials are not configured"),
            meta: ResponseMeta::new(req_id.0),
        }));
    };

    let embedding = match ai.embed_one(&body.query).await {
        Ok(vector) => pgvector::Vector::from(vector),
        Err(e) => {
            tracing::warn!(error = %e, "query embedding failed");
            return Ok(Json(ApiResponse {
                data: degraded(&format!("semantic search is unavailable: {e}")),
                meta: ResponseMeta::new(req_id.0),
            }));
        }
    };

    match mktmon_db::semantic_search(&state.pool, &embedding, threshold, limit).await {
        Ok(hits) => Ok(Json(ApiResponse {
            data: SemanticSearchData {
                results: hits
                    .into_iter()
                    .map(|hit| SemanticHitItem {
                        id: hit.public_id,
                        title: hit.title,
                        source_url: hit.source_url,
                        document_type: hit.document_type,
                        published_date: hit.published_date,
                        similarity: hit.similarity,
                    })
                    .collect(),
                message: None,
            },
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => {
            tracing::warn!(error = %e, "similarity query failed");
            Ok(Json(ApiResponse {
                data: degraded(&format!("semantic search is unavailable: {e}")),
                meta: ResponseMeta::new(req_id.0),
            }))
        }
    }
}

fn degraded(message: &str) -> SemanticSearchData {
    SemanticSearchData {
        results: Vec::new(),
        message: Some(message.to_string()),
    }
}
