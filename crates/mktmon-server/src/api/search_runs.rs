use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

/// SSE snapshot cadence while a run is still in flight. Matches the
/// dashboard's former 2–5 s polling contract.
const STREAM_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub(super) struct SearchRunItem {
    search_run_id: Uuid,
    run_type: String,
    status: String,
    monitoring_profile_id: Option<Uuid>,
    documents_created: i32,
    events_created: i32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    execution_time_ms: Option<i64>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<mktmon_db::SearchRunRow> for SearchRunItem {
    fn from(row: mktmon_db::SearchRunRow) -> Self {
        Self {
            search_run_id: row.public_id,
            run_type: row.run_type,
            status: row.status,
            monitoring_profile_id: row.monitoring_profile_id,
            documents_created: row.documents_created,
            events_created: row.events_created,
            started_at: row.started_at,
            completed_at: row.completed_at,
            execution_time_ms: row.execution_time_ms,
            error_message: row.error_message,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SearchRunStageItem {
    stage_name: String,
    status: String,
    documents_processed: i32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    metadata: serde_json::Value,
}

impl From<mktmon_db::SearchRunStageRow> for SearchRunStageItem {
    fn from(row: mktmon_db::SearchRunStageRow) -> Self {
        Self {
            stage_name: row.stage_name,
            status: row.status,
            documents_processed: row.documents_processed,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
            metadata: row.metadata,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SearchRunDetail {
    #[serde(flatten)]
    run: SearchRunItem,
    stages: Vec<SearchRunStageItem>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchRunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TriggerBody {
    monitoring_profile_id: Uuid,
}

#[derive(Debug, Serialize)]
pub(super) struct TriggerData {
    status: String,
    search_run_id: Uuid,
    documents_created: i32,
    events_created: i32,
    duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Executes the pipeline for the given profile and reports the terminal run.
///
/// A pipeline failure is a `failed` payload, not a transport error; the run
/// row (and its stages) stay queryable either way.
pub(super) async fn trigger_search_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<TriggerBody>,
) -> Result<Json<ApiResponse<TriggerData>>, ApiError> {
    let summary = mktmon_pipeline::run_search(
        &state.pool,
        &state.pipeline,
        body.monitoring_profile_id,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "search run bookkeeping failed");
        ApiError::new(req_id.0.clone(), "internal_error", e.to_string())
    })?;

    #[allow(clippy::cast_precision_loss)]
    let duration_seconds = summary.execution_time_ms as f64 / 1000.0;

    Ok(Json(ApiResponse {
        data: TriggerData {
            status: summary.status,
            search_run_id: summary.search_run_id,
            documents_created: summary.documents_created,
            events_created: summary.events_created,
            duration_seconds,
            error: summary.error,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_search_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SearchRunsQuery>,
) -> Result<Json<ApiResponse<Vec<SearchRunItem>>>, ApiError> {
    let rows = mktmon_db::list_search_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(SearchRunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_search_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<SearchRunDetail>>, ApiError> {
    let run = mktmon_db::get_search_run(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let stages = mktmon_db::list_run_stages(&state.pool, run.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: SearchRunDetail {
            run: SearchRunItem::from(run),
            stages: stages.into_iter().map(SearchRunStageItem::from).collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn delete_search_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    mktmon_db::delete_search_run(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({ "deleted": true }),
        meta: ResponseMeta::new(req_id.0),
    }))
}

struct StreamState {
    pool: PgPool,
    public_id: Uuid,
    first: bool,
    done: bool,
}

/// Push channel for run progress: emits run + stage snapshots observed
/// from the database until the run leaves `running`. The state contract is
/// identical to polling the GET endpoint; only the transport changes.
pub(super) async fn stream_search_run_events(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // 404 up front; afterwards the stream quietly ends if the run vanishes.
    mktmon_db::get_search_run(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let stream = futures::stream::unfold(
        StreamState {
            pool: state.pool.clone(),
            public_id: id,
            first: true,
            done: false,
        },
        |mut st| async move {
            if st.done {
                return None;
            }
            if st.first {
                st.first = false;
            } else {
                tokio::time::sleep(STREAM_POLL_INTERVAL).await;
            }

            let run = mktmon_db::get_search_run(&st.pool, st.public_id).await.ok()?;
            let stages = mktmon_db::list_run_stages(&st.pool, run.id).await.ok()?;

            if run.status != "running" {
                st.done = true;
            }

            let detail = SearchRunDetail {
                run: SearchRunItem::from(run),
                stages: stages.into_iter().map(SearchRunStageItem::from).collect(),
            };

            let event = Event::default().event("status").json_data(&detail).ok()?;
            Some((Ok::<_, Infallible>(event), st))
        },
    );

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
