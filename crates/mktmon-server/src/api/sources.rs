use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, require_non_empty, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct SourceItem {
    id: Uuid,
    name: String,
    url: String,
    source_kind: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<mktmon_db::SourceRow> for SourceItem {
    fn from(row: mktmon_db::SourceRow) -> Self {
        Self {
            id: row.public_id,
            name: row.name,
            url: row.url,
            source_kind: row.source_kind,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateSourceBody {
    name: String,
    url: String,
    #[serde(default = "default_source_kind")]
    source_kind: String,
}

fn default_source_kind() -> String {
    "web".to_string()
}

pub(super) async fn list_sources(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<SourceItem>>>, ApiError> {
    let rows = mktmon_db::list_active_sources(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(SourceItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn create_source(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateSourceBody>,
) -> Result<Json<ApiResponse<SourceItem>>, ApiError> {
    require_non_empty(&req_id.0, "name", &body.name)?;
    require_non_empty(&req_id.0, "url", &body.url)?;

    let row = mktmon_db::create_source(&state.pool, &body.name, &body.url, &body.source_kind)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: SourceItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn deactivate_source(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    mktmon_db::deactivate_source(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({ "deactivated": true }),
        meta: ResponseMeta::new(req_id.0),
    }))
}
