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
pub(super) struct PromptItem {
    id: Uuid,
    name: String,
    template: String,
    purpose: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<mktmon_db::PromptRow> for PromptItem {
    fn from(row: mktmon_db::PromptRow) -> Self {
        Self {
            id: row.public_id,
            name: row.name,
            template: row.template,
            purpose: row.purpose,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreatePromptBody {
    name: String,
    template: String,
    #[serde(default = "default_purpose")]
    purpose: String,
}

fn default_purpose() -> String {
    "source_hunting".to_string()
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdatePromptBody {
    template: Option<String>,
    purpose: Option<String>,
}

pub(super) async fn list_prompts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<PromptItem>>>, ApiError> {
    let rows = mktmon_db::list_prompts(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(PromptItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_prompt(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PromptItem>>, ApiError> {
    let row = mktmon_db::get_prompt(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: PromptItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn create_prompt(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreatePromptBody>,
) -> Result<Json<ApiResponse<PromptItem>>, ApiError> {
    require_non_empty(&req_id.0, "name", &body.name)?;
    require_non_empty(&req_id.0, "template", &body.template)?;

    let row = mktmon_db::create_prompt(&state.pool, &body.name, &body.template, &body.purpose)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: PromptItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn update_prompt(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePromptBody>,
) -> Result<Json<ApiResponse<PromptItem>>, ApiError> {
    if let Some(template) = &body.template {
        require_non_empty(&req_id.0, "template", template)?;
    }

    let row = mktmon_db::update_prompt(
        &state.pool,
        id,
        body.template.as_deref(),
        body.purpose.as_deref(),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: PromptItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn deactivate_prompt(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    mktmon_db::deactivate_prompt(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({ "deactivated": true }),
        meta: ResponseMeta::new(req_id.0),
    }))
}
