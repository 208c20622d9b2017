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
pub(super) struct BrandItem {
    id: Uuid,
    name: String,
    slug: String,
    website_url: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<mktmon_db::BrandRow> for BrandItem {
    fn from(row: mktmon_db::BrandRow) -> Self {
        Self {
            id: row.public_id,
            name: row.name,
            slug: row.slug,
            website_url: row.website_url,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateBrandBody {
    name: String,
    website_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateBrandBody {
    name: Option<String>,
    website_url: Option<String>,
}

pub(super) async fn list_brands(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<BrandItem>>>, ApiError> {
    let rows = mktmon_db::list_active_brands(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(BrandItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_brand(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BrandItem>>, ApiError> {
    let row = mktmon_db::get_brand(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: BrandItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn create_brand(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateBrandBody>,
) -> Result<Json<ApiResponse<BrandItem>>, ApiError> {
    require_non_empty(&req_id.0, "name", &body.name)?;

    let row = mktmon_db::create_brand(&state.pool, &body.name, body.website_url.as_deref())
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: BrandItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn update_brand(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBrandBody>,
) -> Result<Json<ApiResponse<BrandItem>>, ApiError> {
    if let Some(name) = &body.name {
        require_non_empty(&req_id.0, "name", name)?;
    }

    let row = mktmon_db::update_brand(
        &state.pool,
        id,
        body.name.as_deref(),
        body.website_url.as_deref(),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: BrandItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn deactivate_brand(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    mktmon_db::deactivate_brand(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({ "deactivated": true }),
        meta: ResponseMeta::new(req_id.0),
    }))
}
