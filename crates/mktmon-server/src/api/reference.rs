//! CRUD for the classification reference tables: segments, geographies,
//! event types.

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
pub(super) struct SegmentItem {
    id: Uuid,
    name: String,
    slug: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct GeographyItem {
    id: Uuid,
    name: String,
    iso_code: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct EventTypeItem {
    id: Uuid,
    slug: String,
    label: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateSegmentBody {
    name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateGeographyBody {
    name: String,
    iso_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateEventTypeBody {
    slug: String,
    label: String,
}

pub(super) async fn list_segments(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<SegmentItem>>>, ApiError> {
    let rows = mktmon_db::list_segments(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| SegmentItem {
            id: row.public_id,
            name: row.name,
            slug: row.slug,
            is_active: row.is_active,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn create_segment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateSegmentBody>,
) -> Result<Json<ApiResponse<SegmentItem>>, ApiError> {
    require_non_empty(&req_id.0, "name", &body.name)?;

    let row = mktmon_db::create_segment(&state.pool, &body.name)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: SegmentItem {
            id: row.public_id,
            name: row.name,
            slug: row.slug,
            is_active: row.is_active,
            created_at: row.created_at,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn deactivate_segment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    mktmon_db::deactivate_segment(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({ "deactivated": true }),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_geographies(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<GeographyItem>>>, ApiError> {
    let rows = mktmon_db::list_geographies(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| GeographyItem {
            id: row.public_id,
            name: row.name,
            iso_code: row.iso_code,
            is_active: row.is_active,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn create_geography(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateGeographyBody>,
) -> Result<Json<ApiResponse<GeographyItem>>, ApiError> {
    require_non_empty(&req_id.0, "name", &body.name)?;

    let row = mktmon_db::create_geography(&state.pool, &body.name, body.iso_code.as_deref())
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: GeographyItem {
            id: row.public_id,
            name: row.name,
            iso_code: row.iso_code,
            is_active: row.is_active,
            created_at: row.created_at,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn deactivate_geography(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    mktmon_db::deactivate_geography(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({ "deactivated": true }),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_event_types(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<EventTypeItem>>>, ApiError> {
    let rows = mktmon_db::list_event_types(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| EventTypeItem {
            id: row.public_id,
            slug: row.slug,
            label: row.label,
            is_active: row.is_active,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn create_event_type(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateEventTypeBody>,
) -> Result<Json<ApiResponse<EventTypeItem>>, ApiError> {
    require_non_empty(&req_id.0, "slug", &body.slug)?;
    require_non_empty(&req_id.0, "label", &body.label)?;

    let row = mktmon_db::create_event_type(&state.pool, &body.slug, &body.label)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: EventTypeItem {
            id: row.public_id,
            slug: row.slug,
            label: row.label,
            is_active: row.is_active,
            created_at: row.created_at,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn deactivate_event_type(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    mktmon_db::deactivate_event_type(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({ "deactivated": true }),
        meta: ResponseMeta::new(req_id.0),
    }))
}
