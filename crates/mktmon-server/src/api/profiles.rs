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
pub(super) struct ProfileItem {
    id: Uuid,
    name: String,
    priority: i32,
    date_range_days: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<mktmon_db::MonitoringProfileRow> for ProfileItem {
    fn from(row: mktmon_db::MonitoringProfileRow) -> Self {
        Self {
            id: row.public_id,
            name: row.name,
            priority: row.priority,
            date_range_days: row.date_range_days,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ProfileDetail {
    #[serde(flatten)]
    profile: ProfileItem,
    segment_ids: Vec<Uuid>,
    brand_ids: Vec<Uuid>,
    geography_ids: Vec<Uuid>,
    event_type_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateProfileBody {
    name: String,
    prompt_id: Uuid,
    #[serde(default)]
    priority: i32,
    #[serde(default = "default_date_range_days")]
    date_range_days: i32,
    #[serde(default)]
    segment_ids: Vec<Uuid>,
    #[serde(default)]
    brand_ids: Vec<Uuid>,
    #[serde(default)]
    geography_ids: Vec<Uuid>,
    #[serde(default)]
    event_type_ids: Vec<Uuid>,
}

fn default_date_range_days() -> i32 {
    7
}

pub(super) async fn list_profiles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<ProfileItem>>>, ApiError> {
    let rows = mktmon_db::list_monitoring_profiles(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(ProfileItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProfileDetail>>, ApiError> {
    let row = mktmon_db::get_monitoring_profile(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let filters = mktmon_db::get_profile_filters(&state.pool, row.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ProfileDetail {
            profile: ProfileItem::from(row),
            segment_ids: filters.segments.iter().map(|s| s.public_id).collect(),
            brand_ids: filters.brands.iter().map(|b| b.public_id).collect(),
            geography_ids: filters.geographies.iter().map(|g| g.public_id).collect(),
            event_type_ids: filters.event_types.iter().map(|e| e.public_id).collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn create_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateProfileBody>,
) -> Result<Json<ApiResponse<ProfileItem>>, ApiError> {
    require_non_empty(&req_id.0, "name", &body.name)?;

    let row = mktmon_db::create_monitoring_profile(
        &state.pool,
        &mktmon_db::NewMonitoringProfile {
            name: body.name,
            prompt_id: body.prompt_id,
            priority: body.priority,
            date_range_days: body.date_range_days,
            segment_ids: body.segment_ids,
            brand_ids: body.brand_ids,
            geography_ids: body.geography_ids,
            event_type_ids: body.event_type_ids,
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ProfileItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}
