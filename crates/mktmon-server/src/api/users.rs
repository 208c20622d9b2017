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
pub(super) struct UserItem {
    id: Uuid,
    email: String,
    display_name: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<mktmon_db::UserProfileRow> for UserItem {
    fn from(row: mktmon_db::UserProfileRow) -> Self {
        Self {
            id: row.public_id,
            email: row.email,
            display_name: row.display_name,
            role: row.role,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateUserBody {
    email: String,
    display_name: String,
    #[serde(default = "default_role")]
    role: String,
}

fn default_role() -> String {
    "viewer".to_string()
}

pub(super) async fn list_users(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<UserItem>>>, ApiError> {
    let rows = mktmon_db::list_user_profiles(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(UserItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn create_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateUserBody>,
) -> Result<Json<ApiResponse<UserItem>>, ApiError> {
    require_non_empty(&req_id.0, "email", &body.email)?;
    require_non_empty(&req_id.0, "display_name", &body.display_name)?;

    let row = mktmon_db::create_user_profile(
        &state.pool,
        &body.email,
        &body.display_name,
        &body.role,
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: UserItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Users are deactivated, never hard-deleted.
pub(super) async fn deactivate_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    mktmon_db::deactivate_user_profile(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({ "deactivated": true }),
        meta: ResponseMeta::new(req_id.0),
    }))
}
