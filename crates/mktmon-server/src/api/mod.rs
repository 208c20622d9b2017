mod brands;
mod documents;
mod market_events;
mod profiles;
mod prompts;
mod reference;
mod search_runs;
mod sources;
mod users;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub pipeline: Arc<mktmon_pipeline::PipelineContext>,
    pub ai: Option<Arc<mktmon_ai::AiClient>>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &mktmon_db::DbError) -> ApiError {
    match error {
        mktmon_db::DbError::NotFound => {
            ApiError::new(request_id, "not_found", "resource not found")
        }
        mktmon_db::DbError::Conflict(what) => {
            ApiError::new(request_id, "conflict", format!("{what} already exists"))
        }
        _ => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

/// 400 for an empty required string field.
pub(super) fn require_non_empty(
    request_id: &str,
    field: &str,
    value: &str,
) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::new(
            request_id.to_owned(),
            "validation_error",
            format!("{field} must be non-empty"),
        ));
    }
    Ok(())
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/brands",
            get(brands::list_brands).post(brands::create_brand),
        )
        .route(
            "/api/v1/brands/{id}",
            get(brands::get_brand)
                .patch(brands::update_brand)
                .delete(brands::deactivate_brand),
        )
        .route(
            "/api/v1/sources",
            get(sources::list_sources).post(sources::create_source),
        )
        .route("/api/v1/sources/{id}", axum::routing::delete(sources::deactivate_source))
        .route(
            "/api/v1/segments",
            get(reference::list_segments).post(reference::create_segment),
        )
        .route(
            "/api/v1/segments/{id}",
            axum::routing::delete(reference::deactivate_segment),
        )
        .route(
            "/api/v1/geographies",
            get(reference::list_geographies).post(reference::create_geography),
        )
        .route(
            "/api/v1/geographies/{id}",
            axum::routing::delete(reference::deactivate_geography),
        )
        .route(
            "/api/v1/event-types",
            get(reference::list_event_types).post(reference::create_event_type),
        )
        .route(
            "/api/v1/event-types/{id}",
            axum::routing::delete(reference::deactivate_event_type),
        )
        .route(
            "/api/v1/prompts",
            get(prompts::list_prompts).post(prompts::create_prompt),
        )
        .route(
            "/api/v1/prompts/{id}",
            get(prompts::get_prompt)
                .patch(prompts::update_prompt)
                .delete(prompts::deactivate_prompt),
        )
        .route(
            "/api/v1/users",
            get(users::list_users).post(users::create_user),
        )
        .route("/api/v1/users/{id}", axum::routing::delete(users::deactivate_user))
        .route(
            "/api/v1/profiles",
            get(profiles::list_profiles).post(profiles::create_profile),
        )
        .route("/api/v1/profiles/{id}", get(profiles::get_profile))
        .route(
            "/api/v1/search-runs",
            get(search_runs::list_search_runs).post(search_runs::trigger_search_run),
        )
        .route(
            "/api/v1/search-runs/{id}",
            get(search_runs::get_search_run).delete(search_runs::delete_search_run),
        )
        .route(
            "/api/v1/search-runs/{id}/events",
            get(search_runs::stream_search_run_events),
        )
        .route("/api/v1/documents", get(documents::list_documents))
        .route("/api/v1/documents/{id}", get(documents::get_document))
        .route(
            "/api/v1/search/semantic",
            axum::routing::post(documents::semantic_search),
        )
        .route(
            "/api/v1/market-events",
            get(market_events::list_market_events),
        )
        .route(
            "/api/v1/market-events/extract",
            axum::routing::post(market_events::extract_market_events),
        )
        .route(
            "/api/v1/market-events/{id}",
            axum::routing::patch(market_events::update_market_event),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match mktmon_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::AppState;
    use std::sync::Arc;

    /// App state with no upstream clients configured; enough for reference
    /// CRUD and run-inspection routes.
    pub fn state_without_upstreams(pool: sqlx::PgPool) -> AppState {
        let fetcher = mktmon_fetcher::Fetcher::new(5, "mktmon-test/0.1").expect("fetcher");
        AppState {
            pool,
            pipeline: Arc::new(mktmon_pipeline::PipelineContext::new(None, fetcher, None, 0)),
            ai: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_app(pool: sqlx::PgPool) -> Router {
        let auth = crate::middleware::AuthState::from_env(true).expect("auth");
        build_app(
            test_support::state_without_upstreams(pool),
            auth,
            default_rate_limit_state(),
        )
    }

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None), 50);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(1_000)), 200);
        assert_eq!(normalize_limit(Some(25)), 25);
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_error_conflict_maps_to_409() {
        let response = ApiError::new("req-1", "conflict", "duplicate").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn map_db_error_not_found() {
        let err = map_db_error("req-1".to_string(), &mktmon_db::DbError::NotFound);
        assert_eq!(err.error.code, "not_found");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn list_brands_returns_created_brand(pool: sqlx::PgPool) {
        mktmon_db::create_brand(&pool, "Acme Drinks", Some("https://acme.example.com"))
            .await
            .expect("seed brand");

        let response = test_app(pool)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/brands")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["name"].as_str(), Some("Acme Drinks"));
        assert_eq!(data[0]["slug"].as_str(), Some("acme-drinks"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn duplicate_prompt_name_is_a_conflict(pool: sqlx::PgPool) {
        mktmon_db::create_prompt(&pool, "hunt", "find events", "source_hunting")
            .await
            .expect("seed prompt");

        let response = test_app(pool)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/prompts")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({
                            "name": "hunt",
                            "template": "something else"
                        })
                        .to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_search_run_is_404(pool: sqlx::PgPool) {
        let response = test_app(pool)
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/search-runs/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn semantic_search_degrades_without_ai_client(pool: sqlx::PgPool) {
        let response = test_app(pool)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/search/semantic")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({ "query": "acme launch" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(json["data"]["results"].as_array().map(Vec::len), Some(0));
        assert!(json["data"]["message"].as_str().is_some());
    }
}
