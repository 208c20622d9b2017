use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use mktmon_ai::{classifier, ReferenceCatalog, ReferenceItem};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_db_error, normalize_limit, require_non_empty, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Serialize)]
pub(super) struct MarketEventItem {
    id: Uuid,
    title: String,
    description: Option<String>,
    event_date: Option<NaiveDate>,
    criticality: i16,
    source_url: Option<String>,
    segment: Option<String>,
    event_type: Option<String>,
    brand: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MarketEventsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateMarketEventBody {
    title: Option<String>,
    description: Option<String>,
    event_date: Option<NaiveDate>,
    criticality: Option<i16>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ExtractEventsBody {
    prompt: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ExtractEventsData {
    events_created: usize,
    events: Vec<MarketEventItem>,
}

pub(super) async fn list_market_events(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<MarketEventsQuery>,
) -> Result<Json<ApiResponse<Vec<MarketEventItem>>>, ApiError> {
    let rows = mktmon_db::list_market_events_detailed(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| MarketEventItem {
            id: row.public_id,
            title: row.title,
            description: row.description,
            event_date: row.event_date,
            criticality: row.criticality,
            source_url: row.source_url,
            segment: row.segment_name,
            event_type: row.event_type_label,
            brand: row.brand_name,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn update_market_event(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMarketEventBody>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if let Some(title) = &body.title {
        require_non_empty(&req_id.0, "title", title)?;
    }
    if let Some(criticality) = body.criticality {
        if !(1..=5).contains(&criticality) {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                "criticality must be between 1 and 5",
            ));
        }
    }

    let row = mktmon_db::update_market_event(
        &state.pool,
        id,
        &mktmon_db::MarketEventUpdate {
            title: body.title,
            description: body.description,
            event_date: body.event_date,
            criticality: body.criticality,
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({
            "id": row.public_id,
            "title": row.title,
            "criticality": row.criticality,
        }),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Ad-hoc extraction: one LLM call over a free-text request, creating
/// market events directly without any document.
pub(super) async fn extract_market_events(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ExtractEventsBody>,
) -> Result<Json<ApiResponse<ExtractEventsData>>, ApiError> {
    require_non_empty(&req_id.0, "prompt", &body.prompt)?;

    let Some(ai) = state.ai.as_ref() else {
        return Err(ApiError::new(
            req_id.0,
            "internal_error",
            "AI credentials are not configured",
        ));
    };

    let (catalog, segment_ids, event_type_ids, brand_ids) = load_catalog(&state, &req_id.0).await?;

    let extracted = classifier::extract_events(ai, &catalog, &body.prompt)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "ad-hoc event extraction failed");
            ApiError::new(req_id.0.clone(), "internal_error", e.to_string())
        })?;

    let mut events = Vec::with_capacity(extracted.len());
    for event in &extracted {
        let row = mktmon_db::insert_market_event(
            &state.pool,
            &mktmon_db::NewMarketEvent {
                title: event.title.clone(),
                description: event.description.clone(),
                event_date: event.event_date,
                segment_id: event.segment_id.and_then(|id| segment_ids.get(&id).copied()),
                event_type_id: event
                    .event_type_id
                    .and_then(|id| event_type_ids.get(&id).copied()),
                brand_id: event.brand_id.and_then(|id| brand_ids.get(&id).copied()),
                criticality: event.criticality,
                source_url: None,
                document_id: None,
                search_run_id: None,
            },
        )
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

        events.push(MarketEventItem {
            id: row.public_id,
            title: row.title,
            description: row.description,
            event_date: row.event_date,
            criticality: row.criticality,
            source_url: row.source_url,
            segment: None,
            event_type: None,
            brand: None,
            created_at: row.created_at,
        });
    }

    Ok(Json(ApiResponse {
        data: ExtractEventsData {
            events_created: events.len(),
            events,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

type CatalogMaps = (
    ReferenceCatalog,
    HashMap<Uuid, i64>,
    HashMap<Uuid, i64>,
    HashMap<Uuid, i64>,
);

async fn load_catalog(state: &AppState, req_id: &str) -> Result<CatalogMaps, ApiError> {
    let segments = mktmon_db::list_segments(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;
    let event_types = mktmon_db::list_event_types(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;
    let brands = mktmon_db::list_active_brands(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;
    let geographies = mktmon_db::list_geographies(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;

    let catalog = ReferenceCatalog {
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
    };

    Ok((
        catalog,
        segments.iter().map(|s| (s.public_id, s.id)).collect(),
        event_types.iter().map(|e| (e.public_id, e.id)).collect(),
        brands.iter().map(|b| (b.public_id, b.id)).collect(),
    ))
}
