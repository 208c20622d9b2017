//! Database operations for the `market_events` table.
//!
//! Events are immutable once created except for the admin edit path
//! ([`update_market_event`]).

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `market_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MarketEventRow {
    pub id: i64,
    pub public_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub segment_id: Option<i64>,
    pub event_type_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub criticality: i16,
    pub source_url: Option<String>,
    pub document_id: Option<i64>,
    pub search_run_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a market event.
#[derive(Debug, Clone)]
pub struct NewMarketEvent {
    pub title: String,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub segment_id: Option<i64>,
    pub event_type_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub criticality: i16,
    pub source_url: Option<String>,
    pub document_id: Option<i64>,
    pub search_run_id: Option<i64>,
}

/// Admin-editable fields; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct MarketEventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub criticality: Option<i16>,
}

const EVENT_COLUMNS: &str = "id, public_id, title, description, event_date, segment_id, \
     event_type_id, brand_id, criticality, source_url, document_id, search_run_id, created_at";

/// Inserts a market event. Criticality must already be clamped to 1–5; the
/// CHECK constraint is the backstop.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_market_event(
    pool: &PgPool,
    new: &NewMarketEvent,
) -> Result<MarketEventRow, DbError> {
    let row = sqlx::query_as::<_, MarketEventRow>(&format!(
        "INSERT INTO market_events \
             (title, description, event_date, segment_id, event_type_id, brand_id, \
              criticality, source_url, document_id, search_run_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING {EVENT_COLUMNS}",
    ))
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.event_date)
    .bind(new.segment_id)
    .bind(new.event_type_id)
    .bind(new.brand_id)
    .bind(new.criticality)
    .bind(&new.source_url)
    .bind(new.document_id)
    .bind(new.search_run_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches an event by public UUID.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists.
pub async fn get_market_event(pool: &PgPool, public_id: Uuid) -> Result<MarketEventRow, DbError> {
    let row = sqlx::query_as::<_, MarketEventRow>(&format!(
        "SELECT {EVENT_COLUMNS} FROM market_events WHERE public_id = $1",
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` events, ordered by creation.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_market_events(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<MarketEventRow>, DbError> {
    let rows = sqlx::query_as::<_, MarketEventRow>(&format!(
        "SELECT {EVENT_COLUMNS} FROM market_events \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// A market event joined with its reference display names, for API listings.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MarketEventDetailRow {
    pub public_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub criticality: i16,
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub segment_name: Option<String>,
    pub event_type_label: Option<String>,
    pub brand_name: Option<String>,
}

/// Returns the most recent `limit` events with resolved reference names.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_market_events_detailed(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<MarketEventDetailRow>, DbError> {
    let rows = sqlx::query_as::<_, MarketEventDetailRow>(
        "SELECT e.public_id, e.title, e.description, e.event_date, e.criticality, \
                e.source_url, e.created_at, \
                s.name AS segment_name, t.label AS event_type_label, b.name AS brand_name \
         FROM market_events e \
         LEFT JOIN segments s ON s.id = e.segment_id \
         LEFT JOIN event_types t ON t.id = e.event_type_id \
         LEFT JOIN brands b ON b.id = e.brand_id \
         ORDER BY e.created_at DESC, e.id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Applies an admin edit to an event.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched.
pub async fn update_market_event(
    pool: &PgPool,
    public_id: Uuid,
    update: &MarketEventUpdate,
) -> Result<MarketEventRow, DbError> {
    let row = sqlx::query_as::<_, MarketEventRow>(&format!(
        "UPDATE market_events \
         SET title = COALESCE($1, title), \
             description = COALESCE($2, description), \
             event_date = COALESCE($3, event_date), \
             criticality = COALESCE($4, criticality) \
         WHERE public_id = $5 \
         RETURNING {EVENT_COLUMNS}",
    ))
    .bind(&update.title)
    .bind(&update.description)
    .bind(update.event_date)
    .bind(update.criticality)
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}
