//! Database operations for the classification reference tables:
//! `segments`, `geographies`, and `event_types`.
//!
//! These tables are the single source of truth for what the classifier may
//! assign; the pipeline enumerates them at call time rather than carrying
//! hardcoded lists.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `segments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SegmentRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A row from the `geographies` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GeographyRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub iso_code: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A row from the `event_types` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventTypeRow {
    pub id: i64,
    pub public_id: Uuid,
    pub slug: String,
    pub label: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Returns all active segments, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_segments(pool: &PgPool) -> Result<Vec<SegmentRow>, DbError> {
    let rows = sqlx::query_as::<_, SegmentRow>(
        "SELECT id, public_id, name, slug, is_active, created_at \
         FROM segments WHERE is_active = true ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Creates a segment. Name and derived slug must be unique.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] on a duplicate name.
pub async fn create_segment(pool: &PgPool, name: &str) -> Result<SegmentRow, DbError> {
    let slug = mktmon_core::slugify(name);

    let row = sqlx::query_as::<_, SegmentRow>(
        "INSERT INTO segments (name, slug) VALUES ($1, $2) \
         RETURNING id, public_id, name, slug, is_active, created_at",
    )
    .bind(name)
    .bind(&slug)
    .fetch_one(pool)
    .await
    .map_err(|e| DbError::from_sqlx(e, "segment name"))?;

    Ok(row)
}

/// Soft-deletes a segment.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched.
pub async fn deactivate_segment(pool: &PgPool, public_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE segments SET is_active = false WHERE public_id = $1")
        .bind(public_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Returns all active geographies, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_geographies(pool: &PgPool) -> Result<Vec<GeographyRow>, DbError> {
    let rows = sqlx::query_as::<_, GeographyRow>(
        "SELECT id, public_id, name, iso_code, is_active, created_at \
         FROM geographies WHERE is_active = true ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Creates a geography. Name must be unique.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] on a duplicate name.
pub async fn create_geography(
    pool: &PgPool,
    name: &str,
    iso_code: Option<&str>,
) -> Result<GeographyRow, DbError> {
    let row = sqlx::query_as::<_, GeographyRow>(
        "INSERT INTO geographies (name, iso_code) VALUES ($1, $2) \
         RETURNING id, public_id, name, iso_code, is_active, created_at",
    )
    .bind(name)
    .bind(iso_code)
    .fetch_one(pool)
    .await
    .map_err(|e| DbError::from_sqlx(e, "geography name"))?;

    Ok(row)
}

/// Soft-deletes a geography.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched.
pub async fn deactivate_geography(pool: &PgPool, public_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE geographies SET is_active = false WHERE public_id = $1")
        .bind(public_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Returns all active event types, ordered by slug.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_event_types(pool: &PgPool) -> Result<Vec<EventTypeRow>, DbError> {
    let rows = sqlx::query_as::<_, EventTypeRow>(
        "SELECT id, public_id, slug, label, is_active, created_at \
         FROM event_types WHERE is_active = true ORDER BY slug",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Creates an event type. Slug must be unique.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] on a duplicate slug.
pub async fn create_event_type(
    pool: &PgPool,
    slug: &str,
    label: &str,
) -> Result<EventTypeRow, DbError> {
    let row = sqlx::query_as::<_, EventTypeRow>(
        "INSERT INTO event_types (slug, label) VALUES ($1, $2) \
         RETURNING id, public_id, slug, label, is_active, created_at",
    )
    .bind(slug)
    .bind(label)
    .fetch_one(pool)
    .await
    .map_err(|e| DbError::from_sqlx(e, "event type slug"))?;

    Ok(row)
}

/// Soft-deletes an event type.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched.
pub async fn deactivate_event_type(pool: &PgPool, public_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE event_types SET is_active = false WHERE public_id = $1")
        .bind(public_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
