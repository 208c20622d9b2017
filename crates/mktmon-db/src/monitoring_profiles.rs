//! Database operations for `monitoring_profiles` and their filter link tables.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::reference::{EventTypeRow, GeographyRow, SegmentRow};
use crate::{BrandRow, DbError};

/// A row from the `monitoring_profiles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonitoringProfileRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub prompt_id: i64,
    pub priority: i32,
    pub date_range_days: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a monitoring profile. Filter sets are the
/// public UUIDs of existing reference rows.
#[derive(Debug, Clone)]
pub struct NewMonitoringProfile {
    pub name: String,
    pub prompt_id: Uuid,
    pub priority: i32,
    pub date_range_days: i32,
    pub segment_ids: Vec<Uuid>,
    pub brand_ids: Vec<Uuid>,
    pub geography_ids: Vec<Uuid>,
    pub event_type_ids: Vec<Uuid>,
}

/// The resolved filter rows linked to one profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileFilters {
    pub segments: Vec<SegmentRow>,
    pub brands: Vec<BrandRow>,
    pub geographies: Vec<GeographyRow>,
    pub event_types: Vec<EventTypeRow>,
}

const PROFILE_COLUMNS: &str =
    "id, public_id, name, prompt_id, priority, date_range_days, is_active, created_at";

/// Fetches a profile by public UUID.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists.
pub async fn get_monitoring_profile(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<MonitoringProfileRow, DbError> {
    let row = sqlx::query_as::<_, MonitoringProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM monitoring_profiles WHERE public_id = $1",
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns all profiles, ordered by priority (highest first) then name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_monitoring_profiles(
    pool: &PgPool,
) -> Result<Vec<MonitoringProfileRow>, DbError> {
    let rows = sqlx::query_as::<_, MonitoringProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM monitoring_profiles ORDER BY priority DESC, name",
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns active profiles only, ordered by priority (highest first).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_monitoring_profiles(
    pool: &PgPool,
) -> Result<Vec<MonitoringProfileRow>, DbError> {
    let rows = sqlx::query_as::<_, MonitoringProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM monitoring_profiles \
         WHERE is_active = true ORDER BY priority DESC, name",
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Creates a profile and its filter links in one transaction.
///
/// Filter UUIDs that do not resolve to an existing reference row are a
/// [`DbError::NotFound`]; the whole insert rolls back.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] on a duplicate profile name, or
/// [`DbError::NotFound`] if the prompt or any filter UUID is unknown.
pub async fn create_monitoring_profile(
    pool: &PgPool,
    new: &NewMonitoringProfile,
) -> Result<MonitoringProfileRow, DbError> {
    let mut tx = pool.begin().await?;

    let prompt_id: i64 =
        sqlx::query_scalar("SELECT id FROM ai_prompts WHERE public_id = $1")
            .bind(new.prompt_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

    let row = sqlx::query_as::<_, MonitoringProfileRow>(&format!(
        "INSERT INTO monitoring_profiles (name, prompt_id, priority, date_range_days) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {PROFILE_COLUMNS}",
    ))
    .bind(&new.name)
    .bind(prompt_id)
    .bind(new.priority)
    .bind(new.date_range_days)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| DbError::from_sqlx(e, "profile name"))?;

    for segment_id in &new.segment_ids {
        let inserted = sqlx::query(
            "INSERT INTO monitoring_profile_segments (profile_id, segment_id) \
             SELECT $1, id FROM segments WHERE public_id = $2",
        )
        .bind(row.id)
        .bind(segment_id)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
    }

    for brand_id in &new.brand_ids {
        let inserted = sqlx::query(
            "INSERT INTO monitoring_profile_brands (profile_id, brand_id) \
             SELECT $1, id FROM brands WHERE public_id = $2",
        )
        .bind(row.id)
        .bind(brand_id)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
    }

    for geography_id in &new.geography_ids {
        let inserted = sqlx::query(
            "INSERT INTO monitoring_profile_geographies (profile_id, geography_id) \
             SELECT $1, id FROM geographies WHERE public_id = $2",
        )
        .bind(row.id)
        .bind(geography_id)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
    }

    for event_type_id in &new.event_type_ids {
        let inserted = sqlx::query(
            "INSERT INTO monitoring_profile_event_types (profile_id, event_type_id) \
             SELECT $1, id FROM event_types WHERE public_id = $2",
        )
        .bind(row.id)
        .bind(event_type_id)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
    }

    tx.commit().await?;

    Ok(row)
}

/// Loads the resolved filter rows for a profile (active reference rows only).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn get_profile_filters(
    pool: &PgPool,
    profile_id: i64,
) -> Result<ProfileFilters, DbError> {
    let segments = sqlx::query_as::<_, SegmentRow>(
        "SELECT s.id, s.public_id, s.name, s.slug, s.is_active, s.created_at \
         FROM segments s \
         JOIN monitoring_profile_segments mps ON mps.segment_id = s.id \
         WHERE mps.profile_id = $1 AND s.is_active = true \
         ORDER BY s.name",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await?;

    let brands = sqlx::query_as::<_, BrandRow>(
        "SELECT b.id, b.public_id, b.name, b.slug, b.website_url, b.is_active, \
                b.created_at, b.updated_at \
         FROM brands b \
         JOIN monitoring_profile_brands mpb ON mpb.brand_id = b.id \
         WHERE mpb.profile_id = $1 AND b.is_active = true \
         ORDER BY b.name",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await?;

    let geographies = sqlx::query_as::<_, GeographyRow>(
        "SELECT g.id, g.public_id, g.name, g.iso_code, g.is_active, g.created_at \
         FROM geographies g \
         JOIN monitoring_profile_geographies mpg ON mpg.geography_id = g.id \
         WHERE mpg.profile_id = $1 AND g.is_active = true \
         ORDER BY g.name",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await?;

    let event_types = sqlx::query_as::<_, EventTypeRow>(
        "SELECT e.id, e.public_id, e.slug, e.label, e.is_active, e.created_at \
         FROM event_types e \
         JOIN monitoring_profile_event_types mpe ON mpe.event_type_id = e.id \
         WHERE mpe.profile_id = $1 AND e.is_active = true \
         ORDER BY e.slug",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await?;

    Ok(ProfileFilters {
        segments,
        brands,
        geographies,
        event_types,
    })
}
