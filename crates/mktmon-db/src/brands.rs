//! Database operations for the `brands` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `brands` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BrandRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub slug: String,
    pub website_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const BRAND_COLUMNS: &str =
    "id, public_id, name, slug, website_url, is_active, created_at, updated_at";

/// Returns all active brands, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_brands(pool: &PgPool) -> Result<Vec<BrandRow>, DbError> {
    let rows = sqlx::query_as::<_, BrandRow>(&format!(
        "SELECT {BRAND_COLUMNS} FROM brands WHERE is_active = true ORDER BY name",
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches a brand by public UUID.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists.
pub async fn get_brand(pool: &PgPool, public_id: Uuid) -> Result<BrandRow, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "SELECT {BRAND_COLUMNS} FROM brands WHERE public_id = $1",
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Creates a brand. Name and derived slug must be unique.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] on a duplicate name or slug.
pub async fn create_brand(
    pool: &PgPool,
    name: &str,
    website_url: Option<&str>,
) -> Result<BrandRow, DbError> {
    let slug = mktmon_core::slugify(name);

    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "INSERT INTO brands (name, slug, website_url) VALUES ($1, $2, $3) \
         RETURNING {BRAND_COLUMNS}",
    ))
    .bind(name)
    .bind(&slug)
    .bind(website_url)
    .fetch_one(pool)
    .await
    .map_err(|e| DbError::from_sqlx(e, "brand name"))?;

    Ok(row)
}

/// Updates a brand's name and/or website URL.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched, or [`DbError::Conflict`]
/// on a duplicate name.
pub async fn update_brand(
    pool: &PgPool,
    public_id: Uuid,
    name: Option<&str>,
    website_url: Option<&str>,
) -> Result<BrandRow, DbError> {
    let slug = name.map(mktmon_core::slugify);

    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "UPDATE brands \
         SET name = COALESCE($1, name), \
             slug = COALESCE($2, slug), \
             website_url = COALESCE($3, website_url), \
             updated_at = NOW() \
         WHERE public_id = $4 \
         RETURNING {BRAND_COLUMNS}",
    ))
    .bind(name)
    .bind(slug.as_deref())
    .bind(website_url)
    .bind(public_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| DbError::from_sqlx(e, "brand name"))?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Soft-deletes a brand by clearing `is_active`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched.
pub async fn deactivate_brand(pool: &PgPool, public_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE brands SET is_active = false, updated_at = NOW() WHERE public_id = $1",
    )
    .bind(public_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
