//! Database operations for the `sources` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `sources` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub url: String,
    pub source_kind: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

const SOURCE_COLUMNS: &str = "id, public_id, name, url, source_kind, is_active, created_at";

/// Returns all active sources, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_sources(pool: &PgPool) -> Result<Vec<SourceRow>, DbError> {
    let rows = sqlx::query_as::<_, SourceRow>(&format!(
        "SELECT {SOURCE_COLUMNS} FROM sources WHERE is_active = true ORDER BY name",
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Creates a source. The URL must be unique.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] on a duplicate URL.
pub async fn create_source(
    pool: &PgPool,
    name: &str,
    url: &str,
    source_kind: &str,
) -> Result<SourceRow, DbError> {
    let row = sqlx::query_as::<_, SourceRow>(&format!(
        "INSERT INTO sources (name, url, source_kind) VALUES ($1, $2, $3) \
         RETURNING {SOURCE_COLUMNS}",
    ))
    .bind(name)
    .bind(url)
    .bind(source_kind)
    .fetch_one(pool)
    .await
    .map_err(|e| DbError::from_sqlx(e, "source url"))?;

    Ok(row)
}

/// Soft-deletes a source by clearing `is_active`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched.
pub async fn deactivate_source(pool: &PgPool, public_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE sources SET is_active = false WHERE public_id = $1")
        .bind(public_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
