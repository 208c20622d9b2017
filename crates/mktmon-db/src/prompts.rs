//! Database operations for the `ai_prompts` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `ai_prompts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromptRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub template: String,
    pub purpose: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const PROMPT_COLUMNS: &str =
    "id, public_id, name, template, purpose, is_active, created_at, updated_at";

/// Returns all active prompts, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_prompts(pool: &PgPool) -> Result<Vec<PromptRow>, DbError> {
    let rows = sqlx::query_as::<_, PromptRow>(&format!(
        "SELECT {PROMPT_COLUMNS} FROM ai_prompts WHERE is_active = true ORDER BY name",
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches a prompt by public UUID.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists.
pub async fn get_prompt(pool: &PgPool, public_id: Uuid) -> Result<PromptRow, DbError> {
    let row = sqlx::query_as::<_, PromptRow>(&format!(
        "SELECT {PROMPT_COLUMNS} FROM ai_prompts WHERE public_id = $1",
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Fetches a prompt by internal id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists.
pub async fn get_prompt_by_id(pool: &PgPool, id: i64) -> Result<PromptRow, DbError> {
    let row = sqlx::query_as::<_, PromptRow>(&format!(
        "SELECT {PROMPT_COLUMNS} FROM ai_prompts WHERE id = $1",
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Creates a prompt. Names are unique.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] on a duplicate name.
pub async fn create_prompt(
    pool: &PgPool,
    name: &str,
    template: &str,
    purpose: &str,
) -> Result<PromptRow, DbError> {
    let row = sqlx::query_as::<_, PromptRow>(&format!(
        "INSERT INTO ai_prompts (name, template, purpose) VALUES ($1, $2, $3) \
         RETURNING {PROMPT_COLUMNS}",
    ))
    .bind(name)
    .bind(template)
    .bind(purpose)
    .fetch_one(pool)
    .await
    .map_err(|e| DbError::from_sqlx(e, "prompt name"))?;

    Ok(row)
}

/// Updates a prompt's template and/or purpose.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched.
pub async fn update_prompt(
    pool: &PgPool,
    public_id: Uuid,
    template: Option<&str>,
    purpose: Option<&str>,
) -> Result<PromptRow, DbError> {
    let row = sqlx::query_as::<_, PromptRow>(&format!(
        "UPDATE ai_prompts \
         SET template = COALESCE($1, template), \
             purpose = COALESCE($2, purpose), \
             updated_at = NOW() \
         WHERE public_id = $3 \
         RETURNING {PROMPT_COLUMNS}",
    ))
    .bind(template)
    .bind(purpose)
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Soft-deletes a prompt.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched.
pub async fn deactivate_prompt(pool: &PgPool, public_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ai_prompts SET is_active = false, updated_at = NOW() WHERE public_id = $1",
    )
    .bind(public_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
