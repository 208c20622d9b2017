//! Database operations for `search_runs` and `search_run_stages`.
//!
//! Run and stage status transitions are guarded in SQL (`WHERE status = ...`)
//! so a terminal row can never be flipped back; a lost guard surfaces as a
//! typed [`DbError::InvalidRunTransition`] / [`DbError::InvalidStageTransition`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `search_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub run_type: String,
    pub status: String,
    pub monitoring_profile_id: Option<Uuid>,
    pub documents_created: i32,
    pub events_created: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `search_run_stages` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchRunStageRow {
    pub id: i64,
    pub search_run_id: i64,
    pub stage_name: String,
    pub status: String,
    pub documents_processed: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
}

const RUN_COLUMNS: &str = "id, public_id, run_type, status, monitoring_profile_id, \
     documents_created, events_created, started_at, completed_at, \
     execution_time_ms, error_message, created_at";

const STAGE_COLUMNS: &str = "id, search_run_id, stage_name, status, documents_processed, \
     started_at, completed_at, error_message, metadata";

// ---------------------------------------------------------------------------
// search_runs operations
// ---------------------------------------------------------------------------

/// Creates a new search run in `running` status with `started_at = NOW()`.
///
/// `monitoring_profile_id` is the caller-supplied profile UUID; it is recorded
/// before the profile lookup so a run that fails fast is still inspectable.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_search_run(
    pool: &PgPool,
    run_type: &str,
    monitoring_profile_id: Option<Uuid>,
) -> Result<SearchRunRow, DbError> {
    let row = sqlx::query_as::<_, SearchRunRow>(&format!(
        "INSERT INTO search_runs (run_type, status, monitoring_profile_id, started_at) \
         VALUES ($1, 'running', $2, NOW()) \
         RETURNING {RUN_COLUMNS}",
    ))
    .bind(run_type)
    .bind(monitoring_profile_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Adds stage results to the run's running totals. Only valid while the run
/// is still `running`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is already terminal.
pub async fn add_run_totals(
    pool: &PgPool,
    id: i64,
    documents_created: i32,
    events_created: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE search_runs \
         SET documents_created = documents_created + $1, \
             events_created = events_created + $2 \
         WHERE id = $3 AND status = 'running'",
    )
    .bind(documents_created)
    .bind(events_created)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `completed`, sets `completed_at = NOW()` and the elapsed
/// wall-clock time.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`.
pub async fn complete_search_run(
    pool: &PgPool,
    id: i64,
    execution_time_ms: i64,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE search_runs \
         SET status = 'completed', completed_at = NOW(), execution_time_ms = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(execution_time_ms)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed`, sets `completed_at = NOW()` and `error_message`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`.
pub async fn fail_search_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE search_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its public UUID.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists.
pub async fn get_search_run(pool: &PgPool, public_id: Uuid) -> Result<SearchRunRow, DbError> {
    let row = sqlx::query_as::<_, SearchRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM search_runs WHERE public_id = $1",
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists.
pub async fn get_search_run_by_id(pool: &PgPool, id: i64) -> Result<SearchRunRow, DbError> {
    let row = sqlx::query_as::<_, SearchRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM search_runs WHERE id = $1",
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, ordered by `created_at DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_search_runs(pool: &PgPool, limit: i64) -> Result<Vec<SearchRunRow>, DbError> {
    let rows = sqlx::query_as::<_, SearchRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM search_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Deletes a run by public UUID. Stage rows cascade at the schema level.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched.
pub async fn delete_search_run(pool: &PgPool, public_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM search_runs WHERE public_id = $1")
        .bind(public_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// search_run_stages operations
// ---------------------------------------------------------------------------

/// Creates a stage record in `running` status with `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including an unknown
/// `stage_name`, rejected by the CHECK constraint).
pub async fn create_run_stage(
    pool: &PgPool,
    search_run_id: i64,
    stage_name: &str,
) -> Result<SearchRunStageRow, DbError> {
    let row = sqlx::query_as::<_, SearchRunStageRow>(&format!(
        "INSERT INTO search_run_stages (search_run_id, stage_name, status, started_at) \
         VALUES ($1, $2, 'running', NOW()) \
         RETURNING {STAGE_COLUMNS}",
    ))
    .bind(search_run_id)
    .bind(stage_name)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a stage as `success` with its processed count and metadata.
///
/// # Errors
///
/// Returns [`DbError::InvalidStageTransition`] if the stage is not `running`.
pub async fn complete_run_stage(
    pool: &PgPool,
    id: i64,
    documents_processed: i32,
    metadata: &serde_json::Value,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE search_run_stages \
         SET status = 'success', documents_processed = $1, metadata = $2, completed_at = NOW() \
         WHERE id = $3 AND status = 'running'",
    )
    .bind(documents_processed)
    .bind(metadata)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidStageTransition { id });
    }

    Ok(())
}

/// Marks a stage as `failed` with its error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidStageTransition`] if the stage is not `running`.
pub async fn fail_run_stage(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE search_run_stages \
         SET status = 'failed', error_message = $1, completed_at = NOW() \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidStageTransition { id });
    }

    Ok(())
}

/// Returns all stage rows for a run in creation order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_run_stages(
    pool: &PgPool,
    search_run_id: i64,
) -> Result<Vec<SearchRunStageRow>, DbError> {
    let rows = sqlx::query_as::<_, SearchRunStageRow>(&format!(
        "SELECT {STAGE_COLUMNS} FROM search_run_stages \
         WHERE search_run_id = $1 \
         ORDER BY id",
    ))
    .bind(search_run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
