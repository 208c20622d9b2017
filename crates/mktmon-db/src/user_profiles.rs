//! Database operations for the `user_profiles` table.
//!
//! Users are never hard-deleted; removal is a deactivation so historical
//! attribution stays intact.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `user_profiles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserProfileRow {
    pub id: i64,
    pub public_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, public_id, email, display_name, role, is_active, created_at";

/// Returns all user profiles (active and deactivated), ordered by email.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_user_profiles(pool: &PgPool) -> Result<Vec<UserProfileRow>, DbError> {
    let rows = sqlx::query_as::<_, UserProfileRow>(&format!(
        "SELECT {USER_COLUMNS} FROM user_profiles ORDER BY email",
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Creates a user profile. Emails are unique.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] on a duplicate email.
pub async fn create_user_profile(
    pool: &PgPool,
    email: &str,
    display_name: &str,
    role: &str,
) -> Result<UserProfileRow, DbError> {
    let row = sqlx::query_as::<_, UserProfileRow>(&format!(
        "INSERT INTO user_profiles (email, display_name, role) VALUES ($1, $2, $3) \
         RETURNING {USER_COLUMNS}",
    ))
    .bind(email)
    .bind(display_name)
    .bind(role)
    .fetch_one(pool)
    .await
    .map_err(|e| DbError::from_sqlx(e, "user email"))?;

    Ok(row)
}

/// Deactivates a user profile.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched.
pub async fn deactivate_user_profile(pool: &PgPool, public_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE user_profiles SET is_active = false WHERE public_id = $1")
        .bind(public_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
