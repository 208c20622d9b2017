//! Database operations for `documents` and its linking tables.
//!
//! A document's lifecycle is owned by three pipeline stages in strict order:
//! stub insert (source hunter), content update (content fetcher), links +
//! embedding (document processor). Nothing here enforces that ordering; the
//! orchestrator's sequential stage execution does.

use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `documents` table, without the embedding column.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentRow {
    pub id: i64,
    pub public_id: Uuid,
    pub title: String,
    pub source_url: String,
    pub url_hash: i64,
    pub document_type: String,
    pub content_text: Option<String>,
    pub content_html: Option<String>,
    pub content_length: Option<i32>,
    pub file_size: Option<i64>,
    pub error_message: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub published_date: Option<NaiveDate>,
    pub search_run_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a document stub.
#[derive(Debug, Clone)]
pub struct NewDocumentStub {
    pub title: String,
    pub source_url: String,
    pub document_type: String,
    pub published_date: Option<NaiveDate>,
    pub search_run_id: Option<i64>,
}

const DOCUMENT_COLUMNS: &str = "id, public_id, title, source_url, url_hash, document_type, \
     content_text, content_html, content_length, file_size, error_message, \
     fetched_at, processed_at, published_date, search_run_id, created_at";

/// Derive a stable 64-bit key from a source URL.
///
/// Takes the first 8 bytes of SHA-256(url) interpreted as a big-endian
/// integer. The same URL always produces the same key, which drives
/// within-batch deduplication during source hunting.
#[must_use]
pub fn document_url_hash(url: &str) -> i64 {
    let hash = Sha256::digest(url.as_bytes());
    let bytes: [u8; 8] = hash[..8].try_into().expect("SHA256 is at least 8 bytes");
    #[allow(clippy::cast_possible_wrap)]
    let key = u64::from_be_bytes(bytes) as i64;
    key
}

/// Inserts a document stub (title + URL, no content yet).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_document_stub(
    pool: &PgPool,
    stub: &NewDocumentStub,
) -> Result<DocumentRow, DbError> {
    let row = sqlx::query_as::<_, DocumentRow>(&format!(
        "INSERT INTO documents \
             (title, source_url, url_hash, document_type, published_date, search_run_id) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {DOCUMENT_COLUMNS}",
    ))
    .bind(&stub.title)
    .bind(&stub.source_url)
    .bind(document_url_hash(&stub.source_url))
    .bind(&stub.document_type)
    .bind(stub.published_date)
    .bind(stub.search_run_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a document by its public UUID.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists.
pub async fn get_document(pool: &PgPool, public_id: Uuid) -> Result<DocumentRow, DbError> {
    let row = sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE public_id = $1",
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Fetches a document by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists.
pub async fn get_document_by_id(pool: &PgPool, id: i64) -> Result<DocumentRow, DbError> {
    let row = sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1",
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` documents, optionally filtered to one run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_documents(
    pool: &PgPool,
    limit: i64,
    search_run_id: Option<i64>,
) -> Result<Vec<DocumentRow>, DbError> {
    let rows = sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents \
         WHERE ($2::BIGINT IS NULL OR search_run_id = $2) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    ))
    .bind(limit)
    .bind(search_run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the documents with the given internal ids, in id order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_documents_by_ids(
    pool: &PgPool,
    ids: &[i64],
) -> Result<Vec<DocumentRow>, DbError> {
    let rows = sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ANY($1) ORDER BY id",
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Writes fetched content onto a document and stamps `fetched_at`.
///
/// Clears any `error_message` left by a previous failed fetch.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched.
pub async fn update_document_content(
    pool: &PgPool,
    id: i64,
    content_text: &str,
    content_html: Option<&str>,
    content_length: i32,
    file_size: i64,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE documents \
         SET content_text = $1, content_html = $2, content_length = $3, \
             file_size = $4, error_message = NULL, fetched_at = NOW() \
         WHERE id = $5",
    )
    .bind(content_text)
    .bind(content_html)
    .bind(content_length)
    .bind(file_size)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Records a per-document failure (fetch or processing) without touching content.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched.
pub async fn set_document_error(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE documents SET error_message = $1 WHERE id = $2")
        .bind(error_message)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Stores the embedding vector and stamps `processed_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matched.
pub async fn mark_document_processed(
    pool: &PgPool,
    id: i64,
    embedding: &pgvector::Vector,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE documents SET embedding = $1, processed_at = NOW(), error_message = NULL \
         WHERE id = $2",
    )
    .bind(embedding)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Links a document to a brand. Re-linking is a no-op, which keeps
/// reprocessing idempotent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn link_document_brand(pool: &PgPool, document_id: i64, brand_id: i64) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO document_brands (document_id, brand_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(document_id)
    .bind(brand_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Links a document to a segment. See [`link_document_brand`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn link_document_segment(
    pool: &PgPool,
    document_id: i64,
    segment_id: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO document_segments (document_id, segment_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(document_id)
    .bind(segment_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Links a document to a geography. See [`link_document_brand`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn link_document_geography(
    pool: &PgPool,
    document_id: i64,
    geography_id: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO document_geographies (document_id, geography_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(document_id)
    .bind(geography_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Links a document to an event type. See [`link_document_brand`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn link_document_event_type(
    pool: &PgPool,
    document_id: i64,
    event_type_id: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO document_event_types (document_id, event_type_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(document_id)
    .bind(event_type_id)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_hash_is_stable() {
        let url = "https://example.com/article-1";
        assert_eq!(document_url_hash(url), document_url_hash(url));
    }

    #[test]
    fn different_urls_produce_different_hashes() {
        assert_ne!(
            document_url_hash("https://example.com/a"),
            document_url_hash("https://example.com/b")
        );
    }
}
