//! Cosine-similarity document search over the pgvector `embedding` column.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// One semantic search result: document fields plus its similarity score.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SemanticHit {
    pub public_id: Uuid,
    pub title: String,
    pub source_url: String,
    pub document_type: String,
    pub published_date: Option<NaiveDate>,
    pub similarity: f64,
}

/// Ranks documents by cosine similarity (`1 - cosine distance`) against the
/// query embedding, keeping rows at or above `threshold`, best first. Ties
/// break toward the most recent `published_date`.
///
/// Documents without an embedding are never returned.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails — including when the vector
/// extension is missing, which callers degrade to an empty result set.
pub async fn semantic_search(
    pool: &PgPool,
    embedding: &pgvector::Vector,
    threshold: f64,
    limit: i64,
) -> Result<Vec<SemanticHit>, DbError> {
    let rows = sqlx::query_as::<_, SemanticHit>(
        "SELECT public_id, title, source_url, document_type, published_date, \
                1 - (embedding <=> $1) AS similarity \
         FROM documents \
         WHERE embedding IS NOT NULL \
           AND 1 - (embedding <=> $1) >= $2 \
         ORDER BY similarity DESC, published_date DESC NULLS LAST, id DESC \
         LIMIT $3",
    )
    .bind(embedding)
    .bind(threshold)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
