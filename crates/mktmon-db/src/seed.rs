//! Sync the YAML reference seed into Postgres.

use mktmon_core::seed::SeedFile;
use sqlx::PgPool;

use crate::DbError;

/// Counts of reference rows touched by one seed sync.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedSummary {
    pub brands: usize,
    pub segments: usize,
    pub geographies: usize,
    pub event_types: usize,
}

/// Upsert reference data from a validated seed file.
///
/// Upserts match on the natural unique key (brand slug, segment slug,
/// geography name, event-type slug) and refresh the display fields. Rows
/// absent from the seed are left untouched. All writes run inside a single
/// transaction; any failure rolls back the whole batch.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn sync_seed(pool: &PgPool, seed: &SeedFile) -> Result<SeedSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    for brand in &seed.brands {
        let slug = mktmon_core::slugify(&brand.name);
        sqlx::query(
            "INSERT INTO brands (name, slug, website_url, is_active) \
             VALUES ($1, $2, $3, true) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 website_url = EXCLUDED.website_url, \
                 is_active = true, \
                 updated_at = NOW()",
        )
        .bind(&brand.name)
        .bind(&slug)
        .bind(&brand.website_url)
        .execute(&mut *tx)
        .await?;
        summary.brands += 1;
    }

    for segment in &seed.segments {
        let slug = mktmon_core::slugify(&segment.name);
        sqlx::query(
            "INSERT INTO segments (name, slug, is_active) VALUES ($1, $2, true) \
             ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name, is_active = true",
        )
        .bind(&segment.name)
        .bind(&slug)
        .execute(&mut *tx)
        .await?;
        summary.segments += 1;
    }

    for geo in &seed.geographies {
        sqlx::query(
            "INSERT INTO geographies (name, iso_code, is_active) VALUES ($1, $2, true) \
             ON CONFLICT (name) DO UPDATE SET iso_code = EXCLUDED.iso_code, is_active = true",
        )
        .bind(&geo.name)
        .bind(&geo.iso_code)
        .execute(&mut *tx)
        .await?;
        summary.geographies += 1;
    }

    for event_type in &seed.event_types {
        sqlx::query(
            "INSERT INTO event_types (slug, label, is_active) VALUES ($1, $2, true) \
             ON CONFLICT (slug) DO UPDATE SET label = EXCLUDED.label, is_active = true",
        )
        .bind(&event_type.slug)
        .bind(&event_type.label)
        .execute(&mut *tx)
        .await?;
        summary.event_types += 1;
    }

    tx.commit().await?;

    Ok(summary)
}
