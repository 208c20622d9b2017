//! Reference-data seed file loading and validation.
//!
//! The seed file declares the brands, segments, geographies, and event types
//! the dashboard and classifier enumerate. It is synced into Postgres by the
//! CLI `seed` command; the database remains the single source of truth at
//! runtime.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{slugify, ConfigError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandSeed {
    pub name: String,
    pub website_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSeed {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeographySeed {
    pub name: String,
    pub iso_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTypeSeed {
    pub slug: String,
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub brands: Vec<BrandSeed>,
    #[serde(default)]
    pub segments: Vec<SegmentSeed>,
    #[serde(default)]
    pub geographies: Vec<GeographySeed>,
    #[serde(default)]
    pub event_types: Vec<EventTypeSeed>,
}

/// Load and validate the reference seed from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_seed(path: &Path) -> Result<SeedFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SeedFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let seed: SeedFile = serde_yaml::from_str(&content)?;
    validate_seed(&seed)?;

    Ok(seed)
}

fn validate_seed(seed: &SeedFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for brand in &seed.brands {
        if brand.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "brand name must be non-empty".to_string(),
            ));
        }
        if !seen.insert(slugify(&brand.name)) {
            return Err(ConfigError::Validation(format!(
                "duplicate brand: '{}'",
                brand.name
            )));
        }
    }

    seen.clear();
    for segment in &seed.segments {
        if segment.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "segment name must be non-empty".to_string(),
            ));
        }
        if !seen.insert(slugify(&segment.name)) {
            return Err(ConfigError::Validation(format!(
                "duplicate segment: '{}'",
                segment.name
            )));
        }
    }

    seen.clear();
    for geo in &seed.geographies {
        if geo.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "geography name must be non-empty".to_string(),
            ));
        }
        if !seen.insert(geo.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate geography: '{}'",
                geo.name
            )));
        }
    }

    seen.clear();
    for event_type in &seed.event_types {
        if event_type.slug.trim().is_empty() || event_type.label.trim().is_empty() {
            return Err(ConfigError::Validation(
                "event type slug and label must be non-empty".to_string(),
            ));
        }
        if !seen.insert(event_type.slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate event type slug: '{}'",
                event_type.slug
            )));
        }
    }

    Ok(())
}
