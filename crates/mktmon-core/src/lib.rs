use thiserror::Error;

mod app_config;
mod config;
pub mod document_type;
pub mod seed;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use document_type::DocumentType;
pub use seed::{load_seed, SeedFile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read seed file {path}: {source}")]
    SeedFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse seed file: {0}")]
    SeedFileParse(#[from] serde_yaml::Error),

    #[error("seed validation failed: {0}")]
    Validation(String),
}

/// Generate a URL-safe slug from a display name.
///
/// Lowercases, maps spaces to dashes, strips everything that is not
/// ASCII-alphanumeric or a dash, and collapses dash runs.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else if c == ' ' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|&c| c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_simple_name() {
        assert_eq!(slugify("Craft Beverages"), "craft-beverages");
    }

    #[test]
    fn slugify_special_characters() {
        assert_eq!(slugify("Miller & Sons'"), "miller-sons");
    }

    #[test]
    fn slugify_collapses_dash_runs() {
        assert_eq!(slugify("A  -  B"), "a-b");
    }
}
