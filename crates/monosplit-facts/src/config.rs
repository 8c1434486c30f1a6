//! Pipeline configuration from TOML

use std::path::{Path, PathBuf};

use monosplit_core::PipelineConfig;
use thiserror::Error;

/// Looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "monosplit.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&content)?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// An explicit path must exist; otherwise `dir/monosplit.toml` is used if
/// present, else the defaults.
pub fn resolve_config(explicit: Option<&Path>, dir: &Path) -> Result<PipelineConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    let fallback = dir.join(DEFAULT_CONFIG_FILE);
    if fallback.is_file() {
        return load_config(&fallback);
    }
    tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
    Ok(PipelineConfig::default())
}

fn validate_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if !config.amplification.is_finite() || config.amplification < 0.0 {
        return Err(ConfigError::Invalid {
            field: "amplification",
            reason: format!("{} is not a non-negative number", config.amplification),
        });
    }
    if config.level == 0 {
        return Err(ConfigError::Invalid {
            field: "level",
            reason: "levels start at 1".to_string(),
        });
    }
    if config.max_levels == 0 {
        return Err(ConfigError::Invalid {
            field: "max_levels",
            reason: "must allow at least one level".to_string(),
        });
    }
    Ok(())
}
