//! Fact bundle and configuration loading

pub mod bundle;
pub mod config;


pub use bundle::{BundleFormat, load_bundle, parse_bundle, validate_bundle};
pub use config::{ConfigError, DEFAULT_CONFIG_FILE, load_config, parse_config, resolve_config};
