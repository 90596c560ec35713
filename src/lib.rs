//! Catalog Harvester: a bounded-concurrency catalog crawler
//!
//! This crate walks the paginated listing pages of a catalog site, collects the
//! detail-page links they contain, fetches every detail page through a rotating
//! pool of proxy sessions and extracts a structured record from each one.

pub mod config;
pub mod crawler;
pub mod output;

use std::time::Duration;
use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No usable network session could be created")]
    NoSessions,

    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Export error: {0}")]
    Export(#[from] output::OutputError),

    #[error("Run exceeded its time limit of {0:?}")]
    RunTimeout(Duration),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    harvest, harvest_with, Coordinator, HarvestReport, ProxyEndpoint, ProxyPool, Record,
};
