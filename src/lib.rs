//! Sumi-Render: a JavaScript-aware page fetcher
//!
//! This crate drives a remote WebDriver hub to load a page, waits for
//! client-side scripts to settle, and captures the rendered DOM as bytes.
//! All fetch failures are folded into the returned [`Response`]; only
//! configuration mistakes surface as errors.

pub mod browser;
pub mod config;
pub mod fetch;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Render operations
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// These represent invalid inputs detected before any network I/O and are the
/// only errors that cross the [`fetch()`] boundary.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unknown browser: {0}")]
    UnknownBrowser(String),

    #[error("Unsupported content encoding: {0}")]
    UnsupportedEncoding(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

impl From<UrlError> for ConfigError {
    fn from(err: UrlError) -> Self {
        ConfigError::InvalidUrl(err.to_string())
    }
}

/// Result type alias for Sumi-Render operations
pub type Result<T> = std::result::Result<T, RenderError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{FetchConfig, Properties};
pub use fetch::{fetch, fetch_with_cancel, Fetcher, Outcome, Response};
pub use url::normalize_target_url;
