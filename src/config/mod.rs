//! Configuration module for Sumi-Render
//!
//! This module resolves the fetcher's options from a flat key-value mapping,
//! the ambient environment, and documented defaults, and can load that mapping
//! from a TOML file.
//!
//! # Example
//!
//! ```no_run
//! use sumi_render::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("render.toml")).unwrap();
//! println!("Dwelling at least {}ms per page", config.render_min_ms);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::*;

// Re-export parser functions
pub use parser::{load_config, load_properties, parse_properties};
