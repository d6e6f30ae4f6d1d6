//! URL handling module for Sumi-Render
//!
//! Fetch targets are normalized once, before any capability negotiation, so
//! the browser always receives an absolute locator.

mod normalize;

pub use normalize::{is_file_url, normalize_target_url};
