//! Fetch module for rendering pages through a browser session
//!
//! This module contains the core fetch logic, including:
//! - The timing policy for page-load and render deadlines
//! - The fetch state machine and outcome classification
//! - DOM extraction and charset encoding
//! - Response assembly

mod extractor;
mod orchestrator;
mod response;
mod state;
mod timing;

pub use extractor::{encode_document, extract_dom, resolve_encoding, ExtractError};
pub use orchestrator::{fetch, fetch_with_cancel, Fetcher, PreparedFetch};
pub use response::{
    assemble, Capture, Outcome, Response, RENDER_TIMEOUT_HEADER, STATUS_CAPTURED, STATUS_NO_FETCH,
};
pub use state::FetchState;
pub use timing::TimingPlan;
