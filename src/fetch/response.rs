//! Response assembly
//!
//! Maps the outcome of a fetch onto the response handed back to the caller.
//! The status code is synthetic: the browser channel does not expose the
//! document's HTTP status, so 200 means "DOM captured" and 0 means "no fetch".

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use url::Url;

/// Header set when a DOM was captured after the page-load deadline elapsed
pub const RENDER_TIMEOUT_HEADER: &str = "x-render-timeout";

/// Status reported when a DOM was captured
pub const STATUS_CAPTURED: u16 = 200;

/// Status reported when nothing was fetched
pub const STATUS_NO_FETCH: u16 = 0;

/// How a fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Page loaded, dwell completed, DOM captured
    Ok,

    /// Page load timed out but a (possibly partial) DOM was captured
    RenderTimeout,

    /// Cancelled before the DOM was read
    Interrupted,

    /// Navigation or extraction failed
    NavigationFailed,

    /// No session could be obtained from the hub
    SessionUnavailable,
}

impl Outcome {
    /// Returns true if this outcome carries a DOM body
    pub fn is_captured(&self) -> bool {
        matches!(self, Self::Ok | Self::RenderTimeout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::RenderTimeout => "render_timeout",
            Self::Interrupted => "interrupted",
            Self::NavigationFailed => "navigation_failed",
            Self::SessionUnavailable => "session_unavailable",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the orchestrator produced before assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub outcome: Outcome,
    /// URL reported by the browser after redirects, if it could be read
    pub final_url: Option<Url>,
    pub body: Vec<u8>,
}

impl Capture {
    /// A DOM was read from the session
    pub fn captured(outcome: Outcome, final_url: Option<Url>, body: Vec<u8>) -> Self {
        Self {
            outcome,
            final_url,
            body,
        }
    }

    /// Nothing usable came back
    pub fn failed(outcome: Outcome) -> Self {
        Self {
            outcome,
            final_url: None,
            body: Vec::new(),
        }
    }
}

/// Result of fetching one URL
///
/// Immutable once assembled; read it through the accessors.
#[derive(Debug, Clone)]
pub struct Response {
    final_url: Url,
    status_code: u16,
    headers: HeaderMap,
    body: Vec<u8>,
    outcome: Outcome,
}

impl Response {
    /// URL the browser ended on, or the requested URL when unknown
    pub fn final_url(&self) -> &Url {
        &self.final_url
    }

    /// Synthetic status: 200 when a DOM was captured, 0 otherwise
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Response headers; lookups are case-insensitive
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Looks up a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_captured(&self) -> bool {
        self.status_code == STATUS_CAPTURED
    }

    pub fn render_timed_out(&self) -> bool {
        self.header(RENDER_TIMEOUT_HEADER) == Some("true")
    }
}

/// Builds the caller-facing response for a capture
///
/// | Outcome | status | body | headers |
/// |---------|--------|------|---------|
/// | Ok | 200 | extracted bytes | none |
/// | RenderTimeout | 200 | partial bytes | `X-Render-Timeout: true` |
/// | Interrupted | 0 | empty | none |
/// | NavigationFailed | 0 | empty | none |
/// | SessionUnavailable | 0 | empty | none |
pub fn assemble(capture: Capture, requested: Url) -> Response {
    let final_url = capture.final_url.unwrap_or(requested);
    let mut headers = HeaderMap::new();

    let (status_code, body) = match capture.outcome {
        Outcome::Ok => (STATUS_CAPTURED, capture.body),
        Outcome::RenderTimeout => {
            headers.insert(
                HeaderName::from_static(RENDER_TIMEOUT_HEADER),
                HeaderValue::from_static("true"),
            );
            (STATUS_CAPTURED, capture.body)
        }
        Outcome::Interrupted | Outcome::NavigationFailed | Outcome::SessionUnavailable => {
            (STATUS_NO_FETCH, Vec::new())
        }
    };

    Response {
        final_url,
        status_code,
        headers,
        body,
        outcome: capture.outcome,
    }
}
