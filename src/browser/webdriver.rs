//! WebDriver wire protocol client
//!
//! This module speaks the W3C WebDriver protocol (with fallbacks for legacy
//! JSON-wire replies) against a remote hub:
//! - Creating a session with a capability profile
//! - Setting the page-load timeout
//! - Navigating and reading the current URL
//! - Locating elements and reading their properties
//! - Quitting the session

use crate::browser::capabilities::CapabilityProfile;
use crate::browser::session::{BrowserSession, DetachedQuit, ElementRef, SessionAcquirer};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Key under which W3C drivers return element references
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Key used by legacy JSON-wire drivers for element references
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// W3C error code for an elapsed page-load (or implicit) timeout
const TIMEOUT_ERROR: &str = "timeout";

/// Errors reported while talking to a hub
#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("Invalid hub URL '{url}': {message}")]
    InvalidHubUrl { url: String, message: String },

    #[error("Hub transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Hub replied {status} ({error}): {message}")]
    Protocol {
        status: u16,
        error: String,
        message: String,
    },

    #[error("Malformed hub reply: {0}")]
    MalformedReply(String),
}

impl WebDriverError {
    /// Returns true when the browser gave up waiting for the page to load
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Protocol { error, .. } => error == TIMEOUT_ERROR,
            _ => false,
        }
    }

    /// Returns true when the hub could not be reached or did not answer in time
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout(),
            Self::InvalidHubUrl { .. } => true,
            _ => false,
        }
    }
}

/// Default ceiling on a single hub command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the HTTP client used for hub traffic
///
/// Every request is bounded by [`DEFAULT_COMMAND_TIMEOUT`] unless the command
/// sets its own deadline.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("sumi-render/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .timeout(DEFAULT_COMMAND_TIMEOUT)
        .build()
}

/// Session source backed by a remote WebDriver hub
#[derive(Debug, Clone)]
pub struct RemoteHub {
    client: Client,
    command_timeout: Duration,
}

impl RemoteHub {
    /// Creates a hub client with the default HTTP settings
    pub fn new() -> Result<Self, WebDriverError> {
        Ok(Self::with_client(build_http_client()?))
    }

    /// Creates a hub client around an existing HTTP client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Sets the deadline for each command on this hub and its sessions
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

#[async_trait]
impl SessionAcquirer for RemoteHub {
    type Session = WebDriverSession;

    async fn acquire(
        &self,
        hub_url: &str,
        profile: &CapabilityProfile,
    ) -> Result<WebDriverSession, WebDriverError> {
        let endpoint = parse_hub_url(hub_url)?;

        tracing::debug!(
            "Requesting {} session from {}",
            profile.browser(),
            endpoint
        );

        let request = self
            .client
            .post(format!("{}/session", endpoint))
            .timeout(self.command_timeout)
            .json(&profile.new_session_body());
        let body = send(request).await?;

        let id = body
            .get("value")
            .and_then(|v| v.get("sessionId"))
            .or_else(|| body.get("sessionId"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                WebDriverError::MalformedReply("new session reply carries no sessionId".to_string())
            })?
            .to_string();

        tracing::debug!("Acquired session {} from {}", id, endpoint);

        Ok(WebDriverSession {
            client: self.client.clone(),
            session_url: format!("{}/session/{}", endpoint, id),
            id,
            command_timeout: self.command_timeout,
            page_load_ms: AtomicU64::new(0),
            closed: false,
        })
    }
}

/// One live browser session on a remote hub
#[derive(Debug)]
pub struct WebDriverSession {
    client: Client,
    session_url: String,
    id: String,
    command_timeout: Duration,
    /// Page-load ceiling last accepted by the browser; zero until set
    page_load_ms: AtomicU64,
    closed: bool,
}

impl WebDriverSession {
    fn get(&self, suffix: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.session_url, suffix))
            .timeout(self.command_timeout)
    }

    fn post(&self, suffix: &str, body: &Value) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.session_url, suffix))
            .timeout(self.command_timeout)
            .json(body)
    }

    fn delete(&self) -> RequestBuilder {
        self.client
            .delete(self.session_url.as_str())
            .timeout(self.command_timeout)
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn set_page_load_timeout(&self, timeout: Duration) -> Result<(), WebDriverError> {
        let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        send(self.post("/timeouts", &json!({ "pageLoad": ms }))).await?;
        self.page_load_ms.store(ms, Ordering::Relaxed);
        Ok(())
    }

    async fn navigate(&self, url: &Url) -> Result<(), WebDriverError> {
        // The browser's own page-load timeout must be able to fire first
        let page_load = Duration::from_millis(self.page_load_ms.load(Ordering::Relaxed));
        let request = self
            .post("/url", &json!({ "url": url.as_str() }))
            .timeout(self.command_timeout.saturating_add(page_load));
        send(request).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, WebDriverError> {
        let body = send(self.get("/url")).await?;

        body.get("value")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| WebDriverError::MalformedReply("current URL is not a string".to_string()))
    }

    async fn find_element_by_tag(&self, tag: &str) -> Result<ElementRef, WebDriverError> {
        let request = self.post("/element", &json!({ "using": "tag name", "value": tag }));
        let body = send(request).await?;

        body.get("value")
            .and_then(|value| {
                value
                    .get(ELEMENT_KEY)
                    .or_else(|| value.get(LEGACY_ELEMENT_KEY))
            })
            .and_then(Value::as_str)
            .map(|id| ElementRef(id.to_string()))
            .ok_or_else(|| {
                WebDriverError::MalformedReply(format!("no element reference for <{}>", tag))
            })
    }

    async fn element_property(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, WebDriverError> {
        let request = self.get(&format!("/element/{}/property/{}", element.0, name));
        read_optional_string(send(request).await?)
    }

    async fn element_attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, WebDriverError> {
        let request = self.get(&format!("/element/{}/attribute/{}", element.0, name));
        read_optional_string(send(request).await?)
    }

    async fn quit(&mut self) -> Result<(), WebDriverError> {
        if self.closed {
            return Ok(());
        }
        // Marked first so a failed quit is not retried against a dead session
        self.closed = true;

        send(self.delete()).await?;
        tracing::debug!("Quit session {}", self.id);
        Ok(())
    }

    fn quit_detached(&mut self) -> Option<DetachedQuit> {
        if self.closed {
            return None;
        }
        self.closed = true;

        let request = self.delete();
        let id = self.id.clone();
        Some(Box::pin(async move {
            if let Err(e) = send(request).await {
                tracing::warn!("Failed to quit abandoned session {}: {}", id, e);
            }
        }))
    }
}

/// Validates the hub endpoint and strips any trailing slash
fn parse_hub_url(hub_url: &str) -> Result<String, WebDriverError> {
    let parsed = Url::parse(hub_url).map_err(|e| WebDriverError::InvalidHubUrl {
        url: hub_url.to_string(),
        message: e.to_string(),
    })?;

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(WebDriverError::InvalidHubUrl {
            url: hub_url.to_string(),
            message: "missing host".to_string(),
        });
    }

    Ok(hub_url.trim_end_matches('/').to_string())
}

/// Sends a command and decodes the reply, turning hub-reported errors into
/// [`WebDriverError::Protocol`]
async fn send(request: RequestBuilder) -> Result<Value, WebDriverError> {
    let response = request.send().await?;
    let status = response.status();
    let bytes = response.bytes().await?;

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(WebDriverError::Protocol {
                    status: status.as_u16(),
                    error: "unknown error".to_string(),
                    message: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }
            Err(e) => return Err(WebDriverError::MalformedReply(e.to_string())),
        }
    };

    check_reply(status, body)
}

/// Classifies a decoded reply body
fn check_reply(status: StatusCode, body: Value) -> Result<Value, WebDriverError> {
    let payload = error_payload(&body);

    // Legacy JSON-wire replies carry a numeric status; zero means success
    if let Some(code) = body.get("status").and_then(Value::as_i64) {
        if code != 0 {
            return Err(WebDriverError::Protocol {
                status: status.as_u16(),
                error: legacy_error_name(code).to_string(),
                message: payload.message,
            });
        }
    }

    if let Some(error) = payload.error {
        return Err(WebDriverError::Protocol {
            status: status.as_u16(),
            error,
            message: payload.message,
        });
    }

    if !status.is_success() {
        return Err(WebDriverError::Protocol {
            status: status.as_u16(),
            error: "unknown error".to_string(),
            message: payload.message,
        });
    }

    Ok(body)
}

/// Error fields of a reply's `value`, present only on failure
#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: String,
}

fn error_payload(body: &Value) -> ErrorPayload {
    body.get("value")
        .and_then(|value| ErrorPayload::deserialize(value).ok())
        .unwrap_or_default()
}

fn legacy_error_name(code: i64) -> &'static str {
    match code {
        6 => "invalid session id",
        7 => "no such element",
        13 => "unknown error",
        21 => TIMEOUT_ERROR,
        28 => "script timeout",
        33 => "session not created",
        _ => "unknown error",
    }
}

fn read_optional_string(body: Value) -> Result<Option<String>, WebDriverError> {
    match body.get("value") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(WebDriverError::MalformedReply(format!(
            "expected a string, got {}",
            other
        ))),
    }
}
