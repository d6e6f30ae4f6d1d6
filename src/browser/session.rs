//! Session traits and scoped ownership
//!
//! This module defines the trait interface the fetch orchestrator drives and
//! the guard that guarantees every acquired session is released.

use crate::browser::capabilities::CapabilityProfile;
use crate::browser::webdriver::WebDriverError;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

/// Quit command that runs after its session's owner has gone away
pub type DetachedQuit = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Opaque reference to an element inside a session's current document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(pub String);

/// A source of browser sessions
#[async_trait]
pub trait SessionAcquirer: Send + Sync {
    type Session: BrowserSession;

    /// Opens a session on the hub at `hub_url` using `profile`
    ///
    /// Fails when the hub URL is malformed, the hub is unreachable, or the
    /// hub rejects the requested capabilities.
    async fn acquire(
        &self,
        hub_url: &str,
        profile: &CapabilityProfile,
    ) -> Result<Self::Session, WebDriverError>;
}

/// One live browser instance, owned by a single fetch
#[async_trait]
pub trait BrowserSession: Send + Sync + 'static {
    /// Hub-assigned session identifier
    fn id(&self) -> &str;

    /// Sets the ceiling the browser waits for a page's load event
    async fn set_page_load_timeout(&self, timeout: Duration) -> Result<(), WebDriverError>;

    /// Loads `url`, following redirects
    async fn navigate(&self, url: &Url) -> Result<(), WebDriverError>;

    /// URL the browser currently shows
    async fn current_url(&self) -> Result<String, WebDriverError>;

    /// Finds the first element with the given tag name
    async fn find_element_by_tag(&self, tag: &str) -> Result<ElementRef, WebDriverError>;

    /// Reads a DOM property of an element; `None` when the property is null
    async fn element_property(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, WebDriverError>;

    /// Reads an attribute of an element; `None` when absent
    async fn element_attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, WebDriverError>;

    /// Terminates the session
    ///
    /// Must be idempotent: calls after the first are no-ops.
    async fn quit(&mut self) -> Result<(), WebDriverError>;

    /// Hands back a quit command that can run without `self`
    ///
    /// Used when a session is dropped without an explicit release. Returns
    /// `None` when there is nothing left to close.
    fn quit_detached(&mut self) -> Option<DetachedQuit> {
        None
    }
}

/// Owns a session from acquisition until release
///
/// [`SessionGuard::release`] quits the session exactly once. If the guard is
/// dropped first (for example because the fetch future was cancelled), the
/// quit is scheduled on the current tokio runtime instead.
#[derive(Debug)]
pub struct SessionGuard<S: BrowserSession> {
    session: S,
    released: bool,
}

impl<S: BrowserSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            released: false,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Quits the session
    ///
    /// The error is returned for logging only; callers must not let it change
    /// the outcome of the fetch.
    pub async fn release(mut self) -> Result<(), WebDriverError> {
        self.released = true;
        self.session.quit().await
    }
}

impl<S: BrowserSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let Some(quit) = self.session.quit_detached() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!("Scheduling quit for dropped session {}", self.session.id());
                handle.spawn(quit);
            }
            Err(_) => {
                tracing::warn!(
                    "Session {} dropped outside a runtime; it will expire on the hub",
                    self.session.id()
                );
            }
        }
    }
}
