//! Browser module for talking to a remote WebDriver hub
//!
//! This module contains everything that touches a browser session, including:
//! - Capability profiles derived from the fetch configuration
//! - The session traits the orchestrator drives
//! - A WebDriver wire-protocol client for remote hubs

mod capabilities;
mod session;
mod webdriver;

pub use capabilities::{Browser, CapabilityProfile};
pub use session::{BrowserSession, DetachedQuit, ElementRef, SessionAcquirer, SessionGuard};
pub use webdriver::{
    build_http_client, RemoteHub, WebDriverError, WebDriverSession, DEFAULT_COMMAND_TIMEOUT,
    ELEMENT_KEY,
};
