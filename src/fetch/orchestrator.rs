//! Fetch orchestration - the bounded navigate, dwell, and extract cycle
//!
//! This module drives one fetch from start to finish:
//! - Normalizing the target and preparing capabilities and timings
//! - Acquiring a session and setting its page-load ceiling
//! - Navigating, dwelling for scripts, and capturing the DOM
//! - Classifying timeouts, cancellation, and failures
//! - Releasing the session on every exit path
//!
//! Every hub command runs against its deadline and the caller's
//! cancellation token, so a hung hub cannot pin a fetch.

use crate::browser::{BrowserSession, CapabilityProfile, RemoteHub, SessionAcquirer, SessionGuard};
use crate::config::FetchConfig;
use crate::fetch::extractor::{extract_dom, resolve_encoding};
use crate::fetch::response::{assemble, Capture, Outcome, Response};
use crate::fetch::state::{FetchState, StateTracker};
use crate::fetch::timing::TimingPlan;
use crate::url::{is_file_url, normalize_target_url};
use crate::ConfigError;
use encoding_rs::Encoding;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything a fetch needs, resolved before any network I/O
#[derive(Debug, Clone)]
pub struct PreparedFetch {
    /// Normalized navigation target
    pub url: Url,
    pub profile: CapabilityProfile,
    pub timing: TimingPlan,
    pub encoding: &'static Encoding,
    /// Hub endpoint, validated only when contacted
    pub hub_url: String,
}

impl PreparedFetch {
    /// Normalizes the URL and derives the capability profile, timing plan,
    /// and output encoding
    ///
    /// Every configuration mistake surfaces here, before a session is opened.
    pub fn prepare(
        url: &str,
        per_call_timeout_ms: i64,
        config: &FetchConfig,
    ) -> Result<Self, ConfigError> {
        let url = normalize_target_url(url)?;
        let profile = CapabilityProfile::from_config(config)?;
        let timing = TimingPlan::new(config, per_call_timeout_ms);
        let encoding = resolve_encoding(&config.content_encoding)?;

        Ok(Self {
            url,
            profile,
            timing,
            encoding,
            hub_url: config.hub_url(),
        })
    }
}

/// Runs fetches against sessions from an acquirer
///
/// The fetcher holds no per-fetch state. Each call owns its session
/// exclusively, so one fetcher can serve many concurrent fetches.
#[derive(Debug, Clone)]
pub struct Fetcher<A: SessionAcquirer> {
    acquirer: A,
}

impl<A: SessionAcquirer> Fetcher<A> {
    pub fn new(acquirer: A) -> Self {
        Self { acquirer }
    }

    /// Fetches `url` with no external cancellation
    pub async fn fetch(
        &self,
        url: &str,
        per_call_timeout_ms: i64,
        config: &FetchConfig,
    ) -> Result<Response, ConfigError> {
        self.fetch_with_cancel(url, per_call_timeout_ms, config, &CancellationToken::new())
            .await
    }

    /// Fetches `url`, giving up as soon as `cancel` fires
    ///
    /// Only configuration errors are returned as `Err`; every other failure
    /// is reported through the response's status and outcome.
    pub async fn fetch_with_cancel(
        &self,
        url: &str,
        per_call_timeout_ms: i64,
        config: &FetchConfig,
        cancel: &CancellationToken,
    ) -> Result<Response, ConfigError> {
        let mut progress = StateTracker::new(url);
        progress.advance(FetchState::Preparing);

        let prepared = PreparedFetch::prepare(url, per_call_timeout_ms, config)?;
        Ok(self.run(prepared, cancel, progress).await)
    }

    async fn run(
        &self,
        prepared: PreparedFetch,
        cancel: &CancellationToken,
        mut progress: StateTracker,
    ) -> Response {
        let started = Instant::now();
        tracing::info!("Fetching URL {}", prepared.url);

        if cancel.is_cancelled() {
            tracing::warn!(
                "Fetch of {} cancelled before a session was requested",
                prepared.url
            );
            progress.advance(FetchState::Released);
            return assemble(Capture::failed(Outcome::Interrupted), prepared.url);
        }

        let acquire = self.acquirer.acquire(&prepared.hub_url, &prepared.profile);
        let session = match bounded(cancel, prepared.timing.command, acquire).await {
            Bounded::Done(Ok(session)) => session,
            Bounded::Done(Err(e)) => {
                let reason = if e.is_unreachable() {
                    "hub unreachable"
                } else {
                    "hub refused"
                };
                tracing::warn!(
                    "No session for {} from hub {} after {:?} ({}): {}",
                    prepared.url,
                    prepared.hub_url,
                    started.elapsed(),
                    reason,
                    e
                );
                progress.advance(FetchState::Released);
                return assemble(Capture::failed(Outcome::SessionUnavailable), prepared.url);
            }
            Bounded::Expired => {
                tracing::warn!(
                    "Hub {} created no session for {} within {:?}",
                    prepared.hub_url,
                    prepared.url,
                    prepared.timing.command
                );
                progress.advance(FetchState::Released);
                return assemble(Capture::failed(Outcome::SessionUnavailable), prepared.url);
            }
            Bounded::Cancelled => {
                // A session the hub opens after this point expires on the hub
                tracing::warn!(
                    "Fetch of {} cancelled while waiting for a session",
                    prepared.url
                );
                progress.advance(FetchState::Released);
                return assemble(Capture::failed(Outcome::Interrupted), prepared.url);
            }
        };
        progress.advance(FetchState::Acquired);

        let guard = SessionGuard::new(session);
        let capture = drive(guard.session(), &prepared, cancel, &mut progress).await;

        // Release errors never change the outcome
        let session_id = guard.session().id().to_string();
        if let Err(e) = guard.release().await {
            tracing::warn!(
                "Failed to release session {} for {}: {}",
                session_id,
                prepared.url,
                e
            );
        }
        progress.advance(FetchState::Released);

        let elapsed = started.elapsed();
        let response = assemble(capture, prepared.url);
        match response.outcome() {
            Outcome::Ok => tracing::info!(
                "Successfully fetched URL {} ({} bytes in {:?})",
                response.final_url(),
                response.body().len(),
                elapsed
            ),
            outcome => tracing::warn!(
                "Fetch of {} finished as {} after {:?}",
                response.final_url(),
                outcome,
                elapsed
            ),
        }

        response
    }
}

/// Fetches `url` through the hub named in `config`
///
/// # Example
///
/// ```no_run
/// use sumi_render::{fetch, FetchConfig};
///
/// # async fn example() -> Result<(), sumi_render::ConfigError> {
/// let response = fetch("http://localhost:8080/hello", 5000, &FetchConfig::default()).await?;
/// if response.status_code() == 200 {
///     println!("{}", String::from_utf8_lossy(response.body()));
/// }
/// # Ok(())
/// # }
/// ```
pub async fn fetch(
    url: &str,
    per_call_timeout_ms: i64,
    config: &FetchConfig,
) -> Result<Response, ConfigError> {
    fetch_with_cancel(url, per_call_timeout_ms, config, &CancellationToken::new()).await
}

/// Fetches `url` through the hub named in `config`, honoring `cancel`
pub async fn fetch_with_cancel(
    url: &str,
    per_call_timeout_ms: i64,
    config: &FetchConfig,
    cancel: &CancellationToken,
) -> Result<Response, ConfigError> {
    let mut progress = StateTracker::new(url);
    progress.advance(FetchState::Preparing);

    let prepared = PreparedFetch::prepare(url, per_call_timeout_ms, config)?;

    match RemoteHub::new() {
        Ok(hub) => {
            let hub = hub.with_command_timeout(prepared.timing.command);
            Ok(Fetcher::new(hub).run(prepared, cancel, progress).await)
        }
        Err(e) => {
            tracing::warn!("Cannot build hub client for {}: {}", prepared.url, e);
            progress.advance(FetchState::Released);
            Ok(assemble(
                Capture::failed(Outcome::SessionUnavailable),
                prepared.url,
            ))
        }
    }
}

/// How a hub command ended once raced against its deadline and the caller
enum Bounded<T> {
    Done(T),
    Expired,
    Cancelled,
}

/// Runs `command` until it completes, `limit` elapses, or `cancel` fires
///
/// Cancellation wins ties, so a command is never started once the token is
/// already cancelled.
async fn bounded<F: Future>(
    cancel: &CancellationToken,
    limit: Duration,
    command: F,
) -> Bounded<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Bounded::Cancelled,
        result = tokio::time::timeout(limit, command) => match result {
            Ok(output) => Bounded::Done(output),
            Err(_) => Bounded::Expired,
        },
    }
}

fn interrupted(url: &Url, stage: &str) -> Capture {
    tracing::warn!("Fetch of {} interrupted {}", url, stage);
    Capture::failed(Outcome::Interrupted)
}

/// Runs the session-holding part of a fetch and classifies its outcome
async fn drive<S: BrowserSession>(
    session: &S,
    prepared: &PreparedFetch,
    cancel: &CancellationToken,
    progress: &mut StateTracker,
) -> Capture {
    let url = &prepared.url;
    let timing = &prepared.timing;
    let is_file = is_file_url(url);

    // Local files have no transport to stall on
    if !is_file {
        let configure = session.set_page_load_timeout(timing.page_load);
        match bounded(cancel, timing.command, configure).await {
            Bounded::Done(Ok(())) => {}
            Bounded::Done(Err(e)) => {
                tracing::warn!("Could not set page-load timeout for {}: {}", url, e);
                return Capture::failed(Outcome::NavigationFailed);
            }
            Bounded::Expired => {
                tracing::warn!(
                    "Hub did not accept the page-load timeout for {} within {:?}",
                    url,
                    timing.command
                );
                return Capture::failed(Outcome::NavigationFailed);
            }
            Bounded::Cancelled => return interrupted(url, "before navigation"),
        }
    }

    progress.advance(FetchState::Navigating);
    let navigation_limit = timing.navigation_limit(is_file);
    match bounded(cancel, navigation_limit, session.navigate(url)).await {
        Bounded::Done(Ok(())) => {}
        Bounded::Done(Err(e)) if e.is_timeout() => {
            tracing::warn!(
                "WebDriver timed out loading {} after {:?}, capturing current DOM",
                url,
                timing.page_load
            );
            progress.advance(FetchState::Extracting);
            return capture_dom(session, prepared, cancel, Outcome::RenderTimeout).await;
        }
        Bounded::Done(Err(e)) => {
            tracing::warn!("Navigation to {} failed: {}", url, e);
            return Capture::failed(Outcome::NavigationFailed);
        }
        Bounded::Expired => {
            tracing::warn!(
                "Navigation to {} got no reply within {:?}",
                url,
                navigation_limit
            );
            return Capture::failed(Outcome::NavigationFailed);
        }
        Bounded::Cancelled => return interrupted(url, "during navigation"),
    }

    if !timing.skips_dwell() {
        progress.advance(FetchState::Dwelling);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return interrupted(url, "while waiting for render"),
            _ = tokio::time::sleep(timing.dwell) => {}
        }
    }

    progress.advance(FetchState::Extracting);
    capture_dom(session, prepared, cancel, Outcome::Ok).await
}

/// Extracts the DOM and tags it with `outcome`; extraction failure always
/// means the navigation is considered failed
async fn capture_dom<S: BrowserSession>(
    session: &S,
    prepared: &PreparedFetch,
    cancel: &CancellationToken,
    outcome: Outcome,
) -> Capture {
    let limit = prepared.timing.command;
    match bounded(cancel, limit, extract_dom(session, prepared.encoding)).await {
        Bounded::Done(Ok(body)) => {
            let final_url = read_final_url(session, cancel, limit).await;
            Capture::captured(outcome, final_url, body)
        }
        Bounded::Done(Err(e)) => {
            tracing::warn!("Failed to extract DOM of {}: {}", prepared.url, e);
            Capture::failed(Outcome::NavigationFailed)
        }
        Bounded::Expired => {
            tracing::warn!("DOM of {} not read within {:?}", prepared.url, limit);
            Capture::failed(Outcome::NavigationFailed)
        }
        Bounded::Cancelled => interrupted(&prepared.url, "while reading the DOM"),
    }
}

/// Reads the post-redirect URL; `None` keeps the requested one
async fn read_final_url<S: BrowserSession>(
    session: &S,
    cancel: &CancellationToken,
    limit: Duration,
) -> Option<Url> {
    match bounded(cancel, limit, session.current_url()).await {
        Bounded::Done(Ok(current)) => match Url::parse(&current) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::debug!("Browser reported unparseable URL '{}': {}", current, e);
                None
            }
        },
        Bounded::Done(Err(e)) => {
            tracing::debug!("Could not read current URL: {}", e);
            None
        }
        Bounded::Expired | Bounded::Cancelled => {
            tracing::debug!("Current URL not read in time");
            None
        }
    }
}
