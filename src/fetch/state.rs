/// Fetch state definitions for tracking one fetch's progress
///
/// A fetch moves forward through these states and always ends in `Released`,
/// whether or not a session was ever acquired.
use std::fmt;

/// Represents the current state of a single fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    /// Nothing has happened yet
    Idle,

    /// Normalizing the URL and deriving capabilities and timings
    Preparing,

    /// A session is held and being configured
    Acquired,

    /// The browser is loading the page
    Navigating,

    /// Waiting for client-side scripts to render
    Dwelling,

    /// Reading the rendered document
    Extracting,

    /// Session released (or never acquired); the fetch is over
    Released,
}

impl FetchState {
    /// Returns true if this is the terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released)
    }

    /// Returns true if moving to `next` is a legal step
    ///
    /// Every non-terminal state after `Idle` may jump straight to `Released`
    /// on failure; otherwise states only move forward.
    pub fn can_transition_to(&self, next: FetchState) -> bool {
        use FetchState::*;

        match (self, next) {
            (Idle, Preparing) => true,
            (Preparing, Acquired) => true,
            (Acquired, Navigating) => true,
            (Navigating, Dwelling) | (Navigating, Extracting) => true,
            (Dwelling, Extracting) => true,
            (Released, _) => false,
            (Idle, _) => false,
            (_, Released) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Acquired => "acquired",
            Self::Navigating => "navigating",
            Self::Dwelling => "dwelling",
            Self::Extracting => "extracting",
            Self::Released => "released",
        }
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records the state of one fetch and traces every transition
#[derive(Debug)]
pub(crate) struct StateTracker {
    url: String,
    state: FetchState,
}

impl StateTracker {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            state: FetchState::Idle,
        }
    }

    pub(crate) fn state(&self) -> FetchState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: FetchState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal fetch transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!("{}: {} -> {}", self.url, self.state, next);
        self.state = next;
    }
}
