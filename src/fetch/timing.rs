//! Timing policy for a single fetch
//!
//! Two deadlines interact here. The browser-side page-load ceiling guards
//! transport stalls, and the caller's per-URL timeout guards the whole call.
//! The page-load ceiling is pinned to the render floor, so script-heavy
//! pages that never fire `load` cannot eat the caller's budget before the
//! dwell starts.

use crate::config::FetchConfig;
use std::time::Duration;

/// Deadlines applied to one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingPlan {
    /// Ceiling the browser waits for the page's load event
    pub page_load: Duration,

    /// Render floor from the configuration
    pub render_wait: Duration,

    /// Time actually spent waiting between navigation and extraction
    pub dwell: Duration,

    /// Ceiling on any single hub command
    pub command: Duration,
}

impl TimingPlan {
    /// Computes the plan for a configuration and a per-call timeout
    ///
    /// A per-call timeout of zero or less means the caller set no deadline,
    /// in which case the full render floor is used as the dwell.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use sumi_render::config::FetchConfig;
    /// use sumi_render::fetch::TimingPlan;
    ///
    /// let config = FetchConfig { render_min_ms: 1500, ..FetchConfig::default() };
    /// let plan = TimingPlan::new(&config, 800);
    ///
    /// assert_eq!(plan.page_load, Duration::from_millis(1500));
    /// assert_eq!(plan.dwell, Duration::from_millis(800));
    /// ```
    pub fn new(config: &FetchConfig, per_call_timeout_ms: i64) -> Self {
        let render_wait = Duration::from_millis(config.render_min_ms);

        let dwell = if per_call_timeout_ms <= 0 {
            render_wait
        } else {
            render_wait.min(Duration::from_millis(per_call_timeout_ms as u64))
        };

        Self {
            page_load: render_wait,
            render_wait,
            dwell,
            command: Duration::from_millis(config.hub_command_timeout_ms),
        }
    }

    /// Longest a navigation command may run before it counts as a failure
    ///
    /// The browser reports its own page-load timeout first; the command
    /// ceiling on top covers a hub that never answers. File targets get no
    /// page-load ceiling, so only the command ceiling applies.
    pub fn navigation_limit(&self, is_file: bool) -> Duration {
        if is_file {
            self.command
        } else {
            self.page_load + self.command
        }
    }

    /// Returns true when extraction should follow navigation immediately
    pub fn skips_dwell(&self) -> bool {
        self.dwell.is_zero()
    }
}
