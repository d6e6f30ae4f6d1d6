use std::collections::{BTreeMap, HashMap};

/// Opaque key-value mapping handed over by the caller
pub type Properties = HashMap<String, String>;

/// Minimum dwell on a page, in milliseconds
pub const RENDER_MIN_MS: &str = "render.min.ms";
/// Legacy spelling of [`RENDER_MIN_MS`]
pub const LEGACY_RENDER_MIN: &str = "http.min.render";
pub const HUB_HOST: &str = "hub.host";
pub const HUB_PORT: &str = "hub.port";
pub const HUB_PATH: &str = "hub.path";
/// Ceiling on any single hub command, in milliseconds
pub const HUB_COMMAND_TIMEOUT_MS: &str = "hub.command.timeout.ms";
pub const BROWSER: &str = "browser";
pub const BROWSER_HEADLESS: &str = "browser.headless";
/// Prefix of engine-specific options passed through to the hub untouched
pub const BROWSER_OPTION_PREFIX: &str = "browser.option.";
pub const JAVASCRIPT_ENABLED: &str = "javascript.enabled";
pub const CONTENT_ENCODING: &str = "content.encoding";

/// Ambient environment names for the hub location
pub const ENV_HUB_HOST: &str = "selenium.hub.host";
pub const ENV_HUB_PORT: &str = "selenium.hub.port";

pub const DEFAULT_RENDER_MIN_MS: u64 = 1500;
pub const DEFAULT_HUB_HOST: &str = "localhost";
pub const DEFAULT_HUB_PORT: u16 = 4444;
pub const DEFAULT_HUB_PATH: &str = "/wd/hub";
pub const DEFAULT_HUB_COMMAND_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_BROWSER: &str = "firefox";
pub const DEFAULT_CONTENT_ENCODING: &str = "UTF-8";

/// Resolved fetch configuration
///
/// Borrowed read-only by every stage of a fetch. The browser name and content
/// encoding are kept as given and checked when the capability profile and the
/// extractor are prepared, so a bad value still fails before any network I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Minimum wall time spent on a page waiting for scripts (milliseconds)
    pub render_min_ms: u64,

    /// Remote hub hostname
    pub hub_host: String,

    /// Remote hub port
    pub hub_port: u16,

    /// Hub endpoint path, e.g. `/wd/hub`
    pub hub_path: String,

    /// Longest any one hub command may take (milliseconds); navigation gets
    /// this on top of the page-load ceiling
    pub hub_command_timeout_ms: u64,

    /// Browser engine name (`firefox`, `chromium`, ...)
    pub browser: String,

    /// Whether the browser should execute page scripts
    pub javascript_enabled: bool,

    /// Run the engine without a visible window
    pub headless: bool,

    /// Charset label used to encode the rendered DOM
    pub content_encoding: String,

    /// Engine-specific options, keyed without the `browser.option.` prefix
    pub browser_options: BTreeMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            render_min_ms: DEFAULT_RENDER_MIN_MS,
            hub_host: DEFAULT_HUB_HOST.to_string(),
            hub_port: DEFAULT_HUB_PORT,
            hub_path: DEFAULT_HUB_PATH.to_string(),
            hub_command_timeout_ms: DEFAULT_HUB_COMMAND_TIMEOUT_MS,
            browser: DEFAULT_BROWSER.to_string(),
            javascript_enabled: true,
            headless: false,
            content_encoding: DEFAULT_CONTENT_ENCODING.to_string(),
            browser_options: BTreeMap::new(),
        }
    }
}

impl FetchConfig {
    /// Returns the hub endpoint, e.g. `http://localhost:4444/wd/hub`
    ///
    /// The result is not validated here; a malformed endpoint surfaces as an
    /// unavailable session when the hub is contacted.
    pub fn hub_url(&self) -> String {
        format!("http://{}:{}{}", self.hub_host, self.hub_port, self.hub_path)
    }
}
