//! Capability profile construction
//!
//! Turns a [`FetchConfig`] into the capability documents a WebDriver hub
//! negotiates on. This is a pure transformation: no I/O happens here.

use crate::config::FetchConfig;
use crate::ConfigError;
use serde_json::{json, Map, Value};
use std::fmt;

/// Browser engines the hub can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Browser {
    Firefox,
    Chromium,
    Edge,
    Safari,
}

impl Browser {
    /// Parses a configured browser name (case-insensitive)
    ///
    /// Returns `ConfigError::UnknownBrowser` for anything unrecognized.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "firefox" => Ok(Self::Firefox),
            "chromium" | "chrome" => Ok(Self::Chromium),
            "edge" | "microsoftedge" => Ok(Self::Edge),
            "safari" => Ok(Self::Safari),
            _ => Err(ConfigError::UnknownBrowser(name.to_string())),
        }
    }

    /// The `browserName` value a hub expects for this engine
    pub fn capability_name(&self) -> &'static str {
        match self {
            Self::Firefox => "firefox",
            Self::Chromium => "chrome",
            Self::Edge => "MicrosoftEdge",
            Self::Safari => "safari",
        }
    }

    /// Vendor extension key holding engine-specific options
    pub fn options_key(&self) -> &'static str {
        match self {
            Self::Firefox => "moz:firefoxOptions",
            Self::Chromium => "goog:chromeOptions",
            Self::Edge => "ms:edgeOptions",
            Self::Safari => "safari:options",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.capability_name())
    }
}

/// Desired browser configuration sent to the hub when a session is created
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityProfile {
    browser: Browser,
    javascript_enabled: bool,
    engine_options: Map<String, Value>,
}

impl CapabilityProfile {
    /// Builds the profile for a configuration
    ///
    /// Engine options from `browser.option.*` are carried through verbatim;
    /// values that parse as JSON are inserted as JSON, anything else as a
    /// string. Headless mode and disabled scripts are layered on top.
    pub fn from_config(config: &FetchConfig) -> Result<Self, ConfigError> {
        let browser = Browser::from_name(&config.browser)?;

        let mut engine_options = Map::new();
        for (key, raw) in &config.browser_options {
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            engine_options.insert(key.clone(), value);
        }

        if config.headless {
            push_arg(&mut engine_options, headless_arg(browser));
        }

        if !config.javascript_enabled {
            disable_scripts(&mut engine_options, browser);
        }

        Ok(Self {
            browser,
            javascript_enabled: config.javascript_enabled,
            engine_options,
        })
    }

    pub fn browser(&self) -> Browser {
        self.browser
    }

    pub fn javascript_enabled(&self) -> bool {
        self.javascript_enabled
    }

    /// Request body for `POST /session`
    ///
    /// Carries both the W3C `capabilities` form and the legacy
    /// `desiredCapabilities` form so older grids can still negotiate.
    pub fn new_session_body(&self) -> Value {
        let mut always_match = Map::new();
        always_match.insert(
            "browserName".to_string(),
            Value::String(self.browser.capability_name().to_string()),
        );
        if !self.engine_options.is_empty() {
            always_match.insert(
                self.browser.options_key().to_string(),
                Value::Object(self.engine_options.clone()),
            );
        }

        let mut desired = always_match.clone();
        desired.insert(
            "javascriptEnabled".to_string(),
            Value::Bool(self.javascript_enabled),
        );

        json!({
            "capabilities": { "alwaysMatch": Value::Object(always_match) },
            "desiredCapabilities": Value::Object(desired),
        })
    }
}

fn headless_arg(browser: Browser) -> &'static str {
    match browser {
        Browser::Firefox => "-headless",
        _ => "--headless",
    }
}

fn push_arg(options: &mut Map<String, Value>, arg: &str) {
    let args = options
        .entry("args")
        .or_insert_with(|| Value::Array(Vec::new()));

    match args {
        Value::Array(list) => {
            if !list.iter().any(|a| a.as_str() == Some(arg)) {
                list.push(Value::String(arg.to_string()));
            }
        }
        other => {
            // A scalar `args` from the config becomes the first element
            let existing = other.take();
            *other = Value::Array(vec![existing, Value::String(arg.to_string())]);
        }
    }
}

fn disable_scripts(options: &mut Map<String, Value>, browser: Browser) {
    let (key, value) = match browser {
        Browser::Firefox => ("javascript.enabled", Value::Bool(false)),
        Browser::Chromium | Browser::Edge => (
            "profile.managed_default_content_settings.javascript",
            Value::from(2),
        ),
        // Safari exposes no per-session script switch
        Browser::Safari => return,
    };

    let prefs = options
        .entry("prefs")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(map) = prefs {
        map.insert(key.to_string(), value);
    }
}
