use crate::config::types::*;
use crate::config::validation::{
    parse_bool, parse_command_timeout_ms, parse_hub_path, parse_non_empty, parse_port,
    parse_render_min_ms,
};
use crate::{ConfigError, ConfigResult};
use std::path::Path;

impl FetchConfig {
    /// Resolves a configuration from caller properties and the process environment
    ///
    /// Precedence is explicit property > environment > default. Only the hub
    /// host and port are read from the environment, under
    /// `selenium.hub.host` and `selenium.hub.port`.
    pub fn from_properties(props: &Properties) -> ConfigResult<Self> {
        Self::from_sources(props, |name| std::env::var(name).ok())
    }

    /// Resolves a configuration with an injectable environment lookup
    ///
    /// Unknown keys are ignored; missing keys take their documented defaults.
    ///
    /// # Example
    ///
    /// ```
    /// use sumi_render::config::{FetchConfig, Properties};
    ///
    /// let mut props = Properties::new();
    /// props.insert("render.min.ms".to_string(), "250".to_string());
    ///
    /// let config = FetchConfig::from_sources(&props, |name| match name {
    ///     "selenium.hub.host" => Some("grid.internal".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(config.render_min_ms, 250);
    /// assert_eq!(config.hub_host, "grid.internal");
    /// assert_eq!(config.hub_port, 4444);
    /// ```
    pub fn from_sources<F>(props: &Properties, env: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = FetchConfig::default();

        // The canonical key beats its legacy alias
        if let Some(value) = props.get(RENDER_MIN_MS) {
            config.render_min_ms = parse_render_min_ms(RENDER_MIN_MS, value)?;
        } else if let Some(value) = props.get(LEGACY_RENDER_MIN) {
            config.render_min_ms = parse_render_min_ms(LEGACY_RENDER_MIN, value)?;
        }

        if let Some(value) = props.get(HUB_HOST) {
            config.hub_host = parse_non_empty(HUB_HOST, value)?;
        } else if let Some(value) = env(ENV_HUB_HOST) {
            config.hub_host = parse_non_empty(ENV_HUB_HOST, &value)?;
        }

        if let Some(value) = props.get(HUB_PORT) {
            config.hub_port = parse_port(HUB_PORT, value)?;
        } else if let Some(value) = env(ENV_HUB_PORT) {
            config.hub_port = parse_port(ENV_HUB_PORT, &value)?;
        }

        if let Some(value) = props.get(HUB_PATH) {
            config.hub_path = parse_hub_path(HUB_PATH, value)?;
        }

        if let Some(value) = props.get(HUB_COMMAND_TIMEOUT_MS) {
            config.hub_command_timeout_ms =
                parse_command_timeout_ms(HUB_COMMAND_TIMEOUT_MS, value)?;
        }

        if let Some(value) = props.get(BROWSER) {
            config.browser = parse_non_empty(BROWSER, value)?;
        }

        if let Some(value) = props.get(BROWSER_HEADLESS) {
            config.headless = parse_bool(BROWSER_HEADLESS, value)?;
        }

        if let Some(value) = props.get(JAVASCRIPT_ENABLED) {
            config.javascript_enabled = parse_bool(JAVASCRIPT_ENABLED, value)?;
        }

        if let Some(value) = props.get(CONTENT_ENCODING) {
            config.content_encoding = parse_non_empty(CONTENT_ENCODING, value)?;
        }

        for (key, value) in props {
            if let Some(option) = key.strip_prefix(BROWSER_OPTION_PREFIX) {
                if !option.is_empty() {
                    config
                        .browser_options
                        .insert(option.to_string(), value.clone());
                }
            }
        }

        Ok(config)
    }
}

/// Loads fetch properties from a TOML file and resolves them
///
/// Nested tables are flattened into dotted keys, so `[render] min.ms = 100`
/// and `"render.min.ms" = 100` are equivalent.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sumi_render::config::load_config;
///
/// let config = load_config(Path::new("render.toml")).unwrap();
/// println!("Hub: {}", config.hub_url());
/// ```
pub fn load_config(path: &Path) -> ConfigResult<FetchConfig> {
    let props = load_properties(path)?;
    FetchConfig::from_properties(&props)
}

/// Reads a TOML file into flat dotted-key properties without resolving them
pub fn load_properties(path: &Path) -> ConfigResult<Properties> {
    let content = std::fs::read_to_string(path)?;
    parse_properties(&content)
}

/// Parses TOML text into flat dotted-key properties
pub fn parse_properties(content: &str) -> ConfigResult<Properties> {
    let table: toml::Table = toml::from_str(content)?;

    let mut props = Properties::new();
    flatten_table("", &table, &mut props);
    Ok(props)
}

fn flatten_table(prefix: &str, table: &toml::Table, out: &mut Properties) {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            toml::Value::Table(inner) => flatten_table(&full_key, inner, out),
            toml::Value::String(s) => {
                out.insert(full_key, s.clone());
            }
            other => {
                out.insert(full_key, other.to_string());
            }
        }
    }
}
