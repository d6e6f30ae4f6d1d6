use crate::ConfigError;

/// Parses the render floor; negative or non-numeric values are rejected
pub fn parse_render_min_ms(key: &str, value: &str) -> Result<u64, ConfigError> {
    let parsed: i64 = value.trim().parse().map_err(|_| {
        ConfigError::Validation(format!("{} must be an integer, got '{}'", key, value))
    })?;

    if parsed < 0 {
        return Err(ConfigError::Validation(format!(
            "{} must be >= 0, got {}",
            key, parsed
        )));
    }

    Ok(parsed as u64)
}

/// Parses a command timeout; it must be a positive number of milliseconds
pub fn parse_command_timeout_ms(key: &str, value: &str) -> Result<u64, ConfigError> {
    let parsed: u64 = value.trim().parse().map_err(|_| {
        ConfigError::Validation(format!(
            "{} must be a positive integer, got '{}'",
            key, value
        ))
    })?;

    if parsed == 0 {
        return Err(ConfigError::Validation(format!("{} must be > 0", key)));
    }

    Ok(parsed)
}

/// Parses a hub port in the range 1..=65535
pub fn parse_port(key: &str, value: &str) -> Result<u16, ConfigError> {
    let parsed: u32 = value.trim().parse().map_err(|_| {
        ConfigError::Validation(format!("{} must be an integer, got '{}'", key, value))
    })?;

    if parsed == 0 || parsed > u16::MAX as u32 {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and 65535, got {}",
            key, parsed
        )));
    }

    Ok(parsed as u16)
}

/// Parses a boolean flag (`true`/`false`, case-insensitive)
pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::Validation(format!(
            "{} must be 'true' or 'false', got '{}'",
            key, value
        ))),
    }
}

/// Validates a non-empty string option
pub fn parse_non_empty(key: &str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", key)));
    }
    Ok(trimmed.to_string())
}

/// Validates the hub path; it must be empty or start with `/`
pub fn parse_hub_path(key: &str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if !trimmed.is_empty() && !trimmed.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "{} must start with '/', got '{}'",
            key, value
        )));
    }
    Ok(trimmed.to_string())
}
