use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Endpoint URLs are http(s) and non-empty
/// - Poll/scan pacing values are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    for (name, url) in [
        ("endpoints.waiting_url", &config.endpoints.waiting_url),
        ("endpoints.bridge_url", &config.endpoints.bridge_url),
        ("endpoints.inventory_url", &config.endpoints.inventory_url),
        ("endpoints.origin", &config.endpoints.origin),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "{} must be an http(s) URL",
                name
            )));
        }
    }

    if config.flow.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "flow.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.flow.poll_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "flow.poll_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.flow.flow_deadline_secs == 0 {
        return Err(ConfigError::ValidationError(
            "flow.flow_deadline_secs cannot be 0".to_string(),
        ));
    }

    if config.handshake.length_budget == 0 {
        return Err(ConfigError::ValidationError(
            "handshake.length_budget cannot be 0".to_string(),
        ));
    }

    Ok(())
}
