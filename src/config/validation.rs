use super::Config;
use anyhow::Result;
use url::Url;

/// Validation errors for configuration.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn error(path: &str, message: impl Into<String>) -> ConfigValidationError {
    ConfigValidationError {
        path: path.to_string(),
        message: message.into(),
    }
}

/// Validate a configuration object, collecting every problem.
pub fn validate_config(config: &Config) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(error("server.port", "Port must be greater than 0"));
    }

    if config.server.bind.parse::<std::net::IpAddr>().is_err() {
        errors.push(error(
            "server.bind",
            format!("'{}' is not an IP address", config.server.bind),
        ));
    }

    match Url::parse(&config.backend.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(error(
            "backend.baseUrl",
            format!("Unsupported scheme '{}', expected http or https", url.scheme()),
        )),
        Err(e) => errors.push(error("backend.baseUrl", format!("Invalid URL: {e}"))),
    }

    if config.backend.timeout_secs == 0 {
        errors.push(error("backend.timeoutSecs", "Timeout must be greater than 0"));
    }

    if config.sessions.idle_ttl_secs == 0 {
        errors.push(error("sessions.idleTtlSecs", "Idle TTL must be greater than 0"));
    }

    if config.sessions.max_sessions == 0 {
        errors.push(error("sessions.maxSessions", "At least one session must be allowed"));
    }

    errors
}

/// Validate configuration and return Result.
pub fn validate_config_object(config: &Config) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Configuration validation failed:\n{}", messages.join("\n"));
    }
}
