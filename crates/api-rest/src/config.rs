//! API server configuration.

use std::net::SocketAddr;

/// Server settings, loaded from the environment with sane defaults.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable output
    pub json_logs: bool,
    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,
    /// Serve the Swagger UI
    pub enable_swagger: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            log_level: "info".into(),
            json_logs: false,
            request_timeout_seconds: 30,
            enable_swagger: true,
        }
    }
}

impl ApiConfig {
    /// Load the configuration from `API_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            log_level: std::env::var("API_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logs: std::env::var("API_JSON_LOGS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.json_logs),
            request_timeout_seconds: std::env::var("API_REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_seconds),
            enable_swagger: std::env::var("API_ENABLE_SWAGGER")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(defaults.enable_swagger),
        }
    }

    /// The socket address to bind.
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid bind address: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bind_addr_parses() {
        let config = ApiConfig::default();
        assert!(config.bind_addr().is_ok());
    }
}
