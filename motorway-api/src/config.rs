//! API Configuration Module
//!
//! Bind address and CORS settings for the HTTP server, loaded from
//! environment variables with development-friendly defaults.

use std::net::SocketAddr;

use motorway_core::{env_or, ConfigError};

use crate::constants::{DEFAULT_API_BIND_HOST, DEFAULT_API_PORT, DEFAULT_CORS_MAX_AGE_SECS};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Interface to bind to.
    pub bind_host: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_API_BIND_HOST.to_string(),
            port: DEFAULT_API_PORT,
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `MOTORWAY_API_BIND`: Interface to bind (default: 0.0.0.0)
    /// - `PORT`, then `MOTORWAY_API_PORT`: Port (default: 3000)
    /// - `MOTORWAY_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `MOTORWAY_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    ///
    /// An unparsable port is kept as an error for [`ApiConfig::resolve_bind_addr`]
    /// rather than silently replaced by the default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_host =
            std::env::var("MOTORWAY_API_BIND").unwrap_or_else(|_| DEFAULT_API_BIND_HOST.to_string());

        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("MOTORWAY_API_PORT").ok())
        {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::invalid("port", &raw, "must be a TCP port number"))?,
            None => DEFAULT_API_PORT,
        };

        let cors_origins = std::env::var("MOTORWAY_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_host,
            port,
            cors_origins,
            cors_max_age_secs: env_or("MOTORWAY_CORS_MAX_AGE_SECS", DEFAULT_CORS_MAX_AGE_SECS),
        })
    }

    /// Socket address built from host and port.
    pub fn resolve_bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|_| ConfigError::invalid("bind_host", &addr, "not a valid socket address"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolve_bind_addr()?;
        if let Some(origin) = self
            .cors_origins
            .iter()
            .find(|origin| !origin.starts_with("http://") && !origin.starts_with("https://"))
        {
            return Err(ConfigError::invalid(
                "cors_origins",
                origin,
                "origins must start with http:// or https://",
            ));
        }
        Ok(())
    }
}
