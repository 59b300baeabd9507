//! Configuration types

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Parse an environment variable, falling back to `default` when unset or invalid.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a boolean flag (`true`, `1`, `yes`) from the environment.
pub fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

// ============================================================================
// CACHE TIERS
// ============================================================================

/// Freshness tier for a memoized read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheTier {
    /// Age after which an entry is no longer served.
    pub max_age: Duration,
    /// Fraction of `max_age` after which a background refresh may be issued.
    pub pre_fetch_ratio: f64,
}

impl CacheTier {
    pub fn new(max_age: Duration, pre_fetch_ratio: f64) -> Self {
        Self {
            max_age,
            pre_fetch_ratio,
        }
    }

    /// Age at which a served entry becomes eligible for background refresh.
    pub fn refresh_after(&self) -> Duration {
        self.max_age.mul_f64(self.pre_fetch_ratio.clamp(0.0, 1.0))
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.max_age.is_zero() {
            return Err(ConfigError::invalid(
                &format!("{}.max_age", field),
                format!("{:?}", self.max_age),
                "max_age must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.pre_fetch_ratio) {
            return Err(ConfigError::invalid(
                &format!("{}.pre_fetch_ratio", field),
                self.pre_fetch_ratio,
                "pre_fetch_ratio must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }
}

/// Named tiers, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheTiers {
    pub short: CacheTier,
    pub medium: CacheTier,
    pub long: CacheTier,
}

pub const DEFAULT_PRE_FETCH_RATIO: f64 = 0.8;
pub const DEFAULT_SHORT_TTL_SECS: u64 = 60;
pub const DEFAULT_MEDIUM_TTL_SECS: u64 = 300;
pub const DEFAULT_LONG_TTL_SECS: u64 = 1800;

impl Default for CacheTiers {
    fn default() -> Self {
        Self {
            short: CacheTier::new(
                Duration::from_secs(DEFAULT_SHORT_TTL_SECS),
                DEFAULT_PRE_FETCH_RATIO,
            ),
            medium: CacheTier::new(
                Duration::from_secs(DEFAULT_MEDIUM_TTL_SECS),
                DEFAULT_PRE_FETCH_RATIO,
            ),
            long: CacheTier::new(
                Duration::from_secs(DEFAULT_LONG_TTL_SECS),
                DEFAULT_PRE_FETCH_RATIO,
            ),
        }
    }
}

// ============================================================================
// RETRY
// ============================================================================

/// Retry configuration for storage reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Cap applied to every individual delay (not to the whole operation).
    pub max_delay: Duration,
    /// Jitter upper bound as a fraction of the exponential term.
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            jitter_ratio: 0.1,
        }
    }
}

impl RetryConfig {
    /// Environment variables:
    /// - `MOTORWAY_RETRY_MAX_ATTEMPTS` (default: 3)
    /// - `MOTORWAY_RETRY_BASE_DELAY_MS` (default: 1000)
    /// - `MOTORWAY_RETRY_MAX_DELAY_MS` (default: 10000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: env_or("MOTORWAY_RETRY_MAX_ATTEMPTS", defaults.max_attempts),
            base_delay: Duration::from_millis(env_or(
                "MOTORWAY_RETRY_BASE_DELAY_MS",
                defaults.base_delay.as_millis() as u64,
            )),
            max_delay: Duration::from_millis(env_or(
                "MOTORWAY_RETRY_MAX_DELAY_MS",
                defaults.max_delay.as_millis() as u64,
            )),
            jitter_ratio: defaults.jitter_ratio,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "retry.max_attempts",
                self.max_attempts,
                "max_attempts must be at least 1",
            ));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::invalid(
                "retry.max_delay",
                format!("{:?}", self.max_delay),
                "max_delay must be >= base_delay",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(ConfigError::invalid(
                "retry.jitter_ratio",
                self.jitter_ratio,
                "jitter_ratio must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// CACHE
// ============================================================================

/// Configuration for the memoized read caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub tiers: CacheTiers,
    pub retry: RetryConfig,
    /// Resident keys per parameterized cache before LRU eviction.
    pub max_keyed_entries: usize,
    /// Refresh entries in the background once past `refresh_after()`.
    pub background_refresh: bool,
}

pub const DEFAULT_MAX_KEYED_ENTRIES: usize = 100;

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tiers: CacheTiers::default(),
            retry: RetryConfig::default(),
            max_keyed_entries: DEFAULT_MAX_KEYED_ENTRIES,
            background_refresh: false,
        }
    }
}

impl CacheConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `MOTORWAY_CACHE_SHORT_TTL_SECS` (default: 60)
    /// - `MOTORWAY_CACHE_MEDIUM_TTL_SECS` (default: 300)
    /// - `MOTORWAY_CACHE_LONG_TTL_SECS` (default: 1800)
    /// - `MOTORWAY_CACHE_PRE_FETCH_RATIO` (default: 0.8)
    /// - `MOTORWAY_CACHE_MAX_KEYED_ENTRIES` (default: 100)
    /// - `MOTORWAY_CACHE_BACKGROUND_REFRESH` (default: false)
    pub fn from_env() -> Self {
        let ratio = env_or("MOTORWAY_CACHE_PRE_FETCH_RATIO", DEFAULT_PRE_FETCH_RATIO);
        let tier = |key: &str, default: u64| {
            CacheTier::new(Duration::from_secs(env_or(key, default)), ratio)
        };

        Self {
            tiers: CacheTiers {
                short: tier("MOTORWAY_CACHE_SHORT_TTL_SECS", DEFAULT_SHORT_TTL_SECS),
                medium: tier("MOTORWAY_CACHE_MEDIUM_TTL_SECS", DEFAULT_MEDIUM_TTL_SECS),
                long: tier("MOTORWAY_CACHE_LONG_TTL_SECS", DEFAULT_LONG_TTL_SECS),
            },
            retry: RetryConfig::from_env(),
            max_keyed_entries: env_or("MOTORWAY_CACHE_MAX_KEYED_ENTRIES", DEFAULT_MAX_KEYED_ENTRIES),
            background_refresh: env_flag("MOTORWAY_CACHE_BACKGROUND_REFRESH", false),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - every tier has a positive max_age and a ratio in [0.0, 1.0]
    /// - max_keyed_entries > 0
    /// - the retry configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tiers.short.validate("tiers.short")?;
        self.tiers.medium.validate("tiers.medium")?;
        self.tiers.long.validate("tiers.long")?;

        if self.max_keyed_entries == 0 {
            return Err(ConfigError::invalid(
                "max_keyed_entries",
                self.max_keyed_entries,
                "max_keyed_entries must be greater than 0",
            ));
        }

        self.retry.validate()
    }
}

// ============================================================================
// REQUEST MONITORING
// ============================================================================

pub const DEFAULT_SLOW_REQUEST_MS: u64 = 1000;
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;
pub const DEFAULT_HISTORY_TTL_SECS: u64 = 3600;
pub const DEFAULT_TOP_ENDPOINTS: usize = 10;
pub const DEFAULT_HISTORY_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Configuration for request performance monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Requests taking at least this long are logged and counted as slow.
    pub slow_request_threshold: Duration,
    /// Maximum number of request metrics kept in history.
    pub history_capacity: usize,
    /// Age after which a request metric leaves history.
    pub history_ttl: Duration,
    /// Endpoints listed in the "slowest" section of the metrics report.
    pub top_endpoints: usize,
    /// Interval of the background job that prunes expired history.
    pub cleanup_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            slow_request_threshold: Duration::from_millis(DEFAULT_SLOW_REQUEST_MS),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            history_ttl: Duration::from_secs(DEFAULT_HISTORY_TTL_SECS),
            top_endpoints: DEFAULT_TOP_ENDPOINTS,
            cleanup_interval: Duration::from_secs(DEFAULT_HISTORY_CLEANUP_INTERVAL_SECS),
        }
    }
}

impl MonitorConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `MOTORWAY_SLOW_REQUEST_MS` (default: 1000)
    /// - `MOTORWAY_HISTORY_CAPACITY` (default: 1000)
    /// - `MOTORWAY_HISTORY_TTL_SECS` (default: 3600)
    /// - `MOTORWAY_TOP_ENDPOINTS` (default: 10)
    /// - `MOTORWAY_HISTORY_CLEANUP_INTERVAL_SECS` (default: 300)
    pub fn from_env() -> Self {
        Self {
            slow_request_threshold: Duration::from_millis(env_or(
                "MOTORWAY_SLOW_REQUEST_MS",
                DEFAULT_SLOW_REQUEST_MS,
            )),
            history_capacity: env_or("MOTORWAY_HISTORY_CAPACITY", DEFAULT_HISTORY_CAPACITY),
            history_ttl: Duration::from_secs(env_or(
                "MOTORWAY_HISTORY_TTL_SECS",
                DEFAULT_HISTORY_TTL_SECS,
            )),
            top_endpoints: env_or("MOTORWAY_TOP_ENDPOINTS", DEFAULT_TOP_ENDPOINTS),
            cleanup_interval: Duration::from_secs(env_or(
                "MOTORWAY_HISTORY_CLEANUP_INTERVAL_SECS",
                DEFAULT_HISTORY_CLEANUP_INTERVAL_SECS,
            )),
        }
    }

    /// Create a configuration for development with a short cleanup cycle.
    pub fn development() -> Self {
        Self {
            slow_request_threshold: Duration::from_millis(500),
            history_capacity: 200,
            history_ttl: Duration::from_secs(600),
            top_endpoints: DEFAULT_TOP_ENDPOINTS,
            cleanup_interval: Duration::from_secs(30),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::invalid(
                "history_capacity",
                self.history_capacity,
                "history_capacity must be greater than 0",
            ));
        }
        if self.history_ttl.is_zero() {
            return Err(ConfigError::invalid(
                "history_ttl",
                format!("{:?}", self.history_ttl),
                "history_ttl must be positive",
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::invalid(
                "cleanup_interval",
                format!("{:?}", self.cleanup_interval),
                "cleanup_interval must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_keyed_entries, 100);
        assert!(!config.background_refresh);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(1000));
        assert_eq!(config.retry.max_delay, Duration::from_millis(10_000));
    }

    #[test]
    fn test_refresh_after() {
        let tier = CacheTier::new(Duration::from_secs(10), 0.8);
        assert_eq!(tier.refresh_after(), Duration::from_secs(8));
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = CacheConfig::default();
        config.tiers.short.max_age = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_ratio_out_of_range() {
        let mut config = CacheConfig::default();
        config.tiers.long.pre_fetch_ratio = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = CacheConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = CacheConfig {
            max_keyed_entries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_defaults() {
        // Without environment variables set, should use defaults
        let config = CacheConfig::from_env();
        assert_eq!(config.tiers, CacheTiers::default());
        assert_eq!(config.max_keyed_entries, DEFAULT_MAX_KEYED_ENTRIES);
    }

    #[test]
    fn test_monitor_config_defaults() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.slow_request_threshold, Duration::from_millis(1000));
        assert_eq!(config.history_capacity, 1000);
        assert_eq!(config.history_ttl, Duration::from_secs(3600));
        assert_eq!(config.top_endpoints, 10);
    }

    #[test]
    fn test_monitor_config_rejects_zero_capacity() {
        let config = MonitorConfig {
            history_capacity: 0,
            ..MonitorConfig::development()
        };
        assert!(config.validate().is_err());
    }
}
