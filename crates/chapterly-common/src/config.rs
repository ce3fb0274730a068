//! Configuration types for Chapterly
//!
//! This module defines the configuration structures consumed by the
//! server binary. Every section has a `Default` so a partial TOML file or
//! a bare environment still yields a runnable config.

use crate::error::{Error, Result};
use crate::types::YearRange;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for Chapterly
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener configuration
    pub server: ServerConfig,
    /// Document store configuration
    pub store: StoreConfig,
    /// Response cache configuration
    pub cache: CacheConfig,
    /// Rate limiter configuration
    pub rate_limit: RateLimitConfig,
    /// Admin authentication
    pub auth: AuthConfig,
    /// Record schema configuration
    pub records: RecordConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Reject configurations the service cannot run with
    ///
    /// # Errors
    /// Returns `Error::Configuration` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.auth.admin_key.trim().is_empty() {
            return Err(Error::Configuration(
                "admin key must be set (CHAPTERLY_ADMIN_KEY)".to_string(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(Error::Configuration("cache TTL must be positive".to_string()));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(Error::Configuration(
                "rate limit window must be positive".to_string(),
            ));
        }
        if self.rate_limit.public_limit == 0 || self.rate_limit.admin_limit == 0 {
            return Err(Error::Configuration(
                "rate limit budgets must be positive".to_string(),
            ));
        }
        if self.records.years.first > self.records.years.last {
            return Err(Error::Configuration(format!(
                "year range {} is inverted",
                self.records.years
            )));
        }
        Ok(())
    }
}

/// HTTP listener configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Maximum accepted upload size in bytes (default: 50 MB)
    pub max_upload_bytes: usize,
    /// Take the client address from `x-forwarded-for` (only behind a
    /// trusted reverse proxy)
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_upload_bytes: 50 * 1024 * 1024, // 50 MB
            trust_proxy: false,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Document store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `memory://` or `redb://<path>`
    pub uri: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "memory://".to_string(),
        }
    }
}

/// Response cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// `memory://` or `redis://host:port`
    pub uri: String,
    /// Time-to-live for cached read responses
    pub ttl_secs: u64,
    /// Upper bound for a single cache call
    pub timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            uri: "memory://".to_string(),
            ttl_secs: 300,
            timeout_ms: 250,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Rate limiter configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per window for public traffic, keyed by IP
    pub public_limit: u64,
    /// Requests per window for admin traffic, keyed by `admin_<IP>`
    pub admin_limit: u64,
    /// Window length in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            public_limit: 30,
            admin_limit: 100,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Admin authentication
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared admin secret
    pub admin_key: String,
}

/// Record schema configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    /// Years tracked in `yearWiseQuestionCount`
    pub years: YearRange,
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.auth.admin_key = "secret".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.max_upload_bytes, 50 * 1024 * 1024);
        assert!(!config.server.trust_proxy);
        assert_eq!(config.rate_limit.public_limit, 30);
        assert_eq!(config.rate_limit.admin_limit, 100);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
        assert_eq!(config.records.years, YearRange::default());
    }

    #[test]
    fn test_validate_requires_admin_key() {
        assert!(matches!(
            ServiceConfig::default().validate(),
            Err(Error::Configuration(_))
        ));
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_budgets() {
        let mut config = valid();
        config.rate_limit.public_limit = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.cache.ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"server":{"port":8080},"logging":{"format":"json"}}"#)
                .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.cache.ttl_secs, 300);
    }
}
