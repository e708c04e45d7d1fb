//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::{Result, TurnstileError};

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Named limiter quotas
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Interval between expired-record sweeps, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

fn default_sweep_interval() -> u64 {
    300
}

/// A single limiter quota: a fixed window length and an admission ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitConfig {
    /// Window length in milliseconds
    pub window_ms: i64,
    /// Maximum admitted requests per window
    pub max_requests: u32,
}

impl LimitConfig {
    /// Fifteen minutes, the window shared by all default quotas.
    pub const FIFTEEN_MINUTES_MS: i64 = 15 * 60 * 1000;
}

/// Quotas for the named limiters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Admin/moderation endpoints
    #[serde(default = "default_admin_limit")]
    pub admin: LimitConfig,

    /// General API endpoints
    #[serde(default = "default_api_limit")]
    pub api: LimitConfig,

    /// Authentication endpoints
    #[serde(default = "default_auth_limit")]
    pub auth: LimitConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            admin: default_admin_limit(),
            api: default_api_limit(),
            auth: default_auth_limit(),
        }
    }
}

fn default_admin_limit() -> LimitConfig {
    LimitConfig {
        window_ms: LimitConfig::FIFTEEN_MINUTES_MS,
        max_requests: 50,
    }
}

fn default_api_limit() -> LimitConfig {
    LimitConfig {
        window_ms: LimitConfig::FIFTEEN_MINUTES_MS,
        max_requests: 100,
    }
}

fn default_auth_limit() -> LimitConfig {
    LimitConfig {
        window_ms: LimitConfig::FIFTEEN_MINUTES_MS,
        max_requests: 10,
    }
}

impl TurnstileConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TurnstileConfig = serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject quotas a limiter cannot enforce.
    pub fn validate(&self) -> Result<()> {
        for (name, limit) in [
            ("admin", self.limits.admin),
            ("api", self.limits.api),
            ("auth", self.limits.auth),
        ] {
            if limit.window_ms <= 0 {
                return Err(TurnstileError::Config(format!(
                    "limiter '{}' has non-positive window_ms {}",
                    name, limit.window_ms
                )));
            }
            if limit.max_requests == 0 {
                return Err(TurnstileError::Config(format!(
                    "limiter '{}' has max_requests of zero",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_quotas() {
        let config = TurnstileConfig::default();
        assert_eq!(config.limits.admin.max_requests, 50);
        assert_eq!(config.limits.api.max_requests, 100);
        assert_eq!(config.limits.auth.max_requests, 10);
        assert_eq!(config.limits.admin.window_ms, 900_000);
        assert_eq!(config.limits.api.window_ms, 900_000);
        assert_eq!(config.limits.auth.window_ms, 900_000);
    }

    #[test]
    fn test_parse_partial_yaml_fills_defaults() {
        let yaml = r#"
server:
  listen_addr: "0.0.0.0:9000"
limits:
  auth:
    window_ms: 60000
    max_requests: 5
"#;
        let config = TurnstileConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(config.server.sweep_interval_secs, 300);
        assert_eq!(config.limits.auth.max_requests, 5);
        assert_eq!(config.limits.auth.window_ms, 60_000);
        // Untouched limiters keep their defaults
        assert_eq!(config.limits.api.max_requests, 100);
    }

    #[test]
    fn test_rejects_zero_ceiling() {
        let yaml = r#"
limits:
  api:
    window_ms: 60000
    max_requests: 0
"#;
        let err = TurnstileConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("max_requests"));
    }

    #[test]
    fn test_rejects_non_positive_window() {
        let yaml = r#"
limits:
  admin:
    window_ms: 0
    max_requests: 50
"#;
        assert!(TurnstileConfig::from_yaml(yaml).is_err());
    }
}
