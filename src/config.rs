use std::env;
use std::time::Duration;

use http::{HeaderName, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, RotaError};
use crate::proxy::backoff::BackoffStrategy;

/// Default session header, shared by requests and mirrored responses
pub const DEFAULT_SESSION_HEADER: &str = "X-Crawlera-Session";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Rotation controller configuration
    pub rotation: RotationConfig,
    /// Probe runner configuration
    pub probe: ProbeConfig,
    /// Logging configuration
    pub log: LogConfig,
}

/// Settings consumed once when the controller is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Turn proxy rotation on
    pub enabled: bool,
    /// Pool provider URL returning newline separated endpoints
    pub pool_url: Option<String>,
    /// Scheme used for the proxy target (`scheme://endpoint`)
    pub scheme: String,
    /// Header carrying the session on requests and responses
    pub session_header: String,
    /// Response status treated as a ban
    pub ban_status: u16,
    /// Backoff schedule applied to slots after a rotation
    pub backoff: BackoffConfig,
    /// Timeout for the pool fetch, in seconds
    pub fetch_timeout_secs: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pool_url: None,
            scheme: "http".to_string(),
            session_header: DEFAULT_SESSION_HEADER.to_string(),
            ban_status: 502,
            backoff: BackoffConfig::default(),
            fetch_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Growth curve (linear, exponential)
    pub strategy: BackoffStrategy,
    /// Bound increment, in seconds
    pub step_secs: f64,
    /// Bound ceiling, in seconds
    pub max_secs: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Linear,
            step_secs: 15.0,
            max_secs: 180.0,
        }
    }
}

impl BackoffConfig {
    /// Step as a `Duration`; out-of-range values saturate (rejected by `validate`)
    pub fn step(&self) -> Duration {
        secs_to_duration(self.step_secs)
    }

    /// Ceiling as a `Duration`; out-of-range values saturate (rejected by `validate`)
    pub fn max(&self) -> Duration {
        secs_to_duration(self.max_secs)
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// URLs fetched through the controller by the probe binary
    pub targets: Vec<String>,
    /// Attempts per target, including the first
    pub max_attempts: u32,
    /// Targets fetched concurrently
    pub concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            targets: vec![
                "https://github.com/".to_string(),
                "https://google.com/".to_string(),
            ],
            max_attempts: 3,
            concurrency: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl RotationConfig {
    /// Check the values a controller cannot run with
    pub fn validate(&self) -> Result<()> {
        if !is_valid_secs(self.backoff.step_secs) {
            return Err(RotaError::InvalidConfig(
                "PROXY_BACKOFF_STEP must be a positive number of seconds".into(),
            ));
        }
        if !is_valid_secs(self.backoff.max_secs) {
            return Err(RotaError::InvalidConfig(
                "PROXY_BACKOFF_MAX must be a positive number of seconds".into(),
            ));
        }
        StatusCode::from_u16(self.ban_status).map_err(|_| {
            RotaError::InvalidConfig("PROXY_BAN_STATUS must be a valid HTTP status".into())
        })?;
        HeaderName::from_bytes(self.session_header.as_bytes()).map_err(|_| {
            RotaError::InvalidConfig("PROXY_SESSION_HEADER must be a valid header name".into())
        })?;
        if self.scheme.is_empty() || !self.scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RotaError::InvalidConfig(
                "PROXY_SCHEME must be a bare scheme such as http".into(),
            ));
        }
        if let Some(url) = &self.pool_url {
            Url::parse(url).map_err(|e| {
                RotaError::InvalidConfig(format!("PROXY_POOL_URL must be a valid URL: {}", e))
            })?;
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let rotation = RotationConfig {
            enabled: get_env_or("PROXY_ENABLED", "false")
                .parse()
                .map_err(|_| RotaError::InvalidConfig("PROXY_ENABLED must be true or false".into()))?,
            pool_url: env::var("PROXY_POOL_URL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            scheme: get_env_or("PROXY_SCHEME", "http"),
            session_header: get_env_or("PROXY_SESSION_HEADER", DEFAULT_SESSION_HEADER),
            ban_status: get_env_or("PROXY_BAN_STATUS", "502").parse().map_err(|_| {
                RotaError::InvalidConfig("PROXY_BAN_STATUS must be a valid HTTP status".into())
            })?,
            backoff: BackoffConfig {
                strategy: BackoffStrategy::from_str(&get_env_or("PROXY_BACKOFF_STRATEGY", "linear"))
                    .ok_or_else(|| {
                        RotaError::InvalidConfig(
                            "PROXY_BACKOFF_STRATEGY must be linear or exponential".into(),
                        )
                    })?,
                step_secs: get_env_or("PROXY_BACKOFF_STEP", "15").parse().map_err(|_| {
                    RotaError::InvalidConfig("PROXY_BACKOFF_STEP must be a number".into())
                })?,
                max_secs: get_env_or("PROXY_BACKOFF_MAX", "180").parse().map_err(|_| {
                    RotaError::InvalidConfig("PROXY_BACKOFF_MAX must be a number".into())
                })?,
            },
            fetch_timeout_secs: get_env_or("PROXY_POOL_FETCH_TIMEOUT", "30")
                .parse()
                .map_err(|_| {
                    RotaError::InvalidConfig(
                        "PROXY_POOL_FETCH_TIMEOUT must be a whole number of seconds".into(),
                    )
                })?,
        };
        rotation.validate()?;

        let probe_defaults = ProbeConfig::default();
        let targets: Vec<String> = get_env_or("ROTA_PROBE_URLS", "")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            rotation,
            probe: ProbeConfig {
                targets: if targets.is_empty() {
                    probe_defaults.targets
                } else {
                    targets
                },
                max_attempts: get_env_or("ROTA_PROBE_MAX_ATTEMPTS", "3")
                    .parse::<u32>()
                    .unwrap_or(3)
                    .max(1),
                concurrency: get_env_or("ROTA_PROBE_CONCURRENCY", "2")
                    .parse::<usize>()
                    .unwrap_or(2)
                    .max(1),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }
}

/// Positive and representable as a `Duration`
fn is_valid_secs(secs: f64) -> bool {
    secs > 0.0 && Duration::try_from_secs_f64(secs).is_ok()
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
