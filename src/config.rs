//! Configuration module for PulseWatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::discovery::UPTIMEROBOT_API_URL;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Discovery settings, present only when an API key is configured.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub api_key: String,
    pub endpoint: String,
    pub fetch_period: Duration,
}

/// Monitor configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Static catalog file (default: none)
    pub targets_path: Option<PathBuf>,
    /// Time between probe cycles (default: 60s)
    pub poll_period: Duration,
    /// Per-probe request timeout (default: 30s)
    pub poll_timeout: Duration,
    /// Address of the metrics listener (default: 0.0.0.0:8080)
    pub listen_addr: SocketAddr,
    /// Number of concurrent probe workers (default: 10)
    pub workers: usize,
    /// Value of the `env` label added to every metric
    pub env_label: Option<String>,
    pub discovery: Option<DiscoveryConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            targets_path: None,
            poll_period: Duration::from_secs(60),
            poll_timeout: Duration::from_secs(30),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            workers: 10,
            env_label: None,
            discovery: None,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PULSEWATCH_TARGETS_PATH`: static catalog JSON file
    /// - `PULSEWATCH_POLL_PERIOD_SECS`: seconds between probe cycles (default: 60)
    /// - `PULSEWATCH_POLL_TIMEOUT_SECS`: per-probe timeout in seconds (default: 30)
    /// - `PULSEWATCH_LISTEN_ADDR`: metrics listen address (default: ":8080")
    /// - `PULSEWATCH_WORKERS`: number of probe workers (default: 10)
    /// - `PULSEWATCH_ENV`: `env` label attached to every metric
    /// - `PULSEWATCH_UPTIMEROBOT_API_KEY`: enables target discovery
    /// - `PULSEWATCH_FETCH_PERIOD_SECS`: seconds between discovery fetches (default: 600)
    /// - `PULSEWATCH_DISCOVERY_ENDPOINT`: discovery API URL
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(path) = get("PULSEWATCH_TARGETS_PATH") {
            cfg.targets_path = Some(PathBuf::from(path));
        }

        if let Some(value) = get("PULSEWATCH_POLL_PERIOD_SECS") {
            cfg.poll_period = parse_secs("PULSEWATCH_POLL_PERIOD_SECS", &value)?;
        }

        if let Some(value) = get("PULSEWATCH_POLL_TIMEOUT_SECS") {
            cfg.poll_timeout = parse_secs("PULSEWATCH_POLL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = get("PULSEWATCH_LISTEN_ADDR") {
            cfg.listen_addr = parse_listen_addr(&value)?;
        }

        if let Some(value) = get("PULSEWATCH_WORKERS") {
            cfg.workers = match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                Ok(_) => return Err(invalid("PULSEWATCH_WORKERS", &value, "must be at least 1")),
                Err(e) => return Err(invalid("PULSEWATCH_WORKERS", &value, e)),
            };
        }

        cfg.env_label = get("PULSEWATCH_ENV");

        if let Some(api_key) = get("PULSEWATCH_UPTIMEROBOT_API_KEY") {
            let fetch_period = match get("PULSEWATCH_FETCH_PERIOD_SECS") {
                Some(value) => parse_secs("PULSEWATCH_FETCH_PERIOD_SECS", &value)?,
                None => Duration::from_secs(600),
            };
            cfg.discovery = Some(DiscoveryConfig {
                api_key,
                endpoint: get("PULSEWATCH_DISCOVERY_ENDPOINT")
                    .unwrap_or_else(|| UPTIMEROBOT_API_URL.to_string()),
                fetch_period,
            });
        }

        Ok(cfg)
    }
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_secs(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = value.trim().parse().map_err(|e| invalid(var, value, e))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(invalid(var, value, "must be a positive number of seconds"));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Accepts `host:port`, or `:port` to listen on all interfaces.
fn parse_listen_addr(value: &str) -> Result<SocketAddr, ConfigError> {
    let value = value.trim();
    let full = if value.starts_with(':') {
        format!("0.0.0.0{}", value)
    } else {
        value.to_string()
    };
    full.parse()
        .map_err(|e| invalid("PULSEWATCH_LISTEN_ADDR", value, e))
}
