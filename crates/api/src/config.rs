//! Process configuration read from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `BIND_ADDR` | `0.0.0.0:8080` |
//! | `DATABASE_URL` | unset: in-memory store |
//! | `DATABASE_MAX_CONNECTIONS` | `5` |
//! | `OVERDUE_SWEEP_SECS` | unset: no background sweep |
//! | `OVERDUE_GRACE_DAYS` | `0` |
//! | `LOG_FORMAT` | `json` |

use std::net::SocketAddr;
use std::time::Duration;

use gestao_observability::LogFormat;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value `{value}`: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Period of the background overdue sweep, if enabled.
    pub overdue_sweep_interval: Option<Duration>,
    pub overdue_grace_days: u32,
    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            overdue_sweep_interval: None,
            overdue_grace_days: 0,
            log_format: LogFormat::Json,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        match get("BIND_ADDR") {
            Some(raw) => {
                config.bind_addr = raw
                    .parse()
                    .map_err(|e| ConfigError::invalid("BIND_ADDR", &raw, e))?;
            }
            None => tracing::debug!("BIND_ADDR not set; using {DEFAULT_BIND_ADDR}"),
        }

        config.database_url = get("DATABASE_URL");
        if config.database_url.is_none() {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
        }

        if let Some(raw) = get("DATABASE_MAX_CONNECTIONS") {
            let n: u32 = raw
                .parse()
                .map_err(|e| ConfigError::invalid("DATABASE_MAX_CONNECTIONS", &raw, e))?;
            if n == 0 {
                return Err(ConfigError::invalid("DATABASE_MAX_CONNECTIONS", &raw, "must be at least 1"));
            }
            config.database_max_connections = n;
        }

        if let Some(raw) = get("OVERDUE_SWEEP_SECS") {
            let secs: u64 = raw
                .parse()
                .map_err(|e| ConfigError::invalid("OVERDUE_SWEEP_SECS", &raw, e))?;
            // 0 disables the sweep.
            config.overdue_sweep_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(raw) = get("OVERDUE_GRACE_DAYS") {
            config.overdue_grace_days = raw
                .parse()
                .map_err(|e| ConfigError::invalid("OVERDUE_GRACE_DAYS", &raw, e))?;
        }

        if let Some(raw) = get("LOG_FORMAT") {
            config.log_format = raw
                .parse()
                .map_err(|e| ConfigError::invalid("LOG_FORMAT", &raw, e))?;
        }

        Ok(config)
    }
}
