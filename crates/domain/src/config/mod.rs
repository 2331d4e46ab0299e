mod observability;
mod server;
mod sessions;

pub use observability::*;
pub use server::*;
pub use sessions::*;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Read `path` as TOML.  A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.max_concurrent_requests == 0 {
            errors.push(ConfigError::error(
                "server.max_concurrent_requests",
                "must be greater than 0",
            ));
        }
        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 || rl.burst_size == 0 {
                errors.push(ConfigError::error(
                    "server.rate_limit",
                    "requests_per_second and burst_size must be greater than 0",
                ));
            } else if rl.requests_per_second > 1_000_000_000 {
                errors.push(ConfigError::error(
                    "server.rate_limit.requests_per_second",
                    "must not exceed 1000000000",
                ));
            }
        }
        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*" {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins",
            ));
        }

        let sessions = &self.sessions;
        if sessions.max_sessions == 0 {
            errors.push(ConfigError::error(
                "sessions.max_sessions",
                "max_sessions must be greater than 0",
            ));
        }
        if sessions.query_param.is_empty() {
            errors.push(ConfigError::error("sessions.query_param", "must not be empty"));
        }
        if sessions.id_source == SessionIdSource::QueryOrCookie && sessions.cookie_name.is_empty() {
            errors.push(ConfigError::error(
                "sessions.cookie_name",
                "must not be empty when id_source = \"query_or_cookie\"",
            ));
        }
        if sessions.eviction.is_enabled() {
            if sessions.eviction.idle_minutes == Some(0) {
                errors.push(ConfigError::error(
                    "sessions.eviction.idle_minutes",
                    "must be greater than 0 (omit to disable eviction)",
                ));
            }
            if sessions.eviction.sweep_interval_secs == 0 {
                errors.push(ConfigError::error(
                    "sessions.eviction.sweep_interval_secs",
                    "must be greater than 0",
                ));
            }
        }

        let bounds = &sessions.bounds;
        for (field, range) in [
            ("sessions.bounds.ball_speed", bounds.ball_speed),
            ("sessions.bounds.ball_size", bounds.ball_size),
            ("sessions.bounds.sound_speed", bounds.sound_speed),
        ] {
            if range.is_some_and(|r| r.is_inverted()) {
                errors.push(ConfigError::error(field, "min must not exceed max"));
            }
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "must be between 0.0 and 1.0",
            ));
        }

        errors
    }
}
