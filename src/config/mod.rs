use crate::utils::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub access: AccessConfig,
}

/// Sourcing for the access backend (C1) when running standalone with no
/// separate access-issuing service alongside this binary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccessConfig {
    /// Path to a TOML file of static access records, loaded once at start.
    /// Absent means no accounts are provisioned (every Hello fails with
    /// `TokenNotFound`) until an operator wires in a real backend.
    #[serde(default)]
    pub static_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_timeout_seconds")]
    pub session_timeout_seconds: u64,
    /// Defaults to `session_timeout_seconds` when absent; resolved in
    /// [`SessionConfig::reap_interval_seconds`], not at deserialization
    /// time, so the default still tracks an overridden timeout.
    #[serde(default)]
    pub reap_interval_seconds: Option<u64>,
    #[serde(default)]
    pub max_concurrent_sessions: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String, // "json" or "pretty"
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_bind_port() -> u16 {
    8080
}

fn default_session_timeout_seconds() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout_seconds: default_session_timeout_seconds(),
            reap_interval_seconds: None,
            max_concurrent_sessions: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl SessionConfig {
    /// The reap cadence actually in effect: the configured value, or the
    /// session timeout when none was given.
    pub fn reap_interval_seconds(&self) -> u64 {
        self.reap_interval_seconds
            .unwrap_or(self.session_timeout_seconds)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| SessionError::Config(format!("failed to read config file: {e}")))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| SessionError::Config(format!("failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.session.session_timeout_seconds == 0 {
            return Err(SessionError::Config(
                "session.session_timeout_seconds must be greater than zero".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(SessionError::Config(format!(
                "invalid logging format: {}. must be 'pretty' or 'json'",
                self.logging.format
            )));
        }

        if let Some(max) = self.session.max_concurrent_sessions {
            if max == 0 {
                return Err(SessionError::Config(
                    "session.max_concurrent_sessions must be greater than zero when set"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn create_example<P: AsRef<Path>>(path: P) -> Result<()> {
        let example = r#"[server]
bind_address = "0.0.0.0"
bind_port = 8080

[session]
session_timeout_seconds = 300
# reap_interval_seconds defaults to session_timeout_seconds when omitted
# max_concurrent_sessions = 10000

[logging]
level = "info"  # trace, debug, info, warn, error
format = "pretty"  # pretty, json

[access]
# static_file = "access.toml"  # static access records; omit to run with none provisioned
"#;

        std::fs::write(path.as_ref(), example)
            .map_err(|e| SessionError::Config(format!("failed to write example config: {e}")))?;

        Ok(())
    }
}
