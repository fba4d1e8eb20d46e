//! Configuration management for sign-guard.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audit::ClientContext;
use crate::cli::Args;
use crate::manager::SecuritySettings;
use crate::security::{RateLimitConfig, UploadPolicy};
use crate::session::SessionConfig;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rate limiting thresholds.
    pub rate_limit: RateLimitSection,
    /// Session settings.
    pub session: SessionSection,
    /// Upload restrictions.
    pub upload: UploadSection,
    /// Client context recorded on audit entries.
    pub client: ClientSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub max_requests_per_minute: u32,
    pub max_requests_per_hour: u32,
    /// Duration of a timed block in milliseconds.
    pub block_duration_ms: i64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 100,
            max_requests_per_hour: 1000,
            block_duration_ms: 3_600_000,
        }
    }
}

/// Session configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Session lifetime in milliseconds.
    pub timeout_ms: i64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            timeout_ms: 86_400_000,
        }
    }
}

/// Upload configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    /// Accepted MIME types.
    pub allowed_types: Vec<String>,
    /// Maximum upload size in MB.
    pub max_size_mb: u64,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            allowed_types: vec!["application/pdf".to_string()],
            max_size_mb: 50,
        }
    }
}

/// Client context section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    pub agent: String,
    pub location: String,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SIGN_GUARD_MAX_PER_MINUTE").and_then(|v| v.parse().ok()) {
            self.rate_limit.max_requests_per_minute = v;
        }

        if let Some(v) = lookup("SIGN_GUARD_MAX_PER_HOUR").and_then(|v| v.parse().ok()) {
            self.rate_limit.max_requests_per_hour = v;
        }

        if let Some(v) = lookup("SIGN_GUARD_SESSION_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.session.timeout_ms = v;
        }

        if let Some(level) = lookup("SIGN_GUARD_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to the settings consumed by the security manager.
    pub fn to_settings(&self) -> Result<SecuritySettings, ConfigError> {
        if self.session.timeout_ms < 0 {
            return Err(ConfigError::Invalid(format!(
                "session.timeout_ms must not be negative: {}",
                self.session.timeout_ms
            )));
        }
        if self.rate_limit.block_duration_ms < 0 {
            return Err(ConfigError::Invalid(format!(
                "rate_limit.block_duration_ms must not be negative: {}",
                self.rate_limit.block_duration_ms
            )));
        }

        Ok(SecuritySettings {
            rate_limit: RateLimitConfig {
                max_per_minute: self.rate_limit.max_requests_per_minute,
                max_per_hour: self.rate_limit.max_requests_per_hour,
                block_duration_ms: self.rate_limit.block_duration_ms,
            },
            session: SessionConfig {
                timeout_ms: self.session.timeout_ms,
            },
            upload: UploadPolicy::new(self.upload.allowed_types.clone(), self.upload.max_size_mb),
            client: ClientContext::new(&self.client.agent, &self.client.location),
        })
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// A value is out of range.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rate_limit.max_requests_per_minute, 100);
        assert_eq!(config.rate_limit.max_requests_per_hour, 1000);
        assert_eq!(config.rate_limit.block_duration_ms, 3_600_000);
        assert_eq!(config.session.timeout_ms, 86_400_000);
        assert_eq!(config.upload.allowed_types, vec!["application/pdf"]);
        assert_eq!(config.upload.max_size_mb, 50);
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "rate_limit": {
                "max_requests_per_minute": 5,
                "max_requests_per_hour": 50
            },
            "upload": {
                "allowed_types": ["application/pdf", "image/png"],
                "max_size_mb": 10
            },
            "client": {
                "agent": "gateway/2.0",
                "location": "https://sign.example"
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.rate_limit.max_requests_per_minute, 5);
        assert_eq!(config.rate_limit.max_requests_per_hour, 50);
        assert_eq!(config.rate_limit.block_duration_ms, 3_600_000); // Default
        assert_eq!(config.upload.allowed_types.len(), 2);
        assert_eq!(config.client.agent, "gateway/2.0");
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{ "session": { "timeout_ms": 1000 } }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.session.timeout_ms, 1000);
        assert_eq!(config.rate_limit.max_requests_per_minute, 100); // Default
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_config_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/sign-guard.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_apply_env() {
        let vars: HashMap<&str, &str> = [
            ("SIGN_GUARD_MAX_PER_MINUTE", "7"),
            ("SIGN_GUARD_MAX_PER_HOUR", "not-a-number"),
            ("SIGN_GUARD_SESSION_TIMEOUT_MS", "60000"),
            ("RUST_LOG", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.rate_limit.max_requests_per_minute, 7);
        assert_eq!(config.rate_limit.max_requests_per_hour, 1000); // unparsable ignored
        assert_eq!(config.session.timeout_ms, 60_000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_env_log_level_precedence() {
        let mut config = Config::default();
        config.apply_env_from(|k| match k {
            "SIGN_GUARD_LOG_LEVEL" => Some("trace".into()),
            "RUST_LOG" => Some("warn".into()),
            _ => None,
        });
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            log_level: Some("error".to_string()),
            ..Args::default()
        };

        config.apply_args(&args);
        assert_eq!(config.logging.level, "error");
    }

    #[test]
    fn test_to_settings() {
        let mut config = Config::default();
        config.rate_limit.max_requests_per_minute = 3;
        config.session.timeout_ms = 0;
        config.client.agent = "ua".into();

        let settings = config.to_settings().unwrap();
        assert_eq!(settings.rate_limit.max_per_minute, 3);
        assert_eq!(settings.session.timeout_ms, 0);
        assert_eq!(settings.upload.max_size_mb(), 50);
        assert_eq!(settings.client.agent, "ua");
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let mut config = Config::default();
        config.session.timeout_ms = -1;
        assert!(matches!(config.to_settings(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"max_requests_per_minute\""));
        assert!(json.contains("\"timeout_ms\""));
    }
}
