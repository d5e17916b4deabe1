//! Healer Configuration - backend address, lifecycle timers and healing budget
//!
//! Every value the controller depends on is a field here. Each struct
//! implements `Default` with the values the controller has always shipped
//! with, so running without a config file behaves identically to running
//! with an empty one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one healer deployment.
///
/// Load with `HealerConfig::load()` which searches:
/// 1. `$CELL_HEALER_CONFIG` env var
/// 2. `./healer.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealerConfig {
    /// Management backend address and credentials
    #[serde(default)]
    pub backend: BackendConfig,

    /// Lifecycle and loop timers
    #[serde(default)]
    pub timers: TimerConfig,

    /// Retry budget
    #[serde(default)]
    pub healing: HealingConfig,

    /// Log sinks
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from this file.
    File(PathBuf),
    /// No file found; built-in defaults.
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

impl HealerConfig {
    /// Load configuration using the standard search order:
    /// 1. `$CELL_HEALER_CONFIG` environment variable
    /// 2. `./healer.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// A file that fails to load is skipped with a warning.
    pub fn load() -> (Self, ConfigSource) {
        // 1. Check env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded healer config from {}", defaults::CONFIG_ENV_VAR);
                        return (config, ConfigSource::File(p));
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", defaults::CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./healer.toml
        let local = PathBuf::from(defaults::CONFIG_FILE_NAME);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded healer config from ./{}", defaults::CONFIG_FILE_NAME);
                    return (config, ConfigSource::File(local));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::CONFIG_FILE_NAME);
                }
            }
        }

        // 3. Defaults
        info!("No {} found — using built-in defaults", defaults::CONFIG_FILE_NAME);
        (Self::default(), ConfigSource::Defaults)
    }

    /// Load from a specific TOML file path.
    ///
    /// Unknown keys are reported as warnings; range violations are errors.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides that must never live in a config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var(defaults::PASSWORD_ENV_VAR) {
            if !password.is_empty() {
                self.backend.password = password;
            }
        }
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Healer config saved");
        Ok(())
    }

    /// Rewrite the file a config was loaded from in canonical form, with every
    /// default filled in. Returns `Ok(false)` when there is nothing to write
    /// (defaults source, or the file is already canonical).
    ///
    /// The password is never written back if it only came from the environment.
    pub fn persist_normalized(&self, source: &ConfigSource) -> Result<bool, ConfigError> {
        let ConfigSource::File(path) = source else {
            return Ok(false);
        };

        let on_disk = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.clone(), e))?;
        let mut normalized = self.clone();
        if let Ok(stored) = toml::from_str::<HealerConfig>(&on_disk) {
            normalized.backend.password = stored.backend.password;
        }

        let canonical = normalized.to_toml()?;
        if canonical == on_disk {
            return Ok(false);
        }
        normalized.save_to_file(path)?;
        Ok(true)
    }

    /// Validate all values for internal consistency.
    ///
    /// Rules:
    /// - Timers and the retry budget must be non-zero
    /// - The in-flight poll interval must be shorter than the stop timeout
    /// - The backend address must be usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let t = &self.timers;
        Self::check_positive(t.stop_timeout_secs, "timers.stop_timeout_secs", &mut errors);
        Self::check_positive(t.start_timeout_secs, "timers.start_timeout_secs", &mut errors);
        Self::check_positive(t.poll_interval_secs, "timers.poll_interval_secs", &mut errors);
        Self::check_positive(t.tick_interval_secs, "timers.tick_interval_secs", &mut errors);
        Self::check_positive(t.transport_retry_secs, "timers.transport_retry_secs", &mut errors);

        if t.poll_interval_secs > 0 && t.poll_interval_secs >= t.stop_timeout_secs.min(t.start_timeout_secs) {
            errors.push(format!(
                "timers.poll_interval_secs ({}) must be shorter than both operation timeouts (stop {}, start {})",
                t.poll_interval_secs, t.stop_timeout_secs, t.start_timeout_secs
            ));
        }

        if self.healing.retry_budget == 0 {
            errors.push("healing.retry_budget must be > 0".to_string());
        }

        let (range_errors, range_warnings) = super::validation::validate_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_positive(value: u64, name: &str, errors: &mut Vec<String>) {
        if value == 0 {
            errors.push(format!("{name} must be > 0"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({path}): {1}", path = .0.display())]
    Io(PathBuf, std::io::Error),
    #[error("Config parse error ({path}): {1}", path = .0.display())]
    Parse(PathBuf, toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Backend
// ============================================================================

/// Management backend endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// URL scheme, `http` or `https`.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Backend host name or IP address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Backend TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path under which cells are addressed.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Basic-auth user for lifecycle operations.
    #[serde(default = "default_username")]
    pub username: String,

    /// Basic-auth password. Prefer `CELL_HEALER_PASSWORD`.
    #[serde(default)]
    pub password: String,
}

fn default_scheme() -> String {
    "http".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_api_prefix() -> String {
    "/api/v1/net-item".to_string()
}
fn default_username() -> String {
    "admin".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_host(),
            port: default_port(),
            api_prefix: default_api_prefix(),
            username: default_username(),
            password: String::new(),
        }
    }
}

impl BackendConfig {
    /// Base URL of the cell collection, without a trailing slash.
    ///
    /// `http://127.0.0.1:8080/api/v1/net-item`
    pub fn base_url(&self) -> String {
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}/{}", self.scheme, self.host, self.port, prefix)
        }
    }
}

// ============================================================================
// Timers
// ============================================================================

/// All timed waits the controller performs, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Maximum time a stop may take before it is declared failed.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// Maximum time a start may take before it is declared failed.
    #[serde(default = "default_start_timeout")]
    pub start_timeout_secs: u64,

    /// Sleep between status polls while an operation is in flight.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Cool-down after the backend rejects an operation.
    #[serde(default = "default_rejection_cooldown")]
    pub rejection_cooldown_secs: u64,

    /// Sleep between reconciliation ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Wait before retrying a failed listing or status call.
    #[serde(default = "default_transport_retry")]
    pub transport_retry_secs: u64,
}

fn default_stop_timeout() -> u64 {
    40
}
fn default_start_timeout() -> u64 {
    300
}
fn default_poll_interval() -> u64 {
    10
}
fn default_rejection_cooldown() -> u64 {
    30
}
fn default_tick_interval() -> u64 {
    30
}
fn default_transport_retry() -> u64 {
    30
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: default_stop_timeout(),
            start_timeout_secs: default_start_timeout(),
            poll_interval_secs: default_poll_interval(),
            rejection_cooldown_secs: default_rejection_cooldown(),
            tick_interval_secs: default_tick_interval(),
            transport_retry_secs: default_transport_retry(),
        }
    }
}

// ============================================================================
// Healing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealingConfig {
    /// Stop+start attempts per healing sequence before a cell is prohibited.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
}

fn default_retry_budget() -> u32 {
    3
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            retry_budget: default_retry_budget(),
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

/// File sink settings. Console verbosity is controlled by `RUST_LOG`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write a rotating log file in addition to the console.
    #[serde(default = "default_file_enabled")]
    pub file_enabled: bool,

    /// Directory for `healer.log*` files.
    #[serde(default = "default_log_directory")]
    pub directory: String,

    /// Minimum level written to the file sink.
    #[serde(default = "default_file_level")]
    pub file_level: String,
}

fn default_file_enabled() -> bool {
    true
}
fn default_log_directory() -> String {
    ".".to_string()
}
fn default_file_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_enabled: default_file_enabled(),
            directory: default_log_directory(),
            file_level: default_file_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = HealerConfig::from_toml_str("").unwrap();
        assert_eq!(config, HealerConfig::default());
        assert_eq!(config.timers.stop_timeout_secs, 40);
        assert_eq!(config.timers.start_timeout_secs, 300);
        assert_eq!(config.healing.retry_budget, 3);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = HealerConfig::from_toml_str(
            r#"
[timers]
start_timeout_secs = 120
"#,
        )
        .unwrap();
        assert_eq!(config.timers.start_timeout_secs, 120);
        assert_eq!(config.timers.stop_timeout_secs, 40);
        assert_eq!(config.backend.port, 8080);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let err = HealerConfig::from_toml_str("[healing]\nretry_budget = 0\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert!(errors.iter().any(|e| e.contains("retry_budget")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_poll_interval_must_be_shorter_than_timeouts() {
        let mut config = HealerConfig::default();
        config.timers.poll_interval_secs = 40;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url() {
        let mut backend = BackendConfig::default();
        assert_eq!(backend.base_url(), "http://127.0.0.1:8080/api/v1/net-item");
        backend.api_prefix = "/".to_string();
        assert_eq!(backend.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_validation_error_display_lists_every_problem() {
        let err = ConfigError::Validation(vec!["a".to_string(), "b".to_string()]);
        let text = err.to_string();
        assert!(text.contains("  - a"));
        assert!(text.contains("  - b"));
    }
}
