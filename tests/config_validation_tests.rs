//! Config Validation Tests
//!
//! Typo detection, range validation and canonical rewriting of healer.toml,
//! exercised independently from the reconciliation loop.

use cell_healer::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys,
};
use cell_healer::config::{ConfigError, ConfigSource, HealerConfig};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_timers_warns_with_suggestion() {
    let toml_str = r#"
[timers]
stop_timeout_sec = 60
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("stop_timeout_sec"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("timers.stop_timeout_secs")
    );
}

#[test]
fn typo_in_healing_section_warns() {
    let toml_str = r#"
[healing]
retry_budjet = 5
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("healing.retry_budget"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[backend]
scheme = "http"
host = "10.20.0.4"
port = 8080
api_prefix = "/api/v1/net-item"
username = "operator"
password = "secret"

[timers]
stop_timeout_secs = 40
start_timeout_secs = 300
poll_interval_secs = 10
rejection_cooldown_secs = 30
tick_interval_secs = 30
transport_retry_secs = 30

[healing]
retry_budget = 3

[logging]
file_enabled = true
directory = "/var/log/cell-healer"
file_level = "debug"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(
        warnings.is_empty(),
        "Valid config should produce 0 warnings, got: {:?}",
        warnings.iter().map(|w| &w.field).collect::<Vec<_>>()
    );
    let config = HealerConfig::from_toml_str(toml_str).expect("valid config");
    assert_eq!(config.backend.host, "10.20.0.4");
    assert_eq!(config.logging.file_level, "debug");
}

#[test]
fn unknown_section_warns() {
    let toml_str = r#"
[metrics]
port = 9100
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.iter().any(|w| w.field.contains("metrics")));
}

#[test]
fn unknown_keys_do_not_break_loading() {
    let toml_str = r#"
[healing]
retry_budget = 4
retry_budjet = 5
"#;
    let config = HealerConfig::from_toml_str(toml_str).expect("typos are warnings only");
    assert_eq!(config.healing.retry_budget, 4);
}

#[test]
fn known_keys_set_is_complete() {
    let config = HealerConfig::default();
    let toml_str = config.to_toml().expect("Default config should serialize");
    let warnings = validate_unknown_keys(&toml_str);
    assert!(
        warnings.is_empty(),
        "Default config serialization should produce 0 unknown-key warnings, got: {:?}",
        warnings.iter().map(|w| &w.field).collect::<Vec<_>>()
    );
}

#[test]
fn suggest_correction_returns_none_for_garbage() {
    let known = known_config_keys();
    let s = suggest_correction("zzz_completely_invalid_xyz_12345", &known);
    assert!(s.is_none(), "Garbage string should not match anything");
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn bad_scheme_is_error() {
    let mut config = HealerConfig::default();
    config.backend.scheme = "ftp".to_string();
    let (errors, _) = validate_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("backend.scheme")));
}

#[test]
fn zero_timer_fails_validation() {
    let toml_str = r#"
[timers]
tick_interval_secs = 0
"#;
    match HealerConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("tick_interval_secs")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn unknown_log_level_fails_validation() {
    let toml_str = r#"
[logging]
file_level = "verbose"
"#;
    assert!(matches!(
        HealerConfig::from_toml_str(toml_str),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn high_budget_is_warning_not_error() {
    let mut config = HealerConfig::default();
    config.healing.retry_budget = 25;
    let (errors, warnings) = validate_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.iter().any(|w| w.field == "healing.retry_budget"));
    assert!(config.validate().is_ok());
}

#[test]
fn defaults_pass_validation() {
    let config = HealerConfig::default();
    assert!(config.validate().is_ok());
    let (errors, warnings) = validate_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.is_empty());
}

// ============================================================================
// Files and Normalization
// ============================================================================

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = HealerConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn parse_error_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("healer.toml");
    std::fs::write(&path, "[timers\nstop_timeout_secs = 40\n").unwrap();

    let err = HealerConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)));
    assert!(err.to_string().contains("healer.toml"));
}

#[test]
fn normalization_fills_defaults_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("healer.toml");
    std::fs::write(&path, "[healing]\nretry_budget = 5\n").unwrap();

    let config = HealerConfig::load_from_file(&path).unwrap();
    let source = ConfigSource::File(path.clone());
    assert!(config.persist_normalized(&source).unwrap(), "first pass rewrites");

    let rewritten = std::fs::read_to_string(&path).unwrap();
    assert!(rewritten.contains("retry_budget = 5"));
    assert!(rewritten.contains("start_timeout_secs = 300"));

    let reloaded = HealerConfig::load_from_file(&path).unwrap();
    assert_eq!(reloaded, config);
    assert!(!reloaded.persist_normalized(&source).unwrap(), "second pass is a no-op");
}

#[test]
fn normalization_never_writes_env_password() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("healer.toml");
    std::fs::write(&path, "[backend]\nhost = \"10.0.0.9\"\n").unwrap();

    let mut config = HealerConfig::load_from_file(&path).unwrap();
    config.backend.password = "from-environment".to_string();
    config
        .persist_normalized(&ConfigSource::File(path.clone()))
        .unwrap();

    let rewritten = std::fs::read_to_string(&path).unwrap();
    assert!(!rewritten.contains("from-environment"));
    assert!(rewritten.contains("10.0.0.9"));
}

#[test]
fn defaults_source_is_never_written() {
    let config = HealerConfig::default();
    assert!(!config.persist_normalized(&ConfigSource::Defaults).unwrap());
}
