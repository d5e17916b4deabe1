//! healer.toml checks run before and after deserialization
//!
//! Before serde sees the document, every dotted key in the raw TOML tree is
//! compared with the keys [`HealerConfig`](super::HealerConfig) understands.
//! Strangers are reported with the closest known key as a hint, and loading
//! continues. After deserialization, [`validate_ranges`] looks at the values.

use std::collections::HashSet;
use std::fmt;

/// Something in healer.toml worth telling the operator about that does not
/// stop the controller from starting.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// Dotted key path, e.g. `timers.poll_interval_secs`.
    pub field: String,
    pub message: String,
    /// Closest known key, for misspellings.
    pub suggestion: Option<String>,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.suggestion {
            Some(hint) => write!(f, "{} (did you mean '{hint}'?)", self.message),
            None => f.write_str(&self.message),
        }
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for HealerConfig.
///
/// Any new field added to HealerConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [backend]
        "backend",
        "backend.scheme",
        "backend.host",
        "backend.port",
        "backend.api_prefix",
        "backend.username",
        "backend.password",
        // [timers]
        "timers",
        "timers.stop_timeout_secs",
        "timers.start_timeout_secs",
        "timers.poll_interval_secs",
        "timers.rejection_cooldown_secs",
        "timers.tick_interval_secs",
        "timers.transport_retry_secs",
        // [healing]
        "healing",
        "healing.retry_budget",
        // [logging]
        "logging",
        "logging.file_enabled",
        "logging.directory",
        "logging.file_level",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Dotted paths of every table and key below `value`, parents before
/// children. `prefix` is prepended to each path; pass `""` at the root.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let Some(table) = value.as_table() else {
        return Vec::new();
    };

    table
        .iter()
        .flat_map(|(key, child)| {
            let path = match prefix {
                "" => key.clone(),
                _ => format!("{prefix}.{key}"),
            };
            let nested = walk_toml_keys(child, &path);
            std::iter::once(path).chain(nested)
        })
        .collect()
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the lexicographically smallest key so the suggestion is
/// stable across runs.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        best = match best {
            Some((bk, bd)) if bd < dist || (bd == dist && bk < k) => Some((bk, bd)),
            _ => Some((k, dist)),
        };
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys — it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let mut warnings = Vec::new();

    for key in walk_toml_keys(&value, "") {
        if !known.contains(key.as_str()) {
            let suggestion = suggest_correction(&key, &known);
            warnings.push(ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate value ranges on a parsed HealerConfig.
///
/// Returns (errors, warnings) — errors must prevent startup; warnings are
/// suspicious but not fatal.
pub fn validate_ranges(config: &super::HealerConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let b = &config.backend;
    if b.scheme != "http" && b.scheme != "https" {
        errors.push(format!(
            "backend.scheme = '{}' must be 'http' or 'https'",
            b.scheme
        ));
    }
    if b.host.trim().is_empty() {
        errors.push("backend.host must not be empty".to_string());
    }
    if b.port == 0 {
        errors.push("backend.port must be > 0".to_string());
    }

    let level = config.logging.file_level.to_lowercase();
    if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
        errors.push(format!(
            "logging.file_level = '{}' must be one of trace, debug, info, warn, error",
            config.logging.file_level
        ));
    }

    let t = &config.timers;
    if t.start_timeout_secs < t.stop_timeout_secs {
        warnings.push(ValidationWarning {
            field: "timers.start_timeout_secs".to_string(),
            message: format!(
                "start_timeout_secs = {} is shorter than stop_timeout_secs = {}; cells usually take longer to start",
                t.start_timeout_secs, t.stop_timeout_secs
            ),
            suggestion: None,
        });
    }

    if config.healing.retry_budget > 10 {
        warnings.push(ValidationWarning {
            field: "healing.retry_budget".to_string(),
            message: format!(
                "retry_budget = {} is unusually high; a failing cell blocks the rest of the fleet while it is retried",
                config.healing.retry_budget
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
