//! System-wide default constants.
//!
//! Names and numbers that are not operator-tunable, grouped by subsystem.

// ============================================================================
// Configuration
// ============================================================================

/// Environment variable holding an explicit config file path.
pub const CONFIG_ENV_VAR: &str = "CELL_HEALER_CONFIG";

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "healer.toml";

/// Environment variable overriding `backend.password`.
pub const PASSWORD_ENV_VAR: &str = "CELL_HEALER_PASSWORD";

// ============================================================================
// Backend
// ============================================================================

/// HTTP status the backend uses to accept a lifecycle operation.
pub const OPERATION_ACCEPTED_STATUS: u16 = 202;

/// Upper bound on the response body kept in a rejection (bytes).
///
/// Rejection bodies end up in log lines; some backends return full HTML pages.
pub const MAX_REJECTION_BODY_BYTES: usize = 512;

// ============================================================================
// Logging
// ============================================================================

/// File name prefix of the rotating log file.
pub const LOG_FILE_PREFIX: &str = "healer";

/// File name suffix of the rotating log file.
pub const LOG_FILE_SUFFIX: &str = "log";

/// Number of rotated log files kept on disk.
pub const LOG_MAX_FILES: usize = 10;
