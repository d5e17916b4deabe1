//! Core domain types for the cell healer
//!
//! Cells, their backend-reported status, the two lifecycle operations and the
//! outcome of driving one of them to completion.

use std::fmt;
use std::time::Duration;

use crate::config::HealerConfig;

// ============================================================================
// Cell Identity
// ============================================================================

/// Opaque backend identifier of a cell (a UUID in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form used in log lines: everything before the first `-`.
    ///
    /// `"3f2a9c1e-77b0-4c1d-..."` → `"3f2a9c1e"`. Ids without a dash are
    /// returned whole.
    pub fn short(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CellId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A cell as returned by the backend listing.
///
/// Never cached across ticks: the status is re-fetched every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub id: CellId,
    pub name: String,
}

// ============================================================================
// Cell Status
// ============================================================================

/// Backend-reported cell status, case-normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellStatus {
    Started,
    Stopped,
    Starting,
    Stopping,
    Failed,
    /// Any status string the controller does not know about (upper-cased).
    Unexpected(String),
}

impl CellStatus {
    /// Parse a raw backend status string. Matching is case-insensitive and
    /// ignores surrounding whitespace.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_uppercase();
        match normalized.as_str() {
            "STARTED" => Self::Started,
            "STOPPED" => Self::Stopped,
            "STARTING" => Self::Starting,
            "STOPPING" => Self::Stopping,
            "FAILED" => Self::Failed,
            _ => Self::Unexpected(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Started => "STARTED",
            Self::Stopped => "STOPPED",
            Self::Starting => "STARTING",
            Self::Stopping => "STOPPING",
            Self::Failed => "FAILED",
            Self::Unexpected(s) => s,
        }
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Operations
// ============================================================================

/// One of the two lifecycle operations the backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Stop,
    Start,
}

impl Operation {
    /// Path segment used by the backend (`POST .../{id}/{op}/`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Start => "start",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of how one operation is observed to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSpec {
    pub operation: Operation,
    /// Status expected while the operation is in flight.
    pub transitional: CellStatus,
    /// Status that confirms success.
    pub target: CellStatus,
    /// Wall-clock budget measured from invocation.
    pub timeout: Duration,
}

/// Per-operation specs, built once at startup and injected into the
/// lifecycle driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationTable {
    stop: OperationSpec,
    start: OperationSpec,
}

impl OperationTable {
    pub fn new(stop_timeout: Duration, start_timeout: Duration) -> Self {
        Self {
            stop: OperationSpec {
                operation: Operation::Stop,
                transitional: CellStatus::Stopping,
                target: CellStatus::Stopped,
                timeout: stop_timeout,
            },
            start: OperationSpec {
                operation: Operation::Start,
                transitional: CellStatus::Starting,
                target: CellStatus::Started,
                timeout: start_timeout,
            },
        }
    }

    pub fn from_config(config: &HealerConfig) -> Self {
        Self::new(
            Duration::from_secs(config.timers.stop_timeout_secs),
            Duration::from_secs(config.timers.start_timeout_secs),
        )
    }

    pub fn spec(&self, operation: Operation) -> &OperationSpec {
        match operation {
            Operation::Stop => &self.stop,
            Operation::Start => &self.start,
        }
    }
}

impl Default for OperationTable {
    fn default() -> Self {
        Self::from_config(&HealerConfig::default())
    }
}

// ============================================================================
// Operation Outcome
// ============================================================================

/// Why an operation failed. The healing policy treats all kinds alike; the
/// distinction exists for operator diagnosis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Backend answered the invocation with something other than 202.
    Rejected { code: u16 },
    /// The invocation never got an HTTP answer.
    Transport,
    /// Cell reported `FAILED` while the operation was in flight.
    StatusFailed,
    /// Target status not reached within the operation timeout.
    Timeout,
    /// Cell reported a status that is neither transitional, target nor failed.
    UnexpectedStatus { status: String },
}

/// Typed failure with the human-readable message operators see in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl OperationFailure {
    pub fn rejected(code: u16) -> Self {
        Self {
            kind: FailureKind::Rejected { code },
            message: format!("http response {code}"),
        }
    }

    pub fn transport(error: impl fmt::Display) -> Self {
        Self {
            kind: FailureKind::Transport,
            message: format!("transport {error}"),
        }
    }

    pub fn status_failed(operation: Operation) -> Self {
        Self {
            kind: FailureKind::StatusFailed,
            message: format!("status {operation} failed"),
        }
    }

    pub fn timeout() -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: "timeout".to_string(),
        }
    }

    pub fn unexpected_status(status: &CellStatus) -> Self {
        Self {
            kind: FailureKind::UnexpectedStatus {
                status: status.to_string(),
            },
            message: format!("cell status {status}"),
        }
    }
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Terminal result of one operation invocation. Produced exactly once per
/// invocation and never retried by the lifecycle driver itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Success,
    Failure(OperationFailure),
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success => "ok",
            Self::Failure(f) => &f.message,
        }
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success: ok"),
            Self::Failure(failure) => write!(f, "failure: {}", failure.message),
        }
    }
}
