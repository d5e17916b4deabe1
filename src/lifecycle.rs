//! Lifecycle driver — runs one stop or start on one cell to a terminal outcome
//!
//! ```text
//! INITIATED ──invoke──▶ POLLING ──target──────────▶ SUCCESS
//!     │                    │ ├──FAILED────────────▶ FAILED_STATUS
//!     │                    │ ├──other status──────▶ FAILED_UNEXPECTED_STATUS
//!     │                    │ └──timeout elapsed───▶ FAILED_TIMEOUT
//!     └──not accepted (+cool-down)────────────────▶ FAILED_REJECTED
//! ```
//!
//! The transitional status keeps the driver polling. Every failure is
//! reported once and never retried here; retrying is the healing policy's job.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{CellBackend, InvokeResponse};
use crate::config::HealerConfig;
use crate::types::{
    CellId, CellStatus, FailureKind, Operation, OperationFailure, OperationOutcome, OperationTable,
};

/// Driver states. `Initiated` and `Polling` are only ever logged; reports
/// carry one of the terminal phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    Initiated,
    Polling,
    Success,
    FailedStatus,
    FailedTimeout,
    /// Not accepted, including invocations that got no HTTP answer.
    FailedRejected,
    FailedUnexpectedStatus,
}

impl OperationPhase {
    /// Terminal phase an outcome corresponds to.
    pub fn of(outcome: &OperationOutcome) -> Self {
        match outcome {
            OperationOutcome::Success => Self::Success,
            OperationOutcome::Failure(f) => match f.kind {
                FailureKind::Rejected { .. } | FailureKind::Transport => Self::FailedRejected,
                FailureKind::StatusFailed => Self::FailedStatus,
                FailureKind::Timeout => Self::FailedTimeout,
                FailureKind::UnexpectedStatus { .. } => Self::FailedUnexpectedStatus,
            },
        }
    }
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initiated => "INITIATED",
            Self::Polling => "POLLING",
            Self::Success => "SUCCESS",
            Self::FailedStatus => "FAILED_STATUS",
            Self::FailedTimeout => "FAILED_TIMEOUT",
            Self::FailedRejected => "FAILED_REJECTED",
            Self::FailedUnexpectedStatus => "FAILED_UNEXPECTED_STATUS",
        };
        f.write_str(s)
    }
}

/// What happened during one operation, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub operation: Operation,
    pub outcome: OperationOutcome,
    /// Terminal phase the driver ended in.
    pub phase: OperationPhase,
    /// Status reads issued after the invocation was accepted.
    pub polls: u32,
    /// Time from invocation to outcome, cool-down included.
    pub elapsed: Duration,
}

/// Drives lifecycle operations against a backend.
pub struct LifecycleDriver {
    backend: Arc<dyn CellBackend>,
    table: OperationTable,
    poll_interval: Duration,
    rejection_cooldown: Duration,
}

impl LifecycleDriver {
    pub fn new(
        backend: Arc<dyn CellBackend>,
        table: OperationTable,
        poll_interval: Duration,
        rejection_cooldown: Duration,
    ) -> Self {
        Self {
            backend,
            table,
            poll_interval,
            rejection_cooldown,
        }
    }

    pub fn from_config(backend: Arc<dyn CellBackend>, config: &HealerConfig) -> Self {
        Self::new(
            backend,
            OperationTable::from_config(config),
            Duration::from_secs(config.timers.poll_interval_secs),
            Duration::from_secs(config.timers.rejection_cooldown_secs),
        )
    }

    /// Invoke `operation` on `id` and poll until it succeeds, fails or times out.
    pub async fn run(&self, id: &CellId, operation: Operation) -> OperationReport {
        let spec = self.table.spec(operation);
        let started = Instant::now();
        let mut polls = 0u32;

        info!(
            cell = %id.short(),
            op = %operation,
            timeout_secs = spec.timeout.as_secs(),
            phase = %OperationPhase::Initiated,
            "Initiating cell operation"
        );

        let rejection = match self.backend.invoke(id, operation).await {
            Ok(InvokeResponse::Accepted) => None,
            Ok(InvokeResponse::Rejected { code, body }) => {
                warn!(cell = %id.short(), op = %operation, code, body = %body, "Backend rejected operation");
                Some(OperationFailure::rejected(code))
            }
            Err(e) => {
                warn!(cell = %id.short(), op = %operation, error = %e, "Could not reach backend to invoke operation");
                Some(OperationFailure::transport(e))
            }
        };
        if let Some(failure) = rejection {
            debug!(cooldown_secs = self.rejection_cooldown.as_secs(), "Cooling down after rejection");
            tokio::time::sleep(self.rejection_cooldown).await;
            return self.report(operation, OperationOutcome::Failure(failure), polls, started);
        }

        debug!(cell = %id.short(), op = %operation, phase = %OperationPhase::Polling, "Operation accepted");
        loop {
            let elapsed = started.elapsed();
            if elapsed >= spec.timeout {
                warn!(
                    cell = %id.short(),
                    op = %operation,
                    timeout_secs = spec.timeout.as_secs(),
                    "Operation did not complete in time"
                );
                return self.report(
                    operation,
                    OperationOutcome::Failure(OperationFailure::timeout()),
                    polls,
                    started,
                );
            }
            let remaining = spec.timeout - elapsed;

            polls += 1;
            let status = match self.backend.cell_status(id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(cell = %id.short(), op = %operation, error = %e, "Status poll failed");
                    tokio::time::sleep(self.poll_interval.min(remaining)).await;
                    continue;
                }
            };
            debug!(cell = %id.short(), op = %operation, status = %status, "Checking cell status");

            let outcome = if status == spec.transitional {
                tokio::time::sleep(self.poll_interval.min(remaining)).await;
                continue;
            } else if status == CellStatus::Failed {
                OperationOutcome::Failure(OperationFailure::status_failed(operation))
            } else if status == spec.target {
                OperationOutcome::Success
            } else {
                OperationOutcome::Failure(OperationFailure::unexpected_status(&status))
            };
            return self.report(operation, outcome, polls, started);
        }
    }

    fn report(
        &self,
        operation: Operation,
        outcome: OperationOutcome,
        polls: u32,
        started: Instant,
    ) -> OperationReport {
        let phase = OperationPhase::of(&outcome);
        debug!(op = %operation, phase = %phase, polls, "Operation finished");
        OperationReport {
            operation,
            phase,
            outcome,
            polls,
            elapsed: started.elapsed(),
        }
    }
}
