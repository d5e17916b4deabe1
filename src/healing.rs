//! Healing policy — bounded stop→start retries for one failed cell
//!
//! Each attempt is a stop followed, only if the stop succeeded, by a start.
//! A failed stop still consumes the attempt. The first attempt whose start
//! succeeds ends the sequence.

use std::fmt;
use tracing::{error, info, warn};

use crate::lifecycle::{LifecycleDriver, OperationReport};
use crate::types::{CellId, Operation, OperationFailure, OperationOutcome};

/// Result of one healing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealOutcome {
    /// A stop+start pair succeeded on attempt `attempts`.
    Recovered { attempts: u32 },
    /// Every attempt in the budget failed.
    Exhausted { attempts: u32 },
}

impl HealOutcome {
    pub fn is_recovered(&self) -> bool {
        matches!(self, HealOutcome::Recovered { .. })
    }
}

impl fmt::Display for HealOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealOutcome::Recovered { attempts } => write!(f, "recovered after {attempts} attempt(s)"),
            HealOutcome::Exhausted { attempts } => write!(f, "exhausted after {attempts} attempt(s)"),
        }
    }
}

/// One stop+start attempt. `start` is `None` when the stop failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub stop: OperationReport,
    pub start: Option<OperationReport>,
}

impl AttemptRecord {
    pub fn succeeded(&self) -> bool {
        self.stop.outcome.is_success()
            && self.start.as_ref().is_some_and(|s| s.outcome.is_success())
    }

    /// The failure that ended this attempt, if any.
    pub fn failure(&self) -> Option<&OperationFailure> {
        let leg = self.start.as_ref().unwrap_or(&self.stop);
        match &leg.outcome {
            OperationOutcome::Failure(f) => Some(f),
            OperationOutcome::Success => None,
        }
    }
}

/// Full account of a healing sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealReport {
    pub outcome: HealOutcome,
    pub attempts: Vec<AttemptRecord>,
}

impl HealReport {
    pub fn last_failure(&self) -> Option<&OperationFailure> {
        self.attempts.last().and_then(AttemptRecord::failure)
    }
}

/// Stop→start retry policy with a fixed budget per sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealingPolicy {
    retry_budget: u32,
}

impl HealingPolicy {
    pub fn new(retry_budget: u32) -> Self {
        Self { retry_budget }
    }

    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    /// Try to recover `id` using at most `retry_budget` stop+start attempts.
    pub async fn heal(&self, driver: &LifecycleDriver, id: &CellId) -> HealReport {
        info!(cell = %id.short(), budget = self.retry_budget, "Restarting cell");

        let mut attempts = Vec::with_capacity(self.retry_budget as usize);
        for attempt in 1..=self.retry_budget {
            let remaining = self.retry_budget - attempt;

            let stop = driver.run(id, Operation::Stop).await;
            if let OperationOutcome::Failure(ref f) = stop.outcome {
                warn!(cell = %id.short(), attempt, remaining, message = %f, "Stop failed");
                attempts.push(AttemptRecord { attempt, stop, start: None });
                continue;
            }

            let start = driver.run(id, Operation::Start).await;
            let record = AttemptRecord { attempt, stop, start: Some(start) };
            if record.succeeded() {
                info!(cell = %id.short(), attempt, "Successfully recovered cell");
                attempts.push(record);
                return HealReport {
                    outcome: HealOutcome::Recovered { attempts: attempt },
                    attempts,
                };
            }

            if let Some(f) = record.failure() {
                warn!(cell = %id.short(), attempt, remaining, message = %f, "Start failed");
            }
            attempts.push(record);
        }

        let report = HealReport {
            outcome: HealOutcome::Exhausted {
                attempts: self.retry_budget,
            },
            attempts,
        };
        error!(
            cell = %id.short(),
            attempts = self.retry_budget,
            last_failure = report.last_failure().map_or("none", |f| f.message.as_str()),
            "Healing attempts exhausted"
        );
        report
    }
}
