//! Reconciler — the perpetual list → classify → heal cycle
//!
//! Every tick lists the fleet, reads each cell's status and acts on it:
//! - `STARTED` and prohibited: released from the prohibition set
//! - `FAILED` and not prohibited: handed to the healing policy; exhaustion
//!   prohibits the cell
//! - anything else: logged only
//!
//! A cell whose status the backend refuses to report (a non-2xx answer, e.g.
//! a cell deleted after the listing) is skipped for this tick. Only an
//! unreachable backend holds the tick up.
//!
//! Cells are handled strictly one after another in listing order. A long
//! healing sequence delays every cell behind it in the same tick.
//! Cancellation is honoured between cells and between ticks, never in the
//! middle of a healing sequence.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::{fetch_essential, BackendError, CellBackend};
use crate::config::HealerConfig;
use crate::healing::{HealOutcome, HealingPolicy};
use crate::lifecycle::LifecycleDriver;
use crate::prohibition::ProhibitionSet;
use crate::types::{Cell, CellId, CellStatus};

// ============================================================================
// Classification
// ============================================================================

/// What the reconciler does with a cell this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellDisposition {
    /// `STARTED`, not prohibited.
    Healthy,
    /// `STARTED` while prohibited: someone fixed it, release it.
    ManuallyRecovered,
    /// `FAILED`, not prohibited: heal it.
    NeedsHealing,
    /// `FAILED` while prohibited: leave it for the operator.
    Prohibited,
    /// `STOPPED`, `STARTING` or `STOPPING`: nothing to do.
    Idle,
    /// A status the controller does not recognise.
    Anomalous(String),
}

/// Decide what to do with a cell from its status and prohibition membership.
///
/// Pure: the same inputs always give the same disposition.
pub fn classify(status: &CellStatus, prohibited: bool) -> CellDisposition {
    match (status, prohibited) {
        (CellStatus::Started, true) => CellDisposition::ManuallyRecovered,
        (CellStatus::Started, false) => CellDisposition::Healthy,
        (CellStatus::Failed, false) => CellDisposition::NeedsHealing,
        (CellStatus::Failed, true) => CellDisposition::Prohibited,
        (CellStatus::Stopped | CellStatus::Starting | CellStatus::Stopping, _) => CellDisposition::Idle,
        (CellStatus::Unexpected(s), _) => CellDisposition::Anomalous(s.clone()),
    }
}

// ============================================================================
// Tick Report
// ============================================================================

/// Counters for one reconciliation tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub cells_seen: usize,
    pub healthy: usize,
    pub idle: usize,
    pub anomalous: usize,
    /// Listed cells whose status the backend refused to report.
    pub unavailable: usize,
    /// Failed cells skipped because they are prohibited.
    pub skipped_prohibited: usize,
    pub heal_attempted: Vec<CellId>,
    pub recovered: Vec<CellId>,
    pub newly_prohibited: Vec<CellId>,
    pub released: Vec<CellId>,
    /// Size of the prohibition set at the end of the tick.
    pub prohibited_total: usize,
    /// Cancellation stopped the tick before every cell was handled.
    pub interrupted: bool,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick #{}: {} cells, {} healthy, {} idle, {} anomalous, {} unavailable, {} healed/{} attempted, {} newly prohibited, {} released, {} prohibited",
            self.tick,
            self.cells_seen,
            self.healthy,
            self.idle,
            self.anomalous,
            self.unavailable,
            self.recovered.len(),
            self.heal_attempted.len(),
            self.newly_prohibited.len(),
            self.released.len(),
            self.prohibited_total
        )
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Owns the control loop and its only mutable state, the prohibition set.
pub struct Reconciler {
    backend: Arc<dyn CellBackend>,
    driver: LifecycleDriver,
    policy: HealingPolicy,
    prohibited: ProhibitionSet,
    tick_interval: Duration,
    transport_retry: Duration,
    cancel_token: CancellationToken,
    ticks: u64,
}

impl Reconciler {
    pub fn new(backend: Arc<dyn CellBackend>, config: &HealerConfig, cancel_token: CancellationToken) -> Self {
        Self {
            driver: LifecycleDriver::from_config(Arc::clone(&backend), config),
            backend,
            policy: HealingPolicy::new(config.healing.retry_budget),
            prohibited: ProhibitionSet::new(),
            tick_interval: Duration::from_secs(config.timers.tick_interval_secs),
            transport_retry: Duration::from_secs(config.timers.transport_retry_secs),
            cancel_token,
            ticks: 0,
        }
    }

    /// Current prohibition set.
    pub fn prohibited(&self) -> &ProhibitionSet {
        &self.prohibited
    }

    /// Run ticks until cancelled. Returns the number of completed ticks.
    pub async fn run(mut self) -> u64 {
        info!(
            backend = self.backend.backend_name(),
            interval_secs = self.tick_interval.as_secs(),
            retry_budget = self.policy.retry_budget(),
            "Reconciler started"
        );

        loop {
            if self.cancel_token.is_cancelled() {
                break;
            }

            match self.run_tick().await {
                Some(report) if report.interrupted => {
                    info!("{}", report);
                    break;
                }
                Some(report) => info!("{}", report),
                None => break,
            }

            tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                _ = tokio::time::sleep(self.tick_interval) => {}
            }
        }

        info!(
            ticks = self.ticks,
            prohibited = self.prohibited.len(),
            "Reconciler stopped"
        );
        self.ticks
    }

    /// Run a single tick. Returns `None` if cancelled while the backend was
    /// unreachable, before any cell was handled.
    pub async fn run_tick(&mut self) -> Option<TickReport> {
        let observed = self.observe().await?;

        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            cells_seen: observed.len(),
            ..TickReport::default()
        };

        for (cell, status) in observed {
            if self.cancel_token.is_cancelled() {
                warn!(tick = report.tick, "Shutdown requested, leaving remaining cells for later");
                report.interrupted = true;
                break;
            }
            match status {
                Ok(status) => self.handle_cell(&cell, &status, &mut report).await,
                Err(_) => report.unavailable += 1,
            }
        }

        report.prohibited_total = self.prohibited.len();
        Some(report)
    }

    /// List the fleet and read every status, waiting out transport failures
    /// for as long as they last. Duplicate ids in the listing are handled once.
    ///
    /// A listing the backend refuses yields an empty tick; a refused status
    /// read is returned as that cell's `Err`.
    async fn observe(&self) -> Option<Vec<(Cell, Result<CellStatus, BackendError>)>> {
        let backend = &self.backend;
        let cells = match fetch_essential("list cells", self.transport_retry, &self.cancel_token, move || {
            backend.list_cells()
        })
        .await?
        {
            Ok(cells) => cells,
            Err(e) => {
                warn!(error = %e, "Backend refused cell listing, nothing to reconcile this tick");
                Vec::new()
            }
        };

        let mut seen = HashSet::with_capacity(cells.len());
        let mut observed = Vec::with_capacity(cells.len());
        for cell in cells {
            if !seen.insert(cell.id.clone()) {
                debug!(cell = %cell.id.short(), "Duplicate cell in listing, ignoring");
                continue;
            }
            let id = &cell.id;
            let status = fetch_essential("cell status", self.transport_retry, &self.cancel_token, move || {
                backend.cell_status(id)
            })
            .await?;
            if let Err(e) = &status {
                warn!(cell = %cell.id.short(), error = %e, "Cell status unavailable, skipping it this tick");
            }
            observed.push((cell, status));
        }
        Some(observed)
    }

    async fn handle_cell(&mut self, cell: &Cell, status: &CellStatus, report: &mut TickReport) {
        let prohibited = self.prohibited.contains(&cell.id);
        info!(
            cell = %cell.id.short(),
            name = %cell.name,
            status = %status,
            prohibited,
            "Observed cell"
        );

        match classify(status, prohibited) {
            CellDisposition::Healthy => report.healthy += 1,
            CellDisposition::ManuallyRecovered => {
                let since = self.prohibited.release(&cell.id);
                info!(
                    cell = %cell.id.short(),
                    prohibited_since = ?since,
                    "Cell is started again, lifting healing prohibition"
                );
                report.healthy += 1;
                report.released.push(cell.id.clone());
            }
            CellDisposition::NeedsHealing => {
                report.heal_attempted.push(cell.id.clone());
                let heal = self.policy.heal(&self.driver, &cell.id).await;
                match heal.outcome {
                    HealOutcome::Recovered { .. } => report.recovered.push(cell.id.clone()),
                    HealOutcome::Exhausted { .. } => {
                        self.prohibited.prohibit(cell.id.clone());
                        error!(
                            cell = %cell.id.short(),
                            name = %cell.name,
                            "Prohibited cell from additional healing attempts; manual intervention required"
                        );
                        report.newly_prohibited.push(cell.id.clone());
                    }
                }
            }
            CellDisposition::Prohibited => {
                debug!(cell = %cell.id.short(), "Cell failed but prohibited, skipping");
                report.skipped_prohibited += 1;
            }
            CellDisposition::Idle => report.idle += 1,
            CellDisposition::Anomalous(s) => {
                warn!(cell = %cell.id.short(), status = %s, "Cell reports unexpected status");
                report.anomalous += 1;
            }
        }
    }
}
