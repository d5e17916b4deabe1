//! Cell Healer: self-healing reconciliation for backend-managed network cells
//!
//! Watches every cell the management backend exposes and restarts the ones
//! that report `FAILED`, within a bounded retry budget.
//!
//! ## Architecture
//!
//! - **Backend**: list / status / invoke over HTTP ([`backend::HttpBackend`])
//! - **Lifecycle Driver**: one stop or start, polled to a terminal outcome
//! - **Healing Policy**: stop→start attempts up to the retry budget
//! - **Reconciler**: the tick loop, classification and prohibition bookkeeping

pub mod backend;
pub mod config;
pub mod healing;
pub mod lifecycle;
pub mod logging;
pub mod prohibition;
pub mod reconciler;
pub mod types;

pub use backend::{BackendError, CellBackend, HttpBackend, InvokeResponse};
pub use config::HealerConfig;
pub use healing::{HealOutcome, HealReport, HealingPolicy};
pub use lifecycle::{LifecycleDriver, OperationPhase, OperationReport};
pub use prohibition::ProhibitionSet;
pub use reconciler::{classify, CellDisposition, Reconciler, TickReport};
pub use types::{
    Cell, CellId, CellStatus, FailureKind, Operation, OperationFailure, OperationOutcome,
    OperationSpec, OperationTable,
};
