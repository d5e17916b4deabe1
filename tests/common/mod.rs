//! Scripted in-memory backend shared by the integration tests.
//!
//! Each cell has a current status plus a queue of statuses that successive
//! status reads walk through; the last queued status sticks. Each
//! (cell, operation) pair has a queue of [`OpPlan`]s consumed one per
//! invocation, again with the last one sticking. Unplanned operations succeed.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use cell_healer::backend::{BackendError, CellBackend, InvokeResponse};
use cell_healer::config::HealerConfig;
use cell_healer::types::{Cell, CellId, CellStatus, Operation, OperationTable};

/// How the fake backend reacts to one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpPlan {
    /// Accept; one poll shows the transitional status, the next the target.
    Succeed,
    /// Accept; one poll shows the transitional status, then this one.
    EndIn(CellStatus),
    /// Accept; stay transitional forever.
    Hang,
    /// Answer with this HTTP status instead of 202.
    Reject(u16),
    /// No HTTP answer at all.
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Status(CellId),
    Invoke(CellId, Operation),
}

#[derive(Default)]
struct State {
    cells: Vec<Cell>,
    current: HashMap<CellId, CellStatus>,
    pending: HashMap<CellId, VecDeque<CellStatus>>,
    plans: HashMap<(CellId, Operation), VecDeque<OpPlan>>,
    calls: Vec<Call>,
    list_failures: u32,
    list_refusals: u32,
    status_failures: u32,
}

fn next_sticky<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

pub struct FakeBackend {
    state: Mutex<State>,
    table: OperationTable,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            table: OperationTable::default(),
        })
    }

    pub fn as_dyn(self: &Arc<Self>) -> Arc<dyn CellBackend> {
        Arc::clone(self) as Arc<dyn CellBackend>
    }

    /// Append a cell to the listing with the given status.
    pub fn add_cell(&self, id: &str, status: CellStatus) {
        let mut s = self.state.lock().unwrap();
        let id = CellId::new(id);
        s.cells.push(Cell {
            id: id.clone(),
            name: format!("cell {}", id.short()),
        });
        s.current.insert(id, status);
    }

    /// Append a cell to the listing that has no status resource, so every
    /// status read answers 404.
    pub fn add_vanished_cell(&self, id: &str) {
        let mut s = self.state.lock().unwrap();
        let id = CellId::new(id);
        s.cells.push(Cell {
            id: id.clone(),
            name: format!("cell {}", id.short()),
        });
    }

    /// Overwrite a cell's status, dropping anything queued.
    pub fn set_status(&self, id: &str, status: CellStatus) {
        let mut s = self.state.lock().unwrap();
        let id = CellId::new(id);
        s.pending.remove(&id);
        s.current.insert(id, status);
    }

    /// Script the next invocations of `op` on `id`.
    pub fn plan(&self, id: &str, op: Operation, plans: impl IntoIterator<Item = OpPlan>) {
        let mut s = self.state.lock().unwrap();
        s.plans.insert((CellId::new(id), op), plans.into_iter().collect());
    }

    /// Make the next `n` listing calls fail.
    pub fn fail_list(&self, n: u32) {
        self.state.lock().unwrap().list_failures = n;
    }

    /// Make the next `n` listing calls answer HTTP 500.
    pub fn refuse_list(&self, n: u32) {
        self.state.lock().unwrap().list_refusals = n;
    }

    /// Make the next `n` status reads fail, whatever the cell.
    pub fn fail_status(&self, n: u32) {
        self.state.lock().unwrap().status_failures = n;
    }

    pub fn status_of(&self, id: &str) -> Option<CellStatus> {
        self.state.lock().unwrap().current.get(&CellId::new(id)).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn invocations(&self, id: &str) -> Vec<Operation> {
        let id = CellId::new(id);
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Invoke(cell, op) if cell == id => Some(op),
                _ => None,
            })
            .collect()
    }

    pub fn status_reads(&self, id: &str) -> usize {
        let id = CellId::new(id);
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Status(cell) if *cell == id))
            .count()
    }

    pub fn list_calls(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::List)).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

#[async_trait]
impl CellBackend for FakeBackend {
    async fn list_cells(&self) -> Result<Vec<Cell>, BackendError> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::List);
        if s.list_failures > 0 {
            s.list_failures -= 1;
            return Err(BackendError::Decode("connection refused".to_string()));
        }
        if s.list_refusals > 0 {
            s.list_refusals -= 1;
            return Err(BackendError::Status {
                status: 500,
                url: "/".to_string(),
            });
        }
        Ok(s.cells.clone())
    }

    async fn cell_status(&self, id: &CellId) -> Result<CellStatus, BackendError> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::Status(id.clone()));
        if s.status_failures > 0 {
            s.status_failures -= 1;
            return Err(BackendError::Decode("connection reset".to_string()));
        }
        if let Some(next) = s.pending.get_mut(id).and_then(next_sticky) {
            s.current.insert(id.clone(), next);
        }
        s.current
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::Status {
                status: 404,
                url: format!("/{id}/status"),
            })
    }

    async fn invoke(&self, id: &CellId, operation: Operation) -> Result<InvokeResponse, BackendError> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::Invoke(id.clone(), operation));
        let plan = s
            .plans
            .get_mut(&(id.clone(), operation))
            .and_then(next_sticky)
            .unwrap_or(OpPlan::Succeed);

        let spec = self.table.spec(operation);
        let queued: Vec<CellStatus> = match plan {
            OpPlan::Succeed => vec![spec.transitional.clone(), spec.target.clone()],
            OpPlan::EndIn(end) => vec![spec.transitional.clone(), end],
            OpPlan::Hang => vec![spec.transitional.clone()],
            OpPlan::Reject(code) => {
                return Ok(InvokeResponse::Rejected {
                    code,
                    body: "operation not allowed".to_string(),
                })
            }
            OpPlan::Unreachable => return Err(BackendError::Decode("connection refused".to_string())),
        };
        s.pending.insert(id.clone(), queued.into_iter().collect());
        Ok(InvokeResponse::Accepted)
    }

    fn backend_name(&self) -> &str {
        "fake"
    }
}

/// Built-in defaults: stop 40s, start 300s, poll 10s, cool-down 30s,
/// tick 30s, budget 3.
pub fn test_config() -> HealerConfig {
    HealerConfig::default()
}
