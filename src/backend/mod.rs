//! Backend Client — the RPC boundary to the cell management backend
//!
//! The controller only ever needs three calls: list cells, read one cell's
//! status, and invoke a lifecycle operation. [`CellBackend`] captures exactly
//! that, so the lifecycle driver and reconciler can run against the real
//! HTTP backend ([`HttpBackend`]) or an in-memory double in tests.
//!
//! No request timeout is imposed at this layer. Operation timeouts are
//! enforced by the lifecycle driver.

pub mod client;

pub use client::HttpBackend;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::types::{Cell, CellId, CellStatus, Operation};

/// Failures talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Backend returned status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("Malformed backend response: {0}")]
    Decode(String),
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    /// No usable answer came back: the connection failed or the body could
    /// not be parsed. A non-2xx reply is an answer, not a transport failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, BackendError::Http(_) | BackendError::Decode(_))
    }
}

/// HTTP-level answer to a lifecycle operation invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeResponse {
    /// Backend accepted the operation (HTTP 202).
    Accepted,
    /// Backend answered with any other status code.
    Rejected { code: u16, body: String },
}

/// Capability to observe and drive cells on the management backend.
#[async_trait]
pub trait CellBackend: Send + Sync {
    /// List every cell the backend manages, in backend order.
    async fn list_cells(&self) -> Result<Vec<Cell>, BackendError>;

    /// Read the current status of one cell.
    async fn cell_status(&self, id: &CellId) -> Result<CellStatus, BackendError>;

    /// Ask the backend to begin `operation` on a cell.
    ///
    /// `Err` means no HTTP answer was obtained; an application-level refusal
    /// is `Ok(InvokeResponse::Rejected { .. })`.
    async fn invoke(&self, id: &CellId, operation: Operation) -> Result<InvokeResponse, BackendError>;

    /// Human-readable backend name for logging.
    fn backend_name(&self) -> &str;
}

/// Run an essential backend call until the backend answers.
///
/// Listing and status reads cannot be skipped: the loop has nothing to act on
/// without them. Transport failures are logged and retried after
/// `retry_wait`, with no ceiling. Any other error is an answer from the
/// backend and is handed back to the caller at once.
///
/// Returns `None` only if `cancel` fires while waiting.
pub async fn fetch_essential<T, F, Fut>(
    what: &str,
    retry_wait: Duration,
    cancel: &CancellationToken,
    mut call: F,
) -> Option<Result<T, BackendError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut consecutive_failures: u64 = 0;
    loop {
        match call().await {
            Err(e) if e.is_transport() => {
                consecutive_failures += 1;
                warn!(
                    call = what,
                    error = %e,
                    consecutive_failures,
                    retry_in_secs = retry_wait.as_secs(),
                    "Backend unreachable, retrying"
                );
            }
            answered => return Some(answered),
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(retry_wait) => {}
        }
    }
}
