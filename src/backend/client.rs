//! HTTP backend — reqwest implementation of [`CellBackend`]
//!
//! Wire format:
//! - `GET  {base}/`               → `{"results": [{"uuid": "...", "description": "..."}]}`
//! - `GET  {base}/{uuid}/status`  → `{"current_status": "..."}`
//! - `POST {base}/{uuid}/{op}/`   → 202 when accepted (basic auth)

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{BackendError, CellBackend, InvokeResponse};
use crate::config::defaults::{MAX_REJECTION_BODY_BYTES, OPERATION_ACCEPTED_STATUS};
use crate::config::BackendConfig;
use crate::types::{Cell, CellId, CellStatus, Operation};

/// One entry of the listing response.
#[derive(Debug, Deserialize)]
struct CellEntry {
    #[serde(alias = "id")]
    uuid: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CellListing {
    results: Vec<CellEntry>,
}

#[derive(Debug, Deserialize)]
struct CellStatusBody {
    current_status: String,
}

/// HTTP client for the cell management backend
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpBackend {
    /// Create a backend client from the `[backend]` config section.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Self::with_base_url(&config.base_url(), &config.username, &config.password)
    }

    /// Create a backend client against an explicit base URL.
    pub fn with_base_url(base_url: &str, username: &str, password: &str) -> Result<Self, BackendError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| BackendError::InvalidUrl(format!("{base_url}: {e}")))?;

        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            base_url,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, BackendError> {
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| BackendError::Decode(format!("{url}: {e}")))
    }
}

#[async_trait]
impl CellBackend for HttpBackend {
    async fn list_cells(&self) -> Result<Vec<Cell>, BackendError> {
        let listing: CellListing = self.get_json(format!("{}/", self.base_url)).await?;
        let cells: Vec<Cell> = listing
            .results
            .into_iter()
            .map(|entry| {
                let name = entry
                    .description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| entry.uuid.clone());
                Cell {
                    id: CellId::new(entry.uuid),
                    name,
                }
            })
            .collect();
        debug!(count = cells.len(), "Listed cells");
        Ok(cells)
    }

    async fn cell_status(&self, id: &CellId) -> Result<CellStatus, BackendError> {
        let body: CellStatusBody = self
            .get_json(format!("{}/{}/status", self.base_url, id))
            .await?;
        Ok(CellStatus::parse(&body.current_status))
    }

    async fn invoke(&self, id: &CellId, operation: Operation) -> Result<InvokeResponse, BackendError> {
        let resp = self
            .http
            .post(format!("{}/{}/{}/", self.base_url, id, operation))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let code = resp.status().as_u16();
        if code == OPERATION_ACCEPTED_STATUS {
            return Ok(InvokeResponse::Accepted);
        }

        // The body is diagnostic only; a failure to read it must not hide the code.
        let mut body = resp.text().await.unwrap_or_default();
        if body.len() > MAX_REJECTION_BODY_BYTES {
            let mut cut = MAX_REJECTION_BODY_BYTES;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Ok(InvokeResponse::Rejected { code, body })
    }

    fn backend_name(&self) -> &str {
        &self.base_url
    }
}
