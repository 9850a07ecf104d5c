//! Remote collaborators: the object store that keeps released documents
//! and the record system that owns employee status.
//!
//! Both sit behind `async_trait` traits so the workflow can be driven by
//! in-memory fakes. The HTTP clients speak JSON over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::ExportError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("server returned {0}: {1}")]
    Status(u16, String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn into_upload(self) -> ExportError {
        ExportError::Upload(self.to_string())
    }

    pub fn into_remote(self) -> ExportError {
        ExportError::Remote(self.to_string())
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

/// What the object store answers after a durable write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub url: String,
    /// Whether the store also wrote the reference into the record system.
    #[serde(default)]
    pub record_synced: bool,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        employee_id: u64,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt, RemoteError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutedEmployee {
    pub id: u64,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingFailure {
    pub id: u64,
    pub reason: String,
}

/// Per-entity outcome of one batch routing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingReport {
    #[serde(default)]
    pub routed: Vec<RoutedEmployee>,
    #[serde(default)]
    pub failed: Vec<RoutingFailure>,
}

/// Status transitions on the system of record. Every call is idempotent on
/// the remote side.
#[async_trait]
pub trait RecordSystem: Send + Sync {
    async fn approve(&self, employee_id: u64, document_url: &str) -> Result<(), RemoteError>;

    /// Returns the POC destination the card is routed to.
    async fn send_to_poc(&self, employee_id: u64) -> Result<String, RemoteError>;

    async fn complete(&self, employee_id: u64) -> Result<(), RemoteError>;

    async fn route_approved(&self, employee_ids: &[u64]) -> Result<RoutingReport, RemoteError>;
}

fn client(timeout: Duration) -> Result<Client, RemoteError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(RemoteError::from)
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RemoteError::Status(status.as_u16(), body))
}

/// POSTs raw PDF bytes to a single upload endpoint.
pub struct HttpObjectStore {
    client: Client,
    upload_url: Url,
}

impl HttpObjectStore {
    pub fn new(upload_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let upload_url =
            Url::parse(upload_url).map_err(|e| RemoteError::Transport(format!("{upload_url}: {e}")))?;
        Ok(Self {
            client: client(timeout)?,
            upload_url,
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(
        &self,
        employee_id: u64,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt, RemoteError> {
        let resp = self
            .client
            .post(self.upload_url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .header("X-Employee-Id", employee_id.to_string())
            .header("X-File-Name", file_name)
            .body(bytes.to_vec())
            .send()
            .await?;
        let receipt: UploadReceipt = check(resp).await?.json().await?;
        if receipt.url.trim().is_empty() {
            return Err(RemoteError::Decode("upload receipt has no url".into()));
        }
        Ok(receipt)
    }
}

#[derive(Serialize)]
struct ApproveBody<'a> {
    document_url: &'a str,
}

#[derive(Deserialize)]
struct DestinationBody {
    destination: String,
}

#[derive(Serialize)]
struct RouteBody<'a> {
    employee_ids: &'a [u64],
}

/// JSON endpoints under one base URL:
/// `employees/{id}/approve`, `employees/{id}/send-to-poc`,
/// `employees/{id}/complete` and `poc/route`.
pub struct HttpRecordSystem {
    client: Client,
    base: Url,
}

impl HttpRecordSystem {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let mut base =
            Url::parse(base).map_err(|e| RemoteError::Transport(format!("{base}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: client(timeout)?,
            base,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.base
            .join(path)
            .map_err(|e| RemoteError::Transport(format!("{path}: {e}")))
    }
}

#[async_trait]
impl RecordSystem for HttpRecordSystem {
    async fn approve(&self, employee_id: u64, document_url: &str) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("employees/{employee_id}/approve"))?;
        let resp = self
            .client
            .post(url)
            .json(&ApproveBody { document_url })
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn send_to_poc(&self, employee_id: u64) -> Result<String, RemoteError> {
        let url = self.endpoint(&format!("employees/{employee_id}/send-to-poc"))?;
        let resp = self.client.post(url).send().await?;
        let body: DestinationBody = check(resp).await?.json().await?;
        Ok(body.destination)
    }

    async fn complete(&self, employee_id: u64) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("employees/{employee_id}/complete"))?;
        let resp = self.client.post(url).send().await?;
        check(resp).await?;
        Ok(())
    }

    async fn route_approved(&self, employee_ids: &[u64]) -> Result<RoutingReport, RemoteError> {
        let url = self.endpoint("poc/route")?;
        let resp = self
            .client
            .post(url)
            .json(&RouteBody { employee_ids })
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }
}
