//! Export workflow – the `Rendered → Approved → SentToPOC → Completed`
//! state machine.
//!
//! Every operation claims the employee on the [`StatusBoard`] first, so a
//! concurrent duplicate fails fast with `InvalidState`. The status only moves
//! after the remote write it depends on has succeeded; on any error the claim
//! is dropped and the status stays where it was.

use std::sync::Arc;

use serde::Serialize;

use crate::cancel::{CancelToken, PreviewTracker};
use crate::employee::{EmployeeRecord, Status};
use crate::error::{ErrorKind, ExportError};
use crate::pipeline::{Artifact, DocumentBuilder};
use crate::remote::{ObjectStore, RecordSystem, RoutingFailure, RoutingReport};
use crate::status::{StatusBoard, StatusEntry};

/// Object-store upload ceiling used when nothing else is configured.
pub const DEFAULT_MAX_ARTIFACT_BYTES: usize = 10 * 1024 * 1024;

/// A released document: only built after the upload was acknowledged.
#[derive(Debug, Clone)]
pub struct ExportReceipt {
    pub employee_id: u64,
    pub document_url: String,
    /// Stored, but the record system has not confirmed the reference yet.
    pub sync_pending: bool,
    pub artifact: Artifact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureInfo {
    pub kind: ErrorKind,
    pub message: String,
}

/// Flat, serialisable outcome of `generate_and_approve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportResult {
    pub success: bool,
    pub document_url: Option<String>,
    pub sync_pending: bool,
    pub error: Option<FailureInfo>,
}

impl ExportResult {
    pub fn released(receipt: &ExportReceipt) -> Self {
        ExportResult {
            success: true,
            document_url: Some(receipt.document_url.clone()),
            sync_pending: receipt.sync_pending,
            error: None,
        }
    }

    pub fn failed(error: &ExportError) -> Self {
        ExportResult {
            success: false,
            document_url: None,
            sync_pending: false,
            error: Some(FailureInfo {
                kind: error.kind(),
                message: error.to_string(),
            }),
        }
    }
}

impl From<&Result<ExportReceipt, ExportError>> for ExportResult {
    fn from(outcome: &Result<ExportReceipt, ExportError>) -> Self {
        match outcome {
            Ok(receipt) => ExportResult::released(receipt),
            Err(e) => ExportResult::failed(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PocReceipt {
    pub employee_id: u64,
    pub destination: String,
}

pub struct ExportWorkflow {
    builder: Arc<dyn DocumentBuilder>,
    store: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordSystem>,
    board: Arc<StatusBoard>,
    previews: PreviewTracker,
    max_artifact_bytes: usize,
}

impl ExportWorkflow {
    pub fn new(
        builder: Arc<dyn DocumentBuilder>,
        store: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordSystem>,
        board: Arc<StatusBoard>,
    ) -> Self {
        Self {
            builder,
            store,
            records,
            board,
            previews: PreviewTracker::new(),
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
        }
    }

    pub fn with_max_artifact_bytes(mut self, limit: usize) -> Self {
        self.max_artifact_bytes = limit;
        self
    }

    pub fn board(&self) -> &Arc<StatusBoard> {
        &self.board
    }

    /// Render, upload, then approve one `Rendered` employee.
    ///
    /// The artifact is only handed back once the object store has
    /// acknowledged it. A failed record-system write after that point is
    /// reported through `sync_pending`, not as an error.
    pub async fn generate_and_approve(
        &self,
        employee: &EmployeeRecord,
    ) -> Result<ExportReceipt, ExportError> {
        let id = employee.id;
        self.board.register(employee);
        let claim = self.board.claim(id, &[Status::Rendered])?;

        let artifact = self
            .builder
            .build(employee, &CancelToken::new())
            .await?;
        if artifact.len() > self.max_artifact_bytes {
            return Err(ExportError::ArtifactTooLarge {
                size: artifact.len(),
                limit: self.max_artifact_bytes,
            });
        }

        let receipt = self
            .store
            .upload(id, &artifact.file_name, &artifact.bytes)
            .await
            .map_err(|e| e.into_upload())?;
        if receipt.url.trim().is_empty() {
            return Err(ExportError::Upload("store returned an empty url".into()));
        }
        log::info!(
            "employee {id}: stored {} ({} bytes) at {}",
            artifact.file_name,
            artifact.len(),
            receipt.url
        );

        let mut sync_pending = !receipt.record_synced;
        if let Err(e) = self.records.approve(id, &receipt.url).await {
            log::warn!("employee {id}: approve not recorded: {e}");
            sync_pending = true;
        }
        if sync_pending {
            log::warn!("employee {id}: document stored, record sync pending");
        }

        let url = receipt.url;
        claim.commit(Status::Approved, |entry| {
            entry.document_url = Some(url.clone());
            entry.sync_pending = sync_pending;
        })?;

        Ok(ExportReceipt {
            employee_id: id,
            document_url: url,
            sync_pending,
            artifact,
        })
    }

    /// Route an `Approved` employee to its POC. Repeating the call on a
    /// `SentToPOC` employee returns the recorded destination without
    /// contacting the record system again.
    pub async fn send_to_poc(&self, employee_id: u64) -> Result<PocReceipt, ExportError> {
        let claim = self
            .board
            .claim(employee_id, &[Status::Approved, Status::SentToPoc])?;
        if claim.status() == Status::SentToPoc {
            return Ok(PocReceipt {
                employee_id,
                destination: claim.entry().poc_destination.clone().unwrap_or_default(),
            });
        }

        let destination = self
            .records
            .send_to_poc(employee_id)
            .await
            .map_err(|e| e.into_remote())?;
        claim.commit(Status::SentToPoc, |entry| {
            entry.poc_destination = Some(destination.clone());
        })?;
        Ok(PocReceipt {
            employee_id,
            destination,
        })
    }

    /// Close out a card that has been handed over.
    pub async fn mark_completed(&self, employee_id: u64) -> Result<StatusEntry, ExportError> {
        let claim = self.board.claim(
            employee_id,
            &[Status::Approved, Status::SentToPoc, Status::Completed],
        )?;
        if claim.status() == Status::Completed {
            return Ok(claim.entry().clone());
        }
        self.records
            .complete(employee_id)
            .await
            .map_err(|e| e.into_remote())?;
        claim.commit(Status::Completed, |_| {})
    }

    /// Route every idle `Approved` employee in one request.
    pub async fn route_approved_to_poc(&self) -> Result<RoutingReport, ExportError> {
        let claims = self.board.claim_all(Status::Approved);
        if claims.is_empty() {
            return Ok(RoutingReport::default());
        }
        let ids: Vec<u64> = claims.iter().map(|c| c.id()).collect();
        let mut report = self
            .records
            .route_approved(&ids)
            .await
            .map_err(|e| e.into_remote())?;

        let mut routed = Vec::with_capacity(report.routed.len());
        for claim in claims {
            let id = claim.id();
            match report.routed.iter().find(|r| r.id == id) {
                Some(r) => {
                    let destination = r.destination.clone();
                    claim.commit(Status::SentToPoc, |entry| {
                        entry.poc_destination = Some(destination);
                    })?;
                    routed.push(r.clone());
                }
                None if report.failed.iter().any(|f| f.id == id) => {}
                None => report.failed.push(RoutingFailure {
                    id,
                    reason: "not reported by record system".into(),
                }),
            }
        }
        for stray in report.routed.iter().filter(|r| !ids.contains(&r.id)) {
            log::warn!("routing reported unknown employee {}", stray.id);
        }
        report.routed = routed;
        log::info!(
            "poc routing: {} routed, {} failed",
            report.routed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Build the document without touching the store, the record system or
    /// the status board. A newer preview for the same employee cancels this
    /// one, which then returns `Cancelled`.
    pub async fn preview(&self, employee: &EmployeeRecord) -> Result<Artifact, ExportError> {
        let token = self.previews.begin(employee.id);
        let outcome = self.builder.build(employee, &token).await;
        self.previews.finish(employee.id, &token);
        token.check()?;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{RemoteError, RoutedEmployee, UploadReceipt};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TinyBuilder;

    #[async_trait]
    impl DocumentBuilder for TinyBuilder {
        async fn build(
            &self,
            employee: &EmployeeRecord,
            cancel: &CancelToken,
        ) -> Result<Artifact, ExportError> {
            cancel.check()?;
            Ok(Artifact::new(employee, b"%PDF-1.7".to_vec(), 2))
        }
    }

    struct Store;

    #[async_trait]
    impl ObjectStore for Store {
        async fn upload(&self, id: u64, _: &str, _: &[u8]) -> Result<UploadReceipt, RemoteError> {
            Ok(UploadReceipt {
                url: format!("https://store/{id}.pdf"),
                record_synced: true,
            })
        }
    }

    #[derive(Default)]
    struct Records {
        completes: AtomicUsize,
        fail_approve: bool,
    }

    #[async_trait]
    impl RecordSystem for Records {
        async fn approve(&self, _: u64, _: &str) -> Result<(), RemoteError> {
            if self.fail_approve {
                Err(RemoteError::Status(500, "down".into()))
            } else {
                Ok(())
            }
        }
        async fn send_to_poc(&self, _: u64) -> Result<String, RemoteError> {
            Ok("Main Branch".into())
        }
        async fn complete(&self, _: u64) -> Result<(), RemoteError> {
            self.completes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn route_approved(&self, ids: &[u64]) -> Result<RoutingReport, RemoteError> {
            Ok(RoutingReport {
                routed: ids
                    .iter()
                    .filter(|id| *id % 2 == 1)
                    .map(|&id| RoutedEmployee {
                        id,
                        destination: format!("POC-{id}"),
                    })
                    .collect(),
                failed: vec![RoutingFailure {
                    id: 2,
                    reason: "no branch".into(),
                }],
            })
        }
    }

    fn workflow(records: Records) -> (ExportWorkflow, Arc<Records>) {
        let records = Arc::new(records);
        let wf = ExportWorkflow::new(
            Arc::new(TinyBuilder),
            Arc::new(Store),
            records.clone(),
            Arc::new(StatusBoard::new()),
        );
        (wf, records)
    }

    fn employee(id: u64, status: Status) -> EmployeeRecord {
        EmployeeRecord {
            id,
            last_name: "Santos".into(),
            status,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn failed_approve_is_sync_pending_not_failure() {
        let (wf, _) = workflow(Records {
            fail_approve: true,
            ..Default::default()
        });
        let receipt = wf
            .generate_and_approve(&employee(1, Status::Rendered))
            .await
            .unwrap();
        assert!(receipt.sync_pending);
        assert_eq!(wf.board().status(1), Some(Status::Approved));
        assert!(wf.board().entry(1).unwrap().sync_pending);
    }

    #[tokio::test]
    async fn rendered_cannot_skip_to_poc() {
        let (wf, _) = workflow(Records::default());
        wf.board().register(&employee(4, Status::Rendered));
        let err = wf.send_to_poc(4).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn completion_is_idempotent() {
        let (wf, records) = workflow(Records::default());
        wf.board().register(&employee(5, Status::SentToPoc));
        wf.mark_completed(5).await.unwrap();
        let entry = wf.mark_completed(5).await.unwrap();
        assert_eq!(entry.status, Status::Completed);
        assert_eq!(records.completes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn routing_moves_only_routed_employees() {
        let (wf, _) = workflow(Records::default());
        for id in 1..=3 {
            wf.board().register(&employee(id, Status::Approved));
        }
        wf.board().register(&employee(9, Status::Rendered));
        let report = wf.route_approved_to_poc().await.unwrap();
        assert_eq!(report.routed.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(wf.board().status(1), Some(Status::SentToPoc));
        assert_eq!(wf.board().status(2), Some(Status::Approved));
        assert_eq!(
            wf.board().entry(3).unwrap().poc_destination.as_deref(),
            Some("POC-3")
        );
        assert_eq!(wf.board().status(9), Some(Status::Rendered));
    }

    #[test]
    fn result_from_error_carries_kind() {
        let outcome: Result<ExportReceipt, ExportError> = Err(ExportError::Upload("503".into()));
        let result = ExportResult::from(&outcome);
        assert!(!result.success);
        assert_eq!(result.document_url, None);
        assert_eq!(result.error.unwrap().kind, ErrorKind::Upload);
    }
}
