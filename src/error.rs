//! Error taxonomy for the export pipeline.
//!
//! Stage-local errors ([`crate::raster::CaptureError`],
//! [`crate::remote::RemoteError`]) convert into [`ExportError`], which is
//! what single-entity operations return and what the batch layer records per
//! item.

use serde::Serialize;

use crate::employee::Status;

/// Every way an export operation can fail for one employee.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExportError {
    /// The employee's current status does not permit the requested action,
    /// or another invocation is already working on the same employee.
    #[error("employee {id}: {detail}")]
    InvalidState { id: u64, detail: String },

    /// Rendering or rasterisation failed.
    #[error("capture failed: {0}")]
    Capture(String),

    /// The composed document exceeds the object store's size limit.
    #[error("artifact is {size} bytes, limit is {limit} bytes")]
    ArtifactTooLarge { size: usize, limit: usize },

    /// The object store rejected or never acknowledged the upload.
    #[error("upload failed: {0}")]
    Upload(String),

    /// A record-system status transition failed.
    #[error("record system: {0}")]
    Remote(String),

    /// A newer request superseded this one.
    #[error("cancelled")]
    Cancelled,
}

/// Copyable discriminant of [`ExportError`], used in summaries and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidState,
    Capture,
    ArtifactTooLarge,
    Upload,
    Remote,
    Cancelled,
}

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExportError::InvalidState { .. } => ErrorKind::InvalidState,
            ExportError::Capture(_) => ErrorKind::Capture,
            ExportError::ArtifactTooLarge { .. } => ErrorKind::ArtifactTooLarge,
            ExportError::Upload(_) => ErrorKind::Upload,
            ExportError::Remote(_) => ErrorKind::Remote,
            ExportError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Transient failures worth another attempt. Precondition violations and
    /// oversized artifacts will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Capture | ErrorKind::Upload | ErrorKind::Remote
        )
    }

    pub(crate) fn wrong_status(id: u64, actual: Status, required: &[Status]) -> Self {
        let required = required
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" or ");
        ExportError::InvalidState {
            id,
            detail: format!("status is {}, requires {}", actual.as_str(), required),
        }
    }

    pub(crate) fn busy(id: u64) -> Self {
        ExportError::InvalidState {
            id,
            detail: "another export is already in flight".to_string(),
        }
    }

    pub(crate) fn unknown(id: u64) -> Self {
        ExportError::InvalidState {
            id,
            detail: "not registered with the status board".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(ExportError::Capture("x".into()).is_retryable());
        assert!(ExportError::Upload("x".into()).is_retryable());
        assert!(!ExportError::busy(1).is_retryable());
        assert!(!ExportError::ArtifactTooLarge { size: 2, limit: 1 }.is_retryable());
        assert!(!ExportError::Cancelled.is_retryable());
    }

    #[test]
    fn wrong_status_message_names_both_states() {
        let err = ExportError::wrong_status(7, Status::Rendered, &[Status::Approved]);
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(
            err.to_string(),
            "employee 7: status is Rendered, requires Approved"
        );
    }
}
