//! Cooperative cancellation for previews.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::ExportError;

/// Shared flag checked between pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), ExportError> {
        if self.is_cancelled() {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn same(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// One live preview per employee: starting a new one cancels the old one.
#[derive(Debug, Default)]
pub struct PreviewTracker {
    active: Mutex<HashMap<u64, CancelToken>>,
}

impl PreviewTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new preview for `employee_id`, cancelling any earlier one.
    pub fn begin(&self, employee_id: u64) -> CancelToken {
        let token = CancelToken::new();
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = active.insert(employee_id, token.clone()) {
            log::debug!("employee {employee_id}: superseding running preview");
            previous.cancel();
        }
        token
    }

    /// Forget `token` unless a newer preview already replaced it.
    pub fn finish(&self, employee_id: u64, token: &CancelToken) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.get(&employee_id).is_some_and(|t| t.same(token)) {
            active.remove(&employee_id);
        }
    }

    /// Cancel whatever preview is running for `employee_id`.
    pub fn cancel(&self, employee_id: u64) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        match active.get(&employee_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}
