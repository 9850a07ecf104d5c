//! Status board – the single serialization point for employee status.
//!
//! An operation first claims an employee (precondition check plus an
//! in-flight mark, atomically), does its slow work, then commits one forward
//! transition. A second claim on the same employee while the first is alive
//! fails fast. Dropping a claim without committing leaves the status as it
//! was.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::employee::{EmployeeRecord, Status};
use crate::error::ExportError;

/// What the board knows about one employee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusEntry {
    pub status: Status,
    pub document_url: Option<String>,
    pub poc_destination: Option<String>,
    pub sync_pending: bool,
}

#[derive(Debug, Default)]
struct Slot {
    entry: StatusEntry,
    in_flight: bool,
}

#[derive(Debug, Default)]
pub struct StatusBoard {
    slots: Mutex<HashMap<u64, Slot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<u64, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Track `employee` at its recorded status. Already tracked employees
    /// keep their board state.
    pub fn register(&self, employee: &EmployeeRecord) {
        self.slots().entry(employee.id).or_insert_with(|| Slot {
            entry: StatusEntry {
                status: employee.status,
                ..Default::default()
            },
            in_flight: false,
        });
    }

    pub fn register_all<'a>(&self, employees: impl IntoIterator<Item = &'a EmployeeRecord>) {
        for e in employees {
            self.register(e);
        }
    }

    pub fn status(&self, id: u64) -> Option<Status> {
        self.slots().get(&id).map(|s| s.entry.status)
    }

    pub fn entry(&self, id: u64) -> Option<StatusEntry> {
        self.slots().get(&id).map(|s| s.entry.clone())
    }

    /// Claim `id` if its status is one of `allowed` and nobody else holds it.
    pub fn claim(&self, id: u64, allowed: &[Status]) -> Result<StatusClaim<'_>, ExportError> {
        let mut slots = self.slots();
        let slot = slots.get_mut(&id).ok_or_else(|| ExportError::unknown(id))?;
        if slot.in_flight {
            return Err(ExportError::busy(id));
        }
        if !allowed.contains(&slot.entry.status) {
            return Err(ExportError::wrong_status(id, slot.entry.status, allowed));
        }
        slot.in_flight = true;
        Ok(StatusClaim {
            board: self,
            id,
            entry: slot.entry.clone(),
        })
    }

    /// Claim every idle employee currently at `status`, in id order.
    pub fn claim_all(&self, status: Status) -> Vec<StatusClaim<'_>> {
        let mut slots = self.slots();
        let mut ids: Vec<u64> = slots
            .iter()
            .filter(|(_, s)| !s.in_flight && s.entry.status == status)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| {
                let slot = slots.get_mut(&id)?;
                slot.in_flight = true;
                Some(StatusClaim {
                    board: self,
                    id,
                    entry: slot.entry.clone(),
                })
            })
            .collect()
    }
}

/// Exclusive right to move one employee forward.
#[derive(Debug)]
pub struct StatusClaim<'a> {
    board: &'a StatusBoard,
    id: u64,
    entry: StatusEntry,
}

impl StatusClaim<'_> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> Status {
        self.entry.status
    }

    /// Board state as of the claim.
    pub fn entry(&self) -> &StatusEntry {
        &self.entry
    }

    /// Apply `update` and move to `next` in one step.
    pub fn commit(
        self,
        next: Status,
        update: impl FnOnce(&mut StatusEntry),
    ) -> Result<StatusEntry, ExportError> {
        let current = self.entry.status;
        if !current.can_advance_to(next) {
            return Err(ExportError::wrong_status(self.id, current, &[next]));
        }
        let mut slots = self.board.slots();
        let slot = slots
            .get_mut(&self.id)
            .ok_or_else(|| ExportError::unknown(self.id))?;
        update(&mut slot.entry);
        slot.entry.status = next;
        log::info!(
            "employee {}: {} -> {}",
            self.id,
            current.as_str(),
            next.as_str()
        );
        Ok(slot.entry.clone())
    }
}

impl Drop for StatusClaim<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.board.slots().get_mut(&self.id) {
            slot.in_flight = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(id: u64, status: Status) -> StatusBoard {
        let board = StatusBoard::new();
        board.register(&EmployeeRecord {
            id,
            status,
            ..Default::default()
        });
        board
    }

    #[test]
    fn duplicate_claim_fails_fast() {
        let board = board_with(1, Status::Rendered);
        let first = board.claim(1, &[Status::Rendered]).unwrap();
        let err = board.claim(1, &[Status::Rendered]).unwrap_err();
        assert!(err.to_string().contains("in flight"));
        drop(first);
        assert!(board.claim(1, &[Status::Rendered]).is_ok());
    }

    #[test]
    fn dropped_claim_leaves_status() {
        let board = board_with(1, Status::Rendered);
        drop(board.claim(1, &[Status::Rendered]).unwrap());
        assert_eq!(board.status(1), Some(Status::Rendered));
    }

    #[test]
    fn commit_moves_forward_only() {
        let board = board_with(1, Status::Rendered);
        let claim = board.claim(1, &[Status::Rendered]).unwrap();
        let err = claim.commit(Status::SentToPoc, |_| {}).unwrap_err();
        assert!(matches!(err, ExportError::InvalidState { id: 1, .. }));
        assert_eq!(board.status(1), Some(Status::Rendered));

        let claim = board.claim(1, &[Status::Rendered]).unwrap();
        let entry = claim
            .commit(Status::Approved, |e| e.document_url = Some("u".into()))
            .unwrap();
        assert_eq!(entry.status, Status::Approved);
        assert_eq!(board.entry(1).unwrap().document_url.as_deref(), Some("u"));
        // Claim released after commit.
        assert!(board.claim(1, &[Status::Approved]).is_ok());
    }

    #[test]
    fn wrong_status_and_unknown_ids_are_rejected() {
        let board = board_with(1, Status::Approved);
        assert!(board.claim(1, &[Status::Rendered]).is_err());
        assert!(board.claim(2, &[Status::Rendered]).is_err());
    }

    #[test]
    fn claim_all_skips_busy_entries() {
        let board = StatusBoard::new();
        for id in [3, 1, 2] {
            board.register(&EmployeeRecord {
                id,
                status: Status::Approved,
                ..Default::default()
            });
        }
        let busy = board.claim(2, &[Status::Approved]).unwrap();
        let claims = board.claim_all(Status::Approved);
        let ids: Vec<u64> = claims.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![1, 3]);
        drop(busy);
    }
}
