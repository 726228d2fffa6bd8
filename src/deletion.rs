//! Optimistic deletion with undo
//!
//! Delete-with-undo semantics against an unreliable backend, in two tiers:
//!
//! - **Soft delete** (30 s pre-commit window): the item is hidden locally and
//!   no backend call is issued. Explicit commit/revert closes the window;
//!   expiry auto-commits into the optimistic path.
//! - **Optimistic delete**: the item is removed from the active collection
//!   and an external `delete(id)` is issued. Success commits and opens a
//!   10 s undo offer; failure reverts, restoring the item through an
//!   external `create(snapshot)` call.
//!
//! The two windows run on separate timers and separate state-machine stages.
//! A pending-operations map serializes backend calls per id so a second
//! delete or restore can never race the first.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration as StdDuration;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::config::DeletionConfig;
use crate::error::EngineError;
use crate::store::{ActiveCollection, RemoteStore};
use crate::types::{DeletedItemRecord, DeletionState, Interaction};

const ITEM_TYPE_INTERACTION: &str = "interaction";

/// Delete/undo state machine over an active collection and a remote backend.
pub struct OptimisticMutationManager {
    active: Arc<dyn ActiveCollection>,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    config: DeletionConfig,
    deleted: Mutex<HashMap<String, DeletedItemRecord>>,
    /// Ids with a backend call in flight. Guards against duplicate
    /// delete/create requests for the same id.
    pending: Mutex<HashSet<String>>,
    /// Self-handle for the window-expiry timers.
    weak: Weak<Self>,
}

impl OptimisticMutationManager {
    pub fn new(
        active: Arc<dyn ActiveCollection>,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        config: DeletionConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            active,
            remote,
            clock,
            config,
            deleted: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashSet::new()),
            weak: weak.clone(),
        })
    }

    /// Remove the item from the active collection immediately and issue the
    /// backend delete.
    ///
    /// On success the record commits and the undo offer auto-clears after the
    /// undo window. On failure the item is restored (backend `create` plus
    /// local re-insert) and the error is surfaced.
    pub async fn optimistic_delete(&self, item: Interaction) -> Result<(), EngineError> {
        let id = item.id.clone();
        self.claim_pending(&id)?;

        self.active.remove(&id);
        self.deleted.lock().insert(
            id.clone(),
            DeletedItemRecord {
                id: id.clone(),
                item_type: ITEM_TYPE_INTERACTION.to_string(),
                snapshot: item.clone(),
                deleted_at: self.clock.now(),
                committed_at: None,
                state: DeletionState::Optimistic,
            },
        );

        match self.remote.delete(&id).await {
            Ok(()) => {
                let now = self.clock.now();
                if let Some(record) = self.deleted.lock().get_mut(&id) {
                    record.state = DeletionState::Committed;
                    record.committed_at = Some(now);
                }
                self.release_pending(&id);
                self.spawn_undo_expiry(id);
                Ok(())
            }
            Err(err) => {
                log::warn!("delete of {} failed, reverting: {}", id, err);
                // Restore through the backend as well — it is treated as
                // unreliable and the snapshot re-create is the restore
                // contract.
                if let Err(create_err) = self.remote.create(&item).await {
                    log::warn!("restore create for {} also failed: {}", id, create_err);
                }
                if let Some(record) = self.deleted.lock().get_mut(&id) {
                    record.state = DeletionState::Reverted;
                }
                self.active.restore(item);
                self.release_pending(&id);
                Err(err)
            }
        }
    }

    /// Undo a committed delete while the undo offer is still open.
    ///
    /// Issues an external `create(snapshot)`; on success the tracking record
    /// is removed and the item restored. On failure the record stays
    /// committed and the caller gets a retryable error.
    pub async fn undo(&self, id: &str) -> Result<(), EngineError> {
        self.claim_pending(id)?;

        let snapshot = {
            let deleted = self.deleted.lock();
            match deleted.get(id) {
                Some(record) if record.state == DeletionState::Committed => {
                    record.snapshot.clone()
                }
                Some(_) => {
                    self.release_pending(id);
                    return Err(EngineError::InvalidState {
                        id: id.to_string(),
                        expected: "committed",
                    });
                }
                None => {
                    self.release_pending(id);
                    return Err(EngineError::NotFound {
                        kind: "deleted item",
                        id: id.to_string(),
                    });
                }
            }
        };

        match self.remote.create(&snapshot).await {
            Ok(_new_id) => {
                self.deleted.lock().remove(id);
                self.active.restore(snapshot);
                self.release_pending(id);
                log::info!("undo restored {}", id);
                Ok(())
            }
            Err(err) => {
                // Undo offer stays open; the caller may retry.
                self.release_pending(id);
                Err(err)
            }
        }
    }

    /// Hide the item locally without touching the backend. If neither
    /// committed nor reverted before the soft-delete window elapses, it
    /// auto-commits into the optimistic-delete path.
    pub fn soft_delete(&self, item: Interaction) -> Result<(), EngineError> {
        let id = item.id.clone();
        if self.is_pending_or_deleted(&id) {
            return Err(EngineError::Concurrency(id));
        }

        self.active.remove(&id);
        self.deleted.lock().insert(
            id.clone(),
            DeletedItemRecord {
                id: id.clone(),
                item_type: ITEM_TYPE_INTERACTION.to_string(),
                snapshot: item,
                deleted_at: self.clock.now(),
                committed_at: None,
                state: DeletionState::SoftDeleted,
            },
        );

        let Some(this) = self.weak.upgrade() else {
            return Ok(());
        };
        let window = StdDuration::from_secs(self.config.soft_delete_window_secs);
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(snapshot) = this.take_soft_deleted(&id) {
                log::debug!("soft-delete window elapsed for {}, committing", id);
                if let Err(e) = this.optimistic_delete(snapshot).await {
                    log::warn!("auto-commit of soft-deleted {} failed: {}", id, e);
                }
            }
        });
        Ok(())
    }

    /// Commit a soft-deleted item before its window elapses.
    pub async fn commit_soft_delete(&self, id: &str) -> Result<(), EngineError> {
        match self.take_soft_deleted(id) {
            Some(snapshot) => self.optimistic_delete(snapshot).await,
            None => Err(EngineError::InvalidState {
                id: id.to_string(),
                expected: "soft-deleted",
            }),
        }
    }

    /// Bring a soft-deleted item back without any backend call.
    pub fn revert_soft_delete(&self, id: &str) -> Result<(), EngineError> {
        match self.take_soft_deleted(id) {
            Some(snapshot) => {
                self.active.restore(snapshot);
                Ok(())
            }
            None => Err(EngineError::InvalidState {
                id: id.to_string(),
                expected: "soft-deleted",
            }),
        }
    }

    /// True while the id has an in-flight backend operation or a live
    /// deletion record (soft-deleted, optimistic, or committed-with-undo).
    pub fn is_pending_or_deleted(&self, id: &str) -> bool {
        if self.pending.lock().contains(id) {
            return true;
        }
        matches!(
            self.deleted.lock().get(id).map(|r| r.state),
            Some(DeletionState::SoftDeleted)
                | Some(DeletionState::Optimistic)
                | Some(DeletionState::Committed)
        )
    }

    /// Current tracking record for an id, if any.
    pub fn deleted_record(&self, id: &str) -> Option<DeletedItemRecord> {
        self.deleted.lock().get(id).cloned()
    }

    /// Records whose undo offer is currently open.
    pub fn undoable(&self) -> Vec<DeletedItemRecord> {
        self.deleted
            .lock()
            .values()
            .filter(|r| r.state == DeletionState::Committed)
            .cloned()
            .collect()
    }

    fn claim_pending(&self, id: &str) -> Result<(), EngineError> {
        let mut pending = self.pending.lock();
        if pending.contains(id) {
            return Err(EngineError::Concurrency(id.to_string()));
        }
        pending.insert(id.to_string());
        Ok(())
    }

    fn release_pending(&self, id: &str) {
        self.pending.lock().remove(id);
    }

    /// Remove and return a soft-deleted record's snapshot. None when the
    /// record is absent or already moved on — the soft-delete timer relies
    /// on this to make expiry a no-op after commit/revert.
    fn take_soft_deleted(&self, id: &str) -> Option<Interaction> {
        let mut deleted = self.deleted.lock();
        match deleted.get(id) {
            Some(record) if record.state == DeletionState::SoftDeleted => {
                deleted.remove(id).map(|r| r.snapshot)
            }
            _ => None,
        }
    }

    /// Scheduled after a successful commit: once the undo window passes, the
    /// offer is withdrawn and the tracking record dropped. Undo checks the
    /// record's presence, so enforcement of the window lives here.
    fn spawn_undo_expiry(&self, id: String) {
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        let window = StdDuration::from_secs(this.config.undo_window_secs);
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut deleted = this.deleted.lock();
            if let Some(record) = deleted.get(&id) {
                if record.state == DeletionState::Committed {
                    deleted.remove(&id);
                    log::debug!("undo window for {} expired", id);
                }
            }
        });
    }
}
