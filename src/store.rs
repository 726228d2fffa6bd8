//! Storage seams
//!
//! The engine never owns persistence. It reads the reminder collection
//! through [`ReminderSource`], mutates the user-visible set through
//! [`ActiveCollection`], and talks to the (unreliable) backend through the
//! two named operations on [`RemoteStore`]. An in-memory implementation of
//! the first two lives here; `db.rs` provides a SQLite-backed source/remote.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::EngineError;
use crate::types::{Contact, Interaction};

/// Read access to the reminder/contact collection.
pub trait ReminderSource: Send + Sync {
    fn interactions(&self) -> Result<Vec<Interaction>, EngineError>;
    fn contact(&self, id: &str) -> Result<Option<Contact>, EngineError>;
}

/// The user-visible set of interactions. The deletion manager removes items
/// here optimistically and restores them on revert/undo.
pub trait ActiveCollection: Send + Sync {
    /// Remove and return the item, if present.
    fn remove(&self, id: &str) -> Option<Interaction>;
    /// Put an item back. Replaces any existing item with the same id.
    fn restore(&self, item: Interaction);
    fn contains(&self, id: &str) -> bool;
}

/// The external backend. Both operations are asynchronous and may fail
/// transiently.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn delete(&self, id: &str) -> Result<(), EngineError>;
    /// Recreate an item from a snapshot. Returns the (possibly new) id.
    async fn create(&self, snapshot: &Interaction) -> Result<String, EngineError>;
}

/// In-memory interaction/contact collection.
///
/// Backs the scheduler and deletion manager in tests and in deployments where
/// the collection is hydrated from an external service.
#[derive(Default)]
pub struct MemoryStore {
    interactions: Mutex<Vec<Interaction>>,
    contacts: Mutex<HashMap<String, Contact>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_interaction(&self, item: Interaction) {
        let mut guard = self.interactions.lock();
        guard.retain(|i| i.id != item.id);
        guard.push(item);
    }

    pub fn insert_contact(&self, contact: Contact) {
        self.contacts.lock().insert(contact.id.clone(), contact);
    }

    pub fn get_interaction(&self, id: &str) -> Option<Interaction> {
        self.interactions.lock().iter().find(|i| i.id == id).cloned()
    }

    /// Apply an in-place edit to one interaction. Returns false if absent.
    pub fn update_interaction(&self, id: &str, f: impl FnOnce(&mut Interaction)) -> bool {
        let mut guard = self.interactions.lock();
        match guard.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                f(item);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.interactions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.lock().is_empty()
    }
}

impl ReminderSource for MemoryStore {
    fn interactions(&self) -> Result<Vec<Interaction>, EngineError> {
        Ok(self.interactions.lock().clone())
    }

    fn contact(&self, id: &str) -> Result<Option<Contact>, EngineError> {
        Ok(self.contacts.lock().get(id).cloned())
    }
}

impl ActiveCollection for MemoryStore {
    fn remove(&self, id: &str) -> Option<Interaction> {
        let mut guard = self.interactions.lock();
        let pos = guard.iter().position(|i| i.id == id)?;
        Some(guard.remove(pos))
    }

    fn restore(&self, item: Interaction) {
        self.insert_interaction(item);
    }

    fn contains(&self, id: &str) -> bool {
        self.interactions.lock().iter().any(|i| i.id == id)
    }
}
