//! Notification deduplication
//!
//! Decides whether a detected transition should produce a user-visible
//! notification. Keys shown within the current TTL window are suppressed.
//! The shown-set is cleared in bulk at TTL granularity rather than per key,
//! so a key's suppression window lasts between TTL and 2×TTL depending on
//! where it landed relative to the sweep boundary. That coarseness is
//! intentional.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::clock::Clock;

/// Default suppression window for toast-style notifications.
pub const TOAST_TTL_SECS: i64 = 300;

/// Transition kinds that can notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Overdue,
    DueSoon,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Overdue => "overdue",
            NotificationKind::DueSoon => "due-soon",
        }
    }
}

struct DedupState {
    shown: HashSet<String>,
    last_sweep: DateTime<Utc>,
}

/// Owned, clock-injected dedup set.
pub struct NotificationDedup {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    state: Mutex<DedupState>,
}

impl NotificationDedup {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            clock,
            ttl: Duration::seconds(TOAST_TTL_SECS),
            state: Mutex::new(DedupState {
                shown: HashSet::new(),
                last_sweep: now,
            }),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns true exactly when the caller should show this notification;
    /// records the key so repeats within the window are suppressed.
    pub fn should_notify(&self, kind: NotificationKind, reminder_id: &str) -> bool {
        let key = format!("{}-{}", kind.as_str(), reminder_id);
        let now = self.clock.now();

        let mut state = self.state.lock();
        if now - state.last_sweep >= self.ttl {
            let dropped = state.shown.len();
            state.shown.clear();
            state.last_sweep = now;
            if dropped > 0 {
                log::debug!("notification dedup sweep dropped {} keys", dropped);
            }
        }

        if state.shown.contains(&key) {
            return false;
        }
        state.shown.insert(key);
        true
    }

    /// Force the bulk sweep regardless of the TTL boundary.
    pub fn sweep(&self) {
        let mut state = self.state.lock();
        state.shown.clear();
        state.last_sweep = self.clock.now();
    }

    /// Empty the set without moving the sweep boundary.
    pub fn clear(&self) {
        self.state.lock().shown.clear();
    }
}
