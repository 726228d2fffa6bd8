//! touchbase — reminder lifecycle engine for a personal contact and
//! job-search tracker.
//!
//! The interesting parts of a contact tracker are not the CRUD forms; they
//! are the time-driven machinery underneath. This crate owns that machinery:
//!
//! - [`status`] — pure time-based classification of reminders, memoized
//!   behind a short TTL cache
//! - [`priority`] — weighted 0–10 scoring combining recency, urgency,
//!   snooze history, and due-date pressure
//! - [`scheduler`] — periodic re-evaluation with overdue-transition
//!   detection
//! - [`dedup`] — TTL-windowed notification deduplication
//! - [`deletion`] — optimistic and soft deletion with undo against an
//!   unreliable backend
//!
//! Storage and clocks are injected (see [`store`] and [`clock`]), so every
//! component runs deterministically under test. A bundled SQLite layer
//! ([`db`]) serves as the default collection source.

pub mod clock;
pub mod config;
pub mod db;
pub mod dedup;
pub mod deletion;
pub mod error;
pub mod priority;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DeletionConfig, SchedulerConfig, ScoringConfig};
pub use dedup::{NotificationDedup, NotificationKind};
pub use deletion::OptimisticMutationManager;
pub use error::EngineError;
pub use priority::{
    apply_scenario_boost, group_by_priority, PriorityGroups, PriorityScorer, Scenario,
};
pub use scheduler::{PollingScheduler, TickCallback, TickDelta};
pub use status::{classify_at, StatusClassifier};
pub use store::{ActiveCollection, MemoryStore, ReminderSource, RemoteStore};
pub use types::{
    Contact, DeletedItemRecord, DeletionState, Interaction, InteractionKind, PriorityRecord,
    ReminderStatus, StatusKind,
};
