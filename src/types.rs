//! Core domain records for the reminder engine.
//!
//! An interaction is a logged touchpoint with a contact (email, call, coffee
//! chat). A *reminder* is an interaction with `follow_up_required = true` and
//! a non-null due date. Everything derived from these records — status,
//! priority, deletion lifecycle — lives in the sibling modules.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Interactions and contacts
// =============================================================================

/// How an interaction happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionKind {
    Email,
    Phone,
    Text,
    Dm,
    InPerson,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Email => "email",
            InteractionKind::Phone => "phone",
            InteractionKind::Text => "text",
            InteractionKind::Dm => "dm",
            InteractionKind::InPerson => "in-person",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(InteractionKind::Email),
            "phone" => Some(InteractionKind::Phone),
            "text" => Some(InteractionKind::Text),
            "dm" => Some(InteractionKind::Dm),
            "in-person" => Some(InteractionKind::InPerson),
            _ => None,
        }
    }
}

/// A logged touchpoint with a contact, optionally carrying a follow-up
/// reminder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    pub contact_id: String,
    pub kind: InteractionKind,
    pub summary: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub follow_up_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_due: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_done: bool,
    /// How many times the follow-up has been pushed forward. Feeds the
    /// snooze penalty in priority scoring.
    #[serde(default)]
    pub snooze_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Interaction {
    /// True when this interaction carries an actionable reminder.
    pub fn is_reminder(&self) -> bool {
        self.follow_up_required && self.follow_up_due.is_some()
    }

    /// Push the due date forward and record the snooze.
    ///
    /// No-op on interactions without a due date.
    pub fn snooze(&mut self, by: Duration) {
        if let Some(due) = self.follow_up_due {
            self.follow_up_due = Some(due + by);
            self.snooze_count += 1;
        }
    }
}

/// A contact referenced, not owned, by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

// =============================================================================
// Derived status
// =============================================================================

/// Time-based classification of a reminder. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusKind {
    Done,
    Overdue,
    DueToday,
    DueSoon,
    Upcoming,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Done => "done",
            StatusKind::Overdue => "overdue",
            StatusKind::DueToday => "due-today",
            StatusKind::DueSoon => "due-soon",
            StatusKind::Upcoming => "upcoming",
        }
    }
}

/// Full classification result for one interaction at one point in time.
///
/// `days_until_due` / `hours_until_due` are clamped to a minimum of 0 for
/// display; `None` means unbounded (no due date, or follow-up not required).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderStatus {
    pub kind: StatusKind,
    pub days_until_due: Option<i64>,
    pub hours_until_due: Option<i64>,
    pub is_overdue: bool,
    pub is_due_soon: bool,
    pub is_due_today: bool,
    pub is_due_within_1_hour: bool,
    pub is_active: bool,
}

// =============================================================================
// Priority
// =============================================================================

/// Factor breakdown behind a priority score. All factors live in [0, 1]
/// except the time multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityFactors {
    pub recency: f64,
    pub urgency: f64,
    pub snooze_penalty: f64,
    pub time_multiplier: f64,
}

/// A scored reminder, ready for ranking. `score` is in [0, 10].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityRecord {
    pub interaction_id: String,
    pub contact_id: String,
    pub score: f64,
    pub factors: PriorityFactors,
}

// =============================================================================
// Deletion lifecycle
// =============================================================================

/// Lifecycle stage of a deleted (or being-deleted) item.
///
/// Transitions are one-directional: soft-deleted → optimistic → committed,
/// with reverted as the failure/undo exit at each stage. Undo removes the
/// record entirely and restores the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionState {
    SoftDeleted,
    Optimistic,
    Committed,
    Reverted,
    Undone,
}

/// Tracking record for an item removed from the active collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedItemRecord {
    pub id: String,
    pub item_type: String,
    pub snapshot: Interaction,
    pub deleted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed_at: Option<DateTime<Utc>>,
    pub state: DeletionState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn interaction(due: Option<DateTime<Utc>>) -> Interaction {
        Interaction {
            id: "int-1".to_string(),
            contact_id: "c-1".to_string(),
            kind: InteractionKind::Email,
            summary: "Sent follow-up about the staff role".to_string(),
            tags: BTreeSet::new(),
            follow_up_required: true,
            follow_up_due: due,
            is_done: false,
            snooze_count: 0,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_is_reminder_requires_due_date() {
        let due = Utc.with_ymd_and_hms(2026, 3, 5, 9, 0, 0).unwrap();
        assert!(interaction(Some(due)).is_reminder());
        assert!(!interaction(None).is_reminder());

        let mut no_follow_up = interaction(Some(due));
        no_follow_up.follow_up_required = false;
        assert!(!no_follow_up.is_reminder());
    }

    #[test]
    fn test_snooze_moves_due_and_counts() {
        let due = Utc.with_ymd_and_hms(2026, 3, 5, 9, 0, 0).unwrap();
        let mut item = interaction(Some(due));

        item.snooze(Duration::days(2));
        assert_eq!(item.follow_up_due, Some(due + Duration::days(2)));
        assert_eq!(item.snooze_count, 1);

        item.snooze(Duration::days(1));
        assert_eq!(item.snooze_count, 2);
    }

    #[test]
    fn test_snooze_without_due_date_is_noop() {
        let mut item = interaction(None);
        item.snooze(Duration::days(2));
        assert_eq!(item.follow_up_due, None);
        assert_eq!(item.snooze_count, 0);
    }

    #[test]
    fn test_interaction_kind_round_trip() {
        for kind in [
            InteractionKind::Email,
            InteractionKind::Phone,
            InteractionKind::Text,
            InteractionKind::Dm,
            InteractionKind::InPerson,
        ] {
            assert_eq!(InteractionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(InteractionKind::parse("fax"), None);
    }

    #[test]
    fn test_interaction_serde_camel_case() {
        let due = Utc.with_ymd_and_hms(2026, 3, 5, 9, 0, 0).unwrap();
        let json = serde_json::to_value(interaction(Some(due))).unwrap();
        assert!(json.get("contactId").is_some());
        assert!(json.get("followUpDue").is_some());
        assert_eq!(json["kind"], "email");
    }
}
