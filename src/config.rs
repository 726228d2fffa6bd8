//! Engine configuration
//!
//! Serde-backed config records with per-field defaults so a partial JSON
//! config deserializes into a fully-populated struct.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::InteractionKind;

/// Weights and multipliers for priority scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringConfig {
    /// e-folding time of the recency factor, in days.
    #[serde(default = "default_decay_days")]
    pub decay_days: f64,
    /// Per-snooze multiplicative penalty: penalty = (1 - factor)^count.
    #[serde(default = "default_snooze_penalty_factor")]
    pub snooze_penalty_factor: f64,
    #[serde(default = "default_overdue_multiplier")]
    pub overdue_multiplier: f64,
    /// Applied when the reminder is due within one hour.
    #[serde(default = "default_due_within_hour_multiplier")]
    pub due_within_hour_multiplier: f64,
    /// Applied when due within the due-soon window but not within one hour.
    #[serde(default = "default_due_soon_multiplier")]
    pub due_soon_multiplier: f64,
    #[serde(default = "default_type_weights")]
    pub type_weights: HashMap<InteractionKind, f64>,
    #[serde(default = "default_tag_weights")]
    pub tag_weights: HashMap<String, f64>,
    /// Fallback weight for unknown interaction types or unmatched tags.
    #[serde(default = "default_weight")]
    pub default_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            decay_days: default_decay_days(),
            snooze_penalty_factor: default_snooze_penalty_factor(),
            overdue_multiplier: default_overdue_multiplier(),
            due_within_hour_multiplier: default_due_within_hour_multiplier(),
            due_soon_multiplier: default_due_soon_multiplier(),
            type_weights: default_type_weights(),
            tag_weights: default_tag_weights(),
            default_weight: default_weight(),
        }
    }
}

fn default_decay_days() -> f64 {
    7.0
}

fn default_snooze_penalty_factor() -> f64 {
    0.2
}

fn default_overdue_multiplier() -> f64 {
    2.0
}

fn default_due_within_hour_multiplier() -> f64 {
    1.5
}

fn default_due_soon_multiplier() -> f64 {
    1.2
}

fn default_weight() -> f64 {
    0.5
}

fn default_type_weights() -> HashMap<InteractionKind, f64> {
    HashMap::from([
        (InteractionKind::InPerson, 1.0),
        (InteractionKind::Phone, 0.9),
        (InteractionKind::Email, 0.8),
        (InteractionKind::Dm, 0.7),
        (InteractionKind::Text, 0.6),
    ])
}

fn default_tag_weights() -> HashMap<String, f64> {
    HashMap::from([
        ("urgent".to_string(), 1.0),
        ("interview".to_string(), 0.95),
        ("high_priority".to_string(), 0.9),
        ("offer".to_string(), 0.85),
        ("follow_up".to_string(), 0.7),
        ("networking".to_string(), 0.6),
    ])
}

/// Polling scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Seconds between re-evaluations of the reminder collection.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    300
}

/// Deletion manager windows. The soft-delete window runs before the backend
/// delete is issued; the undo window runs after it commits. They are separate
/// timers and must not be conflated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionConfig {
    /// Seconds the undo offer stays open after a committed delete.
    #[serde(default = "default_undo_window_secs")]
    pub undo_window_secs: u64,
    /// Seconds a soft-deleted item stays local-only before auto-committing.
    #[serde(default = "default_soft_delete_window_secs")]
    pub soft_delete_window_secs: u64,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            undo_window_secs: default_undo_window_secs(),
            soft_delete_window_secs: default_soft_delete_window_secs(),
        }
    }
}

fn default_undo_window_secs() -> u64 {
    10
}

fn default_soft_delete_window_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_defaults() {
        let config = ScoringConfig::default();
        assert_eq!(config.decay_days, 7.0);
        assert_eq!(config.overdue_multiplier, 2.0);
        assert_eq!(config.type_weights[&InteractionKind::InPerson], 1.0);
        assert_eq!(config.tag_weights["urgent"], 1.0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ScoringConfig = serde_json::from_str(r#"{"decayDays": 14.0}"#).unwrap();
        assert_eq!(config.decay_days, 14.0);
        assert_eq!(config.snooze_penalty_factor, 0.2);
        assert_eq!(config.default_weight, 0.5);
    }

    #[test]
    fn test_deletion_windows_distinct() {
        let config = DeletionConfig::default();
        assert_eq!(config.undo_window_secs, 10);
        assert_eq!(config.soft_delete_window_secs, 30);
    }
}
