//! Weighted priority scoring
//!
//! Combines recency, urgency, snooze history, and due-date pressure into a
//! 0–10 score per reminder. The formula:
//!
//! ```text
//! final = clamp01(((recency + urgency + snooze_penalty) / 3) * time_multiplier) * 10
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ScoringConfig;
use crate::status::StatusClassifier;
use crate::types::{Contact, Interaction, PriorityFactors, PriorityRecord, ReminderStatus};

/// Scores at or above this are "high" priority.
pub const HIGH_PRIORITY_THRESHOLD: f64 = 7.0;
/// Scores at or above this (and below high) are "medium" priority.
pub const MEDIUM_PRIORITY_THRESHOLD: f64 = 4.0;

/// Recency factor floor/ceiling.
const RECENCY_FLOOR: f64 = 0.1;
/// Recency when the contact has no prior interaction on record.
const RECENCY_NO_HISTORY: f64 = 0.5;
/// Snooze penalty never drops below this.
const SNOOZE_PENALTY_FLOOR: f64 = 0.1;

/// Named scenario boosts applied on top of the base score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Interview,
    Application,
    Networking,
    Urgent,
}

impl Scenario {
    pub fn multiplier(&self) -> f64 {
        match self {
            Scenario::Interview => 1.5,
            Scenario::Application => 1.3,
            Scenario::Networking => 1.2,
            Scenario::Urgent => 2.0,
        }
    }
}

/// Disjoint high/medium/low partition of a scored collection.
#[derive(Debug, Clone, Default)]
pub struct PriorityGroups {
    pub high: Vec<PriorityRecord>,
    pub medium: Vec<PriorityRecord>,
    pub low: Vec<PriorityRecord>,
}

impl PriorityGroups {
    pub fn total(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }
}

/// Priority scorer over a classifier and a weight table.
pub struct PriorityScorer {
    classifier: Arc<StatusClassifier>,
    config: ScoringConfig,
}

impl PriorityScorer {
    pub fn new(classifier: Arc<StatusClassifier>, config: ScoringConfig) -> Self {
        Self { classifier, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one reminder. `history` is the full interaction list for the
    /// contact; entries other than the reminder itself drive the recency
    /// factor.
    pub fn score(
        &self,
        interaction: &Interaction,
        contact: &Contact,
        history: &[Interaction],
    ) -> PriorityRecord {
        let status = self.classifier.classify(interaction);
        self.score_with_status(interaction, contact, history, &status)
    }

    fn score_with_status(
        &self,
        interaction: &Interaction,
        contact: &Contact,
        history: &[Interaction],
        status: &ReminderStatus,
    ) -> PriorityRecord {
        let recency = self.recency_factor(interaction, contact, history);
        let urgency = self.urgency_factor(interaction);
        let snooze_penalty = self.snooze_penalty(interaction.snooze_count);
        let time_multiplier = self.time_multiplier(status);

        let base = (recency + urgency + snooze_penalty) / 3.0;
        let score = (base * time_multiplier).clamp(0.0, 1.0) * 10.0;

        PriorityRecord {
            interaction_id: interaction.id.clone(),
            contact_id: contact.id.clone(),
            score,
            factors: PriorityFactors {
                recency,
                urgency,
                snooze_penalty,
                time_multiplier,
            },
        }
    }

    /// Score every reminder in the collection, descending by score.
    ///
    /// Per-item failures are isolated: a reminder whose contact is missing is
    /// logged and skipped, never aborting the batch. Ties keep insertion
    /// order (stable sort).
    pub fn score_all(
        &self,
        interactions: &[Interaction],
        contacts: &HashMap<String, Contact>,
    ) -> Vec<PriorityRecord> {
        let mut records = Vec::new();

        for interaction in interactions {
            if !interaction.is_reminder() || interaction.is_done {
                continue;
            }
            let Some(contact) = contacts.get(&interaction.contact_id) else {
                log::warn!(
                    "skipping reminder {}: contact {} not found",
                    interaction.id,
                    interaction.contact_id
                );
                continue;
            };
            let history: Vec<Interaction> = interactions
                .iter()
                .filter(|i| i.contact_id == contact.id)
                .cloned()
                .collect();
            records.push(self.score(interaction, contact, &history));
        }

        records.sort_by(|a, b| b.score.total_cmp(&a.score));
        records
    }

    /// Days-since-last-touch decay. Falls back to a neutral 0.5 when the
    /// contact has no prior interaction.
    fn recency_factor(
        &self,
        interaction: &Interaction,
        contact: &Contact,
        history: &[Interaction],
    ) -> f64 {
        let latest = history
            .iter()
            .filter(|i| i.contact_id == contact.id && i.id != interaction.id)
            .map(|i| i.created_at)
            .max();

        let Some(latest) = latest else {
            return RECENCY_NO_HISTORY;
        };

        let now = self.classifier.clock().now();
        let days = (now - latest).num_seconds().max(0) as f64 / 86_400.0;
        (-days / self.config.decay_days)
            .exp()
            .clamp(RECENCY_FLOOR, 1.0)
    }

    /// Average of the interaction-type weight and the strongest matching tag
    /// weight. Malformed tags (blank after trimming) degrade to the default
    /// weight rather than failing the computation.
    fn urgency_factor(&self, interaction: &Interaction) -> f64 {
        let type_weight = self
            .config
            .type_weights
            .get(&interaction.kind)
            .copied()
            .unwrap_or(self.config.default_weight);

        let tag_weight = interaction
            .tags
            .iter()
            .filter_map(|tag| {
                let trimmed = tag.trim();
                if trimmed.is_empty() {
                    log::debug!(
                        "interaction {}: ignoring malformed tag {:?}",
                        interaction.id,
                        tag
                    );
                    return None;
                }
                self.config.tag_weights.get(&trimmed.to_lowercase()).copied()
            })
            .fold(None::<f64>, |best, w| Some(best.map_or(w, |b| b.max(w))))
            .unwrap_or(self.config.default_weight);

        (type_weight + tag_weight) / 2.0
    }

    fn snooze_penalty(&self, snooze_count: u32) -> f64 {
        let penalty = (1.0 - self.config.snooze_penalty_factor).powi(snooze_count as i32);
        penalty.max(SNOOZE_PENALTY_FLOOR)
    }

    fn time_multiplier(&self, status: &ReminderStatus) -> f64 {
        if status.is_overdue {
            self.config.overdue_multiplier
        } else if status.is_due_within_1_hour {
            self.config.due_within_hour_multiplier
        } else if status.is_due_soon {
            self.config.due_soon_multiplier
        } else {
            1.0
        }
    }
}

/// Partition scored records into disjoint high/medium/low groups, preserving
/// order within each group.
pub fn group_by_priority(records: Vec<PriorityRecord>) -> PriorityGroups {
    let mut groups = PriorityGroups::default();
    for record in records {
        if record.score >= HIGH_PRIORITY_THRESHOLD {
            groups.high.push(record);
        } else if record.score >= MEDIUM_PRIORITY_THRESHOLD {
            groups.medium.push(record);
        } else {
            groups.low.push(record);
        }
    }
    groups
}

/// Multiply the final score and the urgency factor by the scenario
/// multiplier, re-clamping each to its range.
pub fn apply_scenario_boost(record: &mut PriorityRecord, scenario: Scenario) {
    let m = scenario.multiplier();
    record.score = (record.score * m).clamp(0.0, 10.0);
    record.factors.urgency = (record.factors.urgency * m).clamp(0.0, 1.0);
}
