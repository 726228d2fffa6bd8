//! Time-based reminder status classification
//!
//! `classify_at` is the pure rule engine; [`StatusClassifier`] wraps it with
//! a short-TTL memo cache keyed by `(id, due date, is_done)` so repeated
//! classification of an unchanged collection stays cheap. Callers must not
//! assume precision finer than the cache TTL.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::clock::Clock;
use crate::types::{Interaction, ReminderStatus, StatusKind};

/// How long a cached classification stays valid.
pub const STATUS_CACHE_TTL_SECS: i64 = 60;

/// Window ahead of `now` in which a reminder counts as due soon.
pub const DUE_SOON_WINDOW_HOURS: i64 = 24;

/// Classify one interaction against a reference time. Deterministic, no side
/// effects.
///
/// Rules, first match wins:
/// 1. done → `Done`, all flags false
/// 2. no due date, or follow-up not required → `Upcoming`, unbounded
/// 3. due at or before `now` → `Overdue`
/// 4. due within 24h → `DueSoon` (or `DueToday` when the due date falls on
///    the same UTC calendar day and is more than an hour out — imminence
///    outranks the calendar)
/// 5. otherwise → `Upcoming`
pub fn classify_at(interaction: &Interaction, now: DateTime<Utc>) -> ReminderStatus {
    if interaction.is_done {
        return ReminderStatus {
            kind: StatusKind::Done,
            days_until_due: Some(0),
            hours_until_due: Some(0),
            is_overdue: false,
            is_due_soon: false,
            is_due_today: false,
            is_due_within_1_hour: false,
            is_active: false,
        };
    }

    let due = match (interaction.follow_up_required, interaction.follow_up_due) {
        (true, Some(due)) => due,
        _ => {
            return ReminderStatus {
                kind: StatusKind::Upcoming,
                days_until_due: None,
                hours_until_due: None,
                is_overdue: false,
                is_due_soon: false,
                is_due_today: false,
                is_due_within_1_hour: false,
                is_active: true,
            }
        }
    };

    let gap = due - now;

    // Past or exactly now counts as overdue. Displayed days/hours clamp at 0.
    if gap <= Duration::zero() {
        return ReminderStatus {
            kind: StatusKind::Overdue,
            days_until_due: Some(0),
            hours_until_due: Some(0),
            is_overdue: true,
            is_due_soon: false,
            is_due_today: false,
            is_due_within_1_hour: false,
            is_active: true,
        };
    }

    let days = gap.num_days().max(0);
    let hours = gap.num_hours().max(0);

    if gap <= Duration::hours(DUE_SOON_WINDOW_HOURS) {
        let due_today = due.date_naive() == now.date_naive();
        let within_hour = gap <= Duration::hours(1);
        let kind = if due_today && !within_hour {
            StatusKind::DueToday
        } else {
            StatusKind::DueSoon
        };
        return ReminderStatus {
            kind,
            days_until_due: Some(days),
            hours_until_due: Some(hours),
            is_overdue: false,
            is_due_soon: true,
            is_due_today: due_today,
            is_due_within_1_hour: within_hour,
            is_active: true,
        };
    }

    ReminderStatus {
        kind: StatusKind::Upcoming,
        days_until_due: Some(days),
        hours_until_due: Some(hours),
        is_overdue: false,
        is_due_soon: false,
        is_due_today: false,
        is_due_within_1_hour: false,
        is_active: true,
    }
}

type CacheKey = (String, Option<DateTime<Utc>>, bool);

struct CacheEntry {
    status: ReminderStatus,
    computed_at: DateTime<Utc>,
}

/// Memoizing classifier with an injectable clock.
///
/// Cache entries are keyed by `(id, due date, is_done)`, so any edit to the
/// inputs produces a fresh key and an immediate recompute; unchanged entries
/// are reused for [`STATUS_CACHE_TTL_SECS`].
pub struct StatusClassifier {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cache: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl StatusClassifier {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            ttl: Duration::seconds(STATUS_CACHE_TTL_SECS),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Override the cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The clock this classifier (and anything scoring through it) runs on.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Classify against the injected clock, reusing a cached result when the
    /// entry is younger than the TTL.
    pub fn classify(&self, interaction: &Interaction) -> ReminderStatus {
        let now = self.clock.now();
        let key = (
            interaction.id.clone(),
            interaction.follow_up_due,
            interaction.is_done,
        );

        let mut cache = self.cache.lock();
        if let Some(entry) = cache.get(&key) {
            if now - entry.computed_at < self.ttl {
                return entry.status;
            }
        }

        let status = classify_at(interaction, now);
        cache.insert(
            key,
            CacheEntry {
                status,
                computed_at: now,
            },
        );
        status
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// Drop entries older than the TTL. Returns how many were evicted.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut cache = self.cache.lock();
        let before = cache.len();
        cache.retain(|_, entry| now - entry.computed_at < self.ttl);
        let evicted = before - cache.len();
        if evicted > 0 {
            log::debug!("status cache sweep evicted {} stale entries", evicted);
        }
        evicted
    }

    #[cfg(test)]
    fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::clock::ManualClock;
    use crate::types::InteractionKind;

    fn reminder(due: Option<DateTime<Utc>>) -> Interaction {
        Interaction {
            id: "int-1".to_string(),
            contact_id: "c-1".to_string(),
            kind: InteractionKind::Email,
            summary: "Follow up on application".to_string(),
            tags: Default::default(),
            follow_up_required: true,
            follow_up_due: due,
            is_done: false,
            snooze_count: 0,
            created_at: Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap(),
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_done_wins_regardless_of_due_date() {
        let mut item = reminder(Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()));
        item.is_done = true;

        let status = classify_at(&item, noon());
        assert_eq!(status.kind, StatusKind::Done);
        assert!(!status.is_overdue);
        assert!(!status.is_active);
        assert_eq!(status.days_until_due, Some(0));
    }

    #[test]
    fn test_past_due_is_overdue_with_clamped_days() {
        let item = reminder(Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()));

        let status = classify_at(&item, noon());
        assert_eq!(status.kind, StatusKind::Overdue);
        assert!(status.is_overdue);
        assert_eq!(status.days_until_due, Some(0), "clamped, never negative");
        assert_eq!(status.hours_until_due, Some(0));
    }

    #[test]
    fn test_due_exactly_now_is_overdue() {
        let item = reminder(Some(noon()));
        let status = classify_at(&item, noon());
        assert_eq!(status.kind, StatusKind::Overdue);
    }

    #[test]
    fn test_due_in_30_minutes_is_due_soon_within_hour() {
        let item = reminder(Some(noon() + Duration::minutes(30)));

        let status = classify_at(&item, noon());
        assert_eq!(status.kind, StatusKind::DueSoon);
        assert!(status.is_due_soon);
        assert!(status.is_due_within_1_hour);
        assert!(status.is_due_today);
    }

    #[test]
    fn test_due_later_today_is_due_today() {
        let item = reminder(Some(noon() + Duration::hours(5)));

        let status = classify_at(&item, noon());
        assert_eq!(status.kind, StatusKind::DueToday);
        assert!(status.is_due_soon);
        assert!(status.is_due_today);
        assert!(!status.is_due_within_1_hour);
    }

    #[test]
    fn test_due_tomorrow_morning_is_due_soon_not_today() {
        // Within 24h but past midnight UTC.
        let item = reminder(Some(noon() + Duration::hours(20)));

        let status = classify_at(&item, noon());
        assert_eq!(status.kind, StatusKind::DueSoon);
        assert!(!status.is_due_today);
        assert_eq!(status.hours_until_due, Some(20));
    }

    #[test]
    fn test_far_future_is_upcoming() {
        let item = reminder(Some(noon() + Duration::days(6)));

        let status = classify_at(&item, noon());
        assert_eq!(status.kind, StatusKind::Upcoming);
        assert!(!status.is_due_soon);
        assert_eq!(status.days_until_due, Some(6));
    }

    #[test]
    fn test_missing_due_date_is_unbounded_upcoming() {
        let status = classify_at(&reminder(None), noon());
        assert_eq!(status.kind, StatusKind::Upcoming);
        assert_eq!(status.days_until_due, None);
        assert_eq!(status.hours_until_due, None);
    }

    #[test]
    fn test_follow_up_not_required_is_upcoming() {
        let mut item = reminder(Some(noon() - Duration::days(3)));
        item.follow_up_required = false;

        let status = classify_at(&item, noon());
        assert_eq!(status.kind, StatusKind::Upcoming);
        assert_eq!(status.days_until_due, None);
    }

    #[test]
    fn test_cache_reuses_within_ttl() {
        let clock = ManualClock::new(noon());
        let classifier = StatusClassifier::new(Arc::new(clock.clone()));
        let item = reminder(Some(noon() + Duration::minutes(45)));

        let first = classifier.classify(&item);
        assert!(first.is_due_within_1_hour);

        // 50 minutes later the reminder is actually overdue, but the cached
        // entry is only stale after the TTL... which has long passed here.
        clock.advance(Duration::minutes(50));
        let second = classifier.classify(&item);
        assert_eq!(second.kind, StatusKind::Overdue);

        // Within the TTL the cached value is served as-is.
        let clock2 = ManualClock::new(noon());
        let classifier2 = StatusClassifier::new(Arc::new(clock2.clone()));
        let near = reminder(Some(noon() + Duration::seconds(30)));
        let before = classifier2.classify(&near);
        clock2.advance(Duration::seconds(45));
        let after = classifier2.classify(&near);
        assert_eq!(before, after, "entry younger than TTL is reused");
    }

    #[test]
    fn test_cache_key_change_recomputes_immediately() {
        let clock = ManualClock::new(noon());
        let classifier = StatusClassifier::new(Arc::new(clock));
        let mut item = reminder(Some(noon() + Duration::minutes(30)));

        assert_eq!(classifier.classify(&item).kind, StatusKind::DueSoon);

        item.is_done = true;
        assert_eq!(classifier.classify(&item).kind, StatusKind::Done);
    }

    #[test]
    fn test_sweep_evicts_stale_entries() {
        let clock = ManualClock::new(noon());
        let classifier = StatusClassifier::new(Arc::new(clock.clone()));
        classifier.classify(&reminder(Some(noon() + Duration::hours(2))));
        assert_eq!(classifier.cached_len(), 1);

        clock.advance(Duration::seconds(STATUS_CACHE_TTL_SECS + 1));
        assert_eq!(classifier.sweep(), 1);
        assert_eq!(classifier.cached_len(), 0);
    }
}
