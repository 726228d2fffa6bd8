//! End-to-end flow: SQLite collection → polling scheduler → notification
//! dedup → priority ranking → optimistic delete with undo.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};

use touchbase::db::TrackerDb;
use touchbase::{
    ActiveCollection, Clock, Contact, DeletionConfig, Interaction, InteractionKind, ManualClock,
    MemoryStore, NotificationDedup, NotificationKind, OptimisticMutationManager, PollingScheduler,
    PriorityScorer, ReminderSource, RemoteStore, ScoringConfig, StatusClassifier,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
}

fn contact() -> Contact {
    Contact {
        id: "c-1".to_string(),
        name: "Rowan Diaz".to_string(),
        company: Some("Northwind".to_string()),
        role: Some("Hiring manager".to_string()),
    }
}

fn reminder(id: &str, due: DateTime<Utc>, tags: &[&str]) -> Interaction {
    Interaction {
        id: id.to_string(),
        contact_id: "c-1".to_string(),
        kind: InteractionKind::Email,
        summary: "Follow up on the staff engineer role".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
        follow_up_required: true,
        follow_up_due: Some(due),
        is_done: false,
        snooze_count: 0,
        created_at: noon() - Duration::days(2),
    }
}

#[tokio::test(start_paused = true)]
async fn test_overdue_flows_from_poll_to_notification_to_undo() {
    init_logging();

    let db = Arc::new(TrackerDb::open_in_memory().unwrap());
    db.upsert_contact(&contact()).unwrap();
    db.upsert_interaction(&reminder(
        "int-late",
        noon() - Duration::hours(3),
        &["interview"],
    ))
    .unwrap();
    db.upsert_interaction(&reminder("int-next", noon() + Duration::days(5), &[]))
        .unwrap();

    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(noon()));
    let classifier = Arc::new(StatusClassifier::new(Arc::clone(&clock)));

    // Poll: the overdue reminder surfaces exactly once.
    let scheduler = PollingScheduler::new(
        Arc::clone(&db) as Arc<dyn ReminderSource>,
        Arc::clone(&classifier),
        Arc::clone(&clock),
    );
    let delta = scheduler.check().unwrap();
    assert_eq!(delta.newly_overdue, vec!["int-late".to_string()]);
    assert!(scheduler.check().unwrap().newly_overdue.is_empty());

    // Dedup: first notification shows, the repeat is suppressed.
    let dedup = NotificationDedup::new(Arc::clone(&clock));
    assert!(dedup.should_notify(NotificationKind::Overdue, "int-late"));
    assert!(!dedup.should_notify(NotificationKind::Overdue, "int-late"));

    // Ranking: the overdue interview reminder outranks the one due next week.
    let scorer = PriorityScorer::new(Arc::clone(&classifier), ScoringConfig::default());
    let contacts = HashMap::from([("c-1".to_string(), contact())]);
    let records = scorer.score_all(&db.interactions().unwrap(), &contacts);
    assert_eq!(records[0].interaction_id, "int-late");
    assert!(records[0].score > records[1].score);
    assert!(records.iter().all(|r| (0.0..=10.0).contains(&r.score)));

    // Delete with undo: visible set and backend both round-trip.
    let active = MemoryStore::new();
    for item in db.interactions().unwrap() {
        active.insert_interaction(item);
    }
    let manager = OptimisticMutationManager::new(
        Arc::clone(&active) as Arc<dyn ActiveCollection>,
        Arc::clone(&db) as Arc<dyn RemoteStore>,
        Arc::clone(&clock),
        DeletionConfig::default(),
    );

    let snapshot = active.get_interaction("int-late").unwrap();
    manager.optimistic_delete(snapshot).await.unwrap();
    assert!(!active.contains("int-late"));
    assert!(db.get_interaction("int-late").unwrap().is_none());
    assert!(manager.is_pending_or_deleted("int-late"));

    manager.undo("int-late").await.unwrap();
    assert!(active.contains("int-late"));
    assert!(db.get_interaction("int-late").unwrap().is_some());
    assert!(!manager.is_pending_or_deleted("int-late"));

    // The restored reminder is overdue again on the next poll cycle.
    let delta = scheduler.check().unwrap();
    assert!(delta.confirmed_overdue.contains("int-late"));
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_timer_drives_subscribers() {
    init_logging();

    let db = Arc::new(TrackerDb::open_in_memory().unwrap());
    db.upsert_contact(&contact()).unwrap();

    let clock = ManualClock::new(noon());
    let classifier = Arc::new(
        StatusClassifier::new(Arc::new(clock.clone())).with_ttl(Duration::zero()),
    );
    let scheduler = PollingScheduler::new(
        Arc::clone(&db) as Arc<dyn ReminderSource>,
        classifier,
        Arc::new(clock.clone()),
    );

    let seen = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&seen);
    scheduler.subscribe(Arc::new(move |delta| {
        sink.lock().extend(delta.newly_overdue.clone());
    }));

    scheduler.start(StdDuration::from_secs(300), Arc::new(|_| {}));
    tokio::time::sleep(StdDuration::from_millis(10)).await;
    assert!(seen.lock().is_empty(), "nothing overdue yet");

    // A reminder lands and goes overdue between ticks.
    db.upsert_interaction(&reminder("int-late", noon() + Duration::minutes(2), &[]))
        .unwrap();
    clock.advance(Duration::minutes(5));
    tokio::time::sleep(StdDuration::from_secs(300)).await;

    assert_eq!(*seen.lock(), vec!["int-late".to_string()]);
    scheduler.stop();
}
