//! Polling scheduler for reminder state transitions
//!
//! Re-evaluates the full reminder collection on a fixed interval, diffs the
//! overdue set against the previous tick, and hands the delta to the tick
//! callback and any newly-overdue subscribers. A tick never propagates an
//! error past the scheduler boundary; failures are logged and the timer
//! keeps running.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::error::EngineError;
use crate::status::StatusClassifier;
use crate::store::ReminderSource;

/// Default re-check interval (5 minutes).
pub const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_secs(300);

/// What changed on one tick.
#[derive(Debug, Clone)]
pub struct TickDelta {
    /// Ids that became overdue since the previous tick, in collection order.
    pub newly_overdue: Vec<String>,
    pub confirmed_overdue: BTreeSet<String>,
    pub due_soon: BTreeSet<String>,
    pub due_today: BTreeSet<String>,
    pub checked_at: DateTime<Utc>,
}

/// Callback invoked with each tick's delta.
///
/// Callbacks run on the scheduler's tick path and must not call
/// [`PollingScheduler::stop`] or [`PollingScheduler::set_interval`];
/// accumulator operations (`mark_as_checked`, `clear_recently_overdue`)
/// are safe.
pub type TickCallback = Arc<dyn Fn(&TickDelta) + Send + Sync>;

#[derive(Default)]
struct SchedulerState {
    confirmed_overdue: BTreeSet<String>,
    /// Ids that became overdue and have not been acknowledged. Insertion
    /// order, no duplicates.
    recently_overdue: Vec<String>,
    due_soon: BTreeSet<String>,
    due_today: BTreeSet<String>,
    last_checked: Option<DateTime<Utc>>,
}

struct Running {
    interval: StdDuration,
    callback: TickCallback,
    handle: JoinHandle<()>,
}

/// Periodic re-evaluation of all reminders with overdue-transition detection.
pub struct PollingScheduler {
    source: Arc<dyn ReminderSource>,
    classifier: Arc<StatusClassifier>,
    clock: Arc<dyn Clock>,
    state: Mutex<SchedulerState>,
    subscribers: Mutex<Vec<TickCallback>>,
    running: Mutex<Option<Running>>,
    /// Bumped on every start/stop; a scheduled tick whose epoch no longer
    /// matches is a leftover from a cancelled timer and must not fire.
    epoch: AtomicU64,
    /// Serializes tick execution so stop() can drain an in-flight tick.
    tick_gate: Mutex<()>,
    /// Self-handle for the timer task.
    weak: Weak<Self>,
}

impl PollingScheduler {
    pub fn new(
        source: Arc<dyn ReminderSource>,
        classifier: Arc<StatusClassifier>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            source,
            classifier,
            clock,
            state: Mutex::new(SchedulerState::default()),
            subscribers: Mutex::new(Vec::new()),
            running: Mutex::new(None),
            epoch: AtomicU64::new(0),
            tick_gate: Mutex::new(()),
            weak: weak.clone(),
        })
    }

    /// Start polling. No-op when already running. Performs one immediate
    /// check, then re-checks every `interval` until stopped.
    pub fn start(&self, interval: StdDuration, on_tick: TickCallback) {
        let mut running = self.running.lock();
        if running.is_some() {
            log::debug!("scheduler already running, start ignored");
            return;
        }
        let Some(this) = self.weak.upgrade() else {
            return;
        };

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let callback = Arc::clone(&on_tick);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately — that is the immediate check.
                ticker.tick().await;
                this.run_tick(epoch, &callback);
            }
        });

        log::info!("scheduler started, interval {:?}", interval);
        *running = Some(Running {
            interval,
            callback: on_tick,
            handle,
        });
    }

    /// Cancel the timer. After this returns, no further tick callback fires,
    /// including one that was already scheduled.
    pub fn stop(&self) {
        let run = {
            let mut running = self.running.lock();
            match running.take() {
                Some(run) => run,
                None => return,
            }
        };
        self.epoch.fetch_add(1, Ordering::SeqCst);
        run.handle.abort();
        // Drain any tick that is mid-flight.
        drop(self.tick_gate.lock());
        log::info!("scheduler stopped");
    }

    /// Change the polling interval. If running, stop-then-restart with the
    /// same callback; otherwise a no-op.
    pub fn set_interval(&self, interval: StdDuration) {
        let callback = {
            let running = self.running.lock();
            match running.as_ref() {
                Some(run) => Arc::clone(&run.callback),
                None => return,
            }
        };
        self.stop();
        self.start(interval, callback);
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// The interval currently in effect, if running.
    pub fn interval(&self) -> Option<StdDuration> {
        self.running.lock().as_ref().map(|r| r.interval)
    }

    /// Register a callback invoked whenever a tick detects newly-overdue
    /// reminders.
    pub fn subscribe(&self, on_newly_overdue: TickCallback) {
        self.subscribers.lock().push(on_newly_overdue);
    }

    /// Re-evaluate the collection now, outside the timer. Updates state and
    /// notifies the registered callback/subscribers like a timer tick.
    pub fn check(&self) -> Result<TickDelta, EngineError> {
        let _gate = self.tick_gate.lock();
        let delta = self.check_inner()?;
        self.notify(&delta);
        Ok(delta)
    }

    /// Acknowledge one id: removed from the recently-overdue accumulator
    /// only. It stays in the confirmed set; if it later un-overdues and
    /// re-overdues, the set diff re-arms it and it re-enters the
    /// accumulator.
    pub fn mark_as_checked(&self, id: &str) {
        self.state.lock().recently_overdue.retain(|x| x != id);
    }

    /// Empty the accumulator without touching the confirmed set.
    pub fn clear_recently_overdue(&self) {
        self.state.lock().recently_overdue.clear();
    }

    pub fn recently_overdue(&self) -> Vec<String> {
        self.state.lock().recently_overdue.clone()
    }

    pub fn confirmed_overdue(&self) -> BTreeSet<String> {
        self.state.lock().confirmed_overdue.clone()
    }

    pub fn due_soon(&self) -> BTreeSet<String> {
        self.state.lock().due_soon.clone()
    }

    pub fn due_today(&self) -> BTreeSet<String> {
        self.state.lock().due_today.clone()
    }

    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_checked
    }

    /// Timer-path tick: epoch-guarded so a cancelled timer's leftover tick
    /// cannot fire after stop().
    fn run_tick(&self, epoch: u64, callback: &TickCallback) {
        let _gate = self.tick_gate.lock();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        match self.check_inner() {
            Ok(delta) => {
                callback(&delta);
                self.notify_subscribers(&delta);
            }
            Err(e) => {
                // The timer must survive a failed tick.
                log::warn!("scheduler tick failed: {}", e);
            }
        }
    }

    fn notify(&self, delta: &TickDelta) {
        let callback = self
            .running
            .lock()
            .as_ref()
            .map(|r| Arc::clone(&r.callback));
        if let Some(callback) = callback {
            callback(delta);
        }
        self.notify_subscribers(delta);
    }

    fn notify_subscribers(&self, delta: &TickDelta) {
        if delta.newly_overdue.is_empty() {
            return;
        }
        let subscribers: Vec<TickCallback> = self.subscribers.lock().clone();
        for subscriber in subscribers {
            subscriber(delta);
        }
    }

    /// Recompute the overdue/due-soon/due-today sets and diff against the
    /// previous confirmed set. The state mutation is atomic under the state
    /// lock: a concurrent reader sees either the old or the new sets, never
    /// a mix.
    fn check_inner(&self) -> Result<TickDelta, EngineError> {
        let interactions = self.source.interactions()?;
        let now = self.clock.now();

        let mut confirmed = BTreeSet::new();
        let mut due_soon = BTreeSet::new();
        let mut due_today = BTreeSet::new();
        let mut overdue_in_order = Vec::new();

        for interaction in &interactions {
            if !interaction.is_reminder() || interaction.is_done {
                continue;
            }
            let status = self.classifier.classify(interaction);
            if status.is_overdue {
                confirmed.insert(interaction.id.clone());
                overdue_in_order.push(interaction.id.clone());
            }
            if status.is_due_soon {
                due_soon.insert(interaction.id.clone());
            }
            if status.is_due_today {
                due_today.insert(interaction.id.clone());
            }
        }

        let mut state = self.state.lock();
        let newly_overdue: Vec<String> = overdue_in_order
            .into_iter()
            .filter(|id| !state.confirmed_overdue.contains(id))
            .collect();

        for id in &newly_overdue {
            if !state.recently_overdue.contains(id) {
                state.recently_overdue.push(id.clone());
            }
        }
        state.confirmed_overdue = confirmed.clone();
        state.due_soon = due_soon.clone();
        state.due_today = due_today.clone();
        state.last_checked = Some(now);

        if !newly_overdue.is_empty() {
            log::info!("{} reminder(s) became overdue", newly_overdue.len());
        }

        Ok(TickDelta {
            newly_overdue,
            confirmed_overdue: confirmed,
            due_soon,
            due_today,
            checked_at: now,
        })
    }
}
