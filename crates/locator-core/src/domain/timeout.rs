//! # Coalesced Timeout Scheduler
//!
//! One shared list of `(token, deadline)` records scanned once per host tick,
//! instead of one timer per pending wait.
//!
//! - `register` is O(1) (slab insert), disposal is O(1) (slab remove).
//! - `tick` is O(active records): cancelled records are dropped, expired
//!   records are cancelled and dropped.
//! - Slab slots are reused, which bounds allocation under churn. Each record
//!   carries a sequence number so a stale registration never removes the
//!   record that took over its slot.
//! - After `shutdown` the scheduler stops scanning and ignores new work.
//!
//! The tick is driven from outside: a host with its own update loop calls
//! [`TimeoutScheduler::tick`]; anything else can use [`spawn_ticker`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use slab::Slab;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

struct TimeoutRecord {
    seq: u64,
    token: CancellationToken,
    deadline: Instant,
    expired: Arc<AtomicBool>,
}

/// Result of one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Records whose deadline passed and were cancelled.
    pub expired: usize,
    /// Records dropped because their token was already cancelled.
    pub dropped: usize,
    /// Records still pending after the scan.
    pub active: usize,
}

/// Process-wide timeout list.
#[derive(Default)]
pub struct TimeoutScheduler {
    records: Mutex<Slab<TimeoutRecord>>,
    next_seq: AtomicU64,
    shut_down: AtomicBool,
}

impl TimeoutScheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Cancel `token` once `duration` has elapsed, unless the returned
    /// registration is disposed first.
    pub fn register(self: &Arc<Self>, token: CancellationToken, duration: Duration) -> TimeoutRegistration {
        let expired = Arc::new(AtomicBool::new(false));

        if self.is_shut_down() {
            debug!(?duration, "Timeout scheduler shut down, registration inert");
            return TimeoutRegistration {
                scheduler: Weak::new(),
                slot: usize::MAX,
                seq: 0,
                duration,
                expired,
                disposed: true,
            };
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let slot = self.records.lock().insert(TimeoutRecord {
            seq,
            token,
            deadline: Instant::now() + duration,
            expired: Arc::clone(&expired),
        });
        trace!(slot, ?duration, "Timeout registered");

        TimeoutRegistration {
            scheduler: Arc::downgrade(self),
            slot,
            seq,
            duration,
            expired,
            disposed: false,
        }
    }

    /// Scan once: drop cancelled records, cancel expired ones.
    pub fn tick(&self) -> TickSummary {
        if self.is_shut_down() {
            return TickSummary::default();
        }

        let now = Instant::now();
        let mut summary = TickSummary::default();
        let mut to_cancel = Vec::new();

        {
            let mut records = self.records.lock();
            records.retain(|_, record| {
                if record.token.is_cancelled() {
                    summary.dropped += 1;
                    return false;
                }
                if now >= record.deadline {
                    record.expired.store(true, Ordering::Release);
                    to_cancel.push(record.token.clone());
                    summary.expired += 1;
                    return false;
                }
                true
            });
            summary.active = records.len();
        }

        // Cancel outside the lock; woken waiters dispose their own
        // registrations.
        for token in to_cancel {
            token.cancel();
        }

        if summary.expired > 0 {
            debug!(
                expired = summary.expired,
                active = summary.active,
                "Timeouts expired"
            );
        }
        summary
    }

    fn dispose(&self, slot: usize, seq: u64) {
        let mut records = self.records.lock();
        // The tick may already have removed the record, and the slot may
        // since have been reused.
        let owned = records.get(slot).is_some_and(|record| record.seq == seq);
        if owned {
            records.remove(slot);
        }
    }

    /// Number of pending records.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.records.lock().len()
    }

    /// Stop scanning and drop every pending record without cancelling it.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let dropped = {
            let mut records = self.records.lock();
            let count = records.len();
            records.clear();
            count
        };
        debug!(dropped, "Timeout scheduler shut down");
    }

    /// Whether `shutdown` has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for TimeoutScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutScheduler")
            .field("active", &self.active_count())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Handle to one scheduled timeout. Disposes itself on drop.
#[derive(Debug)]
pub struct TimeoutRegistration {
    scheduler: Weak<TimeoutScheduler>,
    slot: usize,
    seq: u64,
    duration: Duration,
    expired: Arc<AtomicBool>,
    disposed: bool,
}

impl TimeoutRegistration {
    /// Configured duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whether the scheduler cancelled the token because the deadline
    /// passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expired.load(Ordering::Acquire)
    }

    /// Remove the record early. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.dispose(self.slot, self.seq);
        }
    }
}

impl Drop for TimeoutRegistration {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Drive `scheduler` from a tokio interval until `stop` is cancelled or the
/// scheduler shuts down.
pub fn spawn_ticker(
    scheduler: Arc<TimeoutScheduler>,
    period: Duration,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(?period, "Timeout ticker started");

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = interval.tick() => {
                    if scheduler.is_shut_down() {
                        break;
                    }
                    scheduler.tick();
                }
            }
        }
        debug!("Timeout ticker stopped");
    })
}

/// Single deferred step: lets other ready tasks (sibling providers still
/// registering) run once before the caller continues. Not a timed wait.
pub async fn next_step() {
    tokio::task::yield_now().await;
}
