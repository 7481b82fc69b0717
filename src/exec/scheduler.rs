use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{error, info, warn};

use crate::exec::runner::TaskSetRunner;
use crate::model::RepeatSchedule;
use crate::store::Store;

/// How often due task sets are looked for.
pub const TICK_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Next run time as pure duration arithmetic from `now`, never from the
/// previous `next_run_at`, so a missed window doesn't cause catch-up bursts.
pub fn next_run(repeat: RepeatSchedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match repeat {
        RepeatSchedule::None => None,
        RepeatSchedule::Hourly => Some(now + ChronoDuration::hours(1)),
        RepeatSchedule::Daily => Some(now + ChronoDuration::hours(24)),
        RepeatSchedule::Weekly => Some(now + ChronoDuration::days(7)),
    }
}

// ── Run locks ────────────────────────────────────────────────────────

/// In-process per-task-set locks. A set already running is skipped by the
/// next tick, not queued behind itself.
#[derive(Clone, Default)]
pub struct RunLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl RunLocks {
    pub fn new() -> RunLocks {
        RunLocks::default()
    }

    /// `None` when the set is already running.
    pub fn try_acquire(&self, task_set_id: &str) -> Option<RunGuard> {
        let mut held = match self.held.lock() {
            Ok(h) => h,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !held.insert(task_set_id.to_string()) {
            return None;
        }
        Some(RunGuard {
            held: Arc::clone(&self.held),
            task_set_id: task_set_id.to_string(),
        })
    }
}

/// Releases the lock on drop, so panics and early returns both unlock.
pub struct RunGuard {
    held: Arc<Mutex<HashSet<String>>>,
    task_set_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut held = match self.held.lock() {
            Ok(h) => h,
            Err(poisoned) => poisoned.into_inner(),
        };
        held.remove(&self.task_set_id);
    }
}

// ── Scheduler ────────────────────────────────────────────────────────

pub struct Scheduler {
    pub store: Arc<Store>,
    pub runner: Arc<TaskSetRunner>,
    pub locks: RunLocks,
    pub interval: Duration,
}

impl Scheduler {
    pub fn new(store: Arc<Store>, runner: Arc<TaskSetRunner>) -> Scheduler {
        Scheduler {
            store,
            runner,
            locks: RunLocks::new(),
            interval: TICK_INTERVAL,
        }
    }

    /// One pass over the due task sets. Returns how many were started; a
    /// failed run is logged and the pass continues.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = self.store.due_task_sets(now).await?;
        let mut started = 0;
        for set in due {
            let Some(_guard) = self.locks.try_acquire(&set.id) else {
                warn!(set = %set.name, "still running from an earlier tick; skipped");
                continue;
            };
            started += 1;
            info!(set = %set.name, "scheduled run starting");
            if let Err(e) = self.runner.run(&set).await {
                error!(set = %set.name, error = %e, "scheduled run failed");
            }
        }
        Ok(started)
    }

    /// Manual run of one task set, through the same locks as the ticker.
    pub async fn run_now(&self, task_set_id: &str) -> Result<Vec<crate::model::TaskResult>> {
        let Some(set) = self.store.task_set(task_set_id).await? else {
            anyhow::bail!("no task set with id {task_set_id}");
        };
        let Some(_guard) = self.locks.try_acquire(&set.id) else {
            anyhow::bail!("task set `{}` is already running", set.name);
        };
        self.runner.run(&set).await
    }

    pub async fn run_forever(&self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.tick(Utc::now()).await {
                Ok(0) => {}
                Ok(n) => info!(runs = n, "tick finished"),
                Err(e) => error!(error = %e, "tick failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_run_is_duration_arithmetic() {
        let now = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(next_run(RepeatSchedule::None, now), None);
        assert_eq!(
            next_run(RepeatSchedule::Hourly, now),
            Some(now + ChronoDuration::hours(1))
        );
        assert_eq!(
            next_run(RepeatSchedule::Daily, now),
            Some(now + ChronoDuration::hours(24))
        );
        assert_eq!(
            next_run(RepeatSchedule::Weekly, now),
            Some(now + ChronoDuration::days(7))
        );
    }

    #[test]
    fn run_lock_excludes_and_releases() {
        let locks = RunLocks::new();
        let guard = locks.try_acquire("set-1");
        assert!(guard.is_some());
        assert!(locks.try_acquire("set-1").is_none());
        assert!(locks.try_acquire("set-2").is_some());
        drop(guard);
        assert!(locks.try_acquire("set-1").is_some());
    }
}
