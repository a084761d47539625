//! # Rate Budget Tracker
//!
//! The orchestrator's live view of the remote-API call budget. Every
//! concurrent worker shares one tracker (behind an `Arc`); a single mutex
//! serializes reads and writes of the budget fields, making this the only
//! synchronization point between workers besides the result ledger.
//!
//! The tracker is refreshed opportunistically (every ~10 recorded calls or
//! 5 minutes, whichever comes first) and proactively before each outer
//! batch via [`RateBudgetTracker::await_capacity`], which sleeps until the
//! advertised reset time when the remaining budget drops below the
//! configured buffer.
//!
//! If the budget query itself fails, the tracker assumes a full default
//! budget rather than blocking all work - optimistic degradation.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::remote::{RateSnapshot, RemoteHost};

/// Default budget assumed when the remote cannot be queried.
const FALLBACK_LIMIT: u32 = 5000;
/// Calls between opportunistic refreshes.
const REFRESH_EVERY_CALLS: u32 = 10;
/// Wall-clock interval between opportunistic refreshes.
const REFRESH_EVERY: Duration = Duration::from_secs(300);
/// Safety margin added on top of the advertised reset time.
const RESET_MARGIN: Duration = Duration::from_secs(5);

/// Abstraction over blocking sleeps so tests can observe requested
/// durations instead of waiting them out.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by `std::thread::sleep`.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

struct BudgetState {
    limit: u32,
    remaining: u32,
    reset_at: DateTime<Utc>,
    last_refresh: Instant,
    calls_since_refresh: u32,
}

/// Process-wide tracker of the remote call budget. See module docs.
pub struct RateBudgetTracker {
    state: Mutex<BudgetState>,
    /// Remaining-call threshold below which work pauses until reset.
    buffer: u32,
    sleeper: Box<dyn Sleeper>,
}

impl RateBudgetTracker {
    /// Create a tracker that starts from the optimistic fallback budget.
    pub fn new(buffer: u32) -> Self {
        Self::with_sleeper(buffer, Box::new(ThreadSleeper))
    }

    /// Create a tracker with a custom sleeper (tests).
    pub fn with_sleeper(buffer: u32, sleeper: Box<dyn Sleeper>) -> Self {
        RateBudgetTracker {
            state: Mutex::new(BudgetState {
                limit: FALLBACK_LIMIT,
                remaining: FALLBACK_LIMIT,
                reset_at: Utc::now() + chrono::Duration::hours(1),
                last_refresh: Instant::now(),
                calls_since_refresh: 0,
            }),
            buffer,
            sleeper,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BudgetState>> {
        self.state.lock().map_err(|_| Error::LockPoisoned {
            message: "rate budget tracker".to_string(),
        })
    }

    /// Fold a fresh snapshot into the tracked budget.
    pub fn observe(&self, snapshot: RateSnapshot) -> Result<()> {
        let mut state = self.lock()?;
        state.limit = snapshot.limit;
        state.remaining = snapshot.remaining;
        state.reset_at = snapshot.reset_at;
        state.last_refresh = Instant::now();
        state.calls_since_refresh = 0;
        debug!(
            "rate budget: {}/{} remaining, resets at {}",
            snapshot.remaining, snapshot.limit, snapshot.reset_at
        );
        Ok(())
    }

    /// Current (possibly stale) view of the budget.
    pub fn snapshot(&self) -> Result<RateSnapshot> {
        let state = self.lock()?;
        Ok(RateSnapshot {
            limit: state.limit,
            remaining: state.remaining,
            reset_at: state.reset_at,
        })
    }

    /// Record one remote call, refreshing opportunistically when the call
    /// count or time threshold is reached.
    pub fn record_call(&self, remote: &dyn RemoteHost) -> Result<()> {
        let due = {
            let mut state = self.lock()?;
            state.remaining = state.remaining.saturating_sub(1);
            state.calls_since_refresh += 1;
            state.calls_since_refresh >= REFRESH_EVERY_CALLS
                || state.last_refresh.elapsed() >= REFRESH_EVERY
        };
        if due {
            self.refresh(remote)?;
        }
        Ok(())
    }

    /// Query the remote for a fresh budget. A failed query degrades to the
    /// optimistic fallback budget instead of blocking work.
    pub fn refresh(&self, remote: &dyn RemoteHost) -> Result<()> {
        match remote.rate_limit() {
            Ok(snapshot) => self.observe(snapshot),
            Err(e) => {
                warn!("rate limit query failed ({}), assuming full budget", e);
                self.observe(RateSnapshot {
                    limit: FALLBACK_LIMIT,
                    remaining: FALLBACK_LIMIT,
                    reset_at: Utc::now() + chrono::Duration::hours(1),
                })
            }
        }
    }

    /// Block until the remaining budget is at least the buffer, sleeping
    /// through resets as needed. Called before each outer batch and after
    /// a hard rate-limit response.
    pub fn await_capacity(&self, remote: &dyn RemoteHost) -> Result<()> {
        loop {
            self.refresh(remote)?;
            let (remaining, reset_at) = {
                let state = self.lock()?;
                (state.remaining, state.reset_at)
            };
            if remaining >= self.buffer {
                return Ok(());
            }

            let until_reset = (reset_at - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                + RESET_MARGIN;
            info!(
                "rate budget low ({} remaining, buffer {}); pausing {}s until reset",
                remaining,
                self.buffer,
                until_reset.as_secs()
            );
            self.sleeper.sleep(until_reset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::remote::{CreateRepo, RemoteError};

    type RemoteResult<T> = std::result::Result<T, RemoteError>;

    /// Records requested sleeps instead of performing them.
    pub(crate) struct RecordingSleeper {
        pub slept: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub(crate) fn new() -> Self {
            RecordingSleeper {
                slept: Mutex::new(Vec::new()),
            }
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    /// Remote whose rate_limit() returns a scripted sequence of snapshots.
    struct ScriptedRemote {
        snapshots: Mutex<Vec<std::result::Result<RateSnapshot, ()>>>,
        queries: AtomicU32,
    }

    impl ScriptedRemote {
        fn new(snapshots: Vec<std::result::Result<RateSnapshot, ()>>) -> Self {
            ScriptedRemote {
                snapshots: Mutex::new(snapshots),
                queries: AtomicU32::new(0),
            }
        }
    }

    impl RemoteHost for ScriptedRemote {
        fn repo_exists(&self, _: &str, _: &str) -> RemoteResult<bool> {
            Ok(false)
        }
        fn create_repo(&self, _: &str, _: &CreateRepo) -> RemoteResult<()> {
            Ok(())
        }
        fn add_collaborator(&self, _: &str, _: &str, _: &str) -> RemoteResult<()> {
            Ok(())
        }
        fn create_issue(&self, _: &str, _: &str, _: &str, _: &str) -> RemoteResult<()> {
            Ok(())
        }
        fn request_prebuild(&self, _: &str, _: &str, _: &str) -> RemoteResult<()> {
            Ok(())
        }
        fn list_repos(&self, _: &str) -> RemoteResult<Vec<String>> {
            Ok(vec![])
        }
        fn delete_repo(&self, _: &str, _: &str) -> RemoteResult<()> {
            Ok(())
        }
        fn rate_limit(&self) -> RemoteResult<RateSnapshot> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            let mut snapshots = self.snapshots.lock().unwrap();
            if snapshots.is_empty() {
                return Err(RemoteError::Transport {
                    message: "no more scripted snapshots".to_string(),
                });
            }
            snapshots.remove(0).map_err(|_| RemoteError::Transport {
                message: "scripted failure".to_string(),
            })
        }
        fn push_url(&self, org: &str, repo: &str) -> String {
            format!("https://example.invalid/{}/{}.git", org, repo)
        }
    }

    fn snapshot(remaining: u32, reset_in_secs: i64) -> RateSnapshot {
        RateSnapshot {
            limit: 5000,
            remaining,
            reset_at: Utc::now() + chrono::Duration::seconds(reset_in_secs),
        }
    }

    #[test]
    fn test_observe_updates_state() {
        let tracker = RateBudgetTracker::new(50);
        tracker.observe(snapshot(1234, 600)).unwrap();
        assert_eq!(tracker.snapshot().unwrap().remaining, 1234);
    }

    #[test]
    fn test_await_capacity_returns_immediately_with_budget() {
        let sleeper = Arc::new(RecordingSleeper::new());
        struct Shared(Arc<RecordingSleeper>);
        impl Sleeper for Shared {
            fn sleep(&self, d: Duration) {
                self.0.sleep(d)
            }
        }
        let tracker = RateBudgetTracker::with_sleeper(50, Box::new(Shared(sleeper.clone())));
        let remote = ScriptedRemote::new(vec![Ok(snapshot(4000, 600))]);

        tracker.await_capacity(&remote).unwrap();
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[test]
    fn test_await_capacity_sleeps_until_reset_when_exhausted() {
        let sleeper = Arc::new(RecordingSleeper::new());
        struct Shared(Arc<RecordingSleeper>);
        impl Sleeper for Shared {
            fn sleep(&self, d: Duration) {
                self.0.sleep(d)
            }
        }
        let tracker = RateBudgetTracker::with_sleeper(50, Box::new(Shared(sleeper.clone())));
        // First query: exhausted, reset 60s out. Second query: recovered.
        let remote = ScriptedRemote::new(vec![Ok(snapshot(0, 60)), Ok(snapshot(5000, 3600))]);

        tracker.await_capacity(&remote).unwrap();

        let slept = sleeper.slept.lock().unwrap();
        assert_eq!(slept.len(), 1);
        // Sleep covers the time until reset plus the safety margin.
        assert!(slept[0] >= Duration::from_secs(60));
        assert!(slept[0] <= Duration::from_secs(70));
    }

    #[test]
    fn test_failed_refresh_degrades_optimistically() {
        let tracker = RateBudgetTracker::new(50);
        let remote = ScriptedRemote::new(vec![Err(())]);

        tracker.refresh(&remote).unwrap();
        assert_eq!(tracker.snapshot().unwrap().remaining, FALLBACK_LIMIT);
    }

    #[test]
    fn test_record_call_triggers_refresh_after_threshold() {
        let tracker = RateBudgetTracker::new(50);
        let remote = ScriptedRemote::new(vec![Ok(snapshot(100, 600))]);

        for _ in 0..REFRESH_EVERY_CALLS {
            tracker.record_call(&remote).unwrap();
        }
        assert_eq!(remote.queries.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.snapshot().unwrap().remaining, 100);
    }

    #[test]
    fn test_record_call_decrements_local_view() {
        let tracker = RateBudgetTracker::new(50);
        let remote = ScriptedRemote::new(vec![]);
        let before = tracker.snapshot().unwrap().remaining;
        tracker.record_call(&remote).unwrap();
        assert_eq!(tracker.snapshot().unwrap().remaining, before - 1);
    }
}
