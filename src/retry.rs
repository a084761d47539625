//! # Retry Policy
//!
//! Wraps any unit of remote work with bounded retries. Failures are
//! classified into three paths with distinct backoff behavior:
//!
//! - **Hard rate limit**: the remote states exactly when capacity returns,
//!   so the tracker is refreshed, the worker waits for capacity, and the
//!   attempt is retried *without* consuming an attempt.
//! - **Secondary/abuse throttling**: exponential-style backoff of
//!   `min(60s * attempt, 300s)`, consuming an attempt.
//! - **Anything else**: linear backoff of `retry_delay * attempt`,
//!   consuming an attempt.
//!
//! Keeping the two throttling signals separate matters: conflating them
//! either wastes the workshop's time budget on oversized waits or fails
//! items that would have succeeded after the advertised reset.
//!
//! The combinator is parameterized by a failure classifier so the three
//! policies are testable in isolation from any specific remote call.

use std::cmp::min;
use std::time::Duration;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::rate_limit::{RateBudgetTracker, Sleeper, ThreadSleeper};
use crate::remote::{FailureClass, RemoteHost};

/// Cap on the secondary-throttle backoff.
const SECONDARY_BACKOFF_CAP: Duration = Duration::from_secs(300);
/// Per-attempt unit of the secondary-throttle backoff.
const SECONDARY_BACKOFF_UNIT: Duration = Duration::from_secs(60);

/// Classify any `Error` for the retry paths. Remote errors carry their own
/// classification; everything else (git, I/O) retries on the generic path.
pub fn classify(error: &Error) -> FailureClass {
    match error {
        Error::Remote(e) => e.class(),
        _ => FailureClass::Transient,
    }
}

/// Retry tuning, taken from [`crate::config::Settings`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

/// Executor binding a retry policy to a rate budget tracker and remote.
///
/// One `Retrier` is shared by all workers of a run.
pub struct Retrier<'a> {
    policy: RetryPolicy,
    budget: &'a RateBudgetTracker,
    remote: &'a dyn RemoteHost,
    sleeper: Box<dyn Sleeper>,
}

impl<'a> Retrier<'a> {
    pub fn new(
        policy: RetryPolicy,
        budget: &'a RateBudgetTracker,
        remote: &'a dyn RemoteHost,
    ) -> Self {
        Self::with_sleeper(policy, budget, remote, Box::new(ThreadSleeper))
    }

    /// Construct with a custom sleeper (tests).
    pub fn with_sleeper(
        policy: RetryPolicy,
        budget: &'a RateBudgetTracker,
        remote: &'a dyn RemoteHost,
        sleeper: Box<dyn Sleeper>,
    ) -> Self {
        Retrier {
            policy,
            budget,
            remote,
            sleeper,
        }
    }

    /// Run `op` under the retry policy, using the default classifier.
    ///
    /// `label` names the operation in logs and in the terminal error.
    pub fn run<T>(&self, label: &str, op: impl FnMut() -> Result<T>) -> Result<T> {
        self.run_classified(label, classify, op)
    }

    /// Run `op` with an explicit failure classifier.
    pub fn run_classified<T>(
        &self,
        label: &str,
        classify: impl Fn(&Error) -> FailureClass,
        mut op: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let mut attempt: u32 = 1;
        loop {
            self.budget.record_call(self.remote)?;
            let error = match op() {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            match classify(&error) {
                FailureClass::HardLimit => {
                    // The remote tells us exactly when capacity returns, so
                    // this path neither consumes an attempt nor guesses a
                    // backoff: refresh, wait for capacity, go again.
                    debug!("{}: hard rate limit, awaiting budget reset", label);
                    self.budget.await_capacity(self.remote)?;
                }
                FailureClass::Secondary => {
                    if attempt >= self.policy.max_attempts {
                        return Err(self.exhausted(label, attempt, error));
                    }
                    let backoff = min(
                        SECONDARY_BACKOFF_UNIT * attempt,
                        SECONDARY_BACKOFF_CAP,
                    );
                    warn!(
                        "{}: secondary throttling (attempt {}/{}), backing off {}s",
                        label,
                        attempt,
                        self.policy.max_attempts,
                        backoff.as_secs()
                    );
                    self.sleeper.sleep(backoff);
                    attempt += 1;
                }
                FailureClass::Transient => {
                    if attempt >= self.policy.max_attempts {
                        return Err(self.exhausted(label, attempt, error));
                    }
                    let backoff = self.policy.retry_delay * attempt;
                    warn!(
                        "{}: {} (attempt {}/{}), retrying in {}s",
                        label,
                        error,
                        attempt,
                        self.policy.max_attempts,
                        backoff.as_secs()
                    );
                    self.sleeper.sleep(backoff);
                    attempt += 1;
                }
            }
        }
    }

    /// Log exhaustion and re-raise the final error unchanged, so callers
    /// can still match on its variant.
    fn exhausted(&self, label: &str, attempts: u32, error: Error) -> Error {
        warn!("{}: giving up after {} attempts: {}", label, attempts, error);
        error
    }
}
