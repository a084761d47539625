//! # Teardown Orchestrator
//!
//! The symmetric counterpart to provisioning: discovers previously
//! provisioned repositories by naming convention and deletes them under
//! the same retry and rate-budget machinery, at a single concurrency level
//! (deletion is one remote call per item, so there is no nested batching).
//!
//! There is no persistent provisioning database; discovery lists every
//! repository in the target organization and keeps those whose name ends
//! with `-<username>` for some roster participant.
//!
//! Deletion is gated twice: preview mode performs discovery and reporting
//! only and always declines to proceed, and an actual run requires the
//! exact literal confirmation token. A 404 during deletion means the
//! repository is already gone and is reported as `not_found`, not failed.

use std::sync::Mutex;

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::rate_limit::{RateBudgetTracker, Sleeper};
use crate::remote::{RemoteError, RemoteHost};
use crate::retry::{Retrier, RetryPolicy};
use crate::roster::Participant;

/// The literal token an operator must supply before anything is deleted.
pub const CONFIRM_TOKEN: &str = "DELETE";

/// How a teardown run was authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Discovery and reporting only; never deletes.
    Preview,
    /// Operator-supplied token, compared against [`CONFIRM_TOKEN`].
    Token(String),
}

/// Outcome of one teardown run.
#[derive(Debug, Default, Serialize)]
pub struct TeardownReport {
    /// Repositories matched by the naming convention.
    pub discovered: Vec<String>,
    pub deleted: Vec<String>,
    /// Already gone when the delete call arrived.
    pub not_found: Vec<String>,
    /// Name and cause for deletions that survived retries.
    pub failed: Vec<(String, String)>,
}

/// List the repositories in `org` that belong to roster participants.
pub fn discover(
    remote: &dyn RemoteHost,
    org: &str,
    participants: &[Participant],
) -> Result<Vec<String>> {
    let all = remote.list_repos(org)?;
    let mut matched: Vec<String> = all
        .into_iter()
        .filter(|name| {
            participants
                .iter()
                .any(|p| name.ends_with(&format!("-{}", p.username)))
        })
        .collect();
    matched.sort();
    info!("discovered {} provisioned repositories in {}", matched.len(), org);
    Ok(matched)
}

/// Discover and, when confirmed, delete provisioned repositories.
pub fn run_teardown(
    settings: &Settings,
    participants: &[Participant],
    remote: &dyn RemoteHost,
    budget: &RateBudgetTracker,
    sleeper: &dyn Sleeper,
    confirmation: Confirmation,
) -> Result<TeardownReport> {
    let mut report = TeardownReport {
        discovered: discover(remote, &settings.org, participants)?,
        ..TeardownReport::default()
    };

    match confirmation {
        Confirmation::Preview => {
            info!("preview mode: no repositories will be deleted");
            return Ok(report);
        }
        Confirmation::Token(token) if token == CONFIRM_TOKEN => {}
        Confirmation::Token(_) => {
            return Err(Error::NotConfirmed {
                expected: CONFIRM_TOKEN.to_string(),
            });
        }
    }

    let retrier = Retrier::new(
        RetryPolicy {
            max_attempts: settings.max_attempts,
            retry_delay: settings.retry_delay,
        },
        budget,
        remote,
    );

    let concurrency = settings.concurrent_attendees.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency)
        .build()
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;

    let deleted: Mutex<Vec<String>> = Mutex::new(Vec::new());
    let not_found: Mutex<Vec<String>> = Mutex::new(Vec::new());
    let failed: Mutex<Vec<(String, String)>> = Mutex::new(Vec::new());

    let mut first_batch = true;
    for batch in report.discovered.chunks(concurrency) {
        if !first_batch {
            sleeper.sleep(settings.batch_delay);
        }
        first_batch = false;
        budget.await_capacity(remote)?;

        pool.install(|| {
            batch.par_iter().for_each(|name| {
                // A 404 is resolved inside the retried operation so it is
                // never treated as a retryable failure: the repository was
                // removed out of band since discovery.
                let outcome = retrier.run(&format!("delete {}", name), || {
                    match remote.delete_repo(&settings.org, name) {
                        Ok(()) => Ok(true),
                        Err(RemoteError::NotFound { .. }) => Ok(false),
                        Err(e) => Err(e.into()),
                    }
                });
                match outcome {
                    Ok(true) => {
                        info!("deleted {}", name);
                        deleted.lock().unwrap().push(name.clone());
                    }
                    Ok(false) => {
                        not_found.lock().unwrap().push(name.clone());
                    }
                    Err(e) => {
                        warn!("delete {} failed: {}", name, e);
                        failed.lock().unwrap().push((name.clone(), e.to_string()));
                    }
                }
            });
        });
    }

    report.deleted = sorted(deleted);
    report.not_found = sorted(not_found);
    report.failed = {
        let mut f = failed.into_inner().unwrap_or_default();
        f.sort();
        f
    };
    Ok(report)
}

fn sorted(names: Mutex<Vec<String>>) -> Vec<String> {
    let mut names = names.into_inner().unwrap_or_default();
    names.sort();
    names
}
