//! # Concurrency Batcher
//!
//! Runs the per-repository provisioner across the participants × templates
//! cross product under two nested concurrency caps: at most
//! `concurrent_attendees` participants in flight, and within each
//! participant at most `concurrent_repos` repositories in flight. Every
//! inner batch completes before the next starts, every outer batch
//! completes before the next starts, and a fixed delay separates batches
//! to stay clear of abuse detection.
//!
//! The work runs on a dedicated rayon pool sized to the product of the two
//! caps, so the bound is enforced by construction - no unbounded fan-out
//! exists anywhere. Before each outer batch the rate budget tracker is
//! consulted and the whole run pauses if the remaining budget is below the
//! buffer.
//!
//! Item failures are absorbed by the provisioner into `Failed` ledger
//! entries; the only errors this module surfaces are infrastructure ones
//! (a poisoned ledger lock).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, info};
use rayon::prelude::*;

use crate::config::{Manifest, Settings};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::materialize::Materializer;
use crate::provision::{Provisioner, WorkItem};
use crate::rate_limit::{RateBudgetTracker, Sleeper};
use crate::remote::RemoteHost;
use crate::retry::{Retrier, RetryPolicy};

/// Progress callback: (processed, total, elapsed). Invoked between outer
/// batches, so successive calls are monotonically non-decreasing.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize, Duration) + Sync);

/// Run provisioning for every (participant, template) pair.
///
/// Returns only infrastructure errors; per-item outcomes land in `ledger`.
#[allow(clippy::too_many_arguments)]
pub fn run_provisioning(
    settings: &Settings,
    manifest: &Manifest,
    participants: &[crate::roster::Participant],
    remote: &dyn RemoteHost,
    budget: &RateBudgetTracker,
    materializer: &dyn Materializer,
    ledger: &Ledger,
    sleeper: &dyn Sleeper,
    progress: ProgressFn,
) -> Result<()> {
    let retrier = Retrier::new(
        RetryPolicy {
            max_attempts: settings.max_attempts,
            retry_delay: settings.retry_delay,
        },
        budget,
        remote,
    );
    let provisioner = Provisioner::new(settings, remote, &retrier, materializer);

    let attendee_cap = settings.concurrent_attendees.max(1);
    let repo_cap = settings.concurrent_repos.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(attendee_cap * repo_cap)
        .build()
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;

    let total = participants.len() * manifest.repositories.len();
    let processed = AtomicUsize::new(0);
    let errors: Mutex<Vec<Error>> = Mutex::new(Vec::new());
    let started = Instant::now();

    let mut first_batch = true;
    for attendee_batch in participants.chunks(attendee_cap) {
        if !first_batch {
            debug!("inter-batch pause of {}s", settings.batch_delay.as_secs());
            sleeper.sleep(settings.batch_delay);
        }
        first_batch = false;

        // Pause the whole run proactively rather than slamming into the
        // limit mid-batch.
        budget.await_capacity(remote)?;

        pool.install(|| {
            attendee_batch.par_iter().for_each(|participant| {
                let mut items: Vec<WorkItem> = manifest
                    .repositories
                    .iter()
                    .map(|(name, spec)| {
                        WorkItem::new(participant.clone(), name, spec.clone())
                    })
                    .collect();

                let mut first_inner = true;
                for inner_batch in items.chunks_mut(repo_cap) {
                    if !first_inner {
                        sleeper.sleep(settings.batch_delay);
                    }
                    first_inner = false;

                    inner_batch.par_iter_mut().for_each(|item| {
                        provisioner.run_item(item);
                        processed.fetch_add(1, Ordering::SeqCst);
                        if let Err(e) = ledger.record(item) {
                            errors.lock().unwrap().push(e);
                        }
                    });
                }
            });
        });

        progress(
            processed.load(Ordering::SeqCst),
            total,
            started.elapsed(),
        );
    }

    info!(
        "provisioning finished: {} items in {:.1}s",
        processed.load(Ordering::SeqCst),
        started.elapsed().as_secs_f64()
    );

    let collected = errors.into_inner().map_err(|_| Error::LockPoisoned {
        message: "batch error collector".to_string(),
    })?;
    if let Some(first) = collected.into_iter().next() {
        return Err(first);
    }
    Ok(())
}
