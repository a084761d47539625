//! # Result Ledger
//!
//! Accumulates per-item outcomes during a provisioning run. Besides the
//! remote side effects themselves, this is the system's sole observable
//! output: three append-only sequences (succeeded, skipped, failed), a
//! printed summary, and one JSON artifact written at the end of the run.
//!
//! Appends are lock-protected so concurrent workers can record outcomes
//! directly; no ordering across items is promised or needed.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::provision::{WorkItem, WorkState};

/// One terminal work item, as persisted.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    /// Derived remote repository name.
    pub repository: String,
    pub participant: String,
    pub template: String,
    #[serde(flatten)]
    pub state: WorkState,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl LedgerEntry {
    fn from_item(item: &WorkItem) -> Self {
        LedgerEntry {
            repository: item.derived_name.clone(),
            participant: item.participant.username.clone(),
            template: item.template_name.clone(),
            state: item.state.clone(),
            warnings: item.warnings.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct LedgerInner {
    succeeded: Vec<LedgerEntry>,
    skipped: Vec<LedgerEntry>,
    failed: Vec<LedgerEntry>,
}

/// Serialized wrapper adding run metadata to the artifact.
#[derive(Serialize)]
struct LedgerReport<'a> {
    generated_at: DateTime<Utc>,
    org: &'a str,
    #[serde(flatten)]
    results: &'a LedgerInner,
}

/// Thread-safe collector of run outcomes.
#[derive(Debug, Default)]
pub struct Ledger {
    inner: Mutex<LedgerInner>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LedgerInner>> {
        self.inner.lock().map_err(|_| Error::LockPoisoned {
            message: "result ledger".to_string(),
        })
    }

    /// Record a terminal work item into the matching sequence.
    pub fn record(&self, item: &WorkItem) -> Result<()> {
        let entry = LedgerEntry::from_item(item);
        let mut inner = self.lock()?;
        match item.state {
            WorkState::Skipped => inner.skipped.push(entry),
            WorkState::Failed(_) => inner.failed.push(entry),
            _ => inner.succeeded.push(entry),
        }
        Ok(())
    }

    /// (succeeded, skipped, failed) counts.
    pub fn counts(&self) -> Result<(usize, usize, usize)> {
        let inner = self.lock()?;
        Ok((
            inner.succeeded.len(),
            inner.skipped.len(),
            inner.failed.len(),
        ))
    }

    /// Total number of recorded items.
    pub fn total(&self) -> Result<usize> {
        let (s, k, f) = self.counts()?;
        Ok(s + k + f)
    }

    /// Participant/repository pairs recorded as failed, with their reason.
    pub fn failures(&self) -> Result<Vec<(String, String)>> {
        let inner = self.lock()?;
        Ok(inner
            .failed
            .iter()
            .map(|e| {
                let reason = match &e.state {
                    WorkState::Failed(reason) => reason.clone(),
                    _ => String::new(),
                };
                (e.repository.clone(), reason)
            })
            .collect())
    }

    /// Persist the ledger as a JSON artifact. Called once per run.
    pub fn write_to(&self, path: &Path, org: &str) -> Result<()> {
        let inner = self.lock()?;
        let report = LedgerReport {
            generated_at: Utc::now(),
            org,
            results: &inner,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::config::TemplateRepoSpec;
    use crate::roster::Participant;

    fn item(username: &str, state: WorkState) -> WorkItem {
        let mut item = WorkItem::new(
            Participant {
                username: username.to_string(),
                email: None,
            },
            "demo",
            TemplateRepoSpec {
                main_branch_dir: "demo/main".to_string(),
                extra_branch_dirs: vec![],
                templated_files: vec![],
                source: Default::default(),
            },
        );
        item.state = state;
        item
    }

    #[test]
    fn test_record_routes_by_state() {
        let ledger = Ledger::new();
        ledger.record(&item("alice", WorkState::Done)).unwrap();
        ledger.record(&item("bob", WorkState::Skipped)).unwrap();
        ledger
            .record(&item("carol", WorkState::Failed("boom".to_string())))
            .unwrap();

        assert_eq!(ledger.counts().unwrap(), (1, 1, 1));
        assert_eq!(ledger.total().unwrap(), 3);
        let failures = ledger.failures().unwrap();
        assert_eq!(failures, vec![("demo-carol".to_string(), "boom".to_string())]);
    }

    #[test]
    fn test_artifact_keyed_by_repo_and_participant() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("results.json");

        let ledger = Ledger::new();
        let mut done = item("alice", WorkState::Done);
        done.warnings.push("branch omitted".to_string());
        ledger.record(&done).unwrap();
        ledger.write_to(&path, "rustship").unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["org"], "rustship");
        let entry = &json["succeeded"][0];
        assert_eq!(entry["repository"], "demo-alice");
        assert_eq!(entry["participant"], "alice");
        assert_eq!(entry["state"], "done");
        assert_eq!(entry["warnings"][0], "branch omitted");
        assert!(json["failed"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_appends() {
        use std::sync::Arc;
        let ledger = Arc::new(Ledger::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            handles.push(std::thread::spawn(move || {
                let state = if i % 2 == 0 {
                    WorkState::Done
                } else {
                    WorkState::Skipped
                };
                ledger.record(&item(&format!("user{}", i), state)).unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ledger.counts().unwrap(), (4, 4, 0));
    }
}
