//! # Per-Repository Provisioner
//!
//! The state machine that takes one (participant, template repository)
//! pair from `Pending` to a terminal state. Transitions are strictly
//! forward; every remote call runs under the retry policy and records
//! against the shared rate budget.
//!
//! ```text
//! Pending -> Checked -> Skipped                  (already provisioned)
//!                    -> Created -> Populated -> CollaboratorAdded
//!                         -> IssuesCreated       (dynamic repos only)
//!                         -> PrebuildConfigured  (best effort)
//!                         -> Done
//! any failure surviving retries ----------------> Failed(reason)
//! ```
//!
//! Failure is contained at the item: a `Failed` item records its cause and
//! its siblings run on unaffected (bulkhead isolation, not a circuit
//! breaker). Best-effort steps - seed issues and the prebuild request -
//! never fail the item; their problems land in the item's warning list so
//! tests and the ledger can see them without parsing logs.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use crate::config::{Settings, SourceKind, TemplateRepoSpec};
use crate::error::{Error, Result};
use crate::materialize::{MaterializeRequest, Materializer};
use crate::remote::{CreateRepo, RemoteError, RemoteHost};
use crate::retry::Retrier;
use crate::roster::Participant;
use crate::template::RenderContext;

/// Lifecycle state of one work item. Strictly forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum WorkState {
    Pending,
    Checked,
    /// The derived repository already exists; reruns never overwrite.
    Skipped,
    Created,
    Populated,
    CollaboratorAdded,
    IssuesCreated,
    PrebuildConfigured,
    Done,
    Failed(String),
}

impl WorkState {
    /// Whether the state machine has finished with this item.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkState::Skipped | WorkState::Done | WorkState::Failed(_)
        )
    }
}

/// One (participant, template repository) provisioning task.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub participant: Participant,
    pub template_name: String,
    pub spec: TemplateRepoSpec,
    /// `<template>-<username>`, the name of the remote repository.
    pub derived_name: String,
    pub state: WorkState,
    /// Non-fatal observations accumulated along the way.
    pub warnings: Vec<String>,
}

impl WorkItem {
    pub fn new(participant: Participant, template_name: &str, spec: TemplateRepoSpec) -> Self {
        let derived_name = format!("{}-{}", template_name, participant.username);
        WorkItem {
            participant,
            template_name: template_name.to_string(),
            spec,
            derived_name,
            state: WorkState::Pending,
            warnings: Vec::new(),
        }
    }
}

/// One seed issue parsed from a blueprint file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueBlueprint {
    pub title: String,
    pub body: String,
}

/// Load a template repository's issue blueprints in filename order.
///
/// Each markdown file becomes one issue; a leading `# ` heading is the
/// title, the remainder the body. No blueprint directory means no issues.
pub fn load_blueprints(blueprints_dir: &Path, template_name: &str) -> Vec<IssueBlueprint> {
    let dir = blueprints_dir.join(template_name);
    let mut paths: Vec<_> = match fs::read_dir(&dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
            .collect(),
        Err(_) => return Vec::new(),
    };
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| {
            let content = fs::read_to_string(&path).ok()?;
            let fallback = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            Some(parse_blueprint(&content, &fallback))
        })
        .collect()
}

fn parse_blueprint(content: &str, fallback_title: &str) -> IssueBlueprint {
    let mut lines = content.lines();
    match lines.next().and_then(|l| l.strip_prefix("# ")) {
        Some(title) => IssueBlueprint {
            title: title.trim().to_string(),
            body: lines.collect::<Vec<_>>().join("\n").trim().to_string(),
        },
        None => IssueBlueprint {
            title: fallback_title.to_string(),
            body: content.trim().to_string(),
        },
    }
}

/// Drives the state machine for individual work items.
pub struct Provisioner<'a> {
    settings: &'a Settings,
    remote: &'a dyn RemoteHost,
    retrier: &'a Retrier<'a>,
    materializer: &'a dyn Materializer,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        settings: &'a Settings,
        remote: &'a dyn RemoteHost,
        retrier: &'a Retrier<'a>,
        materializer: &'a dyn Materializer,
    ) -> Self {
        Provisioner {
            settings,
            remote,
            retrier,
            materializer,
        }
    }

    /// Run one item to a terminal state. Never returns an error: failures
    /// are absorbed into `WorkState::Failed` so siblings are unaffected.
    pub fn run_item(&self, item: &mut WorkItem) {
        if let Err(e) = self.advance(item) {
            warn!("{}: failed: {}", item.derived_name, e);
            item.state = WorkState::Failed(e.to_string());
        }
        debug_assert!(item.state.is_terminal());
    }

    fn advance(&self, item: &mut WorkItem) -> Result<()> {
        let org = self.settings.org.as_str();
        let name = item.derived_name.clone();

        // Existence probe. Reruns never overwrite provisioned repositories.
        let exists = self
            .retrier
            .run(&format!("probe {}", name), || {
                Ok(self.remote.repo_exists(org, &name)?)
            })?;
        item.state = WorkState::Checked;
        if exists {
            info!("{}: already provisioned, skipping", name);
            item.state = WorkState::Skipped;
            return Ok(());
        }

        // Create the empty remote repository.
        let create = CreateRepo {
            name: name.clone(),
            description: format!(
                "Workshop copy of {} for {}",
                item.template_name, item.participant.username
            ),
            private: true,
        };
        match self.retrier.run(&format!("create {}", name), || {
            Ok(self.remote.create_repo(org, &create)?)
        }) {
            Ok(()) => {}
            // Lost the race against an earlier partial run: same outcome
            // as the probe finding it.
            Err(Error::Remote(RemoteError::AlreadyExists { .. })) => {
                info!("{}: created by an earlier run, skipping", name);
                item.state = WorkState::Skipped;
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        item.state = WorkState::Created;

        // Populate all branches.
        let context = RenderContext {
            repo_name: name.clone(),
            username: item.participant.username.clone(),
            source_version: self.settings.source_version.clone(),
            source_url: self.settings.source_url.clone(),
        };
        let push_url = self.remote.push_url(org, &name);
        let request = MaterializeRequest {
            template_name: &item.template_name,
            spec: &item.spec,
            derived_name: &name,
            context: &context,
            push_url: &push_url,
        };
        let materialized = self
            .retrier
            .run(&format!("populate {}", name), || {
                self.materializer.materialize(&request)
            })?;
        item.warnings.extend(materialized.warnings.clone());
        item.state = WorkState::Populated;

        // Grant the participant admin access.
        self.retrier
            .run(&format!("collaborator {}", name), || {
                Ok(self
                    .remote
                    .add_collaborator(org, &name, &item.participant.username)?)
            })?;
        item.state = WorkState::CollaboratorAdded;

        // Seed issues, dynamic repositories only. Individual failures are
        // warnings, never fatal.
        if item.spec.source == SourceKind::Dynamic {
            if let Some(blueprints_dir) = &self.settings.blueprints_dir {
                let blueprints = load_blueprints(blueprints_dir, &item.template_name);
                for blueprint in &blueprints {
                    let label = format!("issue '{}' on {}", blueprint.title, name);
                    if let Err(e) = self.retrier.run(&label, || {
                        Ok(self.remote.create_issue(
                            org,
                            &name,
                            &blueprint.title,
                            &blueprint.body,
                        )?)
                    }) {
                        warn!("{}: {}", label, e);
                        item.warnings
                            .push(format!("issue '{}' not created: {}", blueprint.title, e));
                    }
                }
                item.state = WorkState::IssuesCreated;
            }
        }

        // Prebuild request, best effort. The capability may not exist at
        // all on this host or plan.
        if materialized.has_devcontainer {
            match self.retrier.run(&format!("prebuild {}", name), || {
                Ok(self
                    .remote
                    .request_prebuild(org, &name, &self.settings.main_branch)?)
            }) {
                Ok(()) => item.state = WorkState::PrebuildConfigured,
                Err(e) => {
                    warn!("{}: prebuild not configured: {}", name, e);
                    item.warnings
                        .push(format!("prebuild not configured: {}", e));
                }
            }
        }

        item.state = WorkState::Done;
        info!("{}: done", name);
        Ok(())
    }
}
