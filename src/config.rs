//! # Configuration
//!
//! This module defines the two configuration surfaces of `workshopctl`:
//!
//! - **`Manifest`**: the YAML schema describing the workshop's template
//!   repositories - for each repository, which extracted directory holds its
//!   main branch, which directories hold extra branches, and which files go
//!   through placeholder substitution.
//! - **`Settings`**: the run settings (target organization, credentials,
//!   concurrency caps, retry tuning, content roots). `Settings` is an
//!   explicit, immutably-constructed value passed into the orchestrators by
//!   reference. It is never a process-wide singleton, so two orchestrators
//!   with different settings can coexist in one process (tests rely on this).
//!
//! ## Manifest format
//!
//! ```yaml
//! repositories:
//!   demo:
//!     main_branch_dir: demo/main
//!     extra_branch_dirs:
//!       - demo/feature-x
//!     templated_files:
//!       - README.md
//!     source: dynamic
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Where a template repository's extracted content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Generated per-workshop content; repositories of this kind also
    /// receive seed issues from blueprint files.
    #[default]
    Dynamic,
    /// Content bundled with the tool, identical across workshops.
    Static,
}

/// Specification of one template repository in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRepoSpec {
    /// Directory inside the extracted archive holding the main branch tree.
    pub main_branch_dir: String,
    /// Directories holding extra branch trees. A missing directory at
    /// materialization time is a recorded warning, not an error.
    #[serde(default)]
    pub extra_branch_dirs: Vec<String>,
    /// Paths (relative to each branch directory) rendered through
    /// placeholder substitution before committing.
    #[serde(default)]
    pub templated_files: Vec<String>,
    /// Which extracted content root this repository materializes from.
    #[serde(default)]
    pub source: SourceKind,
}

/// The workshop manifest, loaded once and read-only for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Template repository name to its specification. BTreeMap keeps
    /// iteration order stable across runs.
    pub repositories: BTreeMap<String, TemplateRepoSpec>,
}

impl Manifest {
    /// Load and parse a manifest from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::ManifestParse {
            message: format!("cannot read {}: {}", path.display(), e),
            hint: None,
        })?;
        Self::parse(&content)
    }

    /// Parse a manifest from a YAML string.
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Manifest =
            serde_yaml::from_str(content).map_err(|e| Error::ManifestParse {
                message: e.to_string(),
                hint: Some(
                    "expected a top-level 'repositories' map; see the manifest format docs"
                        .to_string(),
                ),
            })?;

        for (name, spec) in &manifest.repositories {
            if spec.main_branch_dir.is_empty() {
                return Err(Error::manifest_with_hint(
                    format!("repository '{}' has an empty main_branch_dir", name),
                    "every repository needs a directory for its main branch content",
                ));
            }
        }

        Ok(manifest)
    }
}

/// Run settings for provisioning and teardown.
///
/// Construct once (normally in the CLI layer from flags and environment
/// variables) and pass by reference into the orchestrators.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Target organization on the remote host.
    pub org: String,
    /// API token for the remote host.
    pub token: String,
    /// Root of extracted dynamic template content.
    pub dynamic_root: PathBuf,
    /// Root of extracted static template content.
    pub static_root: PathBuf,
    /// Directory holding issue blueprints, one subdirectory per template
    /// repository, markdown files created in filename order.
    pub blueprints_dir: Option<PathBuf>,
    /// Scratch root for temporary worktrees. Recursive removal is confined
    /// to this directory.
    pub scratch_dir: PathBuf,
    /// Where the run's result ledger is written.
    pub ledger_path: PathBuf,
    /// Name of the default branch in created repositories.
    pub main_branch: String,
    /// Version string substituted into templated files.
    pub source_version: String,
    /// Source URL substituted into templated files.
    pub source_url: String,
    /// How many participants are worked on concurrently.
    pub concurrent_attendees: usize,
    /// How many repositories per participant are worked on concurrently.
    pub concurrent_repos: usize,
    /// Maximum attempts per remote operation (hard rate limits excluded).
    pub max_attempts: u32,
    /// Base delay for linear backoff on transient failures.
    pub retry_delay: Duration,
    /// Fixed pause between batches, to stay clear of abuse detection.
    pub batch_delay: Duration,
    /// Remaining-call threshold below which work pauses until reset.
    pub rate_buffer: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            org: String::new(),
            token: String::new(),
            dynamic_root: PathBuf::from("content/dynamic"),
            static_root: PathBuf::from("content/static"),
            blueprints_dir: None,
            scratch_dir: std::env::temp_dir().join("workshopctl"),
            ledger_path: PathBuf::from("workshopctl-results.json"),
            main_branch: "main".to_string(),
            source_version: String::new(),
            source_url: String::new(),
            concurrent_attendees: 3,
            concurrent_repos: 2,
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            batch_delay: Duration::from_secs(10),
            rate_buffer: 50,
        }
    }
}

impl Settings {
    /// Extracted content root for the given source kind.
    pub fn content_root(&self, kind: SourceKind) -> &Path {
        match kind {
            SourceKind::Dynamic => &self.dynamic_root,
            SourceKind::Static => &self.static_root,
        }
    }

    /// Validate the parts that must be present before any work starts.
    ///
    /// Missing credentials or an empty organization are configuration
    /// errors: fatal, and detected up front.
    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(Error::MissingCredentials {
                message: "no API token configured".to_string(),
            });
        }
        if self.org.is_empty() {
            return Err(Error::MissingCredentials {
                message: "no target organization configured".to_string(),
            });
        }
        Ok(())
    }
}
