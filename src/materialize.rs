//! # Content Materializer
//!
//! Turns one template repository's extracted, branch-partitioned file tree
//! into a committed local repository and pushes it to the newly created
//! remote in a single `--all` push.
//!
//! ## Branch layout
//!
//! The main branch directory is copied first, templated files are rendered,
//! and the result becomes the initial commit. Each extra branch directory
//! then becomes its own branch forked from that commit: the worktree is
//! cleared (preserving `.git`), the branch's content is copied and
//! re-rendered, and committed with `--allow-empty` so a branch whose
//! content is byte-identical to main still produces a distinguishable
//! commit.
//!
//! A missing extra-branch directory is a recorded warning and the branch is
//! omitted; a missing main directory is fatal for the item, since there is
//! nothing to populate.
//!
//! Pushing happens once, after every branch is committed. A network failure
//! therefore never leaves the remote with a partial set of branches that a
//! retry would have to reconcile.

use std::fs;
use std::path::Path;

use log::{debug, warn};
use walkdir::WalkDir;

use crate::config::{Settings, TemplateRepoSpec};
use crate::error::{Error, Result};
use crate::git;
use crate::template::RenderContext;

/// Devcontainer configuration locations probed on the main branch.
const DEVCONTAINER_PATHS: [&str; 2] = [".devcontainer/devcontainer.json", ".devcontainer.json"];

/// Everything the materializer needs for one work item.
pub struct MaterializeRequest<'a> {
    /// Template repository name in the manifest.
    pub template_name: &'a str,
    pub spec: &'a TemplateRepoSpec,
    /// Derived remote repository name (`<template>-<username>`).
    pub derived_name: &'a str,
    pub context: &'a RenderContext,
    /// Authenticated URL the finished branches are pushed to.
    pub push_url: &'a str,
}

/// Result of a successful materialization.
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    /// Branch names committed and pushed, main first.
    pub branches: Vec<String>,
    /// Non-fatal observations (missing branch dirs, absent templated
    /// files, ambiguous branch names).
    pub warnings: Vec<String>,
    /// Whether the main branch carries a devcontainer configuration.
    pub has_devcontainer: bool,
}

/// Seam between the provisioner and the filesystem/git machinery, so the
/// state machine is testable without a worktree.
pub trait Materializer: Send + Sync {
    fn materialize(&self, req: &MaterializeRequest) -> Result<Materialized>;
}

/// Production materializer working under the settings' scratch root.
pub struct ContentMaterializer<'a> {
    settings: &'a Settings,
}

impl<'a> ContentMaterializer<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        ContentMaterializer { settings }
    }
}

impl Materializer for ContentMaterializer<'_> {
    fn materialize(&self, req: &MaterializeRequest) -> Result<Materialized> {
        let source_root = self.settings.content_root(req.spec.source);
        let main_src = source_root.join(&req.spec.main_branch_dir);
        if !main_src.is_dir() {
            return Err(Error::TemplateSourceMissing {
                repo: req.template_name.to_string(),
                path: main_src.display().to_string(),
            });
        }

        let mut result = Materialized::default();
        let worktree = self.settings.scratch_dir.join(req.derived_name);
        if worktree.exists() {
            // Leftover from an earlier attempt; removal stays confined to
            // the scratch root.
            fs::remove_dir_all(&worktree)?;
        }
        fs::create_dir_all(&worktree)?;

        // Main branch: copy, render, initial commit.
        let main_branch = self.settings.main_branch.as_str();
        copy_tree(&main_src, &worktree)?;
        render_templated(req, &worktree, main_branch, &mut result.warnings)?;
        git::init(&worktree, main_branch)?;
        git::add_all(&worktree)?;
        git::commit(&worktree, "Initial workshop content", false)?;
        result.branches.push(main_branch.to_string());

        // Extra branches, each forked from the main commit.
        for extra_dir in &req.spec.extra_branch_dirs {
            let branch_src = source_root.join(extra_dir);
            if !branch_src.is_dir() {
                warn!(
                    "{}: extra branch directory '{}' missing, branch omitted",
                    req.derived_name, extra_dir
                );
                result.warnings.push(format!(
                    "extra branch directory '{}' missing, branch omitted",
                    extra_dir
                ));
                continue;
            }

            let branch =
                derive_branch_name(&req.spec.main_branch_dir, extra_dir, &mut result.warnings);
            debug!("{}: materializing branch '{}'", req.derived_name, branch);

            git::checkout_new_branch(&worktree, &branch)?;
            git::clear_worktree(&worktree)?;
            copy_tree(&branch_src, &worktree)?;
            render_templated(req, &worktree, &branch, &mut result.warnings)?;
            git::add_all(&worktree)?;
            git::commit(&worktree, &format!("Branch {} content", branch), true)?;
            git::checkout(&worktree, main_branch)?;
            result.branches.push(branch);
        }

        result.has_devcontainer = DEVCONTAINER_PATHS
            .iter()
            .any(|p| worktree.join(p).is_file());

        // Single push for all branches.
        git::remote_add(&worktree, "origin", req.push_url)?;
        git::push_all(&worktree, "origin")?;

        if let Err(e) = fs::remove_dir_all(&worktree) {
            warn!(
                "could not clean up worktree {}: {}",
                worktree.display(),
                e
            );
        }

        Ok(result)
    }
}

/// Derive a branch's logical name from its directory.
///
/// A directory named `<main-dir-name>-<branch>` yields `<branch>`; any
/// other directory name is used verbatim. A directory whose name equals
/// the main directory's name is degenerate and flagged rather than
/// silently resolved.
pub fn derive_branch_name(
    main_branch_dir: &str,
    extra_dir: &str,
    warnings: &mut Vec<String>,
) -> String {
    let main_name = basename(main_branch_dir);
    let dir_name = basename(extra_dir);

    if dir_name == main_name {
        warnings.push(format!(
            "extra branch directory '{}' has the same name as the main branch directory",
            extra_dir
        ));
        return dir_name.to_string();
    }

    match dir_name.strip_prefix(&format!("{}-", main_name)) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => dir_name.to_string(),
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Copy a directory tree into the worktree.
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .unwrap_or_else(|_| entry.path());
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Render the declared templated files present in the worktree; absent
/// ones become warnings (a branch need not carry every templated file).
fn render_templated(
    req: &MaterializeRequest,
    worktree: &Path,
    branch: &str,
    warnings: &mut Vec<String>,
) -> Result<()> {
    for rel in &req.spec.templated_files {
        let path = worktree.join(rel);
        if path.is_file() {
            req.context.render_file(&path)?;
        } else {
            warnings.push(format!(
                "templated file '{}' not present on branch {}",
                rel, branch
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    use crate::config::SourceKind;

    fn context() -> RenderContext {
        RenderContext {
            repo_name: "demo-alice".to_string(),
            username: "alice".to_string(),
            source_version: "1.0.0".to_string(),
            source_url: "https://example.com".to_string(),
        }
    }

    /// Build an extracted content tree plus a bare "remote" under a temp
    /// root, returning (temp, settings, push_url).
    fn fixture() -> (TempDir, Settings, String) {
        let temp = TempDir::new().unwrap();
        let content = temp.path().join("content");
        fs::create_dir_all(content.join("demo/main")).unwrap();
        fs::write(content.join("demo/main/README.md"), "# ${REPO_NAME}\n").unwrap();
        fs::write(content.join("demo/main/run.sh"), "echo ${HOME}\n").unwrap();
        fs::create_dir_all(content.join("demo/feature-x")).unwrap();
        fs::write(content.join("demo/feature-x/README.md"), "# ${REPO_NAME} x\n").unwrap();

        let bare = temp.path().join("remote.git");
        fs::create_dir_all(&bare).unwrap();
        Command::new("git")
            .args(["init", "--bare"])
            .arg(&bare)
            .output()
            .unwrap();

        let settings = Settings {
            dynamic_root: content,
            scratch_dir: temp.path().join("scratch"),
            ..Settings::default()
        };
        let push_url = bare.to_str().unwrap().to_string();
        (temp, settings, push_url)
    }

    fn spec() -> TemplateRepoSpec {
        TemplateRepoSpec {
            main_branch_dir: "demo/main".to_string(),
            extra_branch_dirs: vec!["demo/feature-x".to_string()],
            templated_files: vec!["README.md".to_string()],
            source: SourceKind::Dynamic,
        }
    }

    #[test]
    fn test_materialize_pushes_all_branches() {
        let (_temp, settings, push_url) = fixture();
        let spec = spec();
        let ctx = context();
        let req = MaterializeRequest {
            template_name: "demo",
            spec: &spec,
            derived_name: "demo-alice",
            context: &ctx,
            push_url: &push_url,
        };

        let result = ContentMaterializer::new(&settings)
            .materialize(&req)
            .unwrap();

        assert_eq!(result.branches, vec!["main", "feature-x"]);
        assert!(result.warnings.is_empty());
        assert!(!result.has_devcontainer);

        let mut remote_branches = git::list_branches(Path::new(&push_url)).unwrap();
        remote_branches.sort();
        assert_eq!(remote_branches, vec!["feature-x", "main"]);
    }

    #[test]
    fn test_missing_extra_branch_is_warning_not_error() {
        let (_temp, settings, push_url) = fixture();
        let mut spec = spec();
        spec.extra_branch_dirs.push("demo/feature-y".to_string());
        let ctx = context();
        let req = MaterializeRequest {
            template_name: "demo",
            spec: &spec,
            derived_name: "demo-alice",
            context: &ctx,
            push_url: &push_url,
        };

        let result = ContentMaterializer::new(&settings)
            .materialize(&req)
            .unwrap();

        assert_eq!(result.branches, vec!["main", "feature-x"]);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("demo/feature-y"));
    }

    #[test]
    fn test_missing_main_dir_is_fatal() {
        let (_temp, settings, push_url) = fixture();
        let mut spec = spec();
        spec.main_branch_dir = "demo/absent".to_string();
        let ctx = context();
        let req = MaterializeRequest {
            template_name: "demo",
            spec: &spec,
            derived_name: "demo-alice",
            context: &ctx,
            push_url: &push_url,
        };

        let err = ContentMaterializer::new(&settings)
            .materialize(&req)
            .unwrap_err();
        assert!(matches!(err, Error::TemplateSourceMissing { .. }));
    }

    #[test]
    fn test_rendering_applied_and_foreign_tokens_preserved() {
        let (temp, settings, push_url) = fixture();
        let spec = spec();
        let ctx = context();
        let req = MaterializeRequest {
            template_name: "demo",
            spec: &spec,
            derived_name: "demo-alice",
            context: &ctx,
            push_url: &push_url,
        };

        ContentMaterializer::new(&settings)
            .materialize(&req)
            .unwrap();

        // Clone the pushed result and inspect the rendered main branch.
        let checkout = temp.path().join("checkout");
        Command::new("git")
            .args(["clone", "--branch", "main", &push_url])
            .arg(&checkout)
            .output()
            .unwrap();
        let readme = fs::read_to_string(checkout.join("README.md")).unwrap();
        assert_eq!(readme, "# demo-alice\n");
        // run.sh is not declared templated and keeps its ${HOME}.
        let script = fs::read_to_string(checkout.join("run.sh")).unwrap();
        assert_eq!(script, "echo ${HOME}\n");
    }

    #[test]
    fn test_devcontainer_detected_on_main() {
        let (_temp, settings, push_url) = fixture();
        fs::create_dir_all(settings.dynamic_root.join("demo/main/.devcontainer")).unwrap();
        fs::write(
            settings
                .dynamic_root
                .join("demo/main/.devcontainer/devcontainer.json"),
            "{}",
        )
        .unwrap();
        let spec = spec();
        let ctx = context();
        let req = MaterializeRequest {
            template_name: "demo",
            spec: &spec,
            derived_name: "demo-alice",
            context: &ctx,
            push_url: &push_url,
        };

        let result = ContentMaterializer::new(&settings)
            .materialize(&req)
            .unwrap();
        assert!(result.has_devcontainer);
    }

    #[test]
    fn test_branch_name_prefix_stripping() {
        let mut warnings = Vec::new();
        assert_eq!(
            derive_branch_name("demo/main", "demo/main-solution", &mut warnings),
            "solution"
        );
        assert_eq!(
            derive_branch_name("demo/main", "demo/feature-x", &mut warnings),
            "feature-x"
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_branch_name_degenerate_overlap_flagged() {
        let mut warnings = Vec::new();
        let name = derive_branch_name("demo/main", "other/main", &mut warnings);
        assert_eq!(name, "main");
        assert_eq!(warnings.len(), 1);
    }
}
