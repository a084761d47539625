//! # Git Worktree Operations
//!
//! Local version-control operations used by the content materializer:
//! init, branch create/checkout, add-all, commit (including empty commits),
//! remote add, and push.
//!
//! Every function takes the working directory as an explicit parameter and
//! runs the system `git` binary with `-C`. Nothing here ever changes the
//! process working directory, so concurrent workers materializing different
//! repositories cannot race on shared process-global state.
//!
//! Using the system git means SSH keys, credential helpers and tokens
//! configured in the environment all work without any code here.

use std::fs;
use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// Run one git command in `dir`, capturing stdout.
fn run(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map_err(|e| Error::GitCommand {
            command: args.join(" "),
            dir: dir.display().to_string(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            command: args.join(" "),
            dir: dir.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Initialize a repository with the given initial branch and a local
/// committer identity, so commits succeed regardless of global git config.
pub fn init(dir: &Path, initial_branch: &str) -> Result<()> {
    run(dir, &["init", "--initial-branch", initial_branch])?;
    run(dir, &["config", "user.name", "workshopctl"])?;
    run(dir, &["config", "user.email", "workshopctl@localhost"])?;
    Ok(())
}

/// Create and switch to a new branch.
pub fn checkout_new_branch(dir: &Path, branch: &str) -> Result<()> {
    run(dir, &["checkout", "-b", branch]).map(|_| ())
}

/// Switch to an existing branch.
pub fn checkout(dir: &Path, branch: &str) -> Result<()> {
    run(dir, &["checkout", branch]).map(|_| ())
}

/// Stage everything in the worktree.
pub fn add_all(dir: &Path) -> Result<()> {
    run(dir, &["add", "-A"]).map(|_| ())
}

/// Commit staged changes. With `allow_empty`, a commit is produced even
/// when the tree is byte-identical to the parent - extra branches must be
/// distinguishable commits even when their content matches main.
pub fn commit(dir: &Path, message: &str, allow_empty: bool) -> Result<()> {
    if allow_empty {
        run(dir, &["commit", "--allow-empty", "-m", message]).map(|_| ())
    } else {
        run(dir, &["commit", "-m", message]).map(|_| ())
    }
}

/// Add a named remote.
pub fn remote_add(dir: &Path, name: &str, url: &str) -> Result<()> {
    run(dir, &["remote", "add", name, url]).map(|_| ())
}

/// Push all local branches to `remote` in a single call, so a repository
/// is never left with a partial set of branches from an interrupted push.
pub fn push_all(dir: &Path, remote: &str) -> Result<()> {
    run(dir, &["push", "--all", remote]).map(|_| ())
}

/// Push a single branch to `remote`.
pub fn push_branch(dir: &Path, remote: &str, branch: &str) -> Result<()> {
    run(dir, &["push", remote, branch]).map(|_| ())
}

/// List local branch names.
pub fn list_branches(dir: &Path) -> Result<Vec<String>> {
    let stdout = run(dir, &["branch", "--format", "%(refname:short)"])?;
    Ok(stdout.lines().map(|l| l.trim().to_string()).collect())
}

/// Remove everything in the worktree except the `.git` directory, leaving
/// the repository ready to receive the next branch's content.
pub fn clear_worktree(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.file_name().is_some_and(|n| n == ".git") {
            continue;
        }
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // These tests exercise the real system git, which the materializer
    // depends on anyway.

    #[test]
    fn test_init_commit_and_branch_listing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();

        init(dir, "main").unwrap();
        fs::write(dir.join("README.md"), "# hello").unwrap();
        add_all(dir).unwrap();
        commit(dir, "initial content", false).unwrap();

        checkout_new_branch(dir, "feature-x").unwrap();
        commit(dir, "feature-x content", true).unwrap();

        let mut branches = list_branches(dir).unwrap();
        branches.sort();
        assert_eq!(branches, vec!["feature-x", "main"]);
    }

    #[test]
    fn test_empty_commit_allowed_only_when_requested() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();

        init(dir, "main").unwrap();
        fs::write(dir.join("a.txt"), "a").unwrap();
        add_all(dir).unwrap();
        commit(dir, "first", false).unwrap();

        // Nothing changed: a plain commit fails, an empty commit succeeds.
        assert!(commit(dir, "no changes", false).is_err());
        commit(dir, "no changes", true).unwrap();
    }

    #[test]
    fn test_clear_worktree_preserves_git_metadata() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();

        init(dir, "main").unwrap();
        fs::write(dir.join("README.md"), "# hello").unwrap();
        fs::create_dir(dir.join("src")).unwrap();
        fs::write(dir.join("src/lib.rs"), "pub fn f() {}").unwrap();

        clear_worktree(dir).unwrap();

        assert!(dir.join(".git").exists());
        assert!(!dir.join("README.md").exists());
        assert!(!dir.join("src").exists());
    }

    #[test]
    fn test_failed_command_reports_dir_and_stderr() {
        let temp = TempDir::new().unwrap();
        // Not a repository: add must fail.
        let err = add_all(temp.path()).unwrap_err();
        match err {
            Error::GitCommand { command, dir, .. } => {
                assert_eq!(command, "add -A");
                assert!(dir.contains(temp.path().file_name().unwrap().to_str().unwrap()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_push_all_to_local_bare_remote() {
        let temp = TempDir::new().unwrap();
        let bare = temp.path().join("remote.git");
        let work = temp.path().join("work");
        fs::create_dir_all(&bare).unwrap();
        fs::create_dir_all(&work).unwrap();

        // A local bare repository stands in for the hosting service.
        Command::new("git")
            .args(["init", "--bare"])
            .arg(&bare)
            .output()
            .unwrap();

        init(&work, "main").unwrap();
        fs::write(work.join("f.txt"), "x").unwrap();
        add_all(&work).unwrap();
        commit(&work, "initial content", false).unwrap();
        checkout_new_branch(&work, "feature-x").unwrap();
        commit(&work, "feature-x content", true).unwrap();

        remote_add(&work, "origin", bare.to_str().unwrap()).unwrap();
        push_all(&work, "origin").unwrap();

        let mut pushed = list_branches(&bare).unwrap();
        pushed.sort();
        assert_eq!(pushed, vec!["feature-x", "main"]);
    }
}
