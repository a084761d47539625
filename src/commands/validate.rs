//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which checks a run's
//! inputs before any network call is made.
//!
//! ## Functionality
//!
//! - **Manifest Validation**: Parses the workshop manifest and validates
//!   its structure and contents.
//! - **Content Validation**: Verifies that each repository's main branch
//!   directory exists under the configured content root, and reports
//!   missing extra branch directories and templated files as warnings.
//! - **Roster Validation**: Parses the roster and reports the participant
//!   count.
//!
//! This command is a safe, read-only operation that does not touch the
//! remote host.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use workshopctl::config::{Manifest, Settings};
use workshopctl::output::OutputStyle;
use workshopctl::roster;

/// Validate the manifest, roster and content directories
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the workshop manifest to validate
    #[arg(short, long, value_name = "PATH", default_value = "workshop.yaml")]
    pub manifest: PathBuf,

    /// Path to the participant roster; skipped when the file is absent
    #[arg(short, long, value_name = "PATH", default_value = "roster.csv")]
    pub roster: PathBuf,

    /// Root of extracted dynamic template content
    #[arg(long, value_name = "DIR", default_value = "content/dynamic")]
    pub dynamic_root: PathBuf,

    /// Root of extracted static template content
    #[arg(long, value_name = "DIR", default_value = "content/static")]
    pub static_root: PathBuf,

    /// Use strict validation (fail on warnings)
    #[arg(long)]
    pub strict: bool,
}

/// Execute the validate command.
///
/// Reports errors for conditions that would abort a provisioning run and
/// warnings for conditions the run would absorb into the ledger.
pub fn execute(args: ValidateArgs, style: OutputStyle) -> Result<()> {
    println!(
        "{} Validating manifest: {}",
        style.tag("🔍", "[SCAN]"),
        args.manifest.display()
    );

    let manifest = match Manifest::from_file(&args.manifest) {
        Ok(manifest) => {
            println!("{} Manifest parsed successfully", style.tag("✅", "[OK]"));
            manifest
        }
        Err(e) => {
            println!("{} Manifest parsing failed: {}", style.tag("❌", "[ERR]"), e);
            anyhow::bail!("Validation failed");
        }
    };

    let settings = Settings {
        dynamic_root: args.dynamic_root.clone(),
        static_root: args.static_root.clone(),
        ..Settings::default()
    };

    let mut errors = 0usize;
    let mut warnings = 0usize;

    for (name, spec) in &manifest.repositories {
        let root = settings.content_root(spec.source);
        let main_dir = root.join(&spec.main_branch_dir);
        if !main_dir.is_dir() {
            println!(
                "{} {}: main branch directory missing: {}",
                style.tag("❌", "[ERR]"),
                name,
                main_dir.display()
            );
            errors += 1;
            continue;
        }

        for extra in &spec.extra_branch_dirs {
            let dir = root.join(extra);
            if !dir.is_dir() {
                println!(
                    "{} {}: extra branch directory missing: {}",
                    style.tag("⚠️", "[WARN]"),
                    name,
                    dir.display()
                );
                warnings += 1;
            }
        }

        for templated in &spec.templated_files {
            let path = main_dir.join(templated);
            if !path.is_file() {
                println!(
                    "{} {}: templated file missing from main branch: {}",
                    style.tag("⚠️", "[WARN]"),
                    name,
                    templated
                );
                warnings += 1;
            }
        }
    }

    if args.roster.exists() {
        match roster::from_file(&args.roster) {
            Ok(participants) => {
                if participants.is_empty() {
                    println!(
                        "{} Roster has no participants: {}",
                        style.tag("❌", "[ERR]"),
                        args.roster.display()
                    );
                    errors += 1;
                } else {
                    println!(
                        "{} Roster parsed: {} participants",
                        style.tag("✅", "[OK]"),
                        participants.len()
                    );
                }
            }
            Err(e) => {
                println!("{} Roster parsing failed: {}", style.tag("❌", "[ERR]"), e);
                errors += 1;
            }
        }
    } else {
        println!(
            "{} Roster not found, skipping: {}",
            style.tag("⚠️", "[WARN]"),
            args.roster.display()
        );
        warnings += 1;
    }

    println!();
    println!(
        "   {} repositories checked, {} errors, {} warnings",
        manifest.repositories.len(),
        errors,
        warnings
    );

    if errors > 0 {
        anyhow::bail!("Validation failed with {} errors", errors);
    }
    if args.strict && warnings > 0 {
        anyhow::bail!("Validation failed with {} warnings (strict mode)", warnings);
    }

    println!("{} Validation passed", style.tag("✅", "[OK]"));
    Ok(())
}
