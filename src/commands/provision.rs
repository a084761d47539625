//! Provision command implementation
//!
//! The provision command executes the full run:
//! 1. Load and validate the manifest and roster
//! 2. For every (participant, template) pair, probe / create / populate /
//!    configure the derived repository
//! 3. Record every outcome in the result ledger and write it to disk

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Arguments for the provision command
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Path to the workshop manifest
    #[arg(short, long, value_name = "PATH", default_value = "workshop.yaml")]
    pub manifest: PathBuf,

    /// Path to the participant roster (CSV, username first column)
    #[arg(short, long, value_name = "PATH", default_value = "roster.csv")]
    pub roster: PathBuf,

    /// Target organization on the remote host
    #[arg(long, value_name = "ORG", env = "WORKSHOPCTL_ORG")]
    pub org: Option<String>,

    /// API token for the remote host
    #[arg(long, value_name = "TOKEN", env = "WORKSHOPCTL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Root of extracted dynamic template content
    #[arg(long, value_name = "DIR", default_value = "content/dynamic")]
    pub dynamic_root: PathBuf,

    /// Root of extracted static template content
    #[arg(long, value_name = "DIR", default_value = "content/static")]
    pub static_root: PathBuf,

    /// Directory holding per-template issue blueprints
    #[arg(long, value_name = "DIR")]
    pub blueprints: Option<PathBuf>,

    /// Where the result ledger is written
    #[arg(short, long, value_name = "PATH", default_value = "workshopctl-results.json")]
    pub output: PathBuf,

    /// Scratch directory for temporary worktrees
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Version string substituted into templated files
    #[arg(long, value_name = "VERSION", default_value = "")]
    pub source_version: String,

    /// Source URL substituted into templated files
    #[arg(long, value_name = "URL", default_value = "")]
    pub source_url: String,

    /// How many participants are worked on concurrently
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub concurrent_attendees: usize,

    /// How many repositories per participant are worked on concurrently
    #[arg(long, value_name = "N", default_value_t = 2)]
    pub concurrent_repos: usize,

    /// Maximum attempts per remote operation
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub max_attempts: u32,

    /// Base delay in seconds for linear backoff on transient failures
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    pub retry_delay: u64,

    /// Pause in seconds between batches
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub batch_delay: u64,

    /// Remaining-call threshold below which work pauses until reset
    #[arg(long, value_name = "N", default_value_t = 50)]
    pub rate_buffer: u32,

    /// Show detailed progress information
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl ProvisionArgs {
    fn settings(&self) -> workshopctl::config::Settings {
        workshopctl::config::Settings {
            org: self.org.clone().unwrap_or_default(),
            token: self.token.clone().unwrap_or_default(),
            dynamic_root: self.dynamic_root.clone(),
            static_root: self.static_root.clone(),
            blueprints_dir: self.blueprints.clone(),
            scratch_dir: self
                .scratch_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("workshopctl")),
            ledger_path: self.output.clone(),
            source_version: self.source_version.clone(),
            source_url: self.source_url.clone(),
            concurrent_attendees: self.concurrent_attendees,
            concurrent_repos: self.concurrent_repos,
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_secs(self.retry_delay),
            batch_delay: Duration::from_secs(self.batch_delay),
            rate_buffer: self.rate_buffer,
            ..workshopctl::config::Settings::default()
        }
    }
}

/// Execute the provision command
pub fn execute(args: ProvisionArgs, style: workshopctl::output::OutputStyle) -> Result<()> {
    use workshopctl::batch::run_provisioning;
    use workshopctl::config::Manifest;
    use workshopctl::ledger::Ledger;
    use workshopctl::materialize::ContentMaterializer;
    use workshopctl::rate_limit::{RateBudgetTracker, ThreadSleeper};
    use workshopctl::remote::GitHubClient;
    use workshopctl::roster;
    use std::time::Instant;

    let start_time = Instant::now();

    if !args.manifest.exists() {
        anyhow::bail!("Manifest file not found: {}", args.manifest.display());
    }
    if !args.roster.exists() {
        anyhow::bail!("Roster file not found: {}", args.roster.display());
    }

    let settings = args.settings();
    settings.validate()?;

    // Print header
    if !args.quiet {
        println!("{} Workshop Provisioning", style.tag("🚀", "[RUN]"));
        println!();
    }

    if !args.quiet && args.verbose {
        println!(
            "{} Parsing manifest: {}",
            style.tag("📋", "[CFG]"),
            args.manifest.display()
        );
    }
    let manifest = Manifest::from_file(&args.manifest)?;
    let participants = roster::from_file(&args.roster)?;

    if participants.is_empty() {
        anyhow::bail!("Roster is empty: {}", args.roster.display());
    }

    let total = participants.len() * manifest.repositories.len();
    if !args.quiet {
        println!(
            "   {} participants x {} repositories = {} items",
            participants.len(),
            manifest.repositories.len(),
            total
        );
        println!();
    }

    let remote = GitHubClient::new(settings.token.clone())
        .map_err(workshopctl::error::Error::from)?;
    let budget = RateBudgetTracker::new(settings.rate_buffer);
    let materializer = ContentMaterializer::new(&settings);
    let ledger = Ledger::new();

    let quiet = args.quiet;
    let progress = |done: usize, total: usize, elapsed: Duration| {
        if !quiet {
            println!("   {}/{} items processed ({:.0}s elapsed)", done, total, elapsed.as_secs_f64());
        }
    };

    let result = run_provisioning(
        &settings,
        &manifest,
        &participants,
        &remote,
        &budget,
        &materializer,
        &ledger,
        &ThreadSleeper,
        &progress,
    );

    ledger.write_to(&settings.ledger_path, &settings.org)?;
    result?;

    let (succeeded, skipped, failed) = ledger.counts()?;
    let duration = start_time.elapsed();

    if !args.quiet {
        println!();
        println!(
            "{} Provisioned in {:.2}s",
            style.tag("✅", "[OK]"),
            duration.as_secs_f64()
        );
        println!("   {} succeeded, {} skipped, {} failed", succeeded, skipped, failed);
        println!("   Ledger written to: {}", settings.ledger_path.display());
    }

    if failed > 0 {
        if !args.quiet {
            println!();
            for (repository, reason) in ledger.failures()? {
                println!("{} {}: {}", style.tag("❌", "[ERR]"), repository, reason);
            }
        }
        anyhow::bail!("{} of {} items failed", failed, total);
    }

    Ok(())
}
