//! Teardown command implementation
//!
//! Discovers repositories previously provisioned for roster participants
//! and, once explicitly confirmed, deletes them. Preview mode only lists
//! what would be deleted and never calls the delete endpoint.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use workshopctl::teardown::CONFIRM_TOKEN;

/// Arguments for the teardown command
#[derive(Args, Debug)]
pub struct TeardownArgs {
    /// Path to the participant roster (CSV, username first column)
    #[arg(short, long, value_name = "PATH", default_value = "roster.csv")]
    pub roster: PathBuf,

    /// Target organization on the remote host
    #[arg(long, value_name = "ORG", env = "WORKSHOPCTL_ORG")]
    pub org: Option<String>,

    /// API token for the remote host
    #[arg(long, value_name = "TOKEN", env = "WORKSHOPCTL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// List matching repositories without deleting anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Confirmation token; without it the command prompts interactively
    #[arg(long, value_name = "TOKEN")]
    pub confirm: Option<String>,

    /// How many deletions run concurrently
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub concurrent_attendees: usize,

    /// Maximum attempts per remote operation
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub max_attempts: u32,

    /// Base delay in seconds for linear backoff on transient failures
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    pub retry_delay: u64,

    /// Pause in seconds between deletion batches
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub batch_delay: u64,

    /// Remaining-call threshold below which work pauses until reset
    #[arg(long, value_name = "N", default_value_t = 50)]
    pub rate_buffer: u32,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl TeardownArgs {
    fn settings(&self) -> workshopctl::config::Settings {
        workshopctl::config::Settings {
            org: self.org.clone().unwrap_or_default(),
            token: self.token.clone().unwrap_or_default(),
            concurrent_attendees: self.concurrent_attendees,
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_secs(self.retry_delay),
            batch_delay: Duration::from_secs(self.batch_delay),
            rate_buffer: self.rate_buffer,
            ..workshopctl::config::Settings::default()
        }
    }
}

/// Execute the teardown command
pub fn execute(args: TeardownArgs, style: workshopctl::output::OutputStyle) -> Result<()> {
    use workshopctl::rate_limit::{RateBudgetTracker, ThreadSleeper};
    use workshopctl::remote::GitHubClient;
    use workshopctl::roster;
    use workshopctl::teardown::{discover, run_teardown, Confirmation};
    use std::time::Instant;

    let start_time = Instant::now();

    if !args.roster.exists() {
        anyhow::bail!("Roster file not found: {}", args.roster.display());
    }

    let settings = args.settings();
    settings.validate()?;

    if !args.quiet {
        println!("{} Workshop Teardown", style.tag("🧹", "[RUN]"));
        println!();
        if args.dry_run {
            println!("{} DRY RUN MODE - No repositories will be deleted", style.tag("🔎", "[DRY]"));
            println!();
        }
    }

    let participants = roster::from_file(&args.roster)?;
    if participants.is_empty() {
        anyhow::bail!("Roster is empty: {}", args.roster.display());
    }

    let remote = GitHubClient::new(settings.token.clone())
        .map_err(workshopctl::error::Error::from)?;
    let budget = RateBudgetTracker::new(settings.rate_buffer);

    let discovered = discover(&remote, &settings.org, &participants)?;
    if !args.quiet {
        println!("   {} repositories match the roster:", discovered.len());
        for name in &discovered {
            println!("   - {}", name);
        }
        println!();
    }

    if args.dry_run || discovered.is_empty() {
        if !args.quiet {
            println!("{} Nothing deleted", style.tag("✅", "[OK]"));
        }
        return Ok(());
    }

    let token = match args.confirm {
        Some(token) => token,
        None => dialoguer::Input::<String>::new()
            .with_prompt(format!(
                "Type {} to delete all {} repositories",
                CONFIRM_TOKEN,
                discovered.len()
            ))
            .allow_empty(true)
            .interact_text()?,
    };

    let report = run_teardown(
        &settings,
        &participants,
        &remote,
        &budget,
        &ThreadSleeper,
        Confirmation::Token(token),
    )?;

    let duration = start_time.elapsed();
    if !args.quiet {
        println!();
        println!(
            "{} Teardown finished in {:.2}s",
            style.tag("✅", "[OK]"),
            duration.as_secs_f64()
        );
        println!(
            "   {} deleted, {} already gone, {} failed",
            report.deleted.len(),
            report.not_found.len(),
            report.failed.len()
        );
    }

    if !report.failed.is_empty() {
        if !args.quiet {
            println!();
            for (name, reason) in &report.failed {
                println!("{} {}: {}", style.tag("❌", "[ERR]"), name, reason);
            }
        }
        anyhow::bail!("{} deletions failed", report.failed.len());
    }

    Ok(())
}
