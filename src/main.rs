//! DFS Contest Bot CLI
//!
//! Automated entry engine for daily fantasy pay-to-play contests.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use dfs_contest_bot::alerts::WebhookAlerter;
use dfs_contest_bot::platform::{
    GreedyLineupBuilder, HttpCatalogClient, HttpProjectionSource, HttpSubmissionChannel,
};
use dfs_contest_bot::scheduler::jobs::{
    ensure_lineups, ensure_pool, run_audited, ContestSyncJob, InjuryMonitorJob, JobContext,
    ProjectionSyncJob, SubmissionJob,
};
use dfs_contest_bot::scheduler::Scheduler;
use dfs_contest_bot::types::ContestState;
use dfs_contest_bot::{Config, Database};
use std::sync::Arc;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "dfs-contest-bot")]
#[command(about = "Automated entry engine for daily fantasy contests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log decisions but perform no submissions or state changes
    #[arg(long, global = true)]
    dry_run: bool,

    /// Limit to one sport (defaults to all configured sports)
    #[arg(short, long, global = true)]
    sport: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, score, and start tracking contests
    Sync,

    /// Refresh projections if the adaptive policy says they are stale
    Projections {
        /// Refresh even if the interval has not elapsed
        #[arg(short, long)]
        force: bool,
    },

    /// Check fill rates and submit lineups whose time has come
    Submit,

    /// Scan submitted contests for ruled-out players and swap them
    Injuries,

    /// Generate lineups for one tracked contest
    Generate {
        /// Contest id to generate for
        contest_id: String,
    },

    /// Run the scheduler continuously
    Run,

    /// Show tracked contests and recent job runs
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let ctx = build_context(&config, cli.dry_run).await?;
    let sports = sports_for(&config, cli.sport.as_deref());

    match cli.command {
        Commands::Sync => {
            for sport in &sports {
                let report = run_audited(&ctx, "contest_sync", Some(sport.as_str()), || async {
                    ContestSyncJob::new(ctx.clone()).run(sport).await
                })
                .await?;
                println!(
                    "{}: {} contests, {} eligible, {} newly tracked, {} rejected",
                    sport.to_uppercase(),
                    report.total,
                    report.eligible,
                    report.new_tracked,
                    report.rejected
                );
            }
        }
        Commands::Projections { force } => {
            for sport in &sports {
                let report = run_audited(&ctx, "projection_sync", Some(sport.as_str()), || async {
                    ProjectionSyncJob::new(ctx.clone()).run(sport, force).await
                })
                .await?;
                if report.refreshed {
                    println!(
                        "{}: {} projections fetched, {} pool players updated",
                        sport.to_uppercase(),
                        report.fetched,
                        report.players_updated
                    );
                } else {
                    println!("{}: skipped ({})", sport.to_uppercase(), report.reason);
                }
            }
        }
        Commands::Submit => {
            for sport in &sports {
                let report = run_audited(&ctx, "submission", Some(sport.as_str()), || async {
                    SubmissionJob::new(ctx.clone()).run(sport).await
                })
                .await?;
                println!(
                    "{}: {} checked, {} submitted ({} lineups)",
                    sport.to_uppercase(),
                    report.checked,
                    report.submitted,
                    report.lineups_entered
                );
            }
        }
        Commands::Injuries => {
            for sport in &sports {
                let report = run_audited(&ctx, "injury_monitor", Some(sport.as_str()), || async {
                    InjuryMonitorJob::new(ctx.clone()).run(sport).await
                })
                .await?;
                println!(
                    "{}: {} contests checked, {}/{} swaps, {} lineups re-uploaded",
                    sport.to_uppercase(),
                    report.contests_checked,
                    report.swaps_succeeded,
                    report.swaps_attempted,
                    report.lineups_reuploaded
                );
            }
        }
        Commands::Generate { contest_id } => {
            generate_lineups(&ctx, &sports, &contest_id).await?;
        }
        Commands::Run => {
            run_scheduler(ctx).await?;
        }
        Commands::Status => {
            show_status(&ctx, cli.sport.as_deref()).await?;
        }
    }

    Ok(())
}

async fn build_context(config: &Config, dry_run: bool) -> Result<JobContext> {
    if !dry_run && !config.has_credentials() {
        warn!("No platform credentials configured; live submission will fail");
    }

    Ok(JobContext {
        db: Arc::new(Database::new(&config.database_path).await?),
        catalog: Arc::new(HttpCatalogClient::new(&config.catalog_base_url)?),
        projections: Arc::new(HttpProjectionSource::new(&config.projection_base_url)?),
        generator: Arc::new(GreedyLineupBuilder::new()),
        submission: Arc::new(HttpSubmissionChannel::new(
            &config.submission_base_url,
            config.platform_username.clone(),
            config.platform_password.clone(),
        )?),
        alerter: Arc::new(WebhookAlerter::new(config.alert_webhook_url.clone())),
        config: config.clone(),
        dry_run,
    })
}

fn sports_for(config: &Config, requested: Option<&str>) -> Vec<String> {
    match requested {
        Some(s) => vec![s.to_lowercase()],
        None => config.sports.clone(),
    }
}

async fn generate_lineups(ctx: &JobContext, sports: &[String], contest_id: &str) -> Result<()> {
    let record = match ctx.db.get_record(contest_id).await? {
        Some(r) => r,
        None => {
            anyhow::bail!("Contest {} is not tracked; run sync first", contest_id);
        }
    };
    if record.state.is_terminal() {
        anyhow::bail!("Contest {} is already {}", contest_id, record.state);
    }
    if !sports.contains(&record.sport) {
        anyhow::bail!("Contest {} is a {} contest", contest_id, record.sport);
    }

    let sport = record.sport.clone();
    let count = run_audited(ctx, "generate_lineups", Some(sport.as_str()), || async {
        ensure_pool(ctx, &sport, contest_id).await?;
        let count = ensure_lineups(ctx, &sport, &record).await?;
        Ok(count as i64)
    })
    .await?;

    let lineups = ctx.db.get_lineups(contest_id, None).await?;
    println!("\nContest {}: {} lineups stored ({} this run)", contest_id, lineups.len(), count);
    for lineup in lineups.iter().take(5) {
        println!(
            "  #{}: ${} salary, {:.1} projected pts",
            lineup.id, lineup.total_salary, lineup.projected_points
        );
    }
    if lineups.len() > 5 {
        println!("  ... and {} more", lineups.len() - 5);
    }

    Ok(())
}

async fn run_scheduler(ctx: JobContext) -> Result<()> {
    println!("\n{}", "=".repeat(70));
    println!("  DFS CONTEST BOT");
    println!(
        "  Sports: {} | Mode: {}",
        ctx.config.sports.join(", ").to_uppercase(),
        if ctx.dry_run { "DRY RUN" } else { "LIVE" }
    );
    if ctx.config.alert_webhook_url.is_some() {
        println!("  Alert Webhook: ENABLED");
    }
    println!("{}\n", "=".repeat(70));

    println!("Starting scheduler (Ctrl+C to stop)...\n");
    Scheduler::new(ctx).run().await
}

async fn show_status(ctx: &JobContext, sport: Option<&str>) -> Result<()> {
    let now = Utc::now();
    let records = ctx.db.all_records(sport).await?;

    println!("\n{}", "=".repeat(70));
    println!("  TRACKED CONTESTS");
    println!("{}\n", "=".repeat(70));

    if records.is_empty() {
        println!("No tracked contests. Run sync first.\n");
    }

    for record in &records {
        let state = match record.state {
            ContestState::Eligible => "eligible ".cyan(),
            ContestState::Pending => "pending  ".yellow(),
            ContestState::Submitted => "submitted".green(),
            ContestState::Locked => "locked   ".dimmed(),
            ContestState::Skipped => "skipped  ".red(),
        };

        let detail = match record.state {
            ContestState::Submitted => format!(
                "{} lineups at {:.0}% fill",
                record.lineups_submitted,
                record.fill_rate_at_submit.unwrap_or(0.0) * 100.0
            ),
            ContestState::Skipped => record
                .skip_reason
                .clone()
                .unwrap_or_else(|| "no reason recorded".to_string()),
            _ => format!("locks in {}", record.time_display(now)),
        };

        println!(
            "  {} {} [{}] {}",
            state,
            record.contest_id,
            record.sport.to_uppercase(),
            detail
        );
    }

    let runs = ctx.db.recent_runs(10).await?;
    if !runs.is_empty() {
        println!("\n{}", "-".repeat(70));
        println!("  RECENT JOBS");
        println!("{}\n", "-".repeat(70));

        for run in &runs {
            let status = match run.status {
                dfs_contest_bot::types::RunStatus::Completed => "ok  ".green(),
                dfs_contest_bot::types::RunStatus::Failed => "fail".red(),
                dfs_contest_bot::types::RunStatus::Started => "... ".yellow(),
            };
            let duration = run
                .duration_seconds
                .map(|d| format!("{:.1}s", d))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {} {:<24} {:<5} items={:<4} {} {}",
                status,
                run.job_name,
                run.sport.as_deref().unwrap_or("-"),
                run.items_processed,
                duration,
                run.error_message.as_deref().unwrap_or("")
            );
        }
    }

    println!();
    Ok(())
}
