//! Scheduler jobs
//!
//! Each job is one full pass for one sport: fetch fresh platform state,
//! decide, act, report. Jobs run under `run_audited`, which writes the
//! start/complete/fail audit row and raises an alert on failure.

use crate::alerts::WebhookAlerter;
use crate::config::Config;
use crate::db::Database;
use crate::errors::BotError;
use crate::fill_monitor::FillMonitor;
use crate::platform::{
    ContestCatalog, LineupGenerator, ProjectionSource, RosterConstraints, Session,
    SubmissionChannel,
};
use crate::refresh::RefreshPolicy;
use crate::selector::{ContestSelector, MIN_TRACK_SCORE};
use crate::swapper::PlayerSwapper;
use crate::types::{Contest, LifecycleRecord, Lineup, LineupStatus, ProjectionRecord};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared handles every job needs
#[derive(Clone)]
pub struct JobContext {
    pub db: Arc<Database>,
    pub catalog: Arc<dyn ContestCatalog>,
    pub projections: Arc<dyn ProjectionSource>,
    pub generator: Arc<dyn LineupGenerator>,
    pub submission: Arc<dyn SubmissionChannel>,
    pub alerter: Arc<WebhookAlerter>,
    pub config: Config,
    pub dry_run: bool,
}

/// A job report knows how many items it processed, for the audit row
pub trait JobReport {
    fn items(&self) -> i64;
}

/// Bare counts work as reports for the single-step milestone jobs
impl JobReport for i64 {
    fn items(&self) -> i64 {
        *self
    }
}

/// Run a job under audit: start row before, complete/fail row after.
/// Failures are alerted and propagated.
pub async fn run_audited<R, F, Fut>(
    ctx: &JobContext,
    job_name: &str,
    sport: Option<&str>,
    job: F,
) -> Result<R>
where
    R: JobReport,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let run_id = ctx.db.start_run(job_name, sport).await?;

    match job().await {
        Ok(report) => {
            ctx.db.complete_run(run_id, report.items()).await?;
            Ok(report)
        }
        Err(e) => {
            let message = format!("{:#}", e);
            error!("Job {} failed: {}", job_name, message);
            ctx.db.fail_run(run_id, &message).await?;
            ctx.alerter.scheduler_error(job_name, &message).await;
            Err(e)
        }
    }
}

// ==================== CONTEST SYNC ====================

#[derive(Debug, Default)]
pub struct SyncReport {
    pub total: usize,
    pub eligible: usize,
    pub new_tracked: usize,
    pub rejected: usize,
}

impl JobReport for SyncReport {
    fn items(&self) -> i64 {
        self.new_tracked as i64
    }
}

/// Discover contests, score them, and start tracking new keepers
pub struct ContestSyncJob {
    ctx: JobContext,
}

impl ContestSyncJob {
    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, sport: &str) -> Result<SyncReport> {
        let contests = self
            .ctx
            .catalog
            .list_contests(sport)
            .await
            .map_err(|e| BotError::UpstreamUnavailable(format!("contest catalog: {:#}", e)))?;

        let selector = ContestSelector::new(self.ctx.config.selector.clone());
        let total = contests.len();
        let scored = selector.score_contests(contests, MIN_TRACK_SCORE);

        let mut report = SyncReport {
            total,
            eligible: scored.len(),
            ..Default::default()
        };

        for entry in &scored {
            let contest = &entry.contest;

            // A contest without a lock time cannot be scheduled against
            if contest.lock_time.is_none() {
                warn!(
                    "Contest {} ({}) has no lock time, rejecting",
                    contest.id,
                    contest.short_name(40)
                );
                report.rejected += 1;
                report.eligible -= 1;
                continue;
            }

            if self.ctx.db.get_record(&contest.id).await?.is_some() {
                self.ctx.db.touch_record(&contest.id).await?;
                continue;
            }

            if self.ctx.dry_run {
                info!(
                    "[DRY RUN] Would track {} (score {}): {}",
                    contest.id,
                    entry.score,
                    contest.short_name(40)
                );
                report.new_tracked += 1;
                continue;
            }

            if self.ctx.db.insert_record(contest).await? {
                info!(
                    "Tracking contest {} (score {}): {}",
                    contest.id,
                    entry.score,
                    contest.short_name(40)
                );
                report.new_tracked += 1;
            }
        }

        info!(
            "Sync {}: {} contests, {} eligible, {} new, {} rejected",
            sport, report.total, report.eligible, report.new_tracked, report.rejected
        );
        self.ctx
            .alerter
            .contests_synced(sport, report.total, report.eligible, report.new_tracked)
            .await;

        Ok(report)
    }
}

// ==================== PROJECTION SYNC ====================

#[derive(Debug, Default)]
pub struct ProjectionReport {
    pub refreshed: bool,
    pub fetched: usize,
    pub players_updated: u64,
    pub reason: String,
}

impl JobReport for ProjectionReport {
    fn items(&self) -> i64 {
        self.players_updated as i64
    }
}

/// Fetch projections when the adaptive policy says they are stale, and fold
/// them onto every active contest's player pool. Projection state is data
/// truth, so this job runs the same under dry-run.
pub struct ProjectionSyncJob {
    ctx: JobContext,
}

impl ProjectionSyncJob {
    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, sport: &str, force: bool) -> Result<ProjectionReport> {
        let now = Utc::now();
        let policy = RefreshPolicy::new(self.ctx.config.refresh.clone());

        let soonest = self.ctx.db.soonest_lock(sport, now).await?;
        let last = self.ctx.db.latest_projection_fetch(sport).await?;

        let decision = policy.should_refresh(soonest, last, force, now);
        if !decision.refresh {
            debug!("Projection refresh skipped for {}: {}", sport, decision.reason);
            return Ok(ProjectionReport {
                refreshed: false,
                reason: decision.reason,
                ..Default::default()
            });
        }
        info!("Refreshing projections for {}: {}", sport, decision.reason);

        let rows = self
            .ctx
            .projections
            .fetch(sport)
            .await
            .map_err(|e| BotError::UpstreamUnavailable(format!("projection source: {:#}", e)))?;

        let records = self.ctx.db.active_records(sport, now).await?;
        let fetched_at = Utc::now();
        let source = self.ctx.projections.name().to_string();

        let mut players_updated = 0;
        for record in &records {
            for row in &rows {
                self.ctx
                    .db
                    .upsert_projection(&ProjectionRecord {
                        contest_id: record.contest_id.clone(),
                        source: source.clone(),
                        player_name: row.player_name.clone(),
                        team: row.team.clone(),
                        position: row.position.clone(),
                        projected_points: row.projected_points,
                        floor: row.floor,
                        ceiling: row.ceiling,
                        fetched_at,
                    })
                    .await?;
            }
            players_updated += self
                .ctx
                .db
                .apply_projections(&record.contest_id, &source)
                .await?;
        }

        info!(
            "Projections {}: {} rows fetched, {} pool players updated across {} contests",
            sport,
            rows.len(),
            players_updated,
            records.len()
        );

        Ok(ProjectionReport {
            refreshed: true,
            fetched: rows.len(),
            players_updated,
            reason: decision.reason,
        })
    }
}

// ==================== SUBMISSION ====================

#[derive(Debug, Default)]
pub struct SubmissionReport {
    pub checked: usize,
    pub submitted: usize,
    pub lineups_entered: i64,
    pub swept_locked: u64,
    pub swept_skipped: u64,
}

impl JobReport for SubmissionReport {
    fn items(&self) -> i64 {
        self.submitted as i64
    }
}

/// Check fill rates on awaiting contests and submit the ones whose time has
/// come. One contest failing never blocks the rest of the pass.
pub struct SubmissionJob {
    ctx: JobContext,
}

impl SubmissionJob {
    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, sport: &str) -> Result<SubmissionReport> {
        let now = Utc::now();
        let mut report = SubmissionReport::default();

        if !self.ctx.dry_run {
            let (locked, skipped) = self.ctx.db.sweep_past_lock(now).await?;
            report.swept_locked = locked;
            report.swept_skipped = skipped;
        }

        let records = self.ctx.db.records_awaiting_submission(sport, now).await?;
        if records.is_empty() {
            debug!("No contests awaiting submission for {}", sport);
            return Ok(report);
        }

        // One fresh snapshot for the whole pass
        let contests: HashMap<String, Contest> = self
            .ctx
            .catalog
            .list_contests(sport)
            .await
            .map_err(|e| BotError::UpstreamUnavailable(format!("contest catalog: {:#}", e)))?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let monitor = FillMonitor::new(self.ctx.config.fill.clone());
        let mut session: Option<Session> = None;

        for record in &records {
            report.checked += 1;

            let contest = match contests.get(&record.contest_id) {
                Some(c) => c,
                None => {
                    warn!("Contest {} no longer listed by the platform", record.contest_id);
                    continue;
                }
            };

            let decision = monitor.decide(contest, record, now);
            debug!("Contest {}: {}", record.contest_id, decision.reason);
            if !decision.should_submit {
                self.ctx.db.touch_record(&record.contest_id).await?;
                continue;
            }
            info!("Submitting contest {}: {}", record.contest_id, decision.reason);

            match self
                .submit_contest(sport, record, decision.fill_rate, &mut session)
                .await
            {
                Ok(entered) => {
                    report.submitted += 1;
                    report.lineups_entered += entered;
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    error!("Submission to {} failed: {}", record.contest_id, message);
                    self.ctx
                        .alerter
                        .submission_failure(&record.contest_id, &message)
                        .await;
                }
            }
        }

        Ok(report)
    }

    /// Submit one contest's lineups. Returns the number entered.
    async fn submit_contest(
        &self,
        sport: &str,
        record: &LifecycleRecord,
        fill_rate: f64,
        session: &mut Option<Session>,
    ) -> Result<i64> {
        // Pool and generated lineups are data truth like projections and
        // persist under dry-run; a later live pass reuses them. Only the
        // entry itself is withheld below.
        ensure_pool(&self.ctx, sport, &record.contest_id).await?;
        ensure_lineups(&self.ctx, sport, record).await?;

        let mut lineups = self
            .ctx
            .db
            .get_lineups(&record.contest_id, Some(LineupStatus::Generated))
            .await?;

        let cap = record
            .max_entries_allowed
            .min(self.ctx.config.max_lineups_per_contest) as usize;
        lineups.truncate(cap);

        if lineups.is_empty() {
            return Err(BotError::DataIntegrity(format!(
                "No lineups available for contest {}",
                record.contest_id
            ))
            .into());
        }

        if self.ctx.dry_run {
            info!(
                "[DRY RUN] Would submit {} lineups to {} at {:.1}% fill",
                lineups.len(),
                record.contest_id,
                fill_rate * 100.0
            );
            return Ok(lineups.len() as i64);
        }

        self.ctx.db.mark_pending(&record.contest_id).await?;

        if session.is_none() {
            *session = Some(self.ctx.submission.authenticate().await?);
        }
        let session_ref = match session.as_ref() {
            Some(s) => s,
            None => return Err(BotError::Configuration("No platform session".to_string()).into()),
        };

        let results = self
            .ctx
            .submission
            .submit(session_ref, record, &lineups)
            .await?;

        let mut entered = 0;
        for result in &results {
            if result.ok {
                if let Some(entry_id) = &result.entry_id {
                    self.ctx.db.set_lineup_entry(result.lineup_id, entry_id).await?;
                }
                entered += 1;
            } else {
                warn!(
                    "Entry rejected for lineup {} in {}: {}",
                    result.lineup_id,
                    record.contest_id,
                    result.error.as_deref().unwrap_or("unknown")
                );
            }
        }

        if entered == 0 {
            // Record stays pending for the next pass to retry
            return Err(BotError::SubmissionRejected(format!(
                "All {} entries rejected for contest {}",
                results.len(),
                record.contest_id
            ))
            .into());
        }

        self.ctx
            .db
            .mark_submitted(&record.contest_id, entered, fill_rate)
            .await?;
        self.ctx
            .alerter
            .submission_success(&record.contest_id, entered, fill_rate)
            .await;

        Ok(entered)
    }
}

// ==================== INJURY MONITOR ====================

#[derive(Debug, Default)]
pub struct InjuryReport {
    pub contests_checked: usize,
    pub swaps_attempted: usize,
    pub swaps_succeeded: usize,
    pub lineups_reuploaded: usize,
}

impl JobReport for InjuryReport {
    fn items(&self) -> i64 {
        self.swaps_succeeded as i64
    }
}

/// Watch submitted contests for ruled-out players, swap them, and re-upload
/// the edited lineups. A failed re-upload never rolls the swap back; the
/// stored lineup is the intended truth and the next pass retries the upload.
pub struct InjuryMonitorJob {
    ctx: JobContext,
}

impl InjuryMonitorJob {
    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, sport: &str) -> Result<InjuryReport> {
        let now = Utc::now();
        let monitor = FillMonitor::new(self.ctx.config.fill.clone());

        let records: Vec<LifecycleRecord> = self
            .ctx
            .db
            .submitted_records(sport)
            .await?
            .into_iter()
            .filter(|r| monitor.can_still_edit(r, now))
            .collect();

        let mut report = InjuryReport::default();
        if records.is_empty() {
            debug!("No editable submitted contests for {}", sport);
            return Ok(report);
        }

        let pools = futures::future::join_all(records.iter().map(|record| {
            let catalog = Arc::clone(&self.ctx.catalog);
            let contest_id = record.contest_id.clone();
            let sport = sport.to_string();
            async move { catalog.fetch_player_pool(&sport, &contest_id).await }
        }))
        .await;

        let mut session: Option<Session> = None;

        for (record, pool) in records.iter().zip(pools) {
            report.contests_checked += 1;

            let pool = match pool {
                Ok(p) => p,
                Err(e) => {
                    warn!(
                        "Player pool fetch failed for {}: {:#}",
                        record.contest_id, e
                    );
                    continue;
                }
            };

            // Pool updates are data truth, applied under dry-run too
            for player in &pool {
                self.ctx.db.upsert_pool_entry(player).await?;
            }

            let swapper = PlayerSwapper::new(Arc::clone(&self.ctx.db), self.ctx.dry_run);
            let outcomes = swapper.process_contest(&record.contest_id).await?;
            if outcomes.is_empty() {
                continue;
            }

            report.swaps_attempted += outcomes.len();
            report.swaps_succeeded += outcomes.iter().filter(|o| o.success).count();
            self.ctx
                .alerter
                .swaps_performed(&record.contest_id, &outcomes)
                .await;

            if self.ctx.dry_run || !outcomes.iter().any(|o| o.success) {
                continue;
            }

            match self.reupload(record, &mut session).await {
                Ok(count) => report.lineups_reuploaded += count,
                Err(e) => {
                    let message = format!("{:#}", e);
                    error!(
                        "Re-upload failed for {} (swaps kept): {}",
                        record.contest_id, message
                    );
                    self.ctx
                        .alerter
                        .submission_failure(&record.contest_id, &message)
                        .await;
                }
            }
        }

        Ok(report)
    }

    /// Push swapped lineups back to the platform as full-replace edits
    async fn reupload(
        &self,
        record: &LifecycleRecord,
        session: &mut Option<Session>,
    ) -> Result<usize> {
        let swapped: Vec<Lineup> = self
            .ctx
            .db
            .swapped_lineups(&record.contest_id)
            .await?
            .into_iter()
            .filter(|l| l.entry_id.is_some())
            .collect();

        if swapped.is_empty() {
            return Ok(0);
        }

        if session.is_none() {
            *session = Some(self.ctx.submission.authenticate().await?);
        }
        let session_ref = match session.as_ref() {
            Some(s) => s,
            None => return Err(BotError::Configuration("No platform session".to_string()).into()),
        };

        let results = self.ctx.submission.edit(session_ref, record, &swapped).await?;

        let mut uploaded = 0;
        for result in &results {
            if result.ok {
                self.ctx
                    .db
                    .set_lineup_status(result.lineup_id, LineupStatus::Edited)
                    .await?;
                uploaded += 1;
            } else {
                warn!(
                    "Edit rejected for lineup {} in {}: {}",
                    result.lineup_id,
                    record.contest_id,
                    result.error.as_deref().unwrap_or("unknown")
                );
            }
        }

        info!(
            "Re-uploaded {}/{} swapped lineups for {}",
            uploaded,
            swapped.len(),
            record.contest_id
        );
        Ok(uploaded)
    }
}

// ==================== SHARED HELPERS ====================

/// Fetch and store the player pool for a contest if it is not stored yet
pub async fn ensure_pool(ctx: &JobContext, sport: &str, contest_id: &str) -> Result<i64> {
    let existing = ctx.db.pool_size(contest_id).await?;
    if existing > 0 {
        return Ok(existing);
    }
    refresh_pool(ctx, sport, contest_id).await
}

/// Fetch and store the player pool for a contest unconditionally
pub async fn refresh_pool(ctx: &JobContext, sport: &str, contest_id: &str) -> Result<i64> {
    let pool = ctx
        .catalog
        .fetch_player_pool(sport, contest_id)
        .await
        .map_err(|e| BotError::UpstreamUnavailable(format!("player pool: {:#}", e)))?;

    if pool.is_empty() {
        return Err(BotError::DataIntegrity(format!(
            "Empty player pool for contest {}",
            contest_id
        ))
        .into());
    }

    for player in &pool {
        ctx.db.upsert_pool_entry(player).await?;
    }
    info!("Stored {} pool players for {}", pool.len(), contest_id);
    Ok(pool.len() as i64)
}

/// Generate and store lineups for a contest if none exist yet.
/// Returns the number of stored lineups afterwards.
pub async fn ensure_lineups(
    ctx: &JobContext,
    sport: &str,
    record: &LifecycleRecord,
) -> Result<usize> {
    let existing = ctx.db.get_lineups(&record.contest_id, None).await?;
    if !existing.is_empty() {
        return Ok(existing.len());
    }

    let pool = ctx.db.get_pool(&record.contest_id).await?;
    let constraints = RosterConstraints {
        slots: ctx.config.roster_slots(sport),
        salary_cap: record.salary_cap,
    };
    let count = record
        .max_entries_allowed
        .min(ctx.config.max_lineups_per_contest) as usize;

    let lineups = ctx.generator.generate(&pool, &constraints, count)?;
    if lineups.is_empty() {
        return Err(BotError::DataIntegrity(format!(
            "Lineup generation produced nothing for contest {}",
            record.contest_id
        ))
        .into());
    }

    let stored = ctx.db.insert_lineups(&lineups).await?;
    info!("Generated {} lineups for {}", stored, record.contest_id);
    Ok(stored as usize)
}
