//! Job orchestration
//!
//! Three trigger classes drive the jobs: sport calendar slots for contest
//! discovery, fixed intervals for the monitoring passes, and per-contest
//! one-shot milestones anchored to lock time. A job kind that is still
//! running when its next trigger fires is skipped, not queued.

pub mod jobs;

use crate::config::SchedulerConfig;
use crate::scheduler::jobs::{
    ensure_lineups, ensure_pool, refresh_pool, run_audited, ContestSyncJob, InjuryMonitorJob,
    JobContext, ProjectionSyncJob, SubmissionJob,
};
use anyhow::Result;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Timelike, Utc, Weekday};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const TICK_SECONDS: u64 = 30;

/// Per-contest one-shot milestones, anchored to lock time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    PlayerPool,
    Projections,
    GenerateLineups,
    Submit,
    FinalEdit,
}

impl Milestone {
    pub const ALL: [Milestone; 5] = [
        Milestone::PlayerPool,
        Milestone::Projections,
        Milestone::GenerateLineups,
        Milestone::Submit,
        Milestone::FinalEdit,
    ];

    pub fn job_name(&self) -> &'static str {
        match self {
            Milestone::PlayerPool => "milestone_player_pool",
            Milestone::Projections => "milestone_projections",
            Milestone::GenerateLineups => "milestone_generate_lineups",
            Milestone::Submit => "milestone_submit",
            Milestone::FinalEdit => "milestone_final_edit",
        }
    }

    /// How long before lock this milestone fires
    pub fn offset(&self, config: &SchedulerConfig) -> ChronoDuration {
        match self {
            Milestone::PlayerPool => {
                ChronoDuration::minutes((config.fetch_pool_hours_before * 60.0) as i64)
            }
            Milestone::Projections => {
                ChronoDuration::minutes((config.projections_hours_before * 60.0) as i64)
            }
            Milestone::GenerateLineups => {
                ChronoDuration::minutes((config.generate_hours_before * 60.0) as i64)
            }
            Milestone::Submit => {
                ChronoDuration::minutes((config.submit_hours_before * 60.0) as i64)
            }
            Milestone::FinalEdit => ChronoDuration::minutes(config.final_edit_minutes_before),
        }
    }
}

/// Identity of one registered one-shot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OneShotKey {
    sport: String,
    contest_id: String,
    milestone: Milestone,
}

/// Weekly contest-discovery slots for a sport. NFL slates cluster around
/// its game days; other sports get a daily morning scan.
fn calendar_slots(sport: &str) -> Vec<(Option<Weekday>, u32, u32)> {
    match sport {
        "nfl" => vec![
            (Some(Weekday::Tue), 10, 0),
            (Some(Weekday::Thu), 17, 0),
            (Some(Weekday::Sun), 9, 0),
            (Some(Weekday::Sun), 17, 0),
            (Some(Weekday::Mon), 17, 0),
        ],
        _ => vec![(None, 10, 0)],
    }
}

/// Returns a slot id when a calendar slot for the sport matches this minute
fn due_calendar_slot(sport: &str, now: DateTime<Utc>) -> Option<String> {
    for (weekday, hour, minute) in calendar_slots(sport) {
        let day_matches = weekday.map(|wd| now.weekday() == wd).unwrap_or(true);
        if day_matches && now.hour() == hour && now.minute() == minute {
            return Some(format!("{}-{:02}:{:02}", now.date_naive(), hour, minute));
        }
    }
    None
}

pub struct Scheduler {
    ctx: JobContext,
    /// One-shots waiting to fire, with their fire time
    registered: Mutex<HashMap<OneShotKey, DateTime<Utc>>>,
    /// One-shots that already fired; never re-registered
    fired: Mutex<HashSet<OneShotKey>>,
    /// Job-kind/sport pairs currently executing; duplicates are skipped
    running: Mutex<HashSet<String>>,
    /// Last calendar slot id fired per sport
    last_calendar: Mutex<HashMap<String, String>>,
    /// Last start time per interval job
    last_interval: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Scheduler {
    pub fn new(ctx: JobContext) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            registered: Mutex::new(HashMap::new()),
            fired: Mutex::new(HashSet::new()),
            running: Mutex::new(HashSet::new()),
            last_calendar: Mutex::new(HashMap::new()),
            last_interval: Mutex::new(HashMap::new()),
        })
    }

    /// Run until interrupted
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let sports = self.ctx.config.sports.clone();
        info!(
            "Scheduler starting for [{}]{}",
            sports.join(", "),
            if self.ctx.dry_run { " (dry run)" } else { "" }
        );
        self.ctx
            .alerter
            .scheduler_started(&sports, self.ctx.dry_run)
            .await;

        // Initial discovery pass so a restart never waits for a calendar slot
        for sport in &sports {
            self.run_sync(sport).await;
        }

        let mut tick = tokio::time::interval(Duration::from_secs(TICK_SECONDS));
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = tick.tick() => {
                    self.on_tick(Utc::now()).await;
                }
            }
        }

        self.ctx.alerter.scheduler_stopped("Shutdown signal").await;
        Ok(())
    }

    async fn on_tick(self: &Arc<Self>, now: DateTime<Utc>) {
        let sports = self.ctx.config.sports.clone();
        let config = self.ctx.config.scheduler.clone();

        for sport in &sports {
            if let Some(slot) = due_calendar_slot(sport, now) {
                let mut last = self.last_calendar.lock().await;
                if last.get(sport) != Some(&slot) {
                    last.insert(sport.clone(), slot.clone());
                    drop(last);
                    info!("Calendar slot {} for {}", slot, sport);
                    let scheduler = Arc::clone(self);
                    let sport = sport.clone();
                    tokio::spawn(async move { scheduler.run_sync(&sport).await });
                }
            }

            self.spawn_if_due("projection_sync", sport, config.projection_tick_minutes, now)
                .await;
            self.spawn_if_due("submission", sport, config.submission_tick_minutes, now)
                .await;
            self.spawn_if_due("injury_monitor", sport, config.injury_tick_minutes, now)
                .await;
        }

        self.fire_due_milestones(now).await;
    }

    /// Spawn an interval job when its cadence has elapsed
    async fn spawn_if_due(
        self: &Arc<Self>,
        job_name: &'static str,
        sport: &str,
        interval_minutes: u64,
        now: DateTime<Utc>,
    ) {
        let key = format!("{}:{}", job_name, sport);
        {
            let mut last = self.last_interval.lock().await;
            let due = last
                .get(&key)
                .map(|t| now - *t >= ChronoDuration::minutes(interval_minutes as i64))
                .unwrap_or(true);
            if !due {
                return;
            }
            last.insert(key, now);
        }

        let scheduler = Arc::clone(self);
        let sport = sport.to_string();
        tokio::spawn(async move {
            scheduler.run_exclusive(job_name, &sport, None).await;
        });
    }

    /// Move due one-shots to fired and spawn them. The registry mutation
    /// happens before the spawn, so each key fires at most once.
    async fn fire_due_milestones(self: &Arc<Self>, now: DateTime<Utc>) {
        let due: Vec<OneShotKey> = {
            let mut registered = self.registered.lock().await;
            let keys: Vec<OneShotKey> = registered
                .iter()
                .filter(|(_, fire_at)| now >= **fire_at)
                .map(|(k, _)| k.clone())
                .collect();
            for key in &keys {
                registered.remove(key);
            }
            keys
        };
        if due.is_empty() {
            return;
        }

        let mut fired = self.fired.lock().await;
        for key in &due {
            fired.insert(key.clone());
        }
        drop(fired);

        for key in due {
            info!(
                "Milestone {} due for contest {} ({})",
                key.milestone.job_name(),
                key.contest_id,
                key.sport
            );
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler
                    .run_exclusive(
                        key.milestone.job_name(),
                        &key.sport,
                        Some((key.milestone, key.contest_id)),
                    )
                    .await;
            });
        }
    }

    /// Run the discovery job, then register milestones for what it tracks
    async fn run_sync(self: &Arc<Self>, sport: &str) {
        self.run_exclusive("contest_sync", sport, None).await;
        if let Err(e) = self.register_milestones(sport).await {
            warn!("Milestone registration failed for {}: {:#}", sport, e);
        }
    }

    /// Register the pre-lock one-shots for every active tracked contest.
    /// Already-registered and already-fired keys are left alone.
    async fn register_milestones(&self, sport: &str) -> Result<()> {
        let now = Utc::now();
        let records = self.ctx.db.active_records(sport, now).await?;
        let config = &self.ctx.config.scheduler;

        let mut registered = self.registered.lock().await;
        let fired = self.fired.lock().await;

        let mut added = 0;
        for record in &records {
            for milestone in Milestone::ALL {
                // A fire time already in the past fires on the next tick;
                // catching up beats silently missing the step
                let fire_at = record.lock_time - milestone.offset(config);
                let key = OneShotKey {
                    sport: sport.to_string(),
                    contest_id: record.contest_id.clone(),
                    milestone,
                };
                if fired.contains(&key) || registered.contains_key(&key) {
                    continue;
                }
                registered.insert(key, fire_at);
                added += 1;
            }
        }

        if added > 0 {
            info!("Registered {} milestones for {}", added, sport);
        }
        Ok(())
    }

    /// Run a job kind for a sport unless the same kind is already running.
    /// Skip, never queue: the next trigger catches up.
    async fn run_exclusive(
        self: &Arc<Self>,
        job_name: &'static str,
        sport: &str,
        milestone: Option<(Milestone, String)>,
    ) {
        // Milestone one-shots claim per contest: two contests of the same
        // sport may fire the same milestone on one tick, and a skipped
        // one-shot would never get another chance
        let claim_key = match &milestone {
            Some((_, contest_id)) => format!("{}:{}:{}", job_name, sport, contest_id),
            None => format!("{}:{}", job_name, sport),
        };
        {
            let mut running = self.running.lock().await;
            if !running.insert(claim_key.clone()) {
                debug!("Skipping {}: previous run still active", claim_key);
                return;
            }
        }

        self.dispatch(job_name, sport, milestone).await;

        self.running.lock().await.remove(&claim_key);
    }

    async fn dispatch(
        &self,
        job_name: &'static str,
        sport: &str,
        milestone: Option<(Milestone, String)>,
    ) {
        let ctx = &self.ctx;
        let result: Result<()> = match (job_name, milestone) {
            ("contest_sync", _) => run_audited(ctx, job_name, Some(sport), || async {
                ContestSyncJob::new(ctx.clone()).run(sport).await
            })
            .await
            .map(|_| ()),
            ("projection_sync", _) => run_audited(ctx, job_name, Some(sport), || async {
                ProjectionSyncJob::new(ctx.clone()).run(sport, false).await
            })
            .await
            .map(|_| ()),
            ("submission", _) => run_audited(ctx, job_name, Some(sport), || async {
                SubmissionJob::new(ctx.clone()).run(sport).await
            })
            .await
            .map(|_| ()),
            ("injury_monitor", _) => run_audited(ctx, job_name, Some(sport), || async {
                InjuryMonitorJob::new(ctx.clone()).run(sport).await
            })
            .await
            .map(|_| ()),
            (_, Some((milestone, contest_id))) => {
                self.dispatch_milestone(milestone, sport, &contest_id).await
            }
            _ => {
                warn!("Unknown job {}", job_name);
                Ok(())
            }
        };

        // run_audited already logged, audited, and alerted failures
        if result.is_err() {
            debug!("Job {} for {} ended in error", job_name, sport);
        }
    }

    async fn dispatch_milestone(
        &self,
        milestone: Milestone,
        sport: &str,
        contest_id: &str,
    ) -> Result<()> {
        let ctx = &self.ctx;
        match milestone {
            Milestone::PlayerPool => {
                run_audited(ctx, milestone.job_name(), Some(sport), || async {
                    refresh_pool(ctx, sport, contest_id).await
                })
                .await
                .map(|_| ())
            }
            Milestone::Projections => {
                run_audited(ctx, milestone.job_name(), Some(sport), || async {
                    ProjectionSyncJob::new(ctx.clone()).run(sport, true).await
                })
                .await
                .map(|_| ())
            }
            Milestone::GenerateLineups => {
                run_audited(ctx, milestone.job_name(), Some(sport), || async {
                    let record = match ctx.db.get_record(contest_id).await? {
                        Some(r) if !r.state.is_terminal() => r,
                        _ => {
                            debug!("Contest {} no longer active, skipping", contest_id);
                            return Ok(0);
                        }
                    };
                    ensure_pool(ctx, sport, contest_id).await?;
                    let count = ensure_lineups(ctx, sport, &record).await?;
                    Ok(count as i64)
                })
                .await
                .map(|_| ())
            }
            Milestone::Submit => {
                run_audited(ctx, milestone.job_name(), Some(sport), || async {
                    SubmissionJob::new(ctx.clone()).run(sport).await
                })
                .await
                .map(|_| ())
            }
            Milestone::FinalEdit => {
                run_audited(ctx, milestone.job_name(), Some(sport), || async {
                    InjuryMonitorJob::new(ctx.clone()).run(sport).await
                })
                .await
                .map(|_| ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_milestone_offsets() {
        let config = SchedulerConfig::default();
        assert_eq!(
            Milestone::PlayerPool.offset(&config),
            ChronoDuration::minutes(240)
        );
        assert_eq!(
            Milestone::Projections.offset(&config),
            ChronoDuration::minutes(180)
        );
        assert_eq!(
            Milestone::GenerateLineups.offset(&config),
            ChronoDuration::minutes(150)
        );
        assert_eq!(Milestone::Submit.offset(&config), ChronoDuration::minutes(120));
        assert_eq!(
            Milestone::FinalEdit.offset(&config),
            ChronoDuration::minutes(30)
        );
    }

    #[test]
    fn test_nfl_calendar_slots() {
        // 2026-09-13 is a Sunday
        let sunday_morning = Utc.with_ymd_and_hms(2026, 9, 13, 9, 0, 15).unwrap();
        assert!(due_calendar_slot("nfl", sunday_morning).is_some());

        let sunday_evening = Utc.with_ymd_and_hms(2026, 9, 13, 17, 0, 0).unwrap();
        assert!(due_calendar_slot("nfl", sunday_evening).is_some());

        // Wednesday has no NFL slot
        let wednesday = Utc.with_ymd_and_hms(2026, 9, 16, 10, 0, 0).unwrap();
        assert!(due_calendar_slot("nfl", wednesday).is_none());

        // Off-minute never matches
        let off_minute = Utc.with_ymd_and_hms(2026, 9, 13, 9, 1, 0).unwrap();
        assert!(due_calendar_slot("nfl", off_minute).is_none());
    }

    #[test]
    fn test_other_sports_daily_slot() {
        for day in 14..=18 {
            let ten_am = Utc.with_ymd_and_hms(2026, 9, day, 10, 0, 0).unwrap();
            assert!(due_calendar_slot("nba", ten_am).is_some());
        }
        let eleven_am = Utc.with_ymd_and_hms(2026, 9, 14, 11, 0, 0).unwrap();
        assert!(due_calendar_slot("nba", eleven_am).is_none());
    }

    #[test]
    fn test_slot_ids_distinguish_days() {
        let this_sunday = Utc.with_ymd_and_hms(2026, 9, 13, 9, 0, 0).unwrap();
        let next_sunday = Utc.with_ymd_and_hms(2026, 9, 20, 9, 0, 0).unwrap();
        assert_ne!(
            due_calendar_slot("nfl", this_sunday),
            due_calendar_slot("nfl", next_sunday)
        );
    }

    mod registry {
        use super::super::*;
        use crate::alerts::WebhookAlerter;
        use crate::config::Config;
        use crate::db::Database;
        use crate::platform::{
            ContestCatalog, EntryResult, LineupGenerator, ProjectionSource, RosterConstraints,
            Session, SourceProjection, SubmissionChannel,
        };
        use crate::types::{Contest, LifecycleRecord, Lineup, PlayerPoolEntry};
        use async_trait::async_trait;
        use rust_decimal_macros::dec;

        struct NoopCatalog;

        #[async_trait]
        impl ContestCatalog for NoopCatalog {
            async fn list_contests(&self, _sport: &str) -> Result<Vec<Contest>> {
                Ok(Vec::new())
            }
            async fn get_contest(&self, _sport: &str, _id: &str) -> Result<Option<Contest>> {
                Ok(None)
            }
            async fn fetch_player_pool(
                &self,
                _sport: &str,
                _id: &str,
            ) -> Result<Vec<PlayerPoolEntry>> {
                Ok(Vec::new())
            }
        }

        struct NoopProjections;

        #[async_trait]
        impl ProjectionSource for NoopProjections {
            fn name(&self) -> &str {
                "noop"
            }
            async fn fetch(&self, _sport: &str) -> Result<Vec<SourceProjection>> {
                Ok(Vec::new())
            }
        }

        struct NoopGenerator;

        impl LineupGenerator for NoopGenerator {
            fn generate(
                &self,
                _pool: &[PlayerPoolEntry],
                _constraints: &RosterConstraints,
                _count: usize,
            ) -> Result<Vec<Lineup>> {
                Ok(Vec::new())
            }
        }

        struct NoopSubmission;

        #[async_trait]
        impl SubmissionChannel for NoopSubmission {
            async fn authenticate(&self) -> Result<Session> {
                Ok(Session {
                    token: "t".to_string(),
                    established_at: Utc::now(),
                })
            }
            async fn submit(
                &self,
                _session: &Session,
                _record: &LifecycleRecord,
                _lineups: &[Lineup],
            ) -> Result<Vec<EntryResult>> {
                Ok(Vec::new())
            }
            async fn edit(
                &self,
                _session: &Session,
                _record: &LifecycleRecord,
                _lineups: &[Lineup],
            ) -> Result<Vec<EntryResult>> {
                Ok(Vec::new())
            }
        }

        async fn noop_ctx() -> JobContext {
            JobContext {
                db: Arc::new(Database::new("sqlite::memory:").await.unwrap()),
                catalog: Arc::new(NoopCatalog),
                projections: Arc::new(NoopProjections),
                generator: Arc::new(NoopGenerator),
                submission: Arc::new(NoopSubmission),
                alerter: Arc::new(WebhookAlerter::new(None)),
                config: Config {
                    database_path: String::new(),
                    catalog_base_url: String::new(),
                    projection_base_url: String::new(),
                    submission_base_url: String::new(),
                    platform_username: None,
                    platform_password: None,
                    alert_webhook_url: None,
                    sports: vec!["nfl".to_string()],
                    max_lineups_per_contest: 150,
                    selector: Default::default(),
                    fill: Default::default(),
                    refresh: Default::default(),
                    scheduler: Default::default(),
                },
                dry_run: true,
            }
        }

        fn contest(id: &str, lock_hours: i64) -> Contest {
            Contest {
                id: id.to_string(),
                sport: "nfl".to_string(),
                name: format!("Contest {}", id),
                kind: "tournament".to_string(),
                entry_fee: dec!(1),
                max_entries: 100,
                size: 120,
                entry_count: 10,
                prize_pool: dec!(500),
                lock_time: Some(Utc::now() + ChronoDuration::hours(lock_hours)),
                salary_cap: 200,
            }
        }

        #[tokio::test]
        async fn test_registry_never_double_registers() {
            let ctx = noop_ctx().await;
            ctx.db.insert_record(&contest("c1", 10)).await.unwrap();

            let scheduler = Scheduler::new(ctx);
            scheduler.register_milestones("nfl").await.unwrap();
            assert_eq!(scheduler.registered.lock().await.len(), Milestone::ALL.len());

            // Re-running discovery leaves the registry unchanged
            scheduler.register_milestones("nfl").await.unwrap();
            assert_eq!(scheduler.registered.lock().await.len(), Milestone::ALL.len());
        }

        #[tokio::test]
        async fn test_fired_milestone_not_re_registered() {
            let ctx = noop_ctx().await;
            // 3h to lock: the 4h PlayerPool milestone is already due
            ctx.db.insert_record(&contest("c1", 3)).await.unwrap();

            let scheduler = Scheduler::new(ctx);
            scheduler.register_milestones("nfl").await.unwrap();

            scheduler.fire_due_milestones(Utc::now()).await;
            let remaining = scheduler.registered.lock().await.len();
            assert!(remaining < Milestone::ALL.len());
            assert!(!scheduler.fired.lock().await.is_empty());

            // The fired key stays fired across a re-registration
            scheduler.register_milestones("nfl").await.unwrap();
            assert_eq!(scheduler.registered.lock().await.len(), remaining);
        }

        #[tokio::test]
        async fn test_milestone_claims_are_per_contest() {
            let ctx = noop_ctx().await;
            let db = Arc::clone(&ctx.db);
            let scheduler = Scheduler::new(ctx);

            // Another contest's player-pool one-shot is mid-flight
            assert!(scheduler
                .running
                .lock()
                .await
                .insert("milestone_player_pool:nfl:c1".to_string()));

            scheduler
                .run_exclusive(
                    "milestone_player_pool",
                    "nfl",
                    Some((Milestone::PlayerPool, "c2".to_string())),
                )
                .await;

            // c2 ran and was audited despite c1 still holding its claim
            let runs = db.recent_runs(10).await.unwrap();
            assert_eq!(runs.len(), 1);
            assert_eq!(runs[0].job_name, "milestone_player_pool");

            // A second firing for c1 itself is still skipped
            scheduler
                .run_exclusive(
                    "milestone_player_pool",
                    "nfl",
                    Some((Milestone::PlayerPool, "c1".to_string())),
                )
                .await;
            assert_eq!(db.recent_runs(10).await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_overlap_claim_skips_duplicate() {
            let ctx = noop_ctx().await;
            let scheduler = Scheduler::new(ctx);

            assert!(scheduler.running.lock().await.insert("submission:nfl".to_string()));
            // A second firing of the same kind finds the claim taken
            assert!(!scheduler.running.lock().await.insert("submission:nfl".to_string()));
            // A different sport is independent
            assert!(scheduler.running.lock().await.insert("submission:nba".to_string()));
        }
    }
}
