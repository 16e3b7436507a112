//! SQLite store for contest lifecycle, player pools, lineups, and audit runs
//!
//! State transitions are guarded in the UPDATE statements themselves, so a
//! record can never regress out of a terminal state regardless of call order.

use crate::types::{
    player_ids_hash, Contest, ContestState, LifecycleRecord, Lineup, LineupSlot, LineupStatus,
    PlayerPoolEntry, ProjectionRecord, RunStatus, SchedulerRun,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{info, warn};

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.initialize().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contest_entries (
                contest_id TEXT PRIMARY KEY,
                sport TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'eligible',
                max_entries_allowed INTEGER NOT NULL,
                lock_time TEXT NOT NULL,
                salary_cap INTEGER NOT NULL,
                lineups_submitted INTEGER NOT NULL DEFAULT 0,
                fill_rate_at_submit REAL,
                skip_reason TEXT,
                submitted_at TEXT,
                last_checked TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS player_pool (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                contest_id TEXT NOT NULL,
                player_id TEXT NOT NULL,
                game_code TEXT,
                name TEXT NOT NULL,
                team TEXT NOT NULL DEFAULT '',
                position TEXT NOT NULL DEFAULT '',
                eligible_positions TEXT NOT NULL DEFAULT '',
                salary INTEGER NOT NULL,
                projected_points REAL NOT NULL DEFAULT 0,
                injury_status TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL,
                UNIQUE(contest_id, player_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS projections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                contest_id TEXT NOT NULL,
                source TEXT NOT NULL,
                player_name TEXT NOT NULL,
                team TEXT NOT NULL DEFAULT '',
                position TEXT NOT NULL DEFAULT '',
                projected_points REAL NOT NULL,
                floor REAL,
                ceiling REAL,
                fetched_at TEXT NOT NULL,
                UNIQUE(contest_id, source, player_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lineups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                contest_id TEXT NOT NULL,
                entry_id TEXT,
                status TEXT NOT NULL DEFAULT 'generated',
                total_salary INTEGER NOT NULL DEFAULT 0,
                projected_points REAL NOT NULL DEFAULT 0,
                lineup_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(contest_id, lineup_hash)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lineup_players (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                lineup_id INTEGER NOT NULL,
                roster_position TEXT NOT NULL,
                player_id TEXT NOT NULL,
                game_code TEXT,
                player_name TEXT NOT NULL,
                salary INTEGER NOT NULL,
                projected_points REAL NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS swap_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                lineup_id INTEGER NOT NULL,
                old_player_id TEXT NOT NULL,
                old_player_name TEXT NOT NULL,
                new_player_id TEXT NOT NULL,
                new_player_name TEXT NOT NULL,
                reason TEXT NOT NULL,
                old_projection REAL,
                new_projection REAL,
                swapped_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scheduler_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_name TEXT NOT NULL,
                sport TEXT,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                duration_seconds REAL,
                items_processed INTEGER NOT NULL DEFAULT 0,
                error_message TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_sport_state ON contest_entries(sport, state)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_lock ON contest_entries(lock_time)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pool_contest ON player_pool(contest_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_lineups_contest ON lineups(contest_id, status)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_job ON scheduler_runs(job_name, started_at)")
            .execute(&self.pool)
            .await?;

        info!("Database initialized");
        Ok(())
    }

    // ==================== CONTEST LIFECYCLE ====================

    /// Create a tracking record for a newly eligible contest.
    /// Returns false when a record already exists (idempotent).
    pub async fn insert_record(&self, contest: &Contest) -> Result<bool> {
        let lock_time = contest
            .lock_time
            .ok_or_else(|| anyhow::anyhow!("contest {} has no lock time", contest.id))?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO contest_entries
                (contest_id, sport, state, max_entries_allowed, lock_time, salary_cap, last_checked, created_at)
            VALUES (?, ?, 'eligible', ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&contest.id)
        .bind(&contest.sport)
        .bind(contest.max_entries)
        .bind(lock_time.to_rfc3339())
        .bind(contest.salary_cap)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Touch an existing record's last_checked. Live platform fields are
    /// never copied onto the record.
    pub async fn touch_record(&self, contest_id: &str) -> Result<()> {
        sqlx::query("UPDATE contest_entries SET last_checked = ? WHERE contest_id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(contest_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_record(&self, contest_id: &str) -> Result<Option<LifecycleRecord>> {
        let row = sqlx::query("SELECT * FROM contest_entries WHERE contest_id = ?")
            .bind(contest_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_record(&r)?)),
            None => Ok(None),
        }
    }

    /// Records still awaiting submission (eligible or pending, not yet locked)
    pub async fn records_awaiting_submission(
        &self,
        sport: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<LifecycleRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM contest_entries
            WHERE sport = ? AND state IN ('eligible', 'pending') AND lock_time > ?
            ORDER BY lock_time
            "#,
        )
        .bind(sport)
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    pub async fn submitted_records(&self, sport: &str) -> Result<Vec<LifecycleRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM contest_entries WHERE sport = ? AND state = 'submitted' ORDER BY lock_time",
        )
        .bind(sport)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// All records, optionally filtered by sport, soonest lock first
    pub async fn all_records(&self, sport: Option<&str>) -> Result<Vec<LifecycleRecord>> {
        let rows = match sport {
            Some(s) => {
                sqlx::query("SELECT * FROM contest_entries WHERE sport = ? ORDER BY lock_time")
                    .bind(s)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM contest_entries ORDER BY lock_time")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(row_to_record).collect()
    }

    /// Active records for a sport (not yet terminal, lock in the future)
    pub async fn active_records(
        &self,
        sport: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<LifecycleRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM contest_entries
            WHERE sport = ? AND state IN ('eligible', 'pending', 'submitted') AND lock_time > ?
            ORDER BY lock_time
            "#,
        )
        .bind(sport)
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// eligible -> pending, recording submission intent
    pub async fn mark_pending(&self, contest_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE contest_entries SET state = 'pending' WHERE contest_id = ? AND state = 'eligible'",
        )
        .bind(contest_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// eligible/pending -> submitted with submission metadata
    pub async fn mark_submitted(
        &self,
        contest_id: &str,
        lineups_submitted: i64,
        fill_rate: f64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE contest_entries
            SET state = 'submitted', lineups_submitted = ?, fill_rate_at_submit = ?, submitted_at = ?
            WHERE contest_id = ? AND state IN ('eligible', 'pending')
            "#,
        )
        .bind(lineups_submitted)
        .bind(fill_rate)
        .bind(Utc::now().to_rfc3339())
        .bind(contest_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(
                "Marked contest {} submitted ({} lineups, fill rate {:.1}%)",
                contest_id,
                lineups_submitted,
                fill_rate * 100.0
            );
            Ok(true)
        } else {
            warn!("Contest {} not in a submittable state", contest_id);
            Ok(false)
        }
    }

    /// submitted -> locked
    pub async fn mark_locked(&self, contest_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE contest_entries SET state = 'locked' WHERE contest_id = ? AND state = 'submitted'",
        )
        .bind(contest_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// eligible/pending -> skipped with a reason
    pub async fn mark_skipped(&self, contest_id: &str, reason: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE contest_entries SET state = 'skipped', skip_reason = ?
            WHERE contest_id = ? AND state IN ('eligible', 'pending')
            "#,
        )
        .bind(reason)
        .bind(contest_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move records past their lock time to their terminal state:
    /// submitted -> locked, eligible/pending -> skipped ("missed lock time").
    /// Returns (locked, skipped) counts.
    pub async fn sweep_past_lock(&self, now: DateTime<Utc>) -> Result<(u64, u64)> {
        let now_str = now.to_rfc3339();

        let locked = sqlx::query(
            "UPDATE contest_entries SET state = 'locked' WHERE state = 'submitted' AND lock_time <= ?",
        )
        .bind(&now_str)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let skipped = sqlx::query(
            r#"
            UPDATE contest_entries SET state = 'skipped', skip_reason = 'Missed lock time'
            WHERE state IN ('eligible', 'pending') AND lock_time <= ?
            "#,
        )
        .bind(&now_str)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if locked + skipped > 0 {
            info!("Swept {} contests to locked, {} to skipped", locked, skipped);
        }

        Ok((locked, skipped))
    }

    /// Soonest upcoming lock for a sport across non-terminal records
    pub async fn soonest_lock(
        &self,
        sport: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let row: (Option<String>,) = sqlx::query_as(
            r#"
            SELECT MIN(lock_time) FROM contest_entries
            WHERE sport = ? AND state IN ('eligible', 'pending', 'submitted') AND lock_time > ?
            "#,
        )
        .bind(sport)
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0.and_then(|s| parse_ts(&s).ok()))
    }

    // ==================== PLAYER POOL ====================

    /// Insert or refresh a pool row. Salary and availability follow the
    /// platform; a zero incoming projection never clobbers an applied one.
    pub async fn upsert_pool_entry(&self, entry: &PlayerPoolEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO player_pool
                (contest_id, player_id, game_code, name, team, position, eligible_positions,
                 salary, projected_points, injury_status, is_active, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(contest_id, player_id) DO UPDATE SET
                salary = excluded.salary,
                injury_status = excluded.injury_status,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at,
                projected_points = CASE
                    WHEN excluded.projected_points > 0 THEN excluded.projected_points
                    ELSE player_pool.projected_points
                END
            "#,
        )
        .bind(&entry.contest_id)
        .bind(&entry.player_id)
        .bind(&entry.game_code)
        .bind(&entry.name)
        .bind(&entry.team)
        .bind(&entry.position)
        .bind(entry.eligible_positions.join(","))
        .bind(entry.salary)
        .bind(entry.projected_points)
        .bind(&entry.injury_status)
        .bind(entry.is_active)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_pool(&self, contest_id: &str) -> Result<Vec<PlayerPoolEntry>> {
        let rows = sqlx::query("SELECT * FROM player_pool WHERE contest_id = ? ORDER BY salary DESC")
            .bind(contest_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_pool_entry).collect())
    }

    pub async fn pool_size(&self, contest_id: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM player_pool WHERE contest_id = ?")
            .bind(contest_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    // ==================== PROJECTIONS ====================

    pub async fn upsert_projection(&self, record: &ProjectionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projections
                (contest_id, source, player_name, team, position, projected_points, floor, ceiling, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(contest_id, source, player_name) DO UPDATE SET
                projected_points = excluded.projected_points,
                floor = excluded.floor,
                ceiling = excluded.ceiling,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(&record.contest_id)
        .bind(&record.source)
        .bind(&record.player_name)
        .bind(&record.team)
        .bind(&record.position)
        .bind(record.projected_points)
        .bind(record.floor)
        .bind(record.ceiling)
        .bind(record.fetched_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Latest projection fetch time across a sport's tracked contests
    pub async fn latest_projection_fetch(&self, sport: &str) -> Result<Option<DateTime<Utc>>> {
        let row: (Option<String>,) = sqlx::query_as(
            r#"
            SELECT MAX(p.fetched_at) FROM projections p
            JOIN contest_entries c ON c.contest_id = p.contest_id
            WHERE c.sport = ?
            "#,
        )
        .bind(sport)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0.and_then(|s| parse_ts(&s).ok()))
    }

    /// Copy matched projections onto the contest's player pool.
    /// Players are matched by name and team. Returns the matched count.
    pub async fn apply_projections(&self, contest_id: &str, source: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE player_pool SET projected_points = (
                SELECT p.projected_points FROM projections p
                WHERE p.contest_id = player_pool.contest_id
                  AND p.source = ?
                  AND p.player_name = player_pool.name
                  AND p.team = player_pool.team
            )
            WHERE contest_id = ? AND EXISTS (
                SELECT 1 FROM projections p
                WHERE p.contest_id = player_pool.contest_id
                  AND p.source = ?
                  AND p.player_name = player_pool.name
                  AND p.team = player_pool.team
            )
            "#,
        )
        .bind(source)
        .bind(contest_id)
        .bind(source)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ==================== LINEUPS ====================

    /// Store generated lineups, skipping duplicates by hash.
    /// Returns the number actually inserted.
    pub async fn insert_lineups(&self, lineups: &[Lineup]) -> Result<i64> {
        let mut inserted = 0;
        let now = Utc::now().to_rfc3339();

        for lineup in lineups {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO lineups
                    (contest_id, status, total_salary, projected_points, lineup_hash, created_at)
                VALUES (?, 'generated', ?, ?, ?, ?)
                "#,
            )
            .bind(&lineup.contest_id)
            .bind(lineup.total_salary)
            .bind(lineup.projected_points)
            .bind(&lineup.hash)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Duplicate lineup for this contest
                tx.rollback().await?;
                continue;
            }

            let lineup_id = result.last_insert_rowid();
            for slot in &lineup.slots {
                sqlx::query(
                    r#"
                    INSERT INTO lineup_players
                        (lineup_id, roster_position, player_id, game_code, player_name, salary, projected_points)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(lineup_id)
                .bind(&slot.roster_position)
                .bind(&slot.player_id)
                .bind(&slot.game_code)
                .bind(&slot.player_name)
                .bind(slot.salary)
                .bind(slot.projected_points)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            inserted += 1;
        }

        Ok(inserted)
    }

    /// Load lineups for a contest, optionally filtered by status
    pub async fn get_lineups(
        &self,
        contest_id: &str,
        status: Option<LineupStatus>,
    ) -> Result<Vec<Lineup>> {
        let rows = match status {
            Some(s) => {
                sqlx::query("SELECT * FROM lineups WHERE contest_id = ? AND status = ? ORDER BY id")
                    .bind(contest_id)
                    .bind(s.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM lineups WHERE contest_id = ? ORDER BY id")
                    .bind(contest_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut lineups = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut lineup = row_to_lineup(row)?;
            lineup.slots = self.get_lineup_slots(lineup.id).await?;
            lineups.push(lineup);
        }

        Ok(lineups)
    }

    /// Lineups in submitted or edited status, the ones injury monitoring watches
    pub async fn live_lineups(&self, contest_id: &str) -> Result<Vec<Lineup>> {
        let rows = sqlx::query(
            "SELECT * FROM lineups WHERE contest_id = ? AND status IN ('submitted', 'edited') ORDER BY id",
        )
        .bind(contest_id)
        .fetch_all(&self.pool)
        .await?;

        let mut lineups = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut lineup = row_to_lineup(row)?;
            lineup.slots = self.get_lineup_slots(lineup.id).await?;
            lineups.push(lineup);
        }

        Ok(lineups)
    }

    async fn get_lineup_slots(&self, lineup_id: i64) -> Result<Vec<LineupSlot>> {
        let rows = sqlx::query("SELECT * FROM lineup_players WHERE lineup_id = ? ORDER BY id")
            .bind(lineup_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| LineupSlot {
                roster_position: r.get("roster_position"),
                player_id: r.get("player_id"),
                game_code: r.get("game_code"),
                player_name: r.get("player_name"),
                salary: r.get("salary"),
                projected_points: r.get("projected_points"),
            })
            .collect())
    }

    /// Record the platform entry id after a successful submit
    pub async fn set_lineup_entry(&self, lineup_id: i64, entry_id: &str) -> Result<()> {
        sqlx::query("UPDATE lineups SET entry_id = ?, status = 'submitted' WHERE id = ?")
            .bind(entry_id)
            .bind(lineup_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_lineup_status(&self, lineup_id: i64, status: LineupStatus) -> Result<()> {
        sqlx::query("UPDATE lineups SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(lineup_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replace one lineup player with another, recompute totals, log the
    /// swap, and mark the lineup swapped, all in one transaction.
    /// Returns false when the outgoing player is not in the lineup.
    pub async fn apply_swap(
        &self,
        lineup_id: i64,
        old_player_id: &str,
        replacement: &PlayerPoolEntry,
        reason: &str,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let old_row = sqlx::query(
            "SELECT id, player_name, projected_points FROM lineup_players WHERE lineup_id = ? AND player_id = ?",
        )
        .bind(lineup_id)
        .bind(old_player_id)
        .fetch_optional(&mut *tx)
        .await?;

        let old_row = match old_row {
            Some(r) => r,
            None => {
                tx.rollback().await?;
                return Ok(false);
            }
        };
        let slot_row_id: i64 = old_row.get("id");
        let old_name: String = old_row.get("player_name");
        let old_projection: f64 = old_row.get("projected_points");

        sqlx::query(
            r#"
            UPDATE lineup_players
            SET player_id = ?, game_code = ?, player_name = ?, salary = ?, projected_points = ?
            WHERE id = ?
            "#,
        )
        .bind(&replacement.player_id)
        .bind(&replacement.game_code)
        .bind(&replacement.name)
        .bind(replacement.salary)
        .bind(replacement.projected_points)
        .bind(slot_row_id)
        .execute(&mut *tx)
        .await?;

        let ids: Vec<(String,)> =
            sqlx::query_as("SELECT player_id FROM lineup_players WHERE lineup_id = ?")
                .bind(lineup_id)
                .fetch_all(&mut *tx)
                .await?;
        let id_list: Vec<String> = ids.into_iter().map(|(id,)| id).collect();
        let new_hash = player_ids_hash(&id_list);

        sqlx::query(
            r#"
            UPDATE lineups SET
                total_salary = (SELECT COALESCE(SUM(salary), 0) FROM lineup_players WHERE lineup_id = ?),
                projected_points = (SELECT COALESCE(SUM(projected_points), 0) FROM lineup_players WHERE lineup_id = ?),
                lineup_hash = ?,
                status = 'swapped'
            WHERE id = ?
            "#,
        )
        .bind(lineup_id)
        .bind(lineup_id)
        .bind(&new_hash)
        .bind(lineup_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO swap_log
                (lineup_id, old_player_id, old_player_name, new_player_id, new_player_name,
                 reason, old_projection, new_projection, swapped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(lineup_id)
        .bind(old_player_id)
        .bind(&old_name)
        .bind(&replacement.player_id)
        .bind(&replacement.name)
        .bind(reason)
        .bind(old_projection)
        .bind(replacement.projected_points)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "Swapped {} -> {} in lineup {} (reason: {})",
            old_name, replacement.name, lineup_id, reason
        );
        Ok(true)
    }

    /// Lineups awaiting re-upload after a swap
    pub async fn swapped_lineups(&self, contest_id: &str) -> Result<Vec<Lineup>> {
        self.get_lineups(contest_id, Some(LineupStatus::Swapped)).await
    }

    // ==================== SCHEDULER RUNS ====================

    pub async fn start_run(&self, job_name: &str, sport: Option<&str>) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO scheduler_runs (job_name, sport, status, started_at) VALUES (?, ?, 'started', ?)",
        )
        .bind(job_name)
        .bind(sport)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn complete_run(&self, run_id: i64, items_processed: i64) -> Result<()> {
        self.finish_run(run_id, RunStatus::Completed, items_processed, None)
            .await
    }

    pub async fn fail_run(&self, run_id: i64, error: &str) -> Result<()> {
        self.finish_run(run_id, RunStatus::Failed, 0, Some(error)).await
    }

    async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        items_processed: i64,
        error: Option<&str>,
    ) -> Result<()> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT started_at FROM scheduler_runs WHERE id = ?")
                .bind(run_id)
                .fetch_optional(&self.pool)
                .await?;

        let now = Utc::now();
        let duration = row
            .and_then(|(s,)| parse_ts(&s).ok())
            .map(|started| (now - started).num_milliseconds() as f64 / 1000.0);

        sqlx::query(
            r#"
            UPDATE scheduler_runs
            SET status = ?, completed_at = ?, duration_seconds = ?, items_processed = ?, error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(now.to_rfc3339())
        .bind(duration)
        .bind(items_processed)
        .bind(error)
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_runs(&self, limit: i64) -> Result<Vec<SchedulerRun>> {
        let rows = sqlx::query("SELECT * FROM scheduler_runs ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_run).collect()
    }
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

fn row_to_record(row: &SqliteRow) -> Result<LifecycleRecord> {
    let state_str: String = row.get("state");
    let lock_time_str: String = row.get("lock_time");
    let submitted_at: Option<String> = row.get("submitted_at");
    let last_checked_str: String = row.get("last_checked");
    let created_at_str: String = row.get("created_at");

    Ok(LifecycleRecord {
        contest_id: row.get("contest_id"),
        sport: row.get("sport"),
        state: ContestState::parse(&state_str),
        max_entries_allowed: row.get("max_entries_allowed"),
        lock_time: parse_ts(&lock_time_str)?,
        salary_cap: row.get("salary_cap"),
        lineups_submitted: row.get("lineups_submitted"),
        fill_rate_at_submit: row.get("fill_rate_at_submit"),
        skip_reason: row.get("skip_reason"),
        submitted_at: submitted_at.and_then(|s| parse_ts(&s).ok()),
        last_checked: parse_ts(&last_checked_str)?,
        created_at: parse_ts(&created_at_str)?,
    })
}

fn row_to_pool_entry(row: &SqliteRow) -> PlayerPoolEntry {
    let eligible_str: String = row.get("eligible_positions");
    let eligible_positions = eligible_str
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    PlayerPoolEntry {
        contest_id: row.get("contest_id"),
        player_id: row.get("player_id"),
        game_code: row.get("game_code"),
        name: row.get("name"),
        team: row.get("team"),
        position: row.get("position"),
        eligible_positions,
        salary: row.get("salary"),
        projected_points: row.get("projected_points"),
        injury_status: row.get("injury_status"),
        is_active: row.get("is_active"),
    }
}

fn row_to_lineup(row: &SqliteRow) -> Result<Lineup> {
    let status_str: String = row.get("status");
    Ok(Lineup {
        id: row.get("id"),
        contest_id: row.get("contest_id"),
        entry_id: row.get("entry_id"),
        status: LineupStatus::parse(&status_str),
        slots: Vec::new(),
        total_salary: row.get("total_salary"),
        projected_points: row.get("projected_points"),
        hash: row.get("lineup_hash"),
    })
}

fn row_to_run(row: &SqliteRow) -> Result<SchedulerRun> {
    let status_str: String = row.get("status");
    let started_at_str: String = row.get("started_at");
    let completed_at: Option<String> = row.get("completed_at");

    Ok(SchedulerRun {
        id: row.get("id"),
        job_name: row.get("job_name"),
        sport: row.get("sport"),
        status: RunStatus::parse(&status_str),
        started_at: parse_ts(&started_at_str)?,
        completed_at: completed_at.and_then(|s| parse_ts(&s).ok()),
        duration_seconds: row.get("duration_seconds"),
        items_processed: row.get("items_processed"),
        error_message: row.get("error_message"),
    })
}
