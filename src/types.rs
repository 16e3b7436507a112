//! Core domain types for contest tracking and lineup management

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A contest snapshot as fetched from the platform. Re-fetched fresh at
/// every decision point, never treated as owned state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contest {
    pub id: String,
    pub sport: String,
    pub name: String,
    /// Platform contest kind, e.g. "tournament", "league", "satellite"
    pub kind: String,
    pub entry_fee: Decimal,
    /// Max entries a single user may submit
    pub max_entries: i64,
    /// Total entry cap for the contest
    pub size: i64,
    /// Current number of entries
    pub entry_count: i64,
    pub prize_pool: Decimal,
    /// None when the platform payload omitted it; sync rejects such contests
    pub lock_time: Option<DateTime<Utc>>,
    pub salary_cap: i64,
}

impl Contest {
    /// Current fill rate, always recomputed from the fresh snapshot
    pub fn fill_rate(&self) -> f64 {
        if self.size > 0 {
            self.entry_count as f64 / self.size as f64
        } else {
            0.0
        }
    }

    /// max entries per user / contest size
    pub fn exposure_ratio(&self) -> f64 {
        if self.size > 0 {
            self.max_entries as f64 / self.size as f64
        } else {
            0.0
        }
    }

    /// Shortened name for display (handles UTF-8 properly)
    pub fn short_name(&self, max_len: usize) -> String {
        let chars: Vec<char> = self.name.chars().collect();
        if chars.len() <= max_len {
            self.name.clone()
        } else {
            let truncated: String = chars[..max_len.saturating_sub(3)].iter().collect();
            format!("{}...", truncated)
        }
    }
}

/// Lifecycle state of a tracked contest. Only advances
/// eligible -> pending -> submitted -> locked, or diverts to skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContestState {
    Eligible,
    Pending,
    Submitted,
    Locked,
    Skipped,
}

impl ContestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContestState::Eligible => "eligible",
            ContestState::Pending => "pending",
            ContestState::Submitted => "submitted",
            ContestState::Locked => "locked",
            ContestState::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> ContestState {
        match s {
            "pending" => ContestState::Pending,
            "submitted" => ContestState::Submitted,
            "locked" => ContestState::Locked,
            "skipped" => ContestState::Skipped,
            _ => ContestState::Eligible,
        }
    }

    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContestState::Locked | ContestState::Skipped)
    }
}

impl std::fmt::Display for ContestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Our tracking row for a contest, one per contest id. Holds our intent;
/// live platform fields (entry counts) are never copied here.
#[derive(Debug, Clone)]
pub struct LifecycleRecord {
    pub contest_id: String,
    pub sport: String,
    pub state: ContestState,
    pub max_entries_allowed: i64,
    /// Authoritative and immutable once set
    pub lock_time: DateTime<Utc>,
    pub salary_cap: i64,
    pub lineups_submitted: i64,
    pub fill_rate_at_submit: Option<f64>,
    pub skip_reason: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub last_checked: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl LifecycleRecord {
    pub fn time_to_lock(&self, now: DateTime<Utc>) -> Duration {
        self.lock_time - now
    }

    pub fn time_display(&self, now: DateTime<Utc>) -> String {
        let remaining = self.time_to_lock(now);
        if remaining <= Duration::zero() {
            "locked".to_string()
        } else if remaining.num_hours() >= 24 {
            format!("{}d {}h", remaining.num_days(), remaining.num_hours() % 24)
        } else if remaining.num_hours() >= 1 {
            format!("{}h {}m", remaining.num_hours(), remaining.num_minutes() % 60)
        } else {
            format!("{}m", remaining.num_minutes())
        }
    }
}

/// Per-dimension score breakdown for a contest
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub exposure: u32,
    pub entry_fee: u32,
    pub contest_size: u32,
    pub shark_avoidance: u32,
    pub multi_entry: u32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.exposure + self.entry_fee + self.contest_size + self.shark_avoidance + self.multi_entry
    }
}

/// Ephemeral scored contest, never persisted
#[derive(Debug, Clone)]
pub struct ScoredContest {
    pub contest: Contest,
    pub score: u32,
    pub breakdown: ScoreBreakdown,
}

/// A player row within one contest's pool. Mutated in place as injury
/// statuses change, never deleted mid-contest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerPoolEntry {
    pub contest_id: String,
    pub player_id: String,
    /// Full platform code used for lineup upload
    pub game_code: Option<String>,
    pub name: String,
    pub team: String,
    pub position: String,
    pub eligible_positions: Vec<String>,
    pub salary: i64,
    pub projected_points: f64,
    pub injury_status: Option<String>,
    pub is_active: bool,
}

/// Per-source projection for one player within one contest
#[derive(Debug, Clone)]
pub struct ProjectionRecord {
    pub contest_id: String,
    pub source: String,
    pub player_name: String,
    pub team: String,
    pub position: String,
    pub projected_points: f64,
    pub floor: Option<f64>,
    pub ceiling: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}

/// Lifecycle of a stored lineup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineupStatus {
    Generated,
    Submitted,
    Swapped,
    Edited,
}

impl LineupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineupStatus::Generated => "generated",
            LineupStatus::Submitted => "submitted",
            LineupStatus::Swapped => "swapped",
            LineupStatus::Edited => "edited",
        }
    }

    pub fn parse(s: &str) -> LineupStatus {
        match s {
            "submitted" => LineupStatus::Submitted,
            "swapped" => LineupStatus::Swapped,
            "edited" => LineupStatus::Edited,
            _ => LineupStatus::Generated,
        }
    }
}

/// One roster slot within a lineup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineupSlot {
    pub roster_position: String,
    pub player_id: String,
    pub game_code: Option<String>,
    pub player_name: String,
    pub salary: i64,
    pub projected_points: f64,
}

/// A generated lineup for a contest
#[derive(Debug, Clone)]
pub struct Lineup {
    /// 0 until stored
    pub id: i64,
    pub contest_id: String,
    /// Platform entry id, assigned at submission and required for edits
    pub entry_id: Option<String>,
    pub status: LineupStatus,
    pub slots: Vec<LineupSlot>,
    pub total_salary: i64,
    pub projected_points: f64,
    pub hash: String,
}

impl Lineup {
    pub fn new(contest_id: &str, slots: Vec<LineupSlot>) -> Self {
        let total_salary = slots.iter().map(|s| s.salary).sum();
        let projected_points = slots.iter().map(|s| s.projected_points).sum();
        let hash = lineup_hash(&slots);
        Self {
            id: 0,
            contest_id: contest_id.to_string(),
            entry_id: None,
            status: LineupStatus::Generated,
            slots,
            total_salary,
            projected_points,
            hash,
        }
    }

    pub fn recompute_totals(&mut self) {
        self.total_salary = self.slots.iter().map(|s| s.salary).sum();
        self.projected_points = self.slots.iter().map(|s| s.projected_points).sum();
    }

    pub fn contains_player(&self, player_id: &str) -> bool {
        self.slots.iter().any(|s| s.player_id == player_id)
    }
}

/// Order-independent dedup hash over a set of player ids
pub fn player_ids_hash<S: AsRef<str>>(ids: &[S]) -> String {
    let mut ids: Vec<&str> = ids.iter().map(|s| s.as_ref()).collect();
    ids.sort_unstable();
    let mut hasher = Sha256::new();
    hasher.update(ids.join(",").as_bytes());
    hex::encode(hasher.finalize())
}

/// Order-independent dedup hash over the lineup's player ids
pub fn lineup_hash(slots: &[LineupSlot]) -> String {
    let ids: Vec<&str> = slots.iter().map(|s| s.player_id.as_str()).collect();
    player_ids_hash(&ids)
}

/// Status of a scheduler run audit row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Started,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Started => "started",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> RunStatus {
        match s {
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Started,
        }
    }
}

/// Append-only audit record for one job invocation
#[derive(Debug, Clone)]
pub struct SchedulerRun {
    pub id: i64,
    pub job_name: String,
    pub sport: Option<String>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub items_processed: i64,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn slot(pos: &str, id: &str, salary: i64, pts: f64) -> LineupSlot {
        LineupSlot {
            roster_position: pos.to_string(),
            player_id: id.to_string(),
            game_code: None,
            player_name: id.to_string(),
            salary,
            projected_points: pts,
        }
    }

    #[test]
    fn test_fill_rate_recomputed() {
        let contest = Contest {
            id: "1".to_string(),
            sport: "nfl".to_string(),
            name: "Test".to_string(),
            kind: "tournament".to_string(),
            entry_fee: dec!(1.50),
            max_entries: 100,
            size: 120,
            entry_count: 90,
            prize_pool: dec!(800),
            lock_time: None,
            salary_cap: 200,
        };
        assert!((contest.fill_rate() - 0.75).abs() < 1e-9);
        assert!((contest.exposure_ratio() - 100.0 / 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_name_multibyte() {
        let contest = Contest {
            id: "1".to_string(),
            sport: "nfl".to_string(),
            name: "NFL Séance Spécial Grand Tournoi du Dimanche ™".to_string(),
            kind: "tournament".to_string(),
            entry_fee: dec!(1),
            max_entries: 100,
            size: 120,
            entry_count: 0,
            prize_pool: dec!(500),
            lock_time: None,
            salary_cap: 200,
        };
        // Platform names carry accents; no cut point may split a character
        for n in 0..=contest.name.chars().count() + 2 {
            let short = contest.short_name(n);
            assert!(short.chars().count() <= n.max(3));
        }
        assert_eq!(contest.short_name(100), contest.name);
        assert!(contest.short_name(10).ends_with("..."));
    }

    #[test]
    fn test_lineup_hash_order_independent() {
        let a = vec![slot("QB", "p1", 30, 18.0), slot("RB", "p2", 25, 14.0)];
        let b = vec![slot("RB", "p2", 25, 14.0), slot("QB", "p1", 30, 18.0)];
        assert_eq!(lineup_hash(&a), lineup_hash(&b));

        let c = vec![slot("QB", "p1", 30, 18.0), slot("RB", "p3", 25, 14.0)];
        assert_ne!(lineup_hash(&a), lineup_hash(&c));
    }

    #[test]
    fn test_state_roundtrip() {
        for state in [
            ContestState::Eligible,
            ContestState::Pending,
            ContestState::Submitted,
            ContestState::Locked,
            ContestState::Skipped,
        ] {
            assert_eq!(ContestState::parse(state.as_str()), state);
        }
        assert!(ContestState::Locked.is_terminal());
        assert!(ContestState::Skipped.is_terminal());
        assert!(!ContestState::Submitted.is_terminal());
    }

    #[test]
    fn test_lineup_totals() {
        let mut lineup = Lineup::new(
            "c1",
            vec![slot("QB", "p1", 30, 18.0), slot("RB", "p2", 25, 14.5)],
        );
        assert_eq!(lineup.total_salary, 55);
        assert!((lineup.projected_points - 32.5).abs() < 1e-9);

        lineup.slots[1].salary = 20;
        lineup.slots[1].projected_points = 12.0;
        lineup.recompute_totals();
        assert_eq!(lineup.total_salary, 50);
        assert!((lineup.projected_points - 30.0).abs() < 1e-9);
        assert!(lineup.contains_player("p1"));
        assert!(!lineup.contains_player("p9"));
    }
}
