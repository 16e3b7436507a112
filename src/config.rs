//! Configuration management for the contest bot
//!
//! All selection, fill-rate, and refresh thresholds are single-sourced here
//! so no call site carries its own default.

use anyhow::Result;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// Bot configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database
    pub database_path: String,

    /// Base URL of the platform contest/player catalog API
    pub catalog_base_url: String,

    /// Base URL of the projection source
    pub projection_base_url: String,

    /// Base URL of the lineup submission endpoint
    pub submission_base_url: String,

    /// Platform login for lineup submission (required for live submits)
    pub platform_username: Option<String>,
    pub platform_password: Option<String>,

    /// Webhook URL for alerts (optional)
    pub alert_webhook_url: Option<String>,

    /// Sports to track, e.g. ["nfl", "nba"]
    pub sports: Vec<String>,

    /// Upper bound on lineups generated per contest
    pub max_lineups_per_contest: i64,

    /// Contest selection criteria
    pub selector: SelectorConfig,

    /// Submission timing thresholds
    pub fill: FillMonitorConfig,

    /// Projection refresh cadence
    pub refresh: RefreshConfig,

    /// Scheduler cadence and pre-lock milestones
    pub scheduler: SchedulerConfig,
}

/// Hard-filter criteria for contest selection
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Only enter contests with fee strictly below this
    pub max_entry_fee: Decimal,
    /// Minimum entries per user we want to be able to submit
    pub min_entries_per_user: i64,
    /// Minimum total contest size
    pub min_contest_size: i64,
    /// Minimum max_entries / size ratio
    pub min_exposure_ratio: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_entry_fee: Decimal::from(3),
            min_entries_per_user: 50,
            min_contest_size: 50,
            min_exposure_ratio: 0.02,
        }
    }
}

/// Submission timing thresholds
#[derive(Debug, Clone)]
pub struct FillMonitorConfig {
    /// Submit when the contest is at least this full
    pub fill_rate_threshold: f64,
    /// Or submit when this close to lock, regardless of fill
    pub time_before_lock_minutes: i64,
    /// No submits or edits inside this window before lock
    pub stop_editing_minutes: i64,
}

impl Default for FillMonitorConfig {
    fn default() -> Self {
        Self {
            fill_rate_threshold: 0.70,
            time_before_lock_minutes: 120,
            stop_editing_minutes: 5,
        }
    }
}

/// Projection refresh intervals by hours-to-lock tier
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// More than 24h to lock
    pub coarse_minutes: i64,
    /// 6-24h to lock
    pub medium_minutes: i64,
    /// 1-6h to lock
    pub frequent_minutes: i64,
    /// Under 1h to lock
    pub final_minutes: i64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            coarse_minutes: 360,
            medium_minutes: 120,
            frequent_minutes: 30,
            final_minutes: 10,
        }
    }
}

/// Scheduler tick intervals and per-contest pre-lock milestones
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Hours before lock to fetch the contest's player pool
    pub fetch_pool_hours_before: f64,
    /// Hours before lock to force a projection refresh
    pub projections_hours_before: f64,
    /// Hours before lock to generate lineups
    pub generate_hours_before: f64,
    /// Hours before lock for the deadline submission milestone
    pub submit_hours_before: f64,
    /// Minutes before lock for the final injury-edit milestone
    pub final_edit_minutes_before: i64,
    /// Projection policy tick interval
    pub projection_tick_minutes: u64,
    /// Fill monitor / submission tick interval
    pub submission_tick_minutes: u64,
    /// Injury monitor tick interval
    pub injury_tick_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fetch_pool_hours_before: 4.0,
            projections_hours_before: 3.0,
            generate_hours_before: 2.5,
            submit_hours_before: 2.0,
            final_edit_minutes_before: 30,
            projection_tick_minutes: 5,
            submission_tick_minutes: 10,
            injury_tick_minutes: 10,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let database_path =
            env::var("DFS_DATABASE_PATH").unwrap_or_else(|_| "contests.db".to_string());

        let catalog_base_url = env::var("DFS_CATALOG_URL")
            .unwrap_or_else(|_| "https://dfyql-ro.sports.yahoo.com/v2".to_string());

        let projection_base_url = env::var("DFS_PROJECTION_URL")
            .unwrap_or_else(|_| "https://www.dailyfantasyfuel.com/api".to_string());

        let submission_base_url =
            env::var("DFS_SUBMISSION_URL").unwrap_or_else(|_| catalog_base_url.clone());

        let platform_username = env::var("DFS_PLATFORM_USERNAME").ok().filter(|s| !s.is_empty());
        let platform_password = env::var("DFS_PLATFORM_PASSWORD").ok().filter(|s| !s.is_empty());

        let alert_webhook_url = env::var("DFS_ALERT_WEBHOOK_URL").ok().filter(|s| !s.is_empty());

        let sports = env::var("DFS_SPORTS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec!["nfl".to_string()]);

        let max_lineups_per_contest = env::var("DFS_MAX_LINEUPS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(150);

        let mut selector = SelectorConfig::default();
        if let Some(fee) = env::var("DFS_MAX_ENTRY_FEE")
            .ok()
            .and_then(|v| Decimal::from_str(&v).ok())
        {
            selector.max_entry_fee = fee;
        }
        if let Some(n) = env::var("DFS_MIN_ENTRIES").ok().and_then(|v| v.parse().ok()) {
            selector.min_entries_per_user = n;
        }
        if let Some(n) = env::var("DFS_MIN_CONTEST_SIZE").ok().and_then(|v| v.parse().ok()) {
            selector.min_contest_size = n;
        }
        if let Some(r) = env::var("DFS_MIN_EXPOSURE").ok().and_then(|v| v.parse().ok()) {
            selector.min_exposure_ratio = r;
        }

        let mut fill = FillMonitorConfig::default();
        if let Some(t) = env::var("DFS_FILL_RATE_THRESHOLD").ok().and_then(|v| v.parse().ok()) {
            fill.fill_rate_threshold = t;
        }
        if let Some(m) = env::var("DFS_TIME_BEFORE_LOCK_MIN").ok().and_then(|v| v.parse().ok()) {
            fill.time_before_lock_minutes = m;
        }
        if let Some(m) = env::var("DFS_STOP_EDITING_MIN").ok().and_then(|v| v.parse().ok()) {
            fill.stop_editing_minutes = m;
        }

        // Validate configuration
        if sports.is_empty() {
            anyhow::bail!("DFS_SPORTS must name at least one sport");
        }
        if !(0.0..=1.0).contains(&fill.fill_rate_threshold) {
            anyhow::bail!("DFS_FILL_RATE_THRESHOLD must be between 0 and 1");
        }

        Ok(Self {
            database_path,
            catalog_base_url,
            projection_base_url,
            submission_base_url,
            platform_username,
            platform_password,
            alert_webhook_url,
            sports,
            max_lineups_per_contest,
            selector,
            fill,
            refresh: RefreshConfig::default(),
            scheduler: SchedulerConfig::default(),
        })
    }

    /// Check if live submission credentials are configured
    pub fn has_credentials(&self) -> bool {
        self.platform_username.is_some() && self.platform_password.is_some()
    }

    /// Roster slots for a sport, in fill order
    pub fn roster_slots(&self, sport: &str) -> Vec<String> {
        let slots: &[&str] = match sport {
            "nfl" => &["QB", "RB", "RB", "WR", "WR", "WR", "TE", "FLEX", "DEF"],
            "nba" => &["PG", "SG", "SF", "PF", "C", "G", "F", "UTIL"],
            "nhl" => &["C", "C", "W", "W", "W", "D", "D", "G", "UTIL"],
            "mlb" => &["P", "C", "1B", "2B", "3B", "SS", "OF", "OF", "OF", "UTIL"],
            _ => &["UTIL"; 9],
        };
        slots.iter().map(|s| s.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_single_sourced() {
        let selector = SelectorConfig::default();
        assert_eq!(selector.max_entry_fee, Decimal::from(3));
        assert_eq!(selector.min_entries_per_user, 50);
        assert_eq!(selector.min_contest_size, 50);
        assert!((selector.min_exposure_ratio - 0.02).abs() < 1e-9);

        let fill = FillMonitorConfig::default();
        assert!((fill.fill_rate_threshold - 0.70).abs() < 1e-9);
        assert_eq!(fill.time_before_lock_minutes, 120);
        assert_eq!(fill.stop_editing_minutes, 5);

        let refresh = RefreshConfig::default();
        assert_eq!(
            (
                refresh.coarse_minutes,
                refresh.medium_minutes,
                refresh.frequent_minutes,
                refresh.final_minutes
            ),
            (360, 120, 30, 10)
        );
    }

    #[test]
    fn test_roster_slots() {
        let config = Config {
            database_path: String::new(),
            catalog_base_url: String::new(),
            projection_base_url: String::new(),
            submission_base_url: String::new(),
            platform_username: None,
            platform_password: None,
            alert_webhook_url: None,
            sports: vec!["nfl".to_string()],
            max_lineups_per_contest: 150,
            selector: SelectorConfig::default(),
            fill: FillMonitorConfig::default(),
            refresh: RefreshConfig::default(),
            scheduler: SchedulerConfig::default(),
        };
        let nfl = config.roster_slots("nfl");
        assert_eq!(nfl.len(), 9);
        assert_eq!(nfl[0], "QB");
        assert!(nfl.contains(&"FLEX".to_string()));
    }
}
