//! Platform boundary traits
//!
//! Every external dependency sits behind one of these traits so jobs can be
//! exercised against stubs and the HTTP clients stay replaceable.

pub mod catalog;
pub mod lineups;
pub mod projections;
pub mod submit;

pub use catalog::HttpCatalogClient;
pub use lineups::GreedyLineupBuilder;
pub use projections::HttpProjectionSource;
pub use submit::HttpSubmissionChannel;

use crate::types::{Contest, Lineup, LifecycleRecord, PlayerPoolEntry};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Read-only access to the platform's contest catalog
#[async_trait]
pub trait ContestCatalog: Send + Sync {
    /// All open contests for a sport, as a fresh snapshot
    async fn list_contests(&self, sport: &str) -> Result<Vec<Contest>>;

    /// One contest's current state, for fill-rate checks
    async fn get_contest(&self, sport: &str, contest_id: &str) -> Result<Option<Contest>>;

    /// The eligible player pool for a contest
    async fn fetch_player_pool(&self, sport: &str, contest_id: &str)
        -> Result<Vec<PlayerPoolEntry>>;
}

/// A projection row as delivered by a source, before it is tied to a contest
#[derive(Debug, Clone)]
pub struct SourceProjection {
    pub player_name: String,
    pub team: String,
    pub position: String,
    pub projected_points: f64,
    pub floor: Option<f64>,
    pub ceiling: Option<f64>,
}

/// An external projection feed
#[async_trait]
pub trait ProjectionSource: Send + Sync {
    /// Stable identifier recorded alongside stored projections
    fn name(&self) -> &str;

    async fn fetch(&self, sport: &str) -> Result<Vec<SourceProjection>>;
}

/// Roster shape a generated lineup must satisfy
#[derive(Debug, Clone)]
pub struct RosterConstraints {
    /// Slots in fill order, e.g. QB, RB, RB, ..., FLEX, DEF
    pub slots: Vec<String>,
    pub salary_cap: i64,
}

/// Builds candidate lineups from a player pool. Pure and synchronous.
pub trait LineupGenerator: Send + Sync {
    fn generate(
        &self,
        pool: &[PlayerPoolEntry],
        constraints: &RosterConstraints,
        count: usize,
    ) -> Result<Vec<Lineup>>;
}

/// An authenticated platform session
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub established_at: DateTime<Utc>,
}

/// Result of submitting or editing a single lineup
#[derive(Debug, Clone)]
pub struct EntryResult {
    pub lineup_id: i64,
    /// Platform-assigned entry id, present on success
    pub entry_id: Option<String>,
    pub ok: bool,
    pub error: Option<String>,
}

/// The write side of the platform: entering and editing lineups
#[async_trait]
pub trait SubmissionChannel: Send + Sync {
    async fn authenticate(&self) -> Result<Session>;

    /// Enter lineups into a contest. Partial success is normal; each lineup
    /// gets its own result.
    async fn submit(
        &self,
        session: &Session,
        record: &LifecycleRecord,
        lineups: &[Lineup],
    ) -> Result<Vec<EntryResult>>;

    /// Full-replace edit of already-entered lineups, keyed by entry id
    async fn edit(
        &self,
        session: &Session,
        record: &LifecycleRecord,
        lineups: &[Lineup],
    ) -> Result<Vec<EntryResult>>;
}
