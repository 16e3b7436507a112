//! DFS Contest Bot Library
//!
//! An entry automation engine for daily fantasy pay-to-play contests:
//!
//! 1. **Selection**: hard-filter the contest catalog on fee, size, and
//!    exposure, then score survivors 0-100 across five weighted dimensions.
//! 2. **Timing**: hold lineups back until a contest is ~70% full (or lock is
//!    2 hours out), so money never lands in contests that may not run.
//! 3. **Upkeep**: refresh projections on an adaptive cadence and swap
//!    ruled-out players right up to the edit cutoff.

pub mod alerts;
pub mod config;
pub mod db;
pub mod errors;
pub mod fill_monitor;
pub mod platform;
pub mod refresh;
pub mod scheduler;
pub mod selector;
pub mod swapper;
pub mod types;

pub use config::Config;
pub use db::Database;
pub use errors::{BotError, BotResult};
pub use fill_monitor::FillMonitor;
pub use refresh::RefreshPolicy;
pub use selector::ContestSelector;
pub use types::{Contest, ContestState, LifecycleRecord, Lineup, PlayerPoolEntry};
