//! Fill-rate monitoring for submission timing
//!
//! Holding lineups back until a contest is nearly full (or lock is close)
//! keeps them out of half-empty contests that may not run, while still
//! beating the deadline. The decision is pure: fresh platform snapshot in,
//! tagged decision out.

use crate::config::FillMonitorConfig;
use crate::types::{Contest, ContestState, LifecycleRecord};
use chrono::{DateTime, Duration, Utc};

/// Outcome of one timing evaluation
#[derive(Debug, Clone)]
pub struct SubmitDecision {
    pub contest_id: String,
    pub fill_rate: f64,
    pub time_to_lock: Duration,
    pub should_submit: bool,
    pub reason: String,
}

/// Decides when to submit based on fill rate and time to lock.
///
/// Rule order is strict:
/// 1. already submitted -> no-op
/// 2. already locked -> no-op
/// 3. inside the stop-editing window -> no-op
/// 4. fill rate at threshold -> submit
/// 5. deadline threshold reached -> submit
/// 6. otherwise wait
pub struct FillMonitor {
    config: FillMonitorConfig,
}

impl FillMonitor {
    pub fn new(config: FillMonitorConfig) -> Self {
        Self { config }
    }

    /// Evaluate one contest against our tracking record
    pub fn decide(
        &self,
        contest: &Contest,
        record: &LifecycleRecord,
        now: DateTime<Utc>,
    ) -> SubmitDecision {
        let fill_rate = contest.fill_rate();
        let time_to_lock = record.time_to_lock(now);

        let (should_submit, reason) = if record.state == ContestState::Submitted {
            (false, "Already submitted".to_string())
        } else if time_to_lock <= Duration::zero() {
            (false, "Contest already locked".to_string())
        } else if time_to_lock <= Duration::minutes(self.config.stop_editing_minutes) {
            (
                false,
                format!("Too close to lock ({} min remaining)", time_to_lock.num_minutes()),
            )
        } else if fill_rate >= self.config.fill_rate_threshold {
            (
                true,
                format!(
                    "Fill rate {:.1}% >= {:.0}% threshold",
                    fill_rate * 100.0,
                    self.config.fill_rate_threshold * 100.0
                ),
            )
        } else if time_to_lock <= Duration::minutes(self.config.time_before_lock_minutes) {
            (
                true,
                format!(
                    "Time to lock {} min <= {} min threshold",
                    time_to_lock.num_minutes(),
                    self.config.time_before_lock_minutes
                ),
            )
        } else {
            (
                false,
                format!(
                    "Waiting (fill: {:.1}%, time: {:.1}h to lock)",
                    fill_rate * 100.0,
                    time_to_lock.num_minutes() as f64 / 60.0
                ),
            )
        };

        SubmitDecision {
            contest_id: contest.id.clone(),
            fill_rate,
            time_to_lock,
            should_submit,
            reason,
        }
    }

    /// Whether a submitted contest can still take lineup edits
    pub fn can_still_edit(&self, record: &LifecycleRecord, now: DateTime<Utc>) -> bool {
        if record.state != ContestState::Submitted {
            return false;
        }

        let time_to_lock = record.time_to_lock(now);
        if time_to_lock <= Duration::zero() {
            return false;
        }

        time_to_lock > Duration::minutes(self.config.stop_editing_minutes)
    }
}
