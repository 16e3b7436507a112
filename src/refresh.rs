//! Adaptive projection refresh policy
//!
//! Projections go stale faster as lock approaches, so the refresh interval
//! is a step function of hours-to-lock of the soonest upcoming contest.
//! The policy only decides; fetching happens in the projection sync job.

use crate::config::RefreshConfig;
use chrono::{DateTime, Utc};

/// Outcome of a refresh check. "No refresh needed" is an ordinary result,
/// not an error.
#[derive(Debug, Clone)]
pub struct RefreshDecision {
    pub refresh: bool,
    pub interval_minutes: i64,
    pub reason: String,
}

pub struct RefreshPolicy {
    config: RefreshConfig,
}

impl RefreshPolicy {
    pub fn new(config: RefreshConfig) -> Self {
        Self { config }
    }

    /// Refresh interval for a given distance to lock
    pub fn interval_minutes(&self, hours_to_lock: f64) -> i64 {
        if hours_to_lock > 24.0 {
            self.config.coarse_minutes
        } else if hours_to_lock > 6.0 {
            self.config.medium_minutes
        } else if hours_to_lock > 1.0 {
            self.config.frequent_minutes
        } else {
            self.config.final_minutes
        }
    }

    /// Decide whether projections should be refreshed now.
    ///
    /// No upcoming contest means nothing to project for: a no-op skip.
    /// `force` overrides the elapsed-time gate but not the no-contest skip.
    pub fn should_refresh(
        &self,
        soonest_lock: Option<DateTime<Utc>>,
        last_fetched: Option<DateTime<Utc>>,
        force: bool,
        now: DateTime<Utc>,
    ) -> RefreshDecision {
        let soonest = match soonest_lock {
            Some(t) => t,
            None => {
                return RefreshDecision {
                    refresh: false,
                    interval_minutes: 0,
                    reason: "No upcoming contests".to_string(),
                }
            }
        };

        let hours_to_lock = (soonest - now).num_minutes() as f64 / 60.0;
        let interval = self.interval_minutes(hours_to_lock);

        if force {
            return RefreshDecision {
                refresh: true,
                interval_minutes: interval,
                reason: "Forced refresh".to_string(),
            };
        }

        match last_fetched {
            None => RefreshDecision {
                refresh: true,
                interval_minutes: interval,
                reason: "No previous fetch".to_string(),
            },
            Some(last) => {
                let elapsed = (now - last).num_minutes();
                if elapsed >= interval {
                    RefreshDecision {
                        refresh: true,
                        interval_minutes: interval,
                        reason: format!(
                            "{} min since last fetch >= {} min interval",
                            elapsed, interval
                        ),
                    }
                } else {
                    RefreshDecision {
                        refresh: false,
                        interval_minutes: interval,
                        reason: format!(
                            "Refreshed {} min ago, interval is {} min ({:.1}h to lock)",
                            elapsed, interval, hours_to_lock
                        ),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_interval_tiers() {
        let policy = RefreshPolicy::new(RefreshConfig::default());
        assert_eq!(policy.interval_minutes(48.0), 360);
        assert_eq!(policy.interval_minutes(12.0), 120);
        assert_eq!(policy.interval_minutes(3.0), 30);
        assert_eq!(policy.interval_minutes(0.5), 10);
    }

    #[test]
    fn test_repeat_within_interval_skips() {
        let policy = RefreshPolicy::new(RefreshConfig::default());
        let now = Utc::now();
        let lock = Some(now + Duration::hours(12));

        // First check with no prior fetch refreshes
        let first = policy.should_refresh(lock, None, false, now);
        assert!(first.refresh);

        // Second check minutes later is inside the 120 min interval
        let second = policy.should_refresh(lock, Some(now), false, now + Duration::minutes(5));
        assert!(!second.refresh);

        // After the interval elapses it refreshes again
        let third = policy.should_refresh(lock, Some(now), false, now + Duration::minutes(121));
        assert!(third.refresh);
    }

    #[test]
    fn test_force_always_refreshes() {
        let policy = RefreshPolicy::new(RefreshConfig::default());
        let now = Utc::now();
        let lock = Some(now + Duration::hours(48));

        let decision = policy.should_refresh(lock, Some(now), true, now + Duration::minutes(1));
        assert!(decision.refresh);
        assert_eq!(decision.reason, "Forced refresh");
    }

    #[test]
    fn test_no_upcoming_contests_is_noop() {
        let policy = RefreshPolicy::new(RefreshConfig::default());
        let now = Utc::now();

        let decision = policy.should_refresh(None, None, false, now);
        assert!(!decision.refresh);
        assert!(decision.reason.contains("No upcoming"));

        // Force does not conjure contests out of nothing
        let forced = policy.should_refresh(None, None, true, now);
        assert!(!forced.refresh);
    }

    #[test]
    fn test_interval_tightens_near_lock() {
        let policy = RefreshPolicy::new(RefreshConfig::default());
        let now = Utc::now();

        // 90 min since last fetch: stale for a 30 min interval, fresh for 120
        let last = Some(now - Duration::minutes(90));
        let near = policy.should_refresh(Some(now + Duration::hours(2)), last, false, now);
        assert!(near.refresh);
        let far = policy.should_refresh(Some(now + Duration::hours(12)), last, false, now);
        assert!(!far.refresh);
    }
}
