//! Contest selection: hard filter plus 0-100 scoring
//!
//! Two pure contracts. The hard filter is pass/fail on minimum requirements;
//! the score ranks survivors across five weighted dimensions. A contest that
//! fails the hard filter always scores 0.

use crate::config::SelectorConfig;
use crate::types::{Contest, ScoreBreakdown, ScoredContest};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// Contest types that are never worth entering
const EXCLUDED_TYPES: [&str; 2] = ["satellite", "qualifier"];

/// Name keywords that disqualify a contest
const EXCLUDED_NAME_KEYWORDS: [&str; 4] = ["satellite", "qualifier", "ticket", "seat"];

/// Featured/main contests draw sharper fields; slight penalty
const FEATURED_KEYWORDS: [&str; 3] = ["featured", "main event", "flagship"];

/// Minimum composite score a contest needs to be worth tracking
pub const MIN_TRACK_SCORE: u32 = 50;

/// Selects and scores contests against configurable criteria
pub struct ContestSelector {
    criteria: SelectorConfig,
}

impl ContestSelector {
    pub fn new(criteria: SelectorConfig) -> Self {
        Self { criteria }
    }

    /// Check all hard-filter criteria. Err carries the rejection reason.
    pub fn hard_filter(&self, contest: &Contest) -> Result<(), String> {
        let c = &self.criteria;

        if contest.entry_fee >= c.max_entry_fee {
            return Err(format!(
                "entry_fee ${} >= ${}",
                contest.entry_fee, c.max_entry_fee
            ));
        }

        if contest.max_entries < c.min_entries_per_user {
            return Err(format!(
                "max_entries {} < {}",
                contest.max_entries, c.min_entries_per_user
            ));
        }

        if contest.size < c.min_contest_size {
            return Err(format!("size {} < {}", contest.size, c.min_contest_size));
        }

        if contest.size > 0 {
            let exposure = contest.exposure_ratio();
            if exposure < c.min_exposure_ratio {
                return Err(format!(
                    "exposure {:.1}% < {:.1}%",
                    exposure * 100.0,
                    c.min_exposure_ratio * 100.0
                ));
            }
        }

        let kind = contest.kind.to_lowercase();
        if EXCLUDED_TYPES.contains(&kind.as_str()) {
            return Err(format!("excluded type: {}", kind));
        }

        let name = contest.name.to_lowercase();
        for keyword in EXCLUDED_NAME_KEYWORDS {
            if name.contains(keyword) {
                return Err(format!("excluded keyword in name: {}", keyword));
            }
        }

        Ok(())
    }

    /// Score a contest 0-100 with a per-dimension breakdown.
    /// Hard-filter failures score 0 across the board.
    pub fn score(&self, contest: &Contest) -> (u32, ScoreBreakdown) {
        if self.hard_filter(contest).is_err() {
            return (0, ScoreBreakdown::default());
        }

        let breakdown = ScoreBreakdown {
            exposure: score_exposure(contest),
            entry_fee: score_entry_fee(contest),
            contest_size: score_contest_size(contest),
            shark_avoidance: score_shark_avoidance(contest),
            multi_entry: score_multi_entry(contest),
        };

        (breakdown.total(), breakdown)
    }

    /// Filter and score a batch, sorted by score descending. The sort is
    /// stable, so ties keep input order.
    pub fn score_contests(&self, contests: Vec<Contest>, min_score: u32) -> Vec<ScoredContest> {
        let total = contests.len();
        let mut scored: Vec<ScoredContest> = contests
            .into_iter()
            .filter_map(|contest| {
                match self.hard_filter(&contest) {
                    Ok(()) => {}
                    Err(reason) => {
                        debug!("Contest {} filtered: {}", contest.id, reason);
                        return None;
                    }
                }
                let (score, breakdown) = self.score(&contest);
                if score >= min_score {
                    Some(ScoredContest {
                        contest,
                        score,
                        breakdown,
                    })
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.cmp(&a.score));

        debug!("Scoring: {}/{} contests scored >= {}", scored.len(), total, min_score);
        scored
    }
}

/// Exposure ratio score (0-25)
fn score_exposure(contest: &Contest) -> u32 {
    let exposure = contest.exposure_ratio();
    if exposure >= 0.05 {
        25
    } else if exposure >= 0.03 {
        20
    } else if exposure >= 0.02 {
        15
    } else if exposure >= 0.01 {
        10
    } else {
        0
    }
}

/// Entry fee score, lower is better (0-20)
fn score_entry_fee(contest: &Contest) -> u32 {
    let fee = contest.entry_fee;
    if fee == Decimal::ZERO {
        20 // freeroll
    } else if fee <= dec!(1) {
        18
    } else if fee <= dec!(2) {
        15
    } else if fee < dec!(3) {
        10
    } else {
        0
    }
}

/// Contest size score, sweet spot 50-200 (0-15)
fn score_contest_size(contest: &Contest) -> u32 {
    let size = contest.size;
    if (50..=200).contains(&size) {
        15
    } else if (201..=500).contains(&size) {
        12
    } else if (501..=1000).contains(&size) {
        8
    } else if size > 1000 {
        5 // large fields draw sharks
    } else {
        0
    }
}

/// Shark avoidance: smaller prize pools and emptier contests mean softer
/// competition (0-25)
fn score_shark_avoidance(contest: &Contest) -> u32 {
    let mut score = 0;

    let prize_pool = contest.prize_pool;
    score += if prize_pool < dec!(500) {
        10
    } else if prize_pool < dec!(2000) {
        8
    } else if prize_pool < dec!(5000) {
        5
    } else {
        2
    };

    let fill_rate = if contest.size > 0 { contest.fill_rate() } else { 1.0 };
    score += if fill_rate < 0.50 {
        10
    } else if fill_rate < 0.70 {
        7
    } else if fill_rate < 0.90 {
        4
    } else {
        2
    };

    let name = contest.name.to_lowercase();
    let is_featured = FEATURED_KEYWORDS.iter().any(|kw| name.contains(kw));
    score += if is_featured { 2 } else { 5 };

    score
}

/// Multi-entry depth, more entry room is better (0-15)
fn score_multi_entry(contest: &Contest) -> u32 {
    let max_entries = contest.max_entries;
    if max_entries >= 150 {
        15
    } else if max_entries >= 100 {
        13
    } else if max_entries >= 50 {
        10
    } else {
        0
    }
}
