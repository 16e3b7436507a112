//! Injury-driven lineup swaps
//!
//! When a rostered player is ruled out, find the best same-slot replacement
//! that fits under the outgoing salary and swap it in. Finding no replacement
//! is recorded as a failed outcome, not an error.

use crate::db::Database;
use crate::types::{Lineup, LineupSlot, PlayerPoolEntry};
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Injury designations that take a player out of play
pub const SWAP_TRIGGER_STATUSES: [&str; 6] = ["O", "OUT", "IR", "SUSP", "NA", "INJ"];

pub fn is_swap_trigger(status: Option<&str>) -> bool {
    match status {
        Some(s) => SWAP_TRIGGER_STATUSES
            .iter()
            .any(|t| t.eq_ignore_ascii_case(s.trim())),
        None => false,
    }
}

/// Whether a player with the given eligible positions can occupy a roster slot
pub fn can_fill_slot(roster_position: &str, eligible_positions: &[String]) -> bool {
    if eligible_positions.iter().any(|p| p == roster_position) {
        return true;
    }
    match roster_position {
        "FLEX" => eligible_positions
            .iter()
            .any(|p| p == "RB" || p == "WR" || p == "TE"),
        "UTIL" => eligible_positions.iter().any(|p| p != "DEF"),
        _ => false,
    }
}

/// Best replacement for an outgoing slot: slot-eligible, active, affordable
/// at the outgoing salary, not already rostered, highest projection first.
pub fn find_replacement<'a>(
    pool: &'a [PlayerPoolEntry],
    lineup: &Lineup,
    out_slot: &LineupSlot,
) -> Option<&'a PlayerPoolEntry> {
    pool.iter()
        .filter(|p| p.is_active && !is_swap_trigger(p.injury_status.as_deref()))
        .filter(|p| p.salary <= out_slot.salary)
        .filter(|p| can_fill_slot(&out_slot.roster_position, &p.eligible_positions))
        .filter(|p| !lineup.contains_player(&p.player_id))
        .max_by(|a, b| {
            a.projected_points
                .partial_cmp(&b.projected_points)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// Outcome of one attempted swap, success or not
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub lineup_id: i64,
    pub old_player_id: String,
    pub old_player_name: String,
    pub new_player_id: Option<String>,
    pub new_player_name: Option<String>,
    pub reason: String,
    pub success: bool,
    pub error: Option<String>,
}

pub struct PlayerSwapper {
    db: Arc<Database>,
    dry_run: bool,
}

impl PlayerSwapper {
    pub fn new(db: Arc<Database>, dry_run: bool) -> Self {
        Self { db, dry_run }
    }

    /// Scan a contest's live lineups for ruled-out players and swap each one.
    /// Every attempted swap produces an outcome; none aborts the scan.
    pub async fn process_contest(&self, contest_id: &str) -> Result<Vec<SwapOutcome>> {
        let pool = self.db.get_pool(contest_id).await?;
        let lineups = self.db.live_lineups(contest_id).await?;

        let mut outcomes = Vec::new();
        for lineup in &lineups {
            for slot in &lineup.slots {
                let pool_row = pool.iter().find(|p| p.player_id == slot.player_id);
                let status = pool_row.and_then(|p| p.injury_status.as_deref());
                let inactive = pool_row.map(|p| !p.is_active).unwrap_or(false);

                if !is_swap_trigger(status) && !inactive {
                    continue;
                }
                let reason = status.unwrap_or("INACTIVE").to_string();

                let outcome = self.swap_slot(&pool, lineup, slot, &reason).await?;
                outcomes.push(outcome);
            }
        }

        Ok(outcomes)
    }

    async fn swap_slot(
        &self,
        pool: &[PlayerPoolEntry],
        lineup: &Lineup,
        slot: &LineupSlot,
        reason: &str,
    ) -> Result<SwapOutcome> {
        let replacement = match find_replacement(pool, lineup, slot) {
            Some(r) => r,
            None => {
                warn!(
                    "No replacement for {} ({}) in lineup {}",
                    slot.player_name, slot.roster_position, lineup.id
                );
                return Ok(SwapOutcome {
                    lineup_id: lineup.id,
                    old_player_id: slot.player_id.clone(),
                    old_player_name: slot.player_name.clone(),
                    new_player_id: None,
                    new_player_name: None,
                    reason: reason.to_string(),
                    success: false,
                    error: Some("No eligible replacement under salary".to_string()),
                });
            }
        };

        if self.dry_run {
            info!(
                "[DRY RUN] Would swap {} -> {} in lineup {} ({})",
                slot.player_name, replacement.name, lineup.id, reason
            );
        } else {
            let applied = self
                .db
                .apply_swap(lineup.id, &slot.player_id, replacement, reason)
                .await?;
            if !applied {
                return Ok(SwapOutcome {
                    lineup_id: lineup.id,
                    old_player_id: slot.player_id.clone(),
                    old_player_name: slot.player_name.clone(),
                    new_player_id: Some(replacement.player_id.clone()),
                    new_player_name: Some(replacement.name.clone()),
                    reason: reason.to_string(),
                    success: false,
                    error: Some("Player no longer in lineup".to_string()),
                });
            }
        }

        Ok(SwapOutcome {
            lineup_id: lineup.id,
            old_player_id: slot.player_id.clone(),
            old_player_name: slot.player_name.clone(),
            new_player_id: Some(replacement.player_id.clone()),
            new_player_name: Some(replacement.name.clone()),
            reason: reason.to_string(),
            success: true,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LineupStatus;

    fn pool_player(id: &str, positions: &[&str], salary: i64, pts: f64) -> PlayerPoolEntry {
        PlayerPoolEntry {
            contest_id: "c1".to_string(),
            player_id: id.to_string(),
            game_code: None,
            name: format!("Player {}", id),
            team: "KC".to_string(),
            position: positions[0].to_string(),
            eligible_positions: positions.iter().map(|s| s.to_string()).collect(),
            salary,
            projected_points: pts,
            injury_status: None,
            is_active: true,
        }
    }

    fn lineup_with(slots: Vec<(&str, &str, i64)>) -> Lineup {
        Lineup {
            id: 1,
            contest_id: "c1".to_string(),
            entry_id: Some("e-1".to_string()),
            status: LineupStatus::Submitted,
            slots: slots
                .into_iter()
                .map(|(pos, id, salary)| LineupSlot {
                    roster_position: pos.to_string(),
                    player_id: id.to_string(),
                    game_code: None,
                    player_name: format!("Player {}", id),
                    salary,
                    projected_points: 10.0,
                })
                .collect(),
            total_salary: 0,
            projected_points: 0.0,
            hash: String::new(),
        }
    }

    #[test]
    fn test_trigger_statuses() {
        for status in ["O", "OUT", "IR", "SUSP", "NA", "INJ", "out", " ir "] {
            assert!(is_swap_trigger(Some(status)), "{} should trigger", status);
        }
        for status in ["Q", "D", "P", ""] {
            assert!(!is_swap_trigger(Some(status)), "{} should not trigger", status);
        }
        assert!(!is_swap_trigger(None));
    }

    #[test]
    fn test_slot_eligibility() {
        let rb = vec!["RB".to_string()];
        let te = vec!["TE".to_string()];
        let def = vec!["DEF".to_string()];

        assert!(can_fill_slot("RB", &rb));
        assert!(!can_fill_slot("WR", &rb));
        assert!(can_fill_slot("FLEX", &rb));
        assert!(can_fill_slot("FLEX", &te));
        assert!(!can_fill_slot("FLEX", &def));
        assert!(can_fill_slot("UTIL", &rb));
        assert!(!can_fill_slot("UTIL", &def));
    }

    #[test]
    fn test_replacement_respects_salary_and_slot() {
        let lineup = lineup_with(vec![("RB", "out1", 30), ("WR", "w1", 25)]);
        let out_slot = lineup.slots[0].clone();

        let pool = vec![
            pool_player("exp", &["RB"], 35, 20.0), // over outgoing salary
            pool_player("wr", &["WR"], 25, 18.0),  // wrong slot
            pool_player("best", &["RB"], 28, 15.0),
            pool_player("worse", &["RB"], 22, 11.0),
            pool_player("w1", &["WR", "RB"], 20, 19.0), // already rostered
        ];

        let replacement = find_replacement(&pool, &lineup, &out_slot).unwrap();
        assert_eq!(replacement.player_id, "best");
    }

    #[test]
    fn test_replacement_skips_injured_and_inactive() {
        let lineup = lineup_with(vec![("RB", "out1", 30)]);
        let out_slot = lineup.slots[0].clone();

        let mut also_out = pool_player("also_out", &["RB"], 28, 19.0);
        also_out.injury_status = Some("O".to_string());
        let mut inactive = pool_player("inactive", &["RB"], 28, 18.0);
        inactive.is_active = false;
        let healthy = pool_player("healthy", &["RB"], 26, 12.0);

        let pool = vec![also_out, inactive, healthy];
        let replacement = find_replacement(&pool, &lineup, &out_slot).unwrap();
        assert_eq!(replacement.player_id, "healthy");
    }

    #[test]
    fn test_no_replacement_available() {
        let lineup = lineup_with(vec![("RB", "out1", 10)]);
        let out_slot = lineup.slots[0].clone();

        // Everyone is too expensive
        let pool = vec![pool_player("rich", &["RB"], 30, 20.0)];
        assert!(find_replacement(&pool, &lineup, &out_slot).is_none());
    }

    #[tokio::test]
    async fn test_no_replacement_recorded_as_failure() {
        let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
        let swapper = PlayerSwapper::new(db.clone(), false);

        let mut out = pool_player("out1", &["RB"], 30, 15.0);
        out.injury_status = Some("OUT".to_string());
        db.upsert_pool_entry(&out).await.unwrap();

        let lineup = Lineup::new(
            "c1",
            vec![LineupSlot {
                roster_position: "RB".to_string(),
                player_id: "out1".to_string(),
                game_code: None,
                player_name: "Player out1".to_string(),
                salary: 30,
                projected_points: 15.0,
            }],
        );
        db.insert_lineups(&[lineup]).await.unwrap();
        let stored = db.get_lineups("c1", None).await.unwrap();
        db.set_lineup_entry(stored[0].id, "e-1").await.unwrap();

        let outcomes = swapper.process_contest("c1").await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].new_player_id.is_none());
    }

    #[tokio::test]
    async fn test_swap_executes_against_store() {
        let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
        let swapper = PlayerSwapper::new(db.clone(), false);

        let mut out = pool_player("out1", &["RB"], 30, 15.0);
        out.injury_status = Some("IR".to_string());
        db.upsert_pool_entry(&out).await.unwrap();
        db.upsert_pool_entry(&pool_player("sub", &["RB"], 28, 13.0))
            .await
            .unwrap();

        let lineup = Lineup::new(
            "c1",
            vec![
                LineupSlot {
                    roster_position: "RB".to_string(),
                    player_id: "out1".to_string(),
                    game_code: None,
                    player_name: "Player out1".to_string(),
                    salary: 30,
                    projected_points: 15.0,
                },
                LineupSlot {
                    roster_position: "WR".to_string(),
                    player_id: "w1".to_string(),
                    game_code: None,
                    player_name: "Player w1".to_string(),
                    salary: 25,
                    projected_points: 12.0,
                },
            ],
        );
        db.insert_lineups(&[lineup]).await.unwrap();
        let stored = db.get_lineups("c1", None).await.unwrap();
        db.set_lineup_entry(stored[0].id, "e-1").await.unwrap();

        let outcomes = swapper.process_contest("c1").await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].success);
        assert_eq!(outcomes[0].new_player_id.as_deref(), Some("sub"));

        let swapped = db.swapped_lineups("c1").await.unwrap();
        assert_eq!(swapped.len(), 1);
        assert!(swapped[0].contains_player("sub"));
        // Entry id survives the swap for the re-upload
        assert_eq!(swapped[0].entry_id.as_deref(), Some("e-1"));
    }

    #[tokio::test]
    async fn test_dry_run_leaves_store_untouched() {
        let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
        let swapper = PlayerSwapper::new(db.clone(), true);

        let mut out = pool_player("out1", &["RB"], 30, 15.0);
        out.injury_status = Some("OUT".to_string());
        db.upsert_pool_entry(&out).await.unwrap();
        db.upsert_pool_entry(&pool_player("sub", &["RB"], 28, 13.0))
            .await
            .unwrap();

        let lineup = Lineup::new(
            "c1",
            vec![LineupSlot {
                roster_position: "RB".to_string(),
                player_id: "out1".to_string(),
                game_code: None,
                player_name: "Player out1".to_string(),
                salary: 30,
                projected_points: 15.0,
            }],
        );
        db.insert_lineups(&[lineup]).await.unwrap();
        let stored = db.get_lineups("c1", None).await.unwrap();
        db.set_lineup_entry(stored[0].id, "e-1").await.unwrap();

        let outcomes = swapper.process_contest("c1").await.unwrap();
        assert!(outcomes[0].success);

        // Nothing actually swapped
        assert!(db.swapped_lineups("c1").await.unwrap().is_empty());
        let live = db.live_lineups("c1").await.unwrap();
        assert!(live[0].contains_player("out1"));
    }
}
