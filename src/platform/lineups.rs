//! Deterministic greedy lineup builder
//!
//! Fills roster slots in order, picking the highest-projected affordable
//! player for each. Diversity across lineups comes from offsetting the pick
//! index per lineup, and the order-independent hash drops duplicates.

use super::{LineupGenerator, RosterConstraints};
use crate::types::{Lineup, LineupSlot, PlayerPoolEntry};
use crate::swapper::{can_fill_slot, is_swap_trigger};
use anyhow::Result;
use std::collections::HashSet;
use tracing::debug;

pub struct GreedyLineupBuilder;

impl GreedyLineupBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build one lineup, skipping the first `offset` candidates at each slot
    fn build_one(
        pool: &[PlayerPoolEntry],
        constraints: &RosterConstraints,
        offset: usize,
    ) -> Option<Vec<LineupSlot>> {
        let min_salary = pool.iter().map(|p| p.salary).min().unwrap_or(0);
        let mut used: HashSet<&str> = HashSet::new();
        let mut remaining_budget = constraints.salary_cap;
        let mut slots = Vec::with_capacity(constraints.slots.len());

        for (slot_index, roster_position) in constraints.slots.iter().enumerate() {
            let slots_after = (constraints.slots.len() - slot_index - 1) as i64;
            // Leave enough budget to fill every later slot at the pool minimum
            let affordable = remaining_budget - slots_after * min_salary;

            let mut candidates: Vec<&PlayerPoolEntry> = pool
                .iter()
                .filter(|p| p.is_active && !is_swap_trigger(p.injury_status.as_deref()))
                .filter(|p| p.projected_points > 0.0)
                .filter(|p| !used.contains(p.player_id.as_str()))
                .filter(|p| p.salary <= affordable)
                .filter(|p| can_fill_slot(roster_position, &p.eligible_positions))
                .collect();

            candidates.sort_by(|a, b| {
                b.projected_points
                    .partial_cmp(&a.projected_points)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.player_id.cmp(&b.player_id))
            });

            // Offset only the first slot so variants diverge at the top pick
            let pick_index = if slot_index == 0 { offset } else { 0 };
            let pick = candidates.get(pick_index).or_else(|| candidates.first())?;

            used.insert(pick.player_id.as_str());
            remaining_budget -= pick.salary;
            slots.push(LineupSlot {
                roster_position: roster_position.clone(),
                player_id: pick.player_id.clone(),
                game_code: pick.game_code.clone(),
                player_name: pick.name.clone(),
                salary: pick.salary,
                projected_points: pick.projected_points,
            });
        }

        Some(slots)
    }
}

impl Default for GreedyLineupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineupGenerator for GreedyLineupBuilder {
    fn generate(
        &self,
        pool: &[PlayerPoolEntry],
        constraints: &RosterConstraints,
        count: usize,
    ) -> Result<Vec<Lineup>> {
        if pool.is_empty() || constraints.slots.is_empty() {
            return Ok(Vec::new());
        }
        let contest_id = pool[0].contest_id.clone();

        let mut lineups = Vec::new();
        let mut seen_hashes: HashSet<String> = HashSet::new();

        // Try more offsets than requested lineups; some variants collapse
        // into duplicates or fail to fill
        for offset in 0..count * 2 {
            if lineups.len() >= count {
                break;
            }
            let slots = match Self::build_one(pool, constraints, offset) {
                Some(s) => s,
                None => continue,
            };
            let lineup = Lineup::new(&contest_id, slots);
            if lineup.total_salary > constraints.salary_cap {
                continue;
            }
            if seen_hashes.insert(lineup.hash.clone()) {
                lineups.push(lineup);
            }
        }

        debug!(
            "Generated {} unique lineups for {} (requested {})",
            lineups.len(),
            contest_id,
            count
        );
        Ok(lineups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, positions: &[&str], salary: i64, pts: f64) -> PlayerPoolEntry {
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

    fn small_pool() -> Vec<PlayerPoolEntry> {
        vec![
            player("qb1", &["QB"], 35, 20.0),
            player("qb2", &["QB"], 30, 17.0),
            player("qb3", &["QB"], 25, 14.0),
            player("rb1", &["RB"], 32, 18.0),
            player("rb2", &["RB"], 28, 15.0),
            player("rb3", &["RB"], 20, 11.0),
            player("wr1", &["WR"], 30, 16.0),
            player("wr2", &["WR"], 22, 12.0),
        ]
    }

    fn constraints(slots: &[&str], cap: i64) -> RosterConstraints {
        RosterConstraints {
            slots: slots.iter().map(|s| s.to_string()).collect(),
            salary_cap: cap,
        }
    }

    #[test]
    fn test_lineups_respect_cap_and_slots() {
        let builder = GreedyLineupBuilder::new();
        let lineups = builder
            .generate(&small_pool(), &constraints(&["QB", "RB", "FLEX"], 90), 3)
            .unwrap();

        assert!(!lineups.is_empty());
        for lineup in &lineups {
            assert!(lineup.total_salary <= 90);
            assert_eq!(lineup.slots.len(), 3);
            assert_eq!(lineup.slots[0].roster_position, "QB");
            // No duplicate players within a lineup
            let mut ids: Vec<_> = lineup.slots.iter().map(|s| s.player_id.clone()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), 3);
        }
    }

    #[test]
    fn test_lineups_are_unique() {
        let builder = GreedyLineupBuilder::new();
        let lineups = builder
            .generate(&small_pool(), &constraints(&["QB", "RB"], 100), 3)
            .unwrap();

        let hashes: HashSet<_> = lineups.iter().map(|l| l.hash.clone()).collect();
        assert_eq!(hashes.len(), lineups.len());
    }

    #[test]
    fn test_inactive_players_excluded() {
        let mut pool = small_pool();
        pool[0].is_active = false; // qb1
        pool[1].injury_status = Some("OUT".to_string()); // qb2

        let builder = GreedyLineupBuilder::new();
        let lineups = builder
            .generate(&pool, &constraints(&["QB", "RB"], 100), 1)
            .unwrap();

        assert_eq!(lineups.len(), 1);
        assert_eq!(lineups[0].slots[0].player_id, "qb3");
    }

    #[test]
    fn test_unfillable_roster_yields_nothing() {
        // No TE in the pool
        let builder = GreedyLineupBuilder::new();
        let lineups = builder
            .generate(&small_pool(), &constraints(&["QB", "TE"], 100), 2)
            .unwrap();
        assert!(lineups.is_empty());
    }

    #[test]
    fn test_deterministic_for_same_inputs() {
        let builder = GreedyLineupBuilder::new();
        let a = builder
            .generate(&small_pool(), &constraints(&["QB", "RB", "WR"], 100), 2)
            .unwrap();
        let b = builder
            .generate(&small_pool(), &constraints(&["QB", "RB", "WR"], 100), 2)
            .unwrap();

        let hashes_a: Vec<_> = a.iter().map(|l| l.hash.clone()).collect();
        let hashes_b: Vec<_> = b.iter().map(|l| l.hash.clone()).collect();
        assert_eq!(hashes_a, hashes_b);
    }
}
