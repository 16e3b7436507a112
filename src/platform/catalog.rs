//! HTTP client for the platform contest catalog
//!
//! Payload fields arrive loosely typed (ids as numbers or strings, missing
//! lock times), so raw rows are mapped defensively and bad rows are dropped
//! with a log line instead of failing the whole fetch.

use super::ContestCatalog;
use crate::types::{Contest, PlayerPoolEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogResponse {
    #[serde(default)]
    contests: Vec<RawContest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContest {
    id: Option<serde_json::Value>,
    #[serde(default)]
    sport_code: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    r#type: String,
    #[serde(default)]
    entry_fee: f64,
    #[serde(default)]
    multiple_entry_limit: i64,
    #[serde(default)]
    entry_limit: i64,
    #[serde(default)]
    entry_count: i64,
    #[serde(default)]
    total_prizes: f64,
    start_time: Option<String>,
    #[serde(default)]
    salary_cap: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolResponse {
    #[serde(default)]
    players: Vec<RawPlayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlayer {
    id: Option<serde_json::Value>,
    game_code: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    team: String,
    #[serde(default)]
    primary_position: String,
    #[serde(default)]
    eligible_positions: Vec<String>,
    #[serde(default)]
    salary: i64,
    #[serde(default)]
    projected_points: f64,
    injury_status: Option<String>,
    #[serde(default = "default_true")]
    active: bool,
}

fn default_true() -> bool {
    true
}

impl HttpCatalogClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ContestCatalog for HttpCatalogClient {
    async fn list_contests(&self, sport: &str) -> Result<Vec<Contest>> {
        let url = format!("{}/contests?sport={}", self.base_url, sport);
        debug!("Fetching contests: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Contest catalog request failed")?
            .error_for_status()
            .context("Contest catalog returned an error status")?;

        let body: CatalogResponse = response
            .json()
            .await
            .context("Failed to parse contest catalog response")?;

        let mut contests = Vec::with_capacity(body.contests.len());
        for raw in body.contests {
            match parse_contest(raw, sport) {
                Some(c) => contests.push(c),
                None => warn!("Dropping unparseable contest row"),
            }
        }

        debug!("Fetched {} contests for {}", contests.len(), sport);
        Ok(contests)
    }

    async fn get_contest(&self, sport: &str, contest_id: &str) -> Result<Option<Contest>> {
        // The catalog has no single-contest endpoint; filter the listing
        let contests = self.list_contests(sport).await?;
        Ok(contests.into_iter().find(|c| c.id == contest_id))
    }

    async fn fetch_player_pool(
        &self,
        sport: &str,
        contest_id: &str,
    ) -> Result<Vec<PlayerPoolEntry>> {
        let url = format!("{}/contests/{}/players", self.base_url, contest_id);
        debug!("Fetching player pool: {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("sport", sport)])
            .send()
            .await
            .context("Player pool request failed")?
            .error_for_status()
            .context("Player pool returned an error status")?;

        let body: PoolResponse = response
            .json()
            .await
            .context("Failed to parse player pool response")?;

        let mut pool = Vec::with_capacity(body.players.len());
        for raw in body.players {
            match parse_player(raw, contest_id) {
                Some(p) => pool.push(p),
                None => warn!("Dropping unparseable player row in {}", contest_id),
            }
        }

        Ok(pool)
    }
}

fn id_to_string(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_contest(raw: RawContest, sport: &str) -> Option<Contest> {
    let id = id_to_string(raw.id)?;
    let lock_time = raw
        .start_time
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));

    let sport = if raw.sport_code.is_empty() {
        sport.to_string()
    } else {
        raw.sport_code.to_lowercase()
    };

    Some(Contest {
        id,
        sport,
        name: raw.title,
        kind: raw.r#type.to_lowercase(),
        entry_fee: Decimal::from_f64_retain(raw.entry_fee)?,
        max_entries: raw.multiple_entry_limit,
        size: raw.entry_limit,
        entry_count: raw.entry_count,
        prize_pool: Decimal::from_f64_retain(raw.total_prizes)?,
        lock_time,
        salary_cap: raw.salary_cap,
    })
}

fn parse_player(raw: RawPlayer, contest_id: &str) -> Option<PlayerPoolEntry> {
    let player_id = id_to_string(raw.id)?;
    if raw.name.is_empty() {
        return None;
    }

    let eligible_positions = if raw.eligible_positions.is_empty() {
        vec![raw.primary_position.clone()]
    } else {
        raw.eligible_positions
    };

    Some(PlayerPoolEntry {
        contest_id: contest_id.to_string(),
        player_id,
        game_code: raw.game_code,
        name: raw.name,
        team: raw.team,
        position: raw.primary_position,
        eligible_positions,
        salary: raw.salary,
        projected_points: raw.projected_points,
        injury_status: raw.injury_status.filter(|s| !s.is_empty()),
        is_active: raw.active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_contest_handles_numeric_ids() {
        let raw: RawContest = serde_json::from_value(serde_json::json!({
            "id": 48213,
            "title": "NFL $1.50 Double Up",
            "type": "tournament",
            "entryFee": 1.5,
            "multipleEntryLimit": 100,
            "entryLimit": 120,
            "entryCount": 90,
            "totalPrizes": 800.0,
            "startTime": "2026-09-13T17:00:00Z",
            "salaryCap": 200
        }))
        .unwrap();

        let contest = parse_contest(raw, "nfl").unwrap();
        assert_eq!(contest.id, "48213");
        assert_eq!(contest.sport, "nfl");
        assert_eq!(contest.max_entries, 100);
        assert!(contest.lock_time.is_some());
    }

    #[test]
    fn test_parse_contest_missing_lock_time() {
        let raw: RawContest = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "title": "No lock",
            "entryFee": 1.0,
            "entryLimit": 100
        }))
        .unwrap();

        let contest = parse_contest(raw, "nfl").unwrap();
        assert!(contest.lock_time.is_none());
    }

    #[test]
    fn test_parse_contest_missing_id_dropped() {
        let raw: RawContest =
            serde_json::from_value(serde_json::json!({ "title": "orphan" })).unwrap();
        assert!(parse_contest(raw, "nfl").is_none());
    }

    #[test]
    fn test_parse_player_falls_back_to_primary_position() {
        let raw: RawPlayer = serde_json::from_value(serde_json::json!({
            "id": "nfl.p.1234",
            "gameCode": "nfl.g.5678",
            "name": "Test Back",
            "team": "KC",
            "primaryPosition": "RB",
            "salary": 28,
            "injuryStatus": ""
        }))
        .unwrap();

        let player = parse_player(raw, "c1").unwrap();
        assert_eq!(player.eligible_positions, vec!["RB".to_string()]);
        assert!(player.injury_status.is_none());
        assert!(player.is_active);
    }
}
