//! HTTP client for lineup entry and editing
//!
//! Edits are full-replace: the complete slot list is sent for each entry id,
//! never a per-slot patch.

use super::{EntryResult, Session, SubmissionChannel};
use crate::errors::BotError;
use crate::types::{LifecycleRecord, Lineup};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpSubmissionChannel {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct EntryPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    entry_id: Option<&'a str>,
    players: Vec<SlotPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct SlotPayload<'a> {
    position: &'a str,
    player_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    game_code: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EntryResponse {
    #[serde(default)]
    results: Vec<RawEntryResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntryResult {
    entry_id: Option<String>,
    #[serde(default)]
    success: bool,
    error: Option<String>,
}

impl HttpSubmissionChannel {
    pub fn new(base_url: &str, username: Option<String>, password: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }

    fn entry_payloads<'a>(lineups: &'a [Lineup]) -> Vec<EntryPayload<'a>> {
        lineups
            .iter()
            .map(|lineup| EntryPayload {
                entry_id: lineup.entry_id.as_deref(),
                players: lineup
                    .slots
                    .iter()
                    .map(|slot| SlotPayload {
                        position: &slot.roster_position,
                        player_id: &slot.player_id,
                        game_code: slot.game_code.as_deref(),
                    })
                    .collect(),
            })
            .collect()
    }

    fn pair_results(lineups: &[Lineup], raw: Vec<RawEntryResult>) -> Vec<EntryResult> {
        lineups
            .iter()
            .zip(raw.into_iter())
            .map(|(lineup, r)| EntryResult {
                lineup_id: lineup.id,
                entry_id: r.entry_id,
                ok: r.success,
                error: r.error,
            })
            .collect()
    }
}

#[async_trait]
impl SubmissionChannel for HttpSubmissionChannel {
    async fn authenticate(&self) -> Result<Session> {
        let (username, password) = match (&self.username, &self.password) {
            (Some(u), Some(p)) => (u.as_str(), p.as_str()),
            _ => {
                return Err(BotError::Configuration(
                    "Platform credentials not configured; set DFS_PLATFORM_USERNAME and DFS_PLATFORM_PASSWORD".to_string(),
                )
                .into())
            }
        };

        let url = format!("{}/session", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .context("Login request failed")?;

        if !response.status().is_success() {
            return Err(BotError::SubmissionRejected(format!(
                "Login rejected with status {}",
                response.status()
            ))
            .into());
        }

        let body: LoginResponse = response.json().await.context("Failed to parse login response")?;
        debug!("Authenticated platform session");

        Ok(Session {
            token: body.token,
            established_at: Utc::now(),
        })
    }

    async fn submit(
        &self,
        session: &Session,
        record: &LifecycleRecord,
        lineups: &[Lineup],
    ) -> Result<Vec<EntryResult>> {
        let url = format!("{}/contests/{}/entries", self.base_url, record.contest_id);
        debug!("Submitting {} lineups to {}", lineups.len(), record.contest_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.token)
            .json(&Self::entry_payloads(lineups))
            .send()
            .await
            .context("Submit request failed")?;

        if !response.status().is_success() {
            return Err(BotError::SubmissionRejected(format!(
                "Submission to {} rejected with status {}",
                record.contest_id,
                response.status()
            ))
            .into());
        }

        let body: EntryResponse =
            response.json().await.context("Failed to parse submission response")?;
        let results = Self::pair_results(lineups, body.results);

        let failed = results.iter().filter(|r| !r.ok).count();
        if failed > 0 {
            warn!("{} of {} entries rejected for {}", failed, results.len(), record.contest_id);
        }

        Ok(results)
    }

    async fn edit(
        &self,
        session: &Session,
        record: &LifecycleRecord,
        lineups: &[Lineup],
    ) -> Result<Vec<EntryResult>> {
        // Editing requires the platform entry id from the original submit
        for lineup in lineups {
            if lineup.entry_id.is_none() {
                return Err(BotError::DataIntegrity(format!(
                    "Lineup {} has no entry id, cannot edit",
                    lineup.id
                ))
                .into());
            }
        }

        let url = format!("{}/contests/{}/entries", self.base_url, record.contest_id);
        debug!("Editing {} entries in {}", lineups.len(), record.contest_id);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&session.token)
            .json(&Self::entry_payloads(lineups))
            .send()
            .await
            .context("Edit request failed")?;

        if !response.status().is_success() {
            return Err(BotError::SubmissionRejected(format!(
                "Edit of {} rejected with status {}",
                record.contest_id,
                response.status()
            ))
            .into());
        }

        let body: EntryResponse =
            response.json().await.context("Failed to parse edit response")?;
        Ok(Self::pair_results(lineups, body.results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LineupSlot, LineupStatus};

    fn lineup(id: i64, entry_id: Option<&str>) -> Lineup {
        Lineup {
            id,
            contest_id: "c1".to_string(),
            entry_id: entry_id.map(|s| s.to_string()),
            status: LineupStatus::Submitted,
            slots: vec![LineupSlot {
                roster_position: "QB".to_string(),
                player_id: "p1".to_string(),
                game_code: Some("nfl.g.1".to_string()),
                player_name: "QB One".to_string(),
                salary: 35,
                projected_points: 18.0,
            }],
            total_salary: 35,
            projected_points: 18.0,
            hash: "h".to_string(),
        }
    }

    #[test]
    fn test_edit_payload_carries_entry_id() {
        let lineups = vec![lineup(1, Some("e-9")), lineup(2, None)];
        let payloads = HttpSubmissionChannel::entry_payloads(&lineups);
        assert_eq!(payloads[0].entry_id, Some("e-9"));
        assert!(payloads[1].entry_id.is_none());
        assert_eq!(payloads[0].players[0].player_id, "p1");
    }

    #[test]
    fn test_results_pair_by_position() {
        let lineups = vec![lineup(7, None), lineup(8, None)];
        let raw = vec![
            RawEntryResult { entry_id: Some("e-1".to_string()), success: true, error: None },
            RawEntryResult {
                entry_id: None,
                success: false,
                error: Some("contest full".to_string()),
            },
        ];
        let results = HttpSubmissionChannel::pair_results(&lineups, raw);
        assert_eq!(results[0].lineup_id, 7);
        assert!(results[0].ok);
        assert_eq!(results[1].lineup_id, 8);
        assert!(!results[1].ok);
        assert_eq!(results[1].error.as_deref(), Some("contest full"));
    }
}
