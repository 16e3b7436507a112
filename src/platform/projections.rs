//! HTTP client for the external projection feed

use super::{ProjectionSource, SourceProjection};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub struct HttpProjectionSource {
    client: reqwest::Client,
    base_url: String,
    source_name: String,
}

#[derive(Debug, Deserialize)]
struct ProjectionResponse {
    #[serde(default)]
    projections: Vec<RawProjection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProjection {
    #[serde(default)]
    name: String,
    #[serde(default)]
    team: String,
    #[serde(default)]
    position: String,
    #[serde(default)]
    ppg_projection: f64,
    floor: Option<f64>,
    ceiling: Option<f64>,
}

impl HttpProjectionSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            source_name: "fuel".to_string(),
        })
    }
}

#[async_trait]
impl ProjectionSource for HttpProjectionSource {
    fn name(&self) -> &str {
        &self.source_name
    }

    async fn fetch(&self, sport: &str) -> Result<Vec<SourceProjection>> {
        let url = format!("{}/projections?sport={}", self.base_url, sport);
        debug!("Fetching projections: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Projection request failed")?
            .error_for_status()
            .context("Projection source returned an error status")?;

        let body: ProjectionResponse = response
            .json()
            .await
            .context("Failed to parse projection response")?;

        let projections: Vec<SourceProjection> = body
            .projections
            .into_iter()
            .filter(|raw| !raw.name.is_empty() && raw.ppg_projection > 0.0)
            .map(|raw| SourceProjection {
                player_name: raw.name,
                team: raw.team,
                position: raw.position,
                projected_points: raw.ppg_projection,
                floor: raw.floor,
                ceiling: raw.ceiling,
            })
            .collect();

        debug!("Fetched {} projections for {}", projections.len(), sport);
        Ok(projections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_projection_rows_filtered() {
        let body: ProjectionResponse = serde_json::from_value(serde_json::json!({
            "projections": [
                { "name": "Good Player", "team": "KC", "position": "RB", "ppgProjection": 14.2 },
                { "name": "Zeroed Out", "team": "KC", "position": "RB", "ppgProjection": 0.0 },
                { "name": "", "team": "KC", "position": "RB", "ppgProjection": 9.9 }
            ]
        }))
        .unwrap();

        let kept: Vec<_> = body
            .projections
            .into_iter()
            .filter(|raw| !raw.name.is_empty() && raw.ppg_projection > 0.0)
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "Good Player");
    }
}
