//! Webhook alert notifications
//!
//! Alerts are fire-and-forget: a delivery failure is logged and dropped,
//! never propagated into the job that raised it.

use crate::swapper::SwapOutcome;
use serde_json::json;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Success,
}

impl AlertSeverity {
    fn color(&self) -> u32 {
        match self {
            AlertSeverity::Info => 0x3498db,
            AlertSeverity::Warning => 0xf39c12,
            AlertSeverity::Error => 0xe74c3c,
            AlertSeverity::Success => 0x2ecc71,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "ℹ️",
            AlertSeverity::Warning => "⚠️",
            AlertSeverity::Error => "🚨",
            AlertSeverity::Success => "✅",
        }
    }
}

pub struct WebhookAlerter {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl WebhookAlerter {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    /// Send an alert. Does nothing when no webhook is configured.
    pub async fn notify(&self, subject: &str, body: &str, severity: AlertSeverity) {
        let url = match &self.webhook_url {
            Some(u) => u,
            None => {
                debug!("No alert webhook configured, skipping: {}", subject);
                return;
            }
        };

        let payload = json!({
            "embeds": [{
                "title": format!("{} {}", severity.prefix(), subject),
                "description": body,
                "color": severity.color(),
            }]
        });

        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Alert sent: {}", subject);
            }
            Ok(response) => {
                error!("Alert webhook returned status {}: {}", response.status(), subject);
            }
            Err(e) => {
                error!("Failed to send alert '{}': {}", subject, e);
            }
        }
    }

    pub async fn submission_success(&self, contest_id: &str, lineups: i64, fill_rate: f64) {
        self.notify(
            "Lineups submitted",
            &format!(
                "Contest {}: {} lineups entered at {:.1}% fill",
                contest_id,
                lineups,
                fill_rate * 100.0
            ),
            AlertSeverity::Success,
        )
        .await;
    }

    pub async fn submission_failure(&self, contest_id: &str, error: &str) {
        self.notify(
            "Submission failed",
            &format!("Contest {}: {}", contest_id, error),
            AlertSeverity::Error,
        )
        .await;
    }

    pub async fn swaps_performed(&self, contest_id: &str, outcomes: &[SwapOutcome]) {
        if outcomes.is_empty() {
            return;
        }

        let failed = outcomes.iter().filter(|o| !o.success).count();
        let severity = if failed > 0 {
            AlertSeverity::Warning
        } else {
            AlertSeverity::Info
        };

        let lines: Vec<String> = outcomes
            .iter()
            .map(|o| match (&o.new_player_name, o.success) {
                (Some(new_name), true) => format!(
                    "Lineup {}: {} -> {} ({})",
                    o.lineup_id, o.old_player_name, new_name, o.reason
                ),
                _ => format!(
                    "Lineup {}: {} ({}): {}",
                    o.lineup_id,
                    o.old_player_name,
                    o.reason,
                    o.error.as_deref().unwrap_or("swap failed")
                ),
            })
            .collect();

        self.notify(
            &format!("Injury swaps in {}", contest_id),
            &lines.join("\n"),
            severity,
        )
        .await;
    }

    pub async fn contests_synced(&self, sport: &str, total: usize, eligible: usize, new: usize) {
        if new == 0 {
            return;
        }
        self.notify(
            "New contests tracked",
            &format!(
                "{}: {} contests scanned, {} eligible, {} newly tracked",
                sport.to_uppercase(),
                total,
                eligible,
                new
            ),
            AlertSeverity::Info,
        )
        .await;
    }

    pub async fn scheduler_error(&self, job_name: &str, error: &str) {
        self.notify(
            &format!("Job failed: {}", job_name),
            error,
            AlertSeverity::Error,
        )
        .await;
    }

    pub async fn scheduler_started(&self, sports: &[String], dry_run: bool) {
        let mode = if dry_run { " (dry run)" } else { "" };
        self.notify(
            "Scheduler started",
            &format!("Tracking: {}{}", sports.join(", "), mode),
            AlertSeverity::Info,
        )
        .await;
    }

    pub async fn scheduler_stopped(&self, reason: &str) {
        self.notify("Scheduler stopped", reason, AlertSeverity::Warning).await;
    }
}
