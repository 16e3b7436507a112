//! Error taxonomy for contest automation jobs

use thiserror::Error;

/// Job-level errors. Ordinary outcomes ("not time yet", "no swap needed")
/// are structured results, not errors; only exceptional conditions land here.
#[derive(Debug, Error)]
pub enum BotError {
    /// Missing or invalid configuration. Fatal to the affected job only,
    /// never auto-retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An external collaborator (catalog, projections, submission) failed.
    /// The current pass aborts; the next scheduled tick retries.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Platform data we refuse to work with, e.g. a contest without a
    /// lock time. Rejected with a reason, never silently dropped.
    #[error("data integrity: {0}")]
    DataIntegrity(String),

    /// No valid replacement exists for an injured player. The lineup is
    /// left unchanged and the failure is recorded.
    #[error("swap unresolvable: {0}")]
    SwapUnresolvable(String),

    /// The platform rejected a lineup submission. State stays pending so a
    /// later pass can retry.
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type BotResult<T> = Result<T, BotError>;
