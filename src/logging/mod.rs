//! Structured logging: tracing setup plus the append-only event log.
//!
//! The event log writes one JSON line per route decision, per failed
//! provider attempt, and per context-compaction event. A downstream
//! dashboard tails these files; they are telemetry, so a write failure is
//! logged and swallowed, never surfaced to the request.

use crate::config::{LogFormat, LoggingConfig};
use crate::context::CompactionStats;
use crate::fallback::{AttemptOutcome, AttemptRecord};
use crate::registry::Tier;
use crate::routing::{Intent, Priority, RouteDecision};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber from config.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already initialized");
    }
}

/// One line in the request log: the route decision taken.
#[derive(Debug, Serialize)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub tier: Tier,
    pub intent: Intent,
    pub priority: Priority,
    pub forced: bool,
    pub reason: String,
    pub estimated_tokens_in: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_rejection: Option<String>,
}

impl RequestRecord {
    pub fn from_decision(decision: &RouteDecision, estimated_tokens_in: u32) -> Self {
        Self {
            timestamp: Utc::now(),
            provider: decision.provider.clone(),
            model: decision.model.clone(),
            tier: decision.tier,
            intent: decision.intent,
            priority: decision.priority,
            forced: decision.forced,
            reason: decision.reason.clone(),
            estimated_tokens_in,
            override_rejection: decision.override_rejection.clone(),
        }
    }
}

/// One line in the error log: a failed or refused provider attempt.
#[derive(Debug, Serialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub rank: crate::fallback::CandidateRank,
    pub attempt: u32,
    pub provider: String,
    pub model: String,
    pub error: String,
}

impl ErrorRecord {
    /// Records for every non-success attempt in a fallback run.
    pub fn from_attempts(attempts: &[AttemptRecord]) -> Vec<Self> {
        attempts
            .iter()
            .filter_map(|a| {
                let error = match &a.outcome {
                    AttemptOutcome::Success => return None,
                    AttemptOutcome::Failed(e) => e.clone(),
                    AttemptOutcome::BudgetRefused(v) => format!("budget refused: {}", v),
                };
                Some(Self {
                    timestamp: Utc::now(),
                    rank: a.rank,
                    attempt: a.attempt,
                    provider: a.provider.clone(),
                    model: a.model.clone(),
                    error,
                })
            })
            .collect()
    }
}

/// One line in the context log: what a compaction did.
#[derive(Debug, Serialize)]
pub struct ContextRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub stats: CompactionStats,
}

impl ContextRecord {
    pub fn new(stats: CompactionStats) -> Self {
        Self {
            timestamp: Utc::now(),
            stats,
        }
    }
}

/// Append-only JSONL sinks for the three event streams.
pub struct EventLog {
    request_log: PathBuf,
    error_log: PathBuf,
    context_log: PathBuf,
}

impl EventLog {
    pub fn new(config: &LoggingConfig) -> Self {
        Self {
            request_log: config.request_log.clone(),
            error_log: config.error_log.clone(),
            context_log: config.context_log.clone(),
        }
    }

    pub async fn request(&self, record: &RequestRecord) {
        Self::append(&self.request_log, record).await;
    }

    pub async fn error(&self, record: &ErrorRecord) {
        Self::append(&self.error_log, record).await;
    }

    pub async fn context(&self, record: &ContextRecord) {
        Self::append(&self.context_log, record).await;
    }

    async fn append<T: Serialize>(path: &Path, record: &T) {
        let Ok(mut line) = serde_json::to_string(record) else {
            return;
        };
        line.push('\n');

        let result = async {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(line.as_bytes()).await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "Event log write failed");
        }
    }
}
