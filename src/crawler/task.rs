use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::browser::SessionError;
use crate::cli::config::ScraperSettings;
use crate::crawler::record::Record;

/// Represents one identifier to harvest
#[derive(Debug, Clone, Serialize)]
pub struct HarvestTask {
    /// Catalog identifier
    pub identifier: String,

    /// Canonical product page address
    pub url: String,
}

impl HarvestTask {
    pub fn new(identifier: &str, settings: &ScraperSettings) -> Self {
        Self {
            identifier: identifier.to_string(),
            url: settings.page_url(identifier),
        }
    }
}

/// How far the readiness protocol got before the document was read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// Markers found and the expanded content rendered (or there was nothing to expand)
    Ready,
    /// Markers found but the expansion step failed; read the page as rendered
    Degraded,
    /// Key markers never appeared; the record holds defaults only
    TimedOut,
}

/// Result of a completed harvest task
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub record: Record,
    pub readiness: Readiness,
    pub elapsed_ms: u64,
}

/// Why a task produced no record
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("task exceeded its {0:?} deadline")]
    Deadline(Duration),

    #[error("task panicked: {0}")]
    Panic(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Session,
    Deadline,
    Panic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Session => "session",
            FailureKind::Deadline => "deadline",
            FailureKind::Panic => "panic",
        };
        f.write_str(name)
    }
}

/// Error result from a dropped task
#[derive(Debug, Clone, Serialize)]
pub struct TaskError {
    pub identifier: String,
    pub url: String,
    pub error: String,
    pub error_type: FailureKind,
    pub occurred_at: DateTime<Utc>,
}

impl TaskError {
    pub fn new(task: &HarvestTask, failure: TaskFailure) -> Self {
        let error_type = match failure {
            TaskFailure::Session(_) => FailureKind::Session,
            TaskFailure::Deadline(_) => FailureKind::Deadline,
            TaskFailure::Panic(_) => FailureKind::Panic,
        };

        Self {
            identifier: task.identifier.clone(),
            url: task.url.clone(),
            error: failure.to_string(),
            error_type,
            occurred_at: Utc::now(),
        }
    }
}

/// What a worker hands to the aggregator for every task
#[derive(Debug)]
pub enum TaskOutcome {
    Completed(TaskResult),
    Failed(TaskError),
}
