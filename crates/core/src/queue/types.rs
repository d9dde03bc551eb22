//! Types for the queue module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::QueueError;

/// Named background queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    Default,
    Transcription,
    Download,
}

impl QueueName {
    pub const ALL: [QueueName; 3] = [
        QueueName::Default,
        QueueName::Transcription,
        QueueName::Download,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Transcription => "transcription",
            Self::Download => "download",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueName {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "transcription" => Ok(Self::Transcription),
            "download" => Ok(Self::Download),
            other => Err(QueueError::UnknownQueue(other.to_string())),
        }
    }
}

/// Job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Started,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "started" => Some(Self::Started),
            "finished" => Some(Self::Finished),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A unit of background work to enqueue.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub queue: QueueName,
    /// Name of the task handler to dispatch to.
    pub task: String,
    /// Task arguments.
    pub payload: Value,
    /// Maximum run time once started.
    pub timeout: Duration,
}

impl EnqueueRequest {
    pub fn new(queue: QueueName, task: impl Into<String>, payload: Value, timeout: Duration) -> Self {
        Self {
            queue,
            task: task.into(),
            payload,
            timeout,
        }
    }
}

/// Receipt for an enqueued job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub queue: QueueName,
    pub enqueued_at: DateTime<Utc>,
}

/// Status view of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    pub job_id: String,
    pub queue: QueueName,
    pub task: String,
    pub status: JobStatus,
    pub timeout_secs: u64,
    pub enqueued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A job a worker has taken ownership of.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub job_id: String,
    pub queue: QueueName,
    pub task: String,
    pub payload: Value,
    pub timeout: Duration,
}
