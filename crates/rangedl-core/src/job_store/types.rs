//! Job record and status.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::checksum::ExpectedDigests;
use crate::error::QueueError;
use crate::manager::Task;

pub type JobId = i64;

/// Lifecycle state, stored as a lowercase string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Paused,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "downloading" => Some(JobStatus::Downloading),
            "paused" => Some(JobStatus::Paused),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job request settings, stored as JSON next to the fixed columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSettings {
    #[serde(default)]
    pub digests: ExpectedDigests,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cookies: Vec<String>,
    /// Free-form caller data.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// A queued download and its bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub url: String,
    /// URL scheme (`http`, `https`, ...).
    pub protocol: String,
    /// Explicit output path, or the resolved path once the download has run.
    pub output: Option<PathBuf>,
    /// 0 when unknown.
    pub total_size: u64,
    pub downloaded: u64,
    pub status: JobStatus,
    /// Higher runs first.
    pub priority: i32,
    pub settings: JobSettings,
    /// Unix seconds.
    pub added_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let protocol = url::Url::parse(&url)
            .map(|u| u.scheme().to_string())
            .unwrap_or_default();
        Self {
            id: 0,
            url,
            protocol,
            output: None,
            total_size: 0,
            downloaded: 0,
            status: JobStatus::Pending,
            priority: 0,
            settings: JobSettings::default(),
            added_at: unix_timestamp(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn with_digests(mut self, digests: ExpectedDigests) -> Self {
        self.settings.digests = digests;
        self
    }

    pub fn with_connections(mut self, n: usize) -> Self {
        self.settings.connections = Some(n);
        self
    }

    /// Record-only pause: pending or downloading becomes paused.
    /// Returns whether the status changed.
    pub fn mark_paused(&mut self) -> Result<bool, QueueError> {
        match self.status {
            JobStatus::Pending | JobStatus::Downloading => {
                self.status = JobStatus::Paused;
                Ok(true)
            }
            JobStatus::Paused => Ok(false),
            status => Err(self.invalid(status, "pause")),
        }
    }

    /// Paused becomes pending; pending or downloading is left alone.
    pub fn mark_resumed(&mut self) -> Result<bool, QueueError> {
        match self.status {
            JobStatus::Paused => {
                self.status = JobStatus::Pending;
                Ok(true)
            }
            JobStatus::Pending | JobStatus::Downloading => Ok(false),
            status => Err(self.invalid(status, "resume")),
        }
    }

    /// Failed becomes pending with error, end time and progress cleared.
    pub fn mark_retried(&mut self) -> Result<bool, QueueError> {
        if self.status != JobStatus::Failed {
            return Err(self.invalid(self.status, "retry"));
        }
        self.status = JobStatus::Pending;
        self.error = None;
        self.finished_at = None;
        self.downloaded = 0;
        Ok(true)
    }

    fn invalid(&self, status: JobStatus, action: &'static str) -> QueueError {
        QueueError::InvalidState {
            id: self.id,
            status,
            action,
        }
    }

    /// Download parameters for this job. The size is left to the HEAD response:
    /// a `total_size` recorded by an earlier attempt may be stale.
    pub fn to_task(&self) -> Task {
        Task {
            url: self.url.clone(),
            output: self.output.clone(),
            expected_size: None,
            digests: self.settings.digests.clone(),
            connections: self.settings.connections,
            headers: self.settings.headers.clone(),
            cookies: self.settings.cookies.clone(),
            ..Default::default()
        }
    }
}

/// Current time as Unix seconds.
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
