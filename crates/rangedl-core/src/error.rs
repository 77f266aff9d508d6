//! Error taxonomy for a single download task.
//!
//! `TransferError` is what one HTTP transfer (chunk or single stream) reports;
//! it is retried before being folded into a `DownloadError`, which is what
//! callers of the download manager see. `QueueError` covers job queue
//! operations.

use std::path::PathBuf;

use crate::checksum::HashAlgorithm;
use crate::control::Cancelled;
use crate::job_store::{JobId, JobStatus};

/// Failure of one HTTP transfer attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// Response status other than 200/206.
    #[error("server returned HTTP {0}")]
    Http(u32),
    /// Server answered a range request for a non-zero offset with the full body.
    #[error("server ignored Range header (HTTP 200 for offset {0})")]
    RangeIgnored(u64),
    /// Body ended before the expected number of bytes arrived.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Body carried more bytes than the requested range.
    #[error("server sent more than the {expected} requested bytes")]
    Overflow { expected: u64 },
    /// Local write to the partial file failed.
    #[error("write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The task's cancel token fired (rate-limiter wait or in-flight request).
    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransferError::Cancelled)
    }
}

impl From<Cancelled> for TransferError {
    fn from(_: Cancelled) -> Self {
        TransferError::Cancelled
    }
}

/// Task-level error returned by `DownloadManager::download`.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HEAD request or its status failed; nothing was written.
    #[error("probe {url}: {reason}")]
    Probe { url: String, reason: String },
    /// A chunk exhausted its retries.
    #[error("chunk {index} failed after {attempts} attempt(s): {source}")]
    Chunk {
        index: usize,
        attempts: u32,
        #[source]
        source: TransferError,
    },
    /// Single-stream transfer exhausted its retries.
    #[error("transfer failed after {attempts} attempt(s): {source}")]
    Transfer {
        attempts: u32,
        #[source]
        source: TransferError,
    },
    /// A chunk file was missing or unreadable while assembling the output.
    #[error("merge {}: {source}", path.display())]
    Merge {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Digest of the written file does not match the expected value.
    /// The file is left on disk.
    #[error("{algorithm} mismatch for {}: expected {expected}, got {actual}", path.display())]
    Verification {
        algorithm: HashAlgorithm,
        path: PathBuf,
        expected: String,
        actual: String,
    },
    /// The task was cancelled (user stop or shutdown), not a genuine failure.
    #[error("download cancelled")]
    Cancelled,
    /// Local filesystem setup (directories, digest reads) failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        DownloadError::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<Cancelled> for DownloadError {
    fn from(_: Cancelled) -> Self {
        DownloadError::Cancelled
    }
}

/// Error from a job queue operation.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job {0} not found")]
    NotFound(JobId),
    /// The operation is not valid for the job's current status.
    #[error("job {id} is {status}; cannot {action}")]
    InvalidState {
        id: JobId,
        status: JobStatus,
        action: &'static str,
    },
    #[error("job store: {0:#}")]
    Store(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_message_names_algorithm_and_digests() {
        let e = DownloadError::Verification {
            algorithm: HashAlgorithm::Sha256,
            path: PathBuf::from("/tmp/f.bin"),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("SHA256"));
        assert!(msg.contains("expected aa"));
        assert!(msg.contains("got bb"));
    }

    #[test]
    fn queue_error_messages() {
        let e = QueueError::InvalidState {
            id: 3,
            status: JobStatus::Completed,
            action: "pause",
        };
        assert_eq!(e.to_string(), "job 3 is completed; cannot pause");
        assert_eq!(QueueError::NotFound(9).to_string(), "job 9 not found");
    }

    #[test]
    fn cancellation_is_distinct() {
        assert!(DownloadError::from(Cancelled).is_cancelled());
        assert!(TransferError::from(Cancelled).is_cancelled());
        assert!(!DownloadError::Transfer {
            attempts: 1,
            source: TransferError::Http(500)
        }
        .is_cancelled());
    }
}
