//! Document analysis service: the external collaborator that turns a
//! submitted document into a block graph.
//!
//! The crate only depends on the [`DocumentAnalyzer`] trait. Implementations:
//!
//! * [`stored::StoredAnalyzer`] — replays a saved service response from disk
//!   or memory. No network; used for re-processing and tests.
//! * `textract::TextractAnalyzer` (feature `aws`) — AWS Textract asynchronous
//!   document analysis on an S3 object.
//!
//! Waiting for a job is driven by [`poll::JobRunner`], an explicit state
//! machine with a caller-supplied [`poll::PollPolicy`] and cancellation.

pub mod poll;
pub mod stored;
#[cfg(feature = "aws")]
pub mod textract;

use crate::blocks::Block;
use crate::error::FormScanError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub use poll::{JobOutcome, JobRunner, JobState, PollPolicy};
pub use stored::StoredAnalyzer;
#[cfg(feature = "aws")]
pub use textract::TextractAnalyzer;

/// Opaque job handle issued by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        JobId(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

/// Where the service finds the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentRef {
    S3 { bucket: String, key: String },
    LocalFile(PathBuf),
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentRef::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
            DocumentRef::LocalFile(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Job status as reported by one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Done,
    Failed,
}

/// Result of one status request. `blocks` is present only when `Done`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPoll {
    pub status: JobStatus,
    pub blocks: Option<Vec<Block>>,
    pub message: Option<String>,
}

impl JobPoll {
    pub fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            blocks: None,
            message: None,
        }
    }

    pub fn done(blocks: Vec<Block>) -> Self {
        Self {
            status: JobStatus::Done,
            blocks: Some(blocks),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            blocks: None,
            message: Some(message.into()),
        }
    }
}

/// Submit-then-poll interface of a document analysis service.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Start analysing `document`; returns immediately with a job handle.
    async fn submit(&self, document: &DocumentRef) -> Result<JobId, FormScanError>;

    /// Report the job's current status, with the full block list once done.
    async fn poll(&self, job_id: &JobId) -> Result<JobPoll, FormScanError>;
}
