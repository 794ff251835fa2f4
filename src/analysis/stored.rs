//! Replays a saved analysis response instead of calling the service.
//!
//! Accepts either the full response object
//! (`{"JobStatus": "SUCCEEDED", "Blocks": [...]}`) or a bare block array.
//! Jobs are "submitted" by reading and parsing the file, so parse errors
//! surface at submit time and every poll afterwards answers immediately.

use crate::analysis::{DocumentAnalyzer, DocumentRef, JobId, JobPoll, JobStatus};
use crate::blocks::Block;
use crate::error::FormScanError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// A saved service response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoredResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Absent when the file is not an analysis result at all, e.g. the
    /// `{"JobId": ...}` reply to a submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Block>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseShape {
    Bare(Vec<Block>),
    Full(StoredResponse),
}

impl StoredResponse {
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self {
            job_status: None,
            status_message: None,
            blocks: Some(blocks),
        }
    }

    /// Parse a response body in either accepted shape.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormScanError> {
        let shape: ResponseShape = serde_json::from_slice(bytes)
            .map_err(|e| FormScanError::MalformedAnalysis(e.to_string()))?;
        Ok(match shape {
            ResponseShape::Bare(blocks) => Self::from_blocks(blocks),
            ResponseShape::Full(resp) => resp,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, FormScanError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FormScanError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => FormScanError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => FormScanError::MalformedAnalysis(format!("{}: {}", path.display(), e)),
        })?;
        Self::parse(&bytes)
    }

    /// Status mapped from the service spelling. A response without a status
    /// is treated as complete.
    pub fn status(&self) -> JobStatus {
        match self.job_status.as_deref() {
            Some("IN_PROGRESS") => JobStatus::Pending,
            Some("FAILED") => JobStatus::Failed,
            _ => JobStatus::Done,
        }
    }

    fn to_poll(&self) -> JobPoll {
        match self.status() {
            JobStatus::Done => match self.blocks {
                Some(ref blocks) => JobPoll::done(blocks.clone()),
                // Left to the runner to reject as malformed.
                None => JobPoll {
                    status: JobStatus::Done,
                    blocks: None,
                    message: None,
                },
            },
            JobStatus::Pending => JobPoll::pending(),
            JobStatus::Failed => JobPoll::failed(
                self.status_message
                    .clone()
                    .unwrap_or_else(|| "No data available".to_string()),
            ),
        }
    }
}

/// Analyzer backed by saved responses.
///
/// Built with [`StoredAnalyzer::new`], `submit` reads the
/// [`DocumentRef::LocalFile`] it is given. Built with
/// [`StoredAnalyzer::from_response`], every submission answers with that
/// response regardless of the document.
#[derive(Debug, Default)]
pub struct StoredAnalyzer {
    preloaded: Option<StoredResponse>,
    jobs: Mutex<HashMap<JobId, StoredResponse>>,
}

impl StoredAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_response(response: StoredResponse) -> Self {
        Self {
            preloaded: Some(response),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    fn lock_jobs(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<JobId, StoredResponse>>, FormScanError> {
        self.jobs
            .lock()
            .map_err(|_| FormScanError::Internal("stored job table poisoned".into()))
    }
}

#[async_trait]
impl DocumentAnalyzer for StoredAnalyzer {
    async fn submit(&self, document: &DocumentRef) -> Result<JobId, FormScanError> {
        let response = match (&self.preloaded, document) {
            (Some(resp), _) => resp.clone(),
            (None, DocumentRef::LocalFile(path)) => StoredResponse::from_file(path)?,
            (None, DocumentRef::S3 { .. }) => {
                return Err(FormScanError::AnalysisSubmitFailed(format!(
                    "stored responses are read from local files, not {document}"
                )))
            }
        };

        let mut jobs = self.lock_jobs()?;
        let job_id = JobId(format!("stored-{}", jobs.len() + 1));
        debug!(
            "Stored job {} for {}: {} blocks",
            job_id,
            document,
            response.blocks.as_ref().map_or(0, Vec::len)
        );
        jobs.insert(job_id.clone(), response);
        Ok(job_id)
    }

    async fn poll(&self, job_id: &JobId) -> Result<JobPoll, FormScanError> {
        let jobs = self.lock_jobs()?;
        jobs.get(job_id)
            .map(StoredResponse::to_poll)
            .ok_or_else(|| FormScanError::AnalysisPollFailed {
                job_id: job_id.to_string(),
                reason: "unknown job id".into(),
            })
    }
}
