//! Job lifecycle: `Submitted → Polling → Done | Failed | TimedOut | Cancelled`.
//!
//! Each [`JobRunner::step`] performs at most one status request, so callers
//! can drive the machine themselves or let [`JobRunner::run`] loop until a
//! terminal state. Between requests the runner sleeps according to the
//! [`PollPolicy`]; the sleep is cut short by the cancellation token.

use crate::analysis::{DocumentAnalyzer, DocumentRef, JobId, JobStatus};
use crate::blocks::Block;
use crate::error::FormScanError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often to ask for status and how long to wait overall.
///
/// The default re-checks every 10 s with no backoff and no limit. Opt into
/// backoff with [`PollPolicy::with_backoff`] and a deadline with
/// [`PollPolicy::with_max_wait`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay after the first pending status.
    pub interval: Duration,
    /// Upper bound on any single delay.
    pub max_interval: Duration,
    /// Multiplier applied to the delay after each pending status (≥ 1.0).
    pub backoff_factor: f64,
    /// Give up once this much time has passed since submission.
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(10))
    }
}

impl PollPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            backoff_factor: 1.0,
            max_wait: None,
        }
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor.max(1.0);
        self.max_interval = max_interval.max(self.interval);
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Delay to sleep after the `attempt`-th pending status (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(64) as i32;
        let secs = self.interval.as_secs_f64() * self.backoff_factor.powi(exp);
        Duration::try_from_secs_f64(secs)
            .map_or(self.max_interval, |d| d.min(self.max_interval))
    }
}

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Submitted {
        job_id: JobId,
    },
    /// `attempt` status requests have returned pending so far.
    Polling {
        job_id: JobId,
        attempt: u32,
    },
    Done {
        job_id: JobId,
        blocks: Vec<Block>,
        attempts: u32,
    },
    Failed {
        job_id: JobId,
        reason: String,
    },
    TimedOut {
        job_id: JobId,
        waited: Duration,
    },
    Cancelled {
        job_id: JobId,
    },
}

impl JobState {
    pub fn job_id(&self) -> &JobId {
        match self {
            JobState::Submitted { job_id }
            | JobState::Polling { job_id, .. }
            | JobState::Done { job_id, .. }
            | JobState::Failed { job_id, .. }
            | JobState::TimedOut { job_id, .. }
            | JobState::Cancelled { job_id } => job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Submitted { .. } | JobState::Polling { .. })
    }
}

/// Blocks of a successfully completed job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub blocks: Vec<Block>,
    /// Status requests made, the final one included.
    pub attempts: u32,
    pub waited: Duration,
}

/// Drives one job from submission to a terminal state.
pub struct JobRunner<'a> {
    analyzer: &'a dyn DocumentAnalyzer,
    policy: PollPolicy,
    cancel: Option<&'a CancellationToken>,
    progress: Option<&'a ProgressCallback>,
}

impl<'a> JobRunner<'a> {
    pub fn new(analyzer: &'a dyn DocumentAnalyzer, policy: PollPolicy) -> Self {
        Self {
            analyzer,
            policy,
            cancel: None,
            progress: None,
        }
    }

    pub fn cancel_on(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, progress: &'a ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Submit `document` and return the initial state.
    pub async fn submit(&self, document: &DocumentRef) -> Result<JobState, FormScanError> {
        let job_id = self.analyzer.submit(document).await?;
        info!("Analysis job {} started for {}", job_id, document);
        if let Some(cb) = self.progress {
            cb.on_job_submitted(job_id.as_str());
        }
        Ok(JobState::Submitted { job_id })
    }

    /// Advance by at most one status request. Terminal states are returned as is.
    ///
    /// `started` is the submission instant used for the `max_wait` deadline.
    pub async fn step(&self, state: JobState, started: Instant) -> Result<JobState, FormScanError> {
        let (job_id, attempt) = match state {
            JobState::Submitted { job_id } => (job_id, 0),
            JobState::Polling { job_id, attempt } => (job_id, attempt),
            terminal => return Ok(terminal),
        };

        if self.is_cancelled() {
            return Ok(JobState::Cancelled { job_id });
        }

        if attempt > 0 {
            let mut delay = self.policy.delay_for(attempt);
            if let Some(max_wait) = self.policy.max_wait {
                let remaining = max_wait.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    return Ok(JobState::TimedOut {
                        job_id,
                        waited: started.elapsed(),
                    });
                }
                delay = delay.min(remaining);
            }
            debug!("Job {}: next status check in {:?}", job_id, delay);
            if !self.pause(delay).await {
                return Ok(JobState::Cancelled { job_id });
            }
        }

        let poll = self.analyzer.poll(&job_id).await?;
        let attempt = attempt + 1;
        info!(
            "Job {} status: {:?} (check {})",
            job_id, poll.status, attempt
        );
        if let Some(cb) = self.progress {
            cb.on_poll(job_id.as_str(), attempt, poll.status);
        }

        Ok(match poll.status {
            JobStatus::Done => match poll.blocks {
                Some(blocks) => JobState::Done {
                    job_id,
                    blocks,
                    attempts: attempt,
                },
                None => {
                    return Err(FormScanError::MalformedAnalysis(format!(
                        "job {job_id} reported done without blocks"
                    )))
                }
            },
            JobStatus::Failed => JobState::Failed {
                job_id,
                reason: poll.message.unwrap_or_else(|| "job failed".to_string()),
            },
            JobStatus::Pending => match self.policy.max_wait {
                Some(max_wait) if started.elapsed() >= max_wait => JobState::TimedOut {
                    job_id,
                    waited: started.elapsed(),
                },
                _ => JobState::Polling { job_id, attempt },
            },
        })
    }

    /// Submit and wait for a terminal state.
    ///
    /// Only `Done` is `Ok`; every other terminal state becomes its error.
    pub async fn run(&self, document: &DocumentRef) -> Result<JobOutcome, FormScanError> {
        let started = Instant::now();
        let mut state = self.submit(document).await?;
        while !state.is_terminal() {
            state = self.step(state, started).await?;
        }

        match state {
            JobState::Done {
                job_id,
                blocks,
                attempts,
            } => {
                info!("Job {} done: {} blocks", job_id, blocks.len());
                Ok(JobOutcome {
                    job_id,
                    blocks,
                    attempts,
                    waited: started.elapsed(),
                })
            }
            JobState::Failed { job_id, reason } => {
                warn!("Job {} failed: {}", job_id, reason);
                Err(FormScanError::AnalysisFailed {
                    job_id: job_id.0,
                    reason,
                })
            }
            JobState::TimedOut { job_id, waited } => Err(FormScanError::AnalysisTimedOut {
                job_id: job_id.0,
                waited_secs: waited.as_secs(),
            }),
            JobState::Cancelled { job_id } => {
                Err(FormScanError::AnalysisCancelled { job_id: job_id.0 })
            }
            JobState::Submitted { .. } | JobState::Polling { .. } => Err(FormScanError::Internal(
                "job loop exited before a terminal state".into(),
            )),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|t| t.is_cancelled())
    }

    /// Sleep for `delay`; `false` if cancelled first.
    async fn pause(&self, delay: Duration) -> bool {
        match self.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => false,
                _ = sleep(delay) => true,
            },
            None => {
                sleep(delay).await;
                true
            }
        }
    }
}
