use opentelemetry::KeyValue;

use crate::config::{ExportConfig, PollConfig};
use crate::error::{AppError, AppResult, MAX_ERROR_BODY_CHARS, truncate};
use crate::telemetry::metrics::{EXPORT_ARTIFACT_SIZE, EXPORT_JOBS, EXPORT_POLLS};

use super::client::{AccessToken, AnalyticsApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    InProgress,
    Completed,
    Failed { code: i64 },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed { .. })
    }
}

/// A server-side export job. Once it reaches a terminal state further
/// observations are ignored.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub id: String,
    pub workspace_id: String,
    pub view_id: String,
    state: JobState,
    polls: u32,
}

impl ExportJob {
    pub fn new(
        id: impl Into<String>,
        workspace_id: impl Into<String>,
        view_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
            view_id: view_id.into(),
            state: JobState::Created,
            polls: 0,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn observe(&mut self, code: i64, poll: &PollConfig) -> JobState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.polls += 1;
        self.state = if poll.in_progress_codes.contains(&code) {
            JobState::InProgress
        } else if code == poll.completed_code {
            JobState::Completed
        } else {
            JobState::Failed { code }
        };
        self.state
    }
}

/// Drives create → poll → fetch for one bulk export.
pub struct AsyncJobPoller<'a> {
    api: &'a dyn AnalyticsApi,
    poll: PollConfig,
}

impl<'a> AsyncJobPoller<'a> {
    pub fn new(api: &'a dyn AnalyticsApi, poll: PollConfig) -> Self {
        Self { api, poll }
    }

    #[tracing::instrument(
        name = "pipeline_stage export",
        skip(self, token, config),
        fields(job_id = tracing::field::Empty, polls = tracing::field::Empty, bytes = tracing::field::Empty)
    )]
    pub async fn export(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        view_id: &str,
        config: &ExportConfig,
    ) -> AppResult<Vec<u8>> {
        let span = tracing::Span::current();

        let mut job = self.create_job(token, workspace_id, view_id, config).await?;
        span.record("job_id", job.id.as_str());

        let outcome = self.wait_for_completion(token, &mut job).await;
        span.record("polls", job.polls());
        if let Err(err) = outcome {
            let outcome = if matches!(err, AppError::ExportTimeout { .. }) {
                "timeout"
            } else {
                "failed"
            };
            EXPORT_JOBS.add(1, &[KeyValue::new("outcome", outcome)]);
            return Err(err);
        }

        let artifact = self.fetch(token, &job).await?;
        span.record("bytes", artifact.len());
        EXPORT_JOBS.add(1, &[KeyValue::new("outcome", "completed")]);
        Ok(artifact)
    }

    pub async fn create_job(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        view_id: &str,
        config: &ExportConfig,
    ) -> AppResult<ExportJob> {
        let id = self
            .api
            .create_export_job(token, workspace_id, view_id, config)
            .await?;
        tracing::info!(job_id = %id, "export job created");
        Ok(ExportJob::new(id, workspace_id, view_id))
    }

    /// Polls until the job completes. Sleeps only after an in-progress answer.
    pub async fn wait_for_completion(
        &self,
        token: &AccessToken,
        job: &mut ExportJob,
    ) -> AppResult<()> {
        for poll in 1..=self.poll.max_polls {
            let status = self
                .api
                .job_status(token, &job.workspace_id, &job.id)
                .await?;
            EXPORT_POLLS.add(1, &[]);

            match job.observe(status.code, &self.poll) {
                JobState::Completed => {
                    tracing::info!(job_id = %job.id, poll, "export job completed");
                    return Ok(());
                }
                JobState::Failed { code } => {
                    tracing::error!(job_id = %job.id, code, "export job failed");
                    return Err(AppError::ExportFailed {
                        code,
                        body: truncate(&status.body, MAX_ERROR_BODY_CHARS),
                    });
                }
                JobState::Created | JobState::InProgress => {
                    tracing::debug!(job_id = %job.id, poll, code = status.code, "export in progress");
                    if poll < self.poll.max_polls {
                        tokio::time::sleep(self.poll.interval).await;
                    }
                }
            }
        }

        Err(AppError::ExportTimeout {
            job_id: job.id.clone(),
            polls: self.poll.max_polls,
        })
    }

    pub async fn fetch(&self, token: &AccessToken, job: &ExportJob) -> AppResult<Vec<u8>> {
        if job.state() != JobState::Completed {
            return Err(AppError::Validation(format!(
                "export job {} is not completed ({:?})",
                job.id,
                job.state()
            )));
        }

        let artifact = self.api.download(token, &job.workspace_id, &job.id).await?;
        if artifact.is_empty() {
            return Err(AppError::EmptyArtifact);
        }

        EXPORT_ARTIFACT_SIZE.record(artifact.len() as f64, &[]);
        tracing::info!(job_id = %job.id, bytes = artifact.len(), "export artifact downloaded");
        Ok(artifact)
    }
}
