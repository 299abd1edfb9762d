use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use serde::Serialize;
use uuid::Uuid;

use super::jobs::python_range;
use crate::error::AppResult;
use crate::telemetry::metrics::BATCH_JOBS;

/// Runs a single job file end to end.
#[async_trait::async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_job(&self, path: &Path) -> AppResult<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub job: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub selected: usize,
    pub succeeded: usize,
    pub failed: Vec<JobFailure>,
}

/// Runs a slice of job files one after another. A failed job is logged and
/// the batch moves on to the next one.
pub struct BatchDriver<'a> {
    runner: &'a dyn JobRunner,
    inter_job_delay: Duration,
}

impl<'a> BatchDriver<'a> {
    pub fn new(runner: &'a dyn JobRunner, inter_job_delay: Duration) -> Self {
        Self {
            runner,
            inter_job_delay,
        }
    }

    #[tracing::instrument(
        name = "pipeline batch",
        skip(self, jobs),
        fields(batch.run_id, batch.selected, batch.succeeded, batch.failed)
    )]
    pub async fn run(&self, jobs: &[PathBuf], start: i64, end: i64) -> BatchSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let selected = &jobs[python_range(jobs.len(), start, end)];

        let span = tracing::Span::current();
        span.record("batch.run_id", tracing::field::display(run_id));
        span.record("batch.selected", selected.len());

        if selected.is_empty() {
            tracing::warn!(available = jobs.len(), start, end, "no jobs in the selected range");
        }

        let mut succeeded = 0;
        let mut failed = Vec::new();

        for (idx, path) in selected.iter().enumerate() {
            let job = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            tracing::info!(job = %job, "running job {} of {}", idx + 1, selected.len());

            match self.runner.run_job(path).await {
                Ok(()) => {
                    tracing::info!(job = %job, "job finished");
                    BATCH_JOBS.add(1, &[KeyValue::new("outcome", "succeeded")]);
                    succeeded += 1;
                }
                Err(err) => {
                    let at = Utc::now();
                    tracing::error!(job = %job, error = %err, at = %at.to_rfc3339(), "job failed");
                    BATCH_JOBS.add(1, &[KeyValue::new("outcome", "failed")]);
                    failed.push(JobFailure {
                        job,
                        error: err.to_string(),
                        at,
                    });
                }
            }

            if idx + 1 < selected.len() && !self.inter_job_delay.is_zero() {
                tracing::info!(
                    delay_secs = self.inter_job_delay.as_secs(),
                    "waiting before next job"
                );
                tokio::time::sleep(self.inter_job_delay).await;
            }
        }

        span.record("batch.succeeded", succeeded);
        span.record("batch.failed", failed.len());
        tracing::info!(
            run_id = %run_id,
            succeeded,
            failed = failed.len(),
            "batch finished"
        );

        BatchSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            selected: selected.len(),
            succeeded,
            failed,
        }
    }
}
