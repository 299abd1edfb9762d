use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::delivery::{DeliverySummary, DocumentTemplate, Messenger, deliver_to_all};
use crate::error::{AppError, AppResult};
use crate::llm::DocumentAnalyzer;
use crate::report::ReportRenderer;
use crate::report::render::sanitize;
use crate::zoho::{AnalyticsApi, AsyncJobPoller, TokenProvider};

use super::batch::JobRunner;
use super::jobs::{JobDefinition, JobKind};

#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: String,
    pub kind: JobKind,
    /// The file that was delivered: the raw export or the rendered scorecard.
    pub artifact: PathBuf,
    pub delivered: DeliverySummary,
}

/// Wires one job through export, optional analysis and rendering, and delivery.
pub struct Pipeline<'a> {
    config: &'a Config,
    analytics: &'a dyn AnalyticsApi,
    analyzer: Option<&'a dyn DocumentAnalyzer>,
    messenger: &'a dyn Messenger,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        analytics: &'a dyn AnalyticsApi,
        analyzer: Option<&'a dyn DocumentAnalyzer>,
        messenger: &'a dyn Messenger,
    ) -> Self {
        Self {
            config,
            analytics,
            analyzer,
            messenger,
        }
    }

    #[tracing::instrument(
        name = "pipeline job",
        skip(self, job),
        fields(
            job.name = %job.name,
            job.kind = job.kind.as_str(),
            job.artifact = tracing::field::Empty,
            job.duration_ms = tracing::field::Empty,
        )
    )]
    pub async fn run(&self, job: &JobDefinition) -> AppResult<JobReport> {
        let start = std::time::Instant::now();
        let span = tracing::Span::current();

        let analyzer = match (job.kind, self.analyzer) {
            (JobKind::Scorecard, None) => {
                return Err(AppError::Config(
                    "ANTHROPIC_API_KEY is required for scorecard jobs".into(),
                ));
            }
            (_, analyzer) => analyzer,
        };
        let workspace_id = job
            .workspace_id
            .as_deref()
            .unwrap_or(&self.config.zoho.workspace_id);
        if workspace_id.is_empty() {
            return Err(AppError::Config(format!(
                "job {}: no workspace_id and ZOHO_WORKSPACE_ID is unset",
                job.name
            )));
        }

        let jitter_max = self.config.batch.start_jitter_max;
        if !jitter_max.is_zero() {
            let jitter = jitter_max.mul_f64(fastrand::f64());
            tracing::debug!(jitter_ms = jitter.as_millis() as u64, "start jitter");
            tokio::time::sleep(jitter).await;
        }

        // Stage 1: access token
        let token = TokenProvider::new(
            self.analytics,
            self.config.retry.clone(),
            self.config.zoho.rate_limit_status,
        )
        .get_access_token(&self.config.zoho.credential)
        .await?;

        // Stage 2: export the dashboard
        let exported = AsyncJobPoller::new(self.analytics, self.config.poll.clone())
            .export(&token, workspace_id, &job.view_id, &self.config.export)
            .await?;
        let export_path = job.export_file.clone().unwrap_or_else(|| {
            self.config
                .render
                .output_dir
                .join(format!("{}_export.pdf", sanitize(&job.name)))
        });
        write_artifact(&export_path, &exported).await?;

        // Stage 3: scorecard jobs swap the export for the rendered report
        let artifact = match analyzer {
            Some(analyzer) if job.kind == JobKind::Scorecard => {
                let record = analyzer.analyze(&exported).await?;
                let renderer = ReportRenderer::new(self.config.render.clone());
                renderer.render(&record, renderer.output_dir())?
            }
            _ => export_path,
        };
        span.record("job.artifact", tracing::field::display(artifact.display()));

        // Stage 4: upload once, send per recipient
        let media_id = self.messenger.upload_media(&artifact).await?;
        let template = DocumentTemplate {
            name: job.template.clone(),
            language: job
                .language
                .clone()
                .unwrap_or_else(|| self.config.whatsapp.default_language.clone()),
            media_id,
            filename: artifact
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "report.pdf".to_string()),
        };
        let delivered = deliver_to_all(
            self.messenger,
            &template,
            &job.recipients,
            self.config.whatsapp.send_delay,
        )
        .await;

        span.record("job.duration_ms", start.elapsed().as_millis() as u64);

        if delivered.all_failed() {
            let reasons = delivered
                .failed
                .iter()
                .map(|(recipient, reason)| format!("{recipient}: {reason}"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AppError::Delivery(format!(
                "no recipient received {}: {reasons}",
                template.filename
            )));
        }

        tracing::info!(
            artifact = %artifact.display(),
            sent = delivered.sent,
            failed = delivered.failed.len(),
            "job completed"
        );
        Ok(JobReport {
            job: job.name.clone(),
            kind: job.kind,
            artifact,
            delivered,
        })
    }
}

#[async_trait::async_trait]
impl JobRunner for Pipeline<'_> {
    async fn run_job(&self, path: &Path) -> AppResult<()> {
        let job = JobDefinition::load(path)?;
        self.run(&job).await.map(|_| ())
    }
}

/// Writes the export to disk and re-reads its size so a truncated write is caught before delivery.
async fn write_artifact(path: &Path, bytes: &[u8]) -> AppResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;

    let size = tokio::fs::metadata(path).await?.len();
    if size == 0 {
        return Err(AppError::EmptyArtifact);
    }
    tracing::info!(path = %path.display(), bytes = size, "export saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::testing::RecordingMessenger;
    use crate::report::PerformanceRecord;
    use crate::report::record::fixtures::complete_record;
    use crate::zoho::testing::ScriptedApi;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedAnalyzer {
        calls: AtomicU32,
    }

    impl FixedAnalyzer {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl DocumentAnalyzer for FixedAnalyzer {
        async fn analyze(&self, pdf: &[u8]) -> AppResult<PerformanceRecord> {
            assert!(pdf.starts_with(b"%PDF"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(complete_record())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn job(kind: JobKind, recipients: &[&str]) -> JobDefinition {
        JobDefinition {
            name: "North region".to_string(),
            kind,
            view_id: "2389000000123".to_string(),
            workspace_id: None,
            template: "zoho_engineer_performance_report".to_string(),
            language: None,
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            export_file: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_job_delivers_the_export() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path());
        let api = ScriptedApi::new().with_statuses(&[1002, 1004]);
        let messenger = RecordingMessenger::default();
        let pipeline = Pipeline::new(&config, &api, None, &messenger);

        let report = pipeline.run(&job(JobKind::Forward, &["111", "222"])).await.unwrap();

        let expected = dir.path().join("North_region_export.pdf");
        assert_eq!(report.artifact, expected);
        assert_eq!(std::fs::read(&expected).unwrap(), b"%PDF-1.4 scripted export");
        assert_eq!(*messenger.uploads.lock().unwrap(), [expected]);
        assert_eq!(report.delivered.sent, 2);
        assert_eq!(ScriptedApi::count(&api.download_calls), 1);
        let sends = messenger.sends.lock().unwrap();
        assert!(sends.iter().all(|(_, file)| file == "North_region_export.pdf"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scorecard_job_delivers_the_rendered_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path());
        let api = ScriptedApi::new().with_statuses(&[1004]);
        let analyzer = FixedAnalyzer::new();
        let messenger = RecordingMessenger::default();
        let pipeline = Pipeline::new(&config, &api, Some(&analyzer), &messenger);

        let report = pipeline.run(&job(JobKind::Scorecard, &["111"])).await.unwrap();

        let rendered = dir
            .path()
            .join("Asha_Verma_Feb_2___Feb_7__2026_analysis.pdf");
        assert_eq!(report.artifact, rendered);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("North_region_export.pdf").exists());
        let pdf = lopdf::Document::load(&rendered).unwrap();
        assert_eq!(pdf.get_pages().len(), 3);
        assert_eq!(
            messenger.sends.lock().unwrap()[0].1,
            "Asha_Verma_Feb_2___Feb_7__2026_analysis.pdf"
        );
    }

    #[tokio::test]
    async fn test_scorecard_without_analyzer_fails_before_network() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path());
        let api = ScriptedApi::new();
        let messenger = RecordingMessenger::default();
        let pipeline = Pipeline::new(&config, &api, None, &messenger);

        let err = pipeline.run(&job(JobKind::Scorecard, &["111"])).await.unwrap_err();

        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(ScriptedApi::count(&api.token_calls), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_failure_stops_before_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path());
        let api = ScriptedApi::new().with_statuses(&[1001, 1003]);
        let messenger = RecordingMessenger::default();
        let pipeline = Pipeline::new(&config, &api, None, &messenger);

        let err = pipeline.run(&job(JobKind::Forward, &["111"])).await.unwrap_err();

        assert!(matches!(err, AppError::ExportFailed { code: 1003, .. }));
        assert!(messenger.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_export_is_not_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path());
        let api = ScriptedApi::new().with_statuses(&[1004]).with_artifact(b"");
        let messenger = RecordingMessenger::default();
        let pipeline = Pipeline::new(&config, &api, None, &messenger);

        let err = pipeline.run(&job(JobKind::Forward, &["111"])).await.unwrap_err();

        assert!(matches!(err, AppError::EmptyArtifact));
        assert!(messenger.sends.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_delivery_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path());
        let api = ScriptedApi::new().with_statuses(&[1004]);
        let messenger = RecordingMessenger::rejecting(&["222"]);
        let pipeline = Pipeline::new(&config, &api, None, &messenger);

        let report = pipeline
            .run(&job(JobKind::Forward, &["111", "222", "333"]))
            .await
            .unwrap();

        assert_eq!(report.delivered.sent, 2);
        assert_eq!(report.delivered.failed[0].0, "222");
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_recipient_rejected_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path());
        let api = ScriptedApi::new().with_statuses(&[1004]);
        let messenger = RecordingMessenger::rejecting(&["111", "222"]);
        let pipeline = Pipeline::new(&config, &api, None, &messenger);

        let err = pipeline
            .run(&job(JobKind::Forward, &["111", "222"]))
            .await
            .unwrap_err();

        match err {
            AppError::Delivery(message) => {
                assert!(message.contains("111"));
                assert!(message.contains("222"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_job_loads_definition_and_honors_export_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path());
        let api = ScriptedApi::new().with_statuses(&[1004]);
        let messenger = RecordingMessenger::default();
        let pipeline = Pipeline::new(&config, &api, None, &messenger);

        let export = dir.path().join("exports").join("weekly.pdf");
        let job_file = dir.path().join("01_north.json");
        std::fs::write(
            &job_file,
            serde_json::json!({
                "name": "North region",
                "kind": "forward",
                "view_id": "2389000000123",
                "workspace_id": "2389000000999",
                "template": "zoho_report_weekly",
                "language": "en_US",
                "recipients": ["111"],
                "export_file": &export,
            })
            .to_string(),
        )
        .unwrap();

        pipeline.run_job(&job_file).await.unwrap();

        assert!(export.exists());
        assert_eq!(*messenger.uploads.lock().unwrap(), [export]);
    }

    #[tokio::test]
    async fn test_run_job_with_invalid_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path());
        let api = ScriptedApi::new();
        let messenger = RecordingMessenger::default();
        let pipeline = Pipeline::new(&config, &api, None, &messenger);

        let job_file = dir.path().join("broken.json");
        std::fs::write(&job_file, "{\"name\": ").unwrap();

        let err = pipeline.run_job(&job_file).await.unwrap_err();
        assert!(matches!(err, AppError::Json(_)));
        assert_eq!(ScriptedApi::count(&api.token_calls), 0);
    }
}
