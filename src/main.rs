use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use scorecard_pipeline::config::Config;
use scorecard_pipeline::delivery::WhatsAppClient;
use scorecard_pipeline::llm::{AnthropicAnalyzer, DocumentAnalyzer};
use scorecard_pipeline::pipeline::{BatchDriver, JobDefinition, Pipeline, discover};
use scorecard_pipeline::report::{PerformanceRecord, ReportRenderer};
use scorecard_pipeline::telemetry::init_telemetry;
use scorecard_pipeline::zoho::ZohoClient;

#[derive(Parser)]
#[command(name = "scorecard")]
#[command(about = "Export analytics dashboards, score them, and deliver them over WhatsApp")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a slice of the job files, sorted by name, one after another
    Batch {
        /// First job index (negative counts from the end)
        #[arg(allow_negative_numbers = true)]
        start: i64,

        /// End index, exclusive (negative counts from the end)
        #[arg(allow_negative_numbers = true)]
        end: i64,

        #[arg(long, env = "JOBS_DIR")]
        jobs_dir: Option<PathBuf>,
    },
    /// Run a single job file
    Run { job: PathBuf },
    /// Render a performance record JSON file without any network access
    Render {
        record: PathBuf,

        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before clap resolves env-backed arguments
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let telemetry_guard = init_telemetry(&config)?;

    tracing::info!(
        environment = %config.environment,
        version = env!("CARGO_PKG_VERSION"),
        "Starting scorecard"
    );

    let result = execute(cli.command, &config).await;
    if let Err(err) = &result {
        tracing::error!(error = %err, "scorecard aborted");
    }

    telemetry_guard.shutdown();
    result
}

async fn execute(command: Commands, config: &Config) -> anyhow::Result<()> {
    match command {
        Commands::Render { record, output_dir } => render(config, &record, output_dir),
        Commands::Run { job } => {
            let job = JobDefinition::load(&job)?;
            let adapters = Adapters::connect(config)?;
            let report = adapters.pipeline(config).run(&job).await?;
            tracing::info!(
                job = %report.job,
                artifact = %report.artifact.display(),
                sent = report.delivered.sent,
                failed = report.delivered.failed.len(),
                "job delivered"
            );
            Ok(())
        }
        Commands::Batch {
            start,
            end,
            jobs_dir,
        } => {
            let jobs_dir = jobs_dir.unwrap_or_else(|| config.batch.jobs_dir.clone());
            let jobs = discover(&jobs_dir)?;
            tracing::info!(dir = %jobs_dir.display(), found = jobs.len(), "job files discovered");

            let adapters = Adapters::connect(config)?;
            let pipeline = adapters.pipeline(config);
            let summary = BatchDriver::new(&pipeline, config.batch.inter_job_delay)
                .run(&jobs, start, end)
                .await;
            for failure in &summary.failed {
                tracing::warn!(job = %failure.job, error = %failure.error, "failed job");
            }
            tracing::info!(summary = %serde_json::to_string(&summary)?, "batch summary");
            Ok(())
        }
    }
}

/// The live API clients a pipeline runs against.
struct Adapters {
    analytics: ZohoClient,
    messenger: WhatsAppClient,
    analyzer: Option<AnthropicAnalyzer>,
}

impl Adapters {
    fn connect(config: &Config) -> anyhow::Result<Self> {
        config.zoho.require_credentials()?;
        let analyzer = if config.anthropic.api_key.is_some() {
            let analyzer = AnthropicAnalyzer::new(&config.anthropic, config.retry.clone())?;
            tracing::info!(analyzer = analyzer.name(), model = %config.anthropic.model, "analyzer initialized");
            Some(analyzer)
        } else {
            tracing::warn!("ANTHROPIC_API_KEY not set, scorecard jobs will fail");
            None
        };
        Ok(Self {
            analytics: ZohoClient::new(&config.zoho),
            messenger: WhatsAppClient::new(&config.whatsapp)?,
            analyzer,
        })
    }

    fn pipeline<'a>(&'a self, config: &'a Config) -> Pipeline<'a> {
        Pipeline::new(
            config,
            &self.analytics,
            self.analyzer.as_ref().map(|a| a as &dyn DocumentAnalyzer),
            &self.messenger,
        )
    }
}

fn render(config: &Config, record: &Path, output_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(record)?;
    let record = PerformanceRecord::from_json(&raw)?;
    let renderer = ReportRenderer::new(config.render.clone());
    let output_dir = output_dir.unwrap_or_else(|| renderer.output_dir().to_path_buf());
    let path = renderer.render(&record, &output_dir)?;
    println!("{}", path.display());
    Ok(())
}
