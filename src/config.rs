use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub otel_enabled: bool,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
    pub zoho: ZohoConfig,
    pub retry: RetryConfig,
    pub poll: PollConfig,
    pub export: ExportConfig,
    pub anthropic: AnthropicConfig,
    pub whatsapp: WhatsAppConfig,
    pub render: RenderConfig,
    pub batch: BatchConfig,
}

/// Long-lived OAuth credential used for the refresh-token grant.
#[derive(Clone)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ZohoConfig {
    pub data_center: String,
    pub org_id: String,
    pub workspace_id: String,
    pub credential: Credential,
    pub accounts_base_url: String,
    pub analytics_base_url: String,
    /// Status the token endpoint answers with when it throttles grants.
    pub rate_limit_status: u16,
}

impl ZohoConfig {
    /// Exports need an organisation and a complete refresh credential.
    pub fn require_credentials(&self) -> AppResult<()> {
        let missing: Vec<&str> = [
            ("ZOHO_ORG_ID", &self.org_id),
            ("ZOHO_CLIENT_ID", &self.credential.client_id),
            ("ZOHO_CLIENT_SECRET", &self.credential.client_secret),
            ("ZOHO_REFRESH_TOKEN", &self.credential.refresh_token),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config(format!("missing {}", missing.join(", "))))
        }
    }
}

/// Exponential backoff settings: attempt n > 1 waits `base^(n-1) + U(jitter_low, jitter_high)` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base: f64,
    pub jitter_low: f64,
    pub jitter_high: f64,
}

impl RetryConfig {
    /// Rejects settings that would make a backoff delay meaningless.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_attempts == 0 {
            return Err(AppError::Config(
                "TOKEN_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }
        for (key, value) in [
            ("RETRY_BASE", self.base),
            ("RETRY_JITTER_LOW", self.jitter_low),
            ("RETRY_JITTER_HIGH", self.jitter_high),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Config(format!(
                    "{key} must be a finite, non-negative number (got {value})"
                )));
            }
        }
        if self.jitter_low > self.jitter_high {
            return Err(AppError::Config(
                "RETRY_JITTER_LOW must not exceed RETRY_JITTER_HIGH".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base: 2.0,
            jitter_low: 0.5,
            jitter_high: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Poll budget; `interval * max_polls` is the export deadline.
    pub max_polls: u32,
    pub in_progress_codes: Vec<i64>,
    pub completed_code: i64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_polls: 120,
            in_progress_codes: vec![1001, 1002],
            completed_code: 1004,
        }
    }
}

/// Render configuration sent to the bulk export endpoint as the `CONFIG` parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfig {
    pub response_format: String,
    pub paper_size: u8,
    pub paper_style: String,
    pub show_title: u8,
    pub show_desc: u8,
    pub zoom_factor: u16,
    #[serde(rename = "generateTOC")]
    pub generate_toc: bool,
    pub dashboard_layout: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            response_format: "pdf".to_string(),
            paper_size: 4,
            paper_style: "Portrait".to_string(),
            show_title: 0,
            show_desc: 2,
            zoom_factor: 100,
            generate_toc: false,
            dashboard_layout: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub phone_number_id: String,
    pub token: String,
    pub graph_version: String,
    pub base_url: String,
    pub default_language: String,
    pub send_delay: Duration,
}

impl WhatsAppConfig {
    pub fn graph_base(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.graph_version)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub output_dir: PathBuf,
    /// Feedback score assumed when estimating the percentage an engineer without
    /// collected feedback would have reached.
    pub assumed_feedback_score: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output_reports"),
            assumed_feedback_score: 21,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub jobs_dir: PathBuf,
    pub inter_job_delay: Duration,
    pub start_jitter_max: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            jobs_dir: PathBuf::from("./jobs"),
            inter_job_delay: Duration::from_secs(15 * 60),
            start_jitter_max: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let data_center = var_or("ZOHO_DC", "in");
        let retry_defaults = RetryConfig::default();
        let poll_defaults = PollConfig::default();
        let render_defaults = RenderConfig::default();
        let batch_defaults = BatchConfig::default();

        let zoho = ZohoConfig {
            accounts_base_url: var_or(
                "ZOHO_ACCOUNTS_URL",
                &format!("https://accounts.zoho.{data_center}"),
            ),
            analytics_base_url: var_or(
                "ZOHO_ANALYTICS_URL",
                &format!("https://analyticsapi.zoho.{data_center}"),
            ),
            data_center,
            org_id: var_or("ZOHO_ORG_ID", ""),
            workspace_id: var_or("ZOHO_WORKSPACE_ID", ""),
            credential: Credential {
                client_id: var_or("ZOHO_CLIENT_ID", ""),
                client_secret: var_or("ZOHO_CLIENT_SECRET", ""),
                refresh_token: var_or("ZOHO_REFRESH_TOKEN", ""),
            },
            rate_limit_status: parse_var("ZOHO_RATE_LIMIT_STATUS", 400)?,
        };

        let retry = RetryConfig {
            max_attempts: parse_var("TOKEN_MAX_ATTEMPTS", retry_defaults.max_attempts)?,
            base: parse_var("RETRY_BASE", retry_defaults.base)?,
            jitter_low: parse_var("RETRY_JITTER_LOW", retry_defaults.jitter_low)?,
            jitter_high: parse_var("RETRY_JITTER_HIGH", retry_defaults.jitter_high)?,
        };
        retry.validate()?;

        let poll = PollConfig {
            interval: Duration::from_secs(parse_var(
                "EXPORT_POLL_INTERVAL_SECS",
                poll_defaults.interval.as_secs(),
            )?),
            max_polls: parse_var("EXPORT_MAX_POLLS", poll_defaults.max_polls)?,
            ..poll_defaults
        };

        let anthropic = AnthropicConfig {
            api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: var_or("ANTHROPIC_BASE_URL", "https://api.anthropic.com"),
            model: var_or("ANTHROPIC_MODEL", "claude-sonnet-4-5-20250929"),
            max_tokens: parse_var("ANTHROPIC_MAX_TOKENS", 4096)?,
        };

        let whatsapp = WhatsAppConfig {
            phone_number_id: var_or("WHATSAPP_PHONE_ID", ""),
            token: var_or("WA_TOKEN", ""),
            graph_version: var_or("GRAPH_VERSION", "v19.0"),
            base_url: var_or("GRAPH_BASE_URL", "https://graph.facebook.com"),
            default_language: var_or("WA_LANG", "en"),
            send_delay: Duration::from_secs(parse_var("WA_SEND_DELAY_SECS", 2)?),
        };

        let render = RenderConfig {
            output_dir: PathBuf::from(var_or(
                "OUTPUT_DIR",
                &render_defaults.output_dir.to_string_lossy(),
            )),
            assumed_feedback_score: parse_var(
                "ASSUMED_FEEDBACK_SCORE",
                render_defaults.assumed_feedback_score,
            )?,
        };

        let batch = BatchConfig {
            jobs_dir: PathBuf::from(var_or(
                "JOBS_DIR",
                &batch_defaults.jobs_dir.to_string_lossy(),
            )),
            inter_job_delay: Duration::from_secs(parse_var(
                "INTER_JOB_DELAY_SECS",
                batch_defaults.inter_job_delay.as_secs(),
            )?),
            start_jitter_max: seconds(
                "START_JITTER_MAX_SECS",
                parse_var(
                    "START_JITTER_MAX_SECS",
                    batch_defaults.start_jitter_max.as_secs_f64(),
                )?,
            )?,
        };

        Ok(Self {
            environment: var_or("SCORECARD_ENVIRONMENT", "development"),
            otel_enabled: parse_var("OTEL_ENABLED", false)?,
            otel_service_name: var_or("OTEL_SERVICE_NAME", "scorecard-pipeline"),
            otel_exporter_endpoint: var_or("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
            zoho,
            retry,
            poll,
            export: ExportConfig::default(),
            anthropic,
            whatsapp,
            render,
            batch,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Offline configuration with instant retries and no pauses.
    #[cfg(test)]
    pub(crate) fn for_tests(output_dir: &std::path::Path) -> Self {
        Self {
            environment: "test".to_string(),
            otel_enabled: false,
            otel_service_name: "scorecard-pipeline-test".to_string(),
            otel_exporter_endpoint: "http://localhost:4317".to_string(),
            zoho: ZohoConfig {
                data_center: "in".to_string(),
                org_id: "60012345".to_string(),
                workspace_id: "2389000000001".to_string(),
                credential: Credential {
                    client_id: "client".to_string(),
                    client_secret: "secret".to_string(),
                    refresh_token: "refresh".to_string(),
                },
                accounts_base_url: "http://127.0.0.1:1".to_string(),
                analytics_base_url: "http://127.0.0.1:1".to_string(),
                rate_limit_status: 400,
            },
            retry: RetryConfig {
                max_attempts: 3,
                base: 0.0,
                jitter_low: 0.0,
                jitter_high: 0.0,
            },
            poll: PollConfig::default(),
            export: ExportConfig::default(),
            anthropic: AnthropicConfig {
                api_key: None,
                base_url: "http://127.0.0.1:1".to_string(),
                model: "claude-sonnet-4-5-20250929".to_string(),
                max_tokens: 4096,
            },
            whatsapp: WhatsAppConfig {
                phone_number_id: "1055".to_string(),
                token: "wa-token".to_string(),
                graph_version: "v19.0".to_string(),
                base_url: "http://127.0.0.1:1".to_string(),
                default_language: "en".to_string(),
                send_delay: Duration::ZERO,
            },
            render: RenderConfig {
                output_dir: output_dir.to_path_buf(),
                ..RenderConfig::default()
            },
            batch: BatchConfig {
                jobs_dir: output_dir.join("jobs"),
                inter_job_delay: Duration::ZERO,
                start_jitter_max: Duration::ZERO,
            },
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn seconds(key: &str, secs: f64) -> AppResult<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| AppError::Config(format!("{key} is not a usable number of seconds ({secs}): {e}")))
}

fn parse_var<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid ({raw:?}): {e}"))),
        _ => Ok(default),
    }
}
