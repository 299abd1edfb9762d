use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use opentelemetry::KeyValue;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::prompt::EXTRACTION_PROMPT;
use super::{DocumentAnalyzer, parse_analysis};
use crate::config::{AnthropicConfig, RetryConfig};
use crate::error::{AppError, AppResult};
use crate::report::PerformanceRecord;
use crate::retry::BackoffRetrier;
use crate::telemetry::metrics::ANALYSIS_DURATION;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

pub struct AnthropicAnalyzer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    retrier: BackoffRetrier,
}

impl AnthropicAnalyzer {
    pub fn new(config: &AnthropicConfig, retry: RetryConfig) -> AppResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Config("ANTHROPIC_API_KEY is required for scorecard jobs".into()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            retrier: BackoffRetrier::new(retry, "anthropic_messages"),
        })
    }

    fn is_retryable(err: &AppError) -> bool {
        err.is_transport()
            || matches!(err.status(), Some(429) | Some(529) | Some(500..=599))
    }

    async fn send(&self, body: &AnthropicRequest<'_>) -> AppResult<AnthropicResponse> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| AppError::Config(format!("invalid API key header: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .headers(headers)
            .json(body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&error_body)
                .map(|e| e.error.message)
                .unwrap_or(error_body);
            return Err(AppError::api(status.as_u16(), &message));
        }

        Ok(response.json().await?)
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Document { source: DocumentSource },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct DocumentSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

#[async_trait::async_trait]
impl DocumentAnalyzer for AnthropicAnalyzer {
    #[tracing::instrument(
        name = "pipeline_stage analyze",
        skip(self, pdf),
        fields(
            model = %self.model,
            pdf_bytes = pdf.len(),
            input_tokens = tracing::field::Empty,
            output_tokens = tracing::field::Empty,
            stop_reason = tracing::field::Empty
        )
    )]
    async fn analyze(&self, pdf: &[u8]) -> AppResult<PerformanceRecord> {
        let started = Instant::now();
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![
                    ContentBlock::Document {
                        source: DocumentSource {
                            kind: "base64",
                            media_type: "application/pdf",
                            data: STANDARD.encode(pdf),
                        },
                    },
                    ContentBlock::Text {
                        text: EXTRACTION_PROMPT,
                    },
                ],
            }],
        };

        let result = self
            .retrier
            .execute(|| self.send(&body), Self::is_retryable)
            .await;
        ANALYSIS_DURATION.record(
            started.elapsed().as_secs_f64(),
            &[
                KeyValue::new("model", self.model.clone()),
                KeyValue::new("outcome", if result.is_ok() { "ok" } else { "error" }),
            ],
        );
        let response = result?;

        let span = tracing::Span::current();
        if let Some(usage) = &response.usage {
            span.record("input_tokens", usage.input_tokens);
            span.record("output_tokens", usage.output_tokens);
        }
        if let Some(reason) = &response.stop_reason {
            span.record("stop_reason", reason.as_str());
        }

        let content = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if content.trim().is_empty() {
            return Err(AppError::Analysis("model returned no text content".into()));
        }

        let record = parse_analysis(&content)?;
        tracing::info!(
            engineer = %record.engineer_name,
            period = %record.week_range,
            "performance record extracted"
        );
        Ok(record)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn analyzer(server: &MockServer) -> AnthropicAnalyzer {
        AnthropicAnalyzer::new(
            &AnthropicConfig {
                api_key: Some("sk-test".to_string()),
                base_url: server.base_url(),
                model: "claude-sonnet-4-5-20250929".to_string(),
                max_tokens: 4096,
            },
            RetryConfig {
                max_attempts: 3,
                base: 0.0,
                jitter_low: 0.0,
                jitter_high: 0.0,
            },
        )
        .unwrap()
    }

    fn text_response(text: &str) -> serde_json::Value {
        json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-5-20250929",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1200, "output_tokens": 800}
        })
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let result = AnthropicAnalyzer::new(
            &AnthropicConfig {
                api_key: None,
                base_url: "http://localhost".to_string(),
                model: "m".to_string(),
                max_tokens: 1,
            },
            RetryConfig::default(),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(AnthropicAnalyzer::is_retryable(&AppError::api(429, "")));
        assert!(AnthropicAnalyzer::is_retryable(&AppError::api(529, "overloaded")));
        assert!(AnthropicAnalyzer::is_retryable(&AppError::api(503, "")));
        assert!(!AnthropicAnalyzer::is_retryable(&AppError::api(400, "")));
        assert!(!AnthropicAnalyzer::is_retryable(&AppError::api(401, "")));
    }

    #[tokio::test]
    async fn test_analyze_sends_document_block_and_parses_fenced_answer() {
        let server = MockServer::start_async().await;
        let answer = "```json\n{\"engineer_name\": \"Asha Verma\", \"week_range\": \"Feb 2 - Feb 7\", \
            \"working_hours\": {\"score\": 18}, \"form_quality\": {\"score\": 12}, \
            \"feedback\": {\"score\": 22}, \"repeat_calls\": {\"score\": 30}}\n```";
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .header("x-api-key", "sk-test")
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .body_contains("\"type\":\"document\"")
                    .body_contains("\"media_type\":\"application/pdf\"")
                    .body_contains(&STANDARD.encode(b"%PDF-1.4 dashboard"));
                then.status(200).json_body(text_response(answer));
            })
            .await;

        let record = analyzer(&server).analyze(b"%PDF-1.4 dashboard").await.unwrap();

        mock.assert_async().await;
        assert_eq!(record.engineer_name, "Asha Verma");
        assert_eq!(record.total_score(), 82);
    }

    #[tokio::test]
    async fn test_overloaded_api_is_retried_until_exhausted() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(529)
                    .json_body(json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}));
            })
            .await;

        let err = analyzer(&server).analyze(b"%PDF").await.unwrap_err();

        assert_eq!(mock.hits_async().await, 3);
        match err {
            AppError::Api { status, body } => {
                assert_eq!(status, 529);
                assert_eq!(body, "Overloaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(400).body("bad request");
            })
            .await;

        let err = analyzer(&server).analyze(b"%PDF").await.unwrap_err();

        assert_eq!(mock.hits_async().await, 1);
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn test_malformed_answer_is_analysis_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200)
                    .json_body(text_response("{\"engineer_name\": \"X\", \"working_hours\": "));
            })
            .await;

        let err = analyzer(&server).analyze(b"%PDF").await.unwrap_err();
        assert!(matches!(err, AppError::Analysis(_)));
    }
}
