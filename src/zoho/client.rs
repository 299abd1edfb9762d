use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

use crate::config::{Credential, ExportConfig, ZohoConfig};
use crate::error::{AppError, AppResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(180);

/// Short-lived bearer credential for the analytics API.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Body of a successful call to the token endpoint. The endpoint may answer
/// 200 without a token, so the field stays optional here and is checked upstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub code: i64,
    pub body: String,
}

#[async_trait::async_trait]
pub trait AnalyticsApi: Send + Sync {
    async fn refresh_access_token(&self, credential: &Credential) -> AppResult<TokenResponse>;

    async fn create_export_job(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        view_id: &str,
        config: &ExportConfig,
    ) -> AppResult<String>;

    async fn job_status(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        job_id: &str,
    ) -> AppResult<JobStatus>;

    async fn download(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        job_id: &str,
    ) -> AppResult<Vec<u8>>;
}

pub struct ZohoClient {
    client: reqwest::Client,
    accounts_base: String,
    analytics_base: String,
    org_id: String,
}

impl ZohoClient {
    pub fn new(config: &ZohoConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            accounts_base: config.accounts_base_url.trim_end_matches('/').to_string(),
            analytics_base: config.analytics_base_url.trim_end_matches('/').to_string(),
            org_id: config.org_id.clone(),
        }
    }

    fn headers(&self, token: &AccessToken) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Zoho-oauthtoken {}", token.as_str()))
                .map_err(|e| AppError::Auth(format!("invalid access token header: {e}")))?,
        );
        headers.insert(
            "ZANALYTICS-ORGID",
            HeaderValue::from_str(&self.org_id)
                .map_err(|e| AppError::Config(format!("invalid org id header: {e}")))?,
        );
        Ok(headers)
    }

    fn export_jobs_url(&self, workspace_id: &str, job_id: &str) -> String {
        format!(
            "{}/restapi/v2/bulk/workspaces/{workspace_id}/exportjobs/{job_id}",
            self.analytics_base
        )
    }

    async fn read_success(response: reqwest::Response) -> AppResult<String> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AppError::api(status.as_u16(), &body));
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl AnalyticsApi for ZohoClient {
    async fn refresh_access_token(&self, credential: &Credential) -> AppResult<TokenResponse> {
        let url = format!("{}/oauth/v2/token", self.accounts_base);
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", credential.refresh_token.as_str()),
        ];

        let response = self
            .client
            .post(url)
            .form(&params)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let body = Self::read_success(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn create_export_job(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        view_id: &str,
        config: &ExportConfig,
    ) -> AppResult<String> {
        let url = format!(
            "{}/restapi/v2/bulk/workspaces/{workspace_id}/views/{view_id}/data",
            self.analytics_base
        );
        let config_json = serde_json::to_string(config)?;

        let response = self
            .client
            .get(url)
            .headers(self.headers(token)?)
            .query(&[("CONFIG", config_json)])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let body = Self::read_success(response).await?;
        let parsed: Value = serde_json::from_str(&body)?;
        scalar_to_string(&parsed["data"]["jobId"]).ok_or_else(|| {
            AppError::Validation(format!(
                "export job response has no data.jobId: {}",
                crate::error::truncate(&body, crate::error::MAX_ERROR_BODY_CHARS)
            ))
        })
    }

    async fn job_status(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        job_id: &str,
    ) -> AppResult<JobStatus> {
        let response = self
            .client
            .get(self.export_jobs_url(workspace_id, job_id))
            .headers(self.headers(token)?)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let body = Self::read_success(response).await?;
        let parsed: Value = serde_json::from_str(&body)?;
        Ok(JobStatus {
            code: job_code(&parsed),
            body,
        })
    }

    async fn download(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        job_id: &str,
    ) -> AppResult<Vec<u8>> {
        let url = format!("{}/data", self.export_jobs_url(workspace_id, job_id));
        let response = self
            .client
            .get(url)
            .headers(self.headers(token)?)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::api(status.as_u16(), &body));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Reads `data.jobCode`, which the API sends either as a number or a numeric string.
/// A missing or unparsable code reads as 0, which matches no known state.
pub(crate) fn job_code(body: &Value) -> i64 {
    let code = &body["data"]["jobCode"];
    code.as_i64()
        .or_else(|| code.as_str().and_then(|s| s.trim().parse().ok()))
        .unwrap_or(0)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
