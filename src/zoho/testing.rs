use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::{Credential, ExportConfig};
use crate::error::{AppError, AppResult};

use super::client::{AccessToken, AnalyticsApi, JobStatus, TokenResponse};

/// Analytics API double that replays scripted answers and counts calls.
pub(crate) struct ScriptedApi {
    tokens: Mutex<VecDeque<AppResult<TokenResponse>>>,
    statuses: Mutex<VecDeque<i64>>,
    artifact: Vec<u8>,
    pub token_calls: AtomicU32,
    pub create_calls: AtomicU32,
    pub status_calls: AtomicU32,
    pub download_calls: AtomicU32,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            artifact: b"%PDF-1.4 scripted export".to_vec(),
            token_calls: AtomicU32::new(0),
            create_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
            download_calls: AtomicU32::new(0),
        }
    }

    pub fn with_tokens(self, tokens: Vec<AppResult<TokenResponse>>) -> Self {
        *self.tokens.lock().unwrap() = tokens.into();
        self
    }

    /// Job codes answered by successive polls; once exhausted every poll answers 1001.
    pub fn with_statuses(self, statuses: &[i64]) -> Self {
        *self.statuses.lock().unwrap() = statuses.iter().copied().collect();
        self
    }

    pub fn with_artifact(mut self, artifact: &[u8]) -> Self {
        self.artifact = artifact.to_vec();
        self
    }

    pub fn granted(token: &str) -> AppResult<TokenResponse> {
        Ok(TokenResponse {
            access_token: Some(token.to_string()),
            error: None,
        })
    }

    pub fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AnalyticsApi for ScriptedApi {
    async fn refresh_access_token(&self, _credential: &Credential) -> AppResult<TokenResponse> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Self::granted("scripted-token"))
    }

    async fn create_export_job(
        &self,
        _token: &AccessToken,
        _workspace_id: &str,
        _view_id: &str,
        _config: &ExportConfig,
    ) -> AppResult<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok("job-1".to_string())
    }

    async fn job_status(
        &self,
        _token: &AccessToken,
        _workspace_id: &str,
        _job_id: &str,
    ) -> AppResult<JobStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let code = self.statuses.lock().unwrap().pop_front().unwrap_or(1001);
        Ok(JobStatus {
            code,
            body: format!("{{\"data\":{{\"jobCode\":\"{code}\"}}}}"),
        })
    }

    async fn download(
        &self,
        _token: &AccessToken,
        _workspace_id: &str,
        _job_id: &str,
    ) -> AppResult<Vec<u8>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.artifact.clone())
    }
}

pub(crate) fn rate_limited() -> AppResult<TokenResponse> {
    Err(AppError::api(400, "You have made too many requests continuously"))
}
