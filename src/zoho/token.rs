use crate::config::{Credential, RetryConfig};
use crate::error::{AppError, AppResult};
use crate::retry::BackoffRetrier;

use super::client::{AccessToken, AnalyticsApi};

/// Exchanges the long-lived refresh credential for a short-lived access token.
pub struct TokenProvider<'a> {
    api: &'a dyn AnalyticsApi,
    retrier: BackoffRetrier,
    rate_limit_status: u16,
}

impl<'a> TokenProvider<'a> {
    pub fn new(api: &'a dyn AnalyticsApi, retry: RetryConfig, rate_limit_status: u16) -> Self {
        Self {
            api,
            retrier: BackoffRetrier::new(retry, "zoho_token_refresh"),
            rate_limit_status,
        }
    }

    /// Transport failures and the throttling status are retried; every other
    /// error status fails the grant on the spot.
    pub fn is_retryable(&self, err: &AppError) -> bool {
        err.is_transport() || err.status() == Some(self.rate_limit_status)
    }

    #[tracing::instrument(
        name = "pipeline_stage token",
        skip(self, credential),
        fields(attempts = tracing::field::Empty)
    )]
    pub async fn get_access_token(&self, credential: &Credential) -> AppResult<AccessToken> {
        let response = self
            .retrier
            .execute(
                || self.api.refresh_access_token(credential),
                |err| self.is_retryable(err),
            )
            .await
            .map_err(|err| {
                tracing::Span::current().record("attempts", err.attempts());
                err.into_inner()
            })?;

        match response.access_token.filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                tracing::info!("access token obtained");
                Ok(AccessToken::new(token))
            }
            None => Err(AppError::Auth(match response.error {
                Some(reason) => format!("token endpoint returned no access_token: {reason}"),
                None => "token endpoint returned no access_token".to_string(),
            })),
        }
    }
}
