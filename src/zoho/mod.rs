//! Zoho Analytics access: OAuth refresh-token grant and the asynchronous bulk export workflow.

pub mod client;
pub mod export;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{AccessToken, AnalyticsApi, JobStatus, TokenResponse, ZohoClient};
pub use export::{AsyncJobPoller, ExportJob, JobState};
pub use token::TokenProvider;
