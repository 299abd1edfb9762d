use thiserror::Error;

/// Upper bound on how much of a response body is kept in an error for diagnostics.
pub const MAX_ERROR_BODY_CHARS: usize = 1000;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Export job failed with jobCode={code}: {body}")]
    ExportFailed { code: i64, body: String },

    #[error("Export job {job_id} did not complete after {polls} polls")]
    ExportTimeout { job_id: String, polls: u32 },

    #[error("Downloaded artifact is missing or empty")]
    EmptyArtifact,

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Delivery error: {0}")]
    Delivery(String),
}

impl AppError {
    /// Builds an [`AppError::Api`] from a status and a raw body, truncating the body.
    pub fn api(status: u16, body: &str) -> Self {
        AppError::Api {
            status,
            body: truncate(body, MAX_ERROR_BODY_CHARS),
        }
    }

    /// True for failures below the HTTP layer: timeouts, refused connections, broken requests.
    pub fn is_transport(&self) -> bool {
        match self {
            AppError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Api { status, .. } => Some(*status),
            AppError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

pub(crate) fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
