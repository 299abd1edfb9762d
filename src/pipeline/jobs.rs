use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Deliver the exported dashboard unchanged.
    Forward,
    /// Analyze the export and deliver the rendered scorecard instead.
    Scorecard,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Forward => "forward",
            JobKind::Scorecard => "scorecard",
        }
    }
}

/// One job file from the jobs directory.
#[derive(Debug, Clone, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub kind: JobKind,
    pub view_id: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    pub template: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub export_file: Option<PathBuf>,
}

impl JobDefinition {
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> AppResult<Self> {
        let job: Self = serde_json::from_str(raw)?;
        job.validate()?;
        Ok(job)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("job name must not be empty".into()));
        }
        if self.view_id.trim().is_empty() {
            return Err(AppError::Validation(format!("job {}: view_id is empty", self.name)));
        }
        if self.template.trim().is_empty() {
            return Err(AppError::Validation(format!("job {}: template is empty", self.name)));
        }
        if self.recipients.iter().all(|r| r.trim().is_empty()) {
            return Err(AppError::Validation(format!(
                "job {}: at least one recipient is required",
                self.name
            )));
        }
        Ok(())
    }
}

/// Job files (`*.json`) in `dir`, sorted by file name.
pub fn discover(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut jobs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            jobs.push(path);
        }
    }
    jobs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(jobs)
}

/// `[start:end]` slice bounds with negative indices counted from the end and
/// out-of-range values clamped, so any pair of integers selects a valid range.
pub fn python_range(len: usize, start: i64, end: i64) -> Range<usize> {
    let clamp = |index: i64| -> usize {
        let len = len as i64;
        let resolved = if index < 0 { len + index } else { index };
        resolved.clamp(0, len) as usize
    };
    let (start, end) = (clamp(start), clamp(end));
    start..end.max(start)
}
