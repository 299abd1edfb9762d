pub mod anthropic;
pub mod prompt;

pub use anthropic::AnthropicAnalyzer;

use crate::error::{AppError, AppResult};
use crate::report::PerformanceRecord;

/// Turns an exported dashboard PDF into a validated performance record.
#[async_trait::async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn analyze(&self, pdf: &[u8]) -> AppResult<PerformanceRecord>;

    fn name(&self) -> &str;
}

/// Parses a model answer into a record. Malformed JSON is an analysis failure;
/// out-of-range scores stay validation failures.
pub fn parse_analysis(content: &str) -> AppResult<PerformanceRecord> {
    let json = extract_json(content);
    PerformanceRecord::from_json(&json).map_err(|err| match err {
        AppError::Json(e) => AppError::Analysis(format!(
            "model answer is not a valid performance record: {e}"
        )),
        other => other,
    })
}

pub(crate) fn extract_json(content: &str) -> String {
    let content = content.trim();
    if let Some(start) = content.find("```json")
        && let Some(end) = content[start + 7..].find("```")
    {
        return content[start + 7..start + 7 + end].trim().to_string();
    }
    if let Some(start) = content.find("```")
        && let Some(end) = content[start + 3..].find("```")
    {
        let inner = content[start + 3..start + 3 + end].trim();
        if inner.starts_with('{') {
            return inner.to_string();
        }
    }
    if let Some(start) = content.find('{')
        && let Some(end) = content.rfind('}')
        && start < end
    {
        return content[start..=end].to_string();
    }
    content.to_string()
}
