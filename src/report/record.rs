//! The structured weekly performance record the scorecard is rendered from.
//!
//! Rollups supplied upstream (`total_score`, `max_possible`, `percentage`) are kept
//! only for reference; the renderer always recomputes them from the sections.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};

pub const WORKING_HOURS_MAX: u32 = 20;
pub const FORM_QUALITY_MAX: u32 = 20;
pub const FEEDBACK_MAX: u32 = 30;
pub const REPEAT_CALLS_MAX: u32 = 30;
/// Largest `max_score` a section may declare.
pub const MAX_SECTION_SCORE: u32 = 1000;
const PRIOR_MAX: u32 = 70;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    #[serde(default, deserialize_with = "text")]
    pub engineer_name: String,
    #[serde(default, deserialize_with = "text")]
    pub week_range: String,
    pub working_hours: WorkingHours,
    pub form_quality: FormQuality,
    pub feedback: Feedback,
    pub repeat_calls: RepeatCalls,
    #[serde(default)]
    pub total_score: Option<f64>,
    #[serde(default)]
    pub max_possible: Option<f64>,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub week1_total: Option<u32>,
    #[serde(default = "prior_max")]
    pub week1_max: u32,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub immediate_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub score: u32,
    #[serde(default = "working_hours_max")]
    pub max_score: u32,
    #[serde(default)]
    pub days: Vec<DayEntry>,
    #[serde(default)]
    pub week1_score: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayEntry {
    #[serde(default, deserialize_with = "text")]
    pub day: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub hours: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub check_in: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub check_out: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormQuality {
    pub score: u32,
    #[serde(default = "form_quality_max")]
    pub max_score: u32,
    #[serde(default)]
    pub examples: Vec<FormExample>,
    #[serde(default)]
    pub week1_score: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormExample {
    #[serde(default, deserialize_with = "optional_text")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub machine_no: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub work_type: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub problem: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub work_done: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub quality_assessment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default)]
    pub score: u32,
    #[serde(default = "feedback_max")]
    pub max_score: u32,
    #[serde(default = "applicable")]
    pub applicable: bool,
    #[serde(default)]
    pub ratings: Vec<Rating>,
    #[serde(default)]
    pub week1_score: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    #[serde(default, deserialize_with = "optional_text")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub machine_no: Option<String>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default = "rating_scale")]
    pub out_of: f64,
    #[serde(default, deserialize_with = "optional_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatCalls {
    pub score: u32,
    #[serde(default = "repeat_calls_max")]
    pub max_score: u32,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub calls: Vec<RepeatCall>,
    #[serde(default)]
    pub week1_score: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepeatCall {
    #[serde(default, deserialize_with = "optional_text")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub machine_no: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub first_visit: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub repeat_date: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub issue_type: Option<String>,
}

impl PerformanceRecord {
    /// Parses and validates a record. Shape errors surface as [`AppError::Json`],
    /// score violations as [`AppError::Validation`].
    pub fn from_json(raw: &str) -> AppResult<Self> {
        let record: Self = serde_json::from_str(raw)?;
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> AppResult<()> {
        let sections = [
            ("working_hours", self.working_hours.score, self.working_hours.max_score),
            ("form_quality", self.form_quality.score, self.form_quality.max_score),
            ("feedback", self.feedback.score, self.feedback.max_score),
            ("repeat_calls", self.repeat_calls.score, self.repeat_calls.max_score),
        ];
        for (name, score, max) in sections {
            if max == 0 {
                return Err(AppError::Validation(format!("{name}.max_score must be positive")));
            }
            if max > MAX_SECTION_SCORE {
                return Err(AppError::Validation(format!(
                    "{name}.max_score {max} exceeds {MAX_SECTION_SCORE}"
                )));
            }
            if score > max {
                return Err(AppError::Validation(format!(
                    "{name}.score {score} exceeds max_score {max}"
                )));
            }
        }
        if self.week1_max == 0 {
            return Err(AppError::Validation("week1_max must be positive".into()));
        }
        Ok(())
    }

    pub fn feedback_applicable(&self) -> bool {
        self.feedback.applicable
    }

    /// Sum of section scores; feedback counts only when applicable.
    pub fn total_score(&self) -> u32 {
        let feedback = if self.feedback_applicable() {
            self.feedback.score
        } else {
            0
        };
        [self.form_quality.score, feedback, self.repeat_calls.score]
            .into_iter()
            .fold(self.working_hours.score, u32::saturating_add)
    }

    pub fn max_possible(&self) -> u32 {
        let feedback = if self.feedback_applicable() {
            self.feedback.max_score
        } else {
            0
        };
        [self.form_quality.max_score, feedback, self.repeat_calls.max_score]
            .into_iter()
            .fold(self.working_hours.max_score, u32::saturating_add)
    }

    pub fn percentage(&self) -> f64 {
        percentage(self.total_score(), self.max_possible())
    }

    pub fn repeat_count(&self) -> u32 {
        self.repeat_calls
            .count
            .max(self.repeat_calls.calls.len() as u32)
    }
}

pub fn percentage(score: u32, max: u32) -> f64 {
    if max == 0 {
        0.0
    } else {
        score as f64 / max as f64 * 100.0
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(optional_text(deserializer)?.unwrap_or_default())
}

/// Accepts strings, numbers and booleans; `null` and blank strings become `None`.
fn optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn prior_max() -> u32 {
    PRIOR_MAX
}

fn working_hours_max() -> u32 {
    WORKING_HOURS_MAX
}

fn form_quality_max() -> u32 {
    FORM_QUALITY_MAX
}

fn feedback_max() -> u32 {
    FEEDBACK_MAX
}

fn repeat_calls_max() -> u32 {
    REPEAT_CALLS_MAX
}

fn applicable() -> bool {
    true
}

fn rating_scale() -> f64 {
    10.0
}
