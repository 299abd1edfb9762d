//! Weekly engineer scorecards: export a dashboard from Zoho Analytics, optionally turn it into a
//! scored PDF report with an LLM, and deliver the result as a WhatsApp template message.

pub mod config;
pub mod delivery;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod telemetry;
pub mod zoho;
