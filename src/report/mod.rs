//! Scorecard rendering: performance record → tiered document model → PDF.

pub mod document;
pub mod pdf;
pub mod record;
pub mod render;
pub mod score;

pub use record::PerformanceRecord;
pub use render::{ReportRenderer, output_path};
pub use score::{OverallTier, Tier};
