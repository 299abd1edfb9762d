//! Score → tier rules. Everything here is a pure function of its inputs.

use super::document::{Color, palette};
use super::record::{Feedback, RepeatCalls};

pub const WORKING_HOURS_GOOD: u32 = 15;
pub const FORM_QUALITY_GOOD: u32 = 8;
pub const FORM_QUALITY_CRITICAL: u32 = 5;
pub const FEEDBACK_GOOD: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Perfect,
    Good,
    Warning,
    NeedsWork,
    Low,
    Critical,
    NotApplicable,
    HasRepeats { count: u32 },
}

impl Tier {
    pub fn color(&self) -> Color {
        match self {
            Tier::Perfect | Tier::Good => palette::GREEN,
            Tier::Warning | Tier::NotApplicable => palette::ORANGE,
            Tier::NeedsWork | Tier::Low | Tier::Critical | Tier::HasRepeats { .. } => palette::RED,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Perfect => "PERFECT",
            Tier::Good => "GOOD",
            Tier::Warning => "WARNING",
            Tier::NeedsWork => "NEEDS WORK",
            Tier::Low => "LOW",
            Tier::Critical => "CRITICAL",
            Tier::NotApplicable => "N/A",
            Tier::HasRepeats { .. } => "HAS REPEATS",
        }
    }
}

pub fn working_hours_tier(score: u32) -> Tier {
    if score >= WORKING_HOURS_GOOD {
        Tier::Good
    } else {
        Tier::NeedsWork
    }
}

pub fn form_quality_tier(score: u32) -> Tier {
    if score < FORM_QUALITY_CRITICAL {
        Tier::Critical
    } else if score < FORM_QUALITY_GOOD {
        Tier::Warning
    } else {
        Tier::Good
    }
}

pub fn feedback_tier(feedback: &Feedback) -> Tier {
    if !feedback.applicable {
        Tier::NotApplicable
    } else if feedback.score >= FEEDBACK_GOOD {
        Tier::Good
    } else {
        Tier::Low
    }
}

pub fn repeat_calls_tier(repeat_calls: &RepeatCalls, count: u32) -> Tier {
    if repeat_calls.score == repeat_calls.max_score {
        Tier::Perfect
    } else {
        Tier::HasRepeats { count }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallTier {
    Excellent,
    Acceptable,
    BelowStandard,
}

impl OverallTier {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 80.0 {
            OverallTier::Excellent
        } else if percentage >= 70.0 {
            OverallTier::Acceptable
        } else {
            OverallTier::BelowStandard
        }
    }

    pub fn color(&self) -> Color {
        match self {
            OverallTier::Excellent => palette::GREEN,
            OverallTier::Acceptable => palette::ORANGE,
            OverallTier::BelowStandard => palette::RED,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OverallTier::Excellent => "EXCELLENT",
            OverallTier::Acceptable => "ACCEPTABLE - IMPROVEMENT NEEDED",
            OverallTier::BelowStandard => "BELOW STANDARD - URGENT ACTION REQUIRED",
        }
    }
}

pub fn rating_color(rating: f64) -> Color {
    if rating >= 8.0 {
        palette::GREEN
    } else if rating >= 6.0 {
        palette::ORANGE
    } else {
        palette::RED
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleQuality {
    Poor,
    Average,
    Good,
}

impl ExampleQuality {
    pub fn classify(assessment: &str) -> Self {
        match assessment.trim().to_ascii_lowercase().as_str() {
            "poor" | "critical" => ExampleQuality::Poor,
            "average" => ExampleQuality::Average,
            _ => ExampleQuality::Good,
        }
    }

    pub fn background(&self) -> Color {
        match self {
            ExampleQuality::Poor => palette::EXAMPLE_POOR,
            ExampleQuality::Average => palette::EXAMPLE_AVERAGE,
            ExampleQuality::Good => palette::EXAMPLE_GOOD,
        }
    }

    pub fn header_background(&self) -> Color {
        match self {
            ExampleQuality::Poor => palette::EXAMPLE_POOR_HEADER,
            ExampleQuality::Average => palette::EXAMPLE_AVERAGE_HEADER,
            ExampleQuality::Good => palette::EXAMPLE_GOOD_HEADER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Absent,
    Exceptional,
    Present,
}

impl DayStatus {
    pub fn classify(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "absent" => DayStatus::Absent,
            "exceptional" => DayStatus::Exceptional,
            _ => DayStatus::Present,
        }
    }

    pub fn row_background(&self) -> Color {
        match self {
            DayStatus::Absent => palette::ROW_ABSENT,
            DayStatus::Exceptional => palette::ROW_EXCEPTIONAL,
            DayStatus::Present => palette::ROW_PRESENT,
        }
    }

    /// Text for the status column. Absent days ignore whatever hours were recorded.
    pub fn flag(&self, hours: &str) -> String {
        match self {
            DayStatus::Absent => "ABSENT".to_string(),
            DayStatus::Exceptional => format!("EXCEPTIONAL! {hours}"),
            DayStatus::Present => hours.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(score: u32, applicable: bool) -> Feedback {
        Feedback {
            score,
            max_score: 30,
            applicable,
            ratings: Vec::new(),
            week1_score: None,
        }
    }

    fn repeat_calls(score: u32) -> RepeatCalls {
        RepeatCalls {
            score,
            max_score: 30,
            count: 0,
            calls: Vec::new(),
            week1_score: None,
        }
    }

    #[test]
    fn test_working_hours_threshold() {
        assert_eq!(working_hours_tier(15), Tier::Good);
        assert_eq!(working_hours_tier(14), Tier::NeedsWork);
    }

    #[test]
    fn test_form_quality_bands() {
        assert_eq!(form_quality_tier(0), Tier::Critical);
        assert_eq!(form_quality_tier(4), Tier::Critical);
        assert_eq!(form_quality_tier(5), Tier::Warning);
        assert_eq!(form_quality_tier(7), Tier::Warning);
        assert_eq!(form_quality_tier(8), Tier::Good);
        assert_eq!(form_quality_tier(8).color(), palette::GREEN);
        assert_eq!(form_quality_tier(6).color(), palette::ORANGE);
        assert_eq!(form_quality_tier(1).color(), palette::RED);
    }

    #[test]
    fn test_feedback_applicability_wins() {
        assert_eq!(feedback_tier(&feedback(30, false)), Tier::NotApplicable);
        assert_eq!(feedback_tier(&feedback(20, true)), Tier::Good);
        assert_eq!(feedback_tier(&feedback(19, true)), Tier::Low);
    }

    #[test]
    fn test_repeat_calls_perfect_only_at_max() {
        assert_eq!(repeat_calls_tier(&repeat_calls(30), 0), Tier::Perfect);
        assert_eq!(
            repeat_calls_tier(&repeat_calls(20), 2),
            Tier::HasRepeats { count: 2 }
        );
    }

    #[test]
    fn test_overall_boundaries() {
        assert_eq!(OverallTier::from_percentage(80.0), OverallTier::Excellent);
        assert_eq!(OverallTier::from_percentage(79.99), OverallTier::Acceptable);
        assert_eq!(OverallTier::from_percentage(70.0), OverallTier::Acceptable);
        assert_eq!(OverallTier::from_percentage(69.9), OverallTier::BelowStandard);
        assert_eq!(
            OverallTier::BelowStandard.label(),
            "BELOW STANDARD - URGENT ACTION REQUIRED"
        );
    }

    #[test]
    fn test_tiers_are_pure() {
        for score in 0..=20 {
            assert_eq!(form_quality_tier(score), form_quality_tier(score));
            assert_eq!(working_hours_tier(score), working_hours_tier(score));
        }
    }

    #[test]
    fn test_rating_colors() {
        assert_eq!(rating_color(8.0), palette::GREEN);
        assert_eq!(rating_color(6.5), palette::ORANGE);
        assert_eq!(rating_color(5.9), palette::RED);
    }

    #[test]
    fn test_example_quality_families() {
        assert_eq!(ExampleQuality::classify("Critical"), ExampleQuality::Poor);
        assert_eq!(ExampleQuality::classify(" average "), ExampleQuality::Average);
        assert_eq!(ExampleQuality::classify(""), ExampleQuality::Good);
        assert_eq!(
            ExampleQuality::Poor.header_background(),
            palette::EXAMPLE_POOR_HEADER
        );
    }

    #[test]
    fn test_absent_day_ignores_hours() {
        let status = DayStatus::classify("ABSENT");
        assert_eq!(status.flag("8h"), "ABSENT");
        assert_eq!(status.row_background(), palette::ROW_ABSENT);
        assert_eq!(DayStatus::classify("exceptional").flag("11h"), "EXCEPTIONAL! 11h");
        assert_eq!(DayStatus::classify("present").flag("9h"), "9h");
    }
}
