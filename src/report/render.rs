use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::RenderConfig;
use crate::error::AppResult;
use crate::telemetry::metrics::{REPORT_PAGES, REPORT_RENDER_DURATION};

use super::document::{
    Align, Block, Card, Cell, Document, Line, Page, Row, Table, TextStyle, palette,
};
use super::pdf::write_pdf;
use super::record::{PerformanceRecord, percentage};
use super::score::{
    DayStatus, ExampleQuality, OverallTier, Tier, feedback_tier, form_quality_tier,
    rating_color, repeat_calls_tier, working_hours_tier,
};

const PLACEHOLDER: &str = "—";

pub struct ReportRenderer {
    config: RenderConfig,
}

impl ReportRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    #[tracing::instrument(
        name = "pipeline_stage render",
        skip(self, record, output_dir),
        fields(engineer = %record.engineer_name, path = tracing::field::Empty, pages = tracing::field::Empty)
    )]
    pub fn render(&self, record: &PerformanceRecord, output_dir: &Path) -> AppResult<PathBuf> {
        let started = Instant::now();

        let document = self.build_document(record);
        let rendered = write_pdf(&document)?;

        std::fs::create_dir_all(output_dir)?;
        let path = output_path(output_dir, &record.engineer_name, &record.week_range);
        std::fs::write(&path, &rendered.bytes)?;

        let span = tracing::Span::current();
        span.record("path", tracing::field::display(path.display()));
        span.record("pages", rendered.page_count);

        REPORT_RENDER_DURATION.record(started.elapsed().as_secs_f64(), &[]);
        REPORT_PAGES.record(rendered.page_count as f64, &[]);
        tracing::info!(
            path = %path.display(),
            pages = rendered.page_count,
            bytes = rendered.bytes.len(),
            "scorecard rendered"
        );
        Ok(path)
    }

    /// Lays out the three logical pages of the scorecard.
    pub fn build_document(&self, record: &PerformanceRecord) -> Document {
        let name = display_or(&record.engineer_name, "Engineer");
        Document {
            title: format!("{name} performance analysis"),
            pages: vec![
                self.summary_page(record),
                self.hours_and_forms_page(record),
                self.feedback_and_repeats_page(record),
            ],
        }
    }

    fn summary_page(&self, record: &PerformanceRecord) -> Page {
        let mut page = Page::default();
        let total = record.total_score();
        let max = record.max_possible();
        let pct = record.percentage();
        let overall = OverallTier::from_percentage(pct);

        page.push(Block::heading(
            display_or(&record.engineer_name, "Engineer").to_uppercase(),
            20.0,
            palette::BLUE,
        ));
        page.push(Block::paragraph(
            format!(
                "Performance Analysis Report | {}",
                display_or(&record.week_range, PLACEHOLDER)
            ),
            TextStyle::body().color(palette::MUTED),
        ));
        page.push(Block::Spacer(6.0));

        let white = TextStyle::body().bold().color(palette::WHITE).centered();
        page.push(Block::Banner {
            lines: vec![
                Line::new("EXECUTIVE SUMMARY", white.size(13.0)),
                Line::new(format!("{total}/{max}"), white.size(34.0)),
                Line::new(format!("{pct:.1}%"), white.size(16.0)),
                Line::new(overall.label(), white.size(11.0)),
            ],
            background: overall.color(),
        });
        page.push(Block::Spacer(8.0));

        let wh = &record.working_hours;
        let fq = &record.form_quality;
        let fb = &record.feedback;
        let rc = &record.repeat_calls;
        let fb_tier = feedback_tier(fb);
        let fb_value = if fb.applicable {
            format!("{}/{}", fb.score, fb.max_score)
        } else {
            "N/A".to_string()
        };
        page.push(Block::Cards(vec![
            card("WORKING HOURS", format!("{}/{}", wh.score, wh.max_score), working_hours_tier(wh.score)),
            card("FORM QUALITY", format!("{}/{}", fq.score, fq.max_score), form_quality_tier(fq.score)),
            card("FEEDBACK", fb_value, fb_tier),
            card(
                "REPEAT CALLS",
                format!("{}/{}", rc.score, rc.max_score),
                repeat_calls_tier(rc, record.repeat_count()),
            ),
        ]));

        page.push(Block::heading("WEEK-OVER-WEEK COMPARISON", 16.0, palette::DARK));
        let prior_total = record
            .week1_total
            .map(|t| format!("{t}/{} ({:.1}%)", record.week1_max, percentage(t, record.week1_max)))
            .unwrap_or_else(|| PLACEHOLDER.to_string());
        let table = Table::new(vec![0.28, 0.24, 0.24, 0.24])
            .row(Row::header(
                vec![
                    Cell::text("Metric"),
                    Cell::text("Previous Week"),
                    Cell::text("This Week"),
                    Cell::text("Change"),
                ],
                palette::BLUE,
            ))
            .row(comparison_row("Working Hours", wh.week1_score, Some(wh.score), wh.max_score))
            .row(comparison_row("Form Quality", fq.week1_score, Some(fq.score), fq.max_score))
            .row(comparison_row(
                "Customer Feedback",
                fb.week1_score,
                fb.applicable.then_some(fb.score),
                fb.max_score,
            ))
            .row(comparison_row("Repeat Calls", rc.week1_score, Some(rc.score), rc.max_score))
            .row(
                Row::new(vec![
                    Cell::text("TOTAL").bold(),
                    Cell::text(prior_total).bold(),
                    Cell::text(format!("{total}/{max} ({pct:.1}%)")).bold(),
                    Cell::text(change(record.week1_total, Some(total))).bold(),
                ])
                .background(palette::LIGHT_GRAY),
            );
        page.push(Block::Table(table));

        page.push(Block::heading("KEY INSIGHTS", 16.0, palette::DARK));
        let mut lines = Vec::new();
        bullet_section(&mut lines, "Strengths:", &record.strengths, true);
        bullet_section(&mut lines, "Areas of Concern:", &record.weaknesses, true);
        if !record.immediate_actions.is_empty() {
            bullet_section(&mut lines, "Immediate Actions:", &record.immediate_actions, false);
        }
        if lines.last().is_some_and(|l: &Line| l.text.is_empty()) {
            lines.pop();
        }
        page.push(Block::InfoBox {
            lines,
            background: palette::LIGHT_GRAY,
            border: palette::BLUE,
        });
        page
    }

    fn hours_and_forms_page(&self, record: &PerformanceRecord) -> Page {
        let mut page = Page::default();
        let wh = &record.working_hours;
        let fq = &record.form_quality;

        page.push(Block::heading("DETAILED PERFORMANCE BREAKDOWN", 18.0, palette::DARK));
        page.push(Block::heading("1. WORKING HOURS", 14.0, palette::DARK));

        let days: Vec<Row> = wh
            .days
            .iter()
            .map(|day| {
                let status = DayStatus::classify(&day.status);
                let hours = day.hours.as_deref().unwrap_or(PLACEHOLDER);
                Row::new(vec![
                    Cell::text(display_or(&day.day, PLACEHOLDER)),
                    Cell::text(day.check_in.as_deref().unwrap_or(PLACEHOLDER)),
                    Cell::text(day.check_out.as_deref().unwrap_or(PLACEHOLDER)),
                    Cell::text(hours),
                    Cell::text(status.flag(hours)).bold(),
                ])
                .background(status.row_background())
            })
            .collect();
        page.push(Block::Table(
            Table::new(vec![0.18, 0.19, 0.19, 0.19, 0.25])
                .row(Row::header(
                    vec![
                        Cell::text("Day"),
                        Cell::text("Check In"),
                        Cell::text("Check Out"),
                        Cell::text("Total Hours"),
                        Cell::text("Status"),
                    ],
                    palette::BLUE_LIGHT,
                ))
                .rows(or_placeholder_row(days, 5)),
        ));

        let hours_line = match wh.week1_score {
            Some(prior) => format!(
                "Score: {}/{max}  |  Previous week: {prior}/{max}  →  This week: {}/{max}  ({})",
                wh.score,
                wh.score,
                change(Some(prior), Some(wh.score)),
                max = wh.max_score,
            ),
            None => format!(
                "Score: {}/{}  |  Previous week: {PLACEHOLDER}",
                wh.score, wh.max_score
            ),
        };
        page.push(Block::paragraph(hours_line, TextStyle::body().color(palette::MUTED)));
        page.push(Block::Spacer(12.0));

        let fq_tier = form_quality_tier(fq.score);
        page.push(Block::heading(
            format!("2. FORM QUALITY: {}/{}", fq.score, fq.max_score),
            14.0,
            fq_tier.color(),
        ));
        if fq_tier == Tier::Critical {
            page.push(Block::banner(
                "CRITICAL - DOCUMENTATION REQUIRES IMMEDIATE IMPROVEMENT",
                palette::RED,
            ));
        }
        page.push(Block::paragraph(
            "Documentation Examples from This Week:",
            TextStyle::body().size(11.0).bold(),
        ));

        if fq.examples.is_empty() {
            page.push(Block::paragraph(PLACEHOLDER, TextStyle::body()));
        }
        for (i, example) in fq.examples.iter().enumerate() {
            let quality = ExampleQuality::classify(&example.quality_assessment);
            let body = |text: String| Row::new(vec![Cell::text(text)]).background(quality.background());
            let mut table = Table::new(vec![1.0])
                .row(
                    Row::new(vec![
                        Cell::text(format!(
                            "EXAMPLE {}: {} ({})",
                            i + 1,
                            or_dash(&example.company),
                            or_dash(&example.machine_no)
                        ))
                        .bold(),
                    ])
                    .background(quality.header_background()),
                )
                .row(body(format!(
                    "Work Type: {}  |  Quality: {}",
                    or_dash(&example.work_type),
                    display_or(&example.quality_assessment, PLACEHOLDER).to_uppercase()
                )))
                .row(body(format!("Problem: \"{}\"", or_dash(&example.problem))))
                .row(body(format!("Work Done: \"{}\"", or_dash(&example.work_done))));
            table.align = Align::Left;
            table.grid = None;
            table.border = Some(fq_tier.color());
            table.font_size = 9.5;
            page.push(Block::Table(table));
        }
        page
    }

    fn feedback_and_repeats_page(&self, record: &PerformanceRecord) -> Page {
        let mut page = Page::default();
        let fb = &record.feedback;
        let rc = &record.repeat_calls;

        page.push(Block::heading("3. CUSTOMER FEEDBACK", 14.0, palette::DARK));
        if fb.applicable {
            page.push(Block::paragraph(
                format!("Score: {}/{} ({})", fb.score, fb.max_score, feedback_tier(fb).label()),
                TextStyle::body().bold().color(feedback_tier(fb).color()),
            ));
            let ratings: Vec<Row> = fb
                .ratings
                .iter()
                .map(|r| {
                    Row::new(vec![
                        Cell::text(or_dash(&r.company)),
                        Cell::text(or_dash(&r.machine_no)),
                        Cell::text(format!("{}/{}", number(r.rating), number(r.out_of)))
                            .bold()
                            .colored(rating_color(r.rating)),
                        Cell::text(or_dash(&r.date)),
                        Cell::text(or_dash(&r.comment)),
                    ])
                })
                .collect();
            page.push(Block::Table(
                Table::new(vec![0.26, 0.14, 0.12, 0.16, 0.32])
                    .row(Row::header(
                        vec![
                            Cell::text("Company"),
                            Cell::text("Machine"),
                            Cell::text("Rating"),
                            Cell::text("Date"),
                            Cell::text("Comment"),
                        ],
                        palette::BLUE,
                    ))
                    .rows(or_placeholder_row(ratings, 5)),
            ));
        } else {
            let assumed = self.config.assumed_feedback_score;
            let total = record.total_score();
            let max = record.max_possible();
            let would_be_total = total + assumed;
            let would_be_max = max + fb.max_score;
            page.push(Block::banner(
                "NO FEEDBACK DATA COLLECTED — SCORE NOT APPLICABLE",
                palette::ORANGE,
            ));
            let body = TextStyle::body();
            page.push(Block::InfoBox {
                lines: vec![
                    Line::new("Status: No customer feedback collected.", body),
                    Line::new("", body),
                    Line::new(
                        format!(
                            "Impact: Score calculated out of {max} (not {would_be_max}). If feedback \
                             were collected at average level ({assumed}/{}), total score would be \
                             {would_be_total}/{would_be_max} = {:.1}%.",
                            fb.max_score,
                            percentage(would_be_total, would_be_max)
                        ),
                        body,
                    ),
                    Line::new("", body),
                    Line::new(
                        "Action Required: Training on requesting customer feedback after every service call.",
                        body,
                    ),
                ],
                background: palette::LIGHT_GRAY,
                border: palette::ORANGE,
            });
        }
        page.push(Block::Spacer(14.0));

        let count = record.repeat_count();
        let rc_tier = repeat_calls_tier(rc, count);
        page.push(Block::heading(
            format!("4. REPEAT CALLS: {}/{}", rc.score, rc.max_score),
            14.0,
            rc_tier.color(),
        ));
        match rc_tier {
            Tier::Perfect => {
                page.push(Block::banner(
                    "ZERO REPEAT CALLS — PERFECT FIRST-TIME FIX RATE",
                    palette::GREEN,
                ));
                page.push(Block::InfoBox {
                    lines: vec![Line::new(
                        "All customer issues resolved on first visit. Demonstrates strong \
                         technical competence and effective problem-solving.",
                        TextStyle::body(),
                    )],
                    background: palette::ROW_PRESENT,
                    border: palette::GREEN,
                });
            }
            _ => {
                page.push(Block::banner(
                    format!("{count} REPEAT CALL(S) RECORDED THIS WEEK"),
                    palette::RED,
                ));
                let calls: Vec<Row> = rc
                    .calls
                    .iter()
                    .map(|c| {
                        Row::new(vec![
                            Cell::text(or_dash(&c.company)),
                            Cell::text(or_dash(&c.machine_no)),
                            Cell::text(or_dash(&c.first_visit)),
                            Cell::text(or_dash(&c.repeat_date)),
                            Cell::text(or_dash(&c.issue_type)),
                        ])
                    })
                    .collect();
                page.push(Block::Table(
                    Table::new(vec![0.24, 0.15, 0.18, 0.18, 0.25])
                        .row(Row::header(
                            vec![
                                Cell::text("Company"),
                                Cell::text("Machine"),
                                Cell::text("First Visit"),
                                Cell::text("Repeat Date"),
                                Cell::text("Issue Type"),
                            ],
                            palette::RED,
                        ))
                        .rows(or_placeholder_row(calls, 5)),
                ));
            }
        }
        page
    }
}

/// `<dir>/<name>_<period>_analysis.pdf` with both parts reduced to `[A-Za-z0-9_]`.
pub fn output_path(output_dir: &Path, engineer_name: &str, period: &str) -> PathBuf {
    let name = sanitize(display_or(engineer_name, "engineer"));
    let period = sanitize(display_or(period, "unknown_week"));
    output_dir.join(format!("{name}_{period}_analysis.pdf"))
}

pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn card(title: &str, value: String, tier: Tier) -> Card {
    Card {
        title: title.to_string(),
        value,
        status: tier.label().to_string(),
        color: tier.color(),
    }
}

fn comparison_row(metric: &str, prior: Option<u32>, current: Option<u32>, max: u32) -> Row {
    let fmt = |score: Option<u32>| {
        score
            .map(|s| format!("{s}/{max}"))
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    };
    let current_text = match current {
        Some(_) => fmt(current),
        None => "N/A".to_string(),
    };
    Row::new(vec![
        Cell::text(metric),
        Cell::text(fmt(prior)),
        Cell::text(current_text),
        Cell::text(change(prior, current)),
    ])
    .background(palette::WHITE)
}

/// Signed point delta, or a dash when either side is unknown.
fn change(prior: Option<u32>, current: Option<u32>) -> String {
    match (prior, current) {
        (Some(prior), Some(current)) => format!("{:+} pts", current as i64 - prior as i64),
        _ => PLACEHOLDER.to_string(),
    }
}

fn bullet_section(lines: &mut Vec<Line>, title: &str, items: &[String], gap: bool) {
    let body = TextStyle::body();
    lines.push(Line::new(title, body.bold()));
    if items.is_empty() {
        lines.push(Line::new(PLACEHOLDER, body));
    }
    lines.extend(items.iter().map(|item| Line::new(format!("• {item}"), body)));
    if gap {
        lines.push(Line::new("", body));
    }
}

fn or_placeholder_row(rows: Vec<Row>, columns: usize) -> Vec<Row> {
    if rows.is_empty() {
        vec![Row::new(vec![Cell::text(PLACEHOLDER); columns])]
    } else {
        rows
    }
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(PLACEHOLDER)
}

fn number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::record::fixtures::{complete_record, sparse_record};

    fn renderer() -> ReportRenderer {
        ReportRenderer::new(RenderConfig::default())
    }

    fn has_table_header(page: &Page, header: &str) -> bool {
        page.tables()
            .any(|t| t.rows.iter().any(|r| r.header && r.cells.iter().any(|c| c.text == header)))
    }

    #[test]
    fn test_three_logical_pages() {
        let document = renderer().build_document(&complete_record());
        assert_eq!(document.pages.len(), 3);
        assert!(document.pages[0].contains_text("ASHA VERMA"));
        assert!(document.pages[1].contains_text("DETAILED PERFORMANCE BREAKDOWN"));
        assert!(document.pages[2].contains_text("3. CUSTOMER FEEDBACK"));
    }

    #[test]
    fn test_summary_recomputes_upstream_rollups() {
        let document = renderer().build_document(&complete_record());
        let summary = &document.pages[0];
        assert!(summary.contains_text("65/100"));
        assert!(summary.contains_text("65.0%"));
        assert!(summary.contains_text("BELOW STANDARD - URGENT ACTION REQUIRED"));
        assert!(!summary.contains_text("99/100"));
    }

    #[test]
    fn test_week_over_week_changes_are_signed() {
        let document = renderer().build_document(&complete_record());
        let summary = &document.pages[0];
        assert!(summary.contains_text("+3 pts"));
        assert!(summary.contains_text("-2 pts"));
        assert!(summary.contains_text("+15 pts"));
    }

    #[test]
    fn test_inapplicable_feedback_scores_against_seventy() {
        let mut record = complete_record();
        record.feedback.applicable = false;
        let document = renderer().build_document(&record);

        let summary = &document.pages[0];
        assert!(summary.contains_text("41/70"));
        assert!(summary.contains_text(&format!("{:.1}%", 41.0 / 70.0 * 100.0)));
        assert!(!summary.contains_text("would be"));
        assert!(!document.pages[1].contains_text("would be"));

        let feedback = &document.pages[2];
        assert!(feedback.contains_text("NO FEEDBACK DATA COLLECTED — SCORE NOT APPLICABLE"));
        assert!(feedback.contains_text("62/100 = 62.0%"));
        assert!(!has_table_header(feedback, "Rating"));
    }

    #[test]
    fn test_assumed_feedback_score_is_configurable() {
        let mut record = complete_record();
        record.feedback.applicable = false;
        let renderer = ReportRenderer::new(RenderConfig {
            assumed_feedback_score: 30,
            ..RenderConfig::default()
        });
        let document = renderer.build_document(&record);
        assert!(document.pages[2].contains_text("71/100 = 71.0%"));
    }

    #[test]
    fn test_perfect_repeat_calls_has_banner_and_no_table() {
        let mut record = complete_record();
        record.repeat_calls.score = 30;
        record.repeat_calls.count = 0;
        record.repeat_calls.calls.clear();
        let document = renderer().build_document(&record);

        let page = &document.pages[2];
        assert!(page.contains_text("ZERO REPEAT CALLS — PERFECT FIRST-TIME FIX RATE"));
        assert!(!has_table_header(page, "Repeat Date"));
    }

    #[test]
    fn test_repeat_calls_banner_and_incidents() {
        let document = renderer().build_document(&complete_record());
        let page = &document.pages[2];
        assert!(page.contains_text("1 REPEAT CALL(S) RECORDED THIS WEEK"));
        assert!(has_table_header(page, "Repeat Date"));
        assert!(page.contains_text("Hydraulic leak"));
    }

    #[test]
    fn test_absent_day_row_is_flagged() {
        let mut record = complete_record();
        record.working_hours.days[1].hours = Some("8h 45m".to_string());
        let document = renderer().build_document(&record);

        let table = document.pages[1].tables().next().unwrap();
        let absent = table
            .body_rows()
            .find(|r| r.cells[0].text == "Tuesday")
            .unwrap();
        assert_eq!(absent.cells[4].text, "ABSENT");
        assert_eq!(absent.background, Some(palette::ROW_ABSENT));

        let exceptional = table
            .body_rows()
            .find(|r| r.cells[0].text == "Wednesday")
            .unwrap();
        assert_eq!(exceptional.cells[4].text, "EXCEPTIONAL! 11h 30m");
        assert_eq!(exceptional.background, Some(palette::ROW_EXCEPTIONAL));
    }

    #[test]
    fn test_critical_form_quality_banner() {
        let document = renderer().build_document(&complete_record());
        let page = &document.pages[1];
        assert!(page.contains_text("CRITICAL - DOCUMENTATION REQUIRES IMMEDIATE IMPROVEMENT"));
        assert!(page.contains_text("EXAMPLE 1: Apex Steel (M-114)"));
        assert!(page.contains_text("Work Type: Breakdown  |  Quality: POOR"));

        let mut record = complete_record();
        record.form_quality.score = 9;
        let page = &renderer().build_document(&record).pages[1];
        assert!(!page.contains_text("IMMEDIATE IMPROVEMENT"));
    }

    #[test]
    fn test_rating_cells_are_colored() {
        let document = renderer().build_document(&complete_record());
        let table = document.pages[2].tables().next().unwrap();
        let cells: Vec<&Cell> = table.body_rows().map(|r| &r.cells[2]).collect();
        assert_eq!(cells[0].text, "9/10");
        assert_eq!(cells[0].color, Some(palette::GREEN));
        assert_eq!(cells[1].color, Some(palette::RED));
    }

    #[test]
    fn test_sparse_record_renders_placeholders() {
        let document = renderer().build_document(&sparse_record());
        assert_eq!(document.pages.len(), 3);

        let summary = &document.pages[0];
        assert!(summary.contains_text("ENGINEER"));
        assert!(summary.contains_text("Strengths:"));
        assert!(summary.texts().contains(&PLACEHOLDER));

        let hours = document.pages[1].tables().next().unwrap();
        assert_eq!(hours.body_rows().count(), 1);
        assert!(hours.body_rows().all(|r| r.cells.iter().all(|c| c.text == PLACEHOLDER)));
    }

    #[test]
    fn test_render_writes_sanitized_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = renderer().render(&complete_record(), dir.path()).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "Asha_Verma_Feb_2___Feb_7__2026_analysis.pdf"
        );
        let pdf = lopdf::Document::load(&path).unwrap();
        assert!(pdf.get_pages().len() >= 3);
    }

    #[test]
    fn test_render_sparse_record_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("reports").join("weekly");
        let path = renderer().render(&sparse_record(), &nested).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "engineer_unknown_week_analysis.pdf"
        );
        assert!(path.exists());
    }

    #[test]
    fn test_sanitize_replaces_everything_outside_word_chars() {
        assert_eq!(sanitize("Tanmay Mondal"), "Tanmay_Mondal");
        assert_eq!(sanitize("a/b\\c.d"), "a_b_c_d");
        assert_eq!(sanitize("José"), "Jos_");
    }
}
