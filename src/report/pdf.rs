//! Lays a [`Document`] onto US Letter pages and serializes it with `lopdf`.
//!
//! Coordinates are tracked top-down while laying out and flipped to PDF's
//! bottom-up space only when an operator is emitted.

use std::ops::Range;

use lopdf::content::{Content, Operation};
use lopdf::{Document as PdfDocument, Object, StringFormat, dictionary};

use crate::error::AppResult;

use super::document::{Align, Block, Card, Color, Document, Line, Row, Table, TextStyle, palette};

pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
const MARGIN_X: f32 = 43.2;
const MARGIN_TOP: f32 = 36.0;
const MARGIN_BOTTOM: f32 = 36.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN_X;

const BANNER_PADDING: f32 = 10.0;
const BOX_PADDING: f32 = 12.0;
const CELL_PADDING: f32 = 5.0;
const CARD_HEIGHT: f32 = 78.0;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

#[derive(Debug)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

pub fn write_pdf(document: &Document) -> AppResult<RenderedPdf> {
    let mut cursor = PageCursor::new();
    for (index, page) in document.pages.iter().enumerate() {
        if index > 0 {
            cursor.break_page();
        }
        for block in &page.blocks {
            cursor.block(block);
        }
    }
    let pages = cursor.finish();
    let page_count = pages.len();
    let bytes = assemble(&document.title, pages)?;
    Ok(RenderedPdf { bytes, page_count })
}

fn assemble(title: &str, pages: Vec<Vec<Operation>>) -> AppResult<Vec<u8>> {
    let mut doc = PdfDocument::with_version("1.7");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR => regular_id,
            BOLD => bold_id,
        },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(lopdf::Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(to_win_ansi(title), StringFormat::Literal),
        "Producer" => Object::string_literal(concat!("scorecard-pipeline ", env!("CARGO_PKG_VERSION"))),
    });
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

struct PageCursor {
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    /// Distance from the top edge of the page to the next free line.
    y: f32,
}

impl PageCursor {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            ops: Vec::new(),
            y: MARGIN_TOP,
        }
    }

    fn remaining(&self) -> f32 {
        PAGE_HEIGHT - MARGIN_BOTTOM - self.y
    }

    fn at_top(&self) -> bool {
        self.y <= MARGIN_TOP
    }

    fn break_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.ops));
        self.y = MARGIN_TOP;
    }

    /// Starts a new page unless `height` still fits or the page is already empty.
    fn reserve(&mut self, height: f32) {
        if height > self.remaining() && !self.at_top() {
            self.break_page();
        }
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        if !self.ops.is_empty() || self.pages.is_empty() {
            self.pages.push(self.ops);
        }
        self.pages
    }

    fn block(&mut self, block: &Block) {
        match block {
            Block::Heading { text, size, color } => {
                let style = TextStyle::body().size(*size).bold().color(*color);
                self.y += 4.0;
                self.text_lines(text, style, MARGIN_X, CONTENT_WIDTH, 1.2);
                self.y += 6.0;
            }
            Block::Paragraph { text, style } => {
                self.text_lines(text, *style, MARGIN_X, CONTENT_WIDTH, 1.35);
                self.y += 4.0;
            }
            Block::Banner { lines, background } => self.banner(lines, *background),
            Block::InfoBox {
                lines,
                background,
                border,
            } => self.info_box(lines, *background, *border),
            Block::Cards(cards) => self.cards(cards),
            Block::Table(table) => self.table(table),
            Block::Spacer(height) => {
                if *height >= self.remaining() {
                    self.break_page();
                } else {
                    self.y += height;
                }
            }
        }
    }

    /// Wrapped text flowing line by line across pages.
    fn text_lines(&mut self, text: &str, style: TextStyle, x: f32, width: f32, leading: f32) {
        let line_height = style.size * leading;
        for line in wrap(text, style.size, style.bold, width) {
            self.reserve(line_height);
            self.draw_text(&line, style, x, width, self.y, line_height);
            self.y += line_height;
        }
    }

    fn banner(&mut self, lines: &[Line], background: Color) {
        let wrapped = wrap_lines(lines, CONTENT_WIDTH - 2.0 * BANNER_PADDING);
        let height = wrapped.iter().map(|(_, s)| s.size * 1.3).sum::<f32>() + 2.0 * BANNER_PADDING;
        self.reserve(height);

        self.fill_rect(MARGIN_X, self.y, CONTENT_WIDTH, height, background);
        let mut top = self.y + BANNER_PADDING;
        for (text, style) in &wrapped {
            let line_height = style.size * 1.3;
            self.draw_text(text, *style, MARGIN_X, CONTENT_WIDTH, top, line_height);
            top += line_height;
        }
        self.y += height + 6.0;
    }

    /// Bordered box whose lines may continue onto following pages.
    fn info_box(&mut self, lines: &[Line], background: Color, border: Color) {
        let inner = CONTENT_WIDTH - 2.0 * BOX_PADDING;
        let mut pending = wrap_lines(lines, inner).into_iter().peekable();

        while pending.peek().is_some() {
            let first_height = pending.peek().map_or(0.0, |(_, s)| s.size * 1.35);
            self.reserve(first_height + 2.0 * BOX_PADDING);

            let available = self.remaining() - 2.0 * BOX_PADDING;
            let mut segment = Vec::new();
            let mut used = 0.0;
            while let Some((_, style)) = pending.peek() {
                let line_height = style.size * 1.35;
                if used + line_height > available && !segment.is_empty() {
                    break;
                }
                used += line_height;
                if let Some(line) = pending.next() {
                    segment.push(line);
                }
            }

            let height = used + 2.0 * BOX_PADDING;
            self.fill_rect(MARGIN_X, self.y, CONTENT_WIDTH, height, background);
            self.stroke_rect(MARGIN_X, self.y, CONTENT_WIDTH, height, border, 1.5);

            let mut top = self.y + BOX_PADDING;
            for (text, style) in &segment {
                let line_height = style.size * 1.35;
                self.draw_text(text, *style, MARGIN_X + BOX_PADDING, inner, top, line_height);
                top += line_height;
            }
            self.y += height;
            if pending.peek().is_some() {
                self.break_page();
            }
        }
        self.y += 6.0;
    }

    fn cards(&mut self, cards: &[Card]) {
        if cards.is_empty() {
            return;
        }
        self.reserve(CARD_HEIGHT);
        let width = CONTENT_WIDTH / cards.len() as f32;
        for (i, card) in cards.iter().enumerate() {
            let x = MARGIN_X + i as f32 * width;
            self.fill_rect(x, self.y, width, CARD_HEIGHT, palette::LIGHT_GRAY);
            self.stroke_rect(x, self.y, width, CARD_HEIGHT, palette::MID_GRAY, 1.0);

            let caption = TextStyle::body().size(9.0).color(palette::CAPTION).centered();
            let value = TextStyle::body().size(24.0).bold().color(card.color).centered();
            let status = TextStyle::body().size(9.0).color(card.color).centered();
            self.draw_text(&card.title, caption, x, width, self.y + 10.0, 12.0);
            self.draw_text(&card.value, value, x, width, self.y + 26.0, 30.0);
            self.draw_text(&card.status, status, x, width, self.y + 58.0, 12.0);
        }
        self.y += CARD_HEIGHT + 6.0;
    }

    fn table(&mut self, table: &Table) {
        let widths: Vec<f32> = table.columns.iter().map(|f| f * CONTENT_WIDTH).collect();
        let headers: Vec<&Row> = table.rows.iter().filter(|r| r.header).collect();
        let header_height: f32 = headers.iter().map(|r| row_height(table, &widths, r)).sum();
        let page_body = PAGE_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

        let mut segment_top = self.y;
        let mut first_row = true;
        for row in &table.rows {
            let cells = wrap_cells(table, &widths, row);
            let height = lines_height(table, line_count(&cells));
            let oversized = !row.header && height > page_body - header_height;
            let needed = if first_row { header_height.max(height) } else { height };
            if needed > self.remaining() && !self.at_top() && !oversized {
                self.close_table_segment(table, segment_top);
                self.break_page();
                segment_top = self.y;
                if !row.header {
                    self.repeat_headers(table, &widths, &headers);
                }
            }
            if !row.header && height > self.remaining() {
                segment_top = self.split_row(table, &widths, &headers, row, &cells, segment_top);
            } else {
                self.table_row(table, &widths, row, &cells, 0..line_count(&cells));
            }
            first_row = false;
        }
        self.close_table_segment(table, segment_top);
        self.y += 6.0;
    }

    /// Draws a row that does not fit in the space left, continuing its
    /// lines on as many pages as it needs. Returns the top of the table
    /// segment on the page where the row ends.
    fn split_row(
        &mut self,
        table: &Table,
        widths: &[f32],
        headers: &[&Row],
        row: &Row,
        cells: &[Vec<String>],
        mut segment_top: f32,
    ) -> f32 {
        let line_height = table.font_size * 1.3;
        let lines_fitting = |remaining: f32| ((remaining - 2.0 * CELL_PADDING) / line_height).floor();

        let total = line_count(cells);
        let mut drawn = 0;
        while drawn < total {
            let mut fit = lines_fitting(self.remaining()).max(0.0) as usize;
            if fit == 0 {
                self.close_table_segment(table, segment_top);
                self.break_page();
                segment_top = self.y;
                self.repeat_headers(table, widths, headers);
                // always make progress, even under an oversized header
                fit = lines_fitting(self.remaining()).max(1.0) as usize;
            }
            let end = (drawn + fit).min(total);
            self.table_row(table, widths, row, cells, drawn..end);
            drawn = end;
        }
        segment_top
    }

    fn repeat_headers(&mut self, table: &Table, widths: &[f32], headers: &[&Row]) {
        for header in headers {
            let cells = wrap_cells(table, widths, header);
            self.table_row(table, widths, header, &cells, 0..line_count(&cells));
        }
    }

    fn close_table_segment(&mut self, table: &Table, top: f32) {
        if let Some(border) = table.border
            && self.y > top
        {
            self.stroke_rect(MARGIN_X, top, CONTENT_WIDTH, self.y - top, border, 1.0);
        }
    }

    /// Draws the wrapped lines in `lines` of every cell as one row box.
    fn table_row(&mut self, table: &Table, widths: &[f32], row: &Row, cells: &[Vec<String>], lines: Range<usize>) {
        let height = lines_height(table, lines.len());
        if let Some(background) = row.background {
            self.fill_rect(MARGIN_X, self.y, widths.iter().sum(), height, background);
        }

        let line_height = table.font_size * 1.3;
        let mut x = MARGIN_X;
        for ((cell, wrapped), width) in row.cells.iter().zip(cells).zip(widths) {
            let inner = width - 2.0 * CELL_PADDING;
            let color = cell
                .color
                .unwrap_or(if row.header { palette::WHITE } else { palette::DARK });
            let style = TextStyle {
                size: table.font_size,
                bold: cell.bold || row.header,
                color,
                align: table.align,
            };
            let mut top = self.y + CELL_PADDING;
            for line in wrapped.iter().take(lines.end).skip(lines.start) {
                self.draw_text(line, style, x + CELL_PADDING, inner, top, line_height);
                top += line_height;
            }
            if let Some(grid) = table.grid {
                self.stroke_rect(x, self.y, *width, height, grid, 0.5);
            }
            x += width;
        }
        self.y += height;
    }

    fn draw_text(&mut self, text: &str, style: TextStyle, x: f32, width: f32, top: f32, line_height: f32) {
        if text.is_empty() {
            return;
        }
        let text_x = match style.align {
            Align::Left => x,
            Align::Center => x + (width - text_width(text, style.size, style.bold)).max(0.0) / 2.0,
        };
        // baseline sits roughly 80% down the line box
        let baseline = PAGE_HEIGHT - top - (line_height + style.size * 0.6) / 2.0;
        let [r, g, b] = style.color.unit();

        let font = if style.bold { BOLD } else { REGULAR };

        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new("Tf", vec![font.into(), style.size.into()]));
        self.ops.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
        self.ops.push(Operation::new("Td", vec![text_x.into(), baseline.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(to_win_ansi(text), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn fill_rect(&mut self, x: f32, top: f32, width: f32, height: f32, color: Color) {
        let [r, g, b] = color.unit();
        self.ops.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
        self.ops.push(Operation::new(
            "re",
            vec![x.into(), (PAGE_HEIGHT - top - height).into(), width.into(), height.into()],
        ));
        self.ops.push(Operation::new("f", vec![]));
    }

    fn stroke_rect(&mut self, x: f32, top: f32, width: f32, height: f32, color: Color, line_width: f32) {
        let [r, g, b] = color.unit();
        self.ops.push(Operation::new("w", vec![line_width.into()]));
        self.ops.push(Operation::new("RG", vec![r.into(), g.into(), b.into()]));
        self.ops.push(Operation::new(
            "re",
            vec![x.into(), (PAGE_HEIGHT - top - height).into(), width.into(), height.into()],
        ));
        self.ops.push(Operation::new("S", vec![]));
    }
}

fn row_height(table: &Table, widths: &[f32], row: &Row) -> f32 {
    lines_height(table, line_count(&wrap_cells(table, widths, row)))
}

fn wrap_cells(table: &Table, widths: &[f32], row: &Row) -> Vec<Vec<String>> {
    row.cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let bold = cell.bold || row.header;
            wrap(&cell.text, table.font_size, bold, width - 2.0 * CELL_PADDING)
        })
        .collect()
}

/// Lines in the tallest cell, at least one.
fn line_count(cells: &[Vec<String>]) -> usize {
    cells.iter().map(Vec::len).max().unwrap_or(1).max(1)
}

fn lines_height(table: &Table, lines: usize) -> f32 {
    lines.max(1) as f32 * table.font_size * 1.3 + 2.0 * CELL_PADDING
}

fn wrap_lines(lines: &[Line], width: f32) -> Vec<(String, TextStyle)> {
    lines
        .iter()
        .flat_map(|line| {
            wrap(&line.text, line.style.size, line.style.bold, width)
                .into_iter()
                .map(move |text| (text, line.style))
        })
        .collect()
}

/// Greedy word wrap. Explicit newlines are kept; an empty input yields one empty line.
pub(crate) fn wrap(text: &str, size: f32, bold: bool, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if text_width(&candidate, size, bold) <= width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if text_width(word, size, bold) <= width {
                current = word.to_string();
            } else {
                for c in word.chars() {
                    current.push(c);
                    if text_width(&current, size, bold) > width && current.chars().count() > 1 {
                        current.pop();
                        lines.push(std::mem::take(&mut current));
                        current.push(c);
                    }
                }
            }
        }
        lines.push(current);
    }
    lines
}

pub(crate) fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let units: f32 = text.chars().map(|c| char_units(c, bold)).sum();
    units / 1000.0 * size
}

/// Approximate Helvetica advance widths in 1/1000 em.
fn char_units(c: char, bold: bool) -> f32 {
    let regular = match c {
        ' ' | 'i' | 'j' | 'l' | '\'' | '.' | ',' | ':' | ';' | '!' | '|' => 278.0,
        'f' | 't' | 'r' | '(' | ')' | '-' | '[' | ']' | '/' => 333.0,
        'm' | 'M' | 'W' => 833.0,
        'w' | '%' | '@' => 889.0,
        '—' => 1000.0,
        'A'..='Z' => 667.0,
        _ => 556.0,
    };
    if bold { regular * 1.06 } else { regular }
}

/// Encodes text for the WinAnsi-encoded standard fonts.
pub(crate) fn to_win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '€' => out.push(0x80),
            '…' => out.push(0x85),
            '•' => out.push(0x95),
            '–' => out.push(0x96),
            '—' => out.push(0x97),
            '‘' => out.push(0x91),
            '’' => out.push(0x92),
            '“' => out.push(0x93),
            '”' => out.push(0x94),
            '→' => out.extend_from_slice(b"->"),
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => out.push(c as u8),
            _ => out.push(b'?'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::document::{Cell, Page};

    fn page_contents(bytes: &[u8]) -> Vec<Vec<u8>> {
        let doc = lopdf::Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|id| doc.get_page_content(*id).unwrap())
            .collect()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_win_ansi_mapping() {
        assert_eq!(to_win_ansi("a—b"), vec![b'a', 0x97, b'b']);
        assert_eq!(to_win_ansi("• x"), vec![0x95, b' ', b'x']);
        assert_eq!(to_win_ansi("é"), vec![0xE9]);
        assert_eq!(to_win_ansi("→"), b"->".to_vec());
        assert_eq!(to_win_ansi("世"), b"?".to_vec());
    }

    #[test]
    fn test_wrap_respects_width_and_newlines() {
        let lines = wrap("alpha beta gamma delta", 10.0, false, 60.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| text_width(l, 10.0, false) <= 60.0));
        assert_eq!(wrap("one\ntwo", 10.0, false, 500.0), vec!["one", "two"]);
        assert_eq!(wrap("", 10.0, false, 500.0), vec![""]);
    }

    #[test]
    fn test_wrap_breaks_overlong_words() {
        let lines = wrap(&"x".repeat(200), 10.0, false, 100.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat().len(), 200);
    }

    #[test]
    fn test_each_logical_page_starts_a_physical_page() {
        let mut document = Document {
            title: "t".into(),
            ..Default::default()
        };
        for title in ["FIRST", "SECOND", "THIRD"] {
            let mut page = Page::default();
            page.push(Block::heading(title, 18.0, palette::DARK));
            document.pages.push(page);
        }

        let rendered = write_pdf(&document).unwrap();
        assert_eq!(rendered.page_count, 3);
        let contents = page_contents(&rendered.bytes);
        assert_eq!(contents.len(), 3);
        assert!(contains(&contents[1], b"(SECOND)"));
    }

    #[test]
    fn test_long_table_flows_with_repeated_header() {
        let rows = (0..120).map(|i| Row::new(vec![Cell::text(format!("row {i}")), Cell::text("value")]));
        let table = Table::new(vec![0.5, 0.5])
            .row(Row::header(vec![Cell::text("Name"), Cell::text("Value")], palette::BLUE))
            .rows(rows);
        let mut page = Page::default();
        page.push(Block::Table(table));
        let document = Document {
            title: "t".into(),
            pages: vec![page],
        };

        let rendered = write_pdf(&document).unwrap();
        assert!(rendered.page_count >= 2);
        let contents = page_contents(&rendered.bytes);
        assert!(contents.iter().all(|c| contains(c, b"(Name)")));
        assert!(contains(contents.last().unwrap(), b"(row 119)"));
    }

    #[test]
    fn test_row_taller_than_a_page_continues_on_next_pages() {
        let words: Vec<String> = (0..3000).map(|i| format!("w{i}")).collect();
        let table = Table::new(vec![1.0])
            .row(Row::header(vec![Cell::text("Notes")], palette::BLUE))
            .row(Row::new(vec![Cell::text(words.join(" "))]));
        let mut page = Page::default();
        page.push(Block::Table(table));
        let document = Document {
            title: "t".into(),
            pages: vec![page],
        };

        let rendered = write_pdf(&document).unwrap();
        assert!(rendered.page_count > 1);
        let contents = page_contents(&rendered.bytes);
        assert_eq!(contents.len(), rendered.page_count);
        assert!(contents.iter().all(|c| contains(c, b"(Notes)")));
        assert!(contains(&contents[0], b"(w0 w1 "));
        assert!(contents.iter().any(|c| contains(c, b"w1500")));
        assert!(contains(contents.last().unwrap(), b"w2999)"));
    }

    #[test]
    fn test_empty_document_still_has_a_page() {
        let rendered = write_pdf(&Document::default()).unwrap();
        assert_eq!(rendered.page_count, 1);
        assert!(rendered.bytes.starts_with(b"%PDF-1.7"));
    }
}
