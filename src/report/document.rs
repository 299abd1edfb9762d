//! Backend-neutral page model produced by the renderer and consumed by the PDF writer.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn hex(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xFF) as u8,
            g: ((rgb >> 8) & 0xFF) as u8,
            b: (rgb & 0xFF) as u8,
        }
    }

    /// Components scaled to the 0..=1 range PDF color operators expect.
    pub fn unit(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

pub mod palette {
    use super::Color;

    pub const BLUE: Color = Color::hex(0x0066CC);
    pub const BLUE_LIGHT: Color = Color::hex(0x4A90E2);
    pub const GREEN: Color = Color::hex(0x27AE60);
    pub const ORANGE: Color = Color::hex(0xF39C12);
    pub const RED: Color = Color::hex(0xE74C3C);
    pub const LIGHT_GRAY: Color = Color::hex(0xF5F5F5);
    pub const MID_GRAY: Color = Color::hex(0xE0E0E0);
    pub const DARK: Color = Color::hex(0x333333);
    pub const MUTED: Color = Color::hex(0x666666);
    pub const CAPTION: Color = Color::hex(0x888888);
    pub const WHITE: Color = Color::hex(0xFFFFFF);

    pub const ROW_ABSENT: Color = Color::hex(0xFFE5E5);
    pub const ROW_EXCEPTIONAL: Color = Color::hex(0xE8F8E8);
    pub const ROW_PRESENT: Color = Color::hex(0xE8F5E9);

    pub const EXAMPLE_POOR: Color = Color::hex(0xFFE5E5);
    pub const EXAMPLE_POOR_HEADER: Color = Color::hex(0xFFCCCC);
    pub const EXAMPLE_AVERAGE: Color = Color::hex(0xFFF9E6);
    pub const EXAMPLE_AVERAGE_HEADER: Color = Color::hex(0xFFE5B4);
    pub const EXAMPLE_GOOD: Color = Color::hex(0xE8F5E9);
    pub const EXAMPLE_GOOD_HEADER: Color = Color::hex(0xCCEECC);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub bold: bool,
    pub color: Color,
    pub align: Align,
}

impl TextStyle {
    pub fn body() -> Self {
        Self {
            size: 10.0,
            bold: false,
            color: palette::DARK,
            align: Align::Left,
        }
    }

    pub fn size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn centered(mut self) -> Self {
        self.align = Align::Center;
        self
    }
}

/// One line of text inside a banner or box, wrapped by the writer if too wide.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub style: TextStyle,
}

impl Line {
    pub fn new(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub title: String,
    pub value: String,
    pub status: String,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub color: Option<Color>,
    pub bold: bool,
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
            bold: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn colored(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub background: Option<Color>,
    /// Header rows are repeated at the top of every physical page the table spans.
    pub header: bool,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            background: None,
            header: false,
        }
    }

    pub fn header(cells: Vec<Cell>, background: Color) -> Self {
        Self {
            cells,
            background: Some(background),
            header: true,
        }
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Column widths as fractions of the content width.
    pub columns: Vec<f32>,
    pub rows: Vec<Row>,
    pub font_size: f32,
    pub align: Align,
    pub grid: Option<Color>,
    pub border: Option<Color>,
}

impl Table {
    pub fn new(columns: Vec<f32>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            font_size: 9.0,
            align: Align::Center,
            grid: Some(palette::MID_GRAY),
            border: None,
        }
    }

    pub fn row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }

    pub fn rows(mut self, rows: impl IntoIterator<Item = Row>) -> Self {
        self.rows.extend(rows);
        self
    }

    pub fn body_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|row| !row.header)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading {
        text: String,
        size: f32,
        color: Color,
    },
    Paragraph {
        text: String,
        style: TextStyle,
    },
    Banner {
        lines: Vec<Line>,
        background: Color,
    },
    InfoBox {
        lines: Vec<Line>,
        background: Color,
        border: Color,
    },
    Cards(Vec<Card>),
    Table(Table),
    Spacer(f32),
}

impl Block {
    pub fn heading(text: impl Into<String>, size: f32, color: Color) -> Self {
        Block::Heading {
            text: text.into(),
            size,
            color,
        }
    }

    pub fn paragraph(text: impl Into<String>, style: TextStyle) -> Self {
        Block::Paragraph {
            text: text.into(),
            style,
        }
    }

    /// Single-line white-on-color banner.
    pub fn banner(text: impl Into<String>, background: Color) -> Self {
        Block::Banner {
            lines: vec![Line::new(
                text,
                TextStyle::body()
                    .size(13.0)
                    .bold()
                    .color(palette::WHITE)
                    .centered(),
            )],
            background,
        }
    }

    /// Every piece of text in the block, in reading order.
    pub fn texts(&self) -> Vec<&str> {
        match self {
            Block::Heading { text, .. } | Block::Paragraph { text, .. } => vec![text.as_str()],
            Block::Banner { lines, .. } | Block::InfoBox { lines, .. } => {
                lines.iter().map(|l| l.text.as_str()).collect()
            }
            Block::Cards(cards) => cards
                .iter()
                .flat_map(|c| [c.title.as_str(), c.value.as_str(), c.status.as_str()])
                .collect(),
            Block::Table(table) => table
                .rows
                .iter()
                .flat_map(|r| r.cells.iter().map(|c| c.text.as_str()))
                .collect(),
            Block::Spacer(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn texts(&self) -> Vec<&str> {
        self.blocks.iter().flat_map(Block::texts).collect()
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            _ => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().iter().any(|t| t.contains(needle))
    }
}

/// A multi-page document. Each page starts on a fresh physical page; the writer
/// adds further physical pages when a page's content overflows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub title: String,
    pub pages: Vec<Page>,
}
