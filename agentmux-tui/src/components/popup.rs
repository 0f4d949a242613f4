use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Clear, Padding, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

/// Popups never grow past this many columns, however wide the terminal.
const MAX_WIDTH: u16 = 72;
const MIN_WIDTH: u16 = 28;
const H_PADDING: u16 = 2;
/// Borders plus padding on both sides.
const H_CHROME: u16 = 2 + 2 * H_PADDING;

/// A centered modal popup sized to its content: as wide as the longest
/// body line asks for, within bounds, wrapping anything longer. All of
/// the app's overlays (welcome, name input, delete confirmation, error
/// toast) are instances of this.
pub struct Popup<'a> {
    title: &'a str,
    accent: Color,
    body: Vec<Line<'a>>,
    centered_text: bool,
}

impl<'a> Popup<'a> {
    pub fn new(title: &'a str, accent: Color) -> Self {
        Self {
            title,
            accent,
            body: Vec::new(),
            centered_text: false,
        }
    }

    #[must_use]
    pub fn line(mut self, line: impl Into<Line<'a>>) -> Self {
        self.body.push(line.into());
        self
    }

    #[must_use]
    pub fn blank(self) -> Self {
        self.line(Line::raw(""))
    }

    /// Append a dimmed key-hint footer line.
    #[must_use]
    pub fn hint(mut self, text: &'a str, color: Color) -> Self {
        self.body.push(Line::styled(text, Style::default().fg(color)));
        self
    }

    #[must_use]
    pub fn centered_text(mut self) -> Self {
        self.centered_text = true;
        self
    }

    /// Width the body wants: the longest line plus chrome, clamped to
    /// the popup bounds and to four fifths of the terminal.
    fn desired_width(&self, area: Rect) -> u16 {
        let longest = self.body.iter().map(line_width).max().unwrap_or(0);
        let ceiling = MAX_WIDTH
            .min((u32::from(area.width) * 4 / 5) as u16)
            .max(1);
        longest
            .saturating_add(H_CHROME)
            .clamp(MIN_WIDTH.min(ceiling), ceiling)
    }

    fn height_for(&self, width: u16) -> u16 {
        let text_width = width.saturating_sub(H_CHROME).max(1);
        let rows: u16 = self.body.iter().map(|l| rows_for(l, text_width)).sum();
        rows + 2
    }

    pub fn render(self, f: &mut Frame, area: Rect) {
        let width = self.desired_width(area);
        let height = self.height_for(width).min(area.height);
        let target = center(width, height, area);

        f.render_widget(Clear, target);
        let block = Block::bordered()
            .border_style(Style::default().fg(self.accent))
            .title(self.title)
            .padding(Padding::horizontal(H_PADDING));
        let mut text = Paragraph::new(self.body)
            .block(block)
            .wrap(Wrap { trim: false });
        if self.centered_text {
            text = text.alignment(Alignment::Center);
        }
        f.render_widget(text, target);
    }
}

fn line_width(line: &Line) -> u16 {
    let width: usize = line.spans.iter().map(|s| s.content.as_ref().width()).sum();
    u16::try_from(width).unwrap_or(u16::MAX)
}

/// Rows a line occupies when wrapped to `text_width` columns. Ceil of
/// display width over available width; overestimates only for lines
/// that wrap exactly at word boundaries, which costs a blank row rather
/// than clipping content.
fn rows_for(line: &Line, text_width: u16) -> u16 {
    let width = line_width(line);
    if width == 0 {
        return 1;
    }
    width.div_ceil(text_width.max(1))
}

/// Center a fixed-size rect in `area` with flexible gutters, letting
/// the layout solver clamp oversized popups to what fits.
fn center(width: u16, height: u16, area: Rect) -> Rect {
    let row = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height),
        Constraint::Fill(1),
    ])
    .split(area)[1];
    Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(width),
        Constraint::Fill(1),
    ])
    .split(row)[1]
}
