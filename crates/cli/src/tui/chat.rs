//! Transcript widget: renders the display log and the in-flight reply.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
};
use unicode_width::UnicodeWidthChar;

use super::app::{LogEntry, TuiApp};
use super::theme::Theme;

/// Cursor glyph appended to a reply that is still streaming.
const STREAM_CURSOR: &str = "▌";

/// Renders the transcript area.
pub fn render(app: &TuiApp, frame: &mut Frame<'_>, area: Rect) {
    let theme = app.theme;
    let inner_width = area.width.saturating_sub(2);
    let lines = transcript_lines(app, theme, inner_width);

    let content_height = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    let visible_height = area.height.saturating_sub(2);
    let max_scroll = content_height.saturating_sub(visible_height);
    app.transcript_max_scroll.set(max_scroll);
    let scroll = app.history_scroll.min(max_scroll);

    let history = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border)),
        )
        .scroll((scroll, 0));

    frame.render_widget(history, area);
}

/// All transcript rows, already wrapped to `width` columns.
pub fn transcript_lines(app: &TuiApp, theme: &Theme, width: u16) -> Vec<Line<'static>> {
    let mut logical: Vec<Line<'static>> = Vec::new();

    for entry in &app.log {
        if app.display.quiet && matches!(entry, LogEntry::Notice(_)) {
            continue;
        }
        push_entry(&mut logical, entry, theme);
    }

    if let Some(partial) = app.session.streaming_text() {
        let text = format!("{partial}{STREAM_CURSOR}");
        push_labelled(&mut logical, "Assistant: ", theme.assistant_label, &text, Style::default().fg(theme.fg));
    }

    logical
        .into_iter()
        .flat_map(|line| wrap_line(line, width))
        .collect()
}

fn push_entry(lines: &mut Vec<Line<'static>>, entry: &LogEntry, theme: &Theme) {
    let body = Style::default().fg(theme.fg);
    match entry {
        LogEntry::User(text) => push_labelled(lines, "You: ", theme.user_label, text, body),
        LogEntry::Assistant(text) => {
            push_labelled(lines, "Assistant: ", theme.assistant_label, text, body)
        }
        LogEntry::Interrupted(text) => {
            let muted = Style::default().fg(theme.interrupted);
            let text = if text.is_empty() {
                "[interrupted]".to_string()
            } else {
                format!("{text} [interrupted]")
            };
            push_labelled(lines, "Assistant: ", theme.interrupted, &text, muted);
        }
        LogEntry::Notice(text) => {
            lines.push(Line::from(""));
            for row in text.lines() {
                lines.push(Line::from(Span::styled(
                    format!("• {row}"),
                    Style::default().fg(theme.notice),
                )));
            }
        }
        LogEntry::Help(text) => {
            lines.push(Line::from(""));
            for row in text.lines() {
                lines.push(Line::from(Span::styled(
                    row.to_string(),
                    Style::default().fg(theme.help),
                )));
            }
        }
        LogEntry::Error(text) => {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("Error: {text}"),
                Style::default().fg(theme.error).add_modifier(Modifier::BOLD),
            )));
        }
    }
}

/// Pushes a blank separator, then `text` with `label` on its first row and
/// continuation rows indented under it.
fn push_labelled(
    lines: &mut Vec<Line<'static>>,
    label: &'static str,
    label_color: ratatui::style::Color,
    text: &str,
    body: Style,
) {
    lines.push(Line::from(""));
    let indent = " ".repeat(label.chars().count());
    let label_style = Style::default()
        .fg(label_color)
        .add_modifier(Modifier::BOLD);

    let mut rows = text.split('\n');
    let first = rows.next().unwrap_or_default();
    lines.push(Line::from(vec![
        Span::styled(label, label_style),
        Span::styled(first.to_string(), body),
    ]));
    for row in rows {
        lines.push(Line::from(vec![
            Span::raw(indent.clone()),
            Span::styled(row.to_string(), body),
        ]));
    }
}

/// Splits one line into rows of at most `width` display columns.
///
/// Wraps at character boundaries so the row count is exact for scrolling.
pub fn wrap_line(line: Line<'static>, width: u16) -> Vec<Line<'static>> {
    let width = usize::from(width.max(1));
    let mut rows: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut col = 0usize;

    for span in line.spans {
        let style = span.style;
        let mut chunk = String::new();
        for ch in span.content.chars() {
            let w = ch.width().unwrap_or(0);
            if col + w > width && col > 0 {
                if !chunk.is_empty() {
                    current.push(Span::styled(std::mem::take(&mut chunk), style));
                }
                rows.push(Line::from(std::mem::take(&mut current)));
                col = 0;
            }
            chunk.push(ch);
            col += w;
        }
        if !chunk.is_empty() {
            current.push(Span::styled(chunk, style));
        }
    }
    rows.push(Line::from(current));
    rows
}
