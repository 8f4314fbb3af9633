//! Status bar widget: activity indicator, key hints and version.

use super::app::{Mode, TuiApp};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
};

/// Braille-pattern spinner frames for the status bar animation.
const SPINNER: &[char] = &['⣾', '⣽', '⣻', '⢿', '⡿', '⣟', '⣯', '⣷'];

/// Renders the one-line status bar.
pub fn render(app: &TuiApp, frame: &mut Frame<'_>, area: Rect) {
    let theme = app.theme;
    let status_text = match &app.mode {
        Mode::SelectingModel(_) => Line::from(Span::styled(
            " Model selector | ↑↓:move  Enter:apply  Esc:cancel",
            Style::default().fg(theme.status_hint),
        )),
        Mode::Chatting if app.session.is_streaming() => {
            let spinner = SPINNER[usize::from(app.spinner_tick) % SPINNER.len()];
            Line::from(vec![
                Span::styled(
                    format!(" {spinner} Generating… "),
                    Style::default().fg(theme.status_spinner),
                ),
                Span::styled(
                    " Esc:cancel  Ctrl+C:quit",
                    Style::default().fg(theme.status_hint),
                ),
            ])
        }
        Mode::Chatting => Line::from(vec![
            Span::styled(
                format!(" {} ", app.session.model()),
                Style::default().fg(theme.status_model),
            ),
            Span::styled(
                " Enter:send  Tab:newline  ↑↓:scroll  /help  Ctrl+C:quit",
                Style::default().fg(theme.status_hint),
            ),
        ]),
    };

    let chunks = Layout::horizontal([Constraint::Min(0), Constraint::Length(10)]).split(area);

    frame.render_widget(Paragraph::new(status_text), chunks[0]);

    let version_text = Line::from(Span::styled(
        format!("v{}  ", env!("CARGO_PKG_VERSION")),
        Style::default().fg(theme.status_hint),
    ));
    frame.render_widget(Paragraph::new(version_text).right_aligned(), chunks[1]);
}
