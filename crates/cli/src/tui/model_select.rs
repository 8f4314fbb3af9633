//! Model selector overlay: a filterable list of selectable models.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use proto::SelectableModel;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use super::theme::Theme;
use crate::model_catalog;

/// Rows moved by PageUp/PageDown.
const PAGE: usize = 10;

/// Result of one key press inside the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorOutcome {
    /// Still open.
    Pending,
    /// Switch to this model id.
    Apply(String),
    /// Closed without a change.
    Cancel,
}

/// State of the open selector.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    candidates: Vec<SelectableModel>,
    query: String,
    cursor: usize,
    loading: bool,
    current: String,
    /// Why the built-in list is shown instead of the live one.
    notice: Option<String>,
}

impl ModelSelector {
    /// Opens in the loading state; `current` is highlighted once candidates arrive.
    pub fn loading(current: impl Into<String>) -> Self {
        Self {
            candidates: Vec::new(),
            query: String::new(),
            cursor: 0,
            loading: true,
            current: current.into(),
            notice: None,
        }
    }

    /// Fills in the candidate list and leaves the loading state.
    ///
    /// `notice` is shown inside the overlay, never in the transcript.
    pub fn set_candidates(&mut self, candidates: Vec<SelectableModel>, notice: Option<String>) {
        self.candidates = candidates;
        self.notice = notice;
        self.loading = false;
        self.cursor = self
            .visible()
            .iter()
            .position(|m| m.id == self.current)
            .unwrap_or(0);
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Candidates matching the current query, in display order.
    pub fn visible(&self) -> Vec<&SelectableModel> {
        model_catalog::filtered(&self.candidates, &self.query)
    }

    /// The highlighted candidate, if any.
    pub fn selected(&self) -> Option<&SelectableModel> {
        self.visible().get(self.cursor).copied()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> SelectorOutcome {
        let visible_len = self.visible().len();
        let last = visible_len.saturating_sub(1);

        match key.code {
            KeyCode::Esc => return SelectorOutcome::Cancel,
            KeyCode::Enter => {
                if let Some(model) = self.selected() {
                    return SelectorOutcome::Apply(model.id.clone());
                }
            }
            KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down => self.cursor = (self.cursor + 1).min(last),
            KeyCode::PageUp => self.cursor = self.cursor.saturating_sub(PAGE),
            KeyCode::PageDown => self.cursor = (self.cursor + PAGE).min(last),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = last,
            KeyCode::Backspace => {
                self.query.pop();
                self.cursor = 0;
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.query.push(c);
                self.cursor = 0;
            }
            _ => {}
        }
        SelectorOutcome::Pending
    }

    /// Draws the overlay centred over `area`.
    pub fn render(&self, frame: &mut Frame<'_>, area: Rect, theme: &Theme) {
        let popup = centered(area, 64, 18);
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border_active))
            .title(Span::styled(
                " Select model ",
                Style::default()
                    .fg(theme.browser_title)
                    .add_modifier(Modifier::BOLD),
            ));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let notice_height = u16::from(self.notice.is_some());
        let rows = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(notice_height),
            Constraint::Length(1),
        ])
        .split(inner);

        let search = Line::from(vec![
            Span::styled(" Filter: ", Style::default().fg(theme.browser_search)),
            Span::styled(self.query.as_str(), Style::default().fg(theme.fg)),
        ]);
        frame.render_widget(Paragraph::new(search), rows[0]);

        if self.loading {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    " Loading models…",
                    Style::default().fg(theme.fg_muted),
                )),
                rows[1],
            );
        } else {
            let visible = self.visible();
            if visible.is_empty() {
                frame.render_widget(
                    Paragraph::new(Span::styled(
                        " No models match the filter",
                        Style::default().fg(theme.fg_muted),
                    )),
                    rows[1],
                );
            } else {
                let items: Vec<ListItem<'_>> = visible
                    .iter()
                    .map(|m| {
                        let current = if m.id == self.current { " (current)" } else { "" };
                        ListItem::new(Line::from(vec![
                            Span::styled(
                                format!("{}{current}", m.id),
                                Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
                            ),
                            Span::styled(
                                format!("  {}", m.description),
                                Style::default().fg(theme.fg_muted),
                            ),
                        ]))
                    })
                    .collect();
                let list = List::new(items)
                    .highlight_symbol("▸ ")
                    .highlight_style(
                        Style::default()
                            .fg(theme.browser_selected_marker)
                            .bg(theme.browser_selected_bg),
                    );
                let mut state = ListState::default().with_selected(Some(self.cursor));
                frame.render_stateful_widget(list, rows[1], &mut state);
            }
        }

        if let Some(notice) = &self.notice {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!(" {notice}"),
                    Style::default().fg(theme.warning),
                )),
                rows[2],
            );
        }

        frame.render_widget(
            Paragraph::new(Span::styled(
                " ↑↓:move  type:filter  Enter:apply  Esc:cancel",
                Style::default().fg(theme.browser_footer),
            )),
            rows[3],
        );
    }
}

/// A rect of at most `width`×`height` centred in `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
