//! TUI application state, rendering, and input handling.

use std::cell::Cell;

use agent::{ChatSession, TurnEvent};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use proto::{SelectableModel, SessionError};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use tracing::debug;
use unicode_width::UnicodeWidthStr;

use super::model_select::{ModelSelector, SelectorOutcome};
use super::theme::Theme;
use super::{chat, status};
use crate::commands::{HELP_TEXT, Input, parse_input};
use crate::config::{DisplayConfig, ProviderKind};
use crate::model_catalog;

/// Input box height bounds, borders included.
const INPUT_MIN_HEIGHT: u16 = 3;
const INPUT_MAX_HEIGHT: u16 = 8;
/// Transcript rows moved by PageUp/PageDown.
const PAGE_ROWS: u16 = 10;

// ─── Data types ──────────────────────────────────────────────

/// A single rendered item in the transcript. Never sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// User typed this message.
    User(String),
    /// Completed assistant reply.
    Assistant(String),
    /// Informational line (startup, model switch, clear).
    Notice(String),
    /// Output of `/help`.
    Help(String),
    /// Partial reply cut off by cancellation.
    Interrupted(String),
    /// Transport or session error.
    Error(String),
}

/// Which surface has keyboard focus.
#[derive(Debug, Clone)]
pub enum Mode {
    Chatting,
    SelectingModel(ModelSelector),
}

/// Side effects returned from key handling. The event loop is
/// responsible for executing these asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// No side effect.
    None,
    /// Fetch the model list for the open selector.
    LoadModels,
}

// ─── TuiApp ──────────────────────────────────────────────────

/// Full state for the TUI session.
pub struct TuiApp {
    /// Conversation, model, and the in-flight turn.
    pub session: ChatSession,
    /// Chat API behind the session; picks the selector's model family.
    pub provider: ProviderKind,
    /// Ordered transcript for display.
    pub log: Vec<LogEntry>,
    /// Current text typed in the input box (not yet submitted).
    pub input: String,
    /// Cursor position within `input` (byte offset).
    pub cursor_pos: usize,
    pub mode: Mode,
    /// Vertical scroll offset for the transcript; `u16::MAX` pins it to
    /// the bottom. Clamped at render time.
    pub history_scroll: u16,
    /// Largest useful scroll offset, recorded by the last transcript render.
    pub transcript_max_scroll: Cell<u16>,
    /// Spinner animation tick counter.
    pub spinner_tick: u8,
    /// Whether the user requested exit.
    pub should_quit: bool,
    pub display: DisplayConfig,
    pub theme: &'static Theme,
    /// Last known terminal size.
    pub viewport: (u16, u16),
}

impl TuiApp {
    /// Create a new TUI application state with the startup notice.
    pub fn new(session: ChatSession, provider: ProviderKind, display: DisplayConfig) -> Self {
        let startup = format!("Using {} (type /help for commands)", session.model());
        Self {
            session,
            provider,
            log: vec![LogEntry::Notice(startup)],
            input: String::new(),
            cursor_pos: 0,
            mode: Mode::Chatting,
            history_scroll: 0,
            transcript_max_scroll: Cell::new(0),
            spinner_tick: 0,
            should_quit: false,
            display,
            theme: Theme::select(display.no_color),
            viewport: (0, 0),
        }
    }

    // ── State mutations ──────────────────────────────────────

    /// Take the current input and reset it.
    pub fn take_input(&mut self) -> String {
        self.cursor_pos = 0;
        std::mem::take(&mut self.input)
    }

    /// Placeholder shown in the empty input box.
    pub fn placeholder(&self) -> String {
        format!(
            "Using {} (type /model to change or /help for help) - Tab for newline",
            self.session.model()
        )
    }

    /// Apply one event of the in-flight turn.
    pub fn apply_turn_event(&mut self, event: TurnEvent) {
        match event {
            TurnEvent::Delta(_) => {}
            TurnEvent::Completed(text) => self.log.push(LogEntry::Assistant(text)),
            TurnEvent::Failed(err) => self.log.push(LogEntry::Error(err.to_string())),
        }
        self.scroll_to_bottom();
    }

    /// Apply the outcome of a model-list fetch.
    ///
    /// Ignored when the selector was closed before the fetch finished. A
    /// fallback notice stays inside the selector; the transcript is untouched.
    pub fn apply_models(&mut self, result: Result<Vec<SelectableModel>, String>) {
        let Mode::SelectingModel(selector) = &mut self.mode else {
            debug!("Model list arrived after selector closed");
            return;
        };
        let (candidates, notice) = model_catalog::candidates_from(self.provider, result);
        debug!(count = %candidates.len(), fallback = %notice.is_some(), "Model selector populated");
        selector.set_candidates(candidates, notice);
    }

    /// Record a terminal resize; the transcript is re-wrapped on the next frame.
    pub fn on_resize(&mut self, width: u16, height: u16) {
        self.viewport = (width, height);
        self.scroll_to_bottom();
    }

    /// Advance the spinner animation.
    pub fn tick(&mut self) {
        self.spinner_tick = self.spinner_tick.wrapping_add(1);
    }

    /// Cancel the in-flight turn, keeping its partial text as an
    /// `Interrupted` entry.
    pub fn cancel_stream(&mut self) {
        if let Some(partial) = self.session.cancel() {
            self.log.push(LogEntry::Interrupted(partial));
            self.scroll_to_bottom();
        }
    }

    /// Submit the current input.
    pub fn submit(&mut self) -> Command {
        match parse_input(&self.input) {
            Input::Empty => {
                self.take_input();
                Command::None
            }
            Input::Help => {
                self.take_input();
                self.log.push(LogEntry::Help(HELP_TEXT.to_string()));
                self.scroll_to_bottom();
                Command::None
            }
            Input::Model => {
                self.take_input();
                debug!(current = %self.session.model(), "Model selector opened");
                self.mode = Mode::SelectingModel(ModelSelector::loading(self.session.model()));
                Command::LoadModels
            }
            Input::Clear => {
                self.take_input();
                self.session.clear();
                self.log = vec![LogEntry::Notice("Conversation history cleared".to_string())];
                self.history_scroll = 0;
                Command::None
            }
            Input::Chat(text) => {
                match self.session.begin_turn(text.clone()) {
                    Ok(()) => {
                        self.take_input();
                        if self.display.verbose {
                            debug!(input = %text, "USER INPUT");
                        }
                        self.log.push(LogEntry::User(text));
                    }
                    Err(err @ SessionError::StreamInFlight) => {
                        self.log.push(LogEntry::Notice(err.to_string()));
                    }
                    Err(err) => self.log.push(LogEntry::Error(err.to_string())),
                }
                self.scroll_to_bottom();
                Command::None
            }
        }
    }

    // ── Input handling ───────────────────────────────────────

    /// Handle a keyboard event.
    pub fn handle_key(&mut self, key: KeyEvent) -> Command {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.cancel_stream();
            self.should_quit = true;
            return Command::None;
        }

        if let Mode::SelectingModel(selector) = &mut self.mode {
            match selector.handle_key(key) {
                SelectorOutcome::Pending => {}
                SelectorOutcome::Apply(id) => {
                    self.mode = Mode::Chatting;
                    self.session.set_model(id.clone());
                    self.log.push(LogEntry::Notice(format!("Switched to {id}")));
                    self.scroll_to_bottom();
                }
                SelectorOutcome::Cancel => {
                    debug!("Model selector cancelled");
                    self.mode = Mode::Chatting;
                }
            }
            return Command::None;
        }

        let newline_mods = KeyModifiers::ALT | KeyModifiers::SHIFT;
        match key.code {
            KeyCode::Esc => self.cancel_stream(),
            KeyCode::Enter if key.modifiers.intersects(newline_mods) => self.insert_char('\n'),
            KeyCode::Tab => self.insert_char('\n'),
            KeyCode::Enter => return self.submit(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(c)
            }
            KeyCode::Backspace => {
                if self.cursor_pos > 0 {
                    let prev = self.prev_boundary();
                    self.input.drain(prev..self.cursor_pos);
                    self.cursor_pos = prev;
                }
            }
            KeyCode::Delete => {
                if self.cursor_pos < self.input.len() {
                    let next = self.next_boundary();
                    self.input.drain(self.cursor_pos..next);
                }
            }
            KeyCode::Left => self.cursor_pos = self.prev_boundary(),
            KeyCode::Right => self.cursor_pos = self.next_boundary(),
            KeyCode::Home => {
                self.cursor_pos = self.input[..self.cursor_pos]
                    .rfind('\n')
                    .map(|i| i + 1)
                    .unwrap_or(0);
            }
            KeyCode::End => {
                self.cursor_pos = self.input[self.cursor_pos..]
                    .find('\n')
                    .map(|i| self.cursor_pos + i)
                    .unwrap_or(self.input.len());
            }
            KeyCode::Up => self.scroll_up(1),
            KeyCode::Down => self.scroll_down(1),
            KeyCode::PageUp => self.scroll_up(PAGE_ROWS),
            KeyCode::PageDown => self.scroll_down(PAGE_ROWS),
            _ => {}
        }
        Command::None
    }

    fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor_pos, c);
        self.cursor_pos += c.len_utf8();
    }

    fn prev_boundary(&self) -> usize {
        self.input[..self.cursor_pos]
            .char_indices()
            .last()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn next_boundary(&self) -> usize {
        self.input[self.cursor_pos..]
            .chars()
            .next()
            .map(|c| self.cursor_pos + c.len_utf8())
            .unwrap_or(self.input.len())
    }

    // ── Rendering ────────────────────────────────────────────

    /// Render the entire TUI into the given frame.
    pub fn render(&self, frame: &mut Frame<'_>) {
        let area = frame.area();

        // Layout: title(1) | transcript(fill) | status(1) | input(3..8)
        let chunks = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(self.input_height()),
        ])
        .split(area);

        self.render_title(frame, chunks[0]);
        chat::render(self, frame, chunks[1]);
        status::render(self, frame, chunks[2]);
        self.render_input(frame, chunks[3]);

        if let Mode::SelectingModel(selector) = &self.mode {
            selector.render(frame, area, self.theme);
        }
    }

    fn input_height(&self) -> u16 {
        let rows = u16::try_from(self.input.split('\n').count()).unwrap_or(u16::MAX);
        rows.saturating_add(2)
            .clamp(INPUT_MIN_HEIGHT, INPUT_MAX_HEIGHT)
    }

    fn render_title(&self, frame: &mut Frame<'_>, area: Rect) {
        let theme = self.theme;
        let title = Line::from(vec![
            Span::styled(
                " ai ",
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" session:{} ", self.session.id().short()),
                Style::default().fg(theme.fg_muted),
            ),
            Span::styled(
                format!(" {} ", self.session.model()),
                Style::default().fg(theme.status_model),
            ),
        ]);
        frame.render_widget(Paragraph::new(title), area);
    }

    fn render_input(&self, frame: &mut Frame<'_>, area: Rect) {
        let theme = self.theme;
        let chatting = matches!(self.mode, Mode::Chatting);
        let border_color = if chatting && !self.session.is_streaming() {
            theme.border_active
        } else {
            theme.border
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title(" Input ");

        let (cursor_row, cursor_col) = self.cursor_row_col();
        let visible_rows = area.height.saturating_sub(2);
        let scroll = cursor_row.saturating_sub(visible_rows.saturating_sub(1));

        let input = if self.input.is_empty() {
            Paragraph::new(Span::styled(
                self.placeholder(),
                Style::default().fg(theme.fg_muted),
            ))
        } else {
            let lines: Vec<Line<'_>> = self.input.split('\n').map(Line::from).collect();
            Paragraph::new(lines).style(Style::default().fg(theme.fg))
        };
        frame.render_widget(input.block(block).scroll((scroll, 0)), area);

        if chatting {
            let x = area.x + 1 + cursor_col.min(area.width.saturating_sub(3));
            let y = area.y + 1 + (cursor_row - scroll);
            frame.set_cursor_position((x, y));
        }
    }

    /// Row and display column of the cursor within the input text.
    fn cursor_row_col(&self) -> (u16, u16) {
        let before = &self.input[..self.cursor_pos];
        let row = before.matches('\n').count();
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let col = before[line_start..].width();
        (
            u16::try_from(row).unwrap_or(u16::MAX),
            u16::try_from(col).unwrap_or(u16::MAX),
        )
    }

    /// Ensure scroll is at the bottom (for auto-scroll on new messages).
    pub fn scroll_to_bottom(&mut self) {
        // Set to a large value; the transcript render clamps it.
        self.history_scroll = u16::MAX;
    }

    /// Scroll offset as rendered.
    pub fn effective_scroll(&self) -> u16 {
        self.history_scroll.min(self.transcript_max_scroll.get())
    }

    fn scroll_up(&mut self, rows: u16) {
        self.history_scroll = self.effective_scroll().saturating_sub(rows);
    }

    fn scroll_down(&mut self, rows: u16) {
        let max = self.transcript_max_scroll.get();
        let next = self.effective_scroll().saturating_add(rows);
        self.history_scroll = if next >= max { u16::MAX } else { next };
    }
}
