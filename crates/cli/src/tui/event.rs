//! Async event loop for the TUI. Interleaves crossterm input, stream
//! progress, the model-list fetch and the spinner timer.

use std::sync::Arc;

use agent::{ChatSession, LlmProvider};
use anyhow::Context;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use proto::{LlmError, SelectableModel};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::app::{Command, TuiApp};
use crate::config::SessionConfig;

type ModelTask = JoinHandle<Result<Vec<SelectableModel>, LlmError>>;

/// Consecutive terminal read failures tolerated before the TUI gives up.
const MAX_READ_ERRORS: u32 = 5;

/// Counts consecutive failed terminal reads.
#[derive(Debug, Default)]
struct ReadErrors(u32);

impl ReadErrors {
    fn reset(&mut self) {
        self.0 = 0;
    }

    /// Records one failure; `true` once the limit is reached.
    fn record(&mut self) -> bool {
        self.0 += 1;
        self.0 >= MAX_READ_ERRORS
    }
}

/// Restores the terminal when dropped, including on error paths.
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
    }
}

/// Run the full-screen TUI until the user quits.
pub async fn run_tui(config: SessionConfig, provider: Arc<dyn LlmProvider>) -> anyhow::Result<()> {
    // Terminal setup
    enable_raw_mode().context("failed to enable raw mode")?;
    let _guard = TerminalGuard; // Drop restores terminal
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to initialise terminal")?;

    let session = ChatSession::new(provider, config.model.clone(), config.system_prompt.clone());
    debug!(session = %session.id(), model = %config.model, "TUI started");

    let mut app = TuiApp::new(session, config.provider, config.display);
    if let Ok(size) = terminal.size() {
        app.on_resize(size.width, size.height);
    }

    // Crossterm event stream (async)
    let mut crossterm_stream = EventStream::new();
    let mut model_task: Option<ModelTask> = None;
    let mut read_errors = ReadErrors::default();

    // Spinner tick interval (100ms)
    let mut spinner_interval = tokio::time::interval(std::time::Duration::from_millis(100));
    spinner_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        terminal
            .draw(|frame| app.render(frame))
            .context("failed to draw frame")?;

        let streaming = app.session.is_streaming();

        tokio::select! {
            maybe_event = crossterm_stream.next() => {
                if matches!(maybe_event, Some(Ok(_))) {
                    read_errors.reset();
                }
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if app.handle_key(key) == Command::LoadModels && model_task.is_none() {
                            model_task = Some(tokio::spawn(app.session.list_models()));
                        }
                    }
                    Some(Ok(Event::Resize(width, height))) => {
                        debug!(width, height, "Terminal resized");
                        app.on_resize(width, height);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        if read_errors.record() {
                            return Err(err).context("failed to read terminal event");
                        }
                        warn!(error = %err, failures = read_errors.0, "Terminal event read failed");
                    }
                    None => break,
                }
            }

            Some(event) = app.session.next_event(), if streaming => {
                app.apply_turn_event(event);
            }

            result = async {
                match model_task.as_mut() {
                    Some(handle) => handle.await,
                    None => std::future::pending().await,
                }
            } => {
                model_task = None;
                let result = match result {
                    Ok(listed) => listed.map_err(|e| e.to_string()),
                    Err(join_err) => {
                        warn!(error = %join_err, "Model task failed");
                        Err(join_err.to_string())
                    }
                };
                app.apply_models(result);
            }

            _ = spinner_interval.tick(), if streaming => {
                app.tick();
            }
        }

        if app.should_quit {
            break;
        }
    }

    if let Some(handle) = model_task.take() {
        handle.abort();
    }
    debug!(session = %app.session.id(), "TUI exited");
    // TerminalGuard::drop handles cleanup
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_guard_drop_path_is_safe() {
        let guard = TerminalGuard;
        drop(guard);
    }

    #[test]
    fn transient_read_errors_are_tolerated_until_limit() {
        let mut errors = ReadErrors::default();
        for _ in 1..MAX_READ_ERRORS {
            assert!(!errors.record());
        }
        errors.reset();
        assert!(!errors.record());

        let mut errors = ReadErrors::default();
        let exhausted = (0..MAX_READ_ERRORS).map(|_| errors.record()).last();
        assert_eq!(exhausted, Some(true));
    }
}
