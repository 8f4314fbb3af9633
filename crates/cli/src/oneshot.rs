//! Single-prompt mode: send one message, print the reply, exit.

use std::io::{IsTerminal, Read, Write};
use std::sync::Arc;

use agent::{ChatRequest, ChatSession, LlmProvider, TurnEvent};
use anyhow::Context;
use crossterm::style::Stylize;
use proto::ChatMessage;
use tracing::{debug, info};

use crate::config::{DisplayConfig, SessionConfig};

/// Appends piped input to the prompt as a fenced block.
pub fn compose_prompt(prompt: &str, piped: Option<&str>) -> String {
    match piped.map(str::trim_end).filter(|s| !s.trim().is_empty()) {
        Some(stdin) => format!("{prompt}\n\n```\n{stdin}\n```"),
        None => prompt.to_string(),
    }
}

/// Reads stdin when it is not a terminal.
pub fn read_piped_stdin() -> anyhow::Result<Option<String>> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    stdin
        .read_to_string(&mut buf)
        .context("failed to read piped stdin")?;
    Ok(Some(buf))
}

/// Sends `prompt` and writes the reply to `out`.
///
/// With `stream` set, text is written fragment by fragment as it arrives.
pub async fn run<W: Write>(
    config: &SessionConfig,
    provider: Arc<dyn LlmProvider>,
    prompt: &str,
    stream: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    let display = config.display;
    if display.verbose {
        writeln!(out, "{} {prompt}", label("USER INPUT:", display, Label::User))?;
    }
    debug!(model = %config.model, stream, chars = prompt.len(), "One-shot request");

    if !display.quiet {
        write!(out, "{} ", label("Assistant:", display, Label::Assistant))?;
        out.flush()?;
    }

    if stream {
        let mut session = ChatSession::new(provider, config.model.clone(), config.system_prompt.clone());
        session.begin_turn(prompt)?;
        while let Some(event) = session.next_event().await {
            match event {
                TurnEvent::Delta(text) => {
                    out.write_all(text.as_bytes())?;
                    out.flush()?;
                }
                TurnEvent::Completed(text) => {
                    info!(chars = text.len(), "One-shot reply complete");
                }
                TurnEvent::Failed(err) => {
                    writeln!(out)?;
                    return Err(err).context("request failed");
                }
            }
        }
    } else {
        let request = ChatRequest::new(
            config.model.clone(),
            vec![
                ChatMessage::system(config.system_prompt.clone()),
                ChatMessage::user(prompt),
            ],
        );
        let reply = provider.complete(request).await.context("request failed")?;
        out.write_all(reply.as_bytes())?;
    }

    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[derive(Clone, Copy)]
enum Label {
    User,
    Assistant,
}

fn label(text: &str, display: DisplayConfig, kind: Label) -> String {
    if display.no_color {
        return text.to_string();
    }
    match kind {
        Label::User => text.cyan().bold().to_string(),
        Label::Assistant => text.green().bold().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use agent::testing::{Script, ScriptedProvider};
    use proto::{LlmError, Role};

    fn config(display: DisplayConfig) -> SessionConfig {
        SessionConfig {
            provider: ProviderKind::OpenAi,
            api_key: "sk-test".into(),
            model: "gpt-4o".into(),
            system_prompt: "sys".into(),
            base_url: None,
            display,
        }
    }

    fn plain() -> DisplayConfig {
        DisplayConfig {
            no_color: true,
            ..DisplayConfig::default()
        }
    }

    #[test]
    fn compose_prompt_fences_piped_input() {
        assert_eq!(
            compose_prompt("explain", Some("fn main() {}\n")),
            "explain\n\n```\nfn main() {}\n```"
        );
        assert_eq!(compose_prompt("explain", None), "explain");
        assert_eq!(compose_prompt("explain", Some("  \n")), "explain");
    }

    #[tokio::test]
    async fn streams_reply_with_prefix() {
        let provider = ScriptedProvider::new([Script::deltas(["Hi", " there", "!"])]);
        let mut out = Vec::new();
        run(&config(plain()), provider.clone(), "Hello", true, &mut out)
            .await
            .expect("run");

        assert_eq!(String::from_utf8(out).expect("utf8"), "Assistant: Hi there!\n");
        let sent = provider.requests();
        assert_eq!(sent[0].messages[0].role, Role::System);
        assert_eq!(sent[0].messages[1], ChatMessage::user("Hello"));
    }

    #[tokio::test]
    async fn quiet_omits_prefix_and_verbose_echoes_input() {
        let provider = ScriptedProvider::new([Script::deltas(["ok"])]);
        let mut out = Vec::new();
        let display = DisplayConfig {
            quiet: true,
            verbose: true,
            no_color: true,
        };
        run(&config(display), provider, "ping", true, &mut out)
            .await
            .expect("run");

        assert_eq!(String::from_utf8(out).expect("utf8"), "USER INPUT: ping\nok\n");
    }

    #[tokio::test]
    async fn no_stream_uses_complete() {
        let provider = ScriptedProvider::new([Script::deltas(["whole", " reply"])]);
        let mut out = Vec::new();
        let display = DisplayConfig {
            quiet: true,
            ..plain()
        };
        run(&config(display), provider, "q", false, &mut out)
            .await
            .expect("run");
        assert_eq!(String::from_utf8(out).expect("utf8"), "whole reply\n");
    }

    #[tokio::test]
    async fn transport_error_is_returned() {
        let provider = ScriptedProvider::new([Script::Reject(LlmError::RateLimit)]);
        let mut out = Vec::new();
        let err = run(&config(plain()), provider, "q", true, &mut out)
            .await
            .expect_err("must fail");
        assert!(format!("{err:#}").contains("Rate limit"));
    }

    #[test]
    fn colour_labels_carry_ansi_codes() {
        let coloured = label("Assistant:", DisplayConfig::default(), Label::Assistant);
        assert!(coloured.contains('\u{1b}'));
        assert_eq!(label("Assistant:", plain(), Label::Assistant), "Assistant:");
    }
}
