//! Interpretation of submitted input lines.

/// Text shown for `/help`.
pub const HELP_TEXT: &str = "Available commands:
• /help  - Show this help message
• /model - Change the AI model
• /clear - Clear conversation history
• TAB    - Insert newline";

/// What a submitted line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Nothing but whitespace.
    Empty,
    Help,
    Model,
    Clear,
    /// Anything else, sent verbatim as a chat message.
    Chat(String),
}

/// Classifies a submitted line.
///
/// Commands match only as the whole trimmed line; unknown slash tokens are
/// chat content.
pub fn parse_input(raw: &str) -> Input {
    match raw.trim() {
        "" => Input::Empty,
        "/help" => Input::Help,
        "/model" => Input::Model,
        "/clear" => Input::Clear,
        _ => Input::Chat(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_tokens_match_after_trimming() {
        assert_eq!(parse_input("/help"), Input::Help);
        assert_eq!(parse_input("  /model \n"), Input::Model);
        assert_eq!(parse_input("\t/clear"), Input::Clear);
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert_eq!(parse_input(""), Input::Empty);
        assert_eq!(parse_input(" \n\t "), Input::Empty);
    }

    #[test]
    fn unknown_commands_and_arguments_are_chat() {
        assert_eq!(parse_input("/quit"), Input::Chat("/quit".into()));
        assert_eq!(
            parse_input("/model gpt-4"),
            Input::Chat("/model gpt-4".into())
        );
        assert_eq!(parse_input("/HELP"), Input::Chat("/HELP".into()));
    }

    #[test]
    fn chat_text_is_kept_verbatim() {
        assert_eq!(
            parse_input("  line one\nline two "),
            Input::Chat("  line one\nline two ".into())
        );
    }

    #[test]
    fn help_text_lists_every_command() {
        for token in ["/help", "/model", "/clear", "TAB"] {
            assert!(HELP_TEXT.contains(token));
        }
    }
}
