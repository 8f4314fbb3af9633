use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// One unit of progress from an in-flight generation.
///
/// A stream yields any number of `Delta`s followed by exactly one terminal
/// `End` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An incremental fragment of generated text.
    Delta(String),
    /// The generation completed normally.
    End,
    /// The generation failed; no further events follow.
    Error(LlmError),
}

impl StreamEvent {
    /// Returns `true` for `End` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::End | StreamEvent::Error(_))
    }
}

/// A model the user can switch to from the model selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectableModel {
    /// Model id sent with each request.
    pub id: String,
    /// Human-readable one-line description.
    pub description: String,
}

impl SelectableModel {
    /// Creates a selectable model entry.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}
