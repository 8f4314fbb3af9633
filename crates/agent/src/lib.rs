//! Chat session core: transport interface, conversation history, and
//! streaming turn management.

pub mod anthropic;
pub mod conversation;
pub mod llm;
pub mod session;
pub mod stream;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Anthropic Messages API transport.
pub use anthropic::AnthropicProvider;
/// Ordered conversation history.
pub use conversation::Conversation;
/// Chat request model and transport interface.
pub use llm::{ChatRequest, DeltaStream, LlmProvider, OpenAiProvider};
/// Session controller and the events it reports.
pub use session::{ChatSession, TurnEvent};
/// Single in-flight generation.
pub use stream::{StreamHandle, StreamState};
