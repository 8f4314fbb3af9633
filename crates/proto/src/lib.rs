//! Shared protocol types for the chat client.
//!
//! This crate defines the conversation message types, the incremental
//! stream events produced by a transport, and strongly-typed error enums
//! shared across the workspace.

pub mod error;
pub mod event;
pub mod message;

/// Re-export of all protocol error types.
pub use error::*;
/// Re-export of streaming event and model listing types.
pub use event::{SelectableModel, StreamEvent};
/// Re-export of conversation/message identity types.
pub use message::{ChatMessage, Role, SessionId};
