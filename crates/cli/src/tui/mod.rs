//! Full-screen ratatui chat interface.

pub mod app;
pub mod chat;
pub mod event;
pub mod model_select;
pub mod status;
pub mod theme;

pub use event::run_tui;
