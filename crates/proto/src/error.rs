use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was not provided.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A field has an invalid value and reason.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Filesystem read error.
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

/// LLM transport errors.
///
/// Cloneable so a terminal stream error can be both reported in the
/// transcript and logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    /// Remote API rejected the request or the connection failed.
    #[error("{0}")]
    Api(String),

    /// Provider throttled the request.
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Provider response schema/content was invalid.
    #[error("Invalid response from LLM: {0}")]
    InvalidResponse(String),

    /// A streamed event could not be decoded or arrived out of order.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Chat session errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A generation is already streaming for this session.
    #[error("A response is still streaming. Wait for it to finish or press Esc to cancel.")]
    StreamInFlight,

    /// The submitted message had no content.
    #[error("Nothing to send")]
    EmptyMessage,
}
