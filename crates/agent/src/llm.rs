//! LLM transport abstraction and OpenAI-compatible implementation.

use std::pin::Pin;

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionStreamResponse,
    },
};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt, future};
use proto::{ChatMessage, LlmError, Role, SelectableModel};
use tracing::debug;

/// Upper bound on generated tokens per reply.
pub const MAX_TOKENS: u32 = 4096;

/// Lazy, finite, non-restartable sequence of text fragments.
///
/// The stream ends after the final fragment; an `Err` item is terminal.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Request to the LLM
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Target model id.
    pub model: String,
    /// Full chat history, led by the system prompt.
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Builds a request from a model id and a conversation snapshot.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }

    /// Returns the leading system prompt, if the history has one.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }
}

/// Transport capability consumed by the chat session.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Lists models the credential can use.
    async fn list_models(&self) -> Result<Vec<SelectableModel>, LlmError>;

    /// Sends a chat request and waits for the complete reply.
    async fn complete(&self, req: ChatRequest) -> Result<String, LlmError>;

    /// Sends a chat request and returns the reply as incremental fragments.
    async fn stream_complete(&self, req: ChatRequest) -> Result<DeltaStream, LlmError>;
}

/// OpenAI-compatible provider (works with OpenAI and any endpoint that
/// speaks the chat completions protocol).
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates an OpenAI provider using the default API base URL.
    pub fn new(api_key: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);
        Self { client }
    }

    /// Creates an OpenAI provider with a custom API base URL.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        let client = Client::with_config(config);
        Self { client }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn list_models(&self) -> Result<Vec<SelectableModel>, LlmError> {
        let response = self.client.models().list().await.map_err(map_openai_error)?;
        debug!(count = %response.data.len(), "Fetched model list");
        Ok(response
            .data
            .into_iter()
            .map(|m| SelectableModel::new(m.id, format!("owned by {}", m.owned_by)))
            .collect())
    }

    async fn complete(&self, req: ChatRequest) -> Result<String, LlmError> {
        let request = build_request(&req)?;
        debug!(model = %req.model, messages = %req.messages.len(), "Sending completion request");

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".into()))?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream_complete(&self, req: ChatRequest) -> Result<DeltaStream, LlmError> {
        let request = build_request(&req)?;
        debug!(model = %req.model, messages = %req.messages.len(), "Opening completion stream");

        let chunks = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(map_openai_error)?;

        let deltas = chunks.filter_map(|chunk| {
            future::ready(match chunk {
                Ok(chunk) => chunk_text(chunk).map(Ok),
                Err(e) => Some(Err(map_openai_error(e))),
            })
        });
        Ok(Box::pin(deltas))
    }
}

/// Builds the wire request from a chat request.
fn build_request(req: &ChatRequest) -> Result<CreateChatCompletionRequest, LlmError> {
    let messages: Vec<ChatCompletionRequestMessage> = req
        .messages
        .iter()
        .map(convert_message)
        .collect::<Result<_, _>>()?;

    CreateChatCompletionRequestArgs::default()
        .model(&req.model)
        .messages(messages)
        .max_completion_tokens(MAX_TOKENS)
        .build()
        .map_err(|e| LlmError::Serialization(e.to_string()))
}

/// Converts an internal chat message into OpenAI request format.
fn convert_message(m: &ChatMessage) -> Result<ChatCompletionRequestMessage, LlmError> {
    match m.role {
        Role::System => Ok(ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(|e| LlmError::Serialization(e.to_string()))?,
        )),
        Role::User => Ok(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(|e| LlmError::Serialization(e.to_string()))?,
        )),
        Role::Assistant => Ok(ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(|e| LlmError::Serialization(e.to_string()))?,
        )),
    }
}

/// Concatenates the text carried by one stream chunk; `None` when the
/// chunk has no text (role preamble, finish marker).
fn chunk_text(chunk: CreateChatCompletionStreamResponse) -> Option<String> {
    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();
    (!text.is_empty()).then_some(text)
}

/// Maps an `async-openai` error to the transport error taxonomy.
fn map_openai_error(e: OpenAIError) -> LlmError {
    match e {
        OpenAIError::StreamError(msg) => LlmError::Stream(msg),
        OpenAIError::JSONDeserialize(err) => LlmError::Stream(err.to_string()),
        other => {
            let msg = other.to_string();
            debug!(error = %msg, "OpenAI API error");
            classify_api_message(msg)
        }
    }
}

/// Classifies an API error message and attaches a hint for common causes.
fn classify_api_message(msg: String) -> LlmError {
    let lower = msg.to_lowercase();
    if lower.contains("rate limit") {
        return LlmError::RateLimit;
    }
    let hint = if lower.contains("does not exist") || lower.contains("model_not_found") {
        " Try /model to select a different model."
    } else if lower.contains("billing") || lower.contains("quota") {
        " Check your OpenAI billing at https://platform.openai.com."
    } else {
        ""
    };
    LlmError::Api(format!("{msg}{hint}"))
}
