//! Anthropic Messages API provider with server-sent event streaming.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt, stream};
use proto::{LlmError, Role, SelectableModel};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{ChatRequest, DeltaStream, LlmProvider, MAX_TOKENS};

const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

// ── Request types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: String,
    content: &'a str,
}

// ── Response types ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// One decoded `data:` payload of the message stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamPayload {
    ContentBlockDelta {
        delta: BlockDelta,
    },
    MessageStop,
    Error {
        error: ApiError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ModelPage {
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    id: String,
    #[serde(default)]
    display_name: String,
}

// ── Provider ───────────────────────────────────────────────────────────────────

/// Anthropic Messages API LLM provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    /// Creates a provider targeting the default Anthropic API endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Creates a provider targeting a custom base URL (without `/v1`).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
    }

    async fn send_messages(
        &self,
        req: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let body = build_request(req, stream);
        debug!(
            model = %req.model,
            messages = %body.messages.len(),
            stream,
            "Sending request to Anthropic"
        );
        let response = self
            .request(Method::POST, "/v1/messages")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;
        check_status(response).await
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn list_models(&self) -> Result<Vec<SelectableModel>, LlmError> {
        let response = self
            .request(Method::GET, "/v1/models?limit=100")
            .send()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;
        let page: ModelPage = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        debug!(count = %page.data.len(), "Fetched model list");
        Ok(page
            .data
            .into_iter()
            .map(|m| SelectableModel::new(m.id, m.display_name))
            .collect())
    }

    async fn complete(&self, req: ChatRequest) -> Result<String, LlmError> {
        let response = self.send_messages(&req, false).await?;
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;
        parse_completion(&body)
    }

    async fn stream_complete(&self, req: ChatRequest) -> Result<DeltaStream, LlmError> {
        let response = self.send_messages(&req, true).await?;
        let body = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| LlmError::Stream(e.to_string()))
        });
        Ok(text_deltas(body))
    }
}

// ── Conversion helpers ─────────────────────────────────────────────────────────

/// Builds the wire request. The leading system message moves to the
/// top-level `system` field.
fn build_request(req: &ChatRequest, stream: bool) -> MessagesRequest<'_> {
    let messages = req
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| WireMessage {
            role: m.role.to_string(),
            content: &m.content,
        })
        .collect();

    MessagesRequest {
        model: &req.model,
        max_tokens: MAX_TOKENS,
        system: req.system_prompt(),
        messages,
        stream,
    }
}

fn parse_completion(body: &str) -> Result<String, LlmError> {
    let response: MessagesResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::InvalidResponse(format!("Deserialization error: {e}; body: {}", preview(body)))
    })?;
    Ok(response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    debug!(status = %status.as_u16(), "Anthropic response received");
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status.as_u16(), &body))
}

fn status_error(status: u16, body: &str) -> LlmError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => classify_error(envelope.error),
        Err(_) if status == 429 => LlmError::RateLimit,
        Err(_) => LlmError::Api(format!("HTTP {status}: {}", preview(body))),
    }
}

/// Maps an API error object to the transport taxonomy, with a hint for
/// common causes.
fn classify_error(err: ApiError) -> LlmError {
    match err.kind.as_str() {
        "rate_limit_error" => LlmError::RateLimit,
        "not_found_error" if err.message.contains("model") => LlmError::Api(format!(
            "{} Try /model to select a different model.",
            err.message
        )),
        "authentication_error" => {
            LlmError::Api(format!("{} Check your Anthropic API key.", err.message))
        }
        _ => LlmError::Api(err.message),
    }
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}

// ── Event stream ───────────────────────────────────────────────────────────────

/// Splits a server-sent event byte stream into `data` payloads.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feeds raw bytes; returns the data of every event they complete.
    fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, LlmError> {
        self.buffer
            .extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let block = String::from_utf8(block)
                .map_err(|e| LlmError::Stream(format!("invalid UTF-8 in event: {e}")))?;
            let data: Vec<&str> = block
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|d| d.strip_prefix(' ').unwrap_or(d))
                .collect();
            if !data.is_empty() {
                events.push(data.join("\n"));
            }
        }
        Ok(events)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum EventStep {
    Text(String),
    Stop,
}

fn parse_event(data: &str) -> Result<Option<EventStep>, LlmError> {
    let payload: StreamPayload = serde_json::from_str(data)
        .map_err(|e| LlmError::Stream(format!("malformed event: {e}")))?;
    match payload {
        StreamPayload::ContentBlockDelta {
            delta: BlockDelta::TextDelta { text },
        } if !text.is_empty() => Ok(Some(EventStep::Text(text))),
        StreamPayload::MessageStop => Ok(Some(EventStep::Stop)),
        StreamPayload::Error { error } => Err(classify_error(error)),
        _ => Ok(None),
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, LlmError>> + Send>>;

struct SseState {
    body: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<String>,
}

/// Turns the raw event stream into text fragments.
///
/// Ends at `message_stop`; a connection that closes before it is a
/// stream error.
fn text_deltas<S>(body: S) -> DeltaStream
where
    S: Stream<Item = Result<Vec<u8>, LlmError>> + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
    };

    Box::pin(stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        loop {
            if let Some(data) = state.pending.pop_front() {
                match parse_event(&data) {
                    Ok(Some(EventStep::Text(text))) => return Some((Ok(text), Some(state))),
                    Ok(Some(EventStep::Stop)) => return None,
                    Ok(None) => continue,
                    Err(err) => return Some((Err(err), None)),
                }
            }
            match state.body.next().await {
                Some(Ok(bytes)) => match state.decoder.push(&bytes) {
                    Ok(events) => state.pending.extend(events),
                    Err(err) => return Some((Err(err), None)),
                },
                Some(Err(err)) => return Some((Err(err), None)),
                None => {
                    let err = LlmError::Stream("connection closed before message_stop".into());
                    return Some((Err(err), None));
                }
            }
        }
    }))
}
