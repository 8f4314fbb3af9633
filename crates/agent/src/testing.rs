//! Scripted in-memory provider for driving sessions in tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use parking_lot::Mutex;
use proto::{LlmError, SelectableModel};

use crate::llm::{ChatRequest, DeltaStream, LlmProvider};

/// How the provider answers one request.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these fragments, then end.
    Deltas(Vec<String>),
    /// Stream these fragments, then fail.
    DeltasThenError(Vec<String>, LlmError),
    /// Stream these fragments, then never finish.
    Hanging(Vec<String>),
    /// Reject the request outright.
    Reject(LlmError),
}

impl Script {
    pub fn deltas<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Script::Deltas(parts.into_iter().map(Into::into).collect())
    }

    pub fn hanging<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Script::Hanging(parts.into_iter().map(Into::into).collect())
    }
}

/// Provider answering requests from a queue of [`Script`]s.
///
/// Requests beyond the end of the queue are rejected.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    models: Mutex<Result<Vec<SelectableModel>, LlmError>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            models: Mutex::new(Ok(Vec::new())),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Sets the answer to `list_models`.
    pub fn set_models(&self, models: Result<Vec<SelectableModel>, LlmError>) {
        *self.models.lock() = models;
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    fn next_script(&self, req: ChatRequest) -> Script {
        self.requests.lock().push(req);
        self.scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Script::Reject(LlmError::Api("no scripted reply".into())))
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn list_models(&self) -> Result<Vec<SelectableModel>, LlmError> {
        self.models.lock().clone()
    }

    async fn complete(&self, req: ChatRequest) -> Result<String, LlmError> {
        match self.next_script(req) {
            Script::Deltas(parts) | Script::Hanging(parts) => Ok(parts.concat()),
            Script::DeltasThenError(_, err) | Script::Reject(err) => Err(err),
        }
    }

    async fn stream_complete(&self, req: ChatRequest) -> Result<DeltaStream, LlmError> {
        let parts =
            |parts: Vec<String>| stream::iter(parts.into_iter().map(Ok::<String, LlmError>));
        match self.next_script(req) {
            Script::Deltas(p) => Ok(parts(p).boxed()),
            Script::DeltasThenError(p, err) => {
                Ok(parts(p).chain(stream::once(async move { Err(err) })).boxed())
            }
            Script::Hanging(p) => Ok(parts(p).chain(stream::pending()).boxed()),
            Script::Reject(err) => Err(err),
        }
    }
}
