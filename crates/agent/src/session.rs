//! Chat session controller: history, active model, and the single
//! in-flight generation.

use std::sync::Arc;

use proto::{ChatMessage, LlmError, Role, SelectableModel, SessionError, SessionId, StreamEvent};
use tracing::{debug, info};

use crate::conversation::Conversation;
use crate::llm::{ChatRequest, LlmProvider};
use crate::stream::StreamHandle;

/// Progress of the current turn as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// A fragment arrived; the full partial reply is in
    /// [`ChatSession::streaming_text`].
    Delta(String),
    /// The reply finished and was appended to the conversation.
    Completed(String),
    /// The turn failed; the conversation is as it was before the turn.
    Failed(LlmError),
}

/// One running chat session.
///
/// All state changes happen through `&mut self`, so the owner decides when
/// each event is applied.
pub struct ChatSession {
    id: SessionId,
    provider: Arc<dyn LlmProvider>,
    model: String,
    system_prompt: String,
    conversation: Conversation,
    active: Option<StreamHandle>,
}

impl ChatSession {
    /// Creates a session with an empty conversation.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            id: SessionId::new(),
            provider,
            model: model.into(),
            conversation: Conversation::new(system_prompt.clone()),
            system_prompt,
            active: None,
        }
    }

    /// Sends `text` as the next user turn and starts streaming the reply.
    ///
    /// Rejected while another reply is streaming; the in-flight stream is
    /// left untouched.
    pub fn begin_turn(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        if self.is_streaming() {
            return Err(SessionError::StreamInFlight);
        }
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        self.conversation.append(Role::User, text);
        let request = ChatRequest::new(self.model.clone(), self.conversation.snapshot());
        debug!(
            session = %self.id,
            model = %self.model,
            messages = %request.messages.len(),
            "Turn started"
        );
        self.active = Some(StreamHandle::begin(Arc::clone(&self.provider), request));
        Ok(())
    }

    /// Waits for the next event of the in-flight turn.
    ///
    /// Returns `None` when nothing is streaming. Cancel-safe.
    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        let handle = self.active.as_mut()?;
        let event = handle.poll_next().await?;

        match event {
            StreamEvent::Delta(text) => Some(TurnEvent::Delta(text)),
            StreamEvent::End => {
                let text = self.active.take().map(StreamHandle::into_text)?;
                self.conversation.append(Role::Assistant, text.clone());
                debug!(session = %self.id, chars = %text.len(), "Turn completed");
                Some(TurnEvent::Completed(text))
            }
            StreamEvent::Error(err) => {
                self.active = None;
                self.conversation.retract_unanswered();
                info!(session = %self.id, error = %err, "Turn failed");
                Some(TurnEvent::Failed(err))
            }
        }
    }

    /// Cancels the in-flight turn, returning the partial reply.
    ///
    /// Nothing from the cancelled turn stays in the conversation.
    pub fn cancel(&mut self) -> Option<String> {
        let mut handle = self.active.take()?;
        let partial = handle.cancel();
        self.conversation.retract_unanswered();
        info!(session = %self.id, partial_chars = %partial.len(), "Turn cancelled");
        Some(partial)
    }

    /// Drops the history, keeping only the configured system prompt.
    pub fn clear(&mut self) {
        self.cancel();
        self.conversation.reset(self.system_prompt.clone());
        debug!(session = %self.id, "Conversation cleared");
    }

    /// Switches the model used by subsequent turns.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
        info!(session = %self.id, model = %self.model, "Model switched");
    }

    pub fn is_streaming(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|handle| handle.state().in_flight)
    }

    /// Partial reply of the in-flight turn.
    pub fn streaming_text(&self) -> Option<&str> {
        self.active.as_ref().map(StreamHandle::accumulated)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Copy of the history as it would be sent next.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.conversation.snapshot()
    }

    /// Models the transport can serve.
    ///
    /// The future holds its own provider handle, so the caller can spawn it
    /// while the session keeps streaming.
    pub fn list_models(
        &self,
    ) -> impl Future<Output = Result<Vec<SelectableModel>, LlmError>> + Send + use<> {
        let provider = Arc::clone(&self.provider);
        async move { provider.list_models().await }
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("messages", &self.conversation.len())
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
