//! Drives one in-flight generation, one event at a time.

use std::sync::Arc;

use futures_util::{StreamExt, future, stream};
use proto::StreamEvent;
use tracing::debug;

use crate::llm::{ChatRequest, DeltaStream, LlmProvider};

/// Transient state of a generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    /// Text received so far.
    pub accumulated_text: String,
    /// `true` until the stream ends, fails, or is cancelled.
    pub in_flight: bool,
    /// Set once by [`StreamHandle::cancel`].
    pub cancel_requested: bool,
}

/// Exclusive owner of one open transport stream.
pub struct StreamHandle {
    model: String,
    state: StreamState,
    inner: Option<DeltaStream>,
}

impl StreamHandle {
    /// Issues `request` to `provider`.
    ///
    /// The request is sent on the first [`poll_next`](Self::poll_next); a
    /// rejection (auth failure, unknown model, network error) is reported
    /// as that poll's `Error` event.
    pub fn begin(provider: Arc<dyn LlmProvider>, request: ChatRequest) -> Self {
        let model = request.model.clone();
        let opened = async move { provider.stream_complete(request).await };
        let inner = stream::once(opened).flat_map(|opened| match opened {
            Ok(deltas) => deltas.left_stream(),
            Err(err) => stream::once(future::ready(Err(err))).right_stream(),
        });

        Self {
            model,
            state: StreamState {
                in_flight: true,
                ..StreamState::default()
            },
            inner: Some(Box::pin(inner)),
        }
    }

    /// Waits for the next unit of progress.
    ///
    /// Returns `None` once the stream has finished or was cancelled.
    /// Cancel-safe: dropping the returned future before it resolves loses
    /// no text.
    pub async fn poll_next(&mut self) -> Option<StreamEvent> {
        if self.state.cancel_requested || !self.state.in_flight {
            return None;
        }
        let inner = self.inner.as_mut()?;

        let event = match inner.next().await {
            Some(Ok(text)) => {
                self.state.accumulated_text.push_str(&text);
                StreamEvent::Delta(text)
            }
            Some(Err(err)) => StreamEvent::Error(err),
            None => StreamEvent::End,
        };

        if event.is_terminal() {
            debug!(model = %self.model, chars = %self.state.accumulated_text.len(), "Stream finished");
            self.state.in_flight = false;
            self.inner = None;
        }
        Some(event)
    }

    /// Stops the generation and releases the transport stream.
    ///
    /// Returns the partial text received before cancellation.
    pub fn cancel(&mut self) -> String {
        if self.state.in_flight {
            debug!(model = %self.model, "Stream cancelled");
        }
        self.state.cancel_requested = true;
        self.state.in_flight = false;
        self.inner = None;
        std::mem::take(&mut self.state.accumulated_text)
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn accumulated(&self) -> &str {
        &self.state.accumulated_text
    }

    /// Model the request was issued with.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Consumes the handle, yielding the accumulated text.
    pub fn into_text(self) -> String {
        self.state.accumulated_text
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("model", &self.model)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, ScriptedProvider};
    use proto::{ChatMessage, LlmError};

    fn request() -> ChatRequest {
        ChatRequest::new(
            "gpt-4o",
            vec![ChatMessage::system("sys"), ChatMessage::user("Hello")],
        )
    }

    #[tokio::test]
    async fn yields_deltas_then_end() {
        let provider = ScriptedProvider::new([Script::deltas(["Hi", " there", "!"])]);
        let mut handle = StreamHandle::begin(provider, request());
        assert!(handle.state().in_flight);

        assert_eq!(handle.poll_next().await, Some(StreamEvent::Delta("Hi".into())));
        assert_eq!(
            handle.poll_next().await,
            Some(StreamEvent::Delta(" there".into()))
        );
        assert_eq!(handle.poll_next().await, Some(StreamEvent::Delta("!".into())));
        assert_eq!(handle.poll_next().await, Some(StreamEvent::End));
        assert_eq!(handle.accumulated(), "Hi there!");
        assert!(!handle.state().in_flight);

        assert_eq!(handle.poll_next().await, None);
    }

    #[tokio::test]
    async fn rejected_request_surfaces_single_error() {
        let provider = ScriptedProvider::new([Script::Reject(LlmError::Api("bad key".into()))]);
        let mut handle = StreamHandle::begin(provider, request());

        assert_eq!(
            handle.poll_next().await,
            Some(StreamEvent::Error(LlmError::Api("bad key".into())))
        );
        assert!(!handle.state().in_flight);
        assert_eq!(handle.poll_next().await, None);
    }

    #[tokio::test]
    async fn mid_stream_error_is_terminal() {
        let provider = ScriptedProvider::new([Script::DeltasThenError(
            vec!["par".into()],
            LlmError::Stream("malformed chunk".into()),
        )]);
        let mut handle = StreamHandle::begin(provider, request());

        assert_eq!(handle.poll_next().await, Some(StreamEvent::Delta("par".into())));
        assert!(matches!(
            handle.poll_next().await,
            Some(StreamEvent::Error(LlmError::Stream(_)))
        ));
        assert_eq!(handle.poll_next().await, None);
    }

    #[tokio::test]
    async fn cancel_returns_partial_and_later_polls_are_noops() {
        let provider = ScriptedProvider::new([Script::hanging(["Once upon"])]);
        let mut handle = StreamHandle::begin(provider, request());
        assert_eq!(
            handle.poll_next().await,
            Some(StreamEvent::Delta("Once upon".into()))
        );

        let partial = handle.cancel();
        assert_eq!(partial, "Once upon");
        assert!(handle.state().cancel_requested);
        assert!(!handle.state().in_flight);
        assert_eq!(handle.poll_next().await, None);
    }

    #[tokio::test]
    async fn request_is_sent_with_snapshot_and_model() {
        let provider = ScriptedProvider::new([Script::deltas(["ok"])]);
        let mut handle = StreamHandle::begin(provider.clone(), request());
        while handle.poll_next().await.is_some() {}

        let sent = provider.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].model, "gpt-4o");
        assert_eq!(sent[0].messages[1], ChatMessage::user("Hello"));
    }
}
