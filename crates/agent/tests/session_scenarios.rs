use std::sync::Arc;

use agent::{ChatRequest, ChatSession, DeltaStream, LlmProvider, TurnEvent};
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use parking_lot::Mutex;
use proto::{ChatMessage, LlmError, Role, SelectableModel, SessionError};

/// Replies to every request with the same fragments, recording requests.
struct EchoProvider {
    reply: Vec<&'static str>,
    fail_after: Option<LlmError>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl EchoProvider {
    fn new(reply: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            fail_after: None,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing(reply: Vec<&'static str>, err: LlmError) -> Arc<Self> {
        Arc::new(Self {
            reply,
            fail_after: Some(err),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<ChatRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for EchoProvider {
    async fn list_models(&self) -> Result<Vec<SelectableModel>, LlmError> {
        Ok(vec![SelectableModel::new("gpt-4", "test")])
    }

    async fn complete(&self, req: ChatRequest) -> Result<String, LlmError> {
        self.seen.lock().push(req);
        Ok(self.reply.concat())
    }

    async fn stream_complete(&self, req: ChatRequest) -> Result<DeltaStream, LlmError> {
        self.seen.lock().push(req);
        let parts: Vec<Result<String, LlmError>> =
            self.reply.iter().map(|p| Ok(p.to_string())).collect();
        let tail: Vec<Result<String, LlmError>> = self.fail_after.clone().map(Err).into_iter().collect();
        Ok(stream::iter(parts).chain(stream::iter(tail)).boxed())
    }
}

async fn run_turn(session: &mut ChatSession, text: &str) -> Vec<TurnEvent> {
    session.begin_turn(text).expect("turn starts");
    let mut events = Vec::new();
    while let Some(event) = session.next_event().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn hello_turn_produces_hi_there() {
    let provider = EchoProvider::new(vec!["Hi", " there", "!"]);
    let mut session = ChatSession::new(provider.clone(), "gpt-4o", "you're a helpful assistant");

    let events = run_turn(&mut session, "Hello").await;

    let deltas: Vec<&TurnEvent> = events
        .iter()
        .filter(|e| matches!(e, TurnEvent::Delta(_)))
        .collect();
    assert_eq!(deltas.len(), 3);
    assert_eq!(events.last(), Some(&TurnEvent::Completed("Hi there!".into())));

    let sent = provider.seen();
    assert_eq!(
        sent[0].messages,
        vec![
            ChatMessage::system("you're a helpful assistant"),
            ChatMessage::user("Hello"),
        ]
    );
    assert_eq!(
        session.conversation().last(),
        Some(&ChatMessage::assistant("Hi there!"))
    );
}

#[tokio::test]
async fn stream_error_keeps_history_and_allows_retry() {
    let provider = EchoProvider::failing(vec!["Hi"], LlmError::Stream("connection reset".into()));
    let mut session = ChatSession::new(provider, "gpt-4o", "sys");

    let events = run_turn(&mut session, "Hello").await;
    assert!(matches!(events.last(), Some(TurnEvent::Failed(_))));
    assert!(!session.is_streaming());
    assert_eq!(session.conversation().len(), 1);

    // The user can resubmit right away.
    assert!(session.begin_turn("Hello again").is_ok());
}

#[tokio::test]
async fn only_one_stream_in_flight() {
    let provider = EchoProvider::new(vec!["a", "b", "c"]);
    let mut session = ChatSession::new(provider.clone(), "gpt-4o", "sys");

    session.begin_turn("first").expect("first turn");
    let _ = session.next_event().await;
    assert_eq!(
        session.begin_turn("second"),
        Err(SessionError::StreamInFlight)
    );
    assert_eq!(provider.seen().len(), 1);
}

#[tokio::test]
async fn alternation_holds_across_turns_and_clear() {
    let provider = EchoProvider::new(vec!["ok"]);
    let mut session = ChatSession::new(provider, "gpt-4o", "sys");

    run_turn(&mut session, "one").await;
    run_turn(&mut session, "two").await;
    let roles: Vec<Role> = session.conversation().messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
    );

    session.clear();
    assert_eq!(session.snapshot(), vec![ChatMessage::system("sys")]);
}

#[tokio::test]
async fn list_models_goes_through_provider() {
    let provider = EchoProvider::new(vec![]);
    let session = ChatSession::new(provider, "gpt-4o", "sys");
    let models = session.list_models().await.expect("models");
    assert_eq!(models[0].id, "gpt-4");
}
