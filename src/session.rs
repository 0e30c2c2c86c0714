use futures::StreamExt;
use log::{ debug, error, info, warn };
use std::sync::{ Arc, Mutex };
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{ mpsc, watch };
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::conversation::{ Conversation, StreamUpdate, ValidationError };
use crate::models::chat::ChatStatus;
use crate::transport::{ ChatRequest, ChatTransport, TransportError };

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a reply is still being generated (status: {0})")]
    Busy(ChatStatus),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The stream ran to completion. `reply_id` is `None` when it was empty.
    Completed {
        reply_id: Option<String>,
    },
    /// Cancelled through a `StopHandle`; streamed content is kept.
    Stopped {
        reply_id: Option<String>,
    },
}

/// Notifications for a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Status(ChatStatus),
    Delta {
        reply_id: String,
        update: StreamUpdate,
    },
    Finished(SubmitOutcome),
}

/// Cancels the generation currently in flight. Cloneable so it can be
/// triggered from another task (e.g. a Ctrl-C handler).
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    current: Arc<Mutex<CancellationToken>>,
}

impl StopHandle {
    pub fn stop(&self) {
        if let Ok(token) = self.current.lock() {
            token.cancel();
        }
    }

    fn arm(&self) -> CancellationToken {
        let fresh = CancellationToken::new();
        if let Ok(mut token) = self.current.lock() {
            *token = fresh.clone();
        }
        fresh
    }
}

enum Step {
    Cancelled,
    Next(Option<Result<StreamUpdate, TransportError>>),
}

/// Held for the length of one exchange. If `submit` is dropped before it
/// settles, the status goes back to `Ready` so the session accepts input.
struct InFlight {
    status: Arc<watch::Sender<ChatStatus>>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    settled: bool,
}

impl InFlight {
    fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!("Chat exchange abandoned before it finished, status reset to {}", ChatStatus::Ready);
        self.status.send_replace(ChatStatus::Ready);
        if let Some(tx) = &self.events {
            let _ = tx.send(SessionEvent::Status(ChatStatus::Ready));
        }
    }
}

/// Couples a conversation with a transport: validates input, tracks the
/// exchange status, applies streamed updates and times each reply.
pub struct ChatSession {
    conversation: Conversation,
    transport: Arc<dyn ChatTransport>,
    status: Arc<watch::Sender<ChatStatus>>,
    stop: StopHandle,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl ChatSession {
    pub fn new(conversation: Conversation, transport: Arc<dyn ChatTransport>) -> Self {
        let (status, _) = watch::channel(ChatStatus::Ready);
        Self {
            conversation,
            transport,
            status: Arc::new(status),
            stop: StopHandle::default(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn initialize(&mut self) {
        self.conversation.initialize().await;
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn status(&self) -> ChatStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ChatStatus> {
        self.status.subscribe()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub async fn clear(&mut self) {
        self.conversation.clear().await;
    }

    /// Sends one user turn and drives its reply to completion, cancellation
    /// or failure. The user message is kept in every case.
    pub async fn submit(&mut self, text: &str) -> Result<SubmitOutcome, SessionError> {
        let status = self.status();
        if !status.accepts_input() {
            return Err(SessionError::Busy(status));
        }

        let history = self.conversation.messages().to_vec();
        self.conversation.push_user(text).await?;

        let token = self.stop.arm();
        let started = Instant::now();
        let mut in_flight = InFlight {
            status: Arc::clone(&self.status),
            events: self.events.clone(),
            settled: false,
        };
        self.set_status(ChatStatus::Submitted);

        let transport = Arc::clone(&self.transport);
        let request = ChatRequest { text: text.to_string(), history };
        let sent = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            sent = transport.send(request) => Some(sent),
        };
        let mut stream = match sent {
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                error!("Chat request failed: {}", e);
                self.set_status(ChatStatus::Error);
                in_flight.settle();
                return Err(e.into());
            }
            None => {
                in_flight.settle();
                return Ok(self.finish(SubmitOutcome::Stopped { reply_id: None }));
            }
        };

        let reply_id = Uuid::new_v4().to_string();
        let mut received = false;
        let stopped = loop {
            let step = tokio::select! {
                biased;
                _ = token.cancelled() => Step::Cancelled,
                next = stream.next() => Step::Next(next),
            };
            match step {
                Step::Cancelled => {
                    break true;
                }
                Step::Next(Some(Ok(update))) => {
                    if !received {
                        received = true;
                        self.set_status(ChatStatus::Streaming);
                    }
                    if let Err(e) = self.conversation.on_stream_update(&reply_id, update.clone()).await {
                        warn!("Dropped stream update: {}", e);
                        continue;
                    }
                    self.emit(SessionEvent::Delta { reply_id: reply_id.clone(), update });
                }
                Step::Next(Some(Err(e))) => {
                    error!("Chat stream failed: {}", e);
                    if received {
                        self.record_elapsed(&reply_id, started).await;
                    }
                    self.set_status(ChatStatus::Error);
                    in_flight.settle();
                    return Err(e.into());
                }
                Step::Next(None) => {
                    break false;
                }
            }
        };
        drop(stream);

        let reply_id = if received {
            self.record_elapsed(&reply_id, started).await;
            Some(reply_id)
        } else {
            None
        };
        let outcome = if stopped {
            info!("Generation stopped after {} ms", started.elapsed().as_millis());
            self.finish(SubmitOutcome::Stopped { reply_id })
        } else {
            self.finish(SubmitOutcome::Completed { reply_id })
        };
        in_flight.settle();
        Ok(outcome)
    }

    async fn record_elapsed(&mut self, reply_id: &str, started: Instant) {
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if let Err(e) = self.conversation.record_duration(reply_id, elapsed).await {
            warn!("Could not record reply duration: {}", e);
        }
    }

    fn finish(&self, outcome: SubmitOutcome) -> SubmitOutcome {
        self.set_status(ChatStatus::Ready);
        self.emit(SessionEvent::Finished(outcome.clone()));
        outcome
    }

    fn set_status(&self, status: ChatStatus) {
        debug!("Chat status -> {}", status);
        self.status.send_replace(status);
        self.emit(SessionEvent::Status(status));
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ HistoryStore, MemoryHistoryStore };
    use crate::models::chat::Role;
    use crate::transport::UpdateStream;
    use async_trait::async_trait;
    use futures::stream;
    use std::time::Duration;

    /// Replays a fixed script and records what it was asked to send.
    struct ScriptedTransport {
        script: Vec<Result<StreamUpdate, TransportError>>,
        fail_request: bool,
        sent: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn replying(chunks: &[&str]) -> Self {
            Self {
                script: chunks.iter().map(|c| Ok(StreamUpdate::TextDelta(c.to_string()))).collect(),
                fail_request: false,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, request: ChatRequest) -> Result<UpdateStream, TransportError> {
            self.sent.lock().unwrap().push(request);
            if self.fail_request {
                return Err(TransportError::Request("503 Service Unavailable".into()));
            }
            Ok(Box::pin(stream::iter(self.script.clone())))
        }
    }

    /// Emits one chunk, then never finishes.
    struct HangingTransport;

    #[async_trait]
    impl ChatTransport for HangingTransport {
        async fn send(&self, _request: ChatRequest) -> Result<UpdateStream, TransportError> {
            let first = stream::iter(vec![Ok(StreamUpdate::TextDelta("Partial".into()))]);
            Ok(Box::pin(first.chain(stream::pending())))
        }
    }

    async fn session(transport: Arc<dyn ChatTransport>) -> (Arc<MemoryHistoryStore>, ChatSession) {
        let store = Arc::new(MemoryHistoryStore::new("chat-messages"));
        let conversation = Conversation::new(store.clone(), "Namaste!");
        let mut session = ChatSession::new(conversation, transport);
        session.initialize().await;
        (store, session)
    }

    #[tokio::test]
    async fn completed_reply_is_streamed_persisted_and_timed() {
        let transport = Arc::new(ScriptedTransport::replying(&["Yes, ", "if you are under 10 years old."]));
        let (store, mut session) = session(transport.clone()).await;

        let outcome = session.submit("Am I eligible for DPIIT?").await.unwrap();
        let reply_id = match outcome {
            SubmitOutcome::Completed { reply_id: Some(id) } => id,
            other => panic!("unexpected outcome {:?}", other),
        };

        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].text(), "Yes, if you are under 10 years old.");
        assert_eq!(session.status(), ChatStatus::Ready);
        assert!(session.conversation().duration_of(&reply_id).is_some());
        assert_eq!(store.load().await, session.conversation().snapshot());

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "Am I eligible for DPIIT?");
        assert_eq!(sent[0].history.len(), 1);
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_transport() {
        let transport = Arc::new(ScriptedTransport::replying(&["unused"]));
        let (_store, mut session) = session(transport.clone()).await;

        assert!(matches!(session.submit("").await, Err(SessionError::Validation(_))));
        assert!(matches!(
            session.submit(&"a".repeat(2001)).await,
            Err(SessionError::Validation(ValidationError::TooLong { .. }))
        ));
        assert!(session.submit(&"a".repeat(2000)).await.is_ok());
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn request_failure_sets_error_and_keeps_user_turn() {
        let transport = Arc::new(ScriptedTransport {
            script: Vec::new(),
            fail_request: true,
            sent: Mutex::new(Vec::new()),
        });
        let (_store, mut session) = session(transport).await;

        let err = session.submit("Explain SISFS funding").await.unwrap_err();
        assert!(matches!(err, SessionError::Transport(TransportError::Request(_))));
        assert_eq!(session.status(), ChatStatus::Error);

        let last = session.conversation().messages().last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.text(), "Explain SISFS funding");
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_partial_reply() {
        let transport = Arc::new(ScriptedTransport {
            script: vec![
                Ok(StreamUpdate::TextDelta("Partial".into())),
                Err(TransportError::Stream("connection reset".into()))
            ],
            fail_request: false,
            sent: Mutex::new(Vec::new()),
        });
        let (store, mut session) = session(transport).await;

        assert!(session.submit("hi").await.is_err());
        assert_eq!(session.status(), ChatStatus::Error);
        let partial = session.conversation().messages().last().unwrap().clone();
        assert_eq!(partial.role, Role::Assistant);
        assert_eq!(partial.text(), "Partial");
        assert!(session.conversation().duration_of(&partial.id).is_some());
        assert_eq!(store.load().await, session.conversation().snapshot());

        // resubmission is allowed from the error state
        assert!(matches!(session.submit("hi again").await, Err(SessionError::Transport(_))));
    }

    #[tokio::test]
    async fn stop_keeps_partial_content() {
        let (store, mut session) = session(Arc::new(HangingTransport)).await;
        let stop = session.stop_handle();
        let mut status = session.subscribe_status();

        let stopper = tokio::spawn(async move {
            status.wait_for(|s| *s == ChatStatus::Streaming).await.unwrap();
            stop.stop();
        });

        let outcome = session.submit("Compare BIRAC vs PRAYAS").await.unwrap();
        stopper.await.unwrap();

        let reply_id = match outcome {
            SubmitOutcome::Stopped { reply_id: Some(id) } => id,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(session.status(), ChatStatus::Ready);
        assert_eq!(session.conversation().messages().last().unwrap().text(), "Partial");
        assert!(session.conversation().duration_of(&reply_id).is_some());
        assert_eq!(store.load().await, session.conversation().snapshot());
    }

    #[tokio::test]
    async fn abandoned_submit_returns_to_ready() {
        let (store, mut session) = session(Arc::new(HangingTransport)).await;
        let mut status = session.subscribe_status();

        let first = tokio::time::timeout(Duration::from_millis(50), session.submit("first")).await;
        assert!(first.is_err());
        assert_eq!(session.status(), ChatStatus::Ready);
        assert_eq!(*status.borrow_and_update(), ChatStatus::Ready);

        // streamed content written before the drop stays persisted
        assert_eq!(session.conversation().messages().last().unwrap().text(), "Partial");
        assert_eq!(store.load().await, session.conversation().snapshot());

        // the next turn is accepted instead of reported busy
        let second = tokio::time::timeout(Duration::from_millis(50), session.submit("second")).await;
        assert!(second.is_err());
        assert_eq!(session.status(), ChatStatus::Ready);
        assert_eq!(session.conversation().messages().len(), 5);
    }

    #[tokio::test]
    async fn events_trace_the_status_lifecycle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let store = Arc::new(MemoryHistoryStore::new("chat-messages"));
        let transport = Arc::new(ScriptedTransport::replying(&["ok"]));
        let mut session = ChatSession::new(Conversation::new(store, "Namaste!"), transport).with_events(tx);
        session.initialize().await;

        session.submit("hi").await.unwrap();
        drop(session);

        let mut statuses = Vec::new();
        while let Some(event) = rx.recv().await {
            if let SessionEvent::Status(s) = event {
                statuses.push(s);
            }
        }
        assert_eq!(statuses, vec![ChatStatus::Submitted, ChatStatus::Streaming, ChatStatus::Ready]);
    }
}
