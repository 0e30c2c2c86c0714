pub mod welcome;

use log::{ debug, info };
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::history::HistoryStore;
use crate::models::chat::{
    DurationMap,
    Message,
    MessagePart,
    PartKind,
    PersistedRecord,
    Role,
};
use self::welcome::WelcomeInjector;

/// Longest accepted user message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message is empty")]
    Empty,
    #[error("message is {len} characters, the limit is {max}")]
    TooLong {
        len: usize,
        max: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no assistant message with id '{0}'")]
    UnknownMessage(String),
    #[error("message id '{0}' is already taken")]
    DuplicateId(String),
}

pub fn validate_input(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = text.chars().count();
    if len > MAX_MESSAGE_CHARS {
        return Err(ValidationError::TooLong { len, max: MAX_MESSAGE_CHARS });
    }
    Ok(())
}

/// Incremental assistant content delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    TextDelta(String),
    ReasoningDelta(String),
}

impl StreamUpdate {
    fn kind(&self) -> PartKind {
        match self {
            StreamUpdate::TextDelta(_) => PartKind::Text,
            StreamUpdate::ReasoningDelta(_) => PartKind::Reasoning,
        }
    }

    fn delta(&self) -> &str {
        match self {
            StreamUpdate::TextDelta(s) | StreamUpdate::ReasoningDelta(s) => s,
        }
    }

    fn into_part(self) -> MessagePart {
        match self {
            StreamUpdate::TextDelta(text) => MessagePart::Text { text },
            StreamUpdate::ReasoningDelta(text) => MessagePart::Reasoning { text },
        }
    }
}

/// Authoritative in-memory conversation, written through to its store
/// after every mutation.
pub struct Conversation {
    store: Arc<dyn HistoryStore>,
    messages: Vec<Message>,
    durations: DurationMap,
    welcome: WelcomeInjector,
    loaded: bool,
}

impl Conversation {
    pub fn new(store: Arc<dyn HistoryStore>, welcome_text: impl Into<String>) -> Self {
        Self {
            store,
            messages: Vec::new(),
            durations: DurationMap::new(),
            welcome: WelcomeInjector::new(welcome_text),
            loaded: false,
        }
    }

    /// Seeds state from the store (first call only), then greets an empty
    /// conversation. Safe to call repeatedly.
    pub async fn initialize(&mut self) {
        if !self.loaded {
            let record = self.store.load().await;
            info!(
                "Loaded conversation '{}' ({} messages, {} durations)",
                self.store.key(),
                record.messages.len(),
                record.durations.len()
            );
            self.messages = record.messages;
            self.durations = record.durations;
            self.loaded = true;
        }

        if let Some(greeting) = self.welcome.inject(&self.messages) {
            debug!("Injecting welcome message {}", greeting.id);
            self.messages.push(greeting);
            self.persist().await;
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn durations(&self) -> &DurationMap {
        &self.durations
    }

    pub fn duration_of(&self, message_id: &str) -> Option<u64> {
        self.durations.get(message_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True while nothing beyond the greeting has been said.
    pub fn shows_intro(&self) -> bool {
        self.messages.len() <= 1
    }

    pub fn snapshot(&self) -> PersistedRecord {
        PersistedRecord::new(self.messages.clone(), self.durations.clone())
    }

    /// Validates and appends a user turn. Nothing changes on rejection.
    pub async fn push_user(&mut self, text: &str) -> Result<Message, ValidationError> {
        validate_input(text)?;
        let message = Message::new(
            Uuid::new_v4().to_string(),
            Role::User,
            vec![MessagePart::text(text)]
        );
        self.messages.push(message.clone());
        self.persist().await;
        Ok(message)
    }

    /// Merges a streamed fragment into assistant message `message_id`,
    /// opening the message if it is not the latest one. An id held by any
    /// other message is refused.
    pub async fn on_stream_update(
        &mut self,
        message_id: &str,
        update: StreamUpdate
    ) -> Result<(), ConversationError> {
        let in_progress = self.messages
            .last_mut()
            .filter(|m| m.role == Role::Assistant && m.id == message_id);

        match in_progress {
            Some(message) => {
                match message.parts.last_mut() {
                    Some(part) if part.kind() == update.kind() => part.push_str(update.delta()),
                    _ => message.parts.push(update.into_part()),
                }
            }
            None => {
                if self.messages.iter().any(|m| m.id == message_id) {
                    return Err(ConversationError::DuplicateId(message_id.to_string()));
                }
                self.messages.push(
                    Message::new(message_id, Role::Assistant, vec![update.into_part()])
                );
            }
        }
        self.persist().await;
        Ok(())
    }

    pub async fn record_duration(
        &mut self,
        message_id: &str,
        elapsed_ms: u64
    ) -> Result<(), ConversationError> {
        let known = self.messages
            .iter()
            .any(|m| m.role == Role::Assistant && m.id == message_id);
        if !known {
            return Err(ConversationError::UnknownMessage(message_id.to_string()));
        }
        self.durations.insert(message_id.to_string(), elapsed_ms);
        self.persist().await;
        Ok(())
    }

    pub async fn clear(&mut self) {
        self.messages.clear();
        self.durations.clear();
        self.store.clear().await;
        self.welcome.reset();
        info!("Cleared conversation '{}'", self.store.key());
    }

    async fn persist(&self) {
        self.store.save(&self.snapshot()).await;
    }
}
