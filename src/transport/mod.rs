use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::debug;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use crate::conversation::StreamUpdate;
use crate::llm::chat::{ ChatClient, PromptMessage };
use crate::models::chat::{ Message, Role };

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("chat request failed: {0}")]
    Request(String),
    #[error("chat stream interrupted: {0}")]
    Stream(String),
}

pub type UpdateStream = Pin<Box<dyn Stream<Item = Result<StreamUpdate, TransportError>> + Send>>;

/// One user turn plus the conversation that preceded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub text: String,
    pub history: Vec<Message>,
}

/// Remote completion endpoint. Dropping the returned stream abandons the
/// generation.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: ChatRequest) -> Result<UpdateStream, TransportError>;
}

/// Sends turns to a hosted model behind a fixed system prompt.
pub struct LlmTransport {
    client: Arc<dyn ChatClient>,
    system_prompt: String,
}

impl LlmTransport {
    pub fn new(client: Arc<dyn ChatClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
        }
    }
}

/// Flattens a request into provider turns. Assistant messages before the
/// first user turn (the greeting) are presentation only and are dropped.
pub fn build_prompt(system_prompt: &str, request: &ChatRequest) -> Vec<PromptMessage> {
    let mut prompt = vec![PromptMessage::new(Role::System, system_prompt)];
    let turns = request.history
        .iter()
        .skip_while(|m| m.role != Role::User)
        .filter(|m| m.role != Role::System)
        .map(|m| PromptMessage::new(m.role, m.text()))
        .filter(|m| !m.content.trim().is_empty());
    prompt.extend(turns);
    prompt.push(PromptMessage::new(Role::User, request.text.clone()));
    prompt
}

#[async_trait]
impl ChatTransport for LlmTransport {
    async fn send(&self, request: ChatRequest) -> Result<UpdateStream, TransportError> {
        let prompt = build_prompt(&self.system_prompt, &request);
        debug!("Sending {} prompt messages to model {}", prompt.len(), self.client.get_model());

        let tokens = self.client
            .stream_chat(&prompt).await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let updates = tokens.map(|item| {
            item.map(StreamUpdate::TextDelta).map_err(|e| TransportError::Stream(e.to_string()))
        });
        Ok(Box::pin(updates))
    }
}
