use async_trait::async_trait;
use ::rllm::builder::{ LLMBackend, LLMBuilder };
use ::rllm::chat::{ ChatMessage, ChatRole, MessageType };

use super::{ ChatClient, CompletionResponse, LlmError, PromptMessage };
use crate::llm::{ LlmConfig, LlmType };
use crate::models::chat::Role;

/// Providers reached through `rllm`. No native streaming; the default
/// `stream_chat` yields the full completion as one chunk.
pub struct RllmChatClient {
    backend: LlmType,
    api_key: String,
    model: String,
    base_url: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

fn to_backend(llm_type: LlmType) -> Result<LLMBackend, LlmError> {
    match llm_type {
        LlmType::Anthropic => Ok(LLMBackend::Anthropic),
        LlmType::Gemini => Ok(LLMBackend::Google),
        other => Err(format!("{} is not served through rllm", other).into()),
    }
}

impl RllmChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        to_backend(config.llm_type)?;
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| format!("{} API key is required", config.llm_type))?;

        Ok(Self {
            backend: config.llm_type,
            api_key,
            model: config.model(),
            base_url: config.base_url.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ChatClient for RllmChatClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<CompletionResponse, LlmError> {
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut builder = LLMBuilder::new()
            .backend(to_backend(self.backend)?)
            .api_key(self.api_key.clone())
            .model(&self.model)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens);
        if !system.is_empty() {
            builder = builder.system(system);
        }
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url.clone());
        }
        let provider = builder.build()?;

        let chat: Vec<ChatMessage> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ChatMessage {
                role: if m.role == Role::User { ChatRole::User } else { ChatRole::Assistant },
                content: m.content.clone(),
                message_type: MessageType::Text,
            })
            .collect();

        let resp = provider.chat(&chat).await.map_err(|e| Box::new(e) as LlmError)?;
        let text = resp
            .text()
            .map(|s| s.to_string())
            .unwrap_or_else(|| resp.to_string());
        Ok(CompletionResponse { response: text })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
