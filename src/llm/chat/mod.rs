pub mod ollama;
pub mod openai;
pub mod rllm_backend;

use async_trait::async_trait;
use futures::{ Future, Stream, StreamExt };
use serde::Deserialize;
use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use self::rllm_backend::RllmChatClient;
use crate::models::chat::Role;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub type LlmError = Box<dyn StdError + Send + Sync>;
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

/// Flattened turn sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<CompletionResponse, LlmError>;

    /// Streams text deltas. Providers without native streaming deliver the
    /// whole completion as a single chunk.
    async fn stream_chat(&self, messages: &[PromptMessage]) -> Result<TokenStream, LlmError> {
        let response = self.complete(messages).await;
        full_response_as_stream(move || async move { response.map(|r| r.response) })
    }

    fn get_model(&self) -> String;
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> Result<TokenStream, LlmError>
where
    F: FnOnce(mpsc::Sender<Result<String, LlmError>>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

pub fn full_response_as_stream<F, Fut>(response_fn: F) -> Result<TokenStream, LlmError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<String, LlmError>> + Send + 'static,
{
    create_streaming_response(move |tx| async move {
        let _ = tx.send(response_fn().await).await;
    })
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Ollama => Arc::new(OllamaClient::from_config(config)?),
        LlmType::OpenAI | LlmType::DeepSeek | LlmType::XAI | LlmType::Groq => {
            Arc::new(OpenAIChatClient::from_config(config)?)
        }
        LlmType::Anthropic | LlmType::Gemini => Arc::new(RllmChatClient::from_config(config)?),
    };
    Ok(client)
}

/// Outcome of parsing one line of a streamed response body.
#[derive(Debug, PartialEq, Eq)]
pub enum LineEvent {
    Token(String),
    Done,
    Skip,
}

/// POSTs `payload` and feeds each complete body line to `line_parser`.
/// Lines split across network chunks are reassembled before parsing.
pub async fn http_stream_generate(
    http: reqwest::Client,
    url: String,
    payload: impl serde::Serialize + Send + 'static,
    line_parser: fn(&str) -> LineEvent,
    headers: Vec<(String, String)>
) -> Result<TokenStream, LlmError> {
    create_streaming_response(move |tx| async move {
        let mut req = http.post(&url).json(&payload);
        for (name, value) in headers {
            req = req.header(name, value);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                let _ = tx.send(Err(Box::new(e) as _)).await;
                return;
            }
        };
        if let Err(e) = resp.error_for_status_ref() {
            let _ = tx.send(Err(Box::new(e) as _)).await;
            return;
        }

        let mut bytes = resp.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        while let Some(chunk) = bytes.next().await {
            let buf = match chunk {
                Ok(buf) => buf,
                Err(e) => {
                    let _ = tx.send(Err(Box::new(e) as _)).await;
                    return;
                }
            };
            pending.extend_from_slice(&buf);
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                match line_parser(line.trim_end()) {
                    LineEvent::Token(tok) => {
                        if tx.send(Ok(tok)).await.is_err() {
                            return;
                        }
                    }
                    LineEvent::Done => {
                        return;
                    }
                    LineEvent::Skip => {}
                }
            }
        }
        if !pending.is_empty() {
            if let LineEvent::Token(tok) = line_parser(String::from_utf8_lossy(&pending).trim_end()) {
                let _ = tx.send(Ok(tok)).await;
            }
        }
    })
}
