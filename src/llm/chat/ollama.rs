use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use super::{ http_stream_generate, ChatClient, CompletionResponse, LineEvent, LlmError, PromptMessage, TokenStream };
use crate::llm::{ LlmConfig, LlmType };
use log::debug;

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
}

fn parse_ollama_line(line: &str) -> LineEvent {
    if line.trim().is_empty() {
        return LineEvent::Skip;
    }
    match serde_json::from_str::<ChatResponse>(line) {
        Ok(resp) => {
            let token = resp.message.map(|m| m.content).filter(|c| !c.is_empty());
            match (token, resp.done) {
                (Some(tok), _) => LineEvent::Token(tok),
                (None, true) => LineEvent::Done,
                (None, false) => LineEvent::Skip,
            }
        }
        Err(e) => {
            debug!("Ollama line parse error: {} for line: {}", e, line);
            LineEvent::Skip
        }
    }
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>) -> Self {
        let defaults = LlmConfig::default();
        Self {
            http: HttpClient::new(),
            base_url: base_url.unwrap_or_else(|| LlmType::Ollama.default_base_url().into()),
            completion_model: completion_model
                .unwrap_or_else(|| LlmType::Ollama.default_model().to_string()),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.llm_type != LlmType::Ollama {
            return Err("Invalid config type for OllamaClient".into());
        }

        let mut client = Self::new(config.base_url.clone(), config.completion_model.clone());
        client.temperature = config.temperature;
        client.max_tokens = config.max_tokens;
        Ok(client)
    }

    fn url(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }

    fn request(&self, messages: &[PromptMessage], stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.completion_model.clone(),
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream,
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        }
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<CompletionResponse, LlmError> {
        let req = self.request(messages, false);
        let resp = self.http.post(self.url()).json(&req).send().await?.error_for_status()?;
        let data = resp.json::<ChatResponse>().await?;
        Ok(CompletionResponse {
            response: data.message.map(|m| m.content).unwrap_or_default(),
        })
    }

    async fn stream_chat(&self, messages: &[PromptMessage]) -> Result<TokenStream, LlmError> {
        let req = self.request(messages, true);
        http_stream_generate(self.http.clone(), self.url(), req, parse_ollama_line, Vec::new()).await
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }
}
