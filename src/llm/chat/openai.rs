use async_trait::async_trait;
use log::debug;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ http_stream_generate, ChatClient, CompletionResponse, LineEvent, LlmError, PromptMessage, TokenStream };
use crate::llm::LlmConfig;

/// Client for the OpenAI chat-completions wire format. Groq, xAI and
/// DeepSeek expose the same endpoint under their own base URLs.
pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

fn parse_sse_line(line: &str) -> LineEvent {
    let data = match line.strip_prefix("data:") {
        Some(data) => data.trim(),
        None => {
            return LineEvent::Skip;
        }
    };
    if data == "[DONE]" {
        return LineEvent::Done;
    }
    match serde_json::from_str::<OpenAIStreamResponse>(data) {
        Ok(resp) => {
            let mut token = String::new();
            let mut finished = false;
            for choice in resp.choices {
                if let Some(content) = choice.delta.content {
                    token.push_str(&content);
                }
                if choice.finish_reason.as_deref() == Some("stop") {
                    finished = true;
                }
            }
            if !token.is_empty() {
                LineEvent::Token(token)
            } else if finished {
                LineEvent::Done
            } else {
                LineEvent::Skip
            }
        }
        Err(e) => {
            debug!("SSE parse error: {} for data: {}", e, data);
            LineEvent::Skip
        }
    }
}

fn completions_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{}/v1/chat/completions", base)
    }
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        temperature: f32,
        max_tokens: u32
    ) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| format!("Invalid API key format: {}", e))?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as LlmError)?;

        Ok(Self {
            http,
            model,
            base_url: completions_url(&base_url),
            temperature,
            max_tokens,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| format!("{} API key is required", config.llm_type))?;

        Self::new(api_key, config.model(), config.base_url(), config.temperature, config.max_tokens)
    }

    fn request(&self, messages: &[PromptMessage], stream: bool) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: if stream { Some(true) } else { None },
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<CompletionResponse, LlmError> {
        let req = self.request(messages, false);
        let resp = self.http
            .post(&self.base_url)
            .json(&req)
            .send().await?
            .error_for_status()?
            .json::<OpenAIResponse>().await?;

        let content = resp.choices
            .into_iter()
            .next()
            .ok_or_else(|| "No choices in chat completion response".to_string())?
            .message.content;

        Ok(CompletionResponse { response: content })
    }

    async fn stream_chat(&self, messages: &[PromptMessage]) -> Result<TokenStream, LlmError> {
        let req = self.request(messages, true);
        http_stream_generate(
            self.http.clone(),
            self.base_url.clone(),
            req,
            parse_sse_line,
            Vec::new()
        ).await
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
