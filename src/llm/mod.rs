pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    Ollama,
    OpenAI,
    Anthropic,
    Gemini,
    DeepSeek,
    XAI,
    Groq,
}

impl LlmType {
    /// Root URL used when none is configured.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmType::Ollama => "http://localhost:11434",
            LlmType::OpenAI => "https://api.openai.com",
            LlmType::Anthropic => "https://api.anthropic.com",
            LlmType::Gemini => "https://generativelanguage.googleapis.com",
            LlmType::DeepSeek => "https://api.deepseek.com",
            LlmType::XAI => "https://api.x.ai",
            LlmType::Groq => "https://api.groq.com/openai",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmType::Ollama => "llama3.1",
            LlmType::OpenAI => "gpt-4o-mini",
            LlmType::Anthropic => "claude-3-5-haiku-latest",
            LlmType::Gemini => "gemini-1.5-flash",
            LlmType::DeepSeek => "deepseek-chat",
            LlmType::XAI => "grok-2-latest",
            LlmType::Groq => "llama-3.3-70b-versatile",
        }
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LlmType::Ollama => "ollama",
            LlmType::OpenAI => "openai",
            LlmType::Anthropic => "anthropic",
            LlmType::Gemini => "gemini",
            LlmType::DeepSeek => "deepseek",
            LlmType::XAI => "xai",
            LlmType::Groq => "groq",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(LlmType::Ollama),
            "openai" => Ok(LlmType::OpenAI),
            "anthropic" => Ok(LlmType::Anthropic),
            "gemini" => Ok(LlmType::Gemini),
            "deepseek" => Ok(LlmType::DeepSeek),
            "xai" => Ok(LlmType::XAI),
            "groq" => Ok(LlmType::Groq),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::Ollama,
            api_key: None,
            completion_model: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

impl LlmConfig {
    pub fn model(&self) -> String {
        self.completion_model
            .clone()
            .unwrap_or_else(|| self.llm_type.default_model().to_string())
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.llm_type.default_base_url().to_string())
    }
}
