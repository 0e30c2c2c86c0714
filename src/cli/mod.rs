pub mod repl;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Startup policy copilot for Indian founders", long_about = None)]
pub struct Args {
    // --- History Store Args ---
    /// Where the conversation is persisted (file, redis, memory, none)
    #[arg(long, env = "HISTORY_TYPE", default_value = "file")]
    pub history_type: String,

    /// Directory for the file history store. Defaults to the platform data directory.
    #[arg(long, env = "HISTORY_DIR")]
    pub history_dir: Option<String>,

    /// Redis endpoint for the redis history store (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "HISTORY_HOST", default_value = "redis://127.0.0.1:6379")]
    pub history_host: String,

    /// Prefix for the Redis history key.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "nitibot:")]
    pub history_redis_prefix: String,

    /// Fixed key the conversation record is stored under.
    #[arg(long, env = "STORAGE_KEY", default_value = "chat-messages")]
    pub storage_key: String,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (ollama, openai, anthropic, gemini, deepseek, xai, groq)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "ollama")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (e.g., OpenAI, Anthropic)
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-4o-mini, llama3.1)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Sampling temperature for replies.
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.7")]
    pub chat_temperature: f32,

    /// Upper bound on generated tokens per reply.
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "2048")]
    pub chat_max_tokens: u32,

    // --- General App Args ---
    /// Optional JSON file overriding sections of the system prompt.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
