pub mod cli;
pub mod config;
pub mod conversation;
pub mod history;
pub mod llm;
pub mod models;
pub mod session;
pub mod transport;

use chrono::Local;
use cli::Args;
use config::prompt::{ load_prompts, PromptConfig };
use conversation::Conversation;
use llm::chat::new_client as new_chat_client;
use llm::LlmConfig;
use log::info;
use session::ChatSession;
use std::error::Error;
use std::sync::Arc;
use transport::LlmTransport;

pub fn chat_config(args: &Args) -> Result<LlmConfig, Box<dyn Error + Send + Sync>> {
    let llm_type = args.chat_llm_type
        .parse()
        .map_err(|e| format!("Invalid chat LLM type: {}", e))?;
    Ok(LlmConfig {
        llm_type,
        api_key: Some(args.chat_api_key.clone()).filter(|k| !k.is_empty()),
        completion_model: args.chat_model.clone(),
        base_url: args.chat_base_url.clone(),
        temperature: args.chat_temperature,
        max_tokens: args.chat_max_tokens,
    })
}

pub fn system_prompt(args: &Args) -> Result<String, Box<dyn Error + Send + Sync>> {
    let prompts = match &args.prompts_path {
        Some(path) => load_prompts(path)?,
        None => PromptConfig::default(),
    };
    Ok(prompts.render(config::AI_NAME, config::OWNER_NAME, Local::now()))
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("adapter default"));
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("adapter default"));
    info!("History Store Type: {}", args.history_type);
    info!("Storage Key: {}", args.storage_key);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("-------------------------");

    let store = history::initialize_history_store(&args)?;
    let chat_client = new_chat_client(&chat_config(&args)?)?;
    let transport = Arc::new(LlmTransport::new(chat_client, system_prompt(&args)?));

    let conversation = Conversation::new(store, config::WELCOME_MESSAGE);
    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let session = ChatSession::new(conversation, transport).with_events(events_tx);

    cli::repl::run(session, events_rx).await
}
