pub mod admission;
pub mod models;
pub mod server;
pub mod config;
pub mod llm;
pub mod cli;

use admission::{ initialize_guards, AdmissionPolicy };
use cli::Args;
use config::knowledge::KnowledgeBase;
use llm::chat::{ new_client as new_chat_client, ChatClient };
use llm::{ LlmConfig, LlmType };
use log::{ info, warn };
use server::api::{ AppState, GenerationSettings };
use server::Server;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Builds the chat client, or `None` when the provider needs a key that is
/// missing. Requests then fail with "Server is not configured".
pub fn initialize_chat_client(
    args: &Args
) -> Result<Option<Arc<dyn ChatClient>>, Box<dyn Error + Send + Sync>> {
    let llm_type: LlmType = args.chat_llm_type
        .parse()
        .map_err(|e| format!("Invalid chat LLM type: {}", e))?;
    let api_key = Some(args.chat_api_key.trim().to_string()).filter(|k| !k.is_empty());
    if llm_type.requires_api_key() && api_key.is_none() {
        warn!("No API key configured for {}. Chat requests will be refused.", args.chat_llm_type);
        return Ok(None);
    }

    let chat_config = LlmConfig {
        llm_type,
        api_key,
        completion_model: args.chat_model.clone(),
        base_url: args.chat_base_url.clone(),
        timeout: Duration::from_secs(args.upstream_timeout_secs),
    };
    let chat_client = new_chat_client(&chat_config)?;
    info!(
        "Chat client configured: Type={}, Model={}, BaseURL={:?}",
        args.chat_llm_type,
        chat_client.get_model(),
        chat_client.get_base_url()
    );
    Ok(Some(chat_client))
}

pub async fn build_state(args: &Args) -> Result<AppState, Box<dyn Error + Send + Sync>> {
    let knowledge = Arc::new(KnowledgeBase::new(&args.kb_path));
    info!("Knowledge Base Path: {}", knowledge.path().display());
    Ok(AppState {
        guards: initialize_guards(args).await,
        policy: AdmissionPolicy::from_args(args),
        chat_client: initialize_chat_client(args)?,
        knowledge,
        generation: GenerationSettings {
            max_output_tokens: args.max_output_tokens,
            temperature: args.temperature,
        },
        production: args.production,
    })
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat API Key Set: {}", !args.chat_api_key.trim().is_empty());
    info!(
        "Rate Limit: {} requests / {}s",
        args.rate_limit_count,
        args.rate_limit_window_secs
    );
    info!(
        "Repeat Window: {}s (refresh on hit: {})",
        args.repeat_window_secs,
        args.repeat_refresh_on_hit
    );
    info!("Shared Store Configured: {}", args.store_url.is_some());
    info!("Production Mode: {}", args.production);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let state = build_state(&args).await?;
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, state, args);
    server.run().await?;

    Ok(())
}
