pub mod agent;
pub mod models;
pub mod server;
pub mod llm;
pub mod cli;
pub mod history;

use agent::AIAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Database Path: {}", args.db_path);
    info!("Reset Database: {}", args.reset_db);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Timeout: {}s", args.chat_timeout_secs);
    info!("Fallback LLM Type: {}", args.fallback_llm_type);
    info!("Fallback Key Present: {}", !args.fallback_api_key.trim().is_empty());
    info!("Context Turns: {}", args.context_turns);
    info!("Embedding Dimension: {} (random placeholder)", args.embedding_dimension);
    info!("-------------------------");

    let agent = Arc::new(AIAgent::new(args.clone()).await?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent);
    server.run().await?;

    Ok(())
}
