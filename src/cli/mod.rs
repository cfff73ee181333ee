use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:8000")]
    pub server_addr: String,

    // --- Conversation Store Args ---
    /// Path of the SQLite file holding conversations and messages.
    #[arg(long, env = "DB_PATH", default_value = "memory.db")]
    pub db_path: String,

    /// Drop and recreate both tables on startup. All stored conversations are lost.
    #[arg(long, env = "RESET_DB", default_value = "false")]
    pub reset_db: bool,

    // --- Primary Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (ollama, openai)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "ollama")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (only needed for openai)
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., llama3.2, gpt-4o-mini)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Request timeout in seconds for the primary chat provider.
    #[arg(long, env = "CHAT_TIMEOUT_SECS", default_value = "60")]
    pub chat_timeout_secs: u64,

    // --- Fallback Chat LLM Provider Args ---
    /// Type of LLM provider used when the primary one fails (ollama, openai)
    #[arg(long, env = "FALLBACK_LLM_TYPE", default_value = "openai")]
    pub fallback_llm_type: String,

    /// Base URL for the fallback provider API.
    #[arg(long, env = "FALLBACK_BASE_URL")]
    pub fallback_base_url: Option<String>,

    /// API Key for the fallback provider. An empty key disables a cloud fallback.
    #[arg(long, env = "FALLBACK_API_KEY", default_value = "")]
    pub fallback_api_key: String,

    /// Model name for the fallback provider.
    #[arg(long, env = "FALLBACK_MODEL")]
    pub fallback_model: Option<String>,

    /// Request timeout in seconds for the fallback chat provider.
    #[arg(long, env = "FALLBACK_TIMEOUT_SECS", default_value = "30")]
    pub fallback_timeout_secs: u64,

    // --- Generation Args ---
    /// Timeout in seconds for the backend status probe used by /health.
    #[arg(long, env = "HEALTH_TIMEOUT_SECS", default_value = "5")]
    pub health_timeout_secs: u64,

    /// Number of most recent turns sent to the backend as context.
    #[arg(long, env = "CONTEXT_TURNS", default_value = "10")]
    pub context_turns: usize,

    /// Length of the placeholder embedding vectors.
    #[arg(long, env = "EMBEDDING_DIMENSION", default_value = "384")]
    pub embedding_dimension: usize,
}
