use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (gemini, openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "gemini")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider. Requests are refused with a server error while empty.
    #[arg(long, env = "GEMINI_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gemini-2.5-flash, gpt-4o-mini, llama3)
    #[arg(long, env = "GEMINI_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Upper bound on generated tokens per answer.
    #[arg(long, env = "MAX_OUTPUT_TOKENS", default_value = "600")]
    pub max_output_tokens: u32,

    /// Sampling temperature for the generation call.
    #[arg(long, env = "TEMPERATURE", default_value = "0.2")]
    pub temperature: f32,

    /// HTTP timeout in seconds for a single generation call.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "30")]
    pub upstream_timeout_secs: u64,

    // --- Knowledge Base Args ---
    /// Path to the knowledge-base document embedded in the system instruction.
    #[arg(long, env = "KB_PATH", default_value = "kb/knowledge.md")]
    pub kb_path: String,

    // --- Admission Args ---
    /// Requests allowed per client inside one rate-limit window.
    #[arg(long, env = "RATE_LIMIT_COUNT", default_value = "20")]
    pub rate_limit_count: usize,

    /// Length of the sliding rate-limit window in seconds. Also sent as Retry-After.
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value = "300")]
    pub rate_limit_window_secs: u64,

    /// Window in seconds during which an identical message from the same client is refused.
    #[arg(long, env = "REPEAT_WINDOW_SECS", default_value = "20")]
    pub repeat_window_secs: u64,

    /// Restart the repeat window on every refused resubmission instead of keeping the first timestamp.
    #[arg(long, env = "REPEAT_REFRESH_ON_HIT", default_value = "false")]
    pub repeat_refresh_on_hit: bool,

    // --- Shared Store Args ---
    /// Redis URL shared by all instances for rate limiting and repeat detection
    /// (e.g., rediss://host:6379). In-process memory is used when unset or unreachable.
    #[arg(long, env = "RATE_STORE_URL")]
    pub store_url: Option<String>,

    /// Token for the shared store, sent as the Redis password.
    #[arg(long, env = "RATE_STORE_TOKEN")]
    pub store_token: Option<String>,

    /// Prefix for every key written to the shared store.
    #[arg(long, env = "RATE_STORE_PREFIX", default_value = "support-chat:")]
    pub store_prefix: String,

    // --- General App Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Production mode: error details are kept out of the logs.
    #[arg(long, env = "PRODUCTION", default_value = "false")]
    pub production: bool,

    /// Send Strict-Transport-Security. Only honoured together with --production.
    #[arg(long, env = "ENABLE_HSTS", default_value = "false")]
    pub enable_hsts: bool,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
