use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "cx-coach";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "info,cx_coach=debug".to_string()
}

/// Get the application data directory (~/.cx-coach/ on all platforms)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".cx-coach")
}

/// What to do when the regeneration budget is exhausted without an
/// accepted draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Persist and return the best-scoring rejected draft, flagged
    /// `is_verified: false`.
    BestEffort,
    /// Fail the request outright; nothing is persisted.
    Fail,
}

impl ExhaustionPolicy {
    fn parse(value: &str) -> Self {
        match value {
            "fail" => Self::Fail,
            _ => Self::BestEffort,
        }
    }
}

/// Runtime settings, loaded from environment variables with defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    /// API key for the OpenAI-compatible backend.
    pub openai_api_key: String,
    /// Base URL of the OpenAI-compatible backend.
    pub openai_base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub stt_model: String,
    /// SQLite database file path.
    pub database_path: PathBuf,
    /// Bind address for the HTTP server.
    pub bind_addr: String,
    /// Target chunk size in characters for FAQ ingestion.
    pub chunk_size: usize,
    /// Overlap in characters between adjacent chunks.
    pub chunk_overlap: usize,
    /// Number of references retrieved per analysis run.
    pub retrieval_top_k: usize,
    /// Minimum cosine similarity for a chunk to count as relevant.
    pub retrieval_min_score: f32,
    /// Maximum regenerations after the first draft (bounded loop).
    pub max_regenerations: u32,
    /// Concurrency ceiling on generator invocations.
    pub generation_concurrency: usize,
    /// Per-call timeout for model requests, in seconds.
    pub request_timeout_secs: u64,
    pub exhaustion_policy: ExhaustionPolicy,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: env_or("OPENAI_API_KEY", ""),
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            chat_model: env_or("OPENAI_CHAT_MODEL", "gpt-4.1-nano"),
            embedding_model: env_or("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
            stt_model: env_or("OPENAI_STT_MODEL", "whisper-1"),
            database_path: std::env::var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| app_data_dir().join("cx-coach.db")),
            bind_addr: env_or("BIND_ADDR", "127.0.0.1:8080"),
            chunk_size: env_or_parse("FAQ_CHUNK_SIZE", 500),
            chunk_overlap: env_or_parse("FAQ_CHUNK_OVERLAP", 50),
            retrieval_top_k: env_or_parse("RETRIEVAL_TOP_K", 5),
            retrieval_min_score: env_or_parse("RETRIEVAL_MIN_SCORE", 0.3),
            max_regenerations: env_or_parse("MAX_REGENERATIONS", 2),
            generation_concurrency: env_or_parse("GENERATION_CONCURRENCY", 4),
            request_timeout_secs: env_or_parse("REQUEST_TIMEOUT_SECS", 60),
            exhaustion_policy: ExhaustionPolicy::parse(&env_or(
                "EXHAUSTION_POLICY",
                "best_effort",
            )),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
