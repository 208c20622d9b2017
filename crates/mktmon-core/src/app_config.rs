use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub seed_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub fetch_user_agent: String,
    pub fetch_inter_request_delay_ms: u64,
    pub fetch_max_retries: u32,
    pub fetch_retry_backoff_base_secs: u64,
    pub search_api_key: Option<String>,
    pub search_base_url: Option<String>,
    pub search_timeout_secs: u64,
    pub search_max_retries: u32,
    pub ai_api_key: Option<String>,
    pub ai_base_url: Option<String>,
    pub ai_chat_model: String,
    pub ai_embed_model: String,
    pub ai_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("seed_path", &self.seed_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("fetch_user_agent", &self.fetch_user_agent)
            .field(
                "fetch_inter_request_delay_ms",
                &self.fetch_inter_request_delay_ms,
            )
            .field("fetch_max_retries", &self.fetch_max_retries)
            .field(
                "fetch_retry_backoff_base_secs",
                &self.fetch_retry_backoff_base_secs,
            )
            .field(
                "search_api_key",
                &self.search_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("search_base_url", &self.search_base_url)
            .field("search_timeout_secs", &self.search_timeout_secs)
            .field("search_max_retries", &self.search_max_retries)
            .field(
                "ai_api_key",
                &self.ai_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("ai_base_url", &self.ai_base_url)
            .field("ai_chat_model", &self.ai_chat_model)
            .field("ai_embed_model", &self.ai_embed_model)
            .field("ai_timeout_secs", &self.ai_timeout_secs)
            .finish()
    }
}
