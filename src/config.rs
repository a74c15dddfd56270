use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

/// Origin allowed when `ALLOWED_ORIGINS` is unset or empty (local Vite dev server)
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Comma-separated list of origins allowed to call the API
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,

    /// API key for the embedding and chat completion gateway
    pub openai_api_key: String,

    /// Base URL of the embedding and chat completion gateway
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// REST endpoint of the movie vector store
    pub vector_store_url: String,

    /// Bearer token for the movie vector store
    pub vector_store_token: String,

    /// Trace sink API key. Traces are only logged when absent.
    #[serde(default)]
    pub opik_api_key: Option<String>,

    /// Trace sink base URL
    #[serde(default = "default_opik_url")]
    pub opik_url: String,

    /// Trace sink workspace
    #[serde(default)]
    pub opik_workspace: Option<String>,

    /// Trace sink project name
    #[serde(default = "default_opik_project_name")]
    pub opik_project_name: String,

    /// Minimum similarity score a candidate must reach
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,

    /// Maximum number of candidates retrieved and explained
    #[serde(default = "default_match_count")]
    pub match_count: usize,

    /// Deadline for a whole recommendation pipeline run
    #[serde(default = "default_pipeline_timeout_secs")]
    pub pipeline_timeout_secs: u64,

    /// Budget for flushing a finished trace to the sink
    #[serde(default = "default_trace_flush_timeout_secs")]
    pub trace_flush_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_allowed_origins() -> String {
    DEFAULT_ALLOWED_ORIGIN.to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_opik_url() -> String {
    "https://www.comet.com/opik/api".to_string()
}

fn default_opik_project_name() -> String {
    "movie-night".to_string()
}

fn default_match_threshold() -> f32 {
    0.2
}

fn default_match_count() -> usize {
    6
}

fn default_pipeline_timeout_secs() -> u64 {
    30
}

fn default_trace_flush_timeout_secs() -> u64 {
    5
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Parsed CORS allow-list
    pub fn allowed_origins(&self) -> HashSet<String> {
        parse_origins(&self.allowed_origins)
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline_timeout_secs)
    }

    pub fn trace_flush_timeout(&self) -> Duration {
        Duration::from_secs(self.trace_flush_timeout_secs)
    }
}

/// Splits a comma-separated origin list, falling back to the local default
/// when nothing usable is configured.
pub fn parse_origins(raw: &str) -> HashSet<String> {
    let origins: HashSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() {
        HashSet::from([DEFAULT_ALLOWED_ORIGIN.to_string()])
    } else {
        origins
    }
}
