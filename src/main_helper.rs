use crate::auth::TokenProvider;
use crate::upstream::UpstreamClient;
use clap::Parser;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(long, default_value_t = 8000)]
    pub port: u16,
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, default_value = "codestral-2501")]
    pub model: String,
    #[arg(long, default_value = "us-central1")]
    pub vertex_location: String,
    /// Vertex project number; falls back to the VERTEX_PROJECT_NUMBER
    /// environment variable when not given.
    #[arg(long)]
    pub vertex_project: Option<String>,
    /// Command whose stdout is used as the bearer token when no static
    /// token is present in VERTEX_ACCESS_TOKEN.
    #[arg(long, default_value = "gcloud auth print-access-token")]
    pub token_command: String,
    #[arg(long, default_value_t = 1800)]
    pub token_ttl_secs: u64,
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,
    /// Timeout for synchronous (non-streaming) upstream calls.
    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,
    /// Maximum silence between upstream chunks before a streaming session
    /// is failed. The original design had no such bound; a hung upstream
    /// hung the client stream.
    #[arg(long, default_value_t = 60)]
    pub idle_read_timeout_secs: u64,
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    pub max_body_size: usize,
}

pub struct AppState {
    pub upstream: UpstreamClient,
    pub tokens: Arc<TokenProvider>,
    pub args: Arc<Args>,
}
