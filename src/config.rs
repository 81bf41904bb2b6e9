use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{GraphError, Result};

/// Resource limits applied to each plot-rendering subprocess
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum memory in MB
    pub memory_mb: usize,
    /// Maximum CPU time in seconds
    pub cpu_seconds: u64,
    /// Maximum number of processes
    pub max_processes: u64,
    /// Maximum number of threads for numeric libraries
    pub max_threads: u32,
    /// Wall clock timeout
    pub timeout: Duration,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_mb: 1024,
            cpu_seconds: 20,
            max_processes: 8,
            max_threads: 4,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Service configuration, built once at startup and passed into constructors.
///
/// Environment variables take the place of a config file; there is no
/// process-global state derived from them after startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// OpenAI-compatible API base URL (e.g. an OpenRouter endpoint)
    pub api_base_url: String,
    /// Bearer token for the API
    pub api_key: String,
    /// Model used for conversational responses
    pub chat_model: String,
    /// Model used for plotting-code generation
    pub code_model: String,
    /// Per-request timeout for agent calls
    pub agent_timeout: Duration,
    /// Directory that holds rendered graph images
    pub artifact_dir: PathBuf,
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Explicit Python interpreter path; resolved from PATH when unset
    pub python_path: Option<PathBuf>,
    /// Limits for the rendering subprocess
    pub limits: ResourceLimits,
}

impl ServiceConfig {
    /// Load configuration from the environment.
    ///
    /// `PLOTBOT_API_KEY` is required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("PLOTBOT_API_KEY").map_err(|_| {
            GraphError::Config("PLOTBOT_API_KEY is not set in the environment".to_string())
        })?;

        let api_base_url = env_or("PLOTBOT_API_BASE_URL", "https://openrouter.ai/api/v1");
        let chat_model = env_or("PLOTBOT_CHAT_MODEL", "openai/gpt-4o-mini");
        let code_model = env_or("PLOTBOT_CODE_MODEL", "openai/gpt-4o-mini");
        let artifact_dir = PathBuf::from(env_or("PLOTBOT_ARTIFACT_DIR", "generated_graphs"));
        let listen_addr = env_or("PLOTBOT_LISTEN_ADDR", "127.0.0.1:5001");
        let python_path = std::env::var("PLOTBOT_PYTHON_PATH").ok().map(PathBuf::from);

        let agent_timeout = std::env::var("PLOTBOT_AGENT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        let mut limits = ResourceLimits::default();
        if let Some(secs) = std::env::var("PLOTBOT_EXEC_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            limits.timeout = Duration::from_secs(secs);
        }
        if let Some(mb) = std::env::var("PLOTBOT_EXEC_MEMORY_MB")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            limits.memory_mb = mb;
        }

        Ok(Self {
            api_base_url,
            api_key,
            chat_model,
            code_model,
            agent_timeout,
            artifact_dir,
            listen_addr,
            python_path,
            limits,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
