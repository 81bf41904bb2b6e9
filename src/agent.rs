//! Reqwest-based client for OpenAI-compatible Chat Completions, plus the
//! two configured agents the service runs on: a chat agent that may embed
//! `<graph>...</graph>` directives, and a code agent that returns bare
//! matplotlib source.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ServiceConfig;
use crate::errors::{GraphError, Result};

const CHAT_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers with text and, when a \
chart would add value, with generated graphs. To request a graph, embed \
<graph>description of the chart to generate</graph> in your reply; text may appear before and \
after it. Only request graphs when they genuinely help answer the question.";

const CODE_SYSTEM_PROMPT: &str = "You generate minimal matplotlib plotting code. Rules: use only \
matplotlib.pyplot and numpy; draw on the current axes (plt.gca()) and never create, show, or \
close figures; set clear titles, labels, and limits; for 3D charts use plot3D(), scatter3D(), \
plot_surface() or set_zlabel(); for polar charts select axes with projection='polar'. Return \
only Python code, nothing else.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: Role,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// The code-generation capability the orchestrator consumes.
///
/// Single attempt, no retry policy; provider failures surface as
/// [`GraphError::Upstream`].
#[async_trait]
pub trait CodeAgent: Send + Sync {
    async fn generate_code(&self, prompt: &str) -> Result<String>;
}

/// The conversational capability the HTTP layer consumes.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    async fn reply(&self, query: &str) -> Result<String>;
}

/// One configured model + system prompt over an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct LlmAgent {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
}

impl LlmAgent {
    fn new(cfg: &ServiceConfig, model: &str, system_prompt: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.agent_timeout)
            .build()
            .map_err(|e| GraphError::Config(format!("building HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
        })
    }

    /// The conversational agent answering user queries.
    pub fn chat_agent(cfg: &ServiceConfig) -> Result<Self> {
        Self::new(cfg, &cfg.chat_model, CHAT_SYSTEM_PROMPT)
    }

    /// The agent that turns chart descriptions into matplotlib source.
    pub fn code_agent(cfg: &ServiceConfig) -> Result<Self> {
        Self::new(cfg, &cfg.code_model, CODE_SYSTEM_PROMPT)
    }

    /// Send one prompt, return the assistant's reply text.
    pub async fn run(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| GraphError::Upstream(format!("invalid API key header: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);

        let messages = vec![
            ChatMessage {
                role: Role::System,
                content: self.system_prompt.clone(),
            },
            ChatMessage {
                role: Role::User,
                content: prompt.to_string(),
            },
        ];

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        debug!(model = %self.model, "sending chat request");
        let resp = self
            .http
            .post(url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| GraphError::Upstream(format!("chat request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(GraphError::Upstream(format!(
                "provider returned {}",
                resp.status()
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GraphError::Upstream(format!("malformed provider response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| GraphError::Upstream("provider returned no content".to_string()))
    }
}

#[async_trait]
impl CodeAgent for LlmAgent {
    async fn generate_code(&self, prompt: &str) -> Result<String> {
        self.run(prompt).await
    }
}

#[async_trait]
impl ChatAgent for LlmAgent {
    async fn reply(&self, query: &str) -> Result<String> {
        self.run(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_deserializes() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"ax.plot([1],[1])"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("ax.plot([1],[1])")
        );
    }

    #[test]
    fn empty_choices_deserialize() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(parsed.choices.is_empty());
    }
}
