//! Generation orchestrator: prompt → agent → sanitize → classify → rewrite
//! → render → persist. Every failure at every stage is absorbed here into a
//! `GraphResult`; this boundary never raises.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{error, info};

use crate::agent::CodeAgent;
use crate::classifier;
use crate::errors::Result;
use crate::executor::PlotRenderer;
use crate::models::{GraphRequest, GraphResult};
use crate::rewriter;
use crate::sanitizer;
use crate::store::ArtifactStore;

static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[a-zA-Z]*\n*").unwrap());
static FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n*```$").unwrap());

pub struct GraphGenerator {
    agent: Arc<dyn CodeAgent>,
    renderer: Arc<dyn PlotRenderer>,
    store: ArtifactStore,
}

impl GraphGenerator {
    pub fn new(
        agent: Arc<dyn CodeAgent>,
        renderer: Arc<dyn PlotRenderer>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            agent,
            renderer,
            store,
        }
    }

    /// Generate a graph for one request. Infallible by contract: failures
    /// come back as `GraphResult { success: false, error }`.
    pub async fn generate_graph(&self, request: &GraphRequest) -> GraphResult {
        info!("generating graph for: {}", request.description);
        match self.try_generate(request).await {
            Ok(image_id) => {
                info!("generated graph {image_id}");
                GraphResult::ok(image_id)
            }
            Err(err) => {
                error!("graph generation failed: {err}");
                err.into()
            }
        }
    }

    async fn try_generate(&self, request: &GraphRequest) -> Result<String> {
        let prompt = compose_prompt(request);
        let generated = self.agent.generate_code(&prompt).await?;
        let code = strip_code_fences(&generated);

        // The size hint usually rides on a plt.figure(...) line that the
        // sanitizer drops, so capture it from the raw text first.
        let explicit_size = classifier::extract_figure_size(&code);

        let code = sanitizer::sanitize(&code)?;

        let mut shape = classifier::classify(&code);
        if shape.figure_size.is_none() {
            shape.figure_size = explicit_size;
        }

        let code = rewriter::rewrite(&code, &shape);
        let bytes = self.renderer.render(&code, &shape).await?;
        self.store.store(&bytes).await
    }
}

fn compose_prompt(request: &GraphRequest) -> String {
    let mut prompt = format!("Create a matplotlib graph for: {}.", request.description);
    if let Some(data) = &request.data {
        prompt.push_str(&format!("\nData: {data}"));
    }
    if let Some(style) = &request.style {
        prompt.push_str(&format!("\nStyle: {style}"));
    }
    prompt.push_str(
        "\nReturn only the Python code with no additional statements or other info. \
         Ensure the labels are visible properly and not overlapping. \
         Make code minimal with no unnecessary lines.",
    );
    prompt
}

/// Remove leading/trailing markdown code fences from agent output.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let without_open = FENCE_OPEN.replace(trimmed, "");
    let without_close = FENCE_CLOSE.replace(&without_open, "");
    without_close.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PlotShape;
    use crate::errors::GraphError;
    use crate::models::GraphRequest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    struct FixedAgent(&'static str);

    #[async_trait]
    impl CodeAgent for FixedAgent {
        async fn generate_code(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl CodeAgent for FailingAgent {
        async fn generate_code(&self, _prompt: &str) -> Result<String> {
            Err(GraphError::Upstream("provider timed out".to_string()))
        }
    }

    /// Records what reaches the renderer and returns a fixed PNG header.
    #[derive(Default)]
    struct CaptureRenderer {
        seen: Mutex<Option<(String, PlotShape)>>,
    }

    #[async_trait]
    impl PlotRenderer for CaptureRenderer {
        async fn render(&self, source: &str, shape: &PlotShape) -> Result<Vec<u8>> {
            *self.seen.lock().unwrap() = Some((source.to_string(), shape.clone()));
            Ok(PNG_MAGIC.to_vec())
        }
    }

    struct FailingRenderer;

    #[async_trait]
    impl PlotRenderer for FailingRenderer {
        async fn render(&self, _source: &str, _shape: &PlotShape) -> Result<Vec<u8>> {
            Err(GraphError::Execution("NameError: name 'x' is not defined".to_string()))
        }
    }

    fn generator_with(
        agent: Arc<dyn CodeAgent>,
        renderer: Arc<dyn PlotRenderer>,
        dir: &std::path::Path,
    ) -> GraphGenerator {
        GraphGenerator::new(agent, renderer, ArtifactStore::new(dir))
    }

    #[tokio::test]
    async fn success_path_stores_a_png_under_a_random_id() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = Arc::new(CaptureRenderer::default());
        let generator = generator_with(
            Arc::new(FixedAgent(
                "```python\nfig = plt.figure(figsize=(12, 7))\nplt.gca().plot([1, 2], [3, 4])\n```",
            )),
            renderer.clone(),
            tmp.path(),
        );

        let result = generator
            .generate_graph(&GraphRequest::new("a line chart"))
            .await;
        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.image_id.len(), 16);

        let stored = tmp.path().join(format!("{}.png", result.image_id));
        let bytes = std::fs::read(stored).unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));

        let (source, shape) = renderer.seen.lock().unwrap().clone().unwrap();
        assert!(!source.contains("```"));
        assert!(!source.contains("plt.figure"));
        assert!(!source.contains("plt.gca"));
        assert!(source.contains("ax.plot([1, 2], [3, 4])"));
        // Size survives even though the figure line was stripped
        assert_eq!(shape.figure_size, Some((12.0, 7.0)));
    }

    #[tokio::test]
    async fn forbidden_import_short_circuits_before_rendering() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = Arc::new(CaptureRenderer::default());
        let generator = generator_with(
            Arc::new(FixedAgent("import os\nax.plot([1], [1])")),
            renderer.clone(),
            tmp.path(),
        );

        let result = generator.generate_graph(&GraphRequest::new("anything")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("forbidden import"));
        assert!(renderer.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn execution_failure_becomes_a_failed_result() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = generator_with(
            Arc::new(FixedAgent("ax.plot(x)")),
            Arc::new(FailingRenderer),
            tmp.path(),
        );

        let result = generator.generate_graph(&GraphRequest::new("anything")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("NameError"));
    }

    #[tokio::test]
    async fn upstream_failure_becomes_a_failed_result() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = generator_with(
            Arc::new(FailingAgent),
            Arc::new(CaptureRenderer::default()),
            tmp.path(),
        );

        let result = generator.generate_graph(&GraphRequest::new("anything")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("provider timed out"));
    }

    #[test]
    fn prompt_embeds_data_and_style() {
        let request = GraphRequest {
            description: "monthly sales".to_string(),
            style: Some("dark background".to_string()),
            data: Some(serde_json::json!({"jan": 10, "feb": 12})),
        };
        let prompt = compose_prompt(&request);
        assert!(prompt.contains("monthly sales"));
        assert!(prompt.contains("\nData: "));
        assert!(prompt.contains("jan"));
        assert!(prompt.contains("\nStyle: dark background"));
        assert!(prompt.contains("only the Python code"));
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(
            strip_code_fences("```python\nax.plot(x, y)\n```"),
            "ax.plot(x, y)"
        );
        assert_eq!(strip_code_fences("```\ncode\n```"), "code");
        assert_eq!(strip_code_fences("no fences"), "no fences");
    }
}
