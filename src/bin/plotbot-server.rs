use std::sync::Arc;

use plotbot::{
    ArtifactStore, GraphGenerator, LlmAgent, PythonPlotRenderer, ServiceConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "plotbot=info".to_string()),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env()?;
    tracing::info!(
        "plotbot-server starting (artifact_dir={:?}, listen={})",
        config.artifact_dir,
        config.listen_addr
    );

    let chat = LlmAgent::chat_agent(&config)?;
    let code = LlmAgent::code_agent(&config)?;

    let renderer = match &config.python_path {
        Some(path) => PythonPlotRenderer::with_python_path(path.clone())?,
        None => PythonPlotRenderer::new()?,
    }
    .with_limits(config.limits.clone());
    tracing::info!("using Python interpreter {:?}", renderer.python_path());

    let store = ArtifactStore::new(config.artifact_dir.clone());
    let generator = GraphGenerator::new(Arc::new(code), Arc::new(renderer), store.clone());

    let state = Arc::new(plotbot::server::AppState {
        chat: Arc::new(chat),
        generator,
        store,
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, plotbot::server::router(state)).await?;

    Ok(())
}
