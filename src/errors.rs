use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("Python not installed or not found in PATH")]
    PythonNotFound,

    #[error("unsafe generated code: {0}")]
    Validation(String),

    #[error("error executing graph code: {0}")]
    Execution(String),

    #[error("plot execution timed out")]
    Timeout,

    #[error("artifact storage failed: {0}")]
    Storage(String),

    #[error("graph image not found: {0}")]
    ImageNotFound(String),

    #[error("code generation agent failed: {0}")]
    Upstream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
