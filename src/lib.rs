//! plotbot: a chat backend that turns natural-language queries into rendered
//! charts. An LLM agent answers the query and may embed graph directives; a
//! second agent synthesizes matplotlib source for each directive, which is
//! denylist-sanitized, classified for projection and size, rewritten onto a
//! pipeline-owned axes handle, executed in a resource-limited Python
//! subprocess, and persisted as a PNG under a random URL-safe id.

pub mod agent;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod executor;
pub mod generator;
pub mod models;
pub mod parser;
pub mod rewriter;
pub mod sanitizer;
pub mod server;
pub mod store;

pub use agent::{ChatAgent, CodeAgent, LlmAgent};
pub use classifier::{classify, PlotShape};
pub use config::{ResourceLimits, ServiceConfig};
pub use errors::{GraphError, Result};
pub use executor::{PlotRenderer, PythonPlotRenderer};
pub use generator::GraphGenerator;
pub use models::{BotResponse, GraphRequest, GraphResult, MessagePart, PartKind};
pub use parser::parse_response;
pub use rewriter::rewrite;
pub use sanitizer::sanitize;
pub use store::ArtifactStore;
