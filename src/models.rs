use serde::{Deserialize, Serialize};

use crate::errors::GraphError;

/// A single graph-generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRequest {
    /// Natural-language description of the chart to draw
    pub description: String,
    /// Optional style hint passed through to the code agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Optional data payload the chart should be based on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl GraphRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            style: None,
            data: None,
        }
    }
}

/// Outcome of a graph-generation attempt. Never carries a raised error;
/// failures are folded into `success = false` + `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphResult {
    pub success: bool,
    /// Unique identifier for the generated graph; empty on failure
    #[serde(default)]
    pub image_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GraphResult {
    pub fn ok(image_id: String) -> Self {
        Self {
            success: true,
            image_id,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            image_id: String::new(),
            error: Some(message.into()),
        }
    }
}

impl From<GraphError> for GraphResult {
    fn from(err: GraphError) -> Self {
        GraphResult::failed(err.to_string())
    }
}

/// Kind of a chat reply segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    Text,
    Graph,
}

/// One segment of a chat reply: either prose or an image reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type")]
    pub kind: PartKind,
    /// Text content, or the image_id for graph parts
    pub content: String,
}

impl MessagePart {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: PartKind::Text,
            content: content.into(),
        }
    }

    pub fn graph(content: impl Into<String>) -> Self {
        Self {
            kind: PartKind::Graph,
            content: content.into(),
        }
    }
}

/// Full response to a chat query: an ordered mix of text and graph parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotResponse {
    pub success: bool,
    pub messages: Vec<MessagePart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_result_from_error_is_failure() {
        let result: GraphResult = GraphError::Validation("forbidden import".into()).into();
        assert!(!result.success);
        assert!(result.image_id.is_empty());
        assert!(result.error.unwrap().contains("forbidden import"));
    }

    #[test]
    fn message_part_serializes_kind_as_type() {
        let part = MessagePart::graph("abc123");
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "graph");
        assert_eq!(json["content"], "abc123");
    }
}
