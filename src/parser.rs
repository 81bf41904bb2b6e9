//! Splits a chat agent reply into ordered text and graph-directive parts.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::MessagePart;

static GRAPH_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<graph>(.*?)</graph>").unwrap());

/// Parse an agent reply into parts. Graph parts carry the chart description
/// found between the tags; surrounding prose becomes text parts. Whitespace
/// -only segments are dropped. A reply with no tags is one text part.
pub fn parse_response(response: &str) -> Vec<MessagePart> {
    let mut parts = Vec::new();
    let mut cursor = 0;

    for caps in GRAPH_TAG.captures_iter(response) {
        let whole = caps.get(0).expect("match always has group 0");
        let before = &response[cursor..whole.start()];
        if !before.trim().is_empty() {
            parts.push(MessagePart::text(before.trim()));
        }
        let description = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if !description.is_empty() {
            parts.push(MessagePart::graph(description));
        }
        cursor = whole.end();
    }

    let tail = &response[cursor..];
    if !tail.trim().is_empty() {
        parts.push(MessagePart::text(tail.trim()));
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PartKind;

    #[test]
    fn plain_text_is_one_part() {
        let parts = parse_response("The weather today is sunny.");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].kind, PartKind::Text);
        assert_eq!(parts[0].content, "The weather today is sunny.");
    }

    #[test]
    fn mixed_reply_keeps_order() {
        let reply = "Here is the trend.\n<graph>line chart of temperature over time</graph>\nIt peaks at noon.";
        let parts = parse_response(reply);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].kind, PartKind::Text);
        assert_eq!(parts[1].kind, PartKind::Graph);
        assert_eq!(parts[1].content, "line chart of temperature over time");
        assert_eq!(parts[2].kind, PartKind::Text);
        assert_eq!(parts[2].content, "It peaks at noon.");
    }

    #[test]
    fn multiple_graphs_in_one_reply() {
        let reply = "<graph>first</graph><graph>second</graph>";
        let parts = parse_response(reply);
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.kind == PartKind::Graph));
    }

    #[test]
    fn multiline_descriptions_are_supported() {
        let parts = parse_response("<graph>bar chart of\nmonthly sales</graph>");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].content, "bar chart of\nmonthly sales");
    }

    #[test]
    fn empty_tags_are_dropped() {
        let parts = parse_response("before <graph>  </graph> after");
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.kind == PartKind::Text));
    }
}
