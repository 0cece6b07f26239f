//! SSE line parsing for the upstream streaming chat-completions response.
//!
//! Parses only lines starting with `data: `, stops on `[DONE]`, skips
//! malformed JSON chunks silently, and extracts `choices[0].delta.content`
//! as the incremental text.

use super::types::StreamEvent;

/// Parse one line of an SSE body (without trailing newlines). Returns
/// `None` for lines that aren't a `data: ` payload (blank lines, comments).
pub fn parse_line(line: &str) -> Option<StreamEvent> {
    let payload = line.strip_prefix("data: ")?;
    if payload.trim() == "[DONE]" {
        return Some(StreamEvent::Done);
    }
    let chunk: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(_) => return None,
    };
    let content = chunk
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("")
        .to_string();
    Some(StreamEvent::Delta {
        raw_line: line.to_string(),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"hi"}}]}"#;
        match parse_line(line) {
            Some(StreamEvent::Delta { content, .. }) => assert_eq!(content, "hi"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn recognizes_done_marker() {
        assert!(matches!(parse_line("data: [DONE]"), Some(StreamEvent::Done)));
    }

    #[test]
    fn skips_malformed_json() {
        assert!(parse_line("data: {not json").is_none());
    }

    #[test]
    fn ignores_non_data_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line(": comment").is_none());
    }
}

impl std::fmt::Debug for StreamEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamEvent::Delta { content, .. } => write!(f, "Delta({content:?})"),
            StreamEvent::Done => write!(f, "Done"),
        }
    }
}
