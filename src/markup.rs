//! Fenced-code segmentation of revealed response text
//!
//! Splits response text into prose and fenced code regions so the rendering
//! layer can format them distinctly. A fence opens with a triple backtick
//! plus an optional single-word language tag and closes at the next triple
//! backtick; an unterminated fence is NOT a code region. During a reveal
//! cycle the opening marker stays plain prose until its closing marker has
//! been revealed.

const FENCE: &str = "```";

/// A region of response text
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseSegment {
    /// Plain prose
    Prose(String),
    /// A completed fenced code region
    Code {
        /// Language tag from the opening fence line, if present
        language: Option<String>,
        /// Verbatim fence body
        content: String,
    },
}

impl ResponseSegment {
    /// Create a prose segment
    pub fn prose(text: impl Into<String>) -> Self {
        ResponseSegment::Prose(text.into())
    }

    /// Create a code segment
    pub fn code(language: Option<&str>, content: impl Into<String>) -> Self {
        ResponseSegment::Code {
            language: language.map(|l| l.to_string()),
            content: content.into(),
        }
    }

    /// Check if this segment is a code region
    pub fn is_code(&self) -> bool {
        matches!(self, ResponseSegment::Code { .. })
    }
}

/// Split text into prose and completed code regions
///
/// Empty prose runs between adjacent fences are omitted; the segment list
/// concatenates back to the input minus the fence markers and tags.
pub fn parse_segments(text: &str) -> Vec<ResponseSegment> {
    let mut segments = Vec::new();
    let mut rest = text;
    let mut prose = String::new();

    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];

        // The opening fence line must be an optional word tag followed by a
        // newline; anything else is not a fence opening.
        let Some((tag, body)) = split_fence_header(after_open) else {
            prose.push_str(&rest[..open + FENCE.len()]);
            rest = after_open;
            continue;
        };

        // A fence only counts once its closing marker exists.
        let Some(close) = body.find(FENCE) else {
            break;
        };

        prose.push_str(&rest[..open]);
        if !prose.is_empty() {
            segments.push(ResponseSegment::Prose(std::mem::take(&mut prose)));
        }

        segments.push(ResponseSegment::Code {
            language: if tag.is_empty() {
                None
            } else {
                Some(tag.to_string())
            },
            content: body[..close].to_string(),
        });

        rest = &body[close + FENCE.len()..];
    }

    prose.push_str(rest);
    if !prose.is_empty() {
        segments.push(ResponseSegment::Prose(prose));
    }

    segments
}

/// Check whether revealed text currently ends inside an unterminated fence
pub fn in_open_fence(text: &str) -> bool {
    let mut rest = text;
    let mut open = false;
    while let Some(idx) = rest.find(FENCE) {
        let after = &rest[idx + FENCE.len()..];
        if open {
            open = false;
            rest = after;
        } else if let Some((_, body)) = split_fence_header(after) {
            open = true;
            rest = body;
        } else {
            rest = after;
        }
    }
    // A header still being revealed (no newline yet) is not an open fence
    open
}

/// Split a fence opening into its language tag and body
///
/// Returns `None` when the text after the marker is not a valid fence
/// header (tag containing non-word characters, or no newline revealed yet).
fn split_fence_header(after_open: &str) -> Option<(&str, &str)> {
    let newline = after_open.find('\n')?;
    let tag = after_open[..newline].trim_end_matches('\r');
    if !tag.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some((tag, &after_open[newline + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prose_only() {
        let segments = parse_segments("Just a plain answer.");
        assert_eq!(segments, vec![ResponseSegment::prose("Just a plain answer.")]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_segments("").is_empty());
    }

    #[test]
    fn test_tagged_fence() {
        let text = "Here you go:\n```python\ndef f():\n    return 1\n```\nDone.";
        let segments = parse_segments(text);
        assert_eq!(
            segments,
            vec![
                ResponseSegment::prose("Here you go:\n"),
                ResponseSegment::code(Some("python"), "def f():\n    return 1\n"),
                ResponseSegment::prose("\nDone."),
            ]
        );
    }

    #[test]
    fn test_untagged_fence() {
        let segments = parse_segments("```\nx\n```");
        assert_eq!(segments, vec![ResponseSegment::code(None, "x\n")]);
    }

    #[test]
    fn test_unterminated_fence_stays_prose() {
        let text = "Look:\n```rust\nlet x = 1;";
        let segments = parse_segments(text);
        assert_eq!(segments, vec![ResponseSegment::prose(text)]);
    }

    #[test]
    fn test_partial_reveal_becomes_code_at_closing_marker() {
        let full = "a\n```rust\nlet x = 1;\n```\nb";

        // One char before the closing marker completes: still all prose
        let close_end = full.find("```\nb").unwrap() + 2;
        let partial = &full[..close_end];
        assert!(parse_segments(partial).iter().all(|s| !s.is_code()));

        // With the full closing marker revealed the region formats as code
        let complete = &full[..close_end + 1];
        assert!(parse_segments(complete).iter().any(|s| s.is_code()));
    }

    #[test]
    fn test_multiple_fences() {
        let text = "```\na\n``` mid ```js\nb\n``` end";
        let segments = parse_segments(text);
        assert_eq!(
            segments,
            vec![
                ResponseSegment::code(None, "a\n"),
                ResponseSegment::prose(" mid "),
                ResponseSegment::code(Some("js"), "b\n"),
                ResponseSegment::prose(" end"),
            ]
        );
    }

    #[test]
    fn test_invalid_header_is_not_a_fence() {
        // A tag with spaces does not open a fence; the later valid fence
        // would still need its own closing marker.
        let text = "```not a tag\ncontent\n```";
        let segments = parse_segments(text);
        assert_eq!(segments.len(), 1);
        assert!(!segments[0].is_code());
    }

    #[test]
    fn test_segments_reassemble_content() {
        let text = "intro\n```go\nfmt.Println(1)\n```\noutro";
        let rebuilt: String = parse_segments(text)
            .iter()
            .map(|s| match s {
                ResponseSegment::Prose(t) => t.clone(),
                ResponseSegment::Code { content, .. } => content.clone(),
            })
            .collect();
        assert_eq!(rebuilt, "intro\nfmt.Println(1)\n\noutro");
    }

    #[test]
    fn test_in_open_fence() {
        assert!(!in_open_fence("plain"));
        assert!(!in_open_fence("```rust"));
        assert!(in_open_fence("```rust\nlet x"));
        assert!(!in_open_fence("```rust\nlet x\n```"));
        assert!(in_open_fence("```\na\n```\n```\nb"));
    }
}
