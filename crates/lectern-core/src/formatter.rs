//! Conversion of plain text into structured rich-text blocks.
//!
//! The field editor never inspects text itself; it hands plain strings to a
//! [`TextFormatter`] and splices whatever blocks come back.

use serde_json::{json, Value};

/// Turns plain text into the repository's block representation.
pub trait TextFormatter: Send + Sync {
    fn to_blocks(&self, text: &str) -> Vec<Value>;
}

/// One `normal` block per blank-line-separated paragraph, each holding a
/// single unmarked span. Inline markup is kept verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParagraphFormatter;

impl TextFormatter for ParagraphFormatter {
    fn to_blocks(&self, text: &str) -> Vec<Value> {
        text.split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|paragraph| {
                json!({
                    "_type": "block",
                    "_key": new_key(),
                    "style": "normal",
                    "markDefs": [],
                    "children": [{
                        "_type": "span",
                        "_key": new_key(),
                        "text": paragraph,
                        "marks": []
                    }]
                })
            })
            .collect()
    }
}

/// Random 12-character array item key.
pub fn new_key() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_paragraphs_into_blocks() {
        let blocks = ParagraphFormatter.to_blocks("First line\n\n  Second  \n\n\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["_type"], "block");
        assert_eq!(blocks[0]["children"][0]["text"], "First line");
        assert_eq!(blocks[1]["children"][0]["text"], "Second");
    }

    #[test]
    fn blank_text_yields_no_blocks() {
        assert!(ParagraphFormatter.to_blocks("   ").is_empty());
    }

    #[test]
    fn keys_are_unique() {
        let blocks = ParagraphFormatter.to_blocks("a\n\nb");
        assert_ne!(blocks[0]["_key"], blocks[1]["_key"]);
        assert_eq!(new_key().len(), 12);
    }
}
