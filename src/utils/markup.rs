use serde::Serialize;

/// A run of question text. Terms the model wrapped in `[ ]` are emphasized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSegment {
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub emphasized: bool,
}

impl TextSegment {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            emphasized: false,
        }
    }

    fn emphasized(text: &str) -> Self {
        Self {
            text: text.to_string(),
            emphasized: true,
        }
    }
}

/// Splits text on the shortest `[...]` spans. An unmatched `[` stays plain.
pub fn segments(text: &str) -> Vec<TextSegment> {
    let mut out = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        let Some(close) = rest[open + 1..].find(']').map(|c| open + 1 + c) else {
            break;
        };
        if open > 0 {
            out.push(TextSegment::plain(&rest[..open]));
        }
        out.push(TextSegment::emphasized(&rest[open + 1..close]));
        rest = &rest[close + 1..];
    }

    if !rest.is_empty() {
        out.push(TextSegment::plain(rest));
    }
    out
}
