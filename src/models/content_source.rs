use serde::{Deserialize, Serialize};

/// Material a quiz is generated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSource {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Text extracted from an uploaded document.
    Text,
    /// Free-form topic typed by the user.
    Prompt,
}

impl ContentSource {
    pub fn text(content: String, note: Option<String>) -> Self {
        Self {
            source_type: SourceType::Text,
            content,
            note: normalize_note(note),
        }
    }

    pub fn prompt(content: String, note: Option<String>) -> Self {
        Self {
            source_type: SourceType::Prompt,
            content,
            note: normalize_note(note),
        }
    }
}

fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}
