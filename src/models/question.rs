use serde::{Deserialize, Serialize};

/// A question ready to be administered.
///
/// `kind` carries the presentation variant; a reading question always has a
/// passage, a standard one never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice,
    Reading { passage: String },
}

impl Question {
    pub fn passage(&self) -> Option<&str> {
        match &self.kind {
            QuestionKind::Reading { passage } => Some(passage),
            QuestionKind::MultipleChoice => None,
        }
    }

    pub fn is_reading(&self) -> bool {
        matches!(self.kind, QuestionKind::Reading { .. })
    }

    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct_index).map(String::as_str)
    }
}

/// Raw output unit returned by the generative service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionGroup {
    #[serde(rename = "type")]
    pub group_type: GroupType,
    #[serde(default)]
    pub passage: Option<String>,
    pub questions: Vec<RawQuestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    Single,
    Reading,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: i64,
    pub explanation: String,
}
