use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::question::{Question, QuestionKind};
use crate::services::quiz_service::{QuizMode, QuizSession};
use crate::services::workspace_service::SourceMode;
use crate::utils::markup::{segments, TextSegment};

pub const MAX_TIME_LIMIT_MINUTES: u32 = 180;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerateFromPromptRequest {
    pub prompt: String,
    pub count: u32,
    #[validate(range(min = 1, max = 180))]
    pub time_limit_minutes: Option<u32>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

/// Non-file fields of a document upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DocumentSettings {
    pub count: Option<u32>,
    #[validate(range(min = 1, max = 180))]
    pub time_limit_minutes: Option<u32>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectOptionRequest {
    pub option: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePreferencesRequest {
    pub dark_mode: Option<bool>,
    pub source_mode: Option<SourceMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizOptionsResponse {
    pub question_counts: Vec<u32>,
    pub default_count: u32,
    pub slow_count_threshold: u32,
    pub accepted_mime_type: String,
    pub min_prompt_chars: usize,
    pub min_document_chars: usize,
    pub max_time_limit_minutes: u32,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    Idle,
    Parsing,
    Generating,
    InQuiz,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceView {
    pub id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub phase: PhaseName,
    pub loading: bool,
    pub parsing_progress: Option<u8>,
    pub source_mode: SourceMode,
    pub dark_mode: bool,
    pub error: Option<String>,
    pub quiz: Option<QuizView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionStyle {
    MultipleChoice,
    Reading,
}

#[derive(Debug, Clone, Serialize)]
pub struct Feedback {
    pub correct_index: usize,
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub number: usize,
    pub style: QuestionStyle,
    pub passage: Option<String>,
    pub question: String,
    pub segments: Vec<TextSegment>,
    pub options: Vec<String>,
    pub selected: Option<usize>,
    pub answered: bool,
    pub feedback: Option<Feedback>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub question_index: usize,
    pub question: String,
    pub selected_option: Option<usize>,
    pub correct_index: usize,
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    pub score: usize,
    pub total: usize,
    pub answers: Vec<ReviewItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizView {
    pub mode: QuizMode,
    pub total: usize,
    pub position: usize,
    pub progress_percent: u8,
    pub remaining_seconds: Option<u32>,
    pub finished: bool,
    pub current: Option<QuestionView>,
    pub report: Option<ReportView>,
}

impl QuizView {
    pub fn from_session(session: &QuizSession) -> Self {
        let total = session.total();
        let position = session.current_index() + 1;
        let progress_percent = if session.is_finished() {
            100
        } else {
            ((position as f64 / total as f64) * 100.0).round() as u8
        };

        let current = session.current_question().map(|q| QuestionView {
            number: position,
            style: style_of(q),
            passage: q.passage().map(str::to_string),
            question: q.question.clone(),
            segments: segments(&q.question),
            options: q.options.clone(),
            selected: session.selected(),
            answered: session.is_answered(),
            feedback: feedback_for(session, q),
        });

        let report = session.report().map(|report| ReportView {
            score: report.score,
            total: report.total,
            answers: report
                .answers
                .iter()
                .zip(session.questions())
                .map(|(record, q)| ReviewItem {
                    question_index: record.question_index,
                    question: q.question.clone(),
                    selected_option: record.selected_option,
                    correct_index: q.correct_index,
                    is_correct: record.is_correct,
                    explanation: q.explanation.clone(),
                })
                .collect(),
        });

        Self {
            mode: session.mode(),
            total,
            position,
            progress_percent,
            remaining_seconds: session.remaining_seconds(),
            finished: session.is_finished(),
            current,
            report,
        }
    }
}

fn style_of(q: &Question) -> QuestionStyle {
    match q.kind {
        QuestionKind::MultipleChoice => QuestionStyle::MultipleChoice,
        QuestionKind::Reading { .. } => QuestionStyle::Reading,
    }
}

// Mock sessions never reach the answered state, so feedback stays hidden
// until the final report.
fn feedback_for(session: &QuizSession, q: &Question) -> Option<Feedback> {
    if session.mode() != QuizMode::Practice || !session.is_answered() {
        return None;
    }
    Some(Feedback {
        correct_index: q.correct_index,
        is_correct: session.selected() == Some(q.correct_index),
        explanation: q.explanation.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(correct_index: usize) -> Question {
        Question {
            kind: QuestionKind::Reading {
                passage: "The [cat] sat.".into(),
            },
            question: "What sat on the [mat]?".into(),
            options: vec!["cat".into(), "dog".into()],
            correct_index,
            explanation: "Sentence one.".into(),
        }
    }

    #[test]
    fn practice_view_reveals_feedback_after_check() {
        let mut session = QuizSession::new(vec![reading(0), reading(1)], None).unwrap();
        let before = QuizView::from_session(&session);
        assert_eq!(before.progress_percent, 50);
        let current = before.current.unwrap();
        assert_eq!(current.style, QuestionStyle::Reading);
        assert_eq!(current.passage.as_deref(), Some("The [cat] sat."));
        assert!(current.segments.iter().any(|s| s.emphasized && s.text == "mat"));
        assert!(current.feedback.is_none());

        session.select(1).unwrap();
        session.check();
        let after = QuizView::from_session(&session).current.unwrap();
        let feedback = after.feedback.unwrap();
        assert_eq!(feedback.correct_index, 0);
        assert!(!feedback.is_correct);
        assert_eq!(feedback.explanation, "Sentence one.");
    }

    #[test]
    fn mock_view_hides_feedback_until_report() {
        let mut session = QuizSession::new(vec![reading(0), reading(1)], Some(5)).unwrap();
        session.select(0).unwrap();
        session.check();

        let mid = QuizView::from_session(&session);
        assert_eq!(mid.mode, QuizMode::Mock);
        assert_eq!(mid.position, 2);
        let current = mid.current.unwrap();
        assert!(current.feedback.is_none());
        assert!(!current.answered);
        assert!(mid.report.is_none());

        session.select(0).unwrap();
        session.check();
        let done = QuizView::from_session(&session);
        assert!(done.finished);
        assert!(done.current.is_none());
        assert_eq!(done.progress_percent, 100);
        let report = done.report.unwrap();
        assert_eq!(report.score, 1);
        assert_eq!(report.answers[1].correct_index, 1);
        assert_eq!(report.answers[1].explanation, "Sentence one.");
    }
}
