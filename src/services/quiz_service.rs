use crate::error::{Error, Result};
use crate::models::question::Question;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizMode {
    /// Untimed; feedback and explanation right after each answer.
    Practice,
    /// Timed; feedback is withheld until the quiz is over.
    Mock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_index: usize,
    pub selected_option: Option<usize>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizReport {
    pub score: usize,
    pub total: usize,
    pub answers: Vec<AnswerRecord>,
}

/// One run through a generated question list.
///
/// While in progress `index` always points at a question; once finished
/// every mutating call is a no-op.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<Question>,
    mode: QuizMode,
    index: usize,
    selected: Option<usize>,
    answered: bool,
    answers: Vec<Option<usize>>,
    score: usize,
    remaining_seconds: Option<u32>,
    finished: bool,
}

impl QuizSession {
    pub fn new(questions: Vec<Question>, time_limit_minutes: Option<u32>) -> Result<Self> {
        if questions.is_empty() {
            return Err(Error::BadRequest("A quiz needs at least one question".to_string()));
        }

        let remaining_seconds = time_limit_minutes
            .filter(|minutes| *minutes > 0)
            .map(|minutes| minutes.saturating_mul(60));
        let mode = if remaining_seconds.is_some() {
            QuizMode::Mock
        } else {
            QuizMode::Practice
        };

        Ok(Self {
            answers: vec![None; questions.len()],
            questions,
            mode,
            index: 0,
            selected: None,
            answered: false,
            score: 0,
            remaining_seconds,
            finished: false,
        })
    }

    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn current_question(&self) -> Option<&Question> {
        if self.finished {
            None
        } else {
            self.questions.get(self.index)
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn is_answered(&self) -> bool {
        self.answered
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn answers(&self) -> &[Option<usize>] {
        &self.answers
    }

    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    pub fn remaining_seconds(&self) -> Option<u32> {
        self.remaining_seconds
    }

    pub fn is_timed(&self) -> bool {
        self.remaining_seconds.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Records a tentative choice. Ignored once the current question has
    /// been answered or the quiz is over.
    pub fn select(&mut self, option: usize) -> Result<bool> {
        if self.finished || self.answered {
            return Ok(false);
        }
        let options = self.questions[self.index].options.len();
        if option >= options {
            return Err(Error::BadRequest(format!(
                "Option {} does not exist, question has {} options",
                option, options
            )));
        }
        self.selected = Some(option);
        Ok(true)
    }

    /// Commits the current selection. No-op without a selection.
    pub fn check(&mut self) -> bool {
        if self.finished || self.answered {
            return false;
        }
        let Some(selected) = self.selected else {
            return false;
        };

        self.answers[self.index] = Some(selected);
        if selected == self.questions[self.index].correct_index {
            self.score += 1;
        }

        match self.mode {
            QuizMode::Practice => self.answered = true,
            QuizMode::Mock => self.advance(),
        }
        true
    }

    /// Moves past an answered question, finishing after the last one.
    pub fn next(&mut self) -> bool {
        if self.finished || !self.answered {
            return false;
        }
        self.advance();
        true
    }

    /// One second of countdown. Returns true when this tick ended the quiz.
    pub fn tick(&mut self) -> bool {
        if self.finished {
            return false;
        }
        let Some(remaining) = self.remaining_seconds.as_mut() else {
            return false;
        };

        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            tracing::info!("Time is up at question {}/{}", self.index + 1, self.questions.len());
            self.finish();
            return true;
        }
        false
    }

    pub fn report(&self) -> Option<QuizReport> {
        if !self.finished {
            return None;
        }
        let answers = self
            .questions
            .iter()
            .zip(&self.answers)
            .enumerate()
            .map(|(question_index, (q, selected))| AnswerRecord {
                question_index,
                selected_option: *selected,
                is_correct: *selected == Some(q.correct_index),
            })
            .collect();

        Some(QuizReport {
            score: self.score,
            total: self.questions.len(),
            answers,
        })
    }

    fn advance(&mut self) {
        if self.index + 1 < self.questions.len() {
            self.index += 1;
            self.selected = None;
            self.answered = false;
        } else {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.selected = None;
        self.answered = false;
    }
}
