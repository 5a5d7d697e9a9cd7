use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question set is empty")]
    EmptySet,

    #[error("question {number}: prompt cannot be empty")]
    EmptyPrompt { number: usize },

    #[error("question {number}: needs at least 2 options, got {count}")]
    TooFewOptions { number: usize, count: usize },

    #[error("question {number}: option {option} is blank")]
    BlankOption { number: usize, option: usize },

    #[error("question {number}: correct option {correct} is out of range (options: {count})")]
    CorrectOutOfRange {
        number: usize,
        correct: usize,
        count: usize,
    },
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated question as it appears in a bundled asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(rename = "correct")]
    pub correct_option: usize,
}

impl QuestionDraft {
    #[must_use]
    pub fn new(
        prompt: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
        correct_option: usize,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            options: options.into_iter().map(Into::into).collect(),
            correct_option,
        }
    }

    fn validate(self, id: QuestionId) -> Result<Question, QuestionError> {
        let number = id.number();
        let prompt = self.prompt.trim().to_owned();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt { number });
        }

        let count = self.options.len();
        if count < 2 {
            return Err(QuestionError::TooFewOptions { number, count });
        }

        let options: Vec<String> = self
            .options
            .into_iter()
            .map(|option| option.trim().to_owned())
            .collect();
        if let Some(option) = options.iter().position(String::is_empty) {
            return Err(QuestionError::BlankOption {
                number,
                option: option + 1,
            });
        }

        if self.correct_option >= count {
            return Err(QuestionError::CorrectOutOfRange {
                number,
                correct: self.correct_option,
                count,
            });
        }

        Ok(Question {
            id,
            prompt,
            options,
            correct_option: self.correct_option,
        })
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A validated multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
    correct_option: usize,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn correct_option(&self) -> usize {
        self.correct_option
    }

    #[must_use]
    pub fn is_correct(&self, answer: Option<usize>) -> bool {
        answer == Some(self.correct_option)
    }
}

//
// ─── QUESTION SET ──────────────────────────────────────────────────────────────
//

/// Ordered, immutable sequence of questions loaded once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    questions: Vec<Question>,
}

impl QuestionSet {
    /// Validate drafts and assign ids from their position.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptySet` when no drafts are given, or the first
    /// validation failure of an individual question.
    pub fn new(drafts: Vec<QuestionDraft>) -> Result<Self, QuestionError> {
        if drafts.is_empty() {
            return Err(QuestionError::EmptySet);
        }

        let questions = drafts
            .into_iter()
            .enumerate()
            .map(|(position, draft)| draft.validate(QuestionId::new(position)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { questions })
    }

    /// Number of questions; always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }
}
