use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::question::QuestionSet;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("question index {index} is out of range (questions: {count})")]
    QuestionOutOfRange { index: usize, count: usize },

    #[error("option {option} is out of range for question {index} (options: {count})")]
    OptionOutOfRange {
        index: usize,
        option: usize,
        count: usize,
    },

    #[error("snapshot has {got} answers but the question set has {expected}")]
    SnapshotMismatch { expected: usize, got: usize },

    #[error("attempt already finished")]
    Finished,
}

/// Result of moving forward through an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Moved to the given question index.
    Moved(usize),
    /// Already on the last question; the caller should finish the attempt.
    AtEnd,
}

//
// ─── ATTEMPT STATE ─────────────────────────────────────────────────────────────
//

/// One traversal of a question set.
///
/// `answers` always holds exactly one slot per question and `current_index`
/// always points at an existing question. Once finished, answers are frozen
/// but navigation stays available for review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptState {
    answers: Vec<Option<usize>>,
    current_index: usize,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl AttemptState {
    /// Start a fresh attempt with every slot unanswered.
    #[must_use]
    pub fn new(questions: &QuestionSet, started_at: DateTime<Utc>) -> Self {
        Self {
            answers: vec![None; questions.len()],
            current_index: 0,
            started_at: Some(started_at),
            finished_at: None,
        }
    }

    /// Rebuild a finished attempt from a persisted answer snapshot.
    ///
    /// Answers pointing past a question's options are dropped to "unanswered".
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::SnapshotMismatch` if the slot count does not
    /// match the question set.
    pub fn from_snapshot(
        questions: &QuestionSet,
        answers: &[Option<usize>],
        finished_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if answers.len() != questions.len() {
            return Err(AttemptError::SnapshotMismatch {
                expected: questions.len(),
                got: answers.len(),
            });
        }

        let answers = questions
            .iter()
            .zip(answers)
            .map(|(question, answer)| answer.filter(|option| *option < question.options().len()))
            .collect();

        Ok(Self {
            answers,
            current_index: 0,
            started_at: None,
            finished_at: Some(finished_at),
        })
    }

    #[must_use]
    pub fn answers(&self) -> &[Option<usize>] {
        &self.answers
    }

    #[must_use]
    pub fn answer(&self, index: usize) -> Option<usize> {
        self.answers.get(index).copied().flatten()
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|slot| slot.is_some()).count()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current_index + 1 == self.answers.len()
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Elapsed time between start and finish, when both are known.
    #[must_use]
    pub fn time_spent(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }

    /// Record (or overwrite) the selected option for a question.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Finished` once the attempt is frozen, or an
    /// out-of-range error without touching any slot.
    pub fn select(
        &mut self,
        questions: &QuestionSet,
        index: usize,
        option: usize,
    ) -> Result<(), AttemptError> {
        if self.is_finished() {
            return Err(AttemptError::Finished);
        }
        let question = questions
            .get(index)
            .filter(|_| index < self.answers.len())
            .ok_or(AttemptError::QuestionOutOfRange {
                index,
                count: self.answers.len(),
            })?;
        let count = question.options().len();
        if option >= count {
            return Err(AttemptError::OptionOutOfRange {
                index,
                option,
                count,
            });
        }

        self.answers[index] = Some(option);
        Ok(())
    }

    /// Move to the next question, or report that the end was reached.
    pub fn advance(&mut self) -> Step {
        if self.is_last() {
            Step::AtEnd
        } else {
            self.current_index += 1;
            Step::Moved(self.current_index)
        }
    }

    /// Move to the previous question, staying on the first one.
    pub fn retreat(&mut self) -> usize {
        self.current_index = self.current_index.saturating_sub(1);
        self.current_index
    }

    /// Jump straight to a question.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::QuestionOutOfRange` and leaves the position unchanged.
    pub fn go_to(&mut self, index: usize) -> Result<usize, AttemptError> {
        if index >= self.answers.len() {
            return Err(AttemptError::QuestionOutOfRange {
                index,
                count: self.answers.len(),
            });
        }
        self.current_index = index;
        Ok(index)
    }

    /// Freeze the attempt.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Finished` if it was already finished.
    pub fn finish(&mut self, at: DateTime<Utc>) -> Result<(), AttemptError> {
        if self.is_finished() {
            return Err(AttemptError::Finished);
        }
        self.finished_at = Some(at);
        Ok(())
    }
}
