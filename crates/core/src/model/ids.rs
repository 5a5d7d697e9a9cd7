use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal identifier of a question within its set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionId(usize);

impl QuestionId {
    /// Creates a new `QuestionId`
    #[must_use]
    pub fn new(position: usize) -> Self {
        Self(position)
    }

    /// Returns the zero-based position of the question.
    #[must_use]
    pub fn position(&self) -> usize {
        self.0
    }

    /// Returns the one-based number shown to users.
    #[must_use]
    pub fn number(&self) -> usize {
        self.0 + 1
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}
