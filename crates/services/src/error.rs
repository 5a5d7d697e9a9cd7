//! Shared error types for the services crate.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use quiz_core::model::{AttemptError, CooldownError};
use quiz_core::time::format_duration;

use crate::notify::PrintError;

/// Errors emitted by `SubmissionGate`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GateError {
    #[error("quiz already submitted at {submitted_at}")]
    DuplicateSubmission { submitted_at: DateTime<Utc> },
    #[error("cooldown active for another {}", remaining_text(.remaining))]
    CooldownActive { remaining: Duration },
    #[error(transparent)]
    Cooldown(#[from] CooldownError),
}

fn remaining_text(remaining: &Duration) -> String {
    format_duration(*remaining)
}

/// Errors emitted by `QuizSession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no attempt in progress")]
    NoAttempt,
    #[error("no finished attempt to report")]
    NoReport,
    #[error(transparent)]
    OutOfRangeNavigation(AttemptError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Print(#[from] PrintError),
}
