mod attempt;
mod cooldown;
mod ids;
mod question;

pub use attempt::{AttemptError, AttemptState, Step};
pub use cooldown::{
    CooldownError, CooldownRecord, MAX_COOLDOWN_SECS, SubmissionSnapshot, validate_window,
};
pub use ids::QuestionId;
pub use question::{Question, QuestionDraft, QuestionError, QuestionSet};
