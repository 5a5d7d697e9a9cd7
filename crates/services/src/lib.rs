#![forbid(unsafe_code)]

pub mod error;
pub mod gate;
pub mod notify;
pub mod report;
pub mod sessions;

pub use quiz_core::Clock;

pub use error::{GateError, SessionError};
pub use gate::{
    GateConfig, GateState, GateStatus, Persistence, SubmissionGate, SubmissionReceipt,
    TickOutcome,
};
pub use notify::{Notice, NoticeLevel, Notifier, NullNotifier, PrintError, PrintSink};
pub use report::{ReportInput, ReportRenderer};
pub use sessions::{AnswerUpdate, FinishOutcome, Navigation, QuizProgress, QuizSession};
