use crate::gate::GateStatus;

/// Aggregated view of the session, useful for a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizProgress {
    pub total: usize,
    pub answered: usize,
    pub current: Option<usize>,
    pub is_finished: bool,
    pub gate: GateStatus,
}
