use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use quiz_core::Clock;
use quiz_core::model::{AttemptError, AttemptState, CooldownRecord, Question, QuestionSet, Step};
use quiz_core::scoring::ScoreCard;
use quiz_core::time::format_duration;

use super::progress::QuizProgress;
use crate::error::{GateError, SessionError};
use crate::gate::{GateStatus, Persistence, SubmissionGate, SubmissionReceipt, TickOutcome};
use crate::notify::{Notice, Notifier, PrintSink};
use crate::report::{ReportInput, ReportRenderer};

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Result of selecting an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerUpdate {
    Recorded,
    /// The attempt is frozen (submitted or cooling down); nothing changed.
    Ignored,
}

/// Result of a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishOutcome {
    pub score: ScoreCard,
    pub receipt: SubmissionReceipt,
}

/// Result of moving forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Moved(usize),
    /// Already on the last question of a frozen attempt.
    Stayed(usize),
    /// Advancing past the last question submitted the attempt.
    Finished(FinishOutcome),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Drives one quiz: the current attempt plus the submission gate guarding it.
///
/// The question set is shared and never mutated. All time comes from the
/// gate's clock.
pub struct QuizSession {
    questions: Arc<QuestionSet>,
    gate: SubmissionGate,
    attempt: Option<AttemptState>,
    notifier: Arc<dyn Notifier>,
    renderer: ReportRenderer,
}

impl QuizSession {
    #[must_use]
    pub fn new(
        questions: Arc<QuestionSet>,
        gate: SubmissionGate,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            questions,
            gate,
            attempt: None,
            notifier,
            renderer: ReportRenderer::default(),
        }
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: ReportRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn set_clock(&mut self, clock: Clock) {
        self.gate.set_clock(clock);
    }

    #[must_use]
    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    #[must_use]
    pub fn gate(&self) -> &SubmissionGate {
        &self.gate
    }

    #[must_use]
    pub fn attempt(&self) -> Option<&AttemptState> {
        self.attempt.as_ref()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        let attempt = self.attempt.as_ref()?;
        self.questions.get(attempt.current_index())
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        QuizProgress {
            total: self.questions.len(),
            answered: self.attempt.as_ref().map_or(0, AttemptState::answered_count),
            current: self.attempt.as_ref().map(AttemptState::current_index),
            is_finished: self.attempt.as_ref().is_some_and(AttemptState::is_finished),
            gate: self.gate.status(),
        }
    }

    /// Reconcile with persisted state; while locked, the submitted answers are
    /// restored so they can be reviewed and printed.
    pub async fn load(&mut self) -> GateStatus {
        let status = self.gate.check_on_load().await;
        if let Some(snapshot) = self.gate.record().and_then(CooldownRecord::snapshot) {
            match AttemptState::from_snapshot(
                &self.questions,
                &snapshot.answers,
                snapshot.submitted_at,
            ) {
                Ok(restored) => self.attempt = Some(restored),
                Err(err) => {
                    tracing::warn!(error = %err, "submitted answers do not match question set");
                }
            }
        }
        status
    }

    /// Start a fresh attempt once the user has seen the exam notice.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Gate` while a cooldown is active.
    pub async fn acknowledge_notice(&mut self) -> Result<&AttemptState, SessionError> {
        if let Err(err) = self.gate.begin_attempt().await {
            if let GateError::CooldownActive { remaining } = &err {
                self.notifier.notify(Notice::error(format!(
                    "You can retake the quiz in {}.",
                    format_duration(*remaining)
                )));
            }
            return Err(err.into());
        }

        let attempt = AttemptState::new(&self.questions, self.gate.clock().now());
        tracing::info!(questions = self.questions.len(), "attempt started");
        let attempt: &AttemptState = self.attempt.insert(attempt);
        Ok(attempt)
    }

    /// Drop an unfinished attempt, e.g. when navigating away.
    pub fn abandon(&mut self) {
        if self.attempt.as_ref().is_some_and(|a| !a.is_finished()) {
            self.attempt = None;
            self.gate.abandon_attempt();
        }
    }

    /// Select (or change) the answer for a question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoAttempt` before an attempt starts, or
    /// `SessionError::OutOfRangeNavigation` for a bad question/option index.
    pub fn select_answer(
        &mut self,
        index: usize,
        option: usize,
    ) -> Result<AnswerUpdate, SessionError> {
        if self.gate.is_locked() {
            return Ok(AnswerUpdate::Ignored);
        }
        let attempt = self.attempt.as_mut().ok_or(SessionError::NoAttempt)?;
        match attempt.select(&self.questions, index, option) {
            Ok(()) => Ok(AnswerUpdate::Recorded),
            Err(AttemptError::Finished) => Ok(AnswerUpdate::Ignored),
            Err(err) => Err(SessionError::OutOfRangeNavigation(err)),
        }
    }

    /// Select an answer for the question currently shown.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::select_answer`].
    pub fn answer_current(&mut self, option: usize) -> Result<AnswerUpdate, SessionError> {
        let index = self
            .attempt
            .as_ref()
            .map(AttemptState::current_index)
            .ok_or(SessionError::NoAttempt)?;
        self.select_answer(index, option)
    }

    /// Move to the next question; on the last one this submits the attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoAttempt`, or any error from [`QuizSession::finish`].
    pub async fn advance(&mut self) -> Result<Navigation, SessionError> {
        let attempt = self.attempt.as_mut().ok_or(SessionError::NoAttempt)?;
        match attempt.advance() {
            Step::Moved(index) => Ok(Navigation::Moved(index)),
            Step::AtEnd if attempt.is_finished() => {
                Ok(Navigation::Stayed(attempt.current_index()))
            }
            Step::AtEnd => self.finish().await.map(Navigation::Finished),
        }
    }

    /// Move to the previous question, staying on the first one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoAttempt` before an attempt starts.
    pub fn retreat(&mut self) -> Result<usize, SessionError> {
        let attempt = self.attempt.as_mut().ok_or(SessionError::NoAttempt)?;
        Ok(attempt.retreat())
    }

    /// Jump to a question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRangeNavigation` if `index` is past the end.
    pub fn go_to(&mut self, index: usize) -> Result<usize, SessionError> {
        let attempt = self.attempt.as_mut().ok_or(SessionError::NoAttempt)?;
        attempt
            .go_to(index)
            .map_err(SessionError::OutOfRangeNavigation)
    }

    /// Freeze the attempt, score it and open the cooldown window.
    ///
    /// The attempt is frozen before the cooldown record is written, and the
    /// write completes before this returns.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Gate(GateError::DuplicateSubmission)` if this
    /// attempt was already submitted, or `SessionError::NoAttempt`.
    pub async fn finish(&mut self) -> Result<FinishOutcome, SessionError> {
        if let Some(record) = self.gate.record() {
            let submitted_at = record.submitted_at();
            return Err(self.refuse_duplicate(submitted_at));
        }

        let now = self.gate.clock().now();
        let attempt = self.attempt.as_mut().ok_or(SessionError::NoAttempt)?;
        if attempt.finish(now).is_err() {
            let submitted_at = attempt.finished_at().unwrap_or(now);
            return Err(self.refuse_duplicate(submitted_at));
        }

        let score = ScoreCard::compute(&self.questions, attempt.answers());
        let answers = attempt.answers().to_vec();
        let time_spent = attempt.time_spent().unwrap_or_else(Duration::zero);

        let receipt = match self
            .gate
            .record_submission(answers, score.score, time_spent)
            .await
        {
            Ok(receipt) => receipt,
            Err(err) => {
                self.notifier.notify(Notice::error(err.to_string()));
                return Err(err.into());
            }
        };

        self.notifier.notify(Notice::success(format!(
            "Quiz submitted: {}/{} ({}%, grade {}).",
            score.score, score.total, score.percentage, score.grade
        )));
        if receipt.persistence == Persistence::Unavailable {
            self.notifier.notify(Notice::error(
                "Your submission could not be saved on this device; reloading will lose it.",
            ));
        }

        Ok(FinishOutcome { score, receipt })
    }

    fn refuse_duplicate(&self, submitted_at: DateTime<Utc>) -> SessionError {
        self.notifier
            .notify(Notice::error("This quiz has already been submitted."));
        GateError::DuplicateSubmission { submitted_at }.into()
    }

    /// Poll the cooldown using the gate's clock.
    pub async fn tick(&mut self) -> TickOutcome {
        let now = self.gate.clock().now();
        self.tick_at(now).await
    }

    /// Poll the cooldown at an explicit time.
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let outcome = self.gate.tick(now).await;
        if outcome == TickOutcome::Unlocked {
            self.notifier
                .notify(Notice::info("Cooldown finished. You can retake the quiz."));
        }
        outcome
    }

    /// Clear any stored submission and drop the current attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Gate` while the cooldown is still active (unless
    /// the gate allows locked resets).
    pub async fn reset(&mut self) -> Result<Persistence, SessionError> {
        match self.gate.force_reset().await {
            Ok(persistence) => {
                self.attempt = None;
                Ok(persistence)
            }
            Err(err) => {
                self.notifier.notify(Notice::error(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Reset, then start a fresh attempt.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::reset`].
    pub async fn restart(&mut self) -> Result<&AttemptState, SessionError> {
        self.reset().await?;
        self.acknowledge_notice().await
    }

    /// Score of the finished (or restored) attempt.
    #[must_use]
    pub fn score_card(&self) -> Option<ScoreCard> {
        let attempt = self.attempt.as_ref().filter(|a| a.is_finished())?;
        Some(ScoreCard::compute(&self.questions, attempt.answers()))
    }

    /// Render the printable report for the finished attempt.
    #[must_use]
    pub fn report(&self) -> Option<String> {
        let attempt = self.attempt.as_ref().filter(|a| a.is_finished())?;
        let score = ScoreCard::compute(&self.questions, attempt.answers());
        let snapshot = self.gate.record().and_then(CooldownRecord::snapshot);
        let input = ReportInput {
            questions: &self.questions,
            attempt,
            score: &score,
            submitted_at: snapshot
                .map(|s| s.submitted_at)
                .or_else(|| attempt.finished_at()),
            time_spent: snapshot
                .map(|s| s.time_spent)
                .or_else(|| attempt.time_spent()),
        };
        Some(self.renderer.render(&input))
    }

    /// Hand the report to a print/export facility.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoReport` before any attempt is finished, or
    /// `SessionError::Print` if the sink fails.
    pub fn print_report(&self, sink: &dyn PrintSink) -> Result<(), SessionError> {
        let document = self.report().ok_or(SessionError::NoReport)?;
        if let Err(err) = sink.print(self.renderer.title(), &document) {
            self.notifier
                .notify(Notice::error(format!("Could not print the report: {err}")));
            return Err(err.into());
        }
        Ok(())
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("questions_len", &self.questions.len())
            .field("gate", self.gate.state())
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateConfig;
    use crate::notify::{NoticeLevel, RecordingNotifier};
    use quiz_core::model::QuestionDraft;
    use quiz_core::scoring::Grade;
    use quiz_core::time::fixed_now;
    use storage::{CooldownStore, InMemoryStore};

    fn questions() -> Arc<QuestionSet> {
        let drafts = [1, 0, 2, 3]
            .into_iter()
            .enumerate()
            .map(|(i, correct)| {
                QuestionDraft::new(format!("Question {i}"), ["a", "b", "c", "d"], correct)
            })
            .collect();
        Arc::new(QuestionSet::new(drafts).unwrap())
    }

    fn session(kv: &InMemoryStore) -> (QuizSession, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let gate = SubmissionGate::new(
            Clock::fixed(fixed_now()),
            GateConfig::default(),
            CooldownStore::new(Arc::new(kv.clone())),
        );
        let session = QuizSession::new(questions(), gate, notifier.clone());
        (session, notifier)
    }

    #[test]
    fn answers_require_an_attempt() {
        let (mut session, _) = session(&InMemoryStore::new());
        assert!(matches!(
            session.select_answer(0, 0),
            Err(SessionError::NoAttempt)
        ));
        assert!(matches!(session.retreat(), Err(SessionError::NoAttempt)));
    }

    #[tokio::test]
    async fn out_of_range_selection_is_rejected() {
        let (mut session, _) = session(&InMemoryStore::new());
        session.acknowledge_notice().await.unwrap();
        session.select_answer(0, 1).unwrap();

        assert!(matches!(
            session.select_answer(4, 0),
            Err(SessionError::OutOfRangeNavigation(_))
        ));
        assert!(matches!(
            session.select_answer(1, 9),
            Err(SessionError::OutOfRangeNavigation(_))
        ));
        assert!(matches!(
            session.go_to(4),
            Err(SessionError::OutOfRangeNavigation(_))
        ));
        assert_eq!(
            session.attempt().unwrap().answers(),
            &[Some(1), None, None, None]
        );
    }

    #[tokio::test]
    async fn advancing_past_last_question_finishes() {
        let (mut session, notifier) = session(&InMemoryStore::new());
        session.acknowledge_notice().await.unwrap();

        for option in [1, 0, 2] {
            assert_eq!(session.answer_current(option).unwrap(), AnswerUpdate::Recorded);
            assert!(matches!(session.advance().await.unwrap(), Navigation::Moved(_)));
        }

        let Navigation::Finished(outcome) = session.advance().await.unwrap() else {
            panic!("expected the attempt to finish");
        };
        assert_eq!(outcome.score.score, 3);
        assert_eq!(outcome.score.percentage, 75);
        assert_eq!(outcome.score.grade, Grade::B);
        assert!(session.gate().is_locked());

        let notices = notifier.notices();
        assert_eq!(notices.last().unwrap().level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn answers_are_frozen_while_locked() {
        let (mut session, _) = session(&InMemoryStore::new());
        session.acknowledge_notice().await.unwrap();
        session.select_answer(0, 1).unwrap();
        session.finish().await.unwrap();

        assert_eq!(session.select_answer(0, 3).unwrap(), AnswerUpdate::Ignored);
        assert_eq!(
            session.attempt().unwrap().answers(),
            &[Some(1), None, None, None]
        );
        assert_eq!(session.retreat().unwrap(), 0);
    }

    #[tokio::test]
    async fn locked_session_refuses_new_attempt() {
        let (mut session, notifier) = session(&InMemoryStore::new());
        session.acknowledge_notice().await.unwrap();
        session.finish().await.unwrap();

        let err = session.acknowledge_notice().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Gate(GateError::CooldownActive { .. })
        ));
        assert_eq!(
            notifier.notices().last().unwrap(),
            &Notice::error("You can retake the quiz in 2h 00m 00s.")
        );
    }

    #[tokio::test]
    async fn restart_after_unlock_starts_clean() {
        let (mut session, notifier) = session(&InMemoryStore::new());
        session.acknowledge_notice().await.unwrap();
        session.select_answer(2, 2).unwrap();
        session.finish().await.unwrap();

        let later = fixed_now() + Duration::hours(2);
        session.set_clock(Clock::fixed(later));
        assert_eq!(session.tick().await, TickOutcome::Unlocked);
        assert_eq!(
            notifier.notices().last().unwrap().level,
            NoticeLevel::Info
        );

        let attempt = session.restart().await.unwrap();
        assert_eq!(attempt.answers(), &[None, None, None, None]);
        assert_eq!(attempt.started_at(), Some(later));
    }

    #[tokio::test]
    async fn elapsed_cooldown_allows_retake_without_a_tick() {
        let (mut session, notifier) = session(&InMemoryStore::new());
        session.acknowledge_notice().await.unwrap();
        session.finish().await.unwrap();

        let later = fixed_now() + Duration::hours(2) + Duration::seconds(5);
        session.set_clock(Clock::fixed(later));
        let attempt = session.acknowledge_notice().await.unwrap();
        assert_eq!(attempt.started_at(), Some(later));
        assert!(!session.gate().is_locked());
        assert!(
            notifier
                .notices()
                .iter()
                .all(|notice| !notice.message.starts_with("You can retake"))
        );

        session.finish().await.unwrap();
        session.set_clock(Clock::fixed(later + Duration::hours(3)));
        let attempt = session.restart().await.unwrap();
        assert_eq!(attempt.answers(), &[None, None, None, None]);
    }

    #[tokio::test]
    async fn abandon_drops_unfinished_attempt() {
        let (mut session, _) = session(&InMemoryStore::new());
        session.acknowledge_notice().await.unwrap();
        session.abandon();
        assert!(session.attempt().is_none());
        assert_eq!(session.progress().gate, GateStatus::Idle);
    }
}
