use chrono::{DateTime, Duration, Utc};
use quiz_core::Clock;
use quiz_core::model::{CooldownError, CooldownRecord, SubmissionSnapshot, validate_window};
use storage::{CooldownStore, StorageError};

use crate::error::GateError;

/// Cooldown applied after every submission unless configured otherwise (2 hours).
pub const DEFAULT_COOLDOWN_SECS: i64 = 2 * 60 * 60;

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Gate policy.
///
/// `allow_locked_reset` lets `force_reset` clear an active cooldown. It exists
/// for local debugging and is off by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    cooldown: Duration,
    allow_locked_reset: bool,
}

impl GateConfig {
    /// # Errors
    ///
    /// Returns `CooldownError::NonPositiveDuration` for zero or negative windows,
    /// or `CooldownError::OutOfRange` past `MAX_COOLDOWN_SECS`.
    pub fn new(cooldown: Duration) -> Result<Self, CooldownError> {
        Ok(Self {
            cooldown: validate_window(cooldown)?,
            allow_locked_reset: false,
        })
    }

    #[must_use]
    pub fn with_locked_reset(mut self, allow: bool) -> Self {
        self.allow_locked_reset = allow;
        self
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    #[must_use]
    pub fn allow_locked_reset(&self) -> bool {
        self.allow_locked_reset
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::seconds(DEFAULT_COOLDOWN_SECS),
            allow_locked_reset: false,
        }
    }
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// No active cooldown; an attempt may start.
    Idle,
    /// An attempt is underway.
    InProgress,
    /// A submission is cooling down; new attempts are refused.
    Locked(CooldownRecord),
}

/// Point-in-time view of the gate, e.g. for a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Idle,
    InProgress,
    Locked { remaining: Duration },
}

/// Whether a write reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Saved,
    /// The store failed; the gate holds the state in memory only and a reload
    /// will lose it.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub record: CooldownRecord,
    pub persistence: Persistence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not locked; nothing to count down.
    Open,
    Locked { remaining: Duration },
    /// The cooldown elapsed on this tick; a retake is now possible.
    Unlocked,
}

//
// ─── GATE ──────────────────────────────────────────────────────────────────────
//

/// Cooldown state machine deciding whether a new attempt may begin.
///
/// Storage failures never abort an operation: they are logged, the in-memory
/// state still transitions, and the caller gets `Persistence::Unavailable`.
pub struct SubmissionGate {
    clock: Clock,
    config: GateConfig,
    store: CooldownStore,
    state: GateState,
}

impl SubmissionGate {
    #[must_use]
    pub fn new(clock: Clock, config: GateConfig, store: CooldownStore) -> Self {
        Self {
            clock,
            config,
            store,
            state: GateState::Idle,
        }
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    #[must_use]
    pub fn config(&self) -> GateConfig {
        self.config
    }

    #[must_use]
    pub fn state(&self) -> &GateState {
        &self.state
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self.state, GateState::Locked(_))
    }

    #[must_use]
    pub fn record(&self) -> Option<&CooldownRecord> {
        match &self.state {
            GateState::Locked(record) => Some(record),
            _ => None,
        }
    }

    /// Time left in the active window, if locked.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.record().map(|record| record.remaining(now))
    }

    #[must_use]
    pub fn status(&self) -> GateStatus {
        match &self.state {
            GateState::Idle => GateStatus::Idle,
            GateState::InProgress => GateStatus::InProgress,
            GateState::Locked(record) => GateStatus::Locked {
                remaining: record.remaining(self.clock.now()),
            },
        }
    }

    /// Reconcile with the persisted record after a (re)load.
    ///
    /// An active record locks the gate; an expired or unreadable one is
    /// cleared. With nothing persisted, or the store unreachable, the current
    /// state is kept.
    pub async fn check_on_load(&mut self) -> GateStatus {
        let now = self.clock.now();
        match self.store.load(self.config.cooldown).await {
            Ok(Some(record)) if record.is_active(now) => {
                tracing::info!(ends_at = %record.ends_at(), "cooldown active on load");
                self.state = GateState::Locked(record);
            }
            Ok(Some(record)) => {
                tracing::info!(ends_at = %record.ends_at(), "cooldown expired while away");
                self.clear_persisted().await;
                self.state = GateState::Idle;
            }
            Ok(None) => {}
            Err(StorageError::Serialization(err)) => {
                tracing::warn!(error = %err, "clearing unreadable cooldown record");
                self.clear_persisted().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "cooldown store unavailable on load");
            }
        }
        self.status()
    }

    /// Move from `Idle` to `InProgress`.
    ///
    /// A window that has ended but was not ticked yet is expired first.
    ///
    /// # Errors
    ///
    /// Returns `GateError::CooldownActive` while locked.
    pub async fn begin_attempt(&mut self) -> Result<(), GateError> {
        if let Some(remaining) = self.active_remaining().await {
            return Err(GateError::CooldownActive { remaining });
        }
        self.state = GateState::InProgress;
        Ok(())
    }

    /// Drop an unfinished attempt; nothing was persisted for it.
    pub fn abandon_attempt(&mut self) {
        if matches!(self.state, GateState::InProgress) {
            self.state = GateState::Idle;
        }
    }

    /// Open a cooldown window for a finished attempt.
    ///
    /// The record is written before the gate reports `Locked`. Calling this
    /// again while locked is refused and leaves the existing record untouched.
    ///
    /// # Errors
    ///
    /// Returns `GateError::DuplicateSubmission` while locked.
    pub async fn record_submission(
        &mut self,
        answers: Vec<Option<usize>>,
        score: u32,
        time_spent: Duration,
    ) -> Result<SubmissionReceipt, GateError> {
        if let Some(existing) = self.record() {
            tracing::warn!(
                submitted_at = %existing.submitted_at(),
                "refusing duplicate submission"
            );
            return Err(GateError::DuplicateSubmission {
                submitted_at: existing.submitted_at(),
            });
        }

        let snapshot = SubmissionSnapshot {
            answers,
            score,
            submitted_at: self.clock.now(),
            time_spent,
        };
        let record = CooldownRecord::new(snapshot, self.config.cooldown)?;

        let persistence = match self.store.save(&record).await {
            Ok(()) => Persistence::Saved,
            Err(err) => {
                tracing::warn!(error = %err, "cooldown kept in memory only");
                Persistence::Unavailable
            }
        };

        tracing::info!(
            score,
            ends_at = %record.ends_at(),
            "submission recorded"
        );
        self.state = GateState::Locked(record.clone());
        Ok(SubmissionReceipt {
            record,
            persistence,
        })
    }

    /// Count down an active window, unlocking once `now` reaches its end.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let Some(remaining) = self.remaining(now) else {
            return TickOutcome::Open;
        };
        if remaining > Duration::zero() {
            return TickOutcome::Locked { remaining };
        }

        tracing::info!("cooldown elapsed");
        self.clear_persisted().await;
        self.state = GateState::Idle;
        TickOutcome::Unlocked
    }

    /// Clear the persisted record and return to `Idle`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::CooldownActive` while locked, unless the config
    /// allows resetting a locked gate.
    pub async fn force_reset(&mut self) -> Result<Persistence, GateError> {
        if let Some(remaining) = self.active_remaining().await {
            if !self.config.allow_locked_reset {
                return Err(GateError::CooldownActive { remaining });
            }
            tracing::warn!("resetting an active cooldown");
        }

        let persistence = self.clear_persisted().await;
        self.state = GateState::Idle;
        Ok(persistence)
    }

    /// Time left in a still-active window; an elapsed one is cleared.
    async fn active_remaining(&mut self) -> Option<Duration> {
        let now = self.clock.now();
        match self.tick(now).await {
            TickOutcome::Locked { remaining } => Some(remaining),
            TickOutcome::Open | TickOutcome::Unlocked => None,
        }
    }

    async fn clear_persisted(&self) -> Persistence {
        match self.store.clear().await {
            Ok(()) => Persistence::Saved,
            Err(err) => {
                tracing::warn!(error = %err, "failed to clear cooldown record");
                Persistence::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use quiz_core::model::MAX_COOLDOWN_SECS;
    use quiz_core::time::fixed_now;
    use storage::InMemoryStore;
    use storage::layout::{COOLDOWN_END_KEY, SUBMISSION_KEY};
    use storage::repository::KeyValueStore;

    fn gate_with(kv: &InMemoryStore, clock: Clock) -> SubmissionGate {
        SubmissionGate::new(
            clock,
            GateConfig::default(),
            CooldownStore::new(Arc::new(kv.clone())),
        )
    }

    #[tokio::test]
    async fn submission_locks_for_fixed_window() {
        let kv = InMemoryStore::new();
        let mut gate = gate_with(&kv, Clock::fixed(fixed_now()));
        gate.begin_attempt().await.unwrap();

        let receipt = gate
            .record_submission(vec![Some(1)], 1, Duration::seconds(10))
            .await
            .unwrap();
        assert_eq!(receipt.persistence, Persistence::Saved);
        assert_eq!(receipt.record.ends_at(), fixed_now() + Duration::hours(2));
        assert!(gate.is_locked());
        assert_eq!(
            gate.status(),
            GateStatus::Locked {
                remaining: Duration::hours(2)
            }
        );
        assert!(kv.get(COOLDOWN_END_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn second_submission_is_refused_and_record_kept() {
        let kv = InMemoryStore::new();
        let mut gate = gate_with(&kv, Clock::fixed(fixed_now()));
        gate.record_submission(vec![Some(0)], 1, Duration::zero())
            .await
            .unwrap();
        let stored = kv.get(SUBMISSION_KEY).await.unwrap();

        gate.set_clock(Clock::fixed(fixed_now() + Duration::minutes(5)));
        let err = gate
            .record_submission(vec![Some(1)], 0, Duration::zero())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            GateError::DuplicateSubmission {
                submitted_at: fixed_now()
            }
        );
        assert_eq!(gate.record().unwrap().submitted_at(), fixed_now());
        assert_eq!(kv.get(SUBMISSION_KEY).await.unwrap(), stored);
        assert_eq!(kv.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn tick_unlocks_exactly_at_end() {
        let kv = InMemoryStore::new();
        let mut gate = gate_with(&kv, Clock::fixed(fixed_now()));
        let receipt = gate
            .record_submission(vec![None], 0, Duration::zero())
            .await
            .unwrap();
        let ends_at = receipt.record.ends_at();

        let outcome = gate.tick(ends_at - Duration::milliseconds(1)).await;
        assert_eq!(
            outcome,
            TickOutcome::Locked {
                remaining: Duration::milliseconds(1)
            }
        );
        assert!(gate.is_locked());

        assert_eq!(gate.tick(ends_at).await, TickOutcome::Unlocked);
        assert_eq!(gate.state(), &GateState::Idle);
        assert_eq!(kv.len().unwrap(), 0);
        assert_eq!(gate.tick(ends_at).await, TickOutcome::Open);
    }

    #[tokio::test]
    async fn check_on_load_restores_active_lock() {
        let kv = InMemoryStore::new();
        let mut first = gate_with(&kv, Clock::fixed(fixed_now()));
        first
            .record_submission(vec![Some(2)], 1, Duration::seconds(3))
            .await
            .unwrap();

        let mut reloaded = gate_with(&kv, Clock::fixed(fixed_now() + Duration::hours(1)));
        let status = reloaded.check_on_load().await;
        assert_eq!(
            status,
            GateStatus::Locked {
                remaining: Duration::hours(1)
            }
        );
        assert_eq!(
            reloaded.record().unwrap().snapshot().unwrap().answers,
            vec![Some(2)]
        );
        assert!(matches!(
            reloaded.begin_attempt().await,
            Err(GateError::CooldownActive { .. })
        ));
    }

    #[tokio::test]
    async fn check_on_load_clears_expired_record() {
        let kv = InMemoryStore::new();
        let mut first = gate_with(&kv, Clock::fixed(fixed_now()));
        first
            .record_submission(vec![None], 0, Duration::zero())
            .await
            .unwrap();

        let later = fixed_now() + Duration::hours(2) + Duration::seconds(1);
        let mut reloaded = gate_with(&kv, Clock::fixed(later));
        assert_eq!(reloaded.check_on_load().await, GateStatus::Idle);
        assert_eq!(kv.len().unwrap(), 0);
        assert!(reloaded.begin_attempt().await.is_ok());
    }

    #[tokio::test]
    async fn check_on_load_clears_corrupt_record() {
        let kv = InMemoryStore::new();
        kv.set(COOLDOWN_END_KEY, "garbage").await.unwrap();
        kv.set(SUBMISSION_KEY, "{}").await.unwrap();

        let mut gate = gate_with(&kv, Clock::fixed(fixed_now()));
        assert_eq!(gate.check_on_load().await, GateStatus::Idle);
        assert_eq!(kv.len().unwrap(), 0);
    }

    #[tokio::test]
    async fn force_reset_respects_lock_unless_allowed() {
        let kv = InMemoryStore::new();
        let mut gate = gate_with(&kv, Clock::fixed(fixed_now()));
        gate.record_submission(vec![None], 0, Duration::zero())
            .await
            .unwrap();

        assert!(matches!(
            gate.force_reset().await,
            Err(GateError::CooldownActive { .. })
        ));
        assert!(gate.is_locked());

        let mut lenient = SubmissionGate::new(
            Clock::fixed(fixed_now()),
            GateConfig::default().with_locked_reset(true),
            CooldownStore::new(Arc::new(kv.clone())),
        );
        lenient.check_on_load().await;
        assert!(lenient.is_locked());
        assert_eq!(lenient.force_reset().await, Ok(Persistence::Saved));
        assert_eq!(lenient.state(), &GateState::Idle);
        assert_eq!(kv.len().unwrap(), 0);
    }

    #[tokio::test]
    async fn abandon_returns_to_idle() {
        let kv = InMemoryStore::new();
        let mut gate = gate_with(&kv, Clock::fixed(fixed_now()));
        gate.begin_attempt().await.unwrap();
        assert_eq!(gate.status(), GateStatus::InProgress);
        gate.abandon_attempt();
        assert_eq!(gate.status(), GateStatus::Idle);
    }

    #[tokio::test]
    async fn elapsed_window_is_expired_before_a_new_attempt() {
        let kv = InMemoryStore::new();
        let mut gate = gate_with(&kv, Clock::fixed(fixed_now()));
        gate.record_submission(vec![None], 0, Duration::zero())
            .await
            .unwrap();

        gate.set_clock(Clock::fixed(
            fixed_now() + Duration::hours(2) + Duration::seconds(5),
        ));
        assert!(gate.is_locked());
        assert_eq!(gate.begin_attempt().await, Ok(()));
        assert_eq!(gate.status(), GateStatus::InProgress);
        assert_eq!(kv.len().unwrap(), 0);
    }

    #[tokio::test]
    async fn elapsed_window_does_not_block_reset() {
        let kv = InMemoryStore::new();
        let mut gate = gate_with(&kv, Clock::fixed(fixed_now()));
        gate.record_submission(vec![None], 0, Duration::zero())
            .await
            .unwrap();

        gate.set_clock(Clock::fixed(fixed_now() + Duration::hours(3)));
        assert_eq!(gate.force_reset().await, Ok(Persistence::Saved));
        assert_eq!(gate.state(), &GateState::Idle);
        assert_eq!(kv.len().unwrap(), 0);
    }

    #[tokio::test]
    async fn check_on_load_clears_end_at_min_date() {
        let kv = InMemoryStore::new();
        let min_millis = DateTime::<Utc>::MIN_UTC.timestamp_millis();
        kv.set(COOLDOWN_END_KEY, &min_millis.to_string()).await.unwrap();

        let mut gate = gate_with(&kv, Clock::fixed(fixed_now()));
        assert_eq!(gate.check_on_load().await, GateStatus::Idle);
        assert_eq!(kv.len().unwrap(), 0);
    }

    #[tokio::test]
    async fn huge_cooldown_is_rejected_up_front() {
        assert_eq!(
            GateConfig::new(Duration::seconds(10_000_000_000_000)),
            Err(CooldownError::OutOfRange)
        );
        assert_eq!(
            GateConfig::new(Duration::seconds(MAX_COOLDOWN_SECS + 1)),
            Err(CooldownError::OutOfRange)
        );

        let kv = InMemoryStore::new();
        let mut gate = SubmissionGate::new(
            Clock::fixed(DateTime::<Utc>::MAX_UTC - Duration::minutes(1)),
            GateConfig::default(),
            CooldownStore::new(Arc::new(kv.clone())),
        );
        assert_eq!(
            gate.record_submission(vec![None], 0, Duration::zero()).await,
            Err(GateError::Cooldown(CooldownError::OutOfRange))
        );
        assert!(!gate.is_locked());
        assert_eq!(kv.len().unwrap(), 0);
    }

    #[test]
    fn config_rejects_empty_cooldown() {
        assert_eq!(
            GateConfig::new(Duration::zero()),
            Err(CooldownError::NonPositiveDuration)
        );
        assert_eq!(
            GateConfig::new(Duration::minutes(1)).unwrap().cooldown(),
            Duration::minutes(1)
        );
    }
}
