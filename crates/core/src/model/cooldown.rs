use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CooldownError {
    #[error("cooldown duration must be positive")]
    NonPositiveDuration,
    #[error("cooldown window does not fit in the supported date range")]
    OutOfRange,
}

/// Longest accepted cooldown window (100 years).
pub const MAX_COOLDOWN_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// Check that a window is positive and no longer than `MAX_COOLDOWN_SECS`.
///
/// # Errors
///
/// Returns `CooldownError::NonPositiveDuration` or `CooldownError::OutOfRange`.
pub fn validate_window(cooldown: Duration) -> Result<Duration, CooldownError> {
    if cooldown <= Duration::zero() {
        return Err(CooldownError::NonPositiveDuration);
    }
    if cooldown.num_seconds() > MAX_COOLDOWN_SECS {
        return Err(CooldownError::OutOfRange);
    }
    Ok(cooldown)
}

/// What the user submitted, kept for review and reporting while locked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSnapshot {
    pub answers: Vec<Option<usize>>,
    pub score: u32,
    pub submitted_at: DateTime<Utc>,
    pub time_spent: Duration,
}

/// Proof of a completed attempt that bars new attempts until `ends_at`.
///
/// `ends_at` is fixed at creation and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownRecord {
    submitted_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    snapshot: Option<SubmissionSnapshot>,
}

impl CooldownRecord {
    /// Open a cooldown window for a fresh submission.
    ///
    /// # Errors
    ///
    /// Returns `CooldownError::NonPositiveDuration` for zero or negative windows,
    /// or `CooldownError::OutOfRange` if the window ends past the supported dates.
    pub fn new(snapshot: SubmissionSnapshot, cooldown: Duration) -> Result<Self, CooldownError> {
        let cooldown = validate_window(cooldown)?;
        let ends_at = snapshot
            .submitted_at
            .checked_add_signed(cooldown)
            .ok_or(CooldownError::OutOfRange)?;
        Ok(Self {
            submitted_at: snapshot.submitted_at,
            ends_at,
            snapshot: Some(snapshot),
        })
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// Without a snapshot the submission time is derived from the window length.
    ///
    /// # Errors
    ///
    /// Returns `CooldownError::OutOfRange` if that derived time is not representable.
    pub fn from_persisted(
        ends_at: DateTime<Utc>,
        snapshot: Option<SubmissionSnapshot>,
        cooldown: Duration,
    ) -> Result<Self, CooldownError> {
        let submitted_at = match &snapshot {
            Some(snapshot) => snapshot.submitted_at,
            None => ends_at
                .checked_sub_signed(cooldown)
                .ok_or(CooldownError::OutOfRange)?,
        };
        Ok(Self {
            submitted_at,
            ends_at,
            snapshot,
        })
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    #[must_use]
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<&SubmissionSnapshot> {
        self.snapshot.as_ref()
    }

    /// Time left in the window; zero or negative once it has elapsed.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.ends_at - now
    }

    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.ends_at
    }
}
