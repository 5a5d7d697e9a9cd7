//! Persisted key/value layout for quiz state.
//!
//! - `quizSubmission`: JSON `{ answers, score, timestamp, timeSpent }`, times in epoch ms.
//! - `quizCooldownEnd`: the cooldown end as a stringified epoch-ms integer.

use chrono::{DateTime, Duration, Utc};
use quiz_core::model::SubmissionSnapshot;
use quiz_core::time::{from_epoch_millis, to_epoch_millis};
use serde::{Deserialize, Serialize};

use crate::repository::StorageError;

pub const SUBMISSION_KEY: &str = "quizSubmission";
pub const COOLDOWN_END_KEY: &str = "quizCooldownEnd";

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSubmission {
    answers: Vec<Option<i64>>,
    score: i64,
    timestamp: i64,
    #[serde(default)]
    time_spent: i64,
}

/// Encode a submission snapshot as the `quizSubmission` value.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if an answer index does not fit the layout.
pub fn encode_submission(snapshot: &SubmissionSnapshot) -> Result<String, StorageError> {
    let answers = snapshot
        .answers
        .iter()
        .map(|slot| slot.map(i64::try_from).transpose().map_err(ser))
        .collect::<Result<Vec<_>, _>>()?;

    let persisted = PersistedSubmission {
        answers,
        score: i64::from(snapshot.score),
        timestamp: to_epoch_millis(snapshot.submitted_at),
        time_spent: snapshot.time_spent.num_milliseconds(),
    };
    serde_json::to_string(&persisted).map_err(ser)
}

/// Decode a `quizSubmission` value.
///
/// Negative answer indices are read as unanswered.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for malformed JSON, a negative score,
/// or a timestamp chrono cannot represent.
pub fn decode_submission(raw: &str) -> Result<SubmissionSnapshot, StorageError> {
    let persisted: PersistedSubmission = serde_json::from_str(raw).map_err(ser)?;

    let answers = persisted
        .answers
        .into_iter()
        .map(|slot| slot.and_then(|value| usize::try_from(value).ok()))
        .collect();
    let score = u32::try_from(persisted.score)
        .map_err(|_| StorageError::Serialization(format!("invalid score: {}", persisted.score)))?;
    let submitted_at = from_epoch_millis(persisted.timestamp).ok_or_else(|| {
        StorageError::Serialization(format!("invalid timestamp: {}", persisted.timestamp))
    })?;

    Ok(SubmissionSnapshot {
        answers,
        score,
        submitted_at,
        time_spent: Duration::milliseconds(persisted.time_spent.max(0)),
    })
}

/// Encode the cooldown end as the `quizCooldownEnd` value.
#[must_use]
pub fn encode_cooldown_end(ends_at: DateTime<Utc>) -> String {
    to_epoch_millis(ends_at).to_string()
}

/// Decode a `quizCooldownEnd` value, accepting a bare or JSON-quoted integer.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the value is not an epoch-ms integer.
pub fn decode_cooldown_end(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);
    let millis: i64 = digits
        .parse()
        .map_err(|_| StorageError::Serialization(format!("invalid cooldown end: {raw}")))?;
    from_epoch_millis(millis)
        .ok_or_else(|| StorageError::Serialization(format!("invalid cooldown end: {raw}")))
}
