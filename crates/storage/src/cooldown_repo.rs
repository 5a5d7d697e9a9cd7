use std::sync::Arc;

use chrono::Duration;
use quiz_core::model::CooldownRecord;

use crate::layout::{
    COOLDOWN_END_KEY, SUBMISSION_KEY, decode_cooldown_end, decode_submission,
    encode_cooldown_end, encode_submission,
};
use crate::repository::{KeyValueStore, StorageError};

/// Typed access to the persisted cooldown record.
///
/// `quizCooldownEnd` decides whether a record exists; `quizSubmission` only
/// carries the snapshot shown while locked.
#[derive(Clone)]
pub struct CooldownStore {
    kv: Arc<dyn KeyValueStore>,
}

impl CooldownStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Load the persisted record, if any.
    ///
    /// An unreadable submission snapshot is dropped rather than failing the load.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the cooldown end is corrupt or
    /// out of range, or any backend error from the reads.
    pub async fn load(&self, cooldown: Duration) -> Result<Option<CooldownRecord>, StorageError> {
        let Some(raw_end) = self.kv.get(COOLDOWN_END_KEY).await? else {
            return Ok(None);
        };
        let ends_at = decode_cooldown_end(&raw_end)?;

        let snapshot = match self.kv.get(SUBMISSION_KEY).await? {
            Some(raw) => match decode_submission(&raw) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    tracing::warn!(error = %err, "dropping unreadable submission snapshot");
                    None
                }
            },
            None => None,
        };

        CooldownRecord::from_persisted(ends_at, snapshot, cooldown)
            .map(Some)
            .map_err(|err| {
                StorageError::Serialization(format!("invalid cooldown end {raw_end}: {err}"))
            })
    }

    /// Persist a record, snapshot first so a lock never points at a missing snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or either write fails.
    pub async fn save(&self, record: &CooldownRecord) -> Result<(), StorageError> {
        if let Some(snapshot) = record.snapshot() {
            let encoded = encode_submission(snapshot)?;
            self.kv.set(SUBMISSION_KEY, &encoded).await?;
        }
        self.kv
            .set(COOLDOWN_END_KEY, &encode_cooldown_end(record.ends_at()))
            .await
    }

    /// Remove both keys, attempting each even if the first delete fails.
    ///
    /// # Errors
    ///
    /// Returns the first `StorageError` encountered.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let end = self.kv.delete(COOLDOWN_END_KEY).await;
        let submission = self.kv.delete(SUBMISSION_KEY).await;
        end.and(submission)
    }
}
