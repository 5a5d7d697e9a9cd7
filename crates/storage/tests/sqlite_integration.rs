use std::sync::Arc;

use chrono::Duration;
use quiz_core::model::{CooldownRecord, SubmissionSnapshot};
use quiz_core::time::fixed_now;
use storage::layout::{COOLDOWN_END_KEY, SUBMISSION_KEY};
use storage::repository::{KeyValueStore, Storage};
use storage::sqlite::SqliteRepository;
use storage::CooldownStore;

#[tokio::test]
async fn sqlite_kv_overwrites_and_deletes() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_basic?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    // migrations are idempotent
    repo.migrate().await.expect("migrate twice");

    assert_eq!(repo.get("missing").await.unwrap(), None);

    repo.set("k", "first").await.unwrap();
    repo.set("k", "second").await.unwrap();
    assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("second"));

    repo.delete("k").await.unwrap();
    repo.delete("k").await.unwrap();
    assert_eq!(repo.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_persists_cooldown_layout() {
    let storage = Storage::sqlite("sqlite:file:memdb_kv_cooldown?mode=memory&cache=shared")
        .await
        .expect("storage");
    let store = CooldownStore::new(Arc::clone(&storage.kv));

    let snapshot = SubmissionSnapshot {
        answers: vec![Some(1), Some(0), Some(2), None],
        score: 3,
        submitted_at: fixed_now(),
        time_spent: Duration::seconds(75),
    };
    let record = CooldownRecord::new(snapshot, Duration::hours(2)).unwrap();
    store.save(&record).await.unwrap();

    assert_eq!(
        storage.kv.get(COOLDOWN_END_KEY).await.unwrap().as_deref(),
        Some("1700007200000")
    );
    assert_eq!(
        storage.kv.get(SUBMISSION_KEY).await.unwrap().as_deref(),
        Some(r#"{"answers":[1,0,2,null],"score":3,"timestamp":1700000000000,"timeSpent":75000}"#)
    );

    let loaded = store.load(Duration::hours(2)).await.unwrap();
    assert_eq!(loaded, Some(record));

    store.clear().await.unwrap();
    assert_eq!(storage.kv.get(SUBMISSION_KEY).await.unwrap(), None);
    assert_eq!(store.load(Duration::hours(2)).await.unwrap(), None);
}
