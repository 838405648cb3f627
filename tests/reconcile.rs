//! End-to-end flow against the in-memory SurrealDB engine: register a
//! course, mark a video, force drift on the remote, reconcile it away.

use std::time::Duration;

use watchstate::model::{VideoId, VideoRecord};
use watchstate::remote::{Remote, SurrealRemote};
use watchstate::retry::RetryPolicy;
use watchstate::service::{ReconcileOutcome, WatchStateService};
use watchstate::store::FileStore;

async fn mem_remote() -> SurrealRemote {
    let database = surrealdb::engine::any::connect("mem://").await.unwrap();
    database.use_ns("test").use_db("test").await.unwrap();
    SurrealRemote::new(database, Duration::from_secs(2))
}

fn record(id: &str) -> VideoRecord {
    VideoRecord::unwatched(
        VideoId::from(id),
        Some(id.to_owned()),
        Some(format!("rust-bootcamp/{id}.mp4")),
    )
}

#[tokio::test]
async fn marked_state_converges_after_drift() {
    let course = "rust-bootcamp";
    let dir = tempfile::tempdir().unwrap();
    let remote = mem_remote().await;
    let store = FileStore::load(dir.path().join("watch-state.json"))
        .await
        .unwrap();
    let service = WatchStateService::new(
        store,
        remote.clone(),
        RetryPolicy::new(2, Duration::ZERO),
    );

    // registration seeds both sides
    let registered = service
        .register_course(course, vec![record("lesson1"), record("lesson2")])
        .await
        .unwrap();
    assert_eq!(registered, 2);

    let ledger = service.get_videos(course).await;
    assert_eq!(ledger.len(), 2);
    assert!(ledger.iter().all(|video| !video.watched));

    // marking writes locally and mirrors the same timestamp remotely
    let marked = service
        .mark_watched(course, &VideoId::from("lesson1"))
        .await
        .unwrap();

    let mirrored = remote.fetch_ledger(course).await.unwrap();
    let lesson1 = mirrored
        .iter()
        .find(|video| video.id == VideoId::from("lesson1"))
        .unwrap();
    assert!(lesson1.watched);
    assert_eq!(lesson1.watched_at, marked.watched_at);

    // an outside writer clobbers the remote copy
    remote
        .push_state(course, &VideoId::from("lesson1"), false, None)
        .await
        .unwrap();

    let outcome = service.reconcile().await;
    assert_eq!(outcome, ReconcileOutcome::Completed { pushed: 2, failed: 0 });

    let repaired = remote.fetch_ledger(course).await.unwrap();
    let lesson1 = repaired
        .iter()
        .find(|video| video.id == VideoId::from("lesson1"))
        .unwrap();
    assert!(lesson1.watched);
    assert_eq!(
        lesson1.watched_at, marked.watched_at,
        "reconciliation restores the original watch timestamp"
    );

    // a second sweep with no intervening writes is a no-op of consequence
    let outcome = service.reconcile().await;
    assert_eq!(outcome, ReconcileOutcome::Completed { pushed: 2, failed: 0 });
}

#[tokio::test]
async fn update_only_push_never_creates_remote_records() {
    let course = "rust-bootcamp";
    let remote = mem_remote().await;

    remote
        .push_state(course, &VideoId::from("ghost"), true, None)
        .await
        .unwrap();

    assert!(remote.fetch_ledger(course).await.unwrap().is_empty());
}

#[tokio::test]
async fn local_only_records_survive_a_sweep_unpushed() {
    // a video marked during an outage exists only locally; the sweep must
    // neither fail on it nor create it remotely
    let course = "rust-bootcamp";
    let dir = tempfile::tempdir().unwrap();
    let remote = mem_remote().await;
    let store = FileStore::load(dir.path().join("watch-state.json"))
        .await
        .unwrap();
    let service = WatchStateService::new(
        store,
        remote.clone(),
        RetryPolicy::new(2, Duration::ZERO),
    );

    service
        .mark_watched(course, &VideoId::from("offline-lesson"))
        .await
        .unwrap();

    let outcome = service.reconcile().await;
    assert_eq!(outcome, ReconcileOutcome::Completed { pushed: 1, failed: 0 });
    assert!(remote.fetch_ledger(course).await.unwrap().is_empty());
}
