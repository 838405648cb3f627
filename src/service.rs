use chrono::Utc;
use snafu::{OptionExt, ResultExt, Snafu};

use crate::model::{CourseLedger, VideoId, VideoRecord};
use crate::remote::{Remote, RemoteError};
use crate::retry::RetryPolicy;
use crate::store::{FileStore, StoreError};

pub type Result<T, E = WatchError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WatchError {
    #[snafu(display("video `{id}` is not known in course `{course}`"))]
    VideoNotFound { course: String, id: VideoId },

    #[snafu(display("failed to persist the local store: {source}"))]
    Persist { source: StoreError },

    #[snafu(display("failed to sync video `{id}` in course `{course}`: {source}"))]
    SyncVideo {
        course: String,
        id: VideoId,
        source: RemoteError,
    },
}

/// Result of a reconciliation sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The remote was not ready; nothing was attempted.
    Skipped,
    /// The sweep ran to completion. `failed` records stay locally ahead
    /// until a later sweep reaches them.
    Completed { pushed: usize, failed: usize },
}

/// Orchestrates the durable local store and the remote mirror.
///
/// Reads prefer the remote and fall back to the local ledger on any remote
/// failure. Writes are local-first: the durable local mutation completes
/// before any remote attempt, and the remote push is best-effort: its
/// failure is logged, never surfaced, and never rolls back the local state.
/// The deliberate cost is temporary local/remote divergence, repaired by
/// [`WatchStateService::reconcile`].
pub struct WatchStateService<R> {
    store: FileStore,
    remote: R,
    retry: RetryPolicy,
}

impl<R: Remote> WatchStateService<R> {
    pub fn new(store: FileStore, remote: R, retry: RetryPolicy) -> Self {
        Self {
            store,
            remote,
            retry,
        }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Returns the course's ledger, remote-first. Never fails: any remote
    /// error falls back to the locally known ledger, which may be empty.
    pub async fn get_videos(&self, course: &str) -> CourseLedger {
        match self
            .retry
            .run("fetch remote ledger", || self.remote.fetch_ledger(course))
            .await
        {
            Ok(ledger) => ledger,
            Err(error) => {
                tracing::warn!(course, error = %error, "remote unavailable, serving local ledger");
                self.store.ledger(course).await
            }
        }
    }

    /// Looks up one record, remote-first with local fallback. A record the
    /// remote does not know but the local store does is served locally.
    pub async fn get_video(&self, course: &str, id: &VideoId) -> Result<VideoRecord> {
        match self
            .retry
            .run("fetch remote ledger", || self.remote.fetch_ledger(course))
            .await
        {
            Ok(ledger) => {
                if let Some(record) = ledger.into_iter().find(|record| record.id == *id) {
                    return Ok(record);
                }
                tracing::debug!(course, %id, "video missing from remote ledger, checking local store");
            }
            Err(error) => {
                tracing::warn!(course, %id, error = %error, "remote unavailable, checking local store");
            }
        }

        self.store
            .find(course, id)
            .await
            .context(VideoNotFoundSnafu {
                course,
                id: id.clone(),
            })
    }

    /// Marks a video as watched, local-first.
    ///
    /// The local store is mutated and persisted before any remote attempt,
    /// unconditionally; once that completes the call succeeds regardless of
    /// remote health. The timestamp is assigned at the local mutation and
    /// that exact value is pushed remotely, so the two sides can never
    /// disagree on when the event happened.
    pub async fn mark_watched(&self, course: &str, id: &VideoId) -> Result<VideoRecord> {
        let record = self
            .store
            .mark_watched(course, id, Utc::now())
            .await
            .context(PersistSnafu)?;

        let watched_at = record.watched_at;
        let push = self
            .retry
            .run("push watched state", || {
                self.remote.push_state(course, id, true, watched_at)
            })
            .await;

        match push {
            Ok(()) => tracing::debug!(course, %id, "watched state pushed to remote"),
            Err(error) => {
                tracing::warn!(course, %id, error = %error, "remote write failed, deferring to reconciliation");
            }
        }

        Ok(record)
    }

    /// Pushes every locally known record's state to the remote, repairing
    /// drift. Update-only, so local-only records are skipped remotely and
    /// nothing is ever created or destroyed; running the sweep twice with
    /// no intervening writes pushes the same values twice. A failure on
    /// one record never aborts the rest.
    pub async fn reconcile(&self) -> ReconcileOutcome {
        if !self.remote.is_ready().await {
            tracing::info!("remote not ready, skipping reconciliation");
            return ReconcileOutcome::Skipped;
        }

        let mut pushed = 0;
        let mut failed = 0;

        for (course, ledger) in self.store.snapshot().await {
            for record in &ledger {
                let result = self
                    .retry
                    .run("reconcile record", || {
                        self.remote.push_state(
                            &course,
                            &record.id,
                            record.watched,
                            record.watched_at,
                        )
                    })
                    .await;

                match result {
                    Ok(()) => pushed += 1,
                    Err(error) => {
                        failed += 1;
                        tracing::warn!(
                            course,
                            id = %record.id,
                            error = %error,
                            "failed to reconcile record"
                        );
                    }
                }
            }
        }

        tracing::info!(pushed, failed, "reconciliation sweep finished");
        ReconcileOutcome::Completed { pushed, failed }
    }

    /// Clears the watched state of a whole course, local-first, then
    /// best-effort pushes the cleared state remotely.
    pub async fn reset_course(&self, course: &str) -> Result<usize> {
        let records = self
            .store
            .reset_course(course)
            .await
            .context(PersistSnafu)?;

        for record in &records {
            let push = self
                .retry
                .run("push cleared state", || {
                    self.remote.push_state(course, &record.id, false, None)
                })
                .await;
            if let Err(error) = push {
                tracing::warn!(course, id = %record.id, error = %error, "remote reset failed, deferring to reconciliation");
            }
        }

        tracing::info!(course, videos = records.len(), "reset watch status");
        Ok(records.len())
    }

    /// Force-pushes one record's current local state to the remote. Unlike
    /// the regular write path this is an explicit repair tool, so remote
    /// failure surfaces to the caller.
    pub async fn sync_video(&self, course: &str, id: &VideoId) -> Result<VideoRecord> {
        let record = self
            .store
            .find(course, id)
            .await
            .context(VideoNotFoundSnafu {
                course,
                id: id.clone(),
            })?;

        self.retry
            .run("force-sync video", || {
                self.remote
                    .push_state(course, id, record.watched, record.watched_at)
            })
            .await
            .context(SyncVideoSnafu {
                course,
                id: id.clone(),
            })?;

        tracing::info!(course, %id, "force-synced video to remote");
        Ok(record)
    }

    /// Registers a course's videos. Seeds the local store only when the
    /// course is locally unknown, then best-effort creates the records
    /// remotely. Returns the number of newly registered records.
    pub async fn register_course(&self, course: &str, records: CourseLedger) -> Result<usize> {
        let inserted = self
            .store
            .insert_course(course, records.clone())
            .await
            .context(PersistSnafu)?;

        if !inserted {
            tracing::info!(course, "course already registered locally, skipping");
            return Ok(0);
        }

        for record in &records {
            let create = self
                .retry
                .run("create remote record", || {
                    self.remote.create_record(course, record)
                })
                .await;
            if let Err(error) = create {
                tracing::warn!(course, id = %record.id, error = %error, "failed to create record remotely");
            }
        }

        tracing::info!(course, videos = records.len(), "registered course");
        Ok(records.len())
    }
}
