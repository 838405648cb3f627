use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use tokio::sync::Mutex;

use crate::model::{CourseLedger, Timestamp, VideoId, VideoRecord};

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("failed to read the store file `{}`: {source}", path.display()))]
    ReadStore {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The backing file exists but cannot be parsed. This is fatal: loading
    /// an empty store over a corrupt file would look like data loss.
    #[snafu(display("store file `{}` is not valid JSON: {source}", path.display()))]
    CorruptStore {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("failed to create the store directory `{}`: {source}", path.display()))]
    CreateStoreDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to write the store file `{}`: {source}", path.display()))]
    WriteStore {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to serialize the store: {source}"))]
    SerializeStore { source: serde_json::Error },
}

type Courses = BTreeMap<String, CourseLedger>;

/// Durable local store: a key-ordered mapping from course name to its
/// ledger, backed by a single JSON file.
///
/// The whole document is loaded once at construction and rewritten in full
/// on every mutation. Mutations take the read-modify-write under one lock
/// (single-writer discipline) and persist before returning, so a completed
/// call survives a process restart even when the remote mirror is down.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    courses: Mutex<Courses>,
}

impl FileStore {
    /// Loads the store from `path`, creating the parent directory on first
    /// use. A missing file is an empty store; an unparseable one is a
    /// [`StoreError::CorruptStore`].
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .context(CreateStoreDirSnafu { path: dir })?;
        }

        let courses = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).context(CorruptStoreSnafu { path: &path })?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Courses::new(),
            Err(error) => return Err(error).context(ReadStoreSnafu { path: &path }),
        };

        tracing::debug!(courses = courses.len(), path = %path.display(), "loaded local store");

        Ok(Self {
            path,
            courses: Mutex::new(courses),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the course's ledger, empty if the course is unknown.
    pub async fn ledger(&self, course: &str) -> CourseLedger {
        let courses = self.courses.lock().await;
        courses.get(course).cloned().unwrap_or_default()
    }

    pub async fn find(&self, course: &str, id: &VideoId) -> Option<VideoRecord> {
        let courses = self.courses.lock().await;
        courses
            .get(course)?
            .iter()
            .find(|record| record.id == *id)
            .cloned()
    }

    /// A clone of the full mapping, for the reconciliation sweep.
    pub async fn snapshot(&self) -> Vec<(String, CourseLedger)> {
        let courses = self.courses.lock().await;
        courses
            .iter()
            .map(|(course, ledger)| (course.clone(), ledger.clone()))
            .collect()
    }

    /// Inserts the record if its id is absent, otherwise replaces it in
    /// place, preserving its position in the ledger. Persists before
    /// returning.
    pub async fn upsert(&self, course: &str, record: VideoRecord) -> Result<()> {
        let mut courses = self.courses.lock().await;
        let ledger = courses.entry(course.to_owned()).or_default();

        match ledger.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => ledger.push(record),
        }

        self.persist(&courses).await
    }

    /// Marks a video as watched and persists, all under the store lock.
    /// Inserts a bare record when the id is locally unknown. Returns the
    /// resulting record; a redundant mark keeps its original timestamp.
    pub async fn mark_watched(
        &self,
        course: &str,
        id: &VideoId,
        at: Timestamp,
    ) -> Result<VideoRecord> {
        let mut courses = self.courses.lock().await;
        let ledger = courses.entry(course.to_owned()).or_default();

        let record = match ledger.iter_mut().find(|record| record.id == *id) {
            Some(record) => {
                record.mark(at);
                record.clone()
            }
            None => {
                let mut record = VideoRecord::unwatched(id.clone(), None, None);
                record.mark(at);
                ledger.push(record.clone());
                record
            }
        };

        self.persist(&courses).await?;
        Ok(record)
    }

    /// Clears the watched state of every record in the course and persists.
    /// Returns the cleared records.
    pub async fn reset_course(&self, course: &str) -> Result<CourseLedger> {
        let mut courses = self.courses.lock().await;

        let records = match courses.get_mut(course) {
            Some(ledger) => {
                for record in ledger.iter_mut() {
                    record.clear();
                }
                ledger.clone()
            }
            None => return Ok(CourseLedger::new()),
        };

        self.persist(&courses).await?;
        Ok(records)
    }

    /// Seeds a course's ledger. Returns false without touching anything if
    /// the course already has records locally.
    pub async fn insert_course(&self, course: &str, records: CourseLedger) -> Result<bool> {
        let mut courses = self.courses.lock().await;

        if courses.get(course).is_some_and(|ledger| !ledger.is_empty()) {
            return Ok(false);
        }

        courses.insert(course.to_owned(), records);
        self.persist(&courses).await?;
        Ok(true)
    }

    /// Rewrites the whole backing file. The document is written to a
    /// sibling temp path and renamed over the target, so a crash mid-write
    /// leaves either the previous document or the new one, never a torn
    /// file.
    async fn persist(&self, courses: &Courses) -> Result<()> {
        let json = serde_json::to_vec_pretty(courses).context(SerializeStoreSnafu)?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .context(WriteStoreSnafu { path: &tmp })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .context(WriteStoreSnafu { path: &self.path })?;

        tracing::debug!(courses = courses.len(), path = %self.path.display(), "saved local store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    fn record(id: &str) -> VideoRecord {
        VideoRecord::unwatched(VideoId::from(id), Some(id.to_owned()), None)
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("watch-state.json");

        let store = FileStore::load(&path).await.unwrap();
        assert!(store.ledger("rust-bootcamp").await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch-state.json");
        std::fs::write(&path, b"{ this is not json").unwrap();

        let error = FileStore::load(&path).await.unwrap_err();
        assert!(matches!(error, StoreError::CorruptStore { .. }));
    }

    #[tokio::test]
    async fn mark_survives_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch-state.json");

        let store = FileStore::load(&path).await.unwrap();
        store
            .mark_watched("rust-bootcamp", &VideoId::from("lesson1"), Utc::now())
            .await
            .unwrap();
        drop(store);

        let reloaded = FileStore::load(&path).await.unwrap();
        let record = reloaded
            .find("rust-bootcamp", &VideoId::from("lesson1"))
            .await
            .unwrap();
        assert!(record.watched);
        assert!(record.watched_at.is_some());
    }

    #[tokio::test]
    async fn redundant_mark_keeps_the_first_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::load(dir.path().join("watch-state.json")).await.unwrap();
        let id = VideoId::from("lesson1");

        let first = Utc::now();
        store.mark_watched("course", &id, first).await.unwrap();
        let second = store
            .mark_watched("course", &id, first + chrono::Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(second.watched_at, Some(first));
    }

    #[tokio::test]
    async fn upsert_preserves_ledger_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::load(dir.path().join("watch-state.json")).await.unwrap();

        store
            .insert_course("course", vec![record("a"), record("b"), record("c")])
            .await
            .unwrap();

        let mut updated = record("b");
        updated.mark(Utc::now());
        store.upsert("course", updated).await.unwrap();

        let ids: Vec<_> = store
            .ledger("course")
            .await
            .into_iter()
            .map(|record| record.id.as_str().to_owned())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);

        let ledger = store.ledger("course").await;
        assert!(ledger[1].watched);
    }

    #[tokio::test]
    async fn insert_course_never_overwrites_existing_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::load(dir.path().join("watch-state.json")).await.unwrap();

        assert!(store.insert_course("course", vec![record("a")]).await.unwrap());
        assert!(!store.insert_course("course", vec![record("z")]).await.unwrap());

        let ledger = store.ledger("course").await;
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].id, VideoId::from("a"));
    }

    #[tokio::test]
    async fn reset_clears_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::load(dir.path().join("watch-state.json")).await.unwrap();

        store
            .insert_course("course", vec![record("a"), record("b")])
            .await
            .unwrap();
        store.mark_watched("course", &VideoId::from("a"), Utc::now()).await.unwrap();

        let cleared = store.reset_course("course").await.unwrap();
        assert_eq!(cleared.len(), 2);
        assert!(cleared.iter().all(|record| !record.watched));
        assert!(cleared.iter().all(|record| record.watched_at.is_none()));
    }

    #[tokio::test]
    async fn persist_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch-state.json");

        let store = FileStore::load(&path).await.unwrap();
        store
            .mark_watched("course", &VideoId::from("lesson1"), Utc::now())
            .await
            .unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }
}
