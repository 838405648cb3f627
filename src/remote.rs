use std::future::Future;
use std::time::Duration;

use snafu::{ensure, ResultExt, Snafu};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Database;
use surrealdb::Surreal;
use url::Url;

use crate::config::SurrealConfig;
use crate::model::{CourseLedger, Timestamp, VideoId, VideoRecord};

pub type Result<T, E = RemoteError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RemoteError {
    #[snafu(display("remote connection is not ready"))]
    NotReady,

    #[snafu(display("remote call exceeded its {}ms deadline", timeout.as_millis()))]
    Deadline { timeout: Duration },

    #[snafu(display("failed to query the remote database: {source}"))]
    Query { source: surrealdb::Error },

    #[snafu(display("failed to deserialize the remote response: {source}"))]
    Deserialize { source: surrealdb::Error },

    #[snafu(display("cannot connect to the remote database `{url}`: {source}"))]
    Connection { url: Url, source: surrealdb::Error },
}

/// The remote mirror of the watch state, one collection per course.
///
/// `Ok` with an empty ledger and `Err` are distinct outcomes: an empty
/// course is a legitimate answer and must not trigger local fallback.
/// "Connection not ready" and "call failed" are deliberately collapsed
/// into the same error surface; callers never branch on which one it was.
pub trait Remote {
    /// Readiness predicate, consulted before every remote attempt.
    fn is_ready(&self) -> impl Future<Output = bool> + Send;

    fn fetch_ledger(&self, course: &str) -> impl Future<Output = Result<CourseLedger>> + Send;

    /// Pushes one record's watch state. Update-only: a record the remote
    /// does not know is left alone, never created.
    fn push_state(
        &self,
        course: &str,
        id: &VideoId,
        watched: bool,
        watched_at: Option<Timestamp>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Creates a record in the course's collection. Only registration uses
    /// this; the watch-state write path never creates remotely.
    fn create_record(
        &self,
        course: &str,
        record: &VideoRecord,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Connects, signs in and selects the configured namespace and database.
pub async fn connect(config: &SurrealConfig, timeout: Duration) -> Result<SurrealRemote> {
    let url = &config.endpoint;

    let database = surrealdb::engine::any::connect(url.as_str())
        .await
        .context(ConnectionSnafu { url: url.clone() })?;

    database
        .signin(Database {
            username: &config.username,
            password: &config.password,
            namespace: &config.namespace,
            database: &config.database,
        })
        .await
        .context(ConnectionSnafu { url: url.clone() })?;

    database
        .use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .context(ConnectionSnafu { url: url.clone() })?;

    tracing::info!(endpoint = %url, "connected to the remote database");

    Ok(SurrealRemote::new(database, timeout))
}

/// SurrealDB-backed [`Remote`]. Every call is capped by a per-operation
/// deadline so a hung remote cannot starve the caller's retry budget; a
/// deadline expiry counts as a plain failed attempt.
#[derive(Debug, Clone)]
pub struct SurrealRemote {
    database: Surreal<Any>,
    timeout: Duration,
}

impl SurrealRemote {
    pub fn new(database: Surreal<Any>, timeout: Duration) -> Self {
        Self { database, timeout }
    }

    async fn within_deadline<T>(&self, future: impl Future<Output = T>) -> Result<T> {
        tokio::time::timeout(self.timeout, future)
            .await
            .map_err(|_| {
                DeadlineSnafu {
                    timeout: self.timeout,
                }
                .build()
            })
    }
}

impl Remote for SurrealRemote {
    async fn is_ready(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, self.database.health()).await,
            Ok(Ok(()))
        )
    }

    async fn fetch_ledger(&self, course: &str) -> Result<CourseLedger> {
        ensure!(self.is_ready().await, NotReadySnafu);

        let query = self
            .database
            .query(
                "SELECT meta::id(id) AS id, title, video_url, watched, watched_at \
                 FROM type::table($table)",
            )
            .bind(("table", course.to_owned()));

        let mut response = self
            .within_deadline(async move { query.await })
            .await?
            .context(QuerySnafu)?;

        let ledger: CourseLedger = response.take(0).context(DeserializeSnafu)?;
        tracing::debug!(course, videos = ledger.len(), "fetched remote ledger");
        Ok(ledger)
    }

    async fn push_state(
        &self,
        course: &str,
        id: &VideoId,
        watched: bool,
        watched_at: Option<Timestamp>,
    ) -> Result<()> {
        ensure!(self.is_ready().await, NotReadySnafu);

        let query = self
            .database
            .query(
                "UPDATE type::table($table) \
                 SET watched = $watched, watched_at = $watched_at \
                 WHERE meta::id(id) = $video \
                 RETURN NONE",
            )
            .bind(("table", course.to_owned()))
            .bind(("video", id.to_string()))
            .bind(("watched", watched))
            .bind(("watched_at", watched_at));

        let response = self
            .within_deadline(async move { query.await })
            .await?
            .context(QuerySnafu)?;
        response.check().context(QuerySnafu)?;

        tracing::debug!(course, %id, watched, "pushed watch state to remote");
        Ok(())
    }

    async fn create_record(&self, course: &str, record: &VideoRecord) -> Result<()> {
        ensure!(self.is_ready().await, NotReadySnafu);

        let query = self
            .database
            .query(
                "CREATE type::thing($table, $video) \
                 SET title = $title, video_url = $video_url, \
                     watched = $watched, watched_at = $watched_at",
            )
            .bind(("table", course.to_owned()))
            .bind(("video", record.id.to_string()))
            .bind(("title", record.title.clone()))
            .bind(("video_url", record.video_url.clone()))
            .bind(("watched", record.watched))
            .bind(("watched_at", record.watched_at));

        let response = self
            .within_deadline(async move { query.await })
            .await?
            .context(QuerySnafu)?;
        response.check().context(QuerySnafu)?;

        tracing::debug!(course, id = %record.id, "created remote record");
        Ok(())
    }
}
