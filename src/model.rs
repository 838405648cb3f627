use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Timestamp = DateTime<Utc>;

/// The ordered set of video-state records for one course. Record order is
/// preserved as written; the service never reorders a ledger.
pub type CourseLedger = Vec<VideoRecord>;

/// Opaque identifier of a video, unique within its course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One video's locally known state for one course.
///
/// `watched_at` is `Some` exactly when `watched` is true; both transitions
/// go through [`VideoRecord::mark`] and [`VideoRecord::clear`] to keep the
/// two fields in lockstep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: VideoId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    pub watched: bool,
    #[serde(default)]
    pub watched_at: Option<Timestamp>,
}

impl VideoRecord {
    pub fn unwatched(id: VideoId, title: Option<String>, video_url: Option<String>) -> Self {
        Self {
            id,
            title,
            video_url,
            watched: false,
            watched_at: None,
        }
    }

    /// Marks the record as watched. The timestamp is assigned only on the
    /// false-to-true transition; a redundant mark keeps the original one.
    pub fn mark(&mut self, at: Timestamp) {
        if !self.watched {
            self.watched = true;
            self.watched_at = Some(at);
        }
    }

    pub fn clear(&mut self) {
        self.watched = false;
        self.watched_at = None;
    }
}
