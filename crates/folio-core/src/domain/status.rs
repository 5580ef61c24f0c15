//! Publish status and status projection.
//!
//! The stored [`PostStatus`] is not always what a post "is": a scheduled post
//! whose date has passed reads as published, and a publish action has to pick
//! between publishing and scheduling based on the creation date. Everything
//! here is a pure function of `(status, date_created, now)`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored publish status of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PostStatus {
    #[default]
    #[serde(rename = "draft")]
    Draft,
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "publish")]
    Published,
    #[serde(rename = "private")]
    Private,
    #[serde(rename = "future")]
    Scheduled,
    #[serde(rename = "trash")]
    Trashed,
}

impl PostStatus {
    /// Remote wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Pending => "pending",
            PostStatus::Published => "publish",
            PostStatus::Private => "private",
            PostStatus::Scheduled => "future",
            PostStatus::Trashed => "trash",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown post status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for PostStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "pending" => Ok(PostStatus::Pending),
            "publish" => Ok(PostStatus::Published),
            "private" => Ok(PostStatus::Private),
            "future" => Ok(PostStatus::Scheduled),
            "trash" => Ok(PostStatus::Trashed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Statuses a user may assign directly while editing.
///
/// Private comes from visibility settings, Scheduled from a future date and
/// Trashed from a delete action, so none of them are listed.
pub const EDITABLE_STATUSES: [PostStatus; 3] =
    [PostStatus::Draft, PostStatus::Pending, PostStatus::Published];

pub fn editable_statuses() -> &'static [PostStatus] {
    &EDITABLE_STATUSES
}

/// True iff `date_created` is set and strictly after `now`.
pub fn is_future(date_created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    date_created.is_some_and(|created| created > now)
}

/// The status a "publish" action should assign for the given creation date.
pub fn publish_or_scheduled(date_created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> PostStatus {
    if is_future(date_created, now) {
        PostStatus::Scheduled
    } else {
        PostStatus::Published
    }
}

pub fn is_scheduled(
    status: PostStatus,
    date_created: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    status == PostStatus::Scheduled && is_future(date_created, now)
}

/// Effective status for display and submission decisions.
///
/// A scheduled post whose date is no longer in the future has gone live and
/// projects to [`PostStatus::Published`]. Every other status is returned as stored.
pub fn project(status: PostStatus, date_created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> PostStatus {
    match status {
        PostStatus::Scheduled if !is_future(date_created, now) => PostStatus::Published,
        other => other,
    }
}
