use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::media::{CommentId, MediaId, MediaKind};
use super::status::{self, PostStatus};
use crate::legacy::{ConfirmedChanges, RemoteStatus};
use crate::ports::MediaCatalog;

/// Stable local identifier of a post record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub Uuid);

impl PostId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<PostId> for Uuid {
    fn from(id: PostId) -> Self {
        id.0
    }
}

/// Kind of content item. Selects the change detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    #[default]
    Post,
    Page,
}

impl PostKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PostKind::Post => "post",
            PostKind::Page => "page",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown post kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for PostKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(PostKind::Post),
            "page" => Ok(PostKind::Page),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// What is known about the server copy of a post.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteInfo {
    /// Server ID. Absent until the post is first uploaded.
    pub post_id: Option<i64>,
    /// When the local record last matched the server.
    pub synced_at: Option<DateTime<Utc>>,
    /// Server revision IDs known locally, oldest first.
    pub revisions: Vec<i64>,
    /// Latest revision ID the server reported.
    pub server_revision: Option<i64>,
}

impl RemoteInfo {
    pub fn has_remote(&self) -> bool {
        self.post_id.is_some_and(|id| id > 0)
    }

    pub fn latest_known_revision(&self) -> Option<i64> {
        self.revisions.iter().copied().max()
    }
}

/// Every field copied between an original and its revision.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostFields {
    pub kind: PostKind,
    pub blog_id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub status: PostStatus,
    pub date_created: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
    /// Deduplicates posts created offline before a server ID exists.
    pub foreign_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub categories: BTreeSet<String>,
    pub media: BTreeSet<MediaId>,
    pub comments: BTreeSet<CommentId>,
    pub featured_image: Option<MediaId>,
    pub path_for_display_image: Option<String>,
    pub remote: RemoteInfo,
    pub auto_upload_attempts_count: u32,
    pub should_attempt_auto_upload: bool,
    pub meta_is_local: bool,
    pub meta_publish_immediately: bool,
}

/// Snapshot of revision content the user explicitly committed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutosaveSnapshot {
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub title: Option<String>,
    pub modified_date: Option<DateTime<Utc>>,
    pub identifier: Option<i64>,
}

impl AutosaveSnapshot {
    pub fn of(fields: &PostFields, at: DateTime<Utc>, identifier: Option<i64>) -> Self {
        Self {
            content: Some(fields.content.clone()),
            excerpt: Some(fields.excerpt.clone()),
            title: Some(fields.title.clone()),
            modified_date: Some(at),
            identifier,
        }
    }
}

/// Post entity - a content item in either its original or revision form.
///
/// `original` and `revision` are ID lookups into the owning
/// [`PostGraph`](super::PostGraph), which keeps them symmetric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub fields: PostFields,
    pub original: Option<PostId>,
    pub revision: Option<PostId>,
    pub autosave: Option<AutosaveSnapshot>,
    pub confirmed_changes: Option<ConfirmedChanges>,
    pub remote_status: RemoteStatus,
}

impl Post {
    /// Create a record around the given fields.
    pub fn new(fields: PostFields) -> Self {
        Self {
            id: PostId::new(),
            fields,
            original: None,
            revision: None,
            autosave: None,
            confirmed_changes: None,
            remote_status: RemoteStatus::Local,
        }
    }

    /// Create a new local draft that has never been uploaded.
    pub fn new_local(kind: PostKind, blog_id: Uuid, now: DateTime<Utc>) -> Self {
        Self::new(PostFields {
            kind,
            blog_id,
            date_modified: Some(now),
            foreign_id: Some(Uuid::new_v4()),
            meta_is_local: true,
            ..PostFields::default()
        })
    }

    pub fn is_revision(&self) -> bool {
        self.original.is_some()
    }

    pub fn is_original(&self) -> bool {
        !self.is_revision()
    }

    pub fn has_revision(&self) -> bool {
        self.revision.is_some()
    }

    pub fn has_remote(&self) -> bool {
        self.fields.remote.has_remote()
    }

    pub fn is_draft(&self) -> bool {
        self.fields.status == PostStatus::Draft
    }

    pub fn is_published(&self) -> bool {
        self.fields.status == PostStatus::Published
    }

    pub fn is_scheduled_at(&self, now: DateTime<Utc>) -> bool {
        status::is_scheduled(self.fields.status, self.fields.date_created, now)
    }

    pub fn is_scheduled(&self) -> bool {
        self.is_scheduled_at(Utc::now())
    }

    /// The status a publish action should assign, ignoring the stored status.
    pub fn available_status_for_publish_or_scheduled_at(&self, now: DateTime<Utc>) -> PostStatus {
        status::publish_or_scheduled(self.fields.date_created, now)
    }

    pub fn available_status_for_publish_or_scheduled(&self) -> PostStatus {
        self.available_status_for_publish_or_scheduled_at(Utc::now())
    }

    pub fn available_statuses_for_editing(&self) -> &'static [PostStatus] {
        status::editable_statuses()
    }

    pub fn projected_status_at(&self, now: DateTime<Utc>) -> PostStatus {
        status::project(self.fields.status, self.fields.date_created, now)
    }

    pub fn has_categories(&self) -> bool {
        !self.fields.categories.is_empty()
    }

    pub fn has_tags(&self) -> bool {
        self.fields.tags.iter().any(|tag| !tag.trim().is_empty())
    }

    pub fn has_photo(&self, catalog: &dyn MediaCatalog) -> bool {
        self.has_media_of_kind(catalog, MediaKind::Image)
    }

    pub fn has_video(&self, catalog: &dyn MediaCatalog) -> bool {
        self.has_media_of_kind(catalog, MediaKind::Video)
    }

    fn has_media_of_kind(&self, catalog: &dyn MediaCatalog, kind: MediaKind) -> bool {
        self.fields
            .media
            .iter()
            .filter_map(|id| catalog.get(*id))
            .any(|info| info.kind == kind)
    }

    /// An auto upload was attempted and then turned off by the user.
    pub fn was_auto_upload_cancelled(&self) -> bool {
        self.fields.auto_upload_attempts_count > 0 && !self.fields.should_attempt_auto_upload
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.fields.date_modified = Some(now);
    }

    /// Record that this record now matches the server copy.
    pub fn mark_synced(&mut self, post_id: i64, revision: Option<i64>, at: DateTime<Utc>) {
        let remote = &mut self.fields.remote;
        remote.post_id = Some(post_id);
        remote.synced_at = Some(at);
        if let Some(rev) = revision {
            if !remote.revisions.contains(&rev) {
                remote.revisions.push(rev);
            }
            remote.server_revision = Some(rev);
        }
        self.fields.date_modified = Some(at);
        self.fields.meta_is_local = false;
        self.fields.auto_upload_attempts_count = 0;
        self.remote_status = RemoteStatus::Sync;
    }
}
