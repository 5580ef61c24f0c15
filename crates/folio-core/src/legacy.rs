//! Legacy upload bookkeeping.
//!
//! These fields and predicates predate the external upload coordinator and
//! are kept so that stored records keep deserializing and older callers keep
//! working. New logic should read
//! [`DivergenceEvaluator`](crate::domain::DivergenceEvaluator) instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{Post, PostFields, PostGraph, PostStatus};

/// Per-record upload state written by the pre-coordinator upload flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Pushing,
    Failed,
    #[default]
    Local,
    Sync,
    PushingMedia,
    AutoSaved,
    /// Default state of a freshly created local revision.
    LocalRevision,
    /// The user saved the revision and it needs to be uploaded.
    SyncNeeded,
}

/// Content hash and time at which local changes were last confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedChanges {
    pub hash: String,
    pub timestamp: DateTime<Utc>,
}

impl ConfirmedChanges {
    pub fn confirm(fields: &PostFields, at: DateTime<Utc>) -> Self {
        Self {
            hash: content_hash(fields),
            timestamp: at,
        }
    }

    /// True if `fields` still hash to the confirmed value.
    pub fn matches(&self, fields: &PostFields) -> bool {
        self.hash == content_hash(fields)
    }
}

/// SHA-256 over the user-editable content fields, hex encoded.
pub fn content_hash(fields: &PostFields) -> String {
    let mut hasher = Sha256::new();
    for part in [
        fields.title.as_str(),
        fields.content.as_str(),
        fields.excerpt.as_str(),
        fields.status.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let created = fields.date_created.map(|d| d.timestamp_millis()).unwrap_or(0);
    hasher.update(created.to_le_bytes());
    for tag in &fields.tags {
        hasher.update(tag.as_bytes());
        hasher.update([0u8]);
    }
    for category in &fields.categories {
        hasher.update(category.as_bytes());
        hasher.update([0u8]);
    }
    if let Some(featured) = fields.featured_image {
        hasher.update(featured.0.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Stamp the post's current content as intentionally changed.
pub fn confirm_changes(post: &mut Post, at: DateTime<Utc>) {
    post.confirmed_changes = Some(ConfirmedChanges::confirm(&post.fields, at));
}

pub fn is_failed(post: &Post) -> bool {
    post.remote_status == RemoteStatus::Failed
}

/// Mark a post to go live as soon as it is uploaded.
pub fn publish_immediately(post: &mut Post, now: DateTime<Utc>) {
    post.fields.date_created = None;
    post.fields.date_modified = Some(now);
    post.fields.meta_publish_immediately = true;
}

pub fn should_publish_immediately(post: &Post) -> bool {
    post.is_draft() && date_created_is_nil_or_equal_to_date_modified(post)
}

/// True if the original of `post` (or `post` itself when it is an
/// original) is a draft.
pub fn original_is_draft(graph: &PostGraph, post: &Post) -> bool {
    match post.original.and_then(|id| graph.get(id)) {
        Some(original) => original.fields.status == PostStatus::Draft,
        None => post.is_draft(),
    }
}

/// Future creation date regardless of status.
pub fn has_future_publish_date(post: &Post, now: DateTime<Utc>) -> bool {
    crate::domain::status::is_future(post.fields.date_created, now)
}

pub fn date_created_is_nil_or_equal_to_date_modified(post: &Post) -> bool {
    match post.fields.date_created {
        None => true,
        Some(created) => post.fields.date_modified == Some(created),
    }
}

pub fn has_never_attempted_to_upload(post: &Post) -> bool {
    post.remote_status == RemoteStatus::Local && post.fields.auto_upload_attempts_count == 0
}
