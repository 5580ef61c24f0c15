//! Data Transfer Objects - request/response types for the editor API.
//!
//! Statuses and kinds travel as their lowercase names (`"draft"`,
//! `"publish"`, `"page"`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to create a local draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePostRequest {
    /// `"post"` (default) or `"page"`.
    #[serde(default)]
    pub kind: Option<String>,
    pub blog_id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Partial update of a post or revision. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub featured_image: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutosaveRequest {
    /// Server autosave identifier, when the server already issued one.
    #[serde(default)]
    pub identifier: Option<i64>,
}

/// A post or revision record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub kind: String,
    pub blog_id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub status: String,
    pub date_created: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub featured_image: Option<Uuid>,
    pub display_image: Option<String>,
    pub remote_post_id: Option<i64>,
    pub original_id: Option<Uuid>,
    pub revision_id: Option<Uuid>,
    pub autosave: Option<AutosaveResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveResponse {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub modified_date: Option<DateTime<Utc>>,
    pub identifier: Option<i64>,
}

/// A record plus the editor's view of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetailResponse {
    pub post: PostResponse,
    /// Record the editor should open: the end of the revision chain.
    pub latest_id: Uuid,
    pub has_local_changes: bool,
    pub has_remote_changes: bool,
    pub has_unsaved_changes: bool,
    pub has_site_specific_changes: bool,
    pub can_save: bool,
    pub has_failed_media: bool,
    pub has_photo: bool,
    pub has_video: bool,
    pub was_auto_upload_cancelled: bool,
}

/// Statuses derived from the stored one at request time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusesResponse {
    pub stored: String,
    pub projected: String,
    pub publish_or_scheduled: String,
    pub is_scheduled: bool,
    pub editable: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub saved: usize,
    pub removed: usize,
}
