//! Post entity for SeaORM.
//!
//! Collections and the autosave snapshot are stored as JSON columns; the
//! enums use their serde names.

use sea_orm::Set;
use sea_orm::entity::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use folio_core::domain::{AutosaveSnapshot, Post, PostFields, PostId, RemoteInfo};
use folio_core::error::RepoError;
use folio_core::legacy::ConfirmedChanges;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: String,
    pub blog_id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    #[sea_orm(column_type = "Text")]
    pub excerpt: String,
    pub status: String,
    pub date_created: Option<DateTimeWithTimeZone>,
    pub date_modified: Option<DateTimeWithTimeZone>,
    #[sea_orm(indexed)]
    pub foreign_id: Option<Uuid>,
    pub tags: Json,
    pub categories: Json,
    pub media: Json,
    pub comments: Json,
    pub featured_image: Option<Uuid>,
    pub path_for_display_image: Option<String>,
    pub remote_post_id: Option<i64>,
    pub remote_synced_at: Option<DateTimeWithTimeZone>,
    pub remote_revisions: Json,
    pub server_revision: Option<i64>,
    pub auto_upload_attempts_count: i32,
    pub should_attempt_auto_upload: bool,
    pub meta_is_local: bool,
    pub meta_publish_immediately: bool,
    pub original_id: Option<Uuid>,
    pub revision_id: Option<Uuid>,
    pub autosave: Option<Json>,
    pub confirmed_changes_hash: Option<String>,
    pub confirmed_changes_timestamp: Option<DateTimeWithTimeZone>,
    pub remote_status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

fn to_json<T: Serialize>(value: &T) -> Result<Json, RepoError> {
    serde_json::to_value(value).map_err(|e| RepoError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(value: Json) -> Result<T, RepoError> {
    serde_json::from_value(value).map_err(|e| RepoError::Serialization(e.to_string()))
}

/// Serde name of a unit enum variant.
fn enum_name<T: Serialize>(value: &T) -> Result<String, RepoError> {
    match to_json(value)? {
        Json::String(name) => Ok(name),
        other => Err(RepoError::Serialization(format!(
            "expected a string variant, got {other}"
        ))),
    }
}

fn enum_from_name<T: DeserializeOwned>(name: String) -> Result<T, RepoError> {
    from_json(Json::String(name))
}

/// Conversion from SeaORM Model to Domain Post.
impl TryFrom<Model> for Post {
    type Error = RepoError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let confirmed_changes = match (model.confirmed_changes_hash, model.confirmed_changes_timestamp) {
            (Some(hash), Some(timestamp)) => Some(ConfirmedChanges {
                hash,
                timestamp: timestamp.into(),
            }),
            _ => None,
        };
        let autosave: Option<AutosaveSnapshot> = model.autosave.map(from_json).transpose()?;

        Ok(Self {
            id: PostId(model.id),
            fields: PostFields {
                kind: enum_from_name(model.kind)?,
                blog_id: model.blog_id,
                title: model.title,
                content: model.content,
                excerpt: model.excerpt,
                status: enum_from_name(model.status)?,
                date_created: model.date_created.map(Into::into),
                date_modified: model.date_modified.map(Into::into),
                foreign_id: model.foreign_id,
                tags: from_json(model.tags)?,
                categories: from_json(model.categories)?,
                media: from_json(model.media)?,
                comments: from_json(model.comments)?,
                featured_image: model.featured_image.map(folio_core::domain::MediaId),
                path_for_display_image: model.path_for_display_image,
                remote: RemoteInfo {
                    post_id: model.remote_post_id,
                    synced_at: model.remote_synced_at.map(Into::into),
                    revisions: from_json(model.remote_revisions)?,
                    server_revision: model.server_revision,
                },
                auto_upload_attempts_count: u32::try_from(model.auto_upload_attempts_count)
                    .unwrap_or(0),
                should_attempt_auto_upload: model.should_attempt_auto_upload,
                meta_is_local: model.meta_is_local,
                meta_publish_immediately: model.meta_publish_immediately,
            },
            original: model.original_id.map(PostId),
            revision: model.revision_id.map(PostId),
            autosave,
            confirmed_changes,
            remote_status: enum_from_name(model.remote_status)?,
        })
    }
}

/// Conversion from Domain Post to SeaORM ActiveModel.
impl TryFrom<&Post> for ActiveModel {
    type Error = RepoError;

    fn try_from(post: &Post) -> Result<Self, Self::Error> {
        let fields = &post.fields;
        let (hash, timestamp): (Option<String>, Option<DateTimeWithTimeZone>) =
            match &post.confirmed_changes {
                Some(marker) => (Some(marker.hash.clone()), Some(marker.timestamp.into())),
                None => (None, None),
            };

        Ok(Self {
            id: Set(post.id.0),
            kind: Set(enum_name(&fields.kind)?),
            blog_id: Set(fields.blog_id),
            title: Set(fields.title.clone()),
            content: Set(fields.content.clone()),
            excerpt: Set(fields.excerpt.clone()),
            status: Set(enum_name(&fields.status)?),
            date_created: Set(fields.date_created.map(Into::into)),
            date_modified: Set(fields.date_modified.map(Into::into)),
            foreign_id: Set(fields.foreign_id),
            tags: Set(to_json(&fields.tags)?),
            categories: Set(to_json(&fields.categories)?),
            media: Set(to_json(&fields.media)?),
            comments: Set(to_json(&fields.comments)?),
            featured_image: Set(fields.featured_image.map(|m| m.0)),
            path_for_display_image: Set(fields.path_for_display_image.clone()),
            remote_post_id: Set(fields.remote.post_id),
            remote_synced_at: Set(fields.remote.synced_at.map(Into::into)),
            remote_revisions: Set(to_json(&fields.remote.revisions)?),
            server_revision: Set(fields.remote.server_revision),
            auto_upload_attempts_count: Set(
                i32::try_from(fields.auto_upload_attempts_count).unwrap_or(i32::MAX)
            ),
            should_attempt_auto_upload: Set(fields.should_attempt_auto_upload),
            meta_is_local: Set(fields.meta_is_local),
            meta_publish_immediately: Set(fields.meta_publish_immediately),
            original_id: Set(post.original.map(|id| id.0)),
            revision_id: Set(post.revision.map(|id| id.0)),
            autosave: Set(post.autosave.as_ref().map(to_json).transpose()?),
            confirmed_changes_hash: Set(hash),
            confirmed_changes_timestamp: Set(timestamp),
            remote_status: Set(enum_name(&post.remote_status)?),
        })
    }
}
