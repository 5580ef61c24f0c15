//! Post and revision endpoints.
//!
//! Every mutation only touches the in-memory graph; `POST /api/save` is the
//! one place edits reach storage.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use folio_core::domain::{AutosaveSnapshot, Post, PostId, PostKind, PostStatus};
use folio_infra::PostReport;
use folio_shared::ApiResponse;
use folio_shared::dto::{
    AutosaveRequest, AutosaveResponse, CreatePostRequest, PostDetailResponse, PostResponse,
    SaveResponse, StatusesResponse, UpdatePostRequest,
};

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn parse_status(status: Option<&str>) -> AppResult<Option<PostStatus>> {
    status
        .map(str::parse::<PostStatus>)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

fn post_response(post: &Post) -> PostResponse {
    let fields = &post.fields;
    PostResponse {
        id: post.id.0,
        kind: fields.kind.as_str().to_string(),
        blog_id: fields.blog_id,
        title: fields.title.clone(),
        content: fields.content.clone(),
        excerpt: fields.excerpt.clone(),
        status: fields.status.to_string(),
        date_created: fields.date_created,
        date_modified: fields.date_modified,
        tags: fields.tags.clone(),
        categories: fields.categories.iter().cloned().collect(),
        featured_image: fields.featured_image.map(|m| m.0),
        display_image: fields.path_for_display_image.clone(),
        remote_post_id: fields.remote.post_id,
        original_id: post.original.map(Uuid::from),
        revision_id: post.revision.map(Uuid::from),
        autosave: post.autosave.as_ref().map(autosave_response),
    }
}

fn autosave_response(snapshot: &AutosaveSnapshot) -> AutosaveResponse {
    AutosaveResponse {
        title: snapshot.title.clone(),
        content: snapshot.content.clone(),
        excerpt: snapshot.excerpt.clone(),
        modified_date: snapshot.modified_date,
        identifier: snapshot.identifier,
    }
}

fn detail_response(report: PostReport) -> PostDetailResponse {
    PostDetailResponse {
        post: post_response(&report.post),
        latest_id: report.latest_id.0,
        has_local_changes: report.has_local_changes,
        has_remote_changes: report.has_remote_changes,
        has_unsaved_changes: report.has_unsaved_changes,
        has_site_specific_changes: report.has_site_specific_changes,
        can_save: report.can_save,
        has_failed_media: report.has_failed_media,
        has_photo: report.has_photo,
        has_video: report.has_video,
        was_auto_upload_cancelled: report.was_auto_upload_cancelled,
    }
}

/// POST /api/posts
pub async fn create_post(
    state: web::Data<AppState>,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    let kind = match request.kind.as_deref() {
        Some(kind) => kind
            .parse::<PostKind>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?,
        None => PostKind::default(),
    };
    let status = parse_status(request.status.as_deref())?;

    let post = state
        .workspace
        .create_post(kind, request.blog_id, |fields| {
            fields.title = request.title;
            fields.content = request.content;
            fields.excerpt = request.excerpt;
            fields.date_created = request.date_created;
            fields.tags = request.tags;
            fields.categories = request.categories.into_iter().collect();
            if let Some(status) = status {
                fields.status = status;
            }
        })
        .await?;

    tracing::info!(post_id = %post.id, kind = kind.as_str(), "Post created");
    Ok(HttpResponse::Created().json(ApiResponse::ok(post_response(&post))))
}

/// GET /api/posts
pub async fn list_posts(state: web::Data<AppState>) -> HttpResponse {
    let posts: Vec<PostResponse> = state.workspace.list().await.iter().map(post_response).collect();
    HttpResponse::Ok().json(ApiResponse::ok(posts))
}

/// GET /api/posts/{id}
pub async fn get_post(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let report = state.workspace.report(PostId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(detail_response(report))))
}

/// PATCH /api/posts/{id}
///
/// Works on originals and revisions alike; editors normally patch the
/// `latest_id` of a post.
pub async fn update_post(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<UpdatePostRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    let status = parse_status(request.status.as_deref())?;

    let post = state
        .workspace
        .edit(PostId(path.into_inner()), |fields| {
            if let Some(title) = request.title {
                fields.title = title;
            }
            if let Some(content) = request.content {
                fields.content = content;
            }
            if let Some(excerpt) = request.excerpt {
                fields.excerpt = excerpt;
            }
            if let Some(status) = status {
                fields.status = status;
            }
            if let Some(date) = request.date_created {
                fields.date_created = Some(date);
            }
            if let Some(tags) = request.tags {
                fields.tags = tags;
            }
            if let Some(categories) = request.categories {
                fields.categories = categories.into_iter().collect();
            }
            if let Some(image) = request.featured_image {
                fields.featured_image = Some(folio_core::domain::MediaId(image));
            }
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(post_response(&post))))
}

/// DELETE /api/posts/{id}
pub async fn delete_post(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    state.workspace.remove(PostId(path.into_inner())).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/posts/{id}/revision
///
/// Returns the existing revision when there already is one.
pub async fn create_revision(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let revision = state.workspace.create_revision(PostId(path.into_inner())).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(post_response(&revision))))
}

/// DELETE /api/posts/{id}/revision
pub async fn delete_revision(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state.workspace.delete_revision(PostId(path.into_inner())).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/posts/{id}/apply
///
/// `{id}` is the revision; the response is the updated original.
pub async fn apply_revision(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let original = state.workspace.apply_revision(PostId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(post_response(&original))))
}

/// POST /api/posts/{id}/autosave
pub async fn commit_autosave(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: Option<web::Json<AutosaveRequest>>,
) -> AppResult<HttpResponse> {
    let identifier = body.and_then(|b| b.into_inner().identifier);
    let snapshot = state
        .workspace
        .commit_autosave(PostId(path.into_inner()), identifier)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(autosave_response(&snapshot))))
}

/// GET /api/posts/{id}/statuses
pub async fn statuses(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let report = state.workspace.report(PostId(path.into_inner())).await?;
    let response = StatusesResponse {
        stored: report.post.fields.status.to_string(),
        projected: report.projected_status.to_string(),
        publish_or_scheduled: report.publish_status.to_string(),
        is_scheduled: report.is_scheduled,
        editable: report
            .editable_statuses
            .iter()
            .map(ToString::to_string)
            .collect(),
    };
    Ok(HttpResponse::Ok().json(ApiResponse::ok(response)))
}

/// POST /api/save
pub async fn save(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let summary = state.workspace.save().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SaveResponse {
        saved: summary.saved,
        removed: summary.removed,
    })))
}
