//! The locked post workspace.
//!
//! [`PostWorkspace`] owns the [`PostGraph`] behind a `tokio::sync::RwLock`
//! so every revision transition mutates the original and its revision as
//! one unit. Nothing touches storage until [`PostWorkspace::save`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use folio_core::DomainResult;
use folio_core::domain::{
    AutosaveSnapshot, ChangeSet, DivergenceEvaluator, Post, PostFields, PostGraph, PostId,
    PostKind, PostStatus, RevisionConfig,
};
use folio_core::error::RepoError;
use folio_core::ports::{Clock, ContentScanner, MediaCatalog, PostRepository, SystemClock};

use crate::media::InMemoryMediaCatalog;
use crate::scan::FirstImageScanner;

/// Everything an editor screen asks about a single post.
#[derive(Debug, Clone, Serialize)]
pub struct PostReport {
    pub post: Post,
    /// Terminal record of the revision chain starting at `post`.
    pub latest_id: PostId,
    pub projected_status: PostStatus,
    pub publish_status: PostStatus,
    pub editable_statuses: Vec<PostStatus>,
    pub is_scheduled: bool,
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

/// Outcome of a storage flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveSummary {
    pub saved: usize,
    pub removed: usize,
}

pub struct PostWorkspace {
    graph: RwLock<PostGraph>,
    repo: Arc<dyn PostRepository>,
    scanner: Arc<dyn ContentScanner>,
    media: Arc<dyn MediaCatalog>,
    evaluator: DivergenceEvaluator,
    clock: Arc<dyn Clock>,
}

impl PostWorkspace {
    /// Load every stored record into a fresh graph.
    pub async fn open(repo: Arc<dyn PostRepository>, config: RevisionConfig) -> DomainResult<Self> {
        let posts = repo.list().await?;
        let graph = PostGraph::load(config, posts)?;
        tracing::info!(records = graph.len(), "Post workspace opened");

        Ok(Self {
            graph: RwLock::new(graph),
            repo,
            scanner: Arc::new(FirstImageScanner),
            media: Arc::new(InMemoryMediaCatalog::new()),
            evaluator: DivergenceEvaluator::new(),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn ContentScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_media(mut self, media: Arc<dyn MediaCatalog>) -> Self {
        self.media = media;
        self
    }

    pub fn with_evaluator(mut self, evaluator: DivergenceEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create a local draft and apply `f` to its fields.
    pub async fn create_post<F>(&self, kind: PostKind, blog_id: Uuid, f: F) -> DomainResult<Post>
    where
        F: FnOnce(&mut PostFields),
    {
        let now = self.clock.now();
        let mut graph = self.graph.write().await;
        let id = graph.insert(Post::new_local(kind, blog_id, now));
        let post = graph.edit(id, now, |fields| {
            f(fields);
            fields.path_for_display_image = self.scanner.display_image_for(&fields.content);
        })?;
        Ok(post.clone())
    }

    /// Take in a post fetched from the server. A record with the same ID,
    /// or an original with the same foreign ID, is overwritten in place
    /// instead of duplicated. Local linkage always survives.
    pub async fn import(&self, post: Post) -> DomainResult<Post> {
        let mut graph = self.graph.write().await;
        let existing = graph
            .get(post.id)
            .or_else(|| {
                post.fields
                    .foreign_id
                    .and_then(|foreign_id| graph.find_by_foreign_id(foreign_id))
            })
            .map(|p| p.id);

        let id = match existing {
            Some(id) => {
                tracing::debug!(post_id = %id, "Imported post replaces local copy");
                graph.update_record(id, |record| {
                    record.fields = post.fields;
                    record.remote_status = post.remote_status;
                })?;
                id
            }
            None => graph.insert(post),
        };
        Ok(graph.require(id)?.clone())
    }

    pub async fn get(&self, id: PostId) -> DomainResult<Post> {
        let graph = self.graph.read().await;
        Ok(graph.require(id)?.clone())
    }

    /// Originals, most recently modified first.
    pub async fn list(&self) -> Vec<Post> {
        let graph = self.graph.read().await;
        let mut posts: Vec<Post> = graph.originals().cloned().collect();
        posts.sort_by(|a, b| b.fields.date_modified.cmp(&a.fields.date_modified));
        posts
    }

    pub async fn latest(&self, id: PostId) -> DomainResult<Post> {
        let graph = self.graph.read().await;
        Ok(graph.latest(id)?.clone())
    }

    pub async fn create_revision(&self, id: PostId) -> DomainResult<Post> {
        let mut graph = self.graph.write().await;
        let revision_id = graph.create_revision(id)?;
        Ok(graph.require(revision_id)?.clone())
    }

    pub async fn delete_revision(&self, id: PostId) -> DomainResult<()> {
        self.graph.write().await.delete_revision(id)
    }

    /// Merge a revision into its original after the save policy accepts it.
    pub async fn apply_revision(&self, revision_id: PostId) -> DomainResult<Post> {
        let mut graph = self.graph.write().await;
        if let Some(revision) = graph.get(revision_id) {
            self.evaluator.validate_for_save(revision)?;
        }
        Ok(graph.update_post_from(revision_id)?.clone())
    }

    /// Mutate content and refresh the display image.
    pub async fn edit<F>(&self, id: PostId, f: F) -> DomainResult<Post>
    where
        F: FnOnce(&mut PostFields),
    {
        let now = self.clock.now();
        let mut graph = self.graph.write().await;
        let post = graph.edit(id, now, |fields| {
            f(fields);
            fields.path_for_display_image = self.scanner.display_image_for(&fields.content);
        })?;
        Ok(post.clone())
    }

    pub async fn commit_autosave(
        &self,
        revision_id: PostId,
        identifier: Option<i64>,
    ) -> DomainResult<AutosaveSnapshot> {
        let now = self.clock.now();
        let mut graph = self.graph.write().await;
        Ok(graph.commit_autosave(revision_id, now, identifier)?.clone())
    }

    /// Record a successful upload reported by the upload coordinator.
    pub async fn mark_synced(
        &self,
        id: PostId,
        remote_post_id: i64,
        server_revision: Option<i64>,
    ) -> DomainResult<Post> {
        let now = self.clock.now();
        let mut graph = self.graph.write().await;
        let post = graph.update_record(id, |post| post.mark_synced(remote_post_id, server_revision, now))?;
        Ok(post.clone())
    }

    pub async fn remove(&self, id: PostId) -> DomainResult<()> {
        self.graph.write().await.remove(id)
    }

    pub async fn has_pending_changes(&self) -> bool {
        self.graph.read().await.has_pending_changes()
    }

    pub async fn report(&self, id: PostId) -> DomainResult<PostReport> {
        let now = self.clock.now();
        let graph = self.graph.read().await;
        let post = graph.require(id)?;
        let latest_id = graph.latest(id)?.id;
        let media = self.media.as_ref();

        Ok(PostReport {
            latest_id,
            projected_status: post.projected_status_at(now),
            publish_status: post.available_status_for_publish_or_scheduled_at(now),
            editable_statuses: post.available_statuses_for_editing().to_vec(),
            is_scheduled: post.is_scheduled_at(now),
            has_local_changes: self.evaluator.has_local_changes(&graph, post),
            has_remote_changes: self.evaluator.has_remote_changes(post),
            has_unsaved_changes: self.evaluator.has_unsaved_changes(&graph, post),
            has_site_specific_changes: self.evaluator.has_site_specific_changes(&graph, post),
            can_save: self.evaluator.can_save(post),
            has_failed_media: self.evaluator.has_failed_media(post, media),
            has_photo: post.has_photo(media),
            has_video: post.has_video(media),
            was_auto_upload_cancelled: post.was_auto_upload_cancelled(),
            post: post.clone(),
        })
    }

    /// Flush every record touched since the last save.
    ///
    /// The write lock is held for the whole flush. On failure the change set
    /// goes back into the journal so the next save retries it.
    pub async fn save(&self) -> DomainResult<SaveSummary> {
        let mut graph = self.graph.write().await;
        let changes = graph.take_changes();
        if changes.is_empty() {
            tracing::debug!("Nothing to save");
            return Ok(SaveSummary::default());
        }

        match self.flush(&changes).await {
            Ok(summary) => {
                tracing::info!(saved = summary.saved, removed = summary.removed, "Posts saved");
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "Post save failed, keeping changes");
                graph.restore_changes(changes);
                Err(e.into())
            }
        }
    }

    async fn flush(&self, changes: &ChangeSet) -> Result<SaveSummary, RepoError> {
        let mut summary = SaveSummary::default();
        for post in &changes.saved {
            self.repo.save(post.clone()).await?;
            summary.saved += 1;
        }
        for id in &changes.removed {
            match self.repo.delete(*id).await {
                Ok(()) => summary.removed += 1,
                Err(RepoError::NotFound) => {
                    tracing::warn!(post_id = %id, "Removed post was never stored");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryPostRepository;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use folio_core::DomainError;
    use folio_core::domain::{MediaId, MediaInfo, MediaKind, MediaUploadState};
    use folio_core::ports::{BaseRepository, FixedClock};

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()))
    }

    async fn workspace(repo: Arc<InMemoryPostRepository>) -> PostWorkspace {
        PostWorkspace::open(repo, RevisionConfig::default())
            .await
            .unwrap()
            .with_clock(clock())
    }

    /// Rejects every write.
    struct OfflineRepository;

    #[async_trait]
    impl BaseRepository<Post, PostId> for OfflineRepository {
        async fn find_by_id(&self, _id: PostId) -> Result<Option<Post>, RepoError> {
            Ok(None)
        }

        async fn save(&self, _post: Post) -> Result<Post, RepoError> {
            Err(RepoError::Connection("database unreachable".to_string()))
        }

        async fn delete(&self, _id: PostId) -> Result<(), RepoError> {
            Err(RepoError::Connection("database unreachable".to_string()))
        }
    }

    #[async_trait]
    impl PostRepository for OfflineRepository {
        async fn find_by_foreign_id(&self, _foreign_id: Uuid) -> Result<Option<Post>, RepoError> {
            Ok(None)
        }

        async fn list(&self) -> Result<Vec<Post>, RepoError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_edit_apply_and_save() {
        let repo = Arc::new(InMemoryPostRepository::new());
        let ws = workspace(repo.clone()).await;

        let post = ws
            .create_post(PostKind::Post, Uuid::nil(), |f| f.title = "Draft".to_string())
            .await
            .unwrap();
        let revision = ws.create_revision(post.id).await.unwrap();
        ws.edit(revision.id, |f| f.title = "Final".to_string())
            .await
            .unwrap();

        let summary = ws.save().await.unwrap();
        assert_eq!(summary.saved, 2);
        assert_eq!(repo.len().await, 2);

        let original = ws.apply_revision(revision.id).await.unwrap();
        assert_eq!(original.fields.title, "Final");
        assert!(original.revision.is_none());

        let summary = ws.save().await.unwrap();
        assert_eq!(summary, SaveSummary { saved: 1, removed: 1 });
        assert_eq!(repo.len().await, 1);
        let stored = repo.find_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(stored.fields.title, "Final");
    }

    #[tokio::test]
    async fn test_open_restores_revision_pairs() {
        let repo = Arc::new(InMemoryPostRepository::new());
        let ws = workspace(repo.clone()).await;
        let post = ws
            .create_post(PostKind::Page, Uuid::nil(), |f| f.content = "Body".to_string())
            .await
            .unwrap();
        let revision = ws.create_revision(post.id).await.unwrap();
        ws.save().await.unwrap();

        let reopened = workspace(repo).await;
        let latest = reopened.latest(post.id).await.unwrap();
        assert_eq!(latest.id, revision.id);
        assert_eq!(reopened.list().await.len(), 1);
        assert!(!reopened.has_pending_changes().await);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_changes() {
        let ws = PostWorkspace::open(Arc::new(OfflineRepository), RevisionConfig::default())
            .await
            .unwrap();
        ws.create_post(PostKind::Post, Uuid::nil(), |f| f.title = "Offline".to_string())
            .await
            .unwrap();

        let err = ws.save().await.unwrap_err();
        assert!(matches!(err, DomainError::Storage(RepoError::Connection(_))));
        assert!(ws.has_pending_changes().await);
    }

    #[tokio::test]
    async fn test_removing_unsaved_post_saves_cleanly() {
        let repo = Arc::new(InMemoryPostRepository::new());
        let ws = workspace(repo.clone()).await;
        let post = ws
            .create_post(PostKind::Post, Uuid::nil(), |_| {})
            .await
            .unwrap();
        ws.remove(post.id).await.unwrap();

        let summary = ws.save().await.unwrap();
        assert_eq!(summary, SaveSummary { saved: 0, removed: 0 });
        assert_eq!(repo.len().await, 0);
    }

    #[tokio::test]
    async fn test_blank_revision_is_not_applied() {
        let ws = workspace(Arc::new(InMemoryPostRepository::new())).await;
        let post = ws
            .create_post(PostKind::Post, Uuid::nil(), |f| f.title = "Keep".to_string())
            .await
            .unwrap();
        let revision = ws.create_revision(post.id).await.unwrap();
        ws.edit(revision.id, |f| f.title.clear()).await.unwrap();

        let err = ws.apply_revision(revision.id).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
        assert_eq!(ws.get(post.id).await.unwrap().fields.title, "Keep");
        assert_eq!(ws.latest(post.id).await.unwrap().id, revision.id);
    }

    #[tokio::test]
    async fn test_edit_refreshes_display_image() {
        let ws = workspace(Arc::new(InMemoryPostRepository::new())).await;
        let post = ws
            .create_post(PostKind::Post, Uuid::nil(), |f| {
                f.content = r#"<p><img src="a.jpg"></p>"#.to_string();
            })
            .await
            .unwrap();
        assert_eq!(post.fields.path_for_display_image.as_deref(), Some("a.jpg"));

        let post = ws
            .edit(post.id, |f| f.content = "text only".to_string())
            .await
            .unwrap();
        assert!(post.fields.path_for_display_image.is_none());
    }

    #[tokio::test]
    async fn test_import_replaces_local_copy() {
        let ws = workspace(Arc::new(InMemoryPostRepository::new())).await;
        let local = ws
            .create_post(PostKind::Post, Uuid::nil(), |f| f.title = "Local".to_string())
            .await
            .unwrap();

        let mut fetched = Post::new(local.fields.clone());
        fetched.fields.title = "From server".to_string();
        fetched.fields.remote.post_id = Some(42);

        let imported = ws.import(fetched).await.unwrap();
        assert_eq!(imported.id, local.id);
        assert_eq!(imported.fields.title, "From server");
        assert_eq!(ws.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_import_over_revised_post_keeps_pair() {
        let repo = Arc::new(InMemoryPostRepository::new());
        let ws = workspace(repo.clone()).await;
        let local = ws
            .create_post(PostKind::Post, Uuid::nil(), |f| f.title = "Local".to_string())
            .await
            .unwrap();
        let revision = ws.create_revision(local.id).await.unwrap();

        let mut fetched = local.clone();
        fetched.fields.foreign_id = None;
        fetched.fields.title = "From server".to_string();
        let imported = ws.import(fetched).await.unwrap();
        assert_eq!(imported.revision, Some(revision.id));
        assert_eq!(imported.fields.title, "From server");

        ws.save().await.unwrap();
        let reopened = workspace(repo).await;
        assert_eq!(reopened.latest(local.id).await.unwrap().id, revision.id);
    }

    #[tokio::test]
    async fn test_report_after_sync() {
        let media = Arc::new(InMemoryMediaCatalog::new());
        let image = MediaId(Uuid::new_v4());
        media.insert(MediaInfo {
            id: image,
            kind: MediaKind::Image,
            upload_state: MediaUploadState::Failed,
        });
        let ws = workspace(Arc::new(InMemoryPostRepository::new()))
            .await
            .with_media(media);

        let post = ws
            .create_post(PostKind::Post, Uuid::nil(), |f| {
                f.title = "Photo".to_string();
                f.media.insert(image);
            })
            .await
            .unwrap();
        let report = ws.report(post.id).await.unwrap();
        assert!(report.has_unsaved_changes);
        assert!(report.has_photo);
        assert!(!report.has_video);
        assert!(report.has_failed_media);

        ws.mark_synced(post.id, 7, Some(1)).await.unwrap();
        let report = ws.report(post.id).await.unwrap();
        assert!(!report.has_local_changes);
        assert!(!report.has_remote_changes);
        assert!(report.can_save);
        assert_eq!(report.latest_id, post.id);
    }

    #[tokio::test]
    async fn test_concurrent_create_revision_yields_one_revision() {
        let ws = Arc::new(workspace(Arc::new(InMemoryPostRepository::new())).await);
        let post = ws
            .create_post(PostKind::Post, Uuid::nil(), |f| f.title = "Shared".to_string())
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ws = ws.clone();
                tokio::spawn(async move { ws.create_revision(post.id).await.unwrap().id })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }
}
