//! Divergence detection - does a post hold work that is not on the server yet,
//! or has the server moved on without us?
//!
//! How a post kind compares local and remote state is a [`ChangeDetector`]
//! strategy registered per [`PostKind`] on the [`DivergenceEvaluator`].

use std::collections::HashMap;
use std::sync::Arc;

use super::graph::PostGraph;
use super::media::MediaUploadState;
use super::post::{Post, PostFields, PostKind};
use super::status::PostStatus;
use crate::error::DomainError;
use crate::legacy;
use crate::ports::MediaCatalog;
use crate::DomainResult;

/// Per-kind comparison of a post against its synced state.
pub trait ChangeDetector: Send + Sync {
    /// Local work that has not reached the server. `original` is set when
    /// `post` is a revision.
    fn has_local_changes(&self, post: &Post, original: Option<&Post>) -> bool;

    /// The server copy changed since the last local sync.
    fn has_remote_changes(&self, _post: &Post) -> bool {
        false
    }
}

/// Local changes iff never uploaded or modified after the last sync.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampChangeDetector;

impl ChangeDetector for TimestampChangeDetector {
    fn has_local_changes(&self, post: &Post, _original: Option<&Post>) -> bool {
        if !post.has_remote() {
            return true;
        }
        match (post.fields.date_modified, post.fields.remote.synced_at) {
            (Some(modified), Some(synced)) => modified > synced,
            (_, None) => true,
            (None, Some(_)) => false,
        }
    }
}

/// Compares a revision's content fields with its original.
///
/// Touching a revision without changing anything does not count. Originals
/// fall back to the timestamp rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentDiffDetector;

impl ContentDiffDetector {
    fn content_differs(a: &PostFields, b: &PostFields) -> bool {
        a.title != b.title
            || a.content != b.content
            || a.excerpt != b.excerpt
            || a.status != b.status
            || a.date_created != b.date_created
            || a.tags != b.tags
            || a.categories != b.categories
            || a.media != b.media
            || a.featured_image != b.featured_image
    }
}

impl ChangeDetector for ContentDiffDetector {
    fn has_local_changes(&self, post: &Post, original: Option<&Post>) -> bool {
        match original {
            // a never-uploaded page is unsaved whatever its revision holds
            Some(original) => {
                !post.has_remote() || Self::content_differs(&post.fields, &original.fields)
            }
            None => TimestampChangeDetector.has_local_changes(post, None),
        }
    }
}

/// Adds remote change detection from server revision counters to another detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerRevisionDetector<D> {
    inner: D,
}

impl<D> ServerRevisionDetector<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

impl<D: ChangeDetector> ChangeDetector for ServerRevisionDetector<D> {
    fn has_local_changes(&self, post: &Post, original: Option<&Post>) -> bool {
        self.inner.has_local_changes(post, original)
    }

    fn has_remote_changes(&self, post: &Post) -> bool {
        let remote = &post.fields.remote;
        match (remote.server_revision, remote.latest_known_revision()) {
            (Some(server), Some(known)) => server > known,
            (Some(_), None) => remote.has_remote(),
            (None, _) => self.inner.has_remote_changes(post),
        }
    }
}

/// Content validity rule consulted by [`DivergenceEvaluator::can_save`].
pub trait SavePolicy: Send + Sync {
    fn check(&self, post: &Post) -> Result<(), String>;
}

/// At least one of title, content or excerpt must be non-blank.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonBlankPolicy;

impl SavePolicy for NonBlankPolicy {
    fn check(&self, post: &Post) -> Result<(), String> {
        let fields = &post.fields;
        let has_text = [&fields.title, &fields.content, &fields.excerpt]
            .iter()
            .any(|s| !s.trim().is_empty());
        if has_text {
            Ok(())
        } else {
            Err("post has no title, content or excerpt".to_string())
        }
    }
}

/// Answers "is there unsaved work?" for any post in a graph.
#[derive(Clone)]
pub struct DivergenceEvaluator {
    detectors: HashMap<PostKind, Arc<dyn ChangeDetector>>,
    fallback: Arc<dyn ChangeDetector>,
    save_policy: Arc<dyn SavePolicy>,
}

impl Default for DivergenceEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl DivergenceEvaluator {
    /// Posts compare timestamps, pages diff content. Both track server revisions.
    pub fn new() -> Self {
        let mut detectors: HashMap<PostKind, Arc<dyn ChangeDetector>> = HashMap::new();
        detectors.insert(
            PostKind::Post,
            Arc::new(ServerRevisionDetector::new(TimestampChangeDetector)),
        );
        detectors.insert(
            PostKind::Page,
            Arc::new(ServerRevisionDetector::new(ContentDiffDetector)),
        );
        Self {
            detectors,
            fallback: Arc::new(TimestampChangeDetector),
            save_policy: Arc::new(NonBlankPolicy),
        }
    }

    pub fn with_detector(mut self, kind: PostKind, detector: Arc<dyn ChangeDetector>) -> Self {
        self.detectors.insert(kind, detector);
        self
    }

    pub fn with_save_policy(mut self, policy: Arc<dyn SavePolicy>) -> Self {
        self.save_policy = policy;
        self
    }

    fn detector(&self, kind: PostKind) -> &dyn ChangeDetector {
        self.detectors
            .get(&kind)
            .unwrap_or(&self.fallback)
            .as_ref()
    }

    pub fn has_local_changes(&self, graph: &PostGraph, post: &Post) -> bool {
        let original = post.original.and_then(|id| graph.get(id));
        self.detector(post.fields.kind).has_local_changes(post, original)
    }

    pub fn has_remote_changes(&self, post: &Post) -> bool {
        self.detector(post.fields.kind).has_remote_changes(post)
    }

    /// Local or remote divergence. Consult this before leaving an editor
    /// or discarding a revision.
    pub fn has_unsaved_changes(&self, graph: &PostGraph, post: &Post) -> bool {
        self.has_local_changes(graph, post) || self.has_remote_changes(post)
    }

    pub fn can_save(&self, post: &Post) -> bool {
        self.validate_for_save(post).is_ok()
    }

    pub fn validate_for_save(&self, post: &Post) -> DomainResult<()> {
        if post.fields.status == PostStatus::Trashed {
            return Err(DomainError::ValidationFailed(format!(
                "post {} is trashed",
                post.id
            )));
        }
        self.save_policy
            .check(post)
            .map_err(DomainError::ValidationFailed)
    }

    /// Any owned media whose upload failed permanently.
    pub fn has_failed_media(&self, post: &Post, catalog: &dyn MediaCatalog) -> bool {
        post.fields
            .media
            .iter()
            .filter_map(|id| catalog.get(*id))
            .any(|info| info.upload_state == MediaUploadState::Failed)
    }

    /// Status or featured image differ from the original. These changes
    /// are settings rather than content.
    pub fn has_site_specific_changes(&self, graph: &PostGraph, post: &Post) -> bool {
        match post.original.and_then(|id| graph.get(id)) {
            Some(original) => {
                post.fields.status != original.fields.status
                    || post.fields.featured_image != original.fields.featured_image
            }
            None => false,
        }
    }

    /// Deprecated: read upload state from the upload coordinator instead.
    pub fn has_never_attempted_to_upload(&self, post: &Post) -> bool {
        legacy::has_never_attempted_to_upload(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::{MediaId, MediaInfo, MediaKind};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn synced_post(kind: PostKind) -> Post {
        let now = Utc::now();
        let mut post = Post::new_local(kind, Uuid::new_v4(), now);
        post.fields.title = "Title".to_string();
        post.mark_synced(101, Some(7), now);
        post
    }

    struct FailedCatalog(MediaId);

    impl MediaCatalog for FailedCatalog {
        fn get(&self, id: MediaId) -> Option<MediaInfo> {
            (id == self.0).then_some(MediaInfo {
                id,
                kind: MediaKind::Image,
                upload_state: MediaUploadState::Failed,
            })
        }
    }

    #[test]
    fn test_freshly_synced_post_has_no_unsaved_changes() {
        let evaluator = DivergenceEvaluator::new();
        let mut graph = PostGraph::default();
        let id = graph.insert(synced_post(PostKind::Post));

        let post = graph.get(id).unwrap();
        assert!(!evaluator.has_unsaved_changes(&graph, post));

        graph
            .edit(id, Utc::now() + Duration::seconds(1), |f| {
                f.title = "Edited".to_string()
            })
            .unwrap();
        let post = graph.get(id).unwrap();
        assert!(evaluator.has_local_changes(&graph, post));
        assert!(evaluator.has_unsaved_changes(&graph, post));
    }

    #[test]
    fn test_never_uploaded_post_has_local_changes() {
        let evaluator = DivergenceEvaluator::new();
        let mut graph = PostGraph::default();
        let id = graph.insert(Post::new_local(PostKind::Post, Uuid::nil(), Utc::now()));
        assert!(evaluator.has_local_changes(&graph, graph.get(id).unwrap()));
    }

    #[test]
    fn test_remote_changes_from_server_revision() {
        let evaluator = DivergenceEvaluator::new();
        let graph = PostGraph::default();
        let mut post = synced_post(PostKind::Post);
        assert!(!evaluator.has_remote_changes(&post));

        post.fields.remote.server_revision = Some(9);
        assert!(evaluator.has_remote_changes(&post));
        assert!(evaluator.has_unsaved_changes(&graph, &post));
    }

    #[test]
    fn test_base_detector_never_reports_remote_changes() {
        let mut post = synced_post(PostKind::Post);
        post.fields.remote.server_revision = Some(99);
        assert!(!TimestampChangeDetector.has_remote_changes(&post));
    }

    #[test]
    fn test_page_revision_diffs_content() {
        let evaluator = DivergenceEvaluator::new();
        let mut graph = PostGraph::default();
        let id = graph.insert(synced_post(PostKind::Page));
        let revision_id = graph.create_revision(id).unwrap();

        // touched, but identical content
        graph
            .edit(revision_id, Utc::now() + Duration::seconds(5), |_| {})
            .unwrap();
        assert!(!evaluator.has_local_changes(&graph, graph.get(revision_id).unwrap()));

        graph
            .edit(revision_id, Utc::now() + Duration::seconds(6), |f| {
                f.content = "new body".to_string()
            })
            .unwrap();
        assert!(evaluator.has_local_changes(&graph, graph.get(revision_id).unwrap()));
    }

    #[test]
    fn test_unsynced_page_revision_has_local_changes() {
        let evaluator = DivergenceEvaluator::new();
        let mut graph = PostGraph::default();
        let mut page = Post::new_local(PostKind::Page, Uuid::nil(), Utc::now());
        page.fields.title = "Local page".to_string();
        let id = graph.insert(page);
        let revision_id = graph.create_revision(id).unwrap();

        assert!(evaluator.has_local_changes(&graph, graph.get(revision_id).unwrap()));
    }

    #[test]
    fn test_custom_detector_overrides_kind() {
        struct Never;
        impl ChangeDetector for Never {
            fn has_local_changes(&self, _: &Post, _: Option<&Post>) -> bool {
                false
            }
        }

        let evaluator = DivergenceEvaluator::new().with_detector(PostKind::Post, Arc::new(Never));
        let mut graph = PostGraph::default();
        let id = graph.insert(Post::new_local(PostKind::Post, Uuid::nil(), Utc::now()));
        assert!(!evaluator.has_unsaved_changes(&graph, graph.get(id).unwrap()));
    }

    #[test]
    fn test_can_save() {
        let evaluator = DivergenceEvaluator::new();
        let mut post = Post::new_local(PostKind::Post, Uuid::nil(), Utc::now());
        assert!(!evaluator.can_save(&post));

        post.fields.content = "  body ".to_string();
        assert!(evaluator.can_save(&post));

        post.fields.status = PostStatus::Trashed;
        assert!(matches!(
            evaluator.validate_for_save(&post),
            Err(DomainError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_has_failed_media() {
        let evaluator = DivergenceEvaluator::new();
        let failed = MediaId(Uuid::new_v4());
        let catalog = FailedCatalog(failed);
        let mut post = Post::new_local(PostKind::Post, Uuid::nil(), Utc::now());
        post.fields.media.insert(MediaId(Uuid::new_v4()));
        assert!(!evaluator.has_failed_media(&post, &catalog));

        post.fields.media.insert(failed);
        assert!(evaluator.has_failed_media(&post, &catalog));
    }

    #[test]
    fn test_site_specific_changes() {
        let evaluator = DivergenceEvaluator::new();
        let mut graph = PostGraph::default();
        let id = graph.insert(synced_post(PostKind::Post));
        let revision_id = graph.create_revision(id).unwrap();
        assert!(!evaluator.has_site_specific_changes(&graph, graph.get(revision_id).unwrap()));

        graph
            .edit(revision_id, Utc::now(), |f| f.status = PostStatus::Pending)
            .unwrap();
        assert!(evaluator.has_site_specific_changes(&graph, graph.get(revision_id).unwrap()));
        assert!(!evaluator.has_site_specific_changes(&graph, graph.get(id).unwrap()));
    }
}
