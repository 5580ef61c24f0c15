//! The original/revision graph.
//!
//! All post records live in a [`PostGraph`] arena keyed by [`PostId`]. A
//! record's `original` and `revision` fields are lookups into the arena, so
//! the back-reference pair never forms an ownership cycle. Every transition
//! here is a small synchronous edit of the arena; persistence happens later,
//! from the [`ChangeSet`] the graph journals.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::post::{AutosaveSnapshot, Post, PostFields, PostId};
use crate::error::DomainError;
use crate::legacy::RemoteStatus;
use crate::DomainResult;

/// Revision behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionConfig {
    /// Allow a revision to have its own revision.
    pub allow_chaining: bool,
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            allow_chaining: true,
        }
    }
}

/// Records touched since the last flush to storage.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub saved: Vec<Post>,
    pub removed: Vec<PostId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.removed.is_empty()
    }
}

/// Arena of post records and the revision state machine over them.
#[derive(Debug, Default)]
pub struct PostGraph {
    records: HashMap<PostId, Post>,
    config: RevisionConfig,
    dirty: BTreeSet<PostId>,
    removed: BTreeSet<PostId>,
}

impl PostGraph {
    pub fn new(config: RevisionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Rebuild a graph from persisted records, checking that every
    /// original/revision link is symmetric.
    pub fn load(config: RevisionConfig, posts: impl IntoIterator<Item = Post>) -> DomainResult<Self> {
        let records: HashMap<PostId, Post> = posts.into_iter().map(|p| (p.id, p)).collect();

        for post in records.values() {
            if post.original == Some(post.id) || post.revision == Some(post.id) {
                return Err(DomainError::InvalidState(format!(
                    "post {} is linked to itself",
                    post.id
                )));
            }
            if let Some(revision) = post.revision {
                let linked_back = records
                    .get(&revision)
                    .is_some_and(|r| r.original == Some(post.id));
                if !linked_back {
                    return Err(DomainError::InvalidState(format!(
                        "revision {revision} of post {} does not point back to it",
                        post.id
                    )));
                }
            }
            if let Some(original) = post.original {
                let linked_back = records
                    .get(&original)
                    .is_some_and(|o| o.revision == Some(post.id));
                if !linked_back {
                    return Err(DomainError::InvalidState(format!(
                        "original {original} of revision {} does not point to it",
                        post.id
                    )));
                }
            }
        }

        tracing::debug!(records = records.len(), "Post graph loaded");

        Ok(Self {
            records,
            config,
            dirty: BTreeSet::new(),
            removed: BTreeSet::new(),
        })
    }

    pub fn config(&self) -> RevisionConfig {
        self.config
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: PostId) -> Option<&Post> {
        self.records.get(&id)
    }

    pub fn require(&self, id: PostId) -> DomainResult<&Post> {
        self.records
            .get(&id)
            .ok_or_else(|| DomainError::post_not_found(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.records.values()
    }

    /// Originals only, i.e. the records a post list shows.
    pub fn originals(&self) -> impl Iterator<Item = &Post> {
        self.records.values().filter(|p| p.is_original())
    }

    /// Add a record as a new original. Any linkage on `post` is dropped.
    ///
    /// A record already stored under the same ID is replaced in place and
    /// keeps its own linkage.
    pub fn insert(&mut self, mut post: Post) -> PostId {
        let id = post.id;
        match self.records.get(&id) {
            Some(existing) => {
                post.original = existing.original;
                post.revision = existing.revision;
            }
            None => {
                post.original = None;
                post.revision = None;
            }
        }
        self.records.insert(id, post);
        self.removed.remove(&id);
        self.dirty.insert(id);
        tracing::debug!(post_id = %id, "Post inserted");
        id
    }

    /// Look up an original by its offline deduplication ID.
    pub fn find_by_foreign_id(&self, foreign_id: Uuid) -> Option<&Post> {
        self.originals()
            .find(|p| p.fields.foreign_id == Some(foreign_id))
    }

    pub fn is_revision(&self, id: PostId) -> bool {
        self.get(id).is_some_and(Post::is_revision)
    }

    pub fn is_original(&self, id: PostId) -> bool {
        self.get(id).is_some_and(Post::is_original)
    }

    pub fn has_revision(&self, id: PostId) -> bool {
        self.get(id)
            .and_then(|p| p.revision)
            .is_some_and(|r| self.records.contains_key(&r))
    }

    pub fn original_of(&self, id: PostId) -> Option<&Post> {
        self.get(id)
            .and_then(|p| p.original)
            .and_then(|o| self.get(o))
    }

    /// Walk the revision chain from `id` to its terminal record.
    pub fn latest(&self, id: PostId) -> DomainResult<&Post> {
        let mut current = self.require(id)?;
        // a well-formed chain visits each record at most once
        for _ in 0..self.records.len() {
            match current.revision.and_then(|r| self.get(r)) {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
        Err(DomainError::InvalidState(format!(
            "revision chain starting at {id} does not terminate"
        )))
    }

    /// Return the working revision of `id`, creating it if needed.
    ///
    /// An existing revision is returned as is; a post never gets a second one.
    pub fn create_revision(&mut self, id: PostId) -> DomainResult<PostId> {
        let post = self.require(id)?;

        if let Some(existing) = post.revision {
            if self.records.contains_key(&existing) {
                tracing::debug!(post_id = %id, revision_id = %existing, "Reusing existing revision");
                return Ok(existing);
            }
            tracing::warn!(post_id = %id, revision_id = %existing, "Dropping dangling revision link");
        }

        if post.is_revision() && !self.config.allow_chaining {
            return Err(DomainError::InvalidState(format!(
                "post {id} is already a revision and chained revisions are disabled"
            )));
        }

        let revision = Post {
            id: PostId::new(),
            fields: post.fields.clone(),
            original: Some(id),
            revision: None,
            autosave: None,
            confirmed_changes: None,
            remote_status: RemoteStatus::LocalRevision,
        };
        let revision_id = revision.id;

        self.records.insert(revision_id, revision);
        if let Some(post) = self.records.get_mut(&id) {
            post.revision = Some(revision_id);
        }
        self.dirty.insert(id);
        self.dirty.insert(revision_id);

        tracing::debug!(post_id = %id, revision_id = %revision_id, "Revision created");
        Ok(revision_id)
    }

    /// Discard the revision of `id` together with its autosave snapshot.
    ///
    /// Deleting a revision that does not exist is a no-op.
    pub fn delete_revision(&mut self, id: PostId) -> DomainResult<()> {
        let post = self
            .records
            .get_mut(&id)
            .ok_or_else(|| DomainError::post_not_found(id))?;

        let Some(revision_id) = post.revision.take() else {
            tracing::debug!(post_id = %id, "No revision to delete");
            return Ok(());
        };
        self.dirty.insert(id);

        if !self.records.contains_key(&revision_id) {
            tracing::warn!(post_id = %id, revision_id = %revision_id, "Revision already deleted");
            return Ok(());
        }

        self.remove_chain(revision_id);
        tracing::debug!(post_id = %id, revision_id = %revision_id, "Revision deleted");
        Ok(())
    }

    /// Merge `revision_id` into its original and drop the revision.
    ///
    /// Every tracked field of the original is overwritten. Returns the
    /// original's ID. Fails without touching either record when
    /// `revision_id` is unknown or has no original.
    pub fn apply_revision(&mut self, revision_id: PostId) -> DomainResult<PostId> {
        let revision = self.records.get(&revision_id).ok_or_else(|| {
            DomainError::InvalidState(format!("cannot apply missing revision {revision_id}"))
        })?;
        let original_id = revision.original.ok_or_else(|| {
            DomainError::InvalidState(format!("post {revision_id} has no original to apply to"))
        })?;
        let fields = revision.fields.clone();
        let chained = revision
            .revision
            .filter(|id| self.records.contains_key(id));

        let original = self.records.get_mut(&original_id).ok_or_else(|| {
            DomainError::InvalidState(format!(
                "original {original_id} of revision {revision_id} is missing"
            ))
        })?;

        original.fields = fields;
        original.autosave = None;
        original.revision = chained;
        original.remote_status = RemoteStatus::SyncNeeded;

        self.records.remove(&revision_id);
        self.dirty.remove(&revision_id);
        self.removed.insert(revision_id);
        self.dirty.insert(original_id);

        if let Some(chained_id) = chained {
            if let Some(next) = self.records.get_mut(&chained_id) {
                next.original = Some(original_id);
            }
            self.dirty.insert(chained_id);
        }

        tracing::debug!(post_id = %original_id, revision_id = %revision_id, "Revision applied");
        Ok(original_id)
    }

    /// Apply `revision_id` and return the updated original.
    pub fn update_post_from(&mut self, revision_id: PostId) -> DomainResult<&Post> {
        let original_id = self.apply_revision(revision_id)?;
        self.require(original_id)
    }

    /// Copy every tracked field from `source` into `target`. Linkage is untouched.
    pub fn clone_from(&mut self, target: PostId, source: PostId) -> DomainResult<()> {
        let fields = self.require(source)?.fields.clone();
        let post = self
            .records
            .get_mut(&target)
            .ok_or_else(|| DomainError::post_not_found(target))?;
        post.fields = fields;
        self.dirty.insert(target);
        Ok(())
    }

    /// Mutate the tracked fields of `id` and stamp its modification date.
    pub fn edit<F>(&mut self, id: PostId, now: DateTime<Utc>, f: F) -> DomainResult<&Post>
    where
        F: FnOnce(&mut PostFields),
    {
        let post = self
            .records
            .get_mut(&id)
            .ok_or_else(|| DomainError::post_not_found(id))?;
        f(&mut post.fields);
        post.touch(now);
        self.dirty.insert(id);
        Ok(&*post)
    }

    /// Mutate a record without stamping its modification date, e.g. to
    /// record a sync. The record's linkage is preserved whatever `f` does.
    pub fn update_record<F>(&mut self, id: PostId, f: F) -> DomainResult<&Post>
    where
        F: FnOnce(&mut Post),
    {
        let post = self
            .records
            .get_mut(&id)
            .ok_or_else(|| DomainError::post_not_found(id))?;
        let (original, revision) = (post.original, post.revision);
        f(post);
        post.id = id;
        post.original = original;
        post.revision = revision;
        self.dirty.insert(id);
        Ok(&*post)
    }

    /// Snapshot the live content of a revision as its autosave.
    pub fn commit_autosave(
        &mut self,
        revision_id: PostId,
        now: DateTime<Utc>,
        identifier: Option<i64>,
    ) -> DomainResult<&AutosaveSnapshot> {
        let revision = self
            .records
            .get_mut(&revision_id)
            .ok_or_else(|| DomainError::post_not_found(revision_id))?;
        if revision.is_original() {
            return Err(DomainError::InvalidState(format!(
                "post {revision_id} is not a revision and cannot hold an autosave"
            )));
        }
        self.dirty.insert(revision_id);
        Ok(revision
            .autosave
            .insert(AutosaveSnapshot::of(&revision.fields, now, identifier)))
    }

    /// Delete `id` and every revision hanging off it.
    pub fn remove(&mut self, id: PostId) -> DomainResult<()> {
        let post = self.require(id)?;
        if let Some(original_id) = post.original {
            if let Some(original) = self.records.get_mut(&original_id) {
                if original.revision == Some(id) {
                    original.revision = None;
                    self.dirty.insert(original_id);
                }
            }
        }
        let removed = self.remove_chain(id);
        tracing::debug!(post_id = %id, removed, "Post removed");
        Ok(())
    }

    fn remove_chain(&mut self, start: PostId) -> usize {
        let mut next = Some(start);
        let mut count = 0;
        while let Some(id) = next {
            let Some(post) = self.records.remove(&id) else {
                break;
            };
            self.dirty.remove(&id);
            self.removed.insert(id);
            count += 1;
            next = post.revision;
        }
        count
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.dirty.is_empty() || !self.removed.is_empty()
    }

    /// Drain the journal into a change set for the storage flush.
    pub fn take_changes(&mut self) -> ChangeSet {
        let saved = std::mem::take(&mut self.dirty)
            .into_iter()
            .filter_map(|id| self.records.get(&id).cloned())
            .collect();
        let removed = std::mem::take(&mut self.removed).into_iter().collect();
        ChangeSet { saved, removed }
    }

    /// Put a change set back after a failed flush.
    pub fn restore_changes(&mut self, changes: ChangeSet) {
        for post in changes.saved {
            if self.records.contains_key(&post.id) {
                self.dirty.insert(post.id);
            }
        }
        for id in changes.removed {
            if !self.records.contains_key(&id) {
                self.removed.insert(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PostKind, PostStatus};
    use chrono::Duration;

    fn graph_with_post() -> (PostGraph, PostId) {
        let mut graph = PostGraph::default();
        let mut post = Post::new_local(PostKind::Post, Uuid::new_v4(), Utc::now());
        post.fields.title = "Original title".to_string();
        post.fields.content = "<p>Original</p>".to_string();
        post.fields.status = PostStatus::Published;
        let id = graph.insert(post);
        (graph, id)
    }

    #[test]
    fn test_create_revision_links_both_records() {
        let (mut graph, id) = graph_with_post();
        let revision_id = graph.create_revision(id).unwrap();

        assert!(graph.is_original(id));
        assert!(graph.is_revision(revision_id));
        assert!(graph.has_revision(id));
        assert_eq!(graph.get(revision_id).unwrap().original, Some(id));
        assert_eq!(graph.get(id).unwrap().revision, Some(revision_id));
        assert_eq!(
            graph.get(revision_id).unwrap().fields,
            graph.get(id).unwrap().fields
        );
        assert_eq!(
            graph.get(revision_id).unwrap().remote_status,
            RemoteStatus::LocalRevision
        );
    }

    #[test]
    fn test_create_revision_reuses_existing() {
        let (mut graph, id) = graph_with_post();
        let first = graph.create_revision(id).unwrap();
        let second = graph.create_revision(id).unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_create_then_delete_leaves_no_residue() {
        let (mut graph, id) = graph_with_post();
        let before = graph.get(id).unwrap().clone();

        let revision_id = graph.create_revision(id).unwrap();
        graph
            .edit(revision_id, Utc::now(), |f| f.content = "edited".to_string())
            .unwrap();
        graph.delete_revision(id).unwrap();

        assert!(!graph.has_revision(id));
        assert!(graph.get(revision_id).is_none());
        assert_eq!(graph.len(), 1);
        let after = graph.get(id).unwrap();
        assert_eq!(after.fields.content, before.fields.content);
        assert_eq!(after.fields.status, before.fields.status);
    }

    #[test]
    fn test_delete_revision_is_idempotent() {
        let (mut graph, id) = graph_with_post();
        graph.create_revision(id).unwrap();

        graph.delete_revision(id).unwrap();
        let once = graph.get(id).unwrap().clone();
        graph.delete_revision(id).unwrap();
        assert_eq!(graph.get(id).unwrap(), &once);
    }

    #[test]
    fn test_delete_revision_of_unknown_post() {
        let mut graph = PostGraph::default();
        let err = graph.delete_revision(PostId::new()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn test_apply_revision_copies_all_fields() {
        let (mut graph, id) = graph_with_post();
        let revision_id = graph.create_revision(id).unwrap();
        let later = Utc::now() + Duration::minutes(5);
        graph
            .edit(revision_id, later, |f| {
                f.title = "New title".to_string();
                f.content = "<p>New</p>".to_string();
                f.excerpt = "Short".to_string();
                f.status = PostStatus::Draft;
                f.tags = vec!["rust".to_string()];
            })
            .unwrap();
        graph.commit_autosave(revision_id, later, Some(3)).unwrap();
        let expected = graph.get(revision_id).unwrap().fields.clone();

        let original_id = graph.apply_revision(revision_id).unwrap();

        assert_eq!(original_id, id);
        assert!(!graph.has_revision(id));
        assert!(graph.get(revision_id).is_none());
        let original = graph.get(id).unwrap();
        assert_eq!(original.fields, expected);
        assert_eq!(original.fields.date_modified, Some(later));
        assert!(original.autosave.is_none());
    }

    #[test]
    fn test_apply_without_original_fails_and_changes_nothing() {
        let (mut graph, id) = graph_with_post();
        let before = graph.get(id).unwrap().clone();

        let err = graph.apply_revision(id).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(graph.get(id).unwrap(), &before);

        let err = graph.apply_revision(PostId::new()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn test_update_post_from_returns_original() {
        let (mut graph, id) = graph_with_post();
        let revision_id = graph.create_revision(id).unwrap();
        graph
            .edit(revision_id, Utc::now(), |f| f.title = "Merged".to_string())
            .unwrap();

        let original = graph.update_post_from(revision_id).unwrap();
        assert_eq!(original.id, id);
        assert_eq!(original.fields.title, "Merged");
    }

    #[test]
    fn test_chained_revisions_and_latest() {
        let (mut graph, id) = graph_with_post();
        assert_eq!(graph.latest(id).unwrap().id, id);

        let first = graph.create_revision(id).unwrap();
        let second = graph.create_revision(first).unwrap();
        assert_eq!(graph.latest(id).unwrap().id, second);
        assert_eq!(graph.latest(first).unwrap().id, second);
        assert_eq!(graph.original_of(second).unwrap().id, first);
    }

    #[test]
    fn test_chaining_can_be_disabled() {
        let mut graph = PostGraph::new(RevisionConfig {
            allow_chaining: false,
        });
        let id = graph.insert(Post::new_local(PostKind::Post, Uuid::nil(), Utc::now()));
        let revision_id = graph.create_revision(id).unwrap();
        let err = graph.create_revision(revision_id).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn test_applying_mid_chain_relinks_next_revision() {
        let (mut graph, id) = graph_with_post();
        let first = graph.create_revision(id).unwrap();
        let second = graph.create_revision(first).unwrap();

        graph.apply_revision(first).unwrap();

        assert_eq!(graph.get(id).unwrap().revision, Some(second));
        assert_eq!(graph.get(second).unwrap().original, Some(id));
        assert_eq!(graph.latest(id).unwrap().id, second);
    }

    #[test]
    fn test_remove_cascades_through_chain() {
        let (mut graph, id) = graph_with_post();
        let first = graph.create_revision(id).unwrap();
        graph.create_revision(first).unwrap();
        graph.take_changes();

        graph.remove(id).unwrap();
        assert!(graph.is_empty());
        let changes = graph.take_changes();
        assert_eq!(changes.removed.len(), 3);
        assert!(changes.saved.is_empty());
    }

    #[test]
    fn test_remove_revision_unlinks_original() {
        let (mut graph, id) = graph_with_post();
        let revision_id = graph.create_revision(id).unwrap();
        graph.remove(revision_id).unwrap();
        assert!(!graph.has_revision(id));
        assert!(graph.get(id).unwrap().revision.is_none());
    }

    #[test]
    fn test_insert_over_existing_id_keeps_pair() {
        let (mut graph, id) = graph_with_post();
        let revision_id = graph.create_revision(id).unwrap();

        let mut replacement = graph.get(id).unwrap().clone();
        replacement.revision = None;
        replacement.fields.title = "Replaced".to_string();
        graph.insert(replacement);

        assert_eq!(graph.get(id).unwrap().revision, Some(revision_id));
        assert_eq!(graph.get(id).unwrap().fields.title, "Replaced");

        let records: Vec<Post> = graph.iter().cloned().collect();
        let reloaded = PostGraph::load(RevisionConfig::default(), records).unwrap();
        assert_eq!(reloaded.latest(id).unwrap().id, revision_id);
    }

    #[test]
    fn test_clone_from_copies_fields_only() {
        let (mut graph, id) = graph_with_post();
        let revision_id = graph.create_revision(id).unwrap();
        graph
            .commit_autosave(revision_id, Utc::now(), Some(3))
            .unwrap();
        let other = graph.insert(Post::new_local(PostKind::Page, Uuid::new_v4(), Utc::now()));
        graph.take_changes();

        graph.clone_from(revision_id, other).unwrap();

        let revision = graph.get(revision_id).unwrap();
        assert_eq!(revision.fields, graph.get(other).unwrap().fields);
        assert_eq!(revision.original, Some(id));
        assert!(revision.revision.is_none());
        assert!(revision.autosave.is_some());
        assert_eq!(graph.get(id).unwrap().revision, Some(revision_id));

        let changes = graph.take_changes();
        let saved: Vec<PostId> = changes.saved.iter().map(|p| p.id).collect();
        assert_eq!(saved, vec![revision_id]);
    }

    #[test]
    fn test_update_record_keeps_linkage() {
        let (mut graph, id) = graph_with_post();
        let revision_id = graph.create_revision(id).unwrap();
        let stamp = graph.get(id).unwrap().fields.date_modified;

        graph
            .update_record(id, |p| {
                p.revision = None;
                p.fields.title = "Synced".to_string();
            })
            .unwrap();

        let post = graph.get(id).unwrap();
        assert_eq!(post.revision, Some(revision_id));
        assert_eq!(post.fields.title, "Synced");
        assert_eq!(post.fields.date_modified, stamp);
    }

    #[test]
    fn test_autosave_only_on_revisions() {
        let (mut graph, id) = graph_with_post();
        assert!(matches!(
            graph.commit_autosave(id, Utc::now(), None),
            Err(DomainError::InvalidState(_))
        ));

        let revision_id = graph.create_revision(id).unwrap();
        graph
            .edit(revision_id, Utc::now(), |f| f.title = "Snap".to_string())
            .unwrap();
        let snapshot = graph.commit_autosave(revision_id, Utc::now(), Some(8)).unwrap();
        assert_eq!(snapshot.title.as_deref(), Some("Snap"));
        assert_eq!(snapshot.identifier, Some(8));
    }

    #[test]
    fn test_find_by_foreign_id_skips_revisions() {
        let (mut graph, id) = graph_with_post();
        let foreign_id = graph.get(id).unwrap().fields.foreign_id.unwrap();
        graph.create_revision(id).unwrap();
        assert_eq!(graph.find_by_foreign_id(foreign_id).unwrap().id, id);
    }

    #[test]
    fn test_load_rejects_asymmetric_links() {
        let mut original = Post::new_local(PostKind::Post, Uuid::nil(), Utc::now());
        let revision = Post::new_local(PostKind::Post, Uuid::nil(), Utc::now());
        original.revision = Some(revision.id);

        let err = PostGraph::load(RevisionConfig::default(), [original.clone(), revision]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));

        let mut linked = Post::new_local(PostKind::Post, Uuid::nil(), Utc::now());
        linked.original = Some(original.id);
        original.revision = Some(linked.id);
        let graph = PostGraph::load(RevisionConfig::default(), [original.clone(), linked]).unwrap();
        assert!(graph.has_revision(original.id));
        assert!(!graph.has_pending_changes());
    }

    #[test]
    fn test_restore_changes_after_failed_flush() {
        let (mut graph, id) = graph_with_post();
        let changes = graph.take_changes();
        assert_eq!(changes.saved.len(), 1);
        assert!(!graph.has_pending_changes());

        graph.restore_changes(changes);
        assert!(graph.has_pending_changes());
        assert_eq!(graph.take_changes().saved[0].id, id);
    }
}
