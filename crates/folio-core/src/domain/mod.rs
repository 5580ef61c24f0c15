//! Domain entities - post records and the rules over them.

mod divergence;
mod graph;
mod media;
mod post;
pub mod status;

pub use divergence::{
    ChangeDetector, ContentDiffDetector, DivergenceEvaluator, NonBlankPolicy, SavePolicy,
    ServerRevisionDetector, TimestampChangeDetector,
};
pub use graph::{ChangeSet, PostGraph, RevisionConfig};
pub use media::{CommentId, MediaId, MediaInfo, MediaKind, MediaUploadState};
pub use post::{AutosaveSnapshot, Post, PostFields, PostId, PostKind, RemoteInfo, UnknownKind};
pub use status::{PostStatus, UnknownStatus};
