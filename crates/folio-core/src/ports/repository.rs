use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Post, PostId};
use crate::error::RepoError;

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Save an entity (create or update).
    async fn save(&self, entity: T) -> Result<T, RepoError>;

    /// Delete an entity by its ID.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// Post storage. Holds originals and revisions alike; linkage is stored
/// with each record.
#[async_trait]
pub trait PostRepository: BaseRepository<Post, PostId> {
    /// Find an original by the ID it was given before it had a server ID.
    async fn find_by_foreign_id(&self, foreign_id: Uuid) -> Result<Option<Post>, RepoError>;

    /// Every stored record.
    async fn list(&self) -> Result<Vec<Post>, RepoError>;
}
