//! PostgreSQL post repository.

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, QueryFilter};
use uuid::Uuid;

use folio_core::domain::{Post, PostId};
use folio_core::error::RepoError;
use folio_core::ports::{BaseRepository, PostRepository};

use super::entity::post::{self, ActiveModel, Entity as PostEntity};

fn query_error(e: DbErr) -> RepoError {
    let err_str = e.to_string();
    if err_str.contains("duplicate") || err_str.contains("unique") {
        RepoError::Constraint("Post already exists".to_string())
    } else {
        RepoError::Query(err_str)
    }
}

/// Post repository over a SeaORM connection.
pub struct PostgresPostRepository {
    pub(crate) db: DbConn,
}

impl PostgresPostRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BaseRepository<Post, PostId> for PostgresPostRepository {
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepoError> {
        let result = PostEntity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(query_error)?;

        result.map(Post::try_from).transpose()
    }

    async fn save(&self, post: Post) -> Result<Post, RepoError> {
        let exists = PostEntity::find_by_id(post.id.0)
            .one(&self.db)
            .await
            .map_err(query_error)?
            .is_some();

        let active_model = ActiveModel::try_from(&post)?;
        let model = if exists {
            active_model.update(&self.db).await
        } else {
            active_model.insert(&self.db).await
        }
        .map_err(query_error)?;

        tracing::debug!(post_id = %post.id, inserted = !exists, "Post stored");
        Post::try_from(model)
    }

    async fn delete(&self, id: PostId) -> Result<(), RepoError> {
        let result = PostEntity::delete_by_id(id.0)
            .exec(&self.db)
            .await
            .map_err(query_error)?;

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }

        Ok(())
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn find_by_foreign_id(&self, foreign_id: Uuid) -> Result<Option<Post>, RepoError> {
        let result = PostEntity::find()
            .filter(post::Column::ForeignId.eq(foreign_id))
            .filter(post::Column::OriginalId.is_null())
            .one(&self.db)
            .await
            .map_err(query_error)?;

        result.map(Post::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<Post>, RepoError> {
        let result = PostEntity::find()
            .all(&self.db)
            .await
            .map_err(query_error)?;

        result.into_iter().map(Post::try_from).collect()
    }
}
