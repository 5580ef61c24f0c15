//! Application state - shared across all handlers.

use std::sync::Arc;

use folio_core::DomainResult;
use folio_core::domain::RevisionConfig;
use folio_core::ports::PostRepository;
use folio_infra::{InMemoryPostRepository, PostWorkspace};

use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub workspace: Arc<PostWorkspace>,
}

impl AppState {
    /// Open the post workspace over the configured storage.
    ///
    /// Without `DATABASE_URL` posts live in memory. A configured database
    /// that cannot be reached is an error: edits must not silently go to a
    /// store that forgets them.
    pub async fn new(config: &AppConfig) -> DomainResult<Self> {
        let revisions = RevisionConfig {
            allow_chaining: config.revision_chaining,
        };
        let repo = Self::repository(config).await?;
        let workspace = PostWorkspace::open(repo, revisions).await?;

        tracing::info!(
            revision_chaining = revisions.allow_chaining,
            "Application state initialized"
        );
        Ok(Self::from_workspace(workspace))
    }

    pub fn from_workspace(workspace: PostWorkspace) -> Self {
        Self {
            workspace: Arc::new(workspace),
        }
    }

    #[cfg(feature = "postgres")]
    async fn repository(config: &AppConfig) -> DomainResult<Arc<dyn PostRepository>> {
        use folio_core::error::RepoError;
        use folio_infra::database::{self, DatabaseConfig};
        use folio_infra::PostgresPostRepository;

        let Some(settings) = &config.database else {
            tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
            return Ok(Arc::new(InMemoryPostRepository::new()));
        };

        let db_config = DatabaseConfig {
            url: settings.url.clone(),
            max_connections: settings.max_connections,
            min_connections: settings.min_connections,
        };
        let db = database::connect(&db_config)
            .await
            .map_err(|e| RepoError::Connection(e.to_string()))?;
        database::ensure_schema(&db)
            .await
            .map_err(|e| RepoError::Query(e.to_string()))?;
        Ok(Arc::new(PostgresPostRepository::new(db)))
    }

    #[cfg(not(feature = "postgres"))]
    async fn repository(config: &AppConfig) -> DomainResult<Arc<dyn PostRepository>> {
        if config.database.is_some() {
            tracing::warn!("Built without postgres feature - ignoring DATABASE_URL");
        }
        tracing::info!("Using in-memory post repository");
        Ok(Arc::new(InMemoryPostRepository::new()))
    }
}
