//! # Folio Infrastructure
//!
//! Concrete implementations of the ports defined in `folio-core`, and the
//! [`PostWorkspace`] that serializes access to the post graph and owns the
//! save boundary.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - In-memory storage only
//! - `postgres` - PostgreSQL post storage via SeaORM

pub mod media;
pub mod scan;
pub mod storage;
pub mod workspace;

#[cfg(feature = "postgres")]
pub mod database;

// Re-exports - In-Memory
pub use media::InMemoryMediaCatalog;
pub use scan::FirstImageScanner;
pub use storage::InMemoryPostRepository;
pub use workspace::{PostReport, PostWorkspace, SaveSummary};

// Re-exports - Postgres
#[cfg(feature = "postgres")]
pub use database::{DatabaseConfig, PostgresPostRepository};
