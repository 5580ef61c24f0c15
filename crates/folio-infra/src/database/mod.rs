//! PostgreSQL post storage via SeaORM.

mod connections;
pub mod entity;
mod postgres_repo;

pub use connections::{DatabaseConfig, connect, ensure_schema};
pub use postgres_repo::PostgresPostRepository;
