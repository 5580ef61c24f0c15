//! # Folio Core
//!
//! The domain layer of Folio: post records, the original/revision graph,
//! divergence detection and publish status projection.
//! This crate contains pure, synchronous logic with zero infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod legacy;
pub mod ports;

pub use domain::{Post, PostGraph, PostId, PostStatus};
pub use error::{DomainError, RepoError};

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
