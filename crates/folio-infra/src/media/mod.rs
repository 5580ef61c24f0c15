//! Media catalog implementations.

mod memory;

pub use memory::InMemoryMediaCatalog;
