//! Post storage implementations - in-memory fallback. The Postgres
//! repository lives in [`crate::database`].

mod memory;

pub use memory::InMemoryPostRepository;
