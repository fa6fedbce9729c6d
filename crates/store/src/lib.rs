//! Store backend implementations for redtalon.
//!
//! The `Store` trait itself lives in `redtalon-core`; this crate provides
//! the two backends (durable SQLite, ephemeral in-memory) plus the cosine
//! similarity used by both for embedding lookups.

pub mod memory;
pub mod sqlite;
pub mod vector;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use vector::cosine_similarity;

use std::sync::Arc;

use redtalon_core::{Error, Result, Store};

/// Open the backend named in configuration: `"sqlite"` (durable, at `path`)
/// or `"memory"` (ephemeral).
pub async fn open_store(backend: &str, path: &str) -> Result<Arc<dyn Store>> {
    match backend {
        "sqlite" => Ok(Arc::new(SqliteStore::new(path).await?)),
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        other => Err(Error::Config {
            message: format!("unknown store backend: {other}"),
        }),
    }
}
