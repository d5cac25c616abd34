//! Durable key/value storage and the TTL cache built on it.
//!
//! - [`KeyValueStore`] - the storage seam (`get` / `set` / `remove`)
//! - [`MemoryStore`] - in-process default, with an optional quota
//! - [`Database`] - SQLite-backed store for state that survives restarts
//! - [`TtlCache`] - expiring JSON entries under a key prefix

mod kv;
mod schema;
mod ttl_cache;
mod types;

pub use kv::{KeyValueStore, MemoryStore};
pub use schema::Database;
pub use ttl_cache::{TtlCache, DEFAULT_TTL, PICKER_CACHE_PREFIX};
pub use types::{DatabaseError, StorageError};
