//! atlas-state: the local, durable key/value store behind the probe cache.
//!
//! Backed by [redb](https://docs.rs/redb). Each store handle is bound to
//! one namespace (one redb table); keys are plain strings and values are
//! opaque bytes, JSON-encoded by the callers through [`get_json`] and
//! [`to_json`].
//!
//! # Architecture
//!
//! ```text
//! KeyValueStore (trait, async, fallible)
//!   ├── RedbStore     on-disk or in-memory redb, blocking work on spawn_blocking
//!   └── MemoryStore   HashMap double with failure injection (for testing)
//! ```
//!
//! Stores are `Clone` + `Send` + `Sync` and can be shared across tasks.

pub mod error;
pub mod memory;
pub mod store;
pub mod tables;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::{KeyValueStore, RedbStore, StoreFuture, get_json, to_json};
