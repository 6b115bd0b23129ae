//! KeyValueStore: the async store interface and its redb backend.
//!
//! The interface is small: `get`, `set`, an atomic
//! `set_many`, and `clear` for the whole namespace. `RedbStore` supports
//! both on-disk and in-memory databases (the latter for testing).

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use redb::{Database, ReadableDatabase};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::tables::namespace_table;

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Namespaced, asynchronous, fallible key/value store.
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`, `None` if absent.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>>;

    /// Insert or overwrite a single key.
    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>) -> StoreFuture<'a, ()>;

    /// Write several keys in one transaction: all land or none do.
    fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> StoreFuture<'_, ()>;

    /// Remove every key in the namespace.
    fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Read and JSON-decode the value under `key`.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(key).await? {
        Some(bytes) => {
            let value = serde_json::from_slice(&bytes).map_err(map_err!(Deserialize))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// JSON-encode a value for storage.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

/// Thread-safe key/value store backed by redb.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
    namespace: Arc<str>,
}

impl RedbStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path, namespace: &str) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            namespace: Arc::from(namespace),
        };
        store.ensure_table()?;
        debug!(?path, namespace, "store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory(namespace: &str) -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            namespace: Arc::from(namespace),
        };
        store.ensure_table()?;
        debug!(namespace, "in-memory store opened");
        Ok(store)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Create the namespace table if it doesn't exist yet.
    fn ensure_table(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(namespace_table(&self.namespace))
            .map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_blocking(db: &Database, namespace: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let txn = db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn
            .open_table(namespace_table(namespace))
            .map_err(map_err!(Table))?;
        let value = table
            .get(key)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn set_many_blocking(
        db: &Database,
        namespace: &str,
        entries: &[(String, Vec<u8>)],
    ) -> StoreResult<()> {
        let txn = db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn
                .open_table(namespace_table(namespace))
                .map_err(map_err!(Table))?;
            for (key, value) in entries {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn clear_blocking(db: &Database, namespace: &str) -> StoreResult<()> {
        let txn = db.begin_write().map_err(map_err!(Transaction))?;
        txn.delete_table(namespace_table(namespace))
            .map_err(map_err!(Table))?;
        txn.open_table(namespace_table(namespace))
            .map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Run a blocking redb closure off the async executor.
    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &str) -> StoreResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let namespace = Arc::clone(&self.namespace);
        tokio::task::spawn_blocking(move || op(&*db, &*namespace))
            .await
            .map_err(map_err!(Task))?
    }
}

impl KeyValueStore for RedbStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
        let key = key.to_string();
        Box::pin(self.run(move |db, ns| Self::get_blocking(db, ns, &key)))
    }

    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>) -> StoreFuture<'a, ()> {
        let entries = vec![(key.to_string(), value)];
        Box::pin(async move {
            self.run(move |db, ns| Self::set_many_blocking(db, ns, &entries))
                .await?;
            debug!(%key, "key stored");
            Ok(())
        })
    }

    fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let count = entries.len();
            self.run(move |db, ns| Self::set_many_blocking(db, ns, &entries))
                .await?;
            debug!(count, "keys stored");
            Ok(())
        })
    }

    fn clear(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.run(Self::clear_blocking).await?;
            debug!(namespace = %self.namespace, "namespace cleared");
            Ok(())
        })
    }
}
