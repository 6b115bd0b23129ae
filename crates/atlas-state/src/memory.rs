//! In-memory `KeyValueStore` (for testing).
//!
//! Counts clears and writes so callers can assert on cache behaviour, and
//! can be told to fail reads or writes to exercise store-failure paths.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{KeyValueStore, StoreFuture};

#[derive(Default)]
struct Inner {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    clears: AtomicUsize,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

/// HashMap-backed store; clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `clear` calls so far.
    pub fn clear_count(&self) -> usize {
        self.inner.clears.load(Ordering::SeqCst)
    }

    /// Number of successful `set`/`set_many` calls so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Sorted snapshot of the keys currently stored.
    pub async fn keys(&self) -> Vec<String> {
        let entries = self.inner.entries.lock().await;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            if self.inner.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::Read("injected read failure".into()));
            }
            Ok(self.inner.entries.lock().await.get(key).cloned())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>) -> StoreFuture<'a, ()> {
        self.set_many(vec![(key.to_string(), value)])
    }

    fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if self.inner.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Write("injected write failure".into()));
            }
            let mut map = self.inner.entries.lock().await;
            map.extend(entries);
            self.inner.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn clear(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if self.inner.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Write("injected write failure".into()));
            }
            self.inner.entries.lock().await.clear();
            self.inner.clears.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}
