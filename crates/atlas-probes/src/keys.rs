//! Version-qualified cache keys.

use std::fmt;

const KEY_PREFIX: &str = "currentProbes";

/// Which value of a cache entry a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalKey {
    Payload,
    InvalidateAt,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub version: u32,
    pub key: LogicalKey,
}

impl CacheKey {
    pub fn new(version: u32, key: LogicalKey) -> Self {
        Self { version, key }
    }

    /// The string the store sees. Keys of different versions never collide.
    pub fn storage_key(&self) -> String {
        let suffix = match self.key {
            LogicalKey::Payload => "",
            LogicalKey::InvalidateAt => "_invalidate_timestamp",
            LogicalKey::CreatedAt => "_created_timestamp",
        };
        format!("{KEY_PREFIX}_{}{suffix}", self.version)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}
