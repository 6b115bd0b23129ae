//! atlas-probes: the probe registry as callers see it.
//!
//! [`ProbeCache`] keeps the full registry in a [`KeyValueStore`](atlas_state::KeyValueStore)
//! for a fixed TTL and hands out compact records or decoded [`Probe`]s;
//! [`ArchiveResolver`] fetches dated snapshots from the archive endpoint.

pub mod archive;
pub mod cache;
pub mod codec;
pub mod keys;

pub use archive::{ArchiveResolver, ArchiveSnapshot, ArchiveSnapshotRequest, plan};
pub use cache::{CacheStatus, ProbeCache, ProbeLookup};
pub use codec::{Probe, decode, decode_all};
pub use keys::{CacheKey, LogicalKey};
