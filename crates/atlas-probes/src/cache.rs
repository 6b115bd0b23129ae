//! ProbeCache: TTL cache over the probe registry.
//!
//! One cache entry per version: the payload, its creation time and its
//! invalidation time, each under its own key (see [`CacheKey`]). Times are
//! stored as epoch milliseconds.
//!
//! A stale or missing entry wipes the whole namespace before the registry
//! is fetched again, so nothing written under an older version survives a
//! refresh. A failed refresh returns the error; an expired payload is
//! never served.
//!
//! Concurrent callers are not serialized. Two callers that both see a stale
//! entry will both wipe and repopulate; the last write wins.

use std::sync::Arc;

use atlas_client::AtlasClient;
use atlas_client::normalize::decode_failure;
use atlas_core::{Clock, CompactProbeRecord, ErrorEnvelope, FailureKind, ProbeId};
use atlas_state::{KeyValueStore, StoreError, get_json, to_json};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::codec::{Probe, decode};
use crate::keys::{CacheKey, LogicalKey};

/// Result of looking up one probe id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProbeLookup {
    Found(Probe),
    NotFound { id: ProbeId, error: &'static str },
}

impl ProbeLookup {
    fn not_found(id: ProbeId) -> Self {
        ProbeLookup::NotFound {
            id,
            error: "not found",
        }
    }

    pub fn probe(&self) -> Option<&Probe> {
        match self {
            ProbeLookup::Found(probe) => Some(probe),
            ProbeLookup::NotFound { .. } => None,
        }
    }
}

/// Staleness report for the active cache version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatus {
    pub version: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub invalidate_at: Option<DateTime<Utc>>,
    pub is_stale: bool,
    /// Seconds until the entry goes stale; zero once it has.
    pub remaining_secs: i64,
}

pub struct ProbeCache {
    store: Arc<dyn KeyValueStore>,
    client: AtlasClient,
    clock: Arc<dyn Clock>,
    version: u32,
    ttl: TimeDelta,
}

impl ProbeCache {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        client: AtlasClient,
        clock: Arc<dyn Clock>,
        version: u32,
        ttl: TimeDelta,
    ) -> Self {
        Self {
            store,
            client,
            clock,
            version,
            ttl,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    fn key(&self, key: LogicalKey) -> String {
        CacheKey::new(self.version, key).storage_key()
    }

    /// The full registry, from the store while fresh, from the API otherwise.
    pub async fn all_probes(&self) -> Result<Vec<CompactProbeRecord>, ErrorEnvelope> {
        let now = self.clock.now();
        let invalidate_at: Option<i64> = self.read(LogicalKey::InvalidateAt).await?;

        match invalidate_at {
            Some(at) if now.timestamp_millis() <= at => {
                match self.read::<Vec<CompactProbeRecord>>(LogicalKey::Payload).await? {
                    Some(probes) => {
                        let hours_left = (at - now.timestamp_millis()) as f64 / 3_600_000.0;
                        debug!(version = self.version, hours_left, "probe cache hit");
                        return Ok(probes);
                    }
                    // Timestamp written but payload gone: another caller is
                    // mid-refresh.
                    None => debug!(version = self.version, "probe cache payload missing"),
                }
            }
            Some(_) => info!(version = self.version, "probe cache is stale"),
            None => info!(version = self.version, "probe cache is empty"),
        }

        self.refresh(now).await
    }

    async fn refresh(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CompactProbeRecord>, ErrorEnvelope> {
        let invalidate_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            ErrorEnvelope::custom(
                FailureKind::CacheStore,
                format!("The probes cache TTL of {} is out of range.", self.ttl),
            )
        })?;

        self.store.clear().await.map_err(store_failure)?;

        let probes = self.client.probe_registry().await?;

        let entries = vec![
            (
                self.key(LogicalKey::InvalidateAt),
                to_json(&invalidate_at.timestamp_millis()).map_err(store_failure)?,
            ),
            (
                self.key(LogicalKey::CreatedAt),
                to_json(&now.timestamp_millis()).map_err(store_failure)?,
            ),
            (
                self.key(LogicalKey::Payload),
                to_json(&probes).map_err(store_failure)?,
            ),
        ];
        self.store.set_many(entries).await.map_err(store_failure)?;

        info!(
            version = self.version,
            probes = probes.len(),
            %invalidate_at,
            "probe cache repopulated"
        );
        Ok(probes)
    }

    /// Look up each id in the cached registry. Output order follows `ids`;
    /// unknown ids yield a `NotFound` stub instead of failing the batch.
    pub async fn current_probes_info(
        &self,
        ids: &[ProbeId],
    ) -> Result<Vec<ProbeLookup>, ErrorEnvelope> {
        let probes = self.all_probes().await?;
        let lookups = ids
            .iter()
            .map(|&id| match probes.iter().find(|p| p.probe_id() == Some(id)) {
                Some(record) => ProbeLookup::Found(decode(record)),
                None => {
                    debug!(probe = id, "probe not found");
                    ProbeLookup::not_found(id)
                }
            })
            .collect();
        Ok(lookups)
    }

    /// Every cached probe that has coordinates, decoded.
    pub async fn located_probes(&self) -> Result<Vec<Probe>, ErrorEnvelope> {
        let probes = self.all_probes().await?;
        Ok(probes
            .iter()
            .filter(|p| p.is_located())
            .map(decode)
            .collect())
    }

    /// Report how fresh the active entry is without refreshing it.
    pub async fn status(&self) -> Result<CacheStatus, ErrorEnvelope> {
        let now = self.clock.now();
        let created_at = self
            .read::<i64>(LogicalKey::CreatedAt)
            .await?
            .and_then(DateTime::from_timestamp_millis);
        let invalidate_at = self
            .read::<i64>(LogicalKey::InvalidateAt)
            .await?
            .and_then(DateTime::from_timestamp_millis);

        let (is_stale, remaining_secs) = match invalidate_at {
            Some(at) if now <= at => (false, (at - now).num_seconds()),
            _ => (true, 0),
        };
        Ok(CacheStatus {
            version: self.version,
            created_at,
            invalidate_at,
            is_stale,
            remaining_secs,
        })
    }

    async fn read<T: DeserializeOwned>(
        &self,
        key: LogicalKey,
    ) -> Result<Option<T>, ErrorEnvelope> {
        let key = self.key(key);
        get_json(self.store.as_ref(), &key)
            .await
            .map_err(store_failure)
    }
}

/// Fold a store error into an envelope. A stored value that no longer
/// decodes is a decode failure; everything else is a store failure.
pub fn store_failure(err: StoreError) -> ErrorEnvelope {
    let envelope = match err {
        StoreError::Deserialize(_) => decode_failure(None),
        other => ErrorEnvelope::custom(
            FailureKind::CacheStore,
            format!("The local probes cache could not be used: {other}"),
        ),
    };
    warn!(kind = %envelope.kind, detail = %envelope.detail, "probe cache store failed");
    envelope
}
