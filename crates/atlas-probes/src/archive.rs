//! Historical probe snapshots.
//!
//! The archive goes back further than 2015, but before then the registry
//! was too sparse to be useful, so earlier dates are answered with the
//! 2015-01-01 snapshot and an annotation saying so.

use atlas_client::AtlasClient;
use atlas_core::{CompactProbeRecord, ErrorEnvelope, ProbeId};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use tracing::debug;

/// 2015-01-01T00:00:00Z as epoch seconds.
const ARCHIVE_CUTOFF_SECS: i64 = 1_420_070_400;

/// Id lists this long or longer are not sent as a filter.
pub const MAX_FILTER_IDS: usize = 500;

pub const CUTOFF_ANNOTATION: &str =
    "No probes information for this date, using the oldest available";

pub fn archive_cutoff() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(ARCHIVE_CUTOFF_SECS)
}

/// What will be asked of the archive endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSnapshotRequest {
    /// The effective day, after cutoff substitution.
    pub date: NaiveDate,
    pub probe_ids: Option<Vec<ProbeId>>,
    pub cutoff_applied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveSnapshot {
    pub probes_properties: Vec<CompactProbeRecord>,
    /// The day actually queried. Show this, not the requested date.
    pub archive_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

/// Decide which day to query and whether to filter by id.
pub fn plan(probe_ids: &[ProbeId], requested: DateTime<Utc>) -> ArchiveSnapshotRequest {
    let cutoff = archive_cutoff();
    let cutoff_applied = requested <= cutoff;
    let effective = if cutoff_applied { cutoff } else { requested };
    let probe_ids = (!probe_ids.is_empty() && probe_ids.len() < MAX_FILTER_IDS)
        .then(|| probe_ids.to_vec());

    ArchiveSnapshotRequest {
        date: effective.date_naive(),
        probe_ids,
        cutoff_applied,
    }
}

#[derive(Clone)]
pub struct ArchiveResolver {
    client: AtlasClient,
}

impl ArchiveResolver {
    pub fn new(client: AtlasClient) -> Self {
        Self { client }
    }

    /// Fetch the archived registry closest to `requested`. Goes straight
    /// to the API; snapshots are not cached.
    pub async fn resolve(
        &self,
        probe_ids: &[ProbeId],
        requested: DateTime<Utc>,
    ) -> Result<ArchiveSnapshot, ErrorEnvelope> {
        let request = plan(probe_ids, requested);
        debug!(
            %requested,
            date = %request.date,
            filtered = request.probe_ids.is_some(),
            cutoff_applied = request.cutoff_applied,
            "resolving probe archive"
        );

        let probes_properties = self
            .client
            .probe_archive(request.date, request.probe_ids.as_deref())
            .await?;

        Ok(ArchiveSnapshot {
            probes_properties,
            archive_date: request.date,
            annotation: request
                .cutoff_applied
                .then(|| CUTOFF_ANNOTATION.to_string()),
        })
    }
}
