use atlas_core::ProbeId;
use atlas_probes::ArchiveResolver;
use chrono::{NaiveDate, NaiveTime};

use super::{Context, emit};

pub async fn resolve(ctx: &Context, date: NaiveDate, probe_ids: &[ProbeId]) -> anyhow::Result<()> {
    let resolver = ArchiveResolver::new(ctx.client()?);
    let requested = date.and_time(NaiveTime::MIN).and_utc();
    emit(resolver.resolve(probe_ids, requested).await)
}
