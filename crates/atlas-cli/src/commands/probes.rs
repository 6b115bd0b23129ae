use atlas_core::ProbeId;

use super::{Context, emit};

pub async fn list(ctx: &Context, located: bool) -> anyhow::Result<()> {
    let cache = ctx.probe_cache()?;
    if located {
        emit(cache.located_probes().await)
    } else {
        emit(cache.all_probes().await)
    }
}

pub async fn info(ctx: &Context, ids: &[ProbeId]) -> anyhow::Result<()> {
    emit(ctx.probe_cache()?.current_probes_info(ids).await)
}

pub async fn status(ctx: &Context) -> anyhow::Result<()> {
    emit(ctx.probe_cache()?.status().await)
}
