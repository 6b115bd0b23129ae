use atlas_client::{MeasurementId, MeasurementQuery, StopMode};

use super::{Context, emit};

pub async fn show(
    ctx: &Context,
    id: MeasurementId,
    fields: Vec<String>,
    es: bool,
) -> anyhow::Result<()> {
    let query = MeasurementQuery {
        use_es: es.then_some(true),
        fields,
    };
    emit(ctx.client()?.measurement_detail(id, &query).await)
}

pub async fn stop(ctx: &Context, id: MeasurementId, dummy: bool) -> anyhow::Result<()> {
    let mode = if dummy { StopMode::Dummy } else { StopMode::Live };
    emit(ctx.client()?.stop_measurement(id, mode).await)
}

pub async fn members(ctx: &Context, id: MeasurementId) -> anyhow::Result<()> {
    emit(ctx.client()?.measurement_group_members(id, None).await)
}

pub async fn participants(ctx: &Context, id: MeasurementId) -> anyhow::Result<()> {
    emit(ctx.client()?.participating_probes(id, None).await)
}
