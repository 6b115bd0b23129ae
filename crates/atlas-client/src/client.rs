//! `AtlasClient`: one entry point for every remote call.
//!
//! Each call is sent through the injected transport, classified by
//! [`normalize`](crate::normalize::normalize) and, on failure, logged once
//! with its failure kind before the envelope is handed back.

use std::sync::Arc;

use atlas_core::{AtlasConfig, CompactProbeRecord, ErrorEnvelope, ProbeId};
use chrono::NaiveDate;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::connectivity::{Connectivity, TcpConnectivity};
use crate::endpoints::Endpoints;
use crate::measurements::MeasurementId;
use crate::normalize::{Expectation, Operation, Reply, TransportOutcome, decode_failure, normalize};
use crate::transport::{ApiRequest, HttpTransport, HyperTransport};

const PROBE_REGISTRY: Operation = Operation::named("probe_registry")
    .failure_detail("An error occured while trying to load the probes registry.");
const PROBE_ARCHIVE: Operation = Operation::named("probe_archive")
    .failure_detail("An error occured while trying to load the probes archive.");
const PROBE_DETAIL: Operation = Operation::named("probe_detail")
    .failure_detail("An error occured while trying to load the probe information.");
const TRENDS_SUMMARY: Operation = Operation::named("trends_summary")
    .failure_detail("An error occured while trying to load the trends summary.");

#[derive(Deserialize)]
struct RegistryBody {
    probes: Vec<CompactProbeRecord>,
}

#[derive(Deserialize)]
struct ArchiveBody {
    results: Vec<CompactProbeRecord>,
}

#[derive(Clone)]
pub struct AtlasClient {
    transport: Arc<dyn HttpTransport>,
    connectivity: Arc<dyn Connectivity>,
    endpoints: Endpoints,
    api_key: Option<String>,
}

impl AtlasClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        connectivity: Arc<dyn Connectivity>,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            transport,
            connectivity,
            endpoints,
            api_key: None,
        }
    }

    /// Send `Authorization: Key <key>` on every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Build the production client described by `atlas.toml`.
    pub fn from_config(config: &AtlasConfig) -> anyhow::Result<Self> {
        let transport = HyperTransport::new()?;
        let connectivity = TcpConnectivity::new(
            config.connectivity.address.clone(),
            config.connectivity_timeout()?,
        );
        let mut client = Self::new(
            Arc::new(transport),
            Arc::new(connectivity),
            Endpoints::new(&config.api),
        );
        client.api_key = config.api.api_key.clone();
        Ok(client)
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Send one request and classify the outcome.
    pub async fn call(
        &self,
        operation: &Operation,
        mut request: ApiRequest,
        expectation: Expectation,
    ) -> Result<Reply, ErrorEnvelope> {
        if let Some(key) = &self.api_key {
            request = request.header("authorization", format!("Key {key}"));
        }
        let method = request.method.clone();
        let url = request.url.clone();
        debug!(operation = operation.name, %method, %url, "sending request");

        let result = match self.transport.send(request).await {
            Ok(response) => normalize(
                TransportOutcome::Responded {
                    status: response.status,
                    body: &response.body[..],
                },
                expectation,
                operation,
            ),
            Err(e) => {
                let online = self.connectivity.is_online().await;
                debug!(operation = operation.name, %url, error = %e, online, "no response");
                normalize(TransportOutcome::Failed { online }, expectation, operation)
            }
        };

        if let Err(envelope) = &result {
            report(operation, &url, envelope);
        }
        result
    }

    /// GET `url` and return the JSON body untyped.
    pub async fn get_json(
        &self,
        operation: &Operation,
        url: String,
    ) -> Result<Value, ErrorEnvelope> {
        let reply = self
            .call(operation, ApiRequest::get(url), Expectation::Json)
            .await?;
        Ok(reply.into_value())
    }

    /// Send `request` and decode the JSON body as `T`. A body of the wrong
    /// shape is a decode failure carrying the response status.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        operation: &Operation,
        request: ApiRequest,
    ) -> Result<T, ErrorEnvelope> {
        let url = request.url.clone();
        let reply = self.call(operation, request, Expectation::Json).await?;
        let status = reply.status();
        serde_json::from_value(reply.into_value()).map_err(|e| {
            debug!(operation = operation.name, error = %e, "unexpected response shape");
            let envelope = decode_failure(Some(status));
            report(operation, &url, &envelope);
            envelope
        })
    }

    /// The full probe registry (`/probes/all`).
    pub async fn probe_registry(&self) -> Result<Vec<CompactProbeRecord>, ErrorEnvelope> {
        let body: RegistryBody = self
            .fetch(&PROBE_REGISTRY, ApiRequest::get(self.endpoints.probe_registry()))
            .await?;
        debug!(probes = body.probes.len(), "probe registry fetched");
        Ok(body.probes)
    }

    /// The archived registry for one day.
    pub async fn probe_archive(
        &self,
        date: NaiveDate,
        probe_ids: Option<&[ProbeId]>,
    ) -> Result<Vec<CompactProbeRecord>, ErrorEnvelope> {
        let url = self.endpoints.probe_archive(date, probe_ids);
        let body: ArchiveBody = self.fetch(&PROBE_ARCHIVE, ApiRequest::get(url)).await?;
        debug!(%date, probes = body.results.len(), "probe archive fetched");
        Ok(body.results)
    }

    /// Full record of one probe, `None` when it has no geolocation.
    pub async fn probe_detail(&self, id: ProbeId) -> Result<Option<Value>, ErrorEnvelope> {
        let value = self
            .get_json(&PROBE_DETAIL, self.endpoints.probe(id))
            .await?;
        let located = value.get("geometry").is_some_and(|g| !g.is_null());
        Ok(located.then_some(value))
    }

    pub async fn trends_summary(
        &self,
        measurement: MeasurementId,
        probe: ProbeId,
    ) -> Result<Value, ErrorEnvelope> {
        self.get_json(&TRENDS_SUMMARY, self.endpoints.trends_summary(measurement, probe))
            .await
    }
}

fn report(operation: &Operation, url: &str, envelope: &ErrorEnvelope) {
    warn!(
        operation = operation.name,
        kind = %envelope.kind,
        status = %envelope.status,
        %url,
        detail = %envelope.detail,
        "remote call failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::StaticConnectivity;
    use crate::transport::ScriptedTransport;
    use atlas_core::{EnvelopeStatus, FailureKind};
    use serde_json::json;

    fn client(transport: &ScriptedTransport, online: bool) -> AtlasClient {
        AtlasClient::new(
            Arc::new(transport.clone()),
            Arc::new(StaticConnectivity(online)),
            Endpoints::for_server("atlas.example.net"),
        )
    }

    fn record(id: u32) -> Value {
        json!([id, 3333, 0, "NL", 0, 1, 52.3, 4.9, "193.0.0.0/21", 0, 0, 0, 1, 1_500_000_000])
    }

    #[tokio::test]
    async fn registry_is_read_from_probes_member() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, json!({"probes": [record(1), record(2)]}));

        let probes = client(&transport, true).probe_registry().await.unwrap();
        assert_eq!(probes.len(), 2);
        assert_eq!(probes[1].probe_id(), Some(2));
        assert_eq!(
            transport.requests()[0].url,
            "https://atlas.example.net/api/v2/probes/all"
        );
    }

    #[tokio::test]
    async fn wrong_shape_is_decode_failure_with_status() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, json!({"results": []}));

        let err = client(&transport, true).probe_registry().await.unwrap_err();
        assert_eq!(err.status, EnvelopeStatus::Http(200));
        assert_eq!(err.kind, FailureKind::Decode);
    }

    #[tokio::test]
    async fn offline_is_reported_from_connectivity_probe() {
        let transport = ScriptedTransport::new();
        transport.push_failure();

        let err = client(&transport, false).probe_registry().await.unwrap_err();
        assert_eq!(err.status, EnvelopeStatus::Error);
        assert_eq!(err.message.as_deref(), Some("Browser offline"));

        transport.push_failure();
        let err = client(&transport, true).probe_registry().await.unwrap_err();
        assert_eq!(err.message.as_deref(), Some("unknown error"));
        assert_eq!(
            err.detail,
            "An error occured while trying to load the probes registry."
        );
    }

    #[tokio::test]
    async fn api_key_is_sent() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, json!({"results": []}));

        client(&transport, true)
            .with_api_key("secret")
            .probe_archive(NaiveDate::from_ymd_opt(2016, 6, 1).unwrap(), None)
            .await
            .unwrap();
        let headers = &transport.requests()[0].headers;
        assert!(headers.contains(&("authorization".to_string(), "Key secret".to_string())));
    }

    #[tokio::test]
    async fn probe_without_geometry_is_none() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, json!({"id": 1, "geometry": null}));
        transport.push_json(
            200,
            json!({"id": 2, "geometry": {"type": "Point", "coordinates": [4.9, 52.3]}}),
        );

        let c = client(&transport, true);
        assert!(c.probe_detail(1).await.unwrap().is_none());
        let found = c.probe_detail(2).await.unwrap().unwrap();
        assert_eq!(found["id"], 2);
    }
}
