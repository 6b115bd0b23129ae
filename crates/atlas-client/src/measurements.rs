//! Measurement adapters and the stop flow.

use atlas_core::{ErrorEnvelope, FailureKind};
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::client::AtlasClient;
use crate::normalize::{Expectation, Operation};
use crate::transport::ApiRequest;

pub type MeasurementId = u64;

pub const STOP_SUCCESS_DETAIL: &str = "The request to stop the measurement was successful.";
pub const API_META_DETAIL: &str = "Could not load API Schema Information";

const DETAIL: Operation = Operation::named("measurement_detail")
    .failure_detail("An error occured while trying to load the measurement.");
const PRIVATE: Operation = Operation::named("measurement_private");
const GROUP_MEMBERS: Operation = Operation::named("measurement_group_members");
const PARTICIPATION_REQUESTS: Operation = Operation::named("participation_requests");
const PARTICIPATING_PROBES: Operation = Operation::named("participating_probes");
const LAST_OF_TYPE: Operation = Operation::named("last_measurement_for_type");
const COSTS: Operation = Operation::named("measurement_costs");
const API_META: Operation = Operation::named("api_meta").failure_detail(API_META_DETAIL);
const MARK_PUBLIC: Operation = Operation::named("mark_public");
const CHANGE_DESCRIPTION: Operation = Operation::named("change_description");
const STOP: Operation = Operation::named("stop_measurement")
    .failure_detail("An error occured while trying to stop the measurement.")
    .unknown_detail(
        "An unknown error occured while trying to send a stop request for the measurement.",
    )
    .rejection_message("Stop failed");

/// Options for a measurement detail lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementQuery {
    /// Backend override; `None` uses the configured default.
    pub use_es: Option<bool>,
    /// Restrict the response to these fields. Empty means everything.
    pub fields: Vec<String>,
}

/// How a stop request is carried out. Callers always pick one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Issue the DELETE.
    Live,
    /// Report success without touching the network.
    Dummy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopState {
    Requested,
    Success,
    Failed,
}

impl StopState {
    /// Move out of `Requested` according to the outcome. Terminal states
    /// stay where they are.
    pub fn settle<T>(self, outcome: &Result<T, ErrorEnvelope>) -> StopState {
        match (self, outcome) {
            (StopState::Requested, Ok(_)) => StopState::Success,
            (StopState::Requested, Err(_)) => StopState::Failed,
            (terminal, _) => terminal,
        }
    }
}

/// Confirmation of a stopped measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopConfirmation {
    pub status: u16,
    pub message: String,
    pub detail: String,
}

impl StopConfirmation {
    fn stopped(status: u16) -> Self {
        Self {
            status,
            message: "success".into(),
            detail: STOP_SUCCESS_DETAIL.into(),
        }
    }

    fn dummy() -> Self {
        Self {
            status: 204,
            message: "success".into(),
            detail: "dummy success".into(),
        }
    }
}

/// Cost estimate request for a prospective measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct CostRequest {
    /// One measurement definition, as key/value pairs.
    pub definition: Map<String, Value>,
    /// Number of probes requested from the worldwide area.
    pub probes_requested: u32,
    pub is_oneoff: bool,
}

impl CostRequest {
    pub fn body(&self) -> Value {
        json!({
            "definitions": [self.definition],
            "probes": [{"type": "area", "value": "WW", "requested": self.probes_requested}],
            "is_oneoff": self.is_oneoff,
        })
    }
}

#[derive(Deserialize)]
struct GroupBody {
    group_members: Vec<Value>,
}

#[derive(Deserialize)]
struct ProbesBody {
    probes: Vec<Value>,
}

#[derive(Deserialize)]
struct IdPage {
    #[serde(default)]
    results: Vec<IdOnly>,
}

#[derive(Deserialize)]
struct IdOnly {
    id: MeasurementId,
}

impl AtlasClient {
    pub async fn measurement_detail(
        &self,
        id: MeasurementId,
        query: &MeasurementQuery,
    ) -> Result<Value, ErrorEnvelope> {
        let url = self
            .endpoints()
            .measurement_fields(id, query.use_es, &query.fields);
        self.get_json(&DETAIL, url).await
    }

    pub async fn measurement_private(&self, id: MeasurementId) -> Result<Value, ErrorEnvelope> {
        self.get_json(&PRIVATE, self.endpoints().measurement_private(id))
            .await
    }

    pub async fn measurement_group_members(
        &self,
        id: MeasurementId,
        use_es: Option<bool>,
    ) -> Result<Vec<Value>, ErrorEnvelope> {
        let url = self.endpoints().measurement_group(id, use_es);
        let body: GroupBody = self.fetch(&GROUP_MEMBERS, ApiRequest::get(url)).await?;
        Ok(body.group_members)
    }

    pub async fn participation_requests(&self, id: MeasurementId) -> Result<Value, ErrorEnvelope> {
        self.get_json(
            &PARTICIPATION_REQUESTS,
            self.endpoints().participation_requests(id),
        )
        .await
    }

    pub async fn participating_probes(
        &self,
        id: MeasurementId,
        use_es: Option<bool>,
    ) -> Result<Vec<Value>, ErrorEnvelope> {
        let url = self.endpoints().participating_probes(id, use_es);
        let body: ProbesBody = self
            .fetch(&PARTICIPATING_PROBES, ApiRequest::get(url))
            .await?;
        Ok(body.probes)
    }

    /// Id of the newest measurement of `kind` ("ping", "traceroute", ...).
    pub async fn last_measurement_for_type(
        &self,
        kind: &str,
        use_es: Option<bool>,
    ) -> Result<Option<MeasurementId>, ErrorEnvelope> {
        let url = self.endpoints().last_measurement_of_type(kind, use_es);
        let page: IdPage = self.fetch(&LAST_OF_TYPE, ApiRequest::get(url)).await?;
        Ok(page.results.first().map(|m| m.id))
    }

    pub async fn measurement_costs(&self, request: &CostRequest) -> Result<Value, ErrorEnvelope> {
        let body = serde_json::to_vec(&request.body()).map_err(|e| {
            ErrorEnvelope::custom(
                FailureKind::Decode,
                format!("could not encode cost request: {e}"),
            )
        })?;
        let request = ApiRequest::new(Method::OPTIONS, self.endpoints().measurements(None, false))
            .json_body(body);
        let reply = self.call(&COSTS, request, Expectation::Json).await?;
        Ok(reply.into_value())
    }

    /// Schema metadata for the measurements API. Any failure to reach the
    /// server is reported as a `customErr`.
    pub async fn api_meta(&self) -> Result<Value, ErrorEnvelope> {
        self.get_json(&API_META, self.endpoints().api_meta())
            .await
            .map_err(|e| match e.kind {
                FailureKind::Transport | FailureKind::Connectivity => {
                    ErrorEnvelope::custom(e.kind, API_META_DETAIL)
                }
                _ => e,
            })
    }

    pub async fn mark_public(&self, id: MeasurementId) -> Result<Value, ErrorEnvelope> {
        self.patch(&MARK_PUBLIC, id, json!({"is_public": true})).await
    }

    pub async fn change_description(
        &self,
        id: MeasurementId,
        description: &str,
    ) -> Result<Value, ErrorEnvelope> {
        self.patch(&CHANGE_DESCRIPTION, id, json!({"description": description}))
            .await
    }

    async fn patch(
        &self,
        operation: &Operation,
        id: MeasurementId,
        body: Value,
    ) -> Result<Value, ErrorEnvelope> {
        let request = ApiRequest::new(Method::PATCH, self.endpoints().measurement(id, None))
            .json_body(body.to_string().into_bytes());
        let reply = self.call(operation, request, Expectation::Json).await?;
        Ok(reply.into_value())
    }

    /// Stop a running measurement. Only `204 No Content` counts as success.
    pub async fn stop_measurement(
        &self,
        id: MeasurementId,
        mode: StopMode,
    ) -> Result<StopConfirmation, ErrorEnvelope> {
        let state = StopState::Requested;
        debug!(msm = id, ?mode, ?state, "stop requested");

        let outcome = match mode {
            StopMode::Dummy => Ok(StopConfirmation::dummy()),
            StopMode::Live => {
                let request =
                    ApiRequest::new(Method::DELETE, self.endpoints().measurement(id, None));
                self.call(&STOP, request, Expectation::NoContent)
                    .await
                    .map(|reply| StopConfirmation::stopped(reply.status()))
            }
        };

        let state = state.settle(&outcome);
        info!(msm = id, ?mode, ?state, "stop settled");
        outcome
    }
}
