//! atlas-client: talks to the measurement platform's HTTP API.
//!
//! Every call goes through [`AtlasClient::call`], which sends the request
//! over an [`HttpTransport`] and folds whatever comes back into either a
//! [`Reply`] or an [`ErrorEnvelope`](atlas_core::ErrorEnvelope) via the pure
//! [`normalize`] function. No call site sees a raw transport error or a raw
//! non-OK response.
//!
//! # Architecture
//!
//! ```text
//! AtlasClient
//!   ├── Endpoints      URL construction from [api] config
//!   ├── HttpTransport  HyperTransport (hyper + rustls) | ScriptedTransport
//!   ├── Connectivity   TcpConnectivity | StaticConnectivity
//!   └── normalize      transport / decode / status / semantic classification
//! ```

pub mod client;
pub mod connectivity;
pub mod endpoints;
pub mod measurements;
pub mod normalize;
pub mod transport;

pub use client::AtlasClient;
pub use connectivity::{Connectivity, StaticConnectivity, TcpConnectivity};
pub use endpoints::Endpoints;
pub use measurements::{CostRequest, MeasurementId, MeasurementQuery, StopConfirmation, StopMode, StopState};
pub use normalize::{Expectation, Operation, Reply, TransportOutcome, normalize};
pub use transport::{ApiRequest, HttpTransport, HyperTransport, RawResponse, ScriptedTransport, TransportError};
