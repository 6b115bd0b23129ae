//! atlas-core: shared building blocks for the atlasgrid crates.
//!
//! Holds the compact probe record as it travels on the wire and in the
//! cache, the `ErrorEnvelope` every remote or store failure is folded
//! into, the injectable `Clock`, and the `atlas.toml` configuration.

pub mod clock;
pub mod config;
pub mod envelope;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AtlasConfig;
pub use envelope::{ApiErrorSource, ApiFieldError, EnvelopeStatus, ErrorEnvelope, FailureKind};
pub use types::*;
