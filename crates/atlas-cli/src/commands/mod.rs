pub mod archive;
pub mod config;
pub mod msm;
pub mod probes;

use std::path::Path;
use std::sync::Arc;

use atlas_client::AtlasClient;
use atlas_core::{AtlasConfig, ErrorEnvelope, SystemClock};
use atlas_probes::ProbeCache;
use atlas_state::RedbStore;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// The failure was already written to stderr as an envelope.
#[derive(Debug, Error)]
#[error("request failed; the error envelope was printed to stderr")]
pub struct EnvelopeReported;

/// Loaded configuration shared by the commands.
pub struct Context {
    pub config: AtlasConfig,
}

impl Context {
    pub fn load(path: &Path, api_server: Option<String>) -> anyhow::Result<Self> {
        let mut config = AtlasConfig::load_or_default(path)?;
        if let Some(server) = api_server {
            config.api.server = server;
        }
        debug!(config = %path.display(), server = %config.api.server, "configuration loaded");
        Ok(Self { config })
    }

    pub fn client(&self) -> anyhow::Result<AtlasClient> {
        AtlasClient::from_config(&self.config)
    }

    pub fn probe_cache(&self) -> anyhow::Result<ProbeCache> {
        let cache = &self.config.cache;
        let store = RedbStore::open(&cache.path, &cache.namespace)?;
        let ttl = self.config.cache_ttl()?;
        Ok(ProbeCache::new(
            Arc::new(store),
            self.client()?,
            Arc::new(SystemClock),
            cache.version,
            ttl,
        ))
    }
}

/// Print the value as pretty JSON, or the envelope on stderr and fail
/// with [`EnvelopeReported`].
pub fn emit<T: Serialize>(result: Result<T, ErrorEnvelope>) -> anyhow::Result<()> {
    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(envelope) => {
            eprintln!("{}", serde_json::to_string_pretty(&envelope)?);
            Err(EnvelopeReported.into())
        }
    }
}
