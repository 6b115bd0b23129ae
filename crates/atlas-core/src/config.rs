//! atlas.toml configuration parser.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub connectivity: ConnectivityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API host, or a full `scheme://host[:port]` base.
    pub server: String,
    pub trends_server: String,
    /// Sent as `Authorization: Key <api_key>` when set.
    pub api_key: Option<String>,
    /// Default measurement backend when a call doesn't choose one.
    pub use_es: bool,
    pub es_infix: String,
    pub legacy_infix: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server: "atlas.ripe.net".to_string(),
            trends_server: "atlas.ripe.net".to_string(),
            api_key: None,
            use_es: false,
            es_infix: String::new(),
            legacy_infix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
    /// redb table holding the probe cache keys.
    pub namespace: String,
    /// Bumping this strands every entry written under the old version.
    pub version: u32,
    pub ttl: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("atlas-cache.redb"),
            namespace: "probes".to_string(),
            version: 2,
            ttl: "24h".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// `host:port` dialled after a failed call to tell "offline" apart
    /// from "API unreachable". Keep it off the API host.
    pub address: String,
    pub timeout: String,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            address: "1.1.1.1:53".to_string(),
            timeout: "2s".to_string(),
        }
    }
}

impl AtlasConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AtlasConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold an atlas.toml for the given API server.
    pub fn scaffold(server: &str) -> Self {
        let mut config = AtlasConfig::default();
        config.api.server = server.to_string();
        config.api.trends_server = server.to_string();
        config
    }

    /// The cache TTL, rejected when it does not fit a timestamp offset.
    pub fn cache_ttl(&self) -> anyhow::Result<TimeDelta> {
        parse_duration(&self.cache.ttl)
            .and_then(|ttl| TimeDelta::from_std(ttl).ok())
            .ok_or_else(|| anyhow::anyhow!("invalid cache.ttl `{}`", self.cache.ttl))
    }

    pub fn connectivity_timeout(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.connectivity.timeout).ok_or_else(|| {
            anyhow::anyhow!("invalid connectivity.timeout `{}`", self.connectivity.timeout)
        })
    }
}

/// Parse a duration string like "24h", "5s", "500ms", "1m". `None` when
/// the string is malformed or the value overflows.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
