use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::channel::{Channel, ChannelError, ChannelRange};
use crate::session::SessionBackendRegistry;
use crate::tls::TlsSettings;

// -----------------------------------------------------------------------------
// ----- Defaults --------------------------------------------------------------

pub const DEFAULT_BIND: &str = "0.0.0.0:7198";
pub const DEFAULT_VERSION: &str = "dev";
pub const DEFAULT_CLIENT_TYPE: &str = "libastron";

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_client_type() -> String {
    DEFAULT_CLIENT_TYPE.to_string()
}

// -----------------------------------------------------------------------------
// ----- GatewayConfig ---------------------------------------------------------

/// On-disk gateway configuration. Built once, then handed to
/// [`crate::Gateway::start`]; nothing reads it from global state.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Server version string surfaced to backends for their handshake.
    #[serde(default = "default_version")]
    pub version: String,

    /// Nonzero replaces the computed protocol fingerprint.
    #[serde(default)]
    pub manual_dc_hash: u32,

    #[serde(default)]
    pub channels: ChannelsSection,

    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub tls: TlsSettings,

    #[serde(default)]
    pub schema: SchemaSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelsSection {
    #[serde(default)]
    pub min: Channel,
    #[serde(default)]
    pub max: Channel,
}

/// `[client]`: the backend name plus whatever keys that backend reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSection {
    #[serde(rename = "type", default = "default_client_type")]
    pub backend: String,

    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            backend: default_client_type(),
            extra: toml::Table::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaSection {
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

// -----------------------------------------------------------------------------
// ----- GatewayConfig: Static -------------------------------------------------

impl GatewayConfig {
    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).await.map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Toml { source: e })
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayConfig: Public -------------------------------------------------

impl GatewayConfig {
    /// Channel range first, then the backend name. Runs before any socket
    /// exists, so a bad config never opens a listener.
    pub fn validate(&self, registry: &SessionBackendRegistry) -> Result<ChannelRange, ConfigError> {
        let range = self.channel_range()?;

        if !registry.has_backend(&self.client.backend) {
            return Err(ConfigError::UnknownBackend {
                name: self.client.backend.clone(),
                available: registry.backend_names().join(", "),
            });
        }

        Ok(range)
    }

    pub fn channel_range(&self) -> Result<ChannelRange, ConfigError> {
        Ok(ChannelRange::new(self.channels.min, self.channels.max)?)
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },

    #[error(transparent)]
    Channels(#[from] ChannelError),

    #[error("no client handler exists for client type '{name}' (registered: {available})")]
    UnknownBackend { name: String, available: String },

    #[error("invalid bind address '{addr}': {reason}")]
    InvalidBindAddress { addr: String, reason: &'static str },

    #[error("could not resolve bind address '{addr}': {source}")]
    ResolveBindAddress {
        addr: String,
        source: std::io::Error,
    },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
