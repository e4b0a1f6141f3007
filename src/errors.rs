use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::ConfigError;
use crate::fingerprint::FingerprintError;
use crate::tls::TlsError;

// -----------------------------------------------------------------------------
// ----- GatewayError ----------------------------------------------------------

/// Everything that can stop [`crate::Gateway::start`]. All of it is fatal:
/// the binary logs it and exits with status 1.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("tls setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("schema load failed: {0}")]
    Schema(#[from] FingerprintError),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
