use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::bus::{BusIngress, Datagram};
use crate::channel::{Channel, ChannelError, SharedChannelAllocator};
use crate::fingerprint::ProtocolFingerprint;

// -----------------------------------------------------------------------------
// ----- GatewayHandle ---------------------------------------------------------

/// What a session sees of the gateway that accepted it: the channel pool,
/// the protocol fingerprint clients must match and the server version.
/// Cheap to clone; every clone shares the same allocator.
#[derive(Clone)]
pub struct GatewayHandle {
    inner: Arc<GatewayShared>,
}

struct GatewayShared {
    channels: SharedChannelAllocator,
    fingerprint: ProtocolFingerprint,
    server_version: String,
}

impl GatewayHandle {
    pub fn new(
        channels: SharedChannelAllocator,
        fingerprint: ProtocolFingerprint,
        server_version: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayShared {
                channels,
                fingerprint,
                server_version: server_version.into(),
            }),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayHandle: Public -------------------------------------------------

impl GatewayHandle {
    /// `INVALID_CHANNEL` when the range is spent.
    pub fn alloc_channel(&self) -> Channel {
        self.inner.channels.alloc()
    }

    pub fn try_alloc_channel(&self) -> Result<Channel, ChannelError> {
        self.inner.channels.try_alloc()
    }

    pub fn release_channel(&self, channel: Channel) -> Result<(), ChannelError> {
        self.inner.channels.release(channel)
    }

    /// Unchecked return; the caller vouches for `channel`.
    pub fn free_channel(&self, channel: Channel) {
        self.inner.channels.free(channel)
    }

    pub fn channels(&self) -> &SharedChannelAllocator {
        &self.inner.channels
    }

    pub fn protocol_fingerprint(&self) -> ProtocolFingerprint {
        self.inner.fingerprint
    }

    pub fn server_version(&self) -> &str {
        &self.inner.server_version
    }
}

impl BusIngress for GatewayHandle {
    fn handle_datagram(&self, datagram: &Datagram) {
        // Nothing above the core subscribes yet.
        trace!(
            "ignoring bus datagram for {} channel(s), {} bytes",
            datagram.recipients().len(),
            datagram.payload().len()
        );
    }
}

impl fmt::Debug for GatewayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayHandle")
            .field("fingerprint", &self.inner.fingerprint)
            .field("server_version", &self.inner.server_version)
            .field("outstanding_channels", &self.inner.channels.outstanding())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ----- Test Support ----------------------------------------------------------


// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
