//! The gateway orchestrator: validates configuration, prepares the shared
//! state sessions see, and dispatches every accepted connection to the
//! configured session backend.

pub mod handle;

pub use handle::GatewayHandle;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::channel::{ChannelAllocator, SharedChannelAllocator};
use crate::config::{ClientSection, GatewayConfig, resolve_bind_address};
use crate::errors::GatewayError;
use crate::fingerprint::{ProtocolFingerprint, SchemaFiles};
use crate::net::{AcceptHandler, AcceptorMode, ClientStream, ConnectionAcceptor};
use crate::session::SessionBackendRegistry;

// -----------------------------------------------------------------------------
// ----- Gateway ---------------------------------------------------------------

/// A bound, ready-to-run gateway. Obtain one with [`Gateway::start`], then
/// drive it with [`Gateway::run`].
#[derive(Debug)]
pub struct Gateway {
    acceptor: ConnectionAcceptor,
    dispatcher: Arc<Dispatcher>,
    local_addr: SocketAddr,
}

// -----------------------------------------------------------------------------
// ----- Gateway: Static -------------------------------------------------------

impl Gateway {
    /// Runs every startup step in order and stops at the first failure. No
    /// socket is opened until configuration, schema and TLS material are all
    /// known to be good.
    pub async fn start(
        config: GatewayConfig,
        registry: Arc<SessionBackendRegistry>,
    ) -> Result<Self, GatewayError> {
        let range = config.validate(&registry)?;
        let bind_addr = resolve_bind_address(&config.bind).await?;

        let channels = SharedChannelAllocator::new(ChannelAllocator::from_range(range));
        info!(
            "allocating client channels {}..={} ({} available)",
            range.min(),
            range.max(),
            range.capacity()
        );

        let schema = SchemaFiles::load(&config.schema.files).await?;
        let fingerprint = ProtocolFingerprint::resolve(config.manual_dc_hash, &schema);
        info!("protocol fingerprint {fingerprint}");

        let mode = AcceptorMode::from_settings(&config.tls)?;
        let mut acceptor = ConnectionAcceptor::new(mode);
        let local_addr = acceptor
            .bind(bind_addr)
            .map_err(|e| GatewayError::Bind {
                addr: bind_addr,
                source: e,
            })?;

        info!(
            "listening on {local_addr} ({})",
            if acceptor.mode().is_encrypted() {
                "tls"
            } else {
                "plaintext"
            }
        );

        let dispatcher = Dispatcher {
            registry,
            client: Arc::new(config.client),
            gateway: GatewayHandle::new(channels, fingerprint, config.version),
        };

        Ok(Self {
            acceptor,
            dispatcher: Arc::new(dispatcher),
            local_addr,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Gateway: Public -------------------------------------------------------

impl Gateway {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> GatewayHandle {
        self.dispatcher.gateway.clone()
    }

    /// Accepts clients until `shutdown` resolves. Sessions already running
    /// are left to finish on their own.
    pub async fn run<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        self.acceptor.run(self.dispatcher, shutdown).await
    }
}

// -----------------------------------------------------------------------------
// ----- Dispatcher ------------------------------------------------------------

struct Dispatcher {
    registry: Arc<SessionBackendRegistry>,
    client: Arc<ClientSection>,
    gateway: GatewayHandle,
}

impl AcceptHandler for Dispatcher {
    fn on_accept(&self, stream: ClientStream) {
        let Some(remote) = stream.remote_endpoint() else {
            debug!("client disconnected before its address could be read; dropping");
            return;
        };

        debug!("incoming connection from {remote}");

        let session = match self.registry.instantiate(
            &self.client.backend,
            self.client.clone(),
            self.gateway.clone(),
            stream,
        ) {
            Ok(session) => session,
            Err(e) => {
                error!("client {remote} rejected: {e}");
                return;
            }
        };

        tokio::spawn(async move {
            if let Err(e) = session.run().await {
                error!("client {remote} error: {e}");
            }
        });
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("backend", &self.client.backend)
            .field("gateway", &self.gateway)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
