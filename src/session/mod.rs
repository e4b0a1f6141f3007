//! Session backends: the factory contract that turns an accepted connection
//! into a running client session, and the registry that names them.

pub mod discard;
pub mod registry;

pub use discard::{DISCARD_BACKEND, DiscardSession};
pub use registry::{RegistryError, SessionBackendRegistry};

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::ClientSection;
use crate::gateway::GatewayHandle;
use crate::net::ClientStream;

// -----------------------------------------------------------------------------
// ----- Session ---------------------------------------------------------------

pub type SessionFuture = Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'static>>;

/// A client session. Once handed its connection it is independently owned:
/// the gateway spawns [`Session::run`] and never tracks it afterwards.
pub trait Session: Send + 'static {
    fn run(self: Box<Self>) -> SessionFuture;
}

// -----------------------------------------------------------------------------
// ----- SessionFactory --------------------------------------------------------

/// Builds one session per accepted connection. `config` is the shared
/// `[client]` section; the connection moves into the session.
pub trait SessionFactory: Send + Sync + 'static {
    fn instantiate(
        &self,
        config: Arc<ClientSection>,
        gateway: GatewayHandle,
        stream: ClientStream,
    ) -> Box<dyn Session>;
}

impl<F> SessionFactory for F
where
    F: Fn(Arc<ClientSection>, GatewayHandle, ClientStream) -> Box<dyn Session>
        + Send
        + Sync
        + 'static,
{
    fn instantiate(
        &self,
        config: Arc<ClientSection>,
        gateway: GatewayHandle,
        stream: ClientStream,
    ) -> Box<dyn Session> {
        self(config, gateway, stream)
    }
}
