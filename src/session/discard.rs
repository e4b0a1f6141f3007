use std::sync::Arc;

use tokio::io::{self, AsyncWriteExt};
use tracing::{debug, warn};

use super::{Session, SessionFuture};
use crate::config::ClientSection;
use crate::gateway::GatewayHandle;
use crate::net::ClientStream;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const DISCARD_BACKEND: &str = "discard";

// -----------------------------------------------------------------------------
// ----- DiscardSession --------------------------------------------------------

/// Holds a channel for as long as the client stays connected and throws away
/// whatever it sends. Useful for smoke-testing a deployment.
#[derive(Debug)]
pub struct DiscardSession {
    gateway: GatewayHandle,
    stream: ClientStream,
}

impl DiscardSession {
    pub fn factory(
        _config: Arc<ClientSection>,
        gateway: GatewayHandle,
        stream: ClientStream,
    ) -> Box<dyn Session> {
        Box::new(Self { gateway, stream })
    }
}

impl Session for DiscardSession {
    fn run(self: Box<Self>) -> SessionFuture {
        let DiscardSession {
            gateway,
            mut stream,
        } = *self;

        Box::pin(async move {
            let peer = stream.remote_endpoint();

            // Exhaustion is ours to handle: refuse the client, keep the gateway up.
            let channel = match gateway.try_alloc_channel() {
                Ok(channel) => channel,
                Err(e) => {
                    warn!("rejecting client {peer:?}: {e}");
                    let _ = stream.shutdown().await;
                    return Ok(());
                }
            };

            debug!("client {peer:?} holds channel {channel}");

            let copied = io::copy(&mut stream, &mut io::sink()).await;
            if copied.is_ok() {
                let _ = stream.shutdown().await;
            }

            if let Err(e) = gateway.release_channel(channel) {
                warn!("failed to release channel {channel}: {e}");
            }

            let discarded = copied?;
            debug!("client {peer:?} left after sending {discarded} bytes");
            Ok(())
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
