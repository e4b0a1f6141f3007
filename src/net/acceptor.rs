use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, warn};

use super::ClientStream;
use crate::tls::{self, TlsError, TlsSettings};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const LISTEN_BACKLOG: u32 = 1024;
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

// -----------------------------------------------------------------------------
// ----- AcceptHandler ---------------------------------------------------------

/// Receives every accepted connection exactly once, with ownership. Runs on
/// a reactor thread: keep it to fast, local work.
pub trait AcceptHandler: Send + Sync + 'static {
    fn on_accept(&self, stream: ClientStream);
}

// -----------------------------------------------------------------------------
// ----- AcceptorMode ----------------------------------------------------------

#[derive(Clone)]
pub enum AcceptorMode {
    Plain,
    Tls(TlsAcceptor),
}

impl AcceptorMode {
    /// Plain when neither certificate nor key is configured, encrypted when
    /// both are. Anything in between is a misconfiguration.
    pub fn from_settings(settings: &TlsSettings) -> Result<Self, TlsError> {
        match settings.key_pair()? {
            None => {
                warn!(
                    "TLS is disabled; clients connect in plaintext. Do not use this configuration in production"
                );
                Ok(AcceptorMode::Plain)
            }
            Some(files) => {
                let acceptor = tls::build_acceptor(&files, settings.policy())?;
                Ok(AcceptorMode::Tls(acceptor))
            }
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, AcceptorMode::Tls(_))
    }

    fn hand_off<H>(&self, stream: TcpStream, handler: &Arc<H>)
    where
        H: AcceptHandler + ?Sized,
    {
        match self {
            AcceptorMode::Plain => handler.on_accept(ClientStream::Plain(stream)),
            AcceptorMode::Tls(acceptor) => {
                // Handshakes are driven off the accept loop so one slow
                // client cannot stall the rest.
                let acceptor = acceptor.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => handler.on_accept(ClientStream::from(tls_stream)),
                        Err(e) => debug!("dropping connection after failed tls handshake: {e}"),
                    }
                });
            }
        }
    }
}

impl fmt::Debug for AcceptorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceptorMode::Plain => f.write_str("Plain"),
            AcceptorMode::Tls(_) => f.write_str("Tls"),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionAcceptor ----------------------------------------------------

#[derive(Debug)]
pub struct ConnectionAcceptor {
    mode: AcceptorMode,
    listener: Option<TcpListener>,
}

impl ConnectionAcceptor {
    pub fn new(mode: AcceptorMode) -> Self {
        Self {
            mode,
            listener: None,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionAcceptor: Public Methods ------------------------------------

impl ConnectionAcceptor {
    /// Binds and starts listening; returns the actual local address, which
    /// differs from `addr` when port 0 was requested.
    pub fn bind(&mut self, addr: SocketAddr) -> io::Result<SocketAddr> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };

        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;

        let listener = socket.listen(LISTEN_BACKLOG)?;
        let local = listener.local_addr()?;
        self.listener = Some(listener);

        Ok(local)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn mode(&self) -> &AcceptorMode {
        &self.mode
    }

    /// Accepts until `shutdown` resolves. Failures tied to one connection are
    /// logged and never end the loop.
    pub async fn run<H, F>(self, handler: Arc<H>, shutdown: F) -> io::Result<()>
    where
        H: AcceptHandler + ?Sized,
        F: Future<Output = ()>,
    {
        let ConnectionAcceptor { mode, listener } = self;
        let Some(listener) = listener else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "acceptor must be bound before it is started",
            ));
        };

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    break;
                }

                accept_res = listener.accept() => {
                    let stream = match accept_res {
                        Ok((stream, _)) => stream,
                        Err(e) => {
                            error!("accept error: {e}");
                            if let Some(pause) = accept_backoff(&e) {
                                tokio::time::sleep(pause).await;
                            }
                            continue;
                        }
                    };

                    let _ = stream.set_nodelay(true);
                    mode.hand_off(stream, &handler);
                }
            }
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

/// Errors tied to a single aborted connection retry at once. Anything else
/// (EMFILE, ENFILE, ENOBUFS, ...) would fail again immediately, so wait.
fn accept_backoff(e: &io::Error) -> Option<Duration> {
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => None,
        _ => Some(ACCEPT_ERROR_BACKOFF),
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
