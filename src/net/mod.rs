//! Networking layer: the listening socket, the accept loop and the client
//! transport handed to sessions.

pub mod acceptor;
pub mod stream;

pub use acceptor::{AcceptHandler, AcceptorMode, ConnectionAcceptor};
pub use stream::ClientStream;
