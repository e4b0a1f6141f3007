pub mod bus;
pub mod channel;
pub mod config;
pub mod errors;
pub mod fingerprint;
pub mod gateway;
pub mod net;
pub mod session;
pub mod tls;

pub use bus::{BusIngress, Datagram};
pub use channel::{Channel, ChannelAllocator, ChannelRange, INVALID_CHANNEL};
pub use config::{CliConfig, GatewayConfig};
pub use errors::GatewayError;
pub use gateway::{Gateway, GatewayHandle};
pub use net::ClientStream;
pub use session::{Session, SessionBackendRegistry, SessionFactory, SessionFuture};
