pub mod address;
pub mod cli;
pub mod gateway;
pub mod types;

pub use address::{DEFAULT_PORT, resolve_bind_address};
pub use cli::CliConfig;
pub use gateway::{ChannelsSection, ClientSection, ConfigError, GatewayConfig, SchemaSection};
pub use types::LogLevel;
