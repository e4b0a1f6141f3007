use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use busgate::{CliConfig, Gateway, GatewayConfig, GatewayError, SessionBackendRegistry};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "🚌 busgate";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliConfig::from_args();
    init_tracing(&cli);

    let gateway = match setup(&cli).await {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("fatal: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = run_forever(gateway).await {
        error!("fatal: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

fn init_tracing(cli: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn setup(cli: &CliConfig) -> Result<Gateway, GatewayError> {
    let mut config = GatewayConfig::from_file(&cli.config_file_location).await?;
    if let Some(bind) = &cli.bind_override {
        config.bind = bind.clone();
    }

    let registry = Arc::new(SessionBackendRegistry::with_builtin_backends());
    Gateway::start(config, registry).await
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run_forever(gateway: Gateway) -> std::io::Result<()> {
    info!("{} listening on {}", APP_NAME, gateway.local_addr());

    gateway.run(wait_for_shutdown(signal::ctrl_c())).await
}

/// Resolves once `signal` fires. A handler that cannot be installed is not a
/// shutdown request: log it and keep serving.
async fn wait_for_shutdown<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("{} shutting down", APP_NAME),
        Err(e) => {
            error!("failed to install the ctrl-c handler, running until killed: {e}");
            std::future::pending::<()>().await;
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn delivered_signal_shuts_down() {
        timeout(Duration::from_secs(1), wait_for_shutdown(async { Ok(()) }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_signal_handler_keeps_running() {
        let waited = timeout(
            Duration::from_millis(100),
            wait_for_shutdown(async { Err(std::io::Error::other("no signal driver")) }),
        )
        .await;
        assert!(waited.is_err(), "gateway stopped without a shutdown request");
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
