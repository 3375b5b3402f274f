/// Pair Ratio Monitor (console)
///
/// Prints the last 10 one-minute bars of both legs, their OHLC ratios and
/// close-ratio statistics, refreshed while either symbol is trading.
///
/// Environment:
/// - IBKR_BRIDGE_HOST / IBKR_BRIDGE_PORT / IBKR_BRIDGE_CLIENT_ID
/// - RATIO_PAIR (default NVDA/TSM), RATIO_EXCHANGE, RATIO_ALIGNMENT
/// - RUST_LOG (default info, written to stderr)
use std::error::Error;
use std::io;

use stock_ratio::{BridgeConfig, BridgeSession, MarketDataSource, MonitorConfig, MonitorError, run_console_loop};
use tracing::{error, info};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let config = MonitorConfig::console().with_env_overrides();
    let bridge = BridgeConfig::from_env();

    let (mut session, mut tick_rx) = match BridgeSession::connect(bridge).await {
        Ok(connected) => connected,
        Err(e) => {
            error!("Could not connect to ibkr-bridge: {}", e);
            return Err(e.into());
        }
    };

    let mut result: Result<(), MonitorError> = Ok(());
    for contract in [&config.numerator, &config.denominator] {
        if let Err(e) = session.subscribe_ticks(contract).await {
            error!("Failed to subscribe to {}: {}", contract, e);
            result = Err(e.into());
            break;
        }
    }

    if result.is_ok() {
        info!("Monitoring {} (Ctrl+C to stop)", config.pair_label());
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        let mut stdout = io::stdout();
        result = run_console_loop(&session, &config, &mut tick_rx, &mut stdout, shutdown).await;
        if let Err(e) = &result {
            error!("Error: {}", e);
        }
    }

    session.disconnect().await;

    result.map_err(Into::into)
}
