/// Pair Ratio Chart
///
/// Live terminal chart of the close ratio with its trailing moving average,
/// refreshed every 10 seconds until the chart is closed (q / Esc / Ctrl+C).
///
/// Logs go to STOCK_RATIO_LOG (default stock-ratio-chart.log) so they do not
/// tear the alternate screen.
use std::error::Error;
use std::fs::File;
use std::io;
use std::sync::Mutex;

use crossterm::{
    execute,
    terminal::{LeaveAlternateScreen, disable_raw_mode},
};
use stock_ratio::{
    BridgeConfig, BridgeSession, MarketDataSource, MonitorConfig, RatioChart, TerminalSurface, run_chart_loop,
};
use tracing::{error, info};

/// Get log file path from STOCK_RATIO_LOG env var (default: stock-ratio-chart.log)
fn log_path() -> String {
    std::env::var("STOCK_RATIO_LOG").unwrap_or_else(|_| "stock-ratio-chart.log".to_string())
}

fn init_logging() -> io::Result<()> {
    let file = File::create(log_path())?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging()?;

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let config = MonitorConfig::chart().with_env_overrides();
    let bridge = BridgeConfig::from_env();

    let (mut session, _tick_rx) = match BridgeSession::connect(bridge).await {
        Ok(connected) => connected,
        Err(e) => {
            error!("Could not connect to ibkr-bridge: {}", e);
            return Err(e.into());
        }
    };

    let title = format!(
        "{} Ratio Chart (Auto-refresh: {}s)",
        config.pair_label(),
        config.refresh_interval.as_secs()
    );
    let surface = match TerminalSurface::new(&title) {
        Ok(surface) => surface,
        Err(e) => {
            error!("Failed to open terminal: {}", e);
            session.disconnect().await;
            return Err(e.into());
        }
    };

    let mut chart = RatioChart::new(surface, config.ma_window);
    let exit = run_chart_loop(&session, &config, &mut chart).await;
    info!("Chart loop ended: {:?}", exit);

    if let Err(e) = chart.close() {
        error!("Failed to restore terminal: {}", e);
    }
    session.disconnect().await;

    Ok(())
}
