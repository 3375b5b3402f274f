//! Historical bar fetcher
//!
//! Timeouts, empty results and session errors all collapse to `None`; the
//! poll loop's next cycle is the only retry.

use chrono::Utc;
use tracing::{error, info, warn};

use super::bridge::MarketDataSource;
use super::config::HistoryWindow;
use super::types::{Bar, Contract};

/// Fetch recent bars for `contract` ending now
pub async fn fetch_history<S>(source: &S, contract: &Contract, window: &HistoryWindow) -> Option<Vec<Bar>>
where
    S: MarketDataSource + ?Sized,
{
    info!("Fetching historical data for {}...", contract.symbol);

    match source.historical_bars(contract, window, Utc::now()).await {
        Ok(bars) if bars.is_empty() => {
            warn!("No data received for {}", contract.symbol);
            None
        }
        Ok(bars) => {
            info!("Received {} bars for {}", bars.len(), contract.symbol);
            Some(bars)
        }
        Err(e) => {
            error!(terminal = e.is_terminal(), "Error fetching data for {}: {}", contract.symbol, e);
            None
        }
    }
}
