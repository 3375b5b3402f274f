//! ibkr-bridge market-data session
//!
//! Provides:
//! - JSON frame types for the bridge protocol
//! - A WebSocket session implementing [`MarketDataSource`]

mod protocol;
mod session;

pub use protocol::{BridgeMessage, ClientMessage};
pub use session::{BridgeSession, ConnectionStatus};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::config::HistoryWindow;
use super::error::BridgeError;
use super::types::{Bar, Contract};

/// Read-only market-data source consumed by the monitors
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Bars for `contract` covering `window` and ending at `end`
    async fn historical_bars(
        &self,
        contract: &Contract,
        window: &HistoryWindow,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, BridgeError>;

    /// Start streaming ticks for `contract` into the session's tick channel
    async fn subscribe_ticks(&self, contract: &Contract) -> Result<(), BridgeError>;

    async fn disconnect(&mut self);
}
