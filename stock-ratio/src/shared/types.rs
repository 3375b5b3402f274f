/// Core data types for the pair ratio monitors
///
/// Bars and ticks match the JSON payloads sent by ibkr-bridge
/// (timestamps are epoch milliseconds on the wire).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stock contract as understood by the brokerage session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Contract {
    /// Ticker symbol (e.g., "NVDA")
    pub symbol: String,
    /// Listing / routing exchange (e.g., "NASDAQ")
    pub exchange: String,
    /// Trading currency (e.g., "USD")
    pub currency: String,
}

impl Contract {
    /// US stock contract quoted in USD
    pub fn stock(symbol: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            exchange: exchange.into(),
            currency: "USD".to_string(),
        }
    }
}

impl std::fmt::Display for Contract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{} ({})", self.symbol, self.exchange, self.currency)
    }
}

/// Open/high/low/close quadruple
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Ohlc {
    /// Field-wise division, no zero guard (x/0 gives inf or NaN)
    pub fn ratio_to(&self, other: &Ohlc) -> Ohlc {
        Ohlc {
            open: self.open / other.open,
            high: self.high / other.high,
            low: self.low / other.low,
            close: self.close / other.close,
        }
    }
}

/// One-minute trade bar for a single symbol
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// Bar start time
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn ohlc(&self) -> Ohlc {
        Ohlc {
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
        }
    }
}

/// Bar payload as delivered by ibkr-bridge
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BarData {
    /// Bar start, epoch milliseconds
    pub ts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl BarData {
    /// Convert to a [`Bar`], dropping payloads with an unrepresentable timestamp
    pub fn into_bar(self) -> Option<Bar> {
        Some(Bar {
            time: DateTime::from_timestamp_millis(self.ts)?,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

/// Price update pushed by the session for a subscribed contract
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: String,
    /// Exchange timestamp, epoch milliseconds
    pub ts: i64,
    /// Last traded price, absent for quote-only updates
    pub last: Option<f64>,
    pub size: f64,
}
