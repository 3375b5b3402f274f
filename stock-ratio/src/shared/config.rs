/// Configuration for the bridge session and the two monitor variants
///
/// Defaults are compile-time constants; a handful of environment variables
/// can override them at startup.

use std::time::Duration;

use crate::shared::ratio::Alignment;
use crate::shared::types::Contract;

/// ibkr-bridge connection settings
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bridge host (loopback by default)
    pub host: String,
    /// Bridge port (TWS paper port by default)
    pub port: u16,
    /// Client identifier announced in the handshake
    pub client_id: i32,
    /// Read-only session, no order routing
    pub readonly: bool,
    /// Maximum wait for the handshake reply
    pub connect_timeout: Duration,
    /// Ping interval to keep the connection alive
    pub ping_interval: Duration,
    /// Maximum channel buffer size for ticks
    pub tick_buffer_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7497,
            client_id: 1,
            readonly: true,
            connect_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(30),
            tick_buffer_size: 1000,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `IBKR_BRIDGE_HOST`, `IBKR_BRIDGE_PORT` and
    /// `IBKR_BRIDGE_CLIENT_ID`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("IBKR_BRIDGE_HOST") {
            config.host = host;
        }
        if let Some(port) = env_parse("IBKR_BRIDGE_PORT") {
            config.port = port;
        }
        if let Some(client_id) = env_parse("IBKR_BRIDGE_CLIENT_ID") {
            config.client_id = client_id;
        }
        config
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_client_id(mut self, client_id: i32) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// WebSocket URL of the bridge
    pub fn url(&self) -> String {
        format!("ws://{}:{}/ws", self.host, self.port)
    }
}

/// Historical bar request parameters
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryWindow {
    /// IB duration string, e.g. "10800 S"
    pub duration: String,
    /// IB bar size setting, e.g. "1 min"
    pub bar_size: String,
    /// IB data type, e.g. "TRADES"
    pub what_to_show: String,
    /// Regular trading hours only
    pub use_rth: bool,
    /// Exchange timezone the window is anchored to
    pub timezone: String,
    /// Bound on a single request
    pub timeout: Duration,
}

impl HistoryWindow {
    /// Last 3 hours of 1-minute trade bars, 10s timeout
    pub fn console() -> Self {
        Self {
            duration: "10800 S".to_string(),
            bar_size: "1 min".to_string(),
            what_to_show: "TRADES".to_string(),
            use_rth: true,
            timezone: "US/Eastern".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Last 100 minutes of 1-minute trade bars, 30s timeout
    pub fn chart() -> Self {
        Self {
            duration: "6000 S".to_string(),
            timeout: Duration::from_secs(30),
            ..Self::console()
        }
    }
}

/// Monitor settings shared by both front-ends
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Numerator of the ratio
    pub numerator: Contract,
    /// Denominator of the ratio
    pub denominator: Contract,
    pub window: HistoryWindow,
    pub alignment: Alignment,
    /// Chart: time between full refresh cycles
    pub refresh_interval: Duration,
    /// Granularity of every wait (tick drain, close check)
    pub poll_interval: Duration,
    /// Console: a symbol counts as active if it ticked this recently
    pub tick_recency: Duration,
    /// Console: rows shown from the tail of the series
    pub table_rows: usize,
    /// Upper bound of the moving average window
    pub ma_window: usize,
}

impl MonitorConfig {
    const DEFAULT_NUMERATOR: &'static str = "NVDA";
    const DEFAULT_DENOMINATOR: &'static str = "TSM";
    const DEFAULT_EXCHANGE: &'static str = "NASDAQ";

    fn base(window: HistoryWindow, refresh_interval: Duration) -> Self {
        Self {
            numerator: Contract::stock(Self::DEFAULT_NUMERATOR, Self::DEFAULT_EXCHANGE),
            denominator: Contract::stock(Self::DEFAULT_DENOMINATOR, Self::DEFAULT_EXCHANGE),
            window,
            alignment: Alignment::Positional,
            refresh_interval,
            poll_interval: Duration::from_secs(1),
            tick_recency: Duration::from_secs(5),
            table_rows: 10,
            ma_window: 20,
        }
    }

    /// Console snapshot preset
    pub fn console() -> Self {
        Self::base(HistoryWindow::console(), Duration::from_secs(1))
    }

    /// Live chart preset (10s auto-refresh)
    pub fn chart() -> Self {
        Self::base(HistoryWindow::chart(), Duration::from_secs(10))
    }

    /// Apply `RATIO_PAIR` ("NVDA/TSM"), `RATIO_EXCHANGE` and
    /// `RATIO_ALIGNMENT` ("positional" | "timestamp") overrides
    pub fn with_env_overrides(mut self) -> Self {
        let exchange = std::env::var("RATIO_EXCHANGE")
            .unwrap_or_else(|_| self.numerator.exchange.clone());

        let (numerator, denominator) = std::env::var("RATIO_PAIR")
            .ok()
            .and_then(|pair| parse_pair(&pair))
            .unwrap_or_else(|| (self.numerator.symbol.clone(), self.denominator.symbol.clone()));

        self = self.with_pair(
            Contract::stock(numerator, exchange.clone()),
            Contract::stock(denominator, exchange),
        );

        if let Ok(alignment) = std::env::var("RATIO_ALIGNMENT") {
            match alignment.trim().to_lowercase().as_str() {
                "timestamp" => self.alignment = Alignment::Timestamp,
                "positional" => self.alignment = Alignment::Positional,
                other => tracing::warn!("Ignoring unknown RATIO_ALIGNMENT {:?}", other),
            }
        }
        self
    }

    pub fn with_pair(mut self, numerator: Contract, denominator: Contract) -> Self {
        self.numerator = numerator;
        self.denominator = denominator;
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// "NVDA/TSM"
    pub fn pair_label(&self) -> String {
        format!("{}/{}", self.numerator.symbol, self.denominator.symbol)
    }
}

/// Parse "AAA/BBB" into its two symbols
fn parse_pair(pair: &str) -> Option<(String, String)> {
    let (a, b) = pair.split_once('/')?;
    let (a, b) = (a.trim().to_uppercase(), b.trim().to_uppercase());
    if a.is_empty() || b.is_empty() {
        return None;
    }
    Some((a, b))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_config_builder() {
        let config = BridgeConfig::default()
            .with_address("localhost", 4002)
            .with_client_id(7)
            .with_connect_timeout(Duration::from_secs(3))
            .with_ping_interval(Duration::from_secs(15));

        assert_eq!(config.url(), "ws://localhost:4002/ws");
        assert_eq!(config.client_id, 7);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.ping_interval, Duration::from_secs(15));
        assert!(config.readonly);
    }

    #[test]
    fn test_default_bridge_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.url(), "ws://127.0.0.1:7497/ws");
        assert_eq!(config.client_id, 1);
        assert!(config.readonly);
    }

    #[test]
    fn test_presets() {
        let console = MonitorConfig::console();
        assert_eq!(console.window.duration, "10800 S");
        assert_eq!(console.window.timeout, Duration::from_secs(10));
        assert_eq!(console.pair_label(), "NVDA/TSM");
        assert_eq!(console.numerator.exchange, "NASDAQ");

        let chart = MonitorConfig::chart();
        assert_eq!(chart.window.duration, "6000 S");
        assert_eq!(chart.window.bar_size, "1 min");
        assert_eq!(chart.window.timeout, Duration::from_secs(30));
        assert_eq!(chart.refresh_interval, Duration::from_secs(10));
        assert_eq!(chart.poll_interval, Duration::from_secs(1));
        assert_eq!(chart.alignment, Alignment::Positional);
    }

    #[test]
    fn test_monitor_config_builder() {
        let config = MonitorConfig::chart()
            .with_pair(Contract::stock("amd", "NASDAQ"), Contract::stock("intc", "NASDAQ"))
            .with_alignment(Alignment::Timestamp)
            .with_refresh_interval(Duration::from_secs(30))
            .with_poll_interval(Duration::from_millis(500));

        assert_eq!(config.pair_label(), "AMD/INTC");
        assert_eq!(config.alignment, Alignment::Timestamp);
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.window, HistoryWindow::chart());
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("nvda/ tsm"), Some(("NVDA".to_string(), "TSM".to_string())));
        assert_eq!(parse_pair("NVDA"), None);
        assert_eq!(parse_pair("/TSM"), None);
    }
}
