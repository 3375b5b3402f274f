/// Stock Ratio - Shared Library
///
/// This library provides common functionality for the two monitor binaries:
/// - stock-ratio: console snapshot of an equity pair's OHLC ratios
/// - stock-ratio-chart: live terminal chart of the close ratio
///
/// The library includes:
/// - An ibkr-bridge session for historical bars and ticks
/// - Pair ratio processing, statistics and moving average
/// - Console and chart presenters plus the poll loops that drive them
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::types::{Bar, BarData, Contract, Ohlc, Tick};

pub use shared::bridge::{BridgeSession, ConnectionStatus, MarketDataSource};
pub use shared::config::{BridgeConfig, HistoryWindow, MonitorConfig};
pub use shared::error::{BridgeError, MonitorError};

pub use shared::calc::{RatioStats, moving_average_window, trailing_sma};
pub use shared::fetcher::fetch_history;
pub use shared::monitor::PairMonitor;
pub use shared::ratio::{Alignment, RatioRow, RatioSeries, combine};

pub use shared::chart::{ChartState, RatioChart, RatioChartView, RenderSurface, TerminalSurface};
pub use shared::console::{print_snapshot, render_snapshot};
pub use shared::poll::{ChartExit, fetch_ratio_series, run_chart_loop, run_console_loop};
