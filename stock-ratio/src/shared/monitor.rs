//! Per-symbol tick state for the console monitor
//!
//! Ticks reach this state only through the session's tick channel, drained by
//! the poll loop, so there is a single writer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::debug;

use super::types::Tick;

/// Last tick seen for one symbol
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SymbolActivity {
    pub last_update: Option<Instant>,
    pub last_price: Option<f64>,
    /// Exchange time of the last trade, epoch milliseconds
    pub last_trade_ts: Option<i64>,
    /// Size traded since the monitor started
    pub traded_size: f64,
}

/// Tick activity of the monitored pair
#[derive(Debug, Clone)]
pub struct PairMonitor {
    symbols: HashMap<String, SymbolActivity>,
    recency: Duration,
}

impl PairMonitor {
    pub fn new<I, S>(symbols: I, recency: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols
                .into_iter()
                .map(|s| (s.into(), SymbolActivity::default()))
                .collect(),
            recency,
        }
    }

    /// Record a tick observed now
    pub fn apply_tick(&mut self, tick: &Tick) {
        self.apply_tick_at(tick, Instant::now());
    }

    /// Record a tick observed at `now`; untracked symbols and quote-only
    /// ticks are ignored
    pub fn apply_tick_at(&mut self, tick: &Tick, now: Instant) {
        let Some(price) = tick.last else {
            return;
        };
        if let Some(activity) = self.symbols.get_mut(&tick.symbol) {
            activity.last_update = Some(now);
            activity.last_price = Some(price);
            activity.last_trade_ts = Some(tick.ts);
            activity.traded_size += tick.size;
        }
    }

    /// Apply every tick waiting in the channel without blocking.
    /// Returns how many ticks were drained.
    pub fn drain(&mut self, tick_rx: &mut mpsc::Receiver<Tick>) -> usize {
        let now = Instant::now();
        let mut drained = 0;
        while let Ok(tick) = tick_rx.try_recv() {
            self.apply_tick_at(&tick, now);
            drained += 1;
        }
        if drained > 0 {
            debug!("Drained {} ticks", drained);
        }
        drained
    }

    /// True if any symbol ticked within the recency window
    pub fn should_refresh(&self) -> bool {
        self.should_refresh_at(Instant::now())
    }

    pub fn should_refresh_at(&self, now: Instant) -> bool {
        self.symbols.values().any(|activity| {
            activity
                .last_update
                .map(|t| now.saturating_duration_since(t) < self.recency)
                .unwrap_or(false)
        })
    }

    pub fn activity(&self, symbol: &str) -> Option<SymbolActivity> {
        self.symbols.get(symbol).copied()
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.symbols.get(symbol).and_then(|a| a.last_price)
    }
}
