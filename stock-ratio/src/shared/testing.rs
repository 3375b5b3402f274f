//! In-memory source and surface for exercising the monitors without a
//! bridge or a terminal

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::bridge::MarketDataSource;
use super::chart::{RatioChartView, RenderSurface};
use super::config::HistoryWindow;
use super::error::BridgeError;
use super::types::{Bar, Contract};

/// Answers every request for a symbol with the same scripted reply
#[derive(Debug)]
pub struct ScriptedSource {
    replies: HashMap<String, Result<Vec<Bar>, BridgeError>>,
    requests: Mutex<Vec<(String, HistoryWindow)>>,
    subscriptions: Mutex<Vec<String>>,
    connected: AtomicBool,
    disconnects: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            requests: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.replies.insert(symbol.to_string(), Ok(bars));
        self
    }

    pub fn with_error(mut self, symbol: &str, error: BridgeError) -> Self {
        self.replies.insert(symbol.to_string(), Err(error));
        self
    }

    /// (symbol, window) of every historical request so far
    pub fn requests(&self) -> Vec<(String, HistoryWindow)> {
        self.requests.lock().clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::Relaxed)
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn historical_bars(
        &self,
        contract: &Contract,
        window: &HistoryWindow,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, BridgeError> {
        self.requests
            .lock()
            .push((contract.symbol.clone(), window.clone()));
        if !self.is_connected() {
            return Err(BridgeError::NotConnected);
        }
        self.replies
            .get(&contract.symbol)
            .cloned()
            .unwrap_or(Err(BridgeError::Remote {
                code: 200,
                message: format!("No security definition for {}", contract.symbol),
            }))
    }

    async fn subscribe_ticks(&self, contract: &Contract) -> Result<(), BridgeError> {
        self.subscriptions.lock().push(contract.symbol.clone());
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected.store(false, Ordering::Relaxed);
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }
}

/// Surface that records frames instead of drawing them
#[derive(Debug, Default)]
pub struct RecordingSurface {
    views: Vec<RatioChartView>,
    pauses: usize,
    close_after_pauses: Option<usize>,
    fail_draws: bool,
    open: bool,
    closes: usize,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            open: true,
            ..Self::default()
        }
    }

    /// Report closed once `pauses` pauses have run, as if the user closed it
    pub fn closing_after_pauses(mut self, pauses: usize) -> Self {
        self.close_after_pauses = Some(pauses);
        self
    }

    /// Every draw fails with an io error
    pub fn failing_draws(mut self) -> Self {
        self.fail_draws = true;
        self
    }

    pub fn draws(&self) -> usize {
        self.views.len()
    }

    pub fn views(&self) -> &[RatioChartView] {
        &self.views
    }

    pub fn pauses(&self) -> usize {
        self.pauses
    }

    pub fn closes(&self) -> usize {
        self.closes
    }
}

impl RenderSurface for RecordingSurface {
    fn draw(&mut self, view: &RatioChartView) -> io::Result<()> {
        if self.fail_draws {
            return Err(io::Error::other("terminal gone"));
        }
        self.views.push(view.clone());
        Ok(())
    }

    fn pause(&mut self, _wait: Duration) -> io::Result<()> {
        self.pauses += 1;
        if self.close_after_pauses.is_some_and(|n| self.pauses >= n) {
            self.open = false;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> io::Result<()> {
        self.open = false;
        self.closes += 1;
        Ok(())
    }
}
