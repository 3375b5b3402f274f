//! Poll loops for the two front-ends
//!
//! Both loops are sequential: the numerator is fetched before the
//! denominator and nothing overlaps with presentation.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info};

use super::bridge::MarketDataSource;
use super::chart::{RatioChart, RenderSurface};
use super::config::MonitorConfig;
use super::console::print_snapshot;
use super::error::MonitorError;
use super::fetcher::fetch_history;
use super::monitor::PairMonitor;
use super::ratio::{RatioSeries, combine};
use super::types::Tick;

/// Fetch both legs and combine them; None if either leg is missing
pub async fn fetch_ratio_series<S>(source: &S, config: &MonitorConfig) -> Option<RatioSeries>
where
    S: MarketDataSource + ?Sized,
{
    let numerator = fetch_history(source, &config.numerator, &config.window).await;
    let denominator = fetch_history(source, &config.denominator, &config.window).await;

    combine(
        &config.numerator.symbol,
        &config.denominator.symbol,
        numerator.as_deref(),
        denominator.as_deref(),
        config.alignment,
    )
}

/// Console monitor: every `poll_interval`, drain ticks and, if either symbol
/// ticked recently, print a fresh snapshot.
///
/// Returns Ok when `shutdown` resolves. Only presenter I/O errors end the loop
/// early; a failed fetch, including one on a dropped session, just skips the
/// snapshot for that cycle.
pub async fn run_console_loop<S, W, F>(
    source: &S,
    config: &MonitorConfig,
    tick_rx: &mut mpsc::Receiver<Tick>,
    out: &mut W,
    shutdown: F,
) -> Result<(), MonitorError>
where
    S: MarketDataSource + ?Sized,
    W: Write,
    F: Future<Output = ()>,
{
    let mut monitor = PairMonitor::new(
        [config.numerator.symbol.clone(), config.denominator.symbol.clone()],
        config.tick_recency,
    );
    tokio::pin!(shutdown);

    loop {
        let cycle = async {
            tokio::time::sleep(config.poll_interval).await;

            monitor.drain(tick_rx);
            if monitor.should_refresh() {
                if let Some(series) = fetch_ratio_series(source, config).await {
                    print_snapshot(out, &series, config.table_rows)?;
                }
            }
            Ok::<(), MonitorError>(())
        };

        tokio::select! {
            _ = &mut shutdown => {
                info!("Stopping monitoring...");
                return Ok(());
            }
            result = cycle => result?,
        }
    }
}

/// Why the chart loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartExit {
    /// The user closed the chart surface
    Closed,
}

/// Chart monitor: refresh every `refresh_interval`, waiting in
/// `poll_interval` slices so a closed surface ends the loop within one slice.
///
/// Errors inside a cycle are logged and retried after a one-second pause.
pub async fn run_chart_loop<S, R>(source: &S, config: &MonitorConfig, chart: &mut RatioChart<R>) -> ChartExit
where
    S: MarketDataSource + ?Sized,
    R: RenderSurface,
{
    loop {
        let cycle: Result<(), MonitorError> = async {
            if let Some(series) = fetch_ratio_series(source, config).await {
                chart.update(&series);
            }

            if !chart.is_open() {
                return Ok(());
            }

            wait_for_next_cycle(chart, config.refresh_interval, config.poll_interval)?;
            Ok(())
        }
        .await;

        if let Err(e) = cycle {
            error!("Error in update loop: {}", e);
            if let Err(e) = chart.pause(Duration::from_secs(1)) {
                error!("Error in update loop: {}", e);
            }
        }

        if !chart.is_open() {
            info!("Chart window closed. Exiting...");
            return ChartExit::Closed;
        }
    }
}

/// Pause for `total` in `slice` steps, stopping after the first step that
/// finds the chart closed
pub fn wait_for_next_cycle<R: RenderSurface>(
    chart: &mut RatioChart<R>,
    total: Duration,
    slice: Duration,
) -> std::io::Result<()> {
    let steps = if slice.is_zero() {
        1.0
    } else {
        total.as_secs_f64() / slice.as_secs_f64()
    }
    .ceil()
    .max(1.0) as usize;

    for _ in 0..steps {
        chart.pause(slice)?;
        if !chart.is_open() {
            break;
        }
    }
    Ok(())
}
