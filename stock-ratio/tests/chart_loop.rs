use std::time::Duration;

use chrono::{TimeZone, Utc};
use stock_ratio::shared::testing::{RecordingSurface, ScriptedSource};
use stock_ratio::{Bar, BridgeError, ChartExit, ChartState, MonitorConfig, RatioChart, run_chart_loop};

fn bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            time: Utc.timestamp_opt(1_717_421_400 + 60 * i as i64, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        })
        .collect()
}

fn pair_source() -> ScriptedSource {
    ScriptedSource::new()
        .with_bars("NVDA", bars(&[100.0, 102.0, 104.0]))
        .with_bars("TSM", bars(&[50.0, 51.0, 52.0]))
}

#[tokio::test]
async fn test_loop_exits_within_one_slice_of_close() {
    let source = pair_source();
    let config = MonitorConfig::chart();
    let mut chart = RatioChart::new(RecordingSurface::new().closing_after_pauses(3), config.ma_window);

    let exit = run_chart_loop(&source, &config, &mut chart).await;

    assert_eq!(exit, ChartExit::Closed);
    assert_eq!(chart.state(), ChartState::Closed);
    assert_eq!(chart.surface().draws(), 1);
    assert_eq!(chart.surface().pauses(), 3);

    let requests = source.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].0, "NVDA");
    assert_eq!(requests[1].0, "TSM");
    assert_eq!(requests[0].1.duration, "6000 S");

    let view = &chart.surface().views()[0];
    let ratios: Vec<f64> = view.ratio_points.iter().map(|&(_, y)| y).collect();
    assert_eq!(ratios, vec![2.0, 2.0, 2.0]);
    assert_eq!(view.label, "NVDA/TSM");
}

#[tokio::test]
async fn test_loop_refreshes_every_interval() {
    let source = pair_source();
    let config = MonitorConfig::chart();
    let mut chart = RatioChart::new(RecordingSurface::new().closing_after_pauses(12), config.ma_window);

    run_chart_loop(&source, &config, &mut chart).await;

    // First wait runs the full 10 one-second slices, the second is cut short
    assert_eq!(chart.surface().draws(), 2);
    assert_eq!(chart.surface().pauses(), 12);
    assert_eq!(source.requests().len(), 4);
}

#[tokio::test]
async fn test_loop_follows_configured_refresh_interval() {
    let source = pair_source();
    let config = MonitorConfig::chart().with_refresh_interval(Duration::from_secs(3));
    let mut chart = RatioChart::new(RecordingSurface::new().closing_after_pauses(7), config.ma_window);

    run_chart_loop(&source, &config, &mut chart).await;

    // Two full 3-slice waits, then closed during the third
    assert_eq!(chart.surface().draws(), 3);
    assert_eq!(chart.surface().pauses(), 7);
}

#[tokio::test]
async fn test_loop_skips_draw_when_a_leg_fails() {
    let source = ScriptedSource::new()
        .with_error(
            "NVDA",
            BridgeError::Remote {
                code: 162,
                message: "HMDS query returned no data".to_string(),
            },
        )
        .with_bars("TSM", bars(&[50.0]));
    let config = MonitorConfig::chart();
    let mut chart = RatioChart::new(RecordingSurface::new().closing_after_pauses(3), config.ma_window);

    let exit = run_chart_loop(&source, &config, &mut chart).await;

    assert_eq!(exit, ChartExit::Closed);
    assert_eq!(chart.surface().draws(), 0);
    assert_eq!(source.requests().len(), 2);
}

#[tokio::test]
async fn test_loop_survives_draw_failures() {
    let source = pair_source();
    let config = MonitorConfig::chart();
    let surface = RecordingSurface::new().failing_draws().closing_after_pauses(3);
    let mut chart = RatioChart::new(surface, config.ma_window);

    let exit = run_chart_loop(&source, &config, &mut chart).await;

    assert_eq!(exit, ChartExit::Closed);
    assert_eq!(chart.surface().draws(), 0);
    assert_eq!(chart.surface().pauses(), 3);
}
