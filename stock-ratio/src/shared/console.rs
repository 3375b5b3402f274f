//! Console snapshot presenter
//!
//! Each cycle redraws the whole snapshot from the freshly fetched series.

use std::io::{self, Write};

use chrono::{DateTime, Local};

use super::calc::RatioStats;
use super::ratio::RatioSeries;

/// ANSI cursor-home + clear-screen
pub const CLEAR_SCREEN: &str = "\x1b[H\x1b[J";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render the snapshot text (without the clear-screen prefix)
pub fn render_snapshot(series: &RatioSeries, updated_at: DateTime<Local>, rows: usize) -> String {
    let a = &series.numerator_symbol;
    let b = &series.denominator_symbol;
    let mut out = String::new();

    out.push_str(&format!("\nData updated at: {}\n", updated_at.format(TIME_FORMAT)));
    out.push_str(&format!("\nLast {} entries of price data and ratio:\n", rows));

    let headers: Vec<String> = ["Open", "High", "Low", "Close"]
        .iter()
        .map(|f| format!("{}_{}", a, f))
        .chain(["Open", "High", "Low", "Close"].iter().map(|f| format!("{}_{}", b, f)))
        .chain(["Open", "High", "Low", "Close"].iter().map(|f| format!("{}_Ratio", f)))
        .collect();
    let width = headers.iter().map(|h| h.len()).max().unwrap_or(10).max(10);

    out.push_str(&format!("{:<19}", "Time"));
    for header in &headers {
        out.push_str(&format!(" {:>width$}", header, width = width));
    }
    out.push('\n');

    for row in series.tail(rows) {
        out.push_str(&format!("{:<19}", row.time.with_timezone(&Local).format(TIME_FORMAT)));
        let prices = [row.numerator, row.denominator];
        for ohlc in prices {
            for value in [ohlc.open, ohlc.high, ohlc.low, ohlc.close] {
                out.push_str(&format!(" {:>width$.2}", value, width = width));
            }
        }
        for value in [row.ratio.open, row.ratio.high, row.ratio.low, row.ratio.close] {
            out.push_str(&format!(" {:>width$.4}", value, width = width));
        }
        out.push('\n');
    }

    let Some(last) = series.last() else {
        out.push_str(&format!("\nNo overlapping bars for {}\n", series.label()));
        return out;
    };

    out.push_str("\nCurrent Ratios:\n");
    out.push_str(&format!("Open Ratio:   {:.4}\n", last.ratio.open));
    out.push_str(&format!("High Ratio:   {:.4}\n", last.ratio.high));
    out.push_str(&format!("Low Ratio:    {:.4}\n", last.ratio.low));
    out.push_str(&format!("Close Ratio:  {:.4}\n", last.ratio.close));

    out.push_str("\nRatio Statistics (based on Close Ratio):\n");
    match RatioStats::from_values(&series.close_ratios()) {
        Some(stats) => {
            out.push_str(&format!("Mean Ratio: {:.4}\n", stats.mean));
            out.push_str(&format!("Max Ratio:  {:.4}\n", stats.max));
            out.push_str(&format!("Min Ratio:  {:.4}\n", stats.min));
        }
        None => out.push_str("Mean Ratio: --\nMax Ratio:  --\nMin Ratio:  --\n"),
    }

    out
}

/// Clear the screen and write the snapshot
pub fn print_snapshot<W: Write>(writer: &mut W, series: &RatioSeries, rows: usize) -> io::Result<()> {
    writer.write_all(CLEAR_SCREEN.as_bytes())?;
    writer.write_all(render_snapshot(series, Local::now(), rows).as_bytes())?;
    writer.flush()
}
