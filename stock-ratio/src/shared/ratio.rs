//! Pair ratio processing
//!
//! Pairs two bar series row by row and divides every OHLC field of the
//! numerator by the denominator's.

use chrono::{DateTime, Utc};
use tracing::warn;

use super::types::{Bar, Ohlc};

/// How rows of the two series are matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// Row i with row i, regardless of timestamps
    #[default]
    Positional,
    /// Only rows whose bar timestamps are equal
    Timestamp,
}

/// One paired row of the combined series
#[derive(Debug, Clone, PartialEq)]
pub struct RatioRow {
    /// Numerator bar time
    pub time: DateTime<Utc>,
    pub numerator: Ohlc,
    pub denominator: Ohlc,
    /// numerator / denominator, field by field
    pub ratio: Ohlc,
}

/// Combined series for a symbol pair
#[derive(Debug, Clone, PartialEq)]
pub struct RatioSeries {
    pub numerator_symbol: String,
    pub denominator_symbol: String,
    pub rows: Vec<RatioRow>,
}

impl RatioSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Close ratio of every row
    pub fn close_ratios(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.ratio.close).collect()
    }

    pub fn times(&self) -> Vec<DateTime<Utc>> {
        self.rows.iter().map(|r| r.time).collect()
    }

    pub fn last(&self) -> Option<&RatioRow> {
        self.rows.last()
    }

    /// Last `n` rows (fewer if the series is shorter)
    pub fn tail(&self, n: usize) -> &[RatioRow] {
        let start = self.rows.len().saturating_sub(n);
        &self.rows[start..]
    }

    /// "NVDA/TSM"
    pub fn label(&self) -> String {
        format!("{}/{}", self.numerator_symbol, self.denominator_symbol)
    }
}

/// Build the combined ratio series.
///
/// Returns `None` if either side is absent; no partial computation.
pub fn combine(
    numerator_symbol: &str,
    denominator_symbol: &str,
    numerator: Option<&[Bar]>,
    denominator: Option<&[Bar]>,
    alignment: Alignment,
) -> Option<RatioSeries> {
    let (Some(numerator), Some(denominator)) = (numerator, denominator) else {
        warn!("Failed to get data for one or both stocks");
        return None;
    };

    let rows = match alignment {
        Alignment::Positional => pair_by_position(numerator, denominator),
        Alignment::Timestamp => pair_by_timestamp(numerator, denominator),
    };

    Some(RatioSeries {
        numerator_symbol: numerator_symbol.to_string(),
        denominator_symbol: denominator_symbol.to_string(),
        rows,
    })
}

fn ratio_row(a: &Bar, b: &Bar) -> RatioRow {
    let numerator = a.ohlc();
    let denominator = b.ohlc();
    RatioRow {
        time: a.time,
        numerator,
        denominator,
        ratio: numerator.ratio_to(&denominator),
    }
}

fn pair_by_position(numerator: &[Bar], denominator: &[Bar]) -> Vec<RatioRow> {
    if numerator.len() != denominator.len() {
        warn!(
            numerator_len = numerator.len(),
            denominator_len = denominator.len(),
            "Bar series lengths differ, pairing common prefix only"
        );
    }

    let misaligned = numerator
        .iter()
        .zip(denominator)
        .filter(|(a, b)| a.time != b.time)
        .count();
    if misaligned > 0 {
        warn!(misaligned, "Paired rows with different bar timestamps");
    }

    numerator
        .iter()
        .zip(denominator)
        .map(|(a, b)| ratio_row(a, b))
        .collect()
}

/// Merge walk over two series sorted by time
fn pair_by_timestamp(numerator: &[Bar], denominator: &[Bar]) -> Vec<RatioRow> {
    let mut rows = Vec::with_capacity(numerator.len().min(denominator.len()));
    let (mut i, mut j) = (0, 0);

    while i < numerator.len() && j < denominator.len() {
        let (a, b) = (&numerator[i], &denominator[j]);
        match a.time.cmp(&b.time) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                rows.push(ratio_row(a, b));
                i += 1;
                j += 1;
            }
        }
    }

    rows
}
