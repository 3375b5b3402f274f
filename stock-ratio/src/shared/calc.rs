//! Summary statistics and moving average over a ratio series
//!
//! NaN values (0/0 rows) are skipped by the summary statistics; infinities
//! are kept.

/// Mean/std/min/max over a ratio series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation, None below two points
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

impl RatioStats {
    /// None when there is no usable value
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let valid: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if valid.is_empty() {
            return None;
        }

        let n = valid.len() as f64;
        let mean: f64 = valid.iter().sum::<f64>() / n;
        let std = if valid.len() >= 2 {
            let variance: f64 = valid.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            Some(variance.sqrt())
        } else {
            None
        };

        Some(Self {
            count: valid.len(),
            mean,
            std,
            min: valid.iter().copied().fold(f64::INFINITY, f64::min),
            max: valid.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Moving average window for a series of `len` points: min(max_window, len)
pub fn moving_average_window(len: usize, max_window: usize) -> usize {
    max_window.min(len)
}

/// Trailing simple moving average.
///
/// Output has one entry per input; entries before the window is full are None.
pub fn trailing_sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    // Summed per window: a running sum never recovers once inf - inf turns it NaN
    (0..values.len())
        .map(|i| {
            (i + 1 >= window)
                .then(|| values[i + 1 - window..=i].iter().sum::<f64>() / window as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_example() {
        let stats = RatioStats::from_values(&[2.0, 2.0, 3.0]).unwrap();
        assert!((stats.mean - 7.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.count, 3);
        // sample std of [2, 2, 3] = sqrt(1/3)
        assert!((stats.std.unwrap() - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_stats_single_value_has_no_std() {
        let stats = RatioStats::from_values(&[1.5]).unwrap();
        assert_eq!(stats.mean, 1.5);
        assert!(stats.std.is_none());
    }

    #[test]
    fn test_stats_skip_nan() {
        let stats = RatioStats::from_values(&[1.0, f64::NAN, 3.0]).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean, 2.0);
        assert!(RatioStats::from_values(&[f64::NAN]).is_none());
        assert!(RatioStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_moving_average_window() {
        struct TestCase {
            len: usize,
            expected: usize,
        }

        let tests = vec![
            // TC0: shorter than the cap uses the whole series
            TestCase { len: 5, expected: 5 },
            // TC1: exactly the cap
            TestCase { len: 20, expected: 20 },
            // TC2: longer series is capped
            TestCase { len: 100, expected: 20 },
            // TC3: empty
            TestCase { len: 0, expected: 0 },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(moving_average_window(test.len, 20), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_trailing_sma() {
        let sma = trailing_sma(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(sma, vec![None, Some(1.5), Some(2.5), Some(3.5)]);

        // Window equal to the series length yields a single point at the end
        let sma = trailing_sma(&[1.0, 2.0, 3.0], 3);
        assert_eq!(sma, vec![None, None, Some(2.0)]);

        assert_eq!(trailing_sma(&[1.0], 0), vec![None]);
    }

    #[test]
    fn test_trailing_sma_recovers_after_infinity() {
        let sma = trailing_sma(&[1.0, f64::INFINITY, 3.0, 5.0], 2);
        assert!(sma[1].unwrap().is_infinite());
        assert!(sma[2].unwrap().is_infinite());
        assert_eq!(sma[3], Some(4.0));
    }
}
