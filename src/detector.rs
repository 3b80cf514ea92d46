use tracing::warn;

use crate::types::config::Spread;

/// Mean and standard deviation of one metric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl ColumnStats {
    /// Returns zero mean and zero spread for an empty column. With
    /// `Spread::Sample` a single value also has zero spread.
    pub fn compute(values: &[f64], spread: Spread) -> Self {
        let n = values.len();
        if n == 0 {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
            };
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let divisor = match spread {
            Spread::Population => n as f64,
            Spread::Sample if n > 1 => (n - 1) as f64,
            Spread::Sample => {
                return Self { mean, std_dev: 0.0 };
            }
        };
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / divisor;
        Self {
            mean,
            std_dev: variance.sqrt(),
        }
    }

    /// Standardised distance from the mean; zero when the column has no spread.
    pub fn score(&self, value: f64) -> f64 {
        if self.std_dev == 0.0 {
            0.0
        } else {
            (value - self.mean) / self.std_dev
        }
    }
}

/// A row whose metric lies beyond the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Flagged<'a, R> {
    pub row: &'a R,
    pub value: f64,
    pub score: f64,
    /// Signed deviation from the column mean, in percent of the mean.
    pub pct_from_normal: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierDetector {
    threshold: f64,
    spread: Spread,
}

impl OutlierDetector {
    pub fn new(threshold: f64, spread: Spread) -> Self {
        Self { threshold, spread }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Flag rows whose `metric` is more than `threshold` standard deviations from
    /// the column mean. Statistics are computed afresh on every call; flagged rows
    /// keep their input order.
    ///
    /// A percentage of a zero mean is undefined, so when the mean is exactly zero
    /// no row is flagged.
    pub fn detect<'a, R>(&self, rows: &'a [R], metric: impl Fn(&R) -> f64) -> Vec<Flagged<'a, R>> {
        let values: Vec<f64> = rows.iter().map(&metric).collect();
        let stats = ColumnStats::compute(&values, self.spread);
        if stats.std_dev == 0.0 {
            return Vec::new();
        }

        let flagged: Vec<Flagged<'a, R>> = rows
            .iter()
            .zip(values)
            .filter_map(|(row, value)| {
                let score = stats.score(value);
                (score.abs() > self.threshold).then(|| Flagged {
                    row,
                    value,
                    score,
                    pct_from_normal: (value - stats.mean) / stats.mean * 100.0,
                })
            })
            .collect();

        if stats.mean == 0.0 && !flagged.is_empty() {
            warn!(
                outliers = flagged.len(),
                std_dev = stats.std_dev,
                "Column mean is zero, deviation percentage undefined; skipping outliers"
            );
            return Vec::new();
        }

        flagged
    }
}

impl Default for OutlierDetector {
    fn default() -> Self {
        Self::new(2.0, Spread::Population)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(threshold: f64) -> OutlierDetector {
        OutlierDetector::new(threshold, Spread::Population)
    }

    #[test]
    fn population_stats_match_hand_computation() {
        let stats = ColumnStats::compute(&[100.0, 100.0, 100.0, 1000.0], Spread::Population);
        assert!((stats.mean - 325.0).abs() < 1e-9);
        // sqrt(607500 / 4)
        assert!((stats.std_dev - 389.711).abs() < 1e-3);
    }

    #[test]
    fn sample_stats_divide_by_n_minus_one() {
        let stats = ColumnStats::compute(&[100.0, 100.0, 100.0, 1000.0], Spread::Sample);
        assert!((stats.std_dev - 450.0).abs() < 1e-9);
        let single = ColumnStats::compute(&[42.0], Spread::Sample);
        assert_eq!(single.std_dev, 0.0);
    }

    #[test]
    fn empty_column_flags_nothing() {
        let rows: Vec<f64> = Vec::new();
        assert!(detector(2.0).detect(&rows, |v| *v).is_empty());
    }

    #[test]
    fn constant_column_flags_nothing() {
        let rows = vec![100.0; 6];
        let stats = ColumnStats::compute(&rows, Spread::Population);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.score(100.0), 0.0);
        assert!(detector(0.0).detect(&rows, |v| *v).is_empty());
    }

    #[test]
    fn four_row_spike_flagged_with_lower_threshold() {
        let rows = vec![100.0, 100.0, 100.0, 1000.0];
        // Four rows cap |z| at sqrt(3), so the default threshold cannot fire here.
        assert!(detector(2.0).detect(&rows, |v| *v).is_empty());

        let flagged = detector(1.5).detect(&rows, |v| *v);
        assert_eq!(flagged.len(), 1);
        assert_eq!(*flagged[0].row, 1000.0);
        assert!(flagged[0].score > 0.0);
        assert!((flagged[0].pct_from_normal - 207.6923).abs() < 1e-3);
    }

    #[test]
    fn threshold_is_strict() {
        // Values 0 and 2 around mean 1 with std 1: |z| == 1 exactly.
        let rows = vec![0.0, 2.0, 0.0, 2.0];
        assert!(detector(1.0).detect(&rows, |v| *v).is_empty());
        assert_eq!(detector(0.999).detect(&rows, |v| *v).len(), 4);
    }

    #[test]
    fn negative_outliers_have_negative_score_and_pct() {
        let mut rows = vec![100.0; 20];
        rows.push(10.0);
        let flagged = detector(2.0).detect(&rows, |v| *v);
        assert_eq!(flagged.len(), 1);
        assert!(flagged[0].score < -2.0);
        assert!(flagged[0].pct_from_normal < 0.0);
    }

    #[test]
    fn zero_mean_column_is_not_flaggable() {
        let mut rows = vec![0.0; 20];
        rows.push(100.0);
        rows.push(-100.0);
        let flagged = detector(2.0).detect(&rows, |v| *v);
        assert!(flagged.is_empty());
    }

    #[test]
    fn detection_is_idempotent() {
        let mut rows: Vec<f64> = (0..30).map(|i| 50.0 + (i % 5) as f64).collect();
        rows.push(400.0);
        let d = detector(2.0);
        let first = d.detect(&rows, |v| *v);
        let second = d.detect(&rows, |v| *v);
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn different_metrics_use_independent_stats() {
        let mut rows: Vec<(f64, f64)> = (0..20).map(|_| (100.0, 5.0)).collect();
        rows.push((100.0, 500.0));
        rows.push((1000.0, 5.0));
        let d = detector(2.0);
        let by_first = d.detect(&rows, |r| r.0);
        let by_second = d.detect(&rows, |r| r.1);
        assert_eq!(by_first.len(), 1);
        assert_eq!(by_first[0].row.0, 1000.0);
        assert_eq!(by_second.len(), 1);
        assert_eq!(by_second[0].row.1, 500.0);
    }
}
