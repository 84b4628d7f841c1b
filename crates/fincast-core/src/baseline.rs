//! Baseline Statistics Engine
//!
//! Pure aggregation over monthly historical totals. The metrics computed here
//! serve double duty: they anchor the prompt sent to the completion provider
//! and they are the fallback estimate when the provider is unavailable.

use serde::{Deserialize, Serialize};

use crate::models::MonthlyStatistic;

/// Statistical reference values derived from monthly history.
///
/// Recomputed per request; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineMetrics {
    /// Mean of all monthly totals (0 when history is empty)
    pub simple_average: f64,
    /// Mean of the last 3 monthly totals; None with fewer than 3 months
    pub moving_average: Option<f64>,
    /// Total of the same month one year earlier, when present
    pub seasonal_reference: Option<f64>,
    /// Sum of the last 12 monthly totals (or all of them if fewer)
    pub last_12_months_total: f64,
}

impl BaselineMetrics {
    /// Compute baseline metrics for a target `(year, month)` from
    /// chronologically ordered monthly statistics.
    pub fn compute(stats: &[MonthlyStatistic], year: i32, month: u32) -> Self {
        let simple_average = if stats.is_empty() {
            0.0
        } else {
            stats.iter().map(|s| s.total).sum::<f64>() / stats.len() as f64
        };

        let moving_average = if stats.len() >= 3 {
            let tail = &stats[stats.len() - 3..];
            Some(tail.iter().map(|s| s.total).sum::<f64>() / 3.0)
        } else {
            None
        };

        let seasonal_reference = stats
            .iter()
            .find(|s| s.year == year - 1 && s.month == month)
            .map(|s| s.total);

        let last_12 = &stats[stats.len().saturating_sub(12)..];
        let last_12_months_total = last_12.iter().map(|s| s.total).sum();

        Self {
            simple_average,
            moving_average,
            seasonal_reference,
            last_12_months_total,
        }
    }

    /// Best available single-number estimate when the provider cannot be
    /// consulted: simple average, then last year's same month, then the
    /// moving average, then 0.
    pub fn fallback_total(&self) -> f64 {
        if self.simple_average > 0.0 {
            self.simple_average
        } else if let Some(seasonal) = self.seasonal_reference.filter(|v| *v > 0.0) {
            seasonal
        } else if let Some(moving) = self.moving_average.filter(|v| *v > 0.0) {
            moving
        } else {
            0.0
        }
    }
}

/// One month flagged as deviating from the series mean
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyMonth {
    pub year: i32,
    pub month: u32,
    pub total: f64,
    /// Deviation from the series mean, in percent (signed)
    pub deviation_percent: f64,
}

/// Months whose totals deviate from the mean by more than
/// `sigma` standard deviations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalySummary {
    /// Flagged months, in chronological source order
    pub items: Vec<AnomalyMonth>,
    pub mean: f64,
    pub std: f64,
    pub threshold: f64,
}

impl AnomalySummary {
    /// Detect anomalous months in a monthly series.
    ///
    /// Returns an empty set when the series is too short to carry signal
    /// (fewer than 6 months) or near-constant (population stddev below 1,
    /// where flagging would only amplify rounding noise).
    pub fn detect(stats: &[MonthlyStatistic], sigma: f64) -> Self {
        if stats.len() < 6 {
            return Self::empty();
        }

        let n = stats.len() as f64;
        let mean = stats.iter().map(|s| s.total).sum::<f64>() / n;
        let variance = stats.iter().map(|s| (s.total - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        if std < 1.0 {
            return Self::empty();
        }

        let threshold = std * sigma;
        let items = stats
            .iter()
            .filter(|s| (s.total - mean).abs() >= threshold)
            .map(|s| AnomalyMonth {
                year: s.year,
                month: s.month,
                total: s.total,
                deviation_percent: if mean != 0.0 {
                    (s.total - mean) / mean * 100.0
                } else {
                    0.0
                },
            })
            .collect();

        Self {
            items,
            mean,
            std,
            threshold,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            mean: 0.0,
            std: 0.0,
            threshold: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(year: i32, month: u32, total: f64) -> MonthlyStatistic {
        MonthlyStatistic {
            year,
            month,
            count: 10,
            total,
            average: total / 10.0,
        }
    }

    #[test]
    fn test_simple_average_empty() {
        let metrics = BaselineMetrics::compute(&[], 2025, 6);
        assert_eq!(metrics.simple_average, 0.0);
        assert!(metrics.moving_average.is_none());
        assert!(metrics.seasonal_reference.is_none());
        assert_eq!(metrics.last_12_months_total, 0.0);
    }

    #[test]
    fn test_simple_average_is_mean_of_totals() {
        let stats = vec![
            month(2025, 1, 100.0),
            month(2025, 2, 200.0),
            month(2025, 3, 300.0),
        ];
        let metrics = BaselineMetrics::compute(&stats, 2025, 4);
        assert!((metrics.simple_average - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_moving_average_requires_three_months() {
        let short = vec![month(2025, 1, 100.0), month(2025, 2, 200.0)];
        assert!(BaselineMetrics::compute(&short, 2025, 3)
            .moving_average
            .is_none());

        let stats = vec![
            month(2025, 1, 100.0),
            month(2025, 2, 200.0),
            month(2025, 3, 300.0),
            month(2025, 4, 400.0),
        ];
        let metrics = BaselineMetrics::compute(&stats, 2025, 5);
        // Mean of exactly the last 3 entries
        assert!((metrics.moving_average.unwrap() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_seasonal_reference_matches_previous_year() {
        let stats = vec![month(2024, 6, 500.0), month(2025, 1, 100.0)];
        let metrics = BaselineMetrics::compute(&stats, 2025, 6);
        assert_eq!(metrics.seasonal_reference, Some(500.0));

        let metrics = BaselineMetrics::compute(&stats, 2025, 7);
        assert!(metrics.seasonal_reference.is_none());
    }

    #[test]
    fn test_last_12_months_total_caps_at_twelve() {
        let stats: Vec<_> = (1..=12)
            .map(|m| month(2024, m, 100.0))
            .chain((1..=6).map(|m| month(2025, m, 100.0)))
            .collect();
        let metrics = BaselineMetrics::compute(&stats, 2025, 7);
        assert!((metrics.last_12_months_total - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_total_order() {
        let metrics = BaselineMetrics {
            simple_average: 0.0,
            moving_average: Some(300.0),
            seasonal_reference: Some(500.0),
            last_12_months_total: 0.0,
        };
        assert_eq!(metrics.fallback_total(), 500.0);

        let metrics = BaselineMetrics {
            simple_average: 0.0,
            moving_average: Some(300.0),
            seasonal_reference: None,
            last_12_months_total: 0.0,
        };
        assert_eq!(metrics.fallback_total(), 300.0);

        let metrics = BaselineMetrics::compute(&[], 2025, 1);
        assert_eq!(metrics.fallback_total(), 0.0);
    }

    #[test]
    fn test_anomaly_detector_needs_six_months() {
        let stats: Vec<_> = (1..=5).map(|m| month(2025, m, m as f64 * 1000.0)).collect();
        assert!(AnomalySummary::detect(&stats, 1.5).is_empty());
    }

    #[test]
    fn test_anomaly_detector_skips_constant_series() {
        let stats: Vec<_> = (1..=12).map(|m| month(2025, m, 1000.0)).collect();
        assert!(AnomalySummary::detect(&stats, 1.5).is_empty());
    }

    #[test]
    fn test_spike_month_is_flagged_with_positive_deviation() {
        // 24 months around 1000 with one month pushed far above 3 sigma
        let mut stats: Vec<_> = (0u32..24)
            .map(|i| {
                month(
                    2023 + (i / 12) as i32,
                    i % 12 + 1,
                    1000.0 + (i % 3) as f64 * 50.0,
                )
            })
            .collect();
        stats[10].total = 5000.0;

        let summary = AnomalySummary::detect(&stats, 1.5);
        assert!(!summary.is_empty());
        let spike = summary
            .items
            .iter()
            .find(|a| (a.total - 5000.0).abs() < 1e-9)
            .expect("spike month must be flagged");
        assert!(spike.deviation_percent > 0.0);
    }
}
