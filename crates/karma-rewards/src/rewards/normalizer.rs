use std::collections::BTreeMap;

use super::domain::{DailyMetrics, MetricKey};
use super::settings::MetricRange;

/// Metric values scaled into [0, 1] by their configured range.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMetrics {
    values: BTreeMap<MetricKey, f64>,
}

impl NormalizedMetrics {
    pub fn get(&self, key: MetricKey) -> f64 {
        self.values.get(&key).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKey, f64)> + '_ {
        self.values.iter().map(|(key, value)| (*key, *value))
    }

    /// Average engagement across all metrics.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.values().sum::<f64>() / self.values.len() as f64
    }
}

/// Clamp every counter into its range. Metrics without a range pass through.
pub fn clamp_metrics(
    metrics: &DailyMetrics,
    ranges: &BTreeMap<MetricKey, MetricRange>,
) -> DailyMetrics {
    let mut clamped = *metrics;
    for key in MetricKey::ALL {
        if let Some(range) = ranges.get(&key) {
            clamped.set(key, range.clamp(metrics.value(key)));
        }
    }
    clamped
}

pub fn normalize_metrics(
    metrics: &DailyMetrics,
    ranges: &BTreeMap<MetricKey, MetricRange>,
) -> NormalizedMetrics {
    let values = MetricKey::ALL
        .into_iter()
        .map(|key| {
            let scaled = ranges
                .get(&key)
                .map(|range| range.normalize(metrics.value(key)))
                .unwrap_or(0.0);
            (key, scaled)
        })
        .collect();
    NormalizedMetrics { values }
}
