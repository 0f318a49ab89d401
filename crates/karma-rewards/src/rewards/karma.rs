use super::domain::{RarityTier, TemporalContext};
use super::normalizer::NormalizedMetrics;
use super::settings::TemporalTrends;

/// Largest engagement bonus, reached when every metric sits at its range max.
pub const MAX_ENGAGEMENT_BONUS: f64 = 0.5;

/// Bounded, monotonic engagement scaling in `[1, 1 + MAX_ENGAGEMENT_BONUS]`.
pub fn metric_multiplier(normalized: &NormalizedMetrics) -> f64 {
    1.0 + MAX_ENGAGEMENT_BONUS * normalized.mean().clamp(0.0, 1.0)
}

/// Karma bounds applied after rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KarmaBounds {
    pub min: u32,
    pub max: u32,
}

pub fn calculate_karma(
    base_karma: u32,
    tier: RarityTier,
    normalized: &NormalizedMetrics,
    temporal: TemporalContext,
    trends: &TemporalTrends,
    bounds: KarmaBounds,
) -> u32 {
    let raw = f64::from(base_karma)
        * tier.karma_multiplier()
        * metric_multiplier(normalized)
        * trends.seasonal_multiplier(temporal.month);

    raw.round()
        .clamp(f64::from(bounds.min), f64::from(bounds.max)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewards::domain::{DailyMetrics, MetricKey};
    use crate::rewards::normalizer::normalize_metrics;
    use crate::rewards::settings::MetricRange;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn ranges() -> BTreeMap<MetricKey, MetricRange> {
        MetricKey::ALL
            .into_iter()
            .map(|key| (key, MetricRange { min: 0, max: 10 }))
            .collect()
    }

    fn june() -> TemporalContext {
        TemporalContext::from_date(NaiveDate::from_ymd_opt(2024, 6, 10).expect("valid date"))
    }

    fn wide_bounds() -> KarmaBounds {
        KarmaBounds { min: 1, max: 10_000 }
    }

    #[test]
    fn idle_user_gets_base_times_rarity() {
        let normalized = normalize_metrics(&DailyMetrics::default(), &ranges());
        let trends = TemporalTrends::default();
        assert_eq!(
            calculate_karma(20, RarityTier::Common, &normalized, june(), &trends, wide_bounds()),
            20
        );
        assert_eq!(
            calculate_karma(20, RarityTier::Legendary, &normalized, june(), &trends, wide_bounds()),
            40
        );
    }

    #[test]
    fn engagement_and_season_scale_karma() {
        let mut metrics = DailyMetrics::default();
        for key in MetricKey::ALL {
            metrics.set(key, 10);
        }
        let normalized = normalize_metrics(&metrics, &ranges());
        assert!((metric_multiplier(&normalized) - 1.5).abs() < 1e-12);

        let mut trends = TemporalTrends::default();
        trends.seasonal_multipliers.insert(6, 2.0);
        // 20 * 1.25 * 1.5 * 2.0
        assert_eq!(
            calculate_karma(20, RarityTier::Rare, &normalized, june(), &trends, wide_bounds()),
            75
        );
    }

    #[test]
    fn metric_multiplier_is_monotonic() {
        let mut previous = 0.0;
        for streak in 0..=12 {
            let metrics = DailyMetrics {
                login_streak: streak,
                ..DailyMetrics::default()
            };
            let multiplier = metric_multiplier(&normalize_metrics(&metrics, &ranges()));
            assert!(multiplier >= previous);
            assert!(multiplier <= 1.0 + MAX_ENGAGEMENT_BONUS);
            previous = multiplier;
        }
    }

    #[test]
    fn result_is_clamped_to_bounds() {
        let normalized = normalize_metrics(&DailyMetrics::default(), &ranges());
        let trends = TemporalTrends::default();
        let bounds = KarmaBounds { min: 25, max: 30 };
        assert_eq!(
            calculate_karma(10, RarityTier::Common, &normalized, june(), &trends, bounds),
            25
        );
        assert_eq!(
            calculate_karma(500, RarityTier::Legendary, &normalized, june(), &trends, bounds),
            30
        );
    }
}
