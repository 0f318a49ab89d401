use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::conditions::{Condition, ConditionParseError};
use super::domain::{MetricKey, RarityTier};
use super::rules::RewardRule;

/// Tolerance applied to every "weights sum to one" check.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Static engine configuration, loaded once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardEngineConfig {
    pub reward_probability_threshold: f64,
    pub karma_min: u32,
    pub karma_max: u32,
    pub metric_ranges: BTreeMap<MetricKey, MetricRange>,
    pub reward_rules: Vec<RewardRuleConfig>,
    pub box_types: BTreeMap<String, BoxTypeConfig>,
    pub target_rarity_dist: BTreeMap<RarityTier, f64>,
    #[serde(default)]
    pub temporal_trends: TemporalTrends,
}

/// Inclusive valid range for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRange {
    pub min: u32,
    pub max: u32,
}

impl MetricRange {
    pub fn clamp(&self, value: u32) -> u32 {
        value.clamp(self.min, self.max)
    }

    /// Scale a value into [0, 1]; a zero-width range maps everything to 0.
    pub fn normalize(&self, value: u32) -> f64 {
        let width = self.max.saturating_sub(self.min);
        if width == 0 {
            return 0.0;
        }
        f64::from(self.clamp(value) - self.min) / f64::from(width)
    }
}

/// A named rule, keyed by the box type it unlocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRuleConfig {
    pub box_type: String,
    pub description: String,
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxTypeConfig {
    pub name: String,
    pub base_karma: u32,
    pub rarity_weights: BTreeMap<RarityTier, f64>,
}

impl BoxTypeConfig {
    pub fn weight(&self, tier: RarityTier) -> f64 {
        self.rarity_weights.get(&tier).copied().unwrap_or(0.0)
    }

    pub fn total_weight(&self) -> f64 {
        self.rarity_weights.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalTrends {
    #[serde(default = "default_weekend_multiplier")]
    pub weekend_multiplier: f64,
    #[serde(default)]
    pub seasonal_multipliers: BTreeMap<u32, f64>,
}

impl Default for TemporalTrends {
    fn default() -> Self {
        Self {
            weekend_multiplier: default_weekend_multiplier(),
            seasonal_multipliers: BTreeMap::new(),
        }
    }
}

fn default_weekend_multiplier() -> f64 {
    1.0
}

impl TemporalTrends {
    pub fn seasonal_multiplier(&self, month: u32) -> f64 {
        self.seasonal_multipliers.get(&month).copied().unwrap_or(1.0)
    }
}

/// Structural problems that make the engine configuration unusable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("reward_probability_threshold {0} must be within [0, 1]")]
    InvalidThreshold(f64),
    #[error("karma bounds invalid: min {min}, max {max}")]
    InvalidKarmaBounds { min: u32, max: u32 },
    #[error("no valid range configured for metric '{0}'")]
    MissingMetricRange(MetricKey),
    #[error("metric '{metric}' range is inverted ({min} > {max})")]
    InvertedMetricRange { metric: MetricKey, min: u32, max: u32 },
    #[error("reward rule '{0}' is defined more than once")]
    DuplicateRule(String),
    #[error("reward rule '{0}' has no conditions")]
    EmptyRule(String),
    #[error("reward rule '{rule}' condition '{condition}': {source}")]
    InvalidCondition {
        rule: String,
        condition: String,
        #[source]
        source: ConditionParseError,
    },
    #[error("reward rule '{0}' references an unknown box type")]
    MissingBoxType(String),
    #[error("box type '{0}' has no reward rule")]
    UnruledBoxType(String),
    #[error("box type '{0}' must carry a base_karma of at least 1")]
    InvalidBaseKarma(String),
    #[error("target rarity distribution is empty")]
    EmptyTargetDistribution,
    #[error("{owner} weight for '{tier}' is negative or not finite")]
    InvalidWeight { owner: String, tier: RarityTier },
    #[error("{owner} weights sum to {sum}, expected 1.0")]
    WeightsNotNormalized { owner: String, sum: f64 },
    #[error("box type '{box_type}' is missing a weight for rarity '{tier}'")]
    MissingRarityWeight { box_type: String, tier: RarityTier },
    #[error("seasonal multiplier month {0} is outside 1..=12")]
    InvalidSeasonMonth(u32),
    #[error("temporal multiplier {0} must be positive")]
    InvalidTemporalMultiplier(f64),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read reward configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid reward configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl RewardEngineConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigLoadError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn box_type(&self, id: &str) -> Option<&BoxTypeConfig> {
        self.box_types.get(id)
    }

    /// Box types whose weights are all zero. These are accepted but degrade
    /// rarity selection to the common tier.
    pub fn zero_weight_box_types(&self) -> Vec<&str> {
        self.box_types
            .iter()
            .filter(|(_, config)| config.total_weight() == 0.0)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Check structural invariants and compile every rule's conditions,
    /// preserving configuration order.
    pub fn validate(&self) -> Result<Vec<RewardRule>, ConfigurationError> {
        let threshold = self.reward_probability_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigurationError::InvalidThreshold(threshold));
        }
        if self.karma_min == 0 || self.karma_min > self.karma_max {
            return Err(ConfigurationError::InvalidKarmaBounds {
                min: self.karma_min,
                max: self.karma_max,
            });
        }

        for metric in MetricKey::ALL {
            let range = self
                .metric_ranges
                .get(&metric)
                .ok_or(ConfigurationError::MissingMetricRange(metric))?;
            if range.min > range.max {
                return Err(ConfigurationError::InvertedMetricRange {
                    metric,
                    min: range.min,
                    max: range.max,
                });
            }
        }

        let compiled = self.compile_rules()?;

        if self.target_rarity_dist.is_empty() {
            return Err(ConfigurationError::EmptyTargetDistribution);
        }
        validate_distribution("target rarity distribution", &self.target_rarity_dist)?;

        for (id, box_type) in &self.box_types {
            if box_type.base_karma == 0 {
                return Err(ConfigurationError::InvalidBaseKarma(id.clone()));
            }
            for tier in self.target_rarity_dist.keys() {
                if !box_type.rarity_weights.contains_key(tier) {
                    return Err(ConfigurationError::MissingRarityWeight {
                        box_type: id.clone(),
                        tier: *tier,
                    });
                }
            }
            if box_type.total_weight() != 0.0 {
                validate_distribution(&format!("box type '{id}'"), &box_type.rarity_weights)?;
            } else {
                validate_non_negative(&format!("box type '{id}'"), &box_type.rarity_weights)?;
            }
        }

        let trends = &self.temporal_trends;
        if !(trends.weekend_multiplier.is_finite() && trends.weekend_multiplier > 0.0) {
            return Err(ConfigurationError::InvalidTemporalMultiplier(
                trends.weekend_multiplier,
            ));
        }
        for (month, multiplier) in &trends.seasonal_multipliers {
            if !(1..=12).contains(month) {
                return Err(ConfigurationError::InvalidSeasonMonth(*month));
            }
            if !(multiplier.is_finite() && *multiplier > 0.0) {
                return Err(ConfigurationError::InvalidTemporalMultiplier(*multiplier));
            }
        }

        Ok(compiled)
    }

    fn compile_rules(&self) -> Result<Vec<RewardRule>, ConfigurationError> {
        let mut seen = BTreeSet::new();
        let mut compiled = Vec::with_capacity(self.reward_rules.len());

        for rule in &self.reward_rules {
            if !seen.insert(rule.box_type.as_str()) {
                return Err(ConfigurationError::DuplicateRule(rule.box_type.clone()));
            }
            if !self.box_types.contains_key(&rule.box_type) {
                return Err(ConfigurationError::MissingBoxType(rule.box_type.clone()));
            }
            if rule.conditions.is_empty() {
                return Err(ConfigurationError::EmptyRule(rule.box_type.clone()));
            }

            let conditions = rule
                .conditions
                .iter()
                .map(|raw| {
                    raw.parse::<Condition>()
                        .map_err(|source| ConfigurationError::InvalidCondition {
                            rule: rule.box_type.clone(),
                            condition: raw.clone(),
                            source,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            compiled.push(RewardRule {
                box_type: rule.box_type.clone(),
                description: rule.description.clone(),
                conditions,
            });
        }

        if let Some(orphan) = self
            .box_types
            .keys()
            .find(|id| !seen.contains(id.as_str()))
        {
            return Err(ConfigurationError::UnruledBoxType(orphan.clone()));
        }

        Ok(compiled)
    }
}

fn validate_non_negative(
    owner: &str,
    weights: &BTreeMap<RarityTier, f64>,
) -> Result<(), ConfigurationError> {
    for (tier, weight) in weights {
        if !(weight.is_finite() && *weight >= 0.0) {
            return Err(ConfigurationError::InvalidWeight {
                owner: owner.to_string(),
                tier: *tier,
            });
        }
    }
    Ok(())
}

fn validate_distribution(
    owner: &str,
    weights: &BTreeMap<RarityTier, f64>,
) -> Result<(), ConfigurationError> {
    validate_non_negative(owner, weights)?;
    let sum: f64 = weights.values().sum();
    if weights.is_empty() || (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(ConfigurationError::WeightsNotNormalized {
            owner: owner.to_string(),
            sum,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_scales_and_clamps() {
        let range = MetricRange { min: 10, max: 20 };
        assert_eq!(range.normalize(5), 0.0);
        assert_eq!(range.normalize(15), 0.5);
        assert_eq!(range.normalize(40), 1.0);
        assert_eq!(range.clamp(40), 20);
    }

    #[test]
    fn zero_width_range_normalizes_to_zero() {
        let range = MetricRange { min: 3, max: 3 };
        assert_eq!(range.normalize(3), 0.0);
        assert_eq!(range.normalize(100), 0.0);
    }

    #[test]
    fn seasonal_multiplier_defaults_to_one() {
        let mut trends = TemporalTrends::default();
        trends.seasonal_multipliers.insert(12, 1.5);
        assert_eq!(trends.seasonal_multiplier(12), 1.5);
        assert_eq!(trends.seasonal_multiplier(3), 1.0);
    }

    #[test]
    fn temporal_trends_deserialize_month_keys() {
        let trends: TemporalTrends =
            serde_json::from_str(r#"{"seasonal_multipliers": {"11": 1.1, "12": 1.5}}"#)
                .expect("parses");
        assert_eq!(trends.weekend_multiplier, 1.0);
        assert_eq!(trends.seasonal_multiplier(11), 1.1);
    }
}
