use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use super::conditions::FeatureConditions;
use super::domain::{DailyMetrics, DecisionStatus, RewardDecision, TemporalContext};
use super::karma::{calculate_karma, KarmaBounds};
use super::normalizer::{clamp_metrics, normalize_metrics, NormalizedMetrics};
use super::rules::{RewardRule, RuleSet};
use super::scorer::{FeatureVector, ProbabilityScorer, ScoringError};
use super::selection::{select_box_type, select_rarity};
use super::settings::{ConfigurationError, RewardEngineConfig};

/// Stateless decision pipeline over immutable configuration and an injected
/// scorer. Safe to share across threads; each call is independent.
pub struct RewardEngine {
    config: RewardEngineConfig,
    rules: RuleSet,
    feature_conditions: FeatureConditions,
    scorer: Arc<dyn ProbabilityScorer>,
}

/// Failure while producing a decision. Callers surface this as a generic
/// processing error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("probability scoring failed: {0}")]
    Scoring(#[from] ScoringError),
    #[error("reward configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl RewardEngine {
    pub fn new(
        config: RewardEngineConfig,
        feature_conditions: FeatureConditions,
        scorer: Arc<dyn ProbabilityScorer>,
    ) -> Result<Self, ConfigurationError> {
        let rules = RuleSet::new(config.validate()?);
        for box_type in config.zero_weight_box_types() {
            warn!(
                box_type,
                "box type has all-zero rarity weights; draws will fall back to common"
            );
        }

        Ok(Self {
            config,
            rules,
            feature_conditions,
            scorer,
        })
    }

    pub fn config(&self) -> &RewardEngineConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn feature_conditions(&self) -> &FeatureConditions {
        &self.feature_conditions
    }

    /// Decide the reward for one user/day. `already_rewarded` comes from the
    /// dedup store and short-circuits every other step.
    pub fn evaluate(
        &self,
        user_id: &str,
        date: NaiveDate,
        metrics: &DailyMetrics,
        already_rewarded: bool,
    ) -> Result<RewardDecision, EngineError> {
        if already_rewarded {
            info!(user_id, %date, "reward already granted for this date");
            return Ok(RewardDecision::denied(
                user_id,
                date,
                DecisionStatus::AlreadyReceived,
            ));
        }

        let clamped = clamp_metrics(metrics, &self.config.metric_ranges);
        let matched = self.rules.evaluate(&clamped);
        if matched.is_empty() {
            info!(user_id, %date, "no reward rule matched");
            return Ok(RewardDecision::denied(user_id, date, DecisionStatus::NoMatch));
        }

        let temporal = TemporalContext::from_date(date);
        let normalized = normalize_metrics(&clamped, &self.config.metric_ranges);
        let features = self.features(&clamped, &normalized, &matched, temporal);
        let probability = self.score(&features)?;

        let threshold = self.config.reward_probability_threshold;
        if probability < threshold {
            info!(user_id, %date, probability, threshold, "probability below threshold");
            return Ok(RewardDecision::denied(user_id, date, DecisionStatus::Missed));
        }

        let candidates: Vec<&str> = matched.iter().map(|rule| rule.box_type.as_str()).collect();
        let Some(box_id) = select_box_type(&candidates, user_id, date) else {
            return Ok(RewardDecision::denied(user_id, date, DecisionStatus::NoMatch));
        };
        let box_type = self
            .config
            .box_type(box_id)
            .ok_or_else(|| ConfigurationError::MissingBoxType(box_id.to_string()))?;

        let draw = select_rarity(
            box_id,
            box_type,
            &self.config.target_rarity_dist,
            probability,
            threshold,
            user_id,
            date,
        );
        let mut warnings = Vec::new();
        if draw.fallback {
            warn!(box_type = box_id, "all rarity weights are zero; using common tier");
            warnings.push(format!(
                "box type '{box_id}' has no rarity weight configured; defaulted to common"
            ));
        }

        let karma = calculate_karma(
            box_type.base_karma,
            draw.tier,
            &normalized,
            temporal,
            &self.config.temporal_trends,
            KarmaBounds {
                min: self.config.karma_min,
                max: self.config.karma_max,
            },
        );

        let reason = matched
            .iter()
            .find(|rule| rule.box_type == box_id)
            .map(|rule| rule.description.clone())
            .unwrap_or_default();

        info!(
            user_id,
            %date,
            box_type = box_id,
            rarity = %draw.tier,
            karma,
            "surprise box granted"
        );

        Ok(RewardDecision {
            user_id: user_id.to_string(),
            date,
            granted: true,
            status: DecisionStatus::Delivered,
            box_type: Some(box_id.to_string()),
            box_name: Some(box_type.name.clone()),
            rarity: Some(draw.tier),
            karma,
            reason,
            warnings,
        })
    }

    /// Assemble the scorer input: normalized metrics, one flag per reward
    /// rule, one flag per catalogue condition, and the temporal multiplier.
    pub fn features(
        &self,
        clamped: &DailyMetrics,
        normalized: &NormalizedMetrics,
        matched: &[&RewardRule],
        temporal: TemporalContext,
    ) -> FeatureVector {
        let mut features = FeatureVector::default();
        for (key, value) in normalized.iter() {
            features.insert(key.as_str(), value);
        }

        for rule in self.rules.iter() {
            let hit = matched.iter().any(|m| m.box_type == rule.box_type);
            features.insert(rule.feature_name(), flag(hit));
        }

        for (index, condition) in self.feature_conditions.iter().enumerate() {
            features.insert(
                FeatureConditions::feature_name(index),
                flag(condition.expression.holds(clamped)),
            );
        }

        features.insert("temporal_multiplier", self.temporal_multiplier(temporal));
        features
    }

    pub fn temporal_multiplier(&self, temporal: TemporalContext) -> f64 {
        let trends = &self.config.temporal_trends;
        let weekday = if temporal.is_weekend() {
            trends.weekend_multiplier
        } else {
            1.0
        };
        weekday * trends.seasonal_multiplier(temporal.month)
    }

    fn score(&self, features: &FeatureVector) -> Result<f64, ScoringError> {
        let probability = self.scorer.score(features)?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(ScoringError::OutOfRange(probability));
        }
        Ok(probability)
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
