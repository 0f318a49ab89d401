//! Surprise box reward determination.
//!
//! Data flows forward only: metrics are clamped and normalized, rules select
//! candidate box types, the injected scorer gates eligibility, and the seeded
//! selectors pick the box and rarity before karma is scaled and clamped.

pub mod conditions;
pub mod domain;
pub mod engine;
pub mod karma;
pub mod loader;
pub mod normalizer;
pub mod router;
pub mod rules;
pub mod scorer;
pub mod selection;
pub mod service;
pub mod settings;
pub mod sqlite_store;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use conditions::{
    Comparison, Condition, ConditionExpr, ConditionParseError, FeatureCondition,
    FeatureConditionError, FeatureConditions,
};
pub use domain::{
    DailyMetrics, DecisionStatus, MetricKey, RarityTier, RewardDecision, TemporalContext,
};
pub use engine::{EngineError, RewardEngine};
pub use loader::{load_reward_data, LoadedRewardData, RewardDataError};
pub use router::{reward_router, SurpriseBoxResponse};
pub use rules::{RewardRule, RuleSet};
pub use scorer::{
    FeatureVector, LogisticScorer, ProbabilityScorer, ScorerLoadError, ScorerModel, ScoringError,
};
pub use service::{RewardRequest, RewardService, RewardServiceError};
pub use settings::{
    BoxTypeConfig, ConfigLoadError, ConfigurationError, MetricRange, RewardEngineConfig,
    RewardRuleConfig, TemporalTrends,
};
pub use sqlite_store::SqliteRewardStore;
pub use store::{retention_cutoff, RewardRecord, RewardStore, StoreError};
pub use validation::ValidationError;
