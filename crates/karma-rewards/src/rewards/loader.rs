use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::conditions::{FeatureConditionError, FeatureConditions};
use super::engine::RewardEngine;
use super::scorer::{LogisticScorer, ScorerLoadError, ScorerModel};
use super::settings::{ConfigLoadError, ConfigurationError, RewardEngineConfig};
use crate::config::RewardDataConfig;

/// Engine plus the scorer metadata surfaced on the version endpoint.
pub struct LoadedRewardData {
    pub engine: RewardEngine,
    pub model: ScorerModel,
}

#[derive(Debug, thiserror::Error)]
pub enum RewardDataError {
    #[error("{}: {source}", .path.display())]
    EngineConfig {
        path: PathBuf,
        #[source]
        source: ConfigLoadError,
    },
    #[error("{}: {source}", .path.display())]
    Conditions {
        path: PathBuf,
        #[source]
        source: FeatureConditionError,
    },
    #[error("{}: {source}", .path.display())]
    Scorer {
        path: PathBuf,
        #[source]
        source: ScorerLoadError,
    },
    #[error("invalid reward configuration: {0}")]
    Invalid(#[from] ConfigurationError),
}

/// Read the engine config, feature catalogue, and scorer weights, then build
/// a validated engine.
pub fn load_reward_data(paths: &RewardDataConfig) -> Result<LoadedRewardData, RewardDataError> {
    let config = RewardEngineConfig::from_path(&paths.engine_config_path).map_err(|source| {
        RewardDataError::EngineConfig {
            path: paths.engine_config_path.clone(),
            source,
        }
    })?;
    let conditions = FeatureConditions::from_path(&paths.conditions_path).map_err(|source| {
        RewardDataError::Conditions {
            path: paths.conditions_path.clone(),
            source,
        }
    })?;
    let scorer = load_scorer(&paths.scorer_path)?;
    let model = scorer.model().clone();

    let engine = RewardEngine::new(config, conditions, Arc::new(scorer))?;
    info!(
        rules = engine.rules().iter().count(),
        feature_conditions = engine.feature_conditions().len(),
        model_version = %model.version,
        "reward data loaded"
    );

    Ok(LoadedRewardData { engine, model })
}

fn load_scorer(path: &Path) -> Result<LogisticScorer, RewardDataError> {
    LogisticScorer::from_path(path).map_err(|source| RewardDataError::Scorer {
        path: path.to_path_buf(),
        source,
    })
}
