use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Named numeric inputs handed to the scorer. Ordered so that identical
/// inputs always present identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureVector {
    values: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Capability producing a reward probability in [0, 1]. Implementations must
/// return the same probability for the same features.
pub trait ProbabilityScorer: Send + Sync {
    fn score(&self, features: &FeatureVector) -> Result<f64, ScoringError>;
}

impl<F> ProbabilityScorer for F
where
    F: Fn(&FeatureVector) -> Result<f64, ScoringError> + Send + Sync,
{
    fn score(&self, features: &FeatureVector) -> Result<f64, ScoringError> {
        self(features)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("scorer expects feature '{0}' which was not provided")]
    MissingFeature(String),
    #[error("scorer returned {0}, outside [0, 1]")]
    OutOfRange(f64),
    #[error("scorer unavailable: {0}")]
    Unavailable(String),
}

/// Serialized weights for [`LogisticScorer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerModel {
    pub version: String,
    #[serde(default)]
    pub last_updated: Option<String>,
    pub bias: f64,
    pub weights: BTreeMap<String, f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScorerLoadError {
    #[error("failed to read scorer model: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scorer model JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Logistic regression over the feature vector.
#[derive(Debug, Clone)]
pub struct LogisticScorer {
    model: ScorerModel,
}

impl LogisticScorer {
    pub fn new(model: ScorerModel) -> Self {
        Self { model }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ScorerLoadError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ScorerLoadError> {
        let model: ScorerModel = serde_json::from_reader(reader)?;
        Ok(Self::new(model))
    }

    pub fn model(&self) -> &ScorerModel {
        &self.model
    }
}

impl ProbabilityScorer for LogisticScorer {
    fn score(&self, features: &FeatureVector) -> Result<f64, ScoringError> {
        let mut logit = self.model.bias;
        for (name, weight) in &self.model.weights {
            let value = features
                .get(name)
                .ok_or_else(|| ScoringError::MissingFeature(name.clone()))?;
            logit += weight * value;
        }
        Ok(1.0 / (1.0 + (-logit).exp()))
    }
}
