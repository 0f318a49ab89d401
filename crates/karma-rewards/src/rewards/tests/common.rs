use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::rewards::conditions::FeatureConditions;
use crate::rewards::domain::DailyMetrics;
use crate::rewards::engine::RewardEngine;
use crate::rewards::scorer::{FeatureVector, ProbabilityScorer, ScoringError};
use crate::rewards::service::{RewardRequest, RewardService};
use crate::rewards::settings::RewardEngineConfig;
use crate::rewards::store::{RewardRecord, RewardStore, StoreError};

pub(super) const USER: &str = "user_1001";

/// A Wednesday in June, so neither weekend nor seasonal scaling applies.
pub(super) fn decision_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 11).expect("valid date")
}

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 12).expect("valid date")
}

pub(super) fn engine_config_json() -> Value {
    json!({
        "reward_probability_threshold": 0.9,
        "karma_min": 5,
        "karma_max": 100,
        "metric_ranges": {
            "login_streak": {"min": 0, "max": 30},
            "posts_created": {"min": 0, "max": 20},
            "comments_written": {"min": 0, "max": 50},
            "upvotes_received": {"min": 0, "max": 200},
            "quizzes_completed": {"min": 0, "max": 10},
            "buddies_messaged": {"min": 0, "max": 30},
            "karma_spent": {"min": 0, "max": 500},
            "karma_earned_today": {"min": 0, "max": 200}
        },
        "reward_rules": [
            {
                "box_type": "streak_engager",
                "description": "Consistent logins + content and quiz activity",
                "conditions": ["login_streak >= 5", "posts_created >= 2", "quizzes_completed >= 2"]
            },
            {
                "box_type": "quiz_enthusiast",
                "description": "Frequent quizzes + regular logins",
                "conditions": ["quizzes_completed >= 4", "login_streak >= 2"]
            },
            {
                "box_type": "social_butterfly",
                "description": "Active messaging + content contributions",
                "conditions": ["buddies_messaged >= 5", "comments_written >= 3"]
            }
        ],
        "box_types": {
            "streak_engager": {
                "name": "Streak Engager Box",
                "base_karma": 20,
                "rarity_weights": {"common": 0.5, "rare": 0.3, "elite": 0.15, "legendary": 0.05}
            },
            "quiz_enthusiast": {
                "name": "Quiz Enthusiast Box",
                "base_karma": 15,
                "rarity_weights": {"common": 0.6, "rare": 0.25, "elite": 0.1, "legendary": 0.05}
            },
            "social_butterfly": {
                "name": "Social Butterfly Box",
                "base_karma": 10,
                "rarity_weights": {"common": 0.7, "rare": 0.2, "elite": 0.08, "legendary": 0.02}
            }
        },
        "target_rarity_dist": {"common": 0.6, "rare": 0.25, "elite": 0.1, "legendary": 0.05},
        "temporal_trends": {
            "weekend_multiplier": 1.2,
            "seasonal_multipliers": {"12": 1.5}
        }
    })
}

pub(super) fn engine_config() -> RewardEngineConfig {
    serde_json::from_value(engine_config_json()).expect("fixture config parses")
}

pub(super) fn feature_conditions() -> FeatureConditions {
    let csv = "condition,label,probability\n\
               login_streak >= 5 and posts_created >= 2,1,0.8\n\
               (buddies_messaged >= 5 or comments_written >= 3),0,0.4\n";
    FeatureConditions::from_reader(csv.as_bytes()).expect("fixture conditions parse")
}

pub(super) fn streak_metrics() -> DailyMetrics {
    DailyMetrics {
        login_streak: 5,
        posts_created: 3,
        quizzes_completed: 3,
        ..DailyMetrics::default()
    }
}

pub(super) fn engine_with_scorer(scorer: Arc<dyn ProbabilityScorer>) -> RewardEngine {
    RewardEngine::new(engine_config(), feature_conditions(), scorer).expect("fixture engine")
}

pub(super) fn engine_with_probability(probability: f64) -> RewardEngine {
    engine_with_scorer(Arc::new(FixedScorer::new(probability)))
}

pub(super) fn streak_request() -> RewardRequest {
    RewardRequest {
        user_id: USER.to_string(),
        date: decision_date().to_string(),
        daily_metrics: streak_metrics(),
    }
}

pub(super) fn build_service<S>(store: Arc<S>, probability: f64) -> Arc<RewardService<S>>
where
    S: RewardStore + 'static,
{
    Arc::new(RewardService::new(
        Arc::new(engine_with_probability(probability)),
        store,
    ))
}

/// Scorer returning a constant and counting how often it ran.
pub(super) struct FixedScorer {
    probability: f64,
    calls: AtomicUsize,
}

impl FixedScorer {
    pub(super) fn new(probability: f64) -> Self {
        Self {
            probability,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProbabilityScorer for FixedScorer {
    fn score(&self, _features: &FeatureVector) -> Result<f64, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.probability)
    }
}

/// Scorer that keeps the last feature vector it was given.
#[derive(Default)]
pub(super) struct RecordingScorer {
    seen: Mutex<Option<FeatureVector>>,
}

impl RecordingScorer {
    pub(super) fn last(&self) -> Option<FeatureVector> {
        self.seen.lock().expect("scorer mutex poisoned").clone()
    }
}

impl ProbabilityScorer for RecordingScorer {
    fn score(&self, features: &FeatureVector) -> Result<f64, ScoringError> {
        *self.seen.lock().expect("scorer mutex poisoned") = Some(features.clone());
        Ok(1.0)
    }
}

pub(super) struct FailingScorer;

impl ProbabilityScorer for FailingScorer {
    fn score(&self, _features: &FeatureVector) -> Result<f64, ScoringError> {
        Err(ScoringError::Unavailable("model offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryStore {
    records: Mutex<HashMap<(NaiveDate, String), RewardRecord>>,
}

impl MemoryStore {
    pub(super) fn records(&self) -> Vec<RewardRecord> {
        let guard = self.records.lock().expect("store mutex poisoned");
        guard.values().cloned().collect()
    }
}

impl RewardStore for MemoryStore {
    async fn is_rewarded(&self, date: NaiveDate, user_id: &str) -> Result<bool, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.contains_key(&(date, user_id.to_string())))
    }

    async fn record(&self, record: RewardRecord) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let key = (record.date, record.user_id.clone());
        if guard.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        guard.insert(key, record);
        Ok(())
    }

    async fn rewarded_users(&self, date: NaiveDate) -> Result<Vec<String>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        let mut users: Vec<String> = guard
            .keys()
            .filter(|(day, _)| *day == date)
            .map(|(_, user)| user.clone())
            .collect();
        users.sort();
        Ok(users)
    }

    async fn prune_before(&self, cutoff: NaiveDate) -> Result<u64, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let before = guard.len();
        guard.retain(|(day, _), _| *day >= cutoff);
        Ok((before - guard.len()) as u64)
    }
}

/// Store whose dedup read misses but whose write loses the uniqueness race.
pub(super) struct ConflictStore;

impl RewardStore for ConflictStore {
    async fn is_rewarded(&self, _date: NaiveDate, _user_id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn record(&self, _record: RewardRecord) -> Result<(), StoreError> {
        Err(StoreError::Conflict)
    }

    async fn rewarded_users(&self, _date: NaiveDate) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }

    async fn prune_before(&self, _cutoff: NaiveDate) -> Result<u64, StoreError> {
        Ok(0)
    }
}

pub(super) struct UnavailableStore;

impl RewardStore for UnavailableStore {
    async fn is_rewarded(&self, _date: NaiveDate, _user_id: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn record(&self, _record: RewardRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn rewarded_users(&self, _date: NaiveDate) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn prune_before(&self, _cutoff: NaiveDate) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
