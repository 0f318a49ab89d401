use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{DailyMetrics, RewardDecision};
use super::engine::{EngineError, RewardEngine};
use super::store::{retention_cutoff, RewardRecord, RewardStore, StoreError};
use super::validation::{parse_date, validate_decision_date, validate_user_id, ValidationError};

/// Inbound decision request as received over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRequest {
    pub user_id: String,
    pub date: String,
    #[serde(default)]
    pub daily_metrics: DailyMetrics,
}

/// Service composing request validation, the dedup store, and the engine.
pub struct RewardService<S> {
    engine: Arc<RewardEngine>,
    store: Arc<S>,
}

impl<S> RewardService<S>
where
    S: RewardStore + 'static,
{
    pub fn new(engine: Arc<RewardEngine>, store: Arc<S>) -> Self {
        Self { engine, store }
    }

    pub fn engine(&self) -> &RewardEngine {
        &self.engine
    }

    /// Validate, consult the dedup guard, decide, and persist a grant.
    ///
    /// Validation runs before any engine step. If a concurrent request wins
    /// the store's uniqueness check, the grant is reported as already
    /// rewarded instead.
    pub async fn check(
        &self,
        request: &RewardRequest,
        today: NaiveDate,
    ) -> Result<RewardDecision, RewardServiceError> {
        let date = validate_decision_date(&request.date, today)?;
        let user_id = validate_user_id(&request.user_id)?;

        let already_rewarded = self.store.is_rewarded(date, user_id).await?;
        let decision = self
            .engine
            .evaluate(user_id, date, &request.daily_metrics, already_rewarded)?;

        let Some(record) = RewardRecord::from_decision(&decision) else {
            return Ok(decision);
        };

        match self.store.record(record).await {
            Ok(()) => Ok(decision),
            Err(StoreError::Conflict) => {
                warn!(user_id, %date, "concurrent grant detected; reporting already rewarded");
                Ok(RewardDecision::already_rewarded(user_id, date))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Users already rewarded on `raw_date`.
    pub async fn rewarded_users(&self, raw_date: &str) -> Result<Vec<String>, RewardServiceError> {
        let date = parse_date(raw_date)?;
        Ok(self.store.rewarded_users(date).await?)
    }

    /// Drop grants older than the retention window ending at `today`.
    pub async fn prune_expired(
        &self,
        today: NaiveDate,
        retention_days: u32,
    ) -> Result<u64, RewardServiceError> {
        let cutoff = retention_cutoff(today, retention_days);
        let removed = self.store.prune_before(cutoff).await?;
        info!(%cutoff, removed, "pruned expired reward grants");
        Ok(removed)
    }
}

/// Error raised by the reward service.
#[derive(Debug, thiserror::Error)]
pub enum RewardServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
