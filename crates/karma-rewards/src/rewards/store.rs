use std::future::Future;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::{RarityTier, RewardDecision};

/// One granted reward. `(date, user_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRecord {
    pub date: NaiveDate,
    pub user_id: String,
    pub box_type: String,
    pub rarity: RarityTier,
    pub karma: u32,
}

impl RewardRecord {
    /// Record for a granted decision; `None` when nothing was granted.
    pub fn from_decision(decision: &RewardDecision) -> Option<Self> {
        if !decision.granted {
            return None;
        }
        Some(Self {
            date: decision.date,
            user_id: decision.user_id.clone(),
            box_type: decision.box_type.clone()?,
            rarity: decision.rarity?,
            karma: decision.karma,
        })
    }
}

/// Storage abstraction for the per-day dedup guard. The store's uniqueness
/// on `(date, user_id)` is what prevents double grants under concurrency.
pub trait RewardStore: Send + Sync {
    fn is_rewarded(
        &self,
        date: NaiveDate,
        user_id: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Persist a grant, failing with [`StoreError::Conflict`] on a duplicate.
    fn record(&self, record: RewardRecord) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// User ids rewarded on `date`, sorted.
    fn rewarded_users(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Drop every grant dated strictly before `cutoff`, returning how many went.
    fn prune_before(&self, cutoff: NaiveDate)
        -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// First date still kept when `retention_days` of history are retained.
pub fn retention_cutoff(today: NaiveDate, retention_days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(retention_days)))
        .unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("reward already recorded for this user and date")]
    Conflict,
    #[error("reward store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_cutoff_keeps_the_window() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 30).expect("valid date");
        assert_eq!(
            retention_cutoff(today, 30),
            NaiveDate::from_ymd_opt(2025, 5, 31).expect("valid date")
        );
        assert_eq!(retention_cutoff(today, 0), today);
        assert_eq!(retention_cutoff(NaiveDate::MIN, 1), NaiveDate::MIN);
    }
}
