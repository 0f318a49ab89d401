use chrono::NaiveDate;
use karma_rewards::config::{RewardStoreConfig, StoreBackend};
use karma_rewards::rewards::{
    RewardRecord, RewardStore, ScorerModel, SqliteRewardStore, StoreError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) model: Arc<ModelInfo>,
}

/// Scorer metadata reported by `/version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModelInfo {
    pub(crate) version: String,
    pub(crate) last_updated: Option<String>,
}

impl From<&ScorerModel> for ModelInfo {
    fn from(model: &ScorerModel) -> Self {
        Self {
            version: model.version.clone(),
            last_updated: model.last_updated.clone(),
        }
    }
}

/// Process-local grant ledger keyed by `(date, user_id)`. Grants are lost on
/// restart.
#[derive(Default, Clone)]
pub(crate) struct InMemoryRewardStore {
    records: Arc<Mutex<BTreeMap<(NaiveDate, String), RewardRecord>>>,
}

impl InMemoryRewardStore {
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<(NaiveDate, String), RewardRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("reward store mutex poisoned".to_string()))
    }
}

impl RewardStore for InMemoryRewardStore {
    async fn is_rewarded(&self, date: NaiveDate, user_id: &str) -> Result<bool, StoreError> {
        let guard = self.lock()?;
        Ok(guard.contains_key(&(date, user_id.to_string())))
    }

    async fn record(&self, record: RewardRecord) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let key = (record.date, record.user_id.clone());
        if guard.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        guard.insert(key, record);
        Ok(())
    }

    async fn rewarded_users(&self, date: NaiveDate) -> Result<Vec<String>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .keys()
            .filter(|(day, _)| *day == date)
            .map(|(_, user_id)| user_id.clone())
            .collect())
    }

    async fn prune_before(&self, cutoff: NaiveDate) -> Result<u64, StoreError> {
        let mut guard = self.lock()?;
        let before = guard.len();
        guard.retain(|(day, _), _| *day >= cutoff);
        Ok((before - guard.len()) as u64)
    }
}

/// Grant ledger chosen by `REWARD_STORE_URL`.
#[derive(Clone)]
pub(crate) enum ConfiguredStore {
    Memory(InMemoryRewardStore),
    Sqlite(SqliteRewardStore),
}

impl ConfiguredStore {
    pub(crate) async fn open(config: &RewardStoreConfig) -> Result<Self, StoreError> {
        match &config.backend {
            StoreBackend::Memory => {
                warn!("using in-memory reward store; grants are lost on restart");
                Ok(Self::Memory(InMemoryRewardStore::default()))
            }
            StoreBackend::Sqlite(url) => Ok(Self::Sqlite(SqliteRewardStore::connect(url).await?)),
        }
    }
}

impl RewardStore for ConfiguredStore {
    async fn is_rewarded(&self, date: NaiveDate, user_id: &str) -> Result<bool, StoreError> {
        match self {
            Self::Memory(store) => store.is_rewarded(date, user_id).await,
            Self::Sqlite(store) => store.is_rewarded(date, user_id).await,
        }
    }

    async fn record(&self, record: RewardRecord) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.record(record).await,
            Self::Sqlite(store) => store.record(record).await,
        }
    }

    async fn rewarded_users(&self, date: NaiveDate) -> Result<Vec<String>, StoreError> {
        match self {
            Self::Memory(store) => store.rewarded_users(date).await,
            Self::Sqlite(store) => store.rewarded_users(date).await,
        }
    }

    async fn prune_before(&self, cutoff: NaiveDate) -> Result<u64, StoreError> {
        match self {
            Self::Memory(store) => store.prune_before(cutoff).await,
            Self::Sqlite(store) => store.prune_before(cutoff).await,
        }
    }
}
