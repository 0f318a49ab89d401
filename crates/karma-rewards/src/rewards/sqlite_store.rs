use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::store::{RewardRecord, RewardStore, StoreError};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS rewarded_users (
    date TEXT NOT NULL,
    user_id TEXT NOT NULL,
    box_type TEXT NOT NULL,
    rarity TEXT NOT NULL,
    karma INTEGER NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (date, user_id)
)";

/// Durable grant ledger in a SQLite file. Dates are stored as ISO text so
/// range comparisons stay lexical.
#[derive(Clone)]
pub struct SqliteRewardStore {
    pool: SqlitePool,
}

impl SqliteRewardStore {
    /// Open a store from a `sqlite://` URL, creating the database if missing.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url).map_err(unavailable)?;
        Self::open_with(options).await
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(SqliteConnectOptions::new().filename(path)).await
    }

    async fn open_with(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options.create_if_missing(true))
            .await
            .map_err(unavailable)?;
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(unavailable)?;
        info!("sqlite reward store ready");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl RewardStore for SqliteRewardStore {
    async fn is_rewarded(&self, date: NaiveDate, user_id: &str) -> Result<bool, StoreError> {
        let found = sqlx::query("SELECT 1 FROM rewarded_users WHERE date = ?1 AND user_id = ?2")
            .bind(date.to_string())
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(found.is_some())
    }

    async fn record(&self, record: RewardRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO rewarded_users (date, user_id, box_type, rarity, karma) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(record.date.to_string())
        .bind(&record.user_id)
        .bind(&record.box_type)
        .bind(record.rarity.label())
        .bind(i64::from(record.karma))
        .execute(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
            other => unavailable(other),
        })?;
        Ok(())
    }

    async fn rewarded_users(&self, date: NaiveDate) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM rewarded_users WHERE date = ?1 ORDER BY user_id",
        )
        .bind(date.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)
    }

    async fn prune_before(&self, cutoff: NaiveDate) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM rewarded_users WHERE date < ?1")
            .bind(cutoff.to_string())
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected())
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewards::domain::RarityTier;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_db(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "karma-rewards-{name}-{}-{nanos}.db",
            std::process::id()
        ))
    }

    fn remove_db(path: &Path) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.as_os_str().to_owned();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }

    fn day(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).expect("valid date")
    }

    fn record(user_id: &str, date: NaiveDate) -> RewardRecord {
        RewardRecord {
            date,
            user_id: user_id.to_string(),
            box_type: "streak_engager".to_string(),
            rarity: RarityTier::Elite,
            karma: 37,
        }
    }

    #[tokio::test]
    async fn duplicate_grant_for_same_day_conflicts() {
        let path = scratch_db("conflict");
        let store = SqliteRewardStore::open(&path).await.expect("store opens");

        store.record(record("user_1", day(11))).await.expect("first grant");
        let err = store
            .record(record("user_1", day(11)))
            .await
            .expect_err("duplicate rejected");
        assert!(matches!(err, StoreError::Conflict));
        store
            .record(record("user_1", day(12)))
            .await
            .expect("next day is fine");

        assert!(store.is_rewarded(day(11), "user_1").await.expect("lookup"));
        assert!(!store.is_rewarded(day(11), "user_2").await.expect("lookup"));

        store.close().await;
        remove_db(&path);
    }

    #[tokio::test]
    async fn grants_survive_reopening_the_database() {
        let path = scratch_db("reopen");
        let url = format!("sqlite://{}", path.display());

        let store = SqliteRewardStore::connect(&url).await.expect("store opens");
        store.record(record("user_b", day(11))).await.expect("grant");
        store.record(record("user_a", day(11))).await.expect("grant");
        store.close().await;
        drop(store);

        let reopened = SqliteRewardStore::connect(&url).await.expect("store reopens");
        assert_eq!(
            reopened.rewarded_users(day(11)).await.expect("listing"),
            vec!["user_a".to_string(), "user_b".to_string()]
        );
        assert!(matches!(
            reopened.record(record("user_a", day(11))).await,
            Err(StoreError::Conflict)
        ));

        reopened.close().await;
        remove_db(&path);
    }

    #[tokio::test]
    async fn prune_drops_only_grants_before_the_cutoff() {
        let path = scratch_db("prune");
        let store = SqliteRewardStore::open(&path).await.expect("store opens");
        for (user, date) in [("user_old", day(1)), ("user_edge", day(10)), ("user_new", day(11))] {
            store.record(record(user, date)).await.expect("grant");
        }

        let removed = store.prune_before(day(10)).await.expect("prune");

        assert_eq!(removed, 1);
        assert!(store.rewarded_users(day(1)).await.expect("listing").is_empty());
        assert_eq!(
            store.rewarded_users(day(10)).await.expect("listing"),
            vec!["user_edge".to_string()]
        );
        assert_eq!(store.prune_before(day(10)).await.expect("prune"), 0);

        store.close().await;
        remove_db(&path);
    }
}
