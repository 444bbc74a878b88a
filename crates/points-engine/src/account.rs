//! 积分账户与发放流水
//!
//! 账户的累计积分只增不减，缓存等级始终等于阶梯对当前总分的解析结果。
//! 入账、等级刷新与流水追加构成一个原子单元，同一用户的入账串行执行。

use async_trait::async_trait;
use dashmap::DashMap;
use points_shared::error::PointsError;

use crate::ladder::TierLadder;
use crate::models::{AwardRecord, UserPointsAccount};

/// 一次入账的结果
#[derive(Debug, Clone)]
pub struct CreditOutcome {
    pub previous_total: i64,
    pub new_total: i64,
    pub previous_level: u32,
    pub new_level: u32,
}

/// 账户存储抽象
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// 入账：累加积分、刷新缓存等级并追加流水，三者为同一原子单元
    ///
    /// 首次发放时自动建户。本引擎没有扣减路径。
    async fn credit(
        &self,
        record: AwardRecord,
        ladder: &TierLadder,
    ) -> Result<CreditOutcome, PointsError>;

    /// 查询账户快照
    async fn account(&self, user_id: &str) -> Result<Option<UserPointsAccount>, PointsError>;

    /// 查询累计积分，未建户按 0 计
    async fn total_points(&self, user_id: &str) -> Result<i64, PointsError>;

    /// 查询用户的全部发放流水（按入账顺序）
    async fn ledger(&self, user_id: &str) -> Result<Vec<AwardRecord>, PointsError>;
}

/// 基于 DashMap 的内存账户存储
pub struct MemoryAccountStore {
    accounts: DashMap<String, UserPointsAccount>,
    ledgers: DashMap<String, Vec<AwardRecord>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            ledgers: DashMap::new(),
        }
    }
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn credit(
        &self,
        record: AwardRecord,
        ladder: &TierLadder,
    ) -> Result<CreditOutcome, PointsError> {
        // 账户 entry 在整个读-改-写期间持有分片写锁，同一用户的入账串行化
        let mut account = self
            .accounts
            .entry(record.user_id.clone())
            .or_insert_with(|| UserPointsAccount {
                user_id: record.user_id.clone(),
                total_points: 0,
                current_level: ladder.level_for(0).level,
                updated_at: record.awarded_at,
            });

        let previous_total = account.total_points;
        let previous_level = account.current_level;
        let new_total = previous_total + record.points_awarded;
        let new_level = ladder.level_for(new_total).level;

        account.total_points = new_total;
        account.current_level = new_level;
        account.updated_at = record.awarded_at;

        // 流水在账户锁内追加，与总分更新一并可见
        self.ledgers
            .entry(record.user_id.clone())
            .or_default()
            .push(record);

        drop(account);

        Ok(CreditOutcome {
            previous_total,
            new_total,
            previous_level,
            new_level,
        })
    }

    async fn account(&self, user_id: &str) -> Result<Option<UserPointsAccount>, PointsError> {
        Ok(self.accounts.get(user_id).map(|account| account.clone()))
    }

    async fn total_points(&self, user_id: &str) -> Result<i64, PointsError> {
        Ok(self
            .accounts
            .get(user_id)
            .map(|account| account.total_points)
            .unwrap_or(0))
    }

    async fn ledger(&self, user_id: &str) -> Result<Vec<AwardRecord>, PointsError> {
        Ok(self
            .ledgers
            .get(user_id)
            .map(|records| records.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::Value;

    use super::*;
    use crate::models::LevelTier;

    fn sample_ladder() -> TierLadder {
        TierLadder::new(vec![
            LevelTier::new(1, "Newcomer", 0),
            LevelTier::new(2, "Enthusiast", 200),
            LevelTier::new(3, "Contributor", 500),
        ])
        .unwrap()
    }

    fn record(user_id: &str, points: i64) -> AwardRecord {
        AwardRecord::new(user_id, "receive_like", points, Utc::now(), Value::Null)
    }

    #[tokio::test]
    async fn test_credit_creates_account_at_base_level() {
        let store = MemoryAccountStore::new();
        let ladder = sample_ladder();

        let outcome = store.credit(record("user-001", 10), &ladder).await.unwrap();
        assert_eq!(outcome.previous_total, 0);
        assert_eq!(outcome.new_total, 10);
        assert_eq!(outcome.previous_level, 1);
        assert_eq!(outcome.new_level, 1);

        let account = store.account("user-001").await.unwrap().unwrap();
        assert_eq!(account.total_points, 10);
        assert_eq!(account.current_level, 1);
    }

    #[tokio::test]
    async fn test_credit_accumulates_and_refreshes_level() {
        let store = MemoryAccountStore::new();
        let ladder = sample_ladder();

        store.credit(record("user-001", 150), &ladder).await.unwrap();
        let outcome = store.credit(record("user-001", 100), &ladder).await.unwrap();

        assert_eq!(outcome.previous_total, 150);
        assert_eq!(outcome.new_total, 250);
        assert_eq!(outcome.previous_level, 1);
        assert_eq!(outcome.new_level, 2);

        let account = store.account("user-001").await.unwrap().unwrap();
        assert_eq!(account.current_level, 2);
    }

    #[tokio::test]
    async fn test_ledger_keeps_append_order() {
        let store = MemoryAccountStore::new();
        let ladder = sample_ladder();

        store.credit(record("user-001", 1), &ladder).await.unwrap();
        store.credit(record("user-001", 2), &ladder).await.unwrap();
        store.credit(record("user-001", 3), &ladder).await.unwrap();

        let ledger = store.ledger("user-001").await.unwrap();
        let points: Vec<i64> = ledger.iter().map(|r| r.points_awarded).collect();
        assert_eq!(points, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unknown_user_defaults() {
        let store = MemoryAccountStore::new();

        assert!(store.account("ghost").await.unwrap().is_none());
        assert_eq!(store.total_points("ghost").await.unwrap(), 0);
        assert!(store.ledger("ghost").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_credits_lose_nothing() {
        let store = Arc::new(MemoryAccountStore::new());
        let ladder = Arc::new(sample_ladder());

        let mut handles = Vec::new();
        for _ in 0..100 {
            let store = store.clone();
            let ladder = ladder.clone();
            handles.push(tokio::spawn(async move {
                store.credit(record("user-001", 1), &ladder).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.total_points("user-001").await.unwrap(), 100);
        assert_eq!(store.ledger("user-001").await.unwrap().len(), 100);

        let account = store.account("user-001").await.unwrap().unwrap();
        assert_eq!(account.current_level, 1);
    }
}
