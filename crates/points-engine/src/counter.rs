//! 计数器存储
//!
//! 负责一次性动作与每日限额的原子判定。两类操作在同 key 并发调用下
//! 必须保持检查与递增的原子性：daily_limit 是硬性上界，任何交错序列
//! 都不允许超发。锁粒度以 key 为界，不同用户的发放互不阻塞。

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use points_shared::error::PointsError;
use tracing::debug;

use crate::models::DayKey;

/// 计数器存储抽象
///
/// 内存实现见 [`MemoryCounterStore`]。外部存储实现需要以唯一约束、
/// CAS 或行级锁等价物提供同样的原子语义，不得退化为先读后写。
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// 原子地记录一次性动作的发放
    ///
    /// 对同一 (user_id, action_type)，包括并发调用在内的所有调用中
    /// 恰好一个返回 true，其余一律返回 false。
    async fn try_consume_one_time(
        &self,
        user_id: &str,
        action_type: &str,
    ) -> Result<bool, PointsError>;

    /// 原子地占用一个当日发放名额
    ///
    /// 仅当占用前计数 < limit 时递增并返回 true；已达上限时计数保持
    /// 不变并返回 false。
    async fn try_consume_daily_slot(
        &self,
        user_id: &str,
        action_type: &str,
        day: &DayKey,
        limit: u32,
    ) -> Result<bool, PointsError>;

    /// 归还一次性动作的占用（发放单元后续步骤失败时的补偿）
    async fn rollback_one_time(&self, user_id: &str, action_type: &str)
    -> Result<(), PointsError>;

    /// 归还一个当日名额
    async fn rollback_daily_slot(
        &self,
        user_id: &str,
        action_type: &str,
        day: &DayKey,
    ) -> Result<(), PointsError>;
}

/// 基于 DashMap 的内存计数器
///
/// entry 持有分片写锁，检查与递增在同一临界区内完成。日计数器按
/// (user_id, action_type, day) 三元组独立存在，跨日后旧计数器不再被
/// 访问，可由 [`MemoryCounterStore::prune_stale_days`] 周期性清理。
#[derive(Default)]
pub struct MemoryCounterStore {
    /// (user_id, action_type) -> 已发放标记
    one_time: DashMap<(String, String), ()>,
    /// (user_id, action_type, day) -> 当日已发放次数
    daily: DashMap<(String, String, DayKey), u32>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清理指定日期之前的过期日计数器，返回清理条数
    pub fn prune_stale_days(&self, before: &DayKey) -> usize {
        let before_count = self.daily.len();
        self.daily.retain(|(_, _, day), _| day >= before);
        before_count - self.daily.len()
    }

    /// 查询当日已发放次数
    pub fn daily_count(&self, user_id: &str, action_type: &str, day: &DayKey) -> u32 {
        self.daily
            .get(&(user_id.to_string(), action_type.to_string(), day.clone()))
            .map(|count| *count)
            .unwrap_or(0)
    }

    /// 查询一次性动作是否已发放
    pub fn has_one_time(&self, user_id: &str, action_type: &str) -> bool {
        self.one_time
            .contains_key(&(user_id.to_string(), action_type.to_string()))
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn try_consume_one_time(
        &self,
        user_id: &str,
        action_type: &str,
    ) -> Result<bool, PointsError> {
        // insert 对单 key 原子：返回 None 的调用是唯一的首个成功者
        let first = self
            .one_time
            .insert((user_id.to_string(), action_type.to_string()), ())
            .is_none();

        if !first {
            debug!(user_id, action_type, "一次性动作已发放过");
        }
        Ok(first)
    }

    async fn try_consume_daily_slot(
        &self,
        user_id: &str,
        action_type: &str,
        day: &DayKey,
        limit: u32,
    ) -> Result<bool, PointsError> {
        let key = (user_id.to_string(), action_type.to_string(), day.clone());

        let consumed = match self.daily.entry(key) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() < limit {
                    *occupied.get_mut() += 1;
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                if limit > 0 {
                    vacant.insert(1);
                    true
                } else {
                    false
                }
            }
        };

        if !consumed {
            debug!(user_id, action_type, day = %day, limit, "当日名额已用尽");
        }
        Ok(consumed)
    }

    async fn rollback_one_time(
        &self,
        user_id: &str,
        action_type: &str,
    ) -> Result<(), PointsError> {
        self.one_time
            .remove(&(user_id.to_string(), action_type.to_string()));
        Ok(())
    }

    async fn rollback_daily_slot(
        &self,
        user_id: &str,
        action_type: &str,
        day: &DayKey,
    ) -> Result<(), PointsError> {
        let key = (user_id.to_string(), action_type.to_string(), day.clone());

        if let Entry::Occupied(mut occupied) = self.daily.entry(key) {
            let count = occupied.get_mut();
            *count = count.saturating_sub(1);
            if *count == 0 {
                occupied.remove();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Utc};

    use super::*;

    fn day(rfc3339: &str) -> DayKey {
        DayKey::from_utc(
            DateTime::parse_from_rfc3339(rfc3339)
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    #[tokio::test]
    async fn test_one_time_first_wins() {
        let store = MemoryCounterStore::new();

        assert!(store.try_consume_one_time("user-001", "register").await.unwrap());
        assert!(!store.try_consume_one_time("user-001", "register").await.unwrap());
        assert!(store.has_one_time("user-001", "register"));

        // 其他用户与其他动作互不影响
        assert!(store.try_consume_one_time("user-002", "register").await.unwrap());
        assert!(store.try_consume_one_time("user-001", "verify_email").await.unwrap());
    }

    #[tokio::test]
    async fn test_daily_slot_respects_limit() {
        let store = MemoryCounterStore::new();
        let today = day("2025-01-15T08:00:00Z");

        assert!(
            store
                .try_consume_daily_slot("user-001", "daily_login", &today, 1)
                .await
                .unwrap()
        );
        assert!(
            !store
                .try_consume_daily_slot("user-001", "daily_login", &today, 1)
                .await
                .unwrap()
        );
        // 拒绝不改变计数
        assert_eq!(store.daily_count("user-001", "daily_login", &today), 1);
    }

    #[tokio::test]
    async fn test_daily_slot_next_day_is_fresh() {
        let store = MemoryCounterStore::new();
        let today = day("2025-01-15T23:59:59Z");
        let tomorrow = day("2025-01-16T00:00:01Z");

        assert!(
            store
                .try_consume_daily_slot("user-001", "daily_login", &today, 1)
                .await
                .unwrap()
        );
        assert!(
            store
                .try_consume_daily_slot("user-001", "daily_login", &tomorrow, 1)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_daily_slot_zero_limit_never_consumes() {
        let store = MemoryCounterStore::new();
        let today = day("2025-01-15T08:00:00Z");

        assert!(
            !store
                .try_consume_daily_slot("user-001", "daily_login", &today, 0)
                .await
                .unwrap()
        );
        assert_eq!(store.daily_count("user-001", "daily_login", &today), 0);
    }

    #[tokio::test]
    async fn test_rollback_one_time_restores_slot() {
        let store = MemoryCounterStore::new();

        assert!(store.try_consume_one_time("user-001", "register").await.unwrap());
        store.rollback_one_time("user-001", "register").await.unwrap();
        assert!(store.try_consume_one_time("user-001", "register").await.unwrap());
    }

    #[tokio::test]
    async fn test_rollback_daily_slot_restores_slot() {
        let store = MemoryCounterStore::new();
        let today = day("2025-01-15T08:00:00Z");

        assert!(
            store
                .try_consume_daily_slot("user-001", "daily_login", &today, 1)
                .await
                .unwrap()
        );
        store
            .rollback_daily_slot("user-001", "daily_login", &today)
            .await
            .unwrap();
        assert_eq!(store.daily_count("user-001", "daily_login", &today), 0);
        assert!(
            store
                .try_consume_daily_slot("user-001", "daily_login", &today, 1)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_rollback_without_consumption_is_noop() {
        let store = MemoryCounterStore::new();
        let today = day("2025-01-15T08:00:00Z");

        store.rollback_one_time("user-001", "register").await.unwrap();
        store
            .rollback_daily_slot("user-001", "daily_login", &today)
            .await
            .unwrap();
        assert_eq!(store.daily_count("user-001", "daily_login", &today), 0);
    }

    #[tokio::test]
    async fn test_prune_stale_days() {
        let store = MemoryCounterStore::new();
        let old_day = day("2025-01-10T08:00:00Z");
        let today = day("2025-01-15T08:00:00Z");

        store
            .try_consume_daily_slot("user-001", "daily_login", &old_day, 1)
            .await
            .unwrap();
        store
            .try_consume_daily_slot("user-001", "daily_login", &today, 1)
            .await
            .unwrap();

        let pruned = store.prune_stale_days(&today);
        assert_eq!(pruned, 1);
        assert_eq!(store.daily_count("user-001", "daily_login", &today), 1);
        assert_eq!(store.daily_count("user-001", "daily_login", &old_day), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_one_time_exactly_one_winner() {
        let store = Arc::new(MemoryCounterStore::new());

        let mut handles = Vec::new();
        for _ in 0..64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.try_consume_one_time("user-001", "register").await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_daily_slots_never_overshoot() {
        let store = Arc::new(MemoryCounterStore::new());
        let today = day("2025-01-15T08:00:00Z");
        let limit = 5u32;

        let mut handles = Vec::new();
        for _ in 0..64 {
            let store = store.clone();
            let today = today.clone();
            handles.push(tokio::spawn(async move {
                store
                    .try_consume_daily_slot("user-001", "receive_like", &today, limit)
                    .await
                    .unwrap()
            }));
        }

        let mut consumed = 0u32;
        for handle in handles {
            if handle.await.unwrap() {
                consumed += 1;
            }
        }
        assert_eq!(consumed, limit);
        assert_eq!(store.daily_count("user-001", "receive_like", &today), limit);
    }
}
