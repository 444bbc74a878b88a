//! 积分发放引擎
//!
//! 发放流程的编排中心：查规则、占名额、入账、判定等级跃迁、发出升级
//! 事件。资格判定的结果（入账或拒绝）是返回值的一部分，只有存储层的
//! 基础设施故障才会以错误形式上抛。

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use points_shared::config::AppConfig;
use points_shared::error::PointsError;
use points_shared::events::{LevelTransition, LoggingNotifier, TransitionNotifier};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::account::{AccountStore, MemoryAccountStore};
use crate::counter::{CounterStore, MemoryCounterStore};
use crate::ladder::TierLadder;
use crate::models::{ActionRule, AwardRecord, AwardResult, DayKey, DenyReason, LevelTier};
use crate::registry::RuleRegistry;
use crate::seed;

/// 本次发放占用的名额，入账失败时按原路归还
enum ConsumedSlot {
    None,
    OneTime,
    Daily(DayKey),
}

/// 积分发放引擎
///
/// 规则表与等级阶梯是只读快照，计数器与账户是唯一的可变共享状态，
/// 全部通过 store 抽象访问。引擎自身无状态，可被任意多任务并发调用。
pub struct AwardEngine {
    registry: RuleRegistry,
    ladder: ArcSwap<TierLadder>,
    counters: Arc<dyn CounterStore>,
    accounts: Arc<dyn AccountStore>,
    notifier: Arc<dyn TransitionNotifier>,
}

impl AwardEngine {
    /// 以内置种子与内存存储构建引擎
    pub fn with_defaults() -> Result<Self, PointsError> {
        AwardEngineBuilder::new().build()
    }

    /// 按应用配置构建引擎
    ///
    /// 配置了种子文件路径时从文件装载规则与阶梯，否则使用内置种子。
    pub fn from_config(config: &AppConfig) -> Result<Self, PointsError> {
        let mut builder = AwardEngineBuilder::new();
        if let Some(path) = &config.engine.rules_path {
            builder = builder.rules(seed::rules_from_file(path)?);
        }
        if let Some(path) = &config.engine.tiers_path {
            builder = builder.tiers(seed::tiers_from_file(path)?);
        }
        builder.build()
    }

    pub fn builder() -> AwardEngineBuilder {
        AwardEngineBuilder::new()
    }

    /// 发放入口：对用户的一次动作事件进行积分结算
    pub async fn award(
        &self,
        user_id: &str,
        action_type: &str,
        metadata: Value,
    ) -> Result<AwardResult, PointsError> {
        self.award_at(user_id, action_type, metadata, Utc::now())
            .await
    }

    /// 指定结算时间点的发放（测试与补发场景）
    pub async fn award_at(
        &self,
        user_id: &str,
        action_type: &str,
        metadata: Value,
        now: DateTime<Utc>,
    ) -> Result<AwardResult, PointsError> {
        let start = Instant::now();

        // 规则与阶梯各取一次快照，整个发放过程使用同一份配置，
        // 期间发生的 reload 只影响后续调用
        let Some(rule) = self.registry.lookup(action_type) else {
            let result = AwardResult::Denied {
                reason: DenyReason::RuleInactiveOrUnknown,
            };
            self.log_award(user_id, action_type, &result, start.elapsed().as_millis() as u64);
            return Ok(result);
        };
        let ladder = self.ladder.load_full();

        // 一次性语义优先于每日限额，二者同时配置时只做一次性判定
        let consumed = if rule.is_one_time {
            if !self
                .counters
                .try_consume_one_time(user_id, action_type)
                .await?
            {
                let result = AwardResult::Denied {
                    reason: DenyReason::AlreadyAwardedOneTime,
                };
                self.log_award(user_id, action_type, &result, start.elapsed().as_millis() as u64);
                return Ok(result);
            }
            ConsumedSlot::OneTime
        } else if rule.daily_limit > 0 {
            let day = DayKey::from_utc(now);
            if !self
                .counters
                .try_consume_daily_slot(user_id, action_type, &day, rule.daily_limit)
                .await?
            {
                let result = AwardResult::Denied {
                    reason: DenyReason::DailyLimitReached {
                        limit: rule.daily_limit,
                    },
                };
                self.log_award(user_id, action_type, &result, start.elapsed().as_millis() as u64);
                return Ok(result);
            }
            ConsumedSlot::Daily(day)
        } else {
            ConsumedSlot::None
        };

        let record = AwardRecord::new(user_id, action_type, rule.points, now, metadata);
        let outcome = match self.accounts.credit(record, &ladder).await {
            Ok(outcome) => outcome,
            Err(err) => {
                // 入账失败必须归还已占用的名额，否则用户会平白损失一次机会
                self.rollback(user_id, action_type, consumed).await;
                return Err(err);
            }
        };

        let change = ladder.resolve(outcome.previous_total, outcome.new_total);
        if change.crossed {
            self.emit_transition(user_id, change.from_level, change.tier, outcome.new_total, now)
                .await;
        }

        let result = AwardResult::Credited {
            points: rule.points,
            total_points: outcome.new_total,
            level: outcome.new_level,
            leveled_up: change.crossed,
        };
        self.log_award(user_id, action_type, &result, start.elapsed().as_millis() as u64);
        Ok(result)
    }

    /// 整表原子重载规则
    pub fn reload_rules(&self, rules: Vec<ActionRule>) -> Result<(), PointsError> {
        self.registry.reload(rules)
    }

    /// 原子替换等级阶梯
    pub fn swap_ladder(&self, ladder: TierLadder) {
        self.ladder.store(Arc::new(ladder));
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// 当前阶梯快照
    pub fn ladder(&self) -> Arc<TierLadder> {
        self.ladder.load_full()
    }

    pub fn accounts(&self) -> Arc<dyn AccountStore> {
        self.accounts.clone()
    }

    /// 发出升级事件；投递失败不回滚发放，只记录告警
    async fn emit_transition(
        &self,
        user_id: &str,
        from_level: u32,
        tier: &LevelTier,
        total_points: i64,
        occurred_at: DateTime<Utc>,
    ) {
        let transition = LevelTransition {
            transition_id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            previous_level: from_level,
            new_level: tier.level,
            tier_name: tier.name.clone(),
            description: tier.description.clone(),
            rewards: tier.rewards.clone(),
            total_points,
            occurred_at,
        };

        if let Err(err) = self.notifier.notify(&transition).await {
            warn!(
                user_id,
                new_level = tier.level,
                error = %err,
                "升级事件投递失败"
            );
        }
    }

    async fn rollback(&self, user_id: &str, action_type: &str, consumed: ConsumedSlot) {
        let rolled_back = match consumed {
            ConsumedSlot::None => Ok(()),
            ConsumedSlot::OneTime => self.counters.rollback_one_time(user_id, action_type).await,
            ConsumedSlot::Daily(day) => {
                self.counters
                    .rollback_daily_slot(user_id, action_type, &day)
                    .await
            }
        };

        if let Err(err) = rolled_back {
            warn!(user_id, action_type, error = %err, "名额回滚失败，计数可能多占一格");
        }
    }

    fn log_award(&self, user_id: &str, action_type: &str, result: &AwardResult, elapsed_ms: u64) {
        match result {
            AwardResult::Credited {
                points,
                total_points,
                level,
                leveled_up,
            } => {
                info!(
                    user_id,
                    action_type,
                    points,
                    total_points,
                    level,
                    leveled_up,
                    award_ms = elapsed_ms,
                    "积分发放成功"
                );
            }
            AwardResult::Denied { reason } => {
                info!(
                    user_id,
                    action_type,
                    deny_code = reason.deny_code(),
                    deny_message = %reason.message(),
                    award_ms = elapsed_ms,
                    "积分发放被拒绝"
                );
            }
        }
    }
}

/// 引擎构建器
///
/// 未显式指定的部件取默认值：内置种子规则与阶梯、内存存储、日志通知器。
pub struct AwardEngineBuilder {
    rules: Option<Vec<ActionRule>>,
    tiers: Option<Vec<LevelTier>>,
    counters: Option<Arc<dyn CounterStore>>,
    accounts: Option<Arc<dyn AccountStore>>,
    notifier: Option<Arc<dyn TransitionNotifier>>,
}

impl AwardEngineBuilder {
    pub fn new() -> Self {
        Self {
            rules: None,
            tiers: None,
            counters: None,
            accounts: None,
            notifier: None,
        }
    }

    pub fn rules(mut self, rules: Vec<ActionRule>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn tiers(mut self, tiers: Vec<LevelTier>) -> Self {
        self.tiers = Some(tiers);
        self
    }

    pub fn counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.counters = Some(store);
        self
    }

    pub fn account_store(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.accounts = Some(store);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn TransitionNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 构建引擎，规则或阶梯非法时立即失败
    pub fn build(self) -> Result<AwardEngine, PointsError> {
        let registry = RuleRegistry::load(self.rules.unwrap_or_else(seed::default_rules))?;
        let ladder = TierLadder::new(self.tiers.unwrap_or_else(seed::default_tiers))?;

        Ok(AwardEngine {
            registry,
            ladder: ArcSwap::from_pointee(ladder),
            counters: self
                .counters
                .unwrap_or_else(|| Arc::new(MemoryCounterStore::new())),
            accounts: self
                .accounts
                .unwrap_or_else(|| Arc::new(MemoryAccountStore::new())),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LoggingNotifier)),
        })
    }
}

impl Default for AwardEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
