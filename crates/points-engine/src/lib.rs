//! 积分与等级引擎
//!
//! 规则驱动的积分结算核心：
//! - 按动作类型查规则，支持一次性与每日限额两类重复约束
//! - 并发安全的名额计数与账户入账，限额是任何交错下的硬性上界
//! - 终身累计积分到等级阶梯的映射，跨过门槛时发出升级事件
//!
//! 发放入口为 [`AwardEngine::award`]，其余组件均可独立使用。

pub mod account;
pub mod counter;
pub mod engine;
pub mod ladder;
pub mod models;
pub mod registry;
pub mod seed;

pub use account::{AccountStore, CreditOutcome, MemoryAccountStore};
pub use counter::{CounterStore, MemoryCounterStore};
pub use engine::{AwardEngine, AwardEngineBuilder};
pub use ladder::{LevelChange, TierLadder};
pub use models::{
    ActionRule, AwardRecord, AwardResult, DayKey, DenyReason, LevelTier, UserPointsAccount,
};
pub use registry::{RegistryStatus, RuleRegistry};

pub use points_shared::error::PointsError;
pub use points_shared::events::{LevelTransition, LoggingNotifier, TransitionNotifier};
