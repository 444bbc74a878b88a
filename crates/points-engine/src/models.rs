//! 积分引擎领域模型

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// ActionRule — 动作规则
// ---------------------------------------------------------------------------

/// 积分动作规则
///
/// 定义某一动作类型值多少积分，以及重复发放的约束。注册表加载完成后
/// 规则只读，调整必须通过整表重载，不允许对并发读取方可见的原地修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRule {
    /// 动作类型，注册表内唯一
    pub action_type: String,
    /// 单次发放的积分数
    pub points: i64,
    /// 是否启用，停用的规则对调用方等同于不存在
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// 一次性动作：每个用户终身最多发放一次
    #[serde(default)]
    pub is_one_time: bool,
    /// 每日发放上限，0 表示不限次数（仅受 is_one_time 约束）
    #[serde(default)]
    pub daily_limit: u32,
    /// 分类标签，仅作元数据
    #[serde(default)]
    pub category: String,
}

impl ActionRule {
    pub fn new(action_type: impl Into<String>, points: i64) -> Self {
        Self {
            action_type: action_type.into(),
            points,
            is_active: true,
            is_one_time: false,
            daily_limit: 0,
            category: String::new(),
        }
    }

    pub fn one_time(mut self) -> Self {
        self.is_one_time = true;
        self
    }

    pub fn with_daily_limit(mut self, limit: u32) -> Self {
        self.daily_limit = limit;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

// ---------------------------------------------------------------------------
// LevelTier — 等级定义
// ---------------------------------------------------------------------------

/// 等级定义
///
/// 阶梯内 level 与 points_required 都严格递增，最低等级的门槛为 0，
/// 保证任意非负累计积分都恰好归属一个等级。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelTier {
    pub level: u32,
    pub name: String,
    /// 达到该等级所需的终身累计积分
    pub points_required: i64,
    #[serde(default)]
    pub description: String,
    /// 等级奖励内容，引擎不解释其结构
    #[serde(default)]
    pub rewards: Value,
}

impl LevelTier {
    pub fn new(level: u32, name: impl Into<String>, points_required: i64) -> Self {
        Self {
            level,
            name: name.into(),
            points_required,
            description: String::new(),
            rewards: Value::Null,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_rewards(mut self, rewards: Value) -> Self {
        self.rewards = rewards;
        self
    }
}

// ---------------------------------------------------------------------------
// UserPointsAccount / AwardRecord — 账户与流水
// ---------------------------------------------------------------------------

/// 用户积分账户
///
/// total_points 只增不减，current_level 是按阶梯解析结果缓存的派生值。
#[derive(Debug, Clone, Serialize)]
pub struct UserPointsAccount {
    pub user_id: String,
    pub total_points: i64,
    pub current_level: u32,
    pub updated_at: DateTime<Utc>,
}

/// 发放流水
///
/// 每次成功发放追加一条，创建后不再修改。
#[derive(Debug, Clone, Serialize)]
pub struct AwardRecord {
    /// 流水唯一标识（UUID v7），时间有序便于索引
    pub record_id: String,
    pub user_id: String,
    pub action_type: String,
    pub points_awarded: i64,
    pub awarded_at: DateTime<Utc>,
    /// 触发动作携带的业务上下文，引擎不解释其结构
    pub metadata: Value,
}

impl AwardRecord {
    pub fn new(
        user_id: impl Into<String>,
        action_type: impl Into<String>,
        points_awarded: i64,
        awarded_at: DateTime<Utc>,
        metadata: Value,
    ) -> Self {
        Self {
            record_id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            action_type: action_type.into(),
            points_awarded,
            awarded_at,
            metadata,
        }
    }
}

// ---------------------------------------------------------------------------
// AwardResult / DenyReason — 发放结果
// ---------------------------------------------------------------------------

/// 发放结果
///
/// 资格不满足是正常业务结果而非错误，调用方必须显式处理 Denied 分支，
/// 不能把它当作故障静默吞掉。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AwardResult {
    /// 动作符合条件，积分已入账
    Credited {
        points: i64,
        total_points: i64,
        level: u32,
        leveled_up: bool,
    },
    /// 动作不符合条件，未发生任何状态变更
    Denied { reason: DenyReason },
}

impl AwardResult {
    pub fn is_credited(&self) -> bool {
        matches!(self, AwardResult::Credited { .. })
    }

    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            AwardResult::Credited { .. } => None,
            AwardResult::Denied { reason } => Some(reason),
        }
    }
}

/// 拒绝原因
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DenyReason {
    /// 规则不存在或已停用，两种情况对调用方不作区分
    RuleInactiveOrUnknown,
    /// 一次性动作已经发放过
    AlreadyAwardedOneTime,
    /// 已达到当日发放上限
    DailyLimitReached { limit: u32 },
}

impl DenyReason {
    /// 返回拒绝原因的错误码，用于日志与上层响应
    pub fn deny_code(&self) -> &'static str {
        match self {
            DenyReason::RuleInactiveOrUnknown => "RULE_INACTIVE_OR_UNKNOWN",
            DenyReason::AlreadyAwardedOneTime => "ALREADY_AWARDED_ONE_TIME",
            DenyReason::DailyLimitReached { .. } => "DAILY_LIMIT_REACHED",
        }
    }

    /// 返回人类可读的描述信息
    pub fn message(&self) -> String {
        match self {
            DenyReason::RuleInactiveOrUnknown => {
                "Rule is unknown or inactive for this action".to_string()
            }
            DenyReason::AlreadyAwardedOneTime => {
                "One-time action has already been credited".to_string()
            }
            DenyReason::DailyLimitReached { limit } => {
                format!("Daily limit of {} awards reached", limit)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DayKey — UTC 日历日键
// ---------------------------------------------------------------------------

/// UTC 日历日键
///
/// 每日计数器按 (user_id, action_type, DayKey) 维度独立计数，日界以
/// 固定的 UTC 时区为准。跨日后旧计数器自然过期，无需显式重置任务。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DayKey(String);

impl DayKey {
    /// 取时间点所在的 UTC 日历日
    pub fn from_utc(at: DateTime<Utc>) -> Self {
        Self(at.format("%Y%m%d").to_string())
    }

    /// 当前 UTC 日历日
    pub fn today() -> Self {
        Self::from_utc(Utc::now())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------
