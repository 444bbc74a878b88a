//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。
//! 资格校验未通过（规则未知或停用、一次性动作已发放、达到每日上限）属于
//! 正常业务结果，由 `AwardResult::Denied` 表达，不在此错误类型范围内。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum PointsError {
    // ==================== 存储错误 ====================
    #[error("计数器存储错误: {0}")]
    CounterStore(String),

    #[error("账户存储错误: {0}")]
    AccountStore(String),

    // ==================== 配置错误 ====================
    #[error("无效的积分规则: {reason}")]
    InvalidRule { reason: String },

    #[error("无效的等级阶梯: {reason}")]
    InvalidLadder { reason: String },

    #[error("种子数据解析失败: {0}")]
    SeedParse(#[from] serde_json::Error),

    #[error("种子文件读取失败: {path}")]
    SeedIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    // ==================== 通知错误 ====================
    #[error("等级事件投递失败: {0}")]
    NotifyFailed(String),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, PointsError>;

impl PointsError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::CounterStore(_) => "COUNTER_STORE_ERROR",
            Self::AccountStore(_) => "ACCOUNT_STORE_ERROR",
            Self::InvalidRule { .. } => "INVALID_RULE",
            Self::InvalidLadder { .. } => "INVALID_LADDER",
            Self::SeedParse(_) => "SEED_PARSE_ERROR",
            Self::SeedIo { .. } => "SEED_IO_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::NotifyFailed(_) => "NOTIFY_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 可重试意味着调用方可以安全地重发整个 Award 调用：资格判定是
    /// 幂等的，已占用的名额在失败路径上会被回滚。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CounterStore(_) | Self::AccountStore(_) | Self::NotifyFailed(_)
        )
    }
}
