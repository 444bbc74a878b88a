//! 等级事件模型与通知抽象
//!
//! 定义升级事件的统一信封格式与 `TransitionNotifier` trait。积分入账的
//! 正确性与通知投递解耦：投递失败由实现方自行重试或丢弃，引擎不会因此
//! 回滚已完成的发放。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PointsError;

// ---------------------------------------------------------------------------
// LevelTransition — 等级跃迁事件
// ---------------------------------------------------------------------------

/// 等级跃迁事件
///
/// 用户累计积分跨过等级门槛时由引擎发出。投递渠道（站内信、推送、
/// 广播）由外部实现决定，引擎只负责生成事件本身。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelTransition {
    /// 事件唯一标识（UUID v7），时间有序便于索引
    pub transition_id: String,
    pub user_id: String,
    pub previous_level: u32,
    pub new_level: u32,
    /// 新等级名称
    pub tier_name: String,
    pub description: String,
    /// 等级奖励内容，对引擎透明
    pub rewards: serde_json::Value,
    /// 跃迁发生时的累计积分
    pub total_points: i64,
    pub occurred_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// TransitionNotifier trait — 通知投递抽象
// ---------------------------------------------------------------------------

/// 等级事件通知器，外部投递渠道实现此 trait
#[async_trait]
pub trait TransitionNotifier: Send + Sync {
    /// 投递一条升级事件
    async fn notify(&self, transition: &LevelTransition) -> Result<(), PointsError>;
}

/// 日志通知器
///
/// 默认实现，仅把事件写入结构化日志，便于在无外部依赖的情况下验证
/// 发放管道的完整性。生产部署替换为接入实际消息渠道的实现。
pub struct LoggingNotifier;

#[async_trait]
impl TransitionNotifier for LoggingNotifier {
    async fn notify(&self, transition: &LevelTransition) -> Result<(), PointsError> {
        info!(
            transition_id = %transition.transition_id,
            user_id = %transition.user_id,
            previous_level = transition.previous_level,
            new_level = transition.new_level,
            tier_name = %transition.tier_name,
            total_points = transition.total_points,
            "用户等级提升"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transition() -> LevelTransition {
        LevelTransition {
            transition_id: "01912345-6789-7abc-8def-0123456789ab".to_string(),
            user_id: "user-001".to_string(),
            previous_level: 1,
            new_level: 2,
            tier_name: "Enthusiast".to_string(),
            description: "稳定活跃的社区成员".to_string(),
            rewards: serde_json::json!({"badge": "bronze"}),
            total_points: 200,
            occurred_at: DateTime::parse_from_rfc3339("2025-01-15T10:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn test_level_transition_serialization() {
        let transition = sample_transition();
        let json = serde_json::to_string(&transition).unwrap();

        // 验证 camelCase 序列化格式
        assert!(json.contains("transitionId"));
        assert!(json.contains("userId"));
        assert!(json.contains("previousLevel"));
        assert!(json.contains("newLevel"));
        assert!(json.contains("tierName"));
        assert!(json.contains("totalPoints"));
        assert!(json.contains("occurredAt"));

        // 验证反序列化能还原
        let deserialized: LevelTransition = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.transition_id, transition.transition_id);
        assert_eq!(deserialized.user_id, "user-001");
        assert_eq!(deserialized.previous_level, 1);
        assert_eq!(deserialized.new_level, 2);
        assert_eq!(deserialized.tier_name, "Enthusiast");
        assert_eq!(deserialized.total_points, 200);
    }

    #[tokio::test]
    async fn test_logging_notifier_accepts_transition() {
        let notifier = LoggingNotifier;
        let result = notifier.notify(&sample_transition()).await;
        assert!(result.is_ok());
    }
}
