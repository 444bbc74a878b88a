//! 种子数据
//!
//! 内置的默认动作规则与等级阶梯，以及从外部 JSON 配置装载的入口。
//! 装载得到的集合在构建 [`RuleRegistry`](crate::registry::RuleRegistry) 与
//! [`TierLadder`](crate::ladder::TierLadder) 时按 action_type / level 做
//! 幂等 upsert，重复装载同一份数据不会产生重复条目。

use std::path::Path;

use points_shared::error::PointsError;
use serde_json::json;

use crate::models::{ActionRule, LevelTier};

/// 默认动作规则表
pub fn default_rules() -> Vec<ActionRule> {
    vec![
        // 新手任务，一次性
        ActionRule::new("register", 50)
            .one_time()
            .with_category("onboarding"),
        ActionRule::new("verify_email", 20)
            .one_time()
            .with_category("onboarding"),
        ActionRule::new("complete_profile", 25)
            .one_time()
            .with_category("onboarding"),
        ActionRule::new("upload_avatar", 10)
            .one_time()
            .with_category("onboarding"),
        ActionRule::new("first_post", 30)
            .one_time()
            .with_category("onboarding"),
        ActionRule::new("first_course_completed", 100)
            .one_time()
            .with_category("onboarding"),
        // 日常活跃
        ActionRule::new("daily_login", 5)
            .with_daily_limit(1)
            .with_category("engagement"),
        ActionRule::new("give_like", 1)
            .with_daily_limit(30)
            .with_category("engagement"),
        ActionRule::new("receive_like", 2)
            .with_daily_limit(50)
            .with_category("engagement"),
        ActionRule::new("watch_video", 1)
            .with_daily_limit(20)
            .with_category("engagement"),
        ActionRule::new("share_post", 3)
            .with_daily_limit(10)
            .with_category("engagement"),
        // 内容创作
        ActionRule::new("create_post", 10)
            .with_daily_limit(10)
            .with_category("content"),
        ActionRule::new("create_comment", 3)
            .with_daily_limit(30)
            .with_category("content"),
        ActionRule::new("receive_comment", 2)
            .with_daily_limit(50)
            .with_category("content"),
        ActionRule::new("post_featured", 50).with_category("content"),
        ActionRule::new("create_library", 15)
            .with_daily_limit(5)
            .with_category("content"),
        ActionRule::new("add_library_item", 2)
            .with_daily_limit(20)
            .with_category("content"),
        // 社交关系
        ActionRule::new("follow_user", 2)
            .with_daily_limit(20)
            .with_category("social"),
        ActionRule::new("gain_follower", 3).with_category("social"),
        // 学习行为
        ActionRule::new("enroll_course", 5)
            .with_daily_limit(5)
            .with_category("learning"),
        ActionRule::new("complete_lesson", 10)
            .with_daily_limit(20)
            .with_category("learning"),
        ActionRule::new("complete_course", 100).with_category("learning"),
        ActionRule::new("pass_quiz", 15)
            .with_daily_limit(10)
            .with_category("learning"),
    ]
}

/// 默认等级阶梯
pub fn default_tiers() -> Vec<LevelTier> {
    vec![
        LevelTier::new(1, "Newcomer", 0)
            .with_description("刚刚加入的新成员")
            .with_rewards(json!({"badge": "sprout"})),
        LevelTier::new(2, "Enthusiast", 200)
            .with_description("稳定活跃的社区成员")
            .with_rewards(json!({"badge": "bronze", "perks": ["custom_avatar_frame"]})),
        LevelTier::new(3, "Contributor", 500)
            .with_description("持续产出内容的贡献者")
            .with_rewards(json!({"badge": "silver", "perks": ["custom_avatar_frame", "post_highlight"]})),
        LevelTier::new(4, "Mentor", 1000)
            .with_description("乐于帮助他人的导师")
            .with_rewards(json!({"badge": "gold", "perks": ["post_highlight", "group_creation"]})),
        LevelTier::new(5, "Specialist", 2500)
            .with_description("深耕专业领域的行家")
            .with_rewards(json!({"badge": "platinum", "perks": ["group_creation", "beta_features"]})),
        LevelTier::new(6, "Expert", 5000)
            .with_description("广受认可的专家")
            .with_rewards(json!({"badge": "diamond", "perks": ["beta_features", "expert_column"]})),
        LevelTier::new(7, "Master", 10000)
            .with_description("社区中坚力量")
            .with_rewards(json!({"badge": "master", "perks": ["expert_column", "annual_gift"]})),
        LevelTier::new(8, "Legend", 25000)
            .with_description("社区传奇人物")
            .with_rewards(json!({"badge": "legend", "perks": ["annual_gift", "hall_of_fame"]})),
    ]
}

/// 从 JSON 文本解析规则集合
pub fn rules_from_json(text: &str) -> Result<Vec<ActionRule>, PointsError> {
    Ok(serde_json::from_str(text)?)
}

/// 从 JSON 文本解析阶梯集合
pub fn tiers_from_json(text: &str) -> Result<Vec<LevelTier>, PointsError> {
    Ok(serde_json::from_str(text)?)
}

/// 从 JSON 文件装载规则集合
pub fn rules_from_file(path: impl AsRef<Path>) -> Result<Vec<ActionRule>, PointsError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| PointsError::SeedIo {
        path: path.display().to_string(),
        source,
    })?;
    rules_from_json(&text)
}

/// 从 JSON 文件装载阶梯集合
pub fn tiers_from_file(path: impl AsRef<Path>) -> Result<Vec<LevelTier>, PointsError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| PointsError::SeedIo {
        path: path.display().to_string(),
        source,
    })?;
    tiers_from_json(&text)
}
