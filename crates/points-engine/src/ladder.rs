//! 等级阶梯与等级解析
//!
//! 阶梯是一份按门槛升序排列的只读快照。等级解析是标准的 floor 查找：
//! 取门槛不超过累计积分的最高等级。累计积分只增不减，因此等级跃迁
//! 只会向上，不存在降级路径。

use std::collections::BTreeMap;

use points_shared::error::PointsError;
use tracing::warn;

use crate::models::LevelTier;

/// 等级阶梯
///
/// 构造即校验：levels 与 points_required 都严格递增，最低等级门槛为 0。
/// 校验不通过无法得到实例，引擎因此不可能对非法阶梯提供发放服务。
#[derive(Debug)]
pub struct TierLadder {
    /// 按 points_required 升序
    tiers: Vec<LevelTier>,
}

impl TierLadder {
    /// 构建并校验阶梯
    ///
    /// 同一 level 出现多次时按 upsert 语义处理，后出现的条目覆盖先出现的。
    pub fn new(tiers: Vec<LevelTier>) -> Result<Self, PointsError> {
        if tiers.is_empty() {
            return Err(PointsError::InvalidLadder {
                reason: "等级阶梯不能为空".to_string(),
            });
        }

        let mut by_level: BTreeMap<u32, LevelTier> = BTreeMap::new();
        for tier in tiers {
            if tier.level == 0 {
                return Err(PointsError::InvalidLadder {
                    reason: format!("等级必须为正整数: {}", tier.name),
                });
            }
            if tier.points_required < 0 {
                return Err(PointsError::InvalidLadder {
                    reason: format!("等级 {} 的积分门槛不能为负", tier.level),
                });
            }
            if by_level.insert(tier.level, tier).is_some() {
                warn!("重复的等级定义，已被后出现的条目覆盖");
            }
        }

        let tiers: Vec<LevelTier> = by_level.into_values().collect();

        if tiers[0].points_required != 0 {
            return Err(PointsError::InvalidLadder {
                reason: format!(
                    "最低等级 {} 的积分门槛必须为 0, 实际 {}",
                    tiers[0].level, tiers[0].points_required
                ),
            });
        }
        for pair in tiers.windows(2) {
            if pair[1].points_required <= pair[0].points_required {
                return Err(PointsError::InvalidLadder {
                    reason: format!(
                        "等级 {} 与 {} 的积分门槛未严格递增",
                        pair[0].level, pair[1].level
                    ),
                });
            }
        }

        Ok(Self { tiers })
    }

    /// 累计积分归属的等级：门槛不超过 total_points 的最高一级
    ///
    /// 二分实现。负数输入按 0 处理。
    pub fn level_for(&self, total_points: i64) -> &LevelTier {
        let total = total_points.max(0);
        let idx = self.tiers.partition_point(|t| t.points_required <= total);
        // 最低等级门槛为 0，idx 至少为 1
        &self.tiers[idx - 1]
    }

    /// 解析一次积分变化前后的等级归属
    pub fn resolve(&self, old_total: i64, new_total: i64) -> LevelChange<'_> {
        let from_level = self.level_for(old_total).level;
        let tier = self.level_for(new_total);

        LevelChange {
            from_level,
            tier,
            crossed: tier.level != from_level,
        }
    }

    /// 按升序排列的全部等级
    pub fn tiers(&self) -> &[LevelTier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

/// 一次积分变化的等级解析结果
#[derive(Debug)]
pub struct LevelChange<'a> {
    /// 变化前归属的等级
    pub from_level: u32,
    /// 变化后归属的等级
    pub tier: &'a LevelTier,
    /// 是否发生等级跃迁
    pub crossed: bool,
}
