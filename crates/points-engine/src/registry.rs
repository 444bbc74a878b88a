//! 规则注册表
//!
//! 以不可变快照承载全部动作规则：读取是一次无锁的原子 load，重载时
//! 整表原子替换，读取方要么看到旧表要么看到新表，不存在半更新状态。

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use points_shared::error::PointsError;
use tracing::{info, warn};

use crate::models::ActionRule;

/// 一份完整的规则表快照
#[derive(Debug)]
struct RuleTable {
    rules: HashMap<String, Arc<ActionRule>>,
    loaded_at: DateTime<Utc>,
}

impl RuleTable {
    /// 构建并校验规则表
    ///
    /// 同批次出现重复 action_type 时按 upsert 语义处理：后出现的条目
    /// 覆盖先出现的。任何一条规则非法则整批拒绝。
    fn build(rules: Vec<ActionRule>) -> Result<Self, PointsError> {
        let mut table: HashMap<String, Arc<ActionRule>> = HashMap::with_capacity(rules.len());

        for rule in rules {
            if rule.action_type.trim().is_empty() {
                return Err(PointsError::InvalidRule {
                    reason: "action_type 不能为空".to_string(),
                });
            }
            if rule.points < 0 {
                return Err(PointsError::InvalidRule {
                    reason: format!("{} 的积分数不能为负: {}", rule.action_type, rule.points),
                });
            }

            let action_type = rule.action_type.clone();
            if table.insert(action_type.clone(), Arc::new(rule)).is_some() {
                warn!(action_type = %action_type, "重复的规则定义，已被后出现的条目覆盖");
            }
        }

        Ok(Self {
            rules: table,
            loaded_at: Utc::now(),
        })
    }
}

/// 规则注册表
#[derive(Clone)]
pub struct RuleRegistry {
    current: Arc<ArcSwap<RuleTable>>,
}

impl RuleRegistry {
    /// 从规则集合构建注册表，配置错误在启动期立即失败
    pub fn load(rules: Vec<ActionRule>) -> Result<Self, PointsError> {
        let table = RuleTable::build(rules)?;
        info!(rule_count = table.rules.len(), "规则注册表已加载");

        Ok(Self {
            current: Arc::new(ArcSwap::from_pointee(table)),
        })
    }

    /// 查找可用于发放的规则
    ///
    /// 未知与已停用的规则都返回 None，调用方一律按「无可用规则」处理，
    /// 这是一次无操作而非错误。
    pub fn lookup(&self, action_type: &str) -> Option<Arc<ActionRule>> {
        self.current
            .load()
            .rules
            .get(action_type)
            .filter(|rule| rule.is_active)
            .cloned()
    }

    /// 按 action_type 获取规则（含停用规则），供巡检与后台查询使用
    pub fn get(&self, action_type: &str) -> Option<Arc<ActionRule>> {
        self.current.load().rules.get(action_type).cloned()
    }

    /// 整表原子重载
    ///
    /// 新表先完整构建并校验，再一次性替换。已持有旧规则快照的在途
    /// 发放按旧值完成，重载只影响后续调用。
    pub fn reload(&self, rules: Vec<ActionRule>) -> Result<(), PointsError> {
        let table = RuleTable::build(rules)?;
        let rule_count = table.rules.len();
        self.current.store(Arc::new(table));

        info!(rule_count, "规则注册表已重载");
        Ok(())
    }

    /// 当前注册的规则数量
    pub fn len(&self) -> usize {
        self.current.load().rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().rules.is_empty()
    }

    /// 获取注册表状态概览
    pub fn status(&self) -> RegistryStatus {
        let table = self.current.load();

        let active_count = table.rules.values().filter(|r| r.is_active).count();
        let mut categories: Vec<String> = table
            .rules
            .values()
            .map(|r| r.category.clone())
            .filter(|c| !c.is_empty())
            .collect();
        categories.sort();
        categories.dedup();

        RegistryStatus {
            rule_count: table.rules.len(),
            active_count,
            categories,
            loaded_at: table.loaded_at,
        }
    }
}

/// 注册表状态概览
#[derive(Debug, Clone)]
pub struct RegistryStatus {
    pub rule_count: usize,
    pub active_count: usize,
    pub categories: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}
