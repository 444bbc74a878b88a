//! 可观测性初始化
//!
//! 基于 tracing-subscriber 的全局日志初始化，支持 env-filter 过滤与
//! json/pretty 两种输出格式。

use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::ObservabilityConfig;
use crate::error::PointsError;

/// 初始化全局日志订阅器
///
/// RUST_LOG 环境变量优先于配置中的 log_level。重复初始化返回错误。
pub fn init(config: &ObservabilityConfig) -> Result<(), PointsError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = if config.log_format == "json" {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| PointsError::Internal(format!("日志初始化失败: {e}")))
}
