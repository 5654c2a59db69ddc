//! Redis key 与 TTL 统一定义
//!
//! 所有持久化键集中在此维护，便于查找；TTL 支持环境变量覆盖。

use std::env;
use std::time::Duration;

use crate::app_config::env::env_i64;
use crate::error::{AppError, AppResult};
use crate::market::model::pattern::Timeframe;

/// 资金流相关 Key
pub mod flow_key {
    /// 整合快照（String，JSON: records + updatedAt）
    pub const TOP: &str = "smart_flow:top";

    /// 排名二级索引（ZSET，member = 记录 JSON，score = priorityScore）
    pub const RANK: &str = "smart_flow:rank";
}

/// 形态缓存相关 Key
pub mod pattern_key {
    /// 共享元数据（String，JSON）
    pub const META: &str = "patterns:meta";

    /// 按周期的形态结果键，如 patterns:1H
    pub fn class(period: &str) -> String {
        format!("patterns:{}", period)
    }
}

/// Redis 连接地址，缺失视为配置错误（构造期致命）
pub fn redis_url() -> AppResult<String> {
    match env::var("REDIS_HOST") {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::StorageUnavailable(
            "REDIS_HOST 未配置".to_string(),
        )),
    }
}

/// 单次存储操作的超时上限
pub fn store_op_timeout() -> Duration {
    Duration::from_millis(env_i64("STORE_OP_TIMEOUT_MS", 5000).max(1) as u64)
}

/// 资金流快照 TTL（整小时）
pub fn flow_cache_ttl_secs() -> u64 {
    env_i64("FLOW_CACHE_TTL_HOURS", 24).max(1) as u64 * 3600
}

/// 形态缓存 TTL 缓冲：超出下一次可刷新时刻的固定余量，
/// 保证到期前总能读到"过期但仍在"的结果而不是冷未命中
pub fn pattern_ttl_buffer_secs() -> u64 {
    env_i64("PATTERN_TTL_BUFFER_SECS", 900).max(0) as u64
}

/// 按周期的形态缓存 TTL = 一个完整周期 + 缓冲
pub fn pattern_cache_ttl_secs(timeframe: Timeframe) -> u64 {
    timeframe.period_secs() + pattern_ttl_buffer_secs()
}

/// 元数据 TTL 取各周期 TTL 的最大值，提供一次廉价的存在性探测
pub fn longest_pattern_ttl_secs() -> u64 {
    Timeframe::ALL
        .iter()
        .map(|tf| pattern_cache_ttl_secs(*tf))
        .max()
        .unwrap_or(0)
}
