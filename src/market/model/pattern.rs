use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 周期：1H / 4H / 1D（UTC 蜡烛周期）
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Timeframe {
    #[serde(rename = "1H")]
    H1,
    #[serde(rename = "4H")]
    H4,
    #[serde(rename = "1D")]
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::H1, Timeframe::H4, Timeframe::D1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::H1 => "1H",
            Timeframe::H4 => "4H",
            Timeframe::D1 => "1D",
        }
    }

    /// 一个完整周期的秒数
    pub fn period_secs(&self) -> u64 {
        match self {
            Timeframe::H1 => 3600,
            Timeframe::H4 => 4 * 3600,
            Timeframe::D1 => 24 * 3600,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "1H" => Ok(Timeframe::H1),
            "4H" => Ok(Timeframe::H4),
            "1D" => Ok(Timeframe::D1),
            other => Err(AppError::InvalidInput(format!("未知周期: {}", other))),
        }
    }
}

/// 形态检测记录
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatternRecord {
    pub symbol: String,  // 交易对
    pub pattern: String, // 形态名，如 engulfing / hammer
    #[serde(default)]
    pub direction: String, // bullish / bearish
    #[serde(default)]
    pub confidence: f64, // 形态置信度
    #[serde(default)]
    pub price: f64, // 检出时价格
    pub detected_at: i64, // 检出时间，Unix毫秒
}

/// 单周期缓存条目，每次刷新整体替换，从不局部修改
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimeframeCacheEntry {
    #[serde(default)]
    pub patterns: Vec<PatternRecord>,
    #[serde(default)]
    pub saved_at: i64, // 写入时间，Unix毫秒
    /// 下一次可刷新时刻；历史数据可能缺失该字段，缺失视同过期
    #[serde(default)]
    pub next_eligible_refresh: Option<i64>,
    #[serde(default)]
    pub scanned: u32, // 本轮扫描的标的数
}

/// 共享元数据：一次廉价探测即可判断整个缓存是否初始化过
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PatternCacheMeta {
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub total_scanned: u32,
    #[serde(default)]
    pub next_refresh: BTreeMap<Timeframe, i64>,
}

/// readAll 的返回：各周期条目 + 元数据
#[derive(Debug, Clone)]
pub struct PatternSnapshot {
    pub timeframes: BTreeMap<Timeframe, TimeframeCacheEntry>,
    pub meta: PatternCacheMeta,
}
