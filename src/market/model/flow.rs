use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// 资金流快照最多保留的记录数
pub const MAX_FLOW_RECORDS: usize = 10;

/// 资金流记录实体
///
/// 存量 JSON 使用 camelCase 字段名（与既有看板读取端共用同一份数据）。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowRecord {
    pub symbol: String, // 交易对，唯一键
    #[serde(default)]
    pub price: f64, // 最新成交价
    #[serde(default)]
    pub volume_24h: f64, // 24小时成交额
    #[serde(default)]
    pub net_inflow: f64, // 净流入
    pub priority_score: f64, // 优先级评分（上游计算，必填）
    #[serde(default)]
    pub manipulation_confidence: f64, // 操纵置信度
    #[serde(default)]
    pub abnormality_score: f64, // 异动评分
    #[serde(default)]
    pub open_interest_value: f64, // 持仓价值
    #[serde(default)]
    pub updated_at: i64, // 最近一次落库时间，Unix毫秒
}

/// 整合快照：记录数组 + 元信息，整体落在一个键上
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct FlowSnapshot {
    #[serde(default)]
    pub records: Vec<FlowRecord>,
    #[serde(default)]
    pub updated_at: i64,
}

/// 批量合并结果计数
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

fn cmp_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// 排名比较链：priorityScore → manipulationConfidence → abnormalityScore
/// → openInterestValue，全部降序。排序从不落库，始终现场推导。
pub fn rank_cmp(a: &FlowRecord, b: &FlowRecord) -> Ordering {
    cmp_desc(a.priority_score, b.priority_score)
        .then_with(|| cmp_desc(a.manipulation_confidence, b.manipulation_confidence))
        .then_with(|| cmp_desc(a.abnormality_score, b.abnormality_score))
        .then_with(|| cmp_desc(a.open_interest_value, b.open_interest_value))
}
