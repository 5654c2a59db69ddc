//! 资金流排名存储
//!
//! 有界（最多 10 条）、按 symbol 唯一的排名集合，双表示持久化：
//! 整合快照（String）+ 排名索引（ZSET），一个原子批次内同时写入。
//! 读路径有明确的回退顺序：先快照、后索引，失败降级为空结果。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::app_config::redis::{flow_cache_ttl_secs, flow_key};
use crate::cache::{KvBackend, WriteOp};
use crate::error::{AppError, AppResult};
use crate::market::model::flow::{
    rank_cmp, FlowRecord, FlowSnapshot, UpsertSummary, MAX_FLOW_RECORDS,
};
use crate::time_util::Clock;

pub struct PriorityFlowStore {
    backend: Arc<dyn KvBackend>,
    clock: Arc<dyn Clock>,
    capacity: usize,
}

impl PriorityFlowStore {
    pub fn new(backend: Arc<dyn KvBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            capacity: MAX_FLOW_RECORDS,
        }
    }

    /// 批量合并一次摄入
    ///
    /// 同 symbol 整条替换（不做逐字段合并）并重打时间戳；合并后按排名链
    /// 降序截断到容量，被挤出的条目不可恢复。任何存储失败原样上抛，
    /// 失败的批次不允许被认为已部分生效。
    pub async fn upsert_batch(&self, records: Vec<FlowRecord>) -> AppResult<UpsertSummary> {
        validate_batch(&records)?;

        // 合并基线也属于写路径：这里读失败要上抛，整批可重试
        let existing = self.load_for_merge().await?;
        let mut merged: HashMap<String, FlowRecord> = existing
            .into_iter()
            .map(|r| (r.symbol.clone(), r))
            .collect();

        let now_ms = self.clock.now_millis();
        let mut summary = UpsertSummary::default();
        for mut record in records {
            record.updated_at = now_ms;
            if merged.insert(record.symbol.clone(), record).is_some() {
                summary.updated += 1;
            } else {
                summary.added += 1;
            }
        }

        let mut union: Vec<FlowRecord> = merged.into_values().collect();
        union.sort_by(rank_cmp);
        summary.removed = union.len().saturating_sub(self.capacity);
        union.truncate(self.capacity);

        let snapshot = FlowSnapshot {
            records: union,
            updated_at: now_ms,
        };
        let blob = serde_json::to_string(&snapshot).map_err(|e| {
            AppError::InvalidInput(format!("序列化资金流快照失败: {}", e))
        })?;

        let mut members = Vec::with_capacity(snapshot.records.len());
        for record in &snapshot.records {
            let payload = serde_json::to_string(record).map_err(|e| {
                AppError::InvalidInput(format!("序列化资金流记录失败: {}", e))
            })?;
            members.push((record.priority_score, payload));
        }

        let ttl = flow_cache_ttl_secs();
        self.backend
            .exec_atomic(vec![
                WriteOp::SetEx {
                    key: flow_key::TOP.to_string(),
                    value: blob,
                    ttl_secs: ttl,
                },
                WriteOp::ReplaceZset {
                    key: flow_key::RANK.to_string(),
                    members,
                    ttl_secs: ttl,
                },
            ])
            .await?;

        debug!(
            "资金流批量合并完成: added={}, updated={}, removed={}",
            summary.added, summary.updated, summary.removed
        );
        Ok(summary)
    }

    /// 读取全部记录（排名顺序）
    ///
    /// 快照缺失/损坏时尽力从排名索引重建；所有读失败降级为空结果，
    /// "还没有数据"是合法状态，不是错误。
    pub async fn get_all(&self) -> Vec<FlowRecord> {
        match self.read_snapshot().await {
            Ok(Some(records)) => return records,
            Ok(None) => {}
            Err(e) => warn!("读取资金流快照失败，尝试索引回退: {}", e),
        }

        match self.read_from_rank_index().await {
            Ok(records) => records,
            Err(e) => {
                warn!("资金流索引回退也失败，返回空结果: {}", e);
                vec![]
            }
        }
    }

    /// 存活探测
    pub async fn health_check(&self) -> bool {
        match self.backend.ping().await {
            Ok(alive) => alive,
            Err(e) => {
                warn!("存储探活失败: {}", e);
                false
            }
        }
    }

    /// 写路径的合并基线：快照优先，缺失/损坏回退索引，后端错误上抛
    async fn load_for_merge(&self) -> AppResult<Vec<FlowRecord>> {
        if let Some(records) = self.read_snapshot().await? {
            return Ok(records);
        }
        self.read_from_rank_index().await
    }

    async fn read_snapshot(&self) -> AppResult<Option<Vec<FlowRecord>>> {
        let raw = match self.backend.get(flow_key::TOP).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match serde_json::from_str::<FlowSnapshot>(&raw) {
            Ok(snapshot) => Ok(Some(snapshot.records)),
            Err(e) => {
                // 损坏的载荷视为未命中，绝不致命
                warn!(
                    "{}",
                    AppError::MalformedPayload {
                        key: flow_key::TOP.to_string(),
                        detail: e.to_string(),
                    }
                );
                Ok(None)
            }
        }
    }

    /// 从排名索引尽力重建：member 就是记录 JSON，解析失败的成员跳过，
    /// 解析后按完整排名链重排（ZSET 只保存了主评分）
    async fn read_from_rank_index(&self) -> AppResult<Vec<FlowRecord>> {
        let ranked = self
            .backend
            .zrevrange_withscores(flow_key::RANK, 0, self.capacity as isize - 1)
            .await?;

        let mut records = Vec::with_capacity(ranked.len());
        let mut seen: HashSet<String> = HashSet::new();
        for (member, _score) in ranked {
            match serde_json::from_str::<FlowRecord>(&member) {
                Ok(record) => {
                    if seen.insert(record.symbol.clone()) {
                        records.push(record);
                    }
                }
                Err(e) => warn!("跳过损坏的索引成员: {}", e),
            }
        }
        records.sort_by(rank_cmp);
        records.truncate(self.capacity);
        Ok(records)
    }
}

fn validate_batch(records: &[FlowRecord]) -> AppResult<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for record in records {
        let symbol = record.symbol.trim();
        if symbol.is_empty() {
            return Err(AppError::InvalidInput("symbol 不能为空".to_string()));
        }
        if !seen.insert(symbol) {
            return Err(AppError::InvalidInput(format!(
                "批次内 symbol 重复: {}",
                symbol
            )));
        }
        if !record.priority_score.is_finite() {
            return Err(AppError::InvalidInput(format!(
                "priorityScore 非法: symbol={}",
                symbol
            )));
        }
    }
    Ok(())
}
