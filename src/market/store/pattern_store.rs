//! 按周期的形态结果缓存
//!
//! 每个周期一个条目，整体替换式写入。TTL = 一个完整周期 + 固定缓冲，
//! 条目总是先过了 nextEligibleRefresh 才会真正消失，读侧因此能拿到
//! 过期但仍在的结果而不是冷未命中。

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::app_config::redis::{
    longest_pattern_ttl_secs, pattern_cache_ttl_secs, pattern_key,
};
use crate::cache::{KvBackend, WriteOp};
use crate::error::{AppError, AppResult};
use crate::market::model::pattern::{
    PatternCacheMeta, PatternRecord, PatternSnapshot, Timeframe, TimeframeCacheEntry,
};
use crate::scheduler::refresh_scheduler;
use crate::time_util::Clock;

pub struct TimeframePatternStore {
    backend: Arc<dyn KvBackend>,
    clock: Arc<dyn Clock>,
}

impl TimeframePatternStore {
    pub fn new(backend: Arc<dyn KvBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// 写入一个周期的刷新结果
    ///
    /// 条目带上 nextEligibleRefresh = 下一个边界时刻；同一批次里更新共享
    /// 元数据（聚合时间戳、totalScanned、各周期下次刷新表）。写失败上抛。
    pub async fn write(
        &self,
        timeframe: Timeframe,
        patterns: Vec<PatternRecord>,
        scanned_total: u32,
    ) -> AppResult<TimeframeCacheEntry> {
        let now = self.clock.now();
        let next_refresh = refresh_scheduler::next_boundary_millis(timeframe, now);

        let entry = TimeframeCacheEntry {
            patterns,
            saved_at: now.timestamp_millis(),
            next_eligible_refresh: Some(next_refresh),
            scanned: scanned_total,
        };

        // 元数据读-改-写：缺失/损坏起一份新的，后端错误上抛
        let mut meta = self.read_meta().await?.unwrap_or_default();
        meta.updated_at = now.timestamp_millis();
        meta.total_scanned = scanned_total;
        meta.next_refresh.insert(timeframe, next_refresh);

        let entry_json = serde_json::to_string(&entry)
            .map_err(|e| AppError::InvalidInput(format!("序列化形态条目失败: {}", e)))?;
        let meta_json = serde_json::to_string(&meta)
            .map_err(|e| AppError::InvalidInput(format!("序列化形态元数据失败: {}", e)))?;

        self.backend
            .exec_atomic(vec![
                WriteOp::SetEx {
                    key: pattern_key::class(timeframe.as_str()),
                    value: entry_json,
                    ttl_secs: pattern_cache_ttl_secs(timeframe),
                },
                WriteOp::SetEx {
                    key: pattern_key::META.to_string(),
                    value: meta_json,
                    ttl_secs: longest_pattern_ttl_secs(),
                },
            ])
            .await?;

        debug!(
            "形态缓存写入: {} {} 条, nextEligibleRefresh={}",
            timeframe,
            entry.patterns.len(),
            next_refresh
        );
        Ok(entry)
    }

    /// 读取全部周期 + 元数据
    ///
    /// 元数据缺失 ⇒ 整个缓存视为未初始化，返回 None。单个周期缺失只算
    /// 该周期为空（允许部分可用）。读失败一律降级，不上抛。
    pub async fn read_all(&self) -> Option<PatternSnapshot> {
        let meta = match self.read_meta().await {
            Ok(Some(meta)) => meta,
            Ok(None) => return None,
            Err(e) => {
                warn!("读取形态元数据失败，按未初始化处理: {}", e);
                return None;
            }
        };

        let reads = Timeframe::ALL
            .iter()
            .map(|tf| async move { (*tf, self.read_entry(*tf).await) });
        let mut timeframes = BTreeMap::new();
        for (tf, entry) in join_all(reads).await {
            timeframes.insert(tf, entry.unwrap_or_default());
        }

        Some(PatternSnapshot { timeframes, meta })
    }

    /// 是否需要刷新
    ///
    /// 条目不存在、缺 nextEligibleRefresh、或当前时间已到达该时刻，都算
    /// 需要刷新；读失败同样算。错过整个刷新窗口后，任意后续检查依然会
    /// 正确报告需要刷新（自愈）。
    pub async fn needs_update(&self, timeframe: Timeframe) -> bool {
        let entry = match self.try_read_entry(timeframe).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("读取形态条目失败，按需要刷新处理: {} {}", timeframe, e);
                return true;
            }
        };
        match entry.and_then(|e| e.next_eligible_refresh) {
            Some(next_refresh) => self.clock.now_millis() >= next_refresh,
            // 没有条目，或条目缺少下次刷新时刻：保守地按需要刷新处理，
            // 不依据 savedAt 推断新鲜度
            None => true,
        }
    }

    /// 数据年龄（分钟），没有条目时返回 None
    pub async fn data_age(&self, timeframe: Timeframe) -> Option<i64> {
        let entry = self.read_entry(timeframe).await?;
        let age_ms = self.clock.now_millis() - entry.saved_at;
        Some(age_ms / 60_000)
    }

    /// 管理性重置：删除全部周期条目与元数据
    pub async fn clear(&self) -> AppResult<()> {
        let mut ops: Vec<WriteOp> = Timeframe::ALL
            .iter()
            .map(|tf| WriteOp::Del {
                key: pattern_key::class(tf.as_str()),
            })
            .collect();
        ops.push(WriteOp::Del {
            key: pattern_key::META.to_string(),
        });
        self.backend.exec_atomic(ops).await
    }

    async fn read_meta(&self) -> AppResult<Option<PatternCacheMeta>> {
        let raw = match self.backend.get(pattern_key::META).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match serde_json::from_str::<PatternCacheMeta>(&raw) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!(
                    "{}",
                    AppError::MalformedPayload {
                        key: pattern_key::META.to_string(),
                        detail: e.to_string(),
                    }
                );
                Ok(None)
            }
        }
    }

    /// 读单个周期条目，失败降级为 None
    async fn read_entry(&self, timeframe: Timeframe) -> Option<TimeframeCacheEntry> {
        match self.try_read_entry(timeframe).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("读取形态条目失败: {} {}", timeframe, e);
                None
            }
        }
    }

    async fn try_read_entry(
        &self,
        timeframe: Timeframe,
    ) -> AppResult<Option<TimeframeCacheEntry>> {
        let key = pattern_key::class(timeframe.as_str());
        let raw = match self.backend.get(&key).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match serde_json::from_str::<TimeframeCacheEntry>(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(
                    "{}",
                    AppError::MalformedPayload {
                        key,
                        detail: e.to_string(),
                    }
                );
                Ok(None)
            }
        }
    }
}
