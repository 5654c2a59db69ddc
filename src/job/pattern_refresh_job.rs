//! 形态刷新编排任务
//!
//! 无常驻进程：每次调用独立判断哪些周期到点或被强制，把重算交给外部
//! 分析服务，成功后经缓存存储写回。生产者失败时不落任何写入，已有缓存
//! 原样保留（过期可用胜过清空）。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::market::model::pattern::Timeframe;
use crate::market::store::TimeframePatternStore;
use crate::producer::PatternAnalysisProducer;
use crate::scheduler::refresh_scheduler;
use crate::time_util::Clock;

/// 一次刷新调用的状态机
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    ComputingSubset,
    Done,
    Failed,
}

/// 刷新结果报告
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub state: RefreshState,
    /// 各周期写入的形态条数
    pub refreshed: BTreeMap<Timeframe, usize>,
    pub total_scanned: u32,
    pub elapsed_ms: u64,
    /// 各周期下一次可刷新时刻（毫秒）
    pub next_refresh: BTreeMap<Timeframe, i64>,
    pub message: String,
}

pub struct PatternRefreshJob {
    store: Arc<TimeframePatternStore>,
    producer: Arc<dyn PatternAnalysisProducer>,
    clock: Arc<dyn Clock>,
}

impl PatternRefreshJob {
    pub fn new(
        store: Arc<TimeframePatternStore>,
        producer: Arc<dyn PatternAnalysisProducer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            producer,
            clock,
        }
    }

    /// 计划路径：到点且确实需要刷新的周期才进目标集。
    /// 同一窗口内的第二次调用是安全空操作（needsUpdate 已为 false）。
    pub async fn run_due(&self) -> AppResult<RefreshReport> {
        let now = self.clock.now();
        let mut targets = Vec::new();
        for timeframe in refresh_scheduler::due_classes(now) {
            if self.store.needs_update(timeframe).await {
                targets.push(timeframe);
            }
        }
        self.execute(targets, false).await
    }

    /// 强制路径：调用方显式给定周期列表，完全绕过到点与新鲜度检查
    pub async fn run_forced(&self, classes: Vec<Timeframe>) -> AppResult<RefreshReport> {
        let mut targets = Vec::new();
        for timeframe in classes {
            if !targets.contains(&timeframe) {
                targets.push(timeframe);
            }
        }
        self.execute(targets, true).await
    }

    async fn execute(&self, targets: Vec<Timeframe>, force: bool) -> AppResult<RefreshReport> {
        let mut state = RefreshState::Idle;
        debug!("刷新任务启动: state={:?}, targets={:?}", state, targets);

        if targets.is_empty() {
            state = RefreshState::Done;
            // 空目标集：直接完成，带回当前未变化的下次刷新表
            let next_refresh = match self.store.read_all().await {
                Some(snapshot) => snapshot.meta.next_refresh,
                None => BTreeMap::new(),
            };
            return Ok(RefreshReport {
                state,
                refreshed: BTreeMap::new(),
                total_scanned: 0,
                elapsed_ms: 0,
                next_refresh,
                message: "no update needed".to_string(),
            });
        }

        let started = Instant::now();
        state = RefreshState::ComputingSubset;
        info!(
            "🔄 开始刷新形态缓存: state={:?}, targets={:?}, force={}",
            state, targets, force
        );

        // 只把目标子集交给外部服务，绝不重算未被选中的周期
        let output = match self.producer.analyze(&targets, force).await {
            Ok(output) => output,
            Err(e) => {
                state = RefreshState::Failed;
                error!("❌ 形态分析服务调用失败: state={:?}, {}", state, e);
                // 不落任何写入，已有缓存保持原样
                return Err(e);
            }
        };

        let mut refreshed = BTreeMap::new();
        let mut next_refresh = BTreeMap::new();
        for (timeframe, patterns) in output.patterns {
            if !targets.contains(&timeframe) {
                warn!("⚠️  忽略未请求周期的返回: {}", timeframe);
                continue;
            }
            let entry = self
                .store
                .write(timeframe, patterns, output.total_scanned)
                .await?;
            next_refresh.insert(
                timeframe,
                entry.next_eligible_refresh.unwrap_or_default(),
            );
            refreshed.insert(timeframe, entry.patterns.len());
        }

        state = RefreshState::Done;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "✅ 形态缓存刷新完成: refreshed={:?}, scanned={}, 耗时 {} ms",
            refreshed, output.total_scanned, elapsed_ms
        );
        Ok(RefreshReport {
            state,
            refreshed,
            total_scanned: output.total_scanned,
            elapsed_ms,
            next_refresh,
            message: "refreshed".to_string(),
        })
    }
}

/// 解析命令行传入的周期列表，未知名称报无效输入
pub fn parse_classes(raw: &[String]) -> AppResult<Vec<Timeframe>> {
    if raw.is_empty() {
        return Ok(Timeframe::ALL.to_vec());
    }
    raw.iter()
        .map(|s| s.parse::<Timeframe>())
        .collect::<Result<Vec<_>, AppError>>()
}
