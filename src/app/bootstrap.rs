//! # 应用启动引导模块
//!
//! 存储客户端显式构造、显式注入，生命周期由 AppContext 管理，
//! 不放任何进程级单例。

use std::sync::Arc;

use tracing::info;

use crate::cache::{KvBackend, RedisKvBackend};
use crate::error::AppResult;
use crate::job::pattern_refresh_job::PatternRefreshJob;
use crate::market::store::{PriorityFlowStore, TimeframePatternStore};
use crate::producer::{HttpPatternProducer, PatternAnalysisProducer};
use crate::time_util::{Clock, SystemClock};

/// 应用上下文：一次构造，各调用路径共享同一个后端连接
pub struct AppContext {
    pub flow_store: PriorityFlowStore,
    pub pattern_store: Arc<TimeframePatternStore>,
    pub refresh_job: PatternRefreshJob,
}

impl AppContext {
    /// 线上初始化：Redis 后端 + 系统时钟 + HTTP 分析服务
    pub async fn init() -> AppResult<Self> {
        let backend: Arc<dyn KvBackend> = Arc::new(RedisKvBackend::connect().await?);
        let producer: Arc<dyn PatternAnalysisProducer> =
            Arc::new(HttpPatternProducer::from_env());
        let context = Self::assemble(backend, Arc::new(SystemClock), producer);
        info!("✅ 应用上下文初始化完成");
        Ok(context)
    }

    /// 依赖注入装配，测试用它换入内存后端与固定时钟
    pub fn assemble(
        backend: Arc<dyn KvBackend>,
        clock: Arc<dyn Clock>,
        producer: Arc<dyn PatternAnalysisProducer>,
    ) -> Self {
        let flow_store = PriorityFlowStore::new(Arc::clone(&backend), Arc::clone(&clock));
        let pattern_store = Arc::new(TimeframePatternStore::new(
            Arc::clone(&backend),
            Arc::clone(&clock),
        ));
        let refresh_job =
            PatternRefreshJob::new(Arc::clone(&pattern_store), producer, clock);
        Self {
            flow_store,
            pattern_store,
            refresh_job,
        }
    }

    /// 显式收尾：连接随上下文析构关闭
    pub async fn shutdown(self) {
        info!("应用上下文已关闭");
    }
}
