use async_trait::async_trait;

use crate::error::AppResult;

/// 一个逻辑批次内的写目标，整批原子执行
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// SET key value EX ttl
    SetEx {
        key: String,
        value: String,
        ttl_secs: u64,
    },
    /// 整体替换 ZSET：DEL + ZADD + EXPIRE，(score, member)
    ReplaceZset {
        key: String,
        members: Vec<(f64, String)>,
        ttl_secs: u64,
    },
    /// DEL key
    Del { key: String },
}

/// 存储后端抽象：显式构造、依赖注入，不走进程级单例
///
/// Redis 实现用于线上，内存实现用于测试，两者语义一致：
/// TTL 到期即视为不存在。
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// 读取字符串键，不存在或已过期返回 None
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// 按 score 降序读取 ZSET 区间（含两端），返回 (member, score)
    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> AppResult<Vec<(String, f64)>>;

    /// 原子执行一批写操作（MULTI/EXEC 语义）
    async fn exec_atomic(&self, ops: Vec<WriteOp>) -> AppResult<()>;

    /// 存活探测
    async fn ping(&self) -> AppResult<bool>;
}
