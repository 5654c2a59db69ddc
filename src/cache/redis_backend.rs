use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisResult};
use tracing::debug;

use crate::app_config::redis as redis_config;
use crate::cache::backend::{KvBackend, WriteOp};
use crate::error::{AppError, AppResult};

/// Redis 存储后端
///
/// 持有 Client，多路复用连接按需获取；所有操作带超时上限。
pub struct RedisKvBackend {
    client: Client,
    op_timeout: Duration,
}

impl RedisKvBackend {
    /// 创建后端并做一次连接测试（连接即失败应在启动期暴露）
    pub async fn connect() -> AppResult<Self> {
        let url = redis_config::redis_url()?;
        let client = Client::open(url)
            .map_err(|e| AppError::StorageUnavailable(format!("创建Redis客户端失败: {}", e)))?;

        let backend = Self {
            client,
            op_timeout: redis_config::store_op_timeout(),
        };

        // 测试连接
        let _conn = backend.connection().await?;
        debug!("Redis后端初始化成功");
        Ok(backend)
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.bounded(self.client.get_multiplexed_async_connection())
            .await
    }

    /// 包一层超时并归一化错误分类
    async fn bounded<T, F>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_timeout() => Err(AppError::StorageTimeout(e.to_string())),
            Ok(Err(e)) => Err(AppError::StorageUnavailable(e.to_string())),
            Err(_) => Err(AppError::StorageTimeout(format!(
                "操作超过 {} ms",
                self.op_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl KvBackend for RedisKvBackend {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.connection().await?;
        self.bounded(conn.get::<_, Option<String>>(key)).await
    }

    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> AppResult<Vec<(String, f64)>> {
        let mut conn = self.connection().await?;
        self.bounded(conn.zrevrange_withscores::<_, Vec<(String, f64)>>(key, start, stop))
            .await
    }

    async fn exec_atomic(&self, ops: Vec<WriteOp>) -> AppResult<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &ops {
            match op {
                WriteOp::SetEx {
                    key,
                    value,
                    ttl_secs,
                } => {
                    pipe.set_ex(key, value, *ttl_secs).ignore();
                }
                WriteOp::ReplaceZset {
                    key,
                    members,
                    ttl_secs,
                } => {
                    pipe.del(key).ignore();
                    if !members.is_empty() {
                        let items: Vec<(f64, &str)> = members
                            .iter()
                            .map(|(score, member)| (*score, member.as_str()))
                            .collect();
                        pipe.zadd_multiple(key, &items).ignore();
                    }
                    pipe.expire(key, *ttl_secs as i64).ignore();
                }
                WriteOp::Del { key } => {
                    pipe.del(key).ignore();
                }
            }
        }

        let mut conn = self.connection().await?;
        self.bounded(pipe.query_async::<_, ()>(&mut conn)).await
    }

    async fn ping(&self) -> AppResult<bool> {
        let mut conn = self.connection().await?;
        let pong: String = self.bounded(redis::cmd("PING").query_async(&mut conn)).await?;
        Ok(pong.eq_ignore_ascii_case("pong"))
    }
}
