use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::cache::backend::{KvBackend, WriteOp};
use crate::error::AppResult;

#[derive(Clone)]
struct StoredString {
    value: String,
    expires_at: Option<Instant>,
}

#[derive(Clone)]
struct StoredZset {
    members: Vec<(f64, String)>,
    expires_at: Option<Instant>,
}

fn is_expired(expires_at: Option<Instant>) -> bool {
    matches!(expires_at, Some(at) if Instant::now() >= at)
}

fn expires_after(ttl_secs: u64) -> Option<Instant> {
    Some(Instant::now() + Duration::from_secs(ttl_secs))
}

/// 进程内存储后端（DashMap），与 Redis 实现同语义，测试专用
#[derive(Default)]
pub struct MemoryKvBackend {
    strings: DashMap<String, StoredString>,
    zsets: DashMap<String, StoredZset>,
}

impl MemoryKvBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for MemoryKvBackend {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        // 先取值再释放读锁，过期删除不能在持有引用时进行
        let hit = self
            .strings
            .get(key)
            .map(|entry| (entry.value.clone(), is_expired(entry.expires_at)));
        match hit {
            Some((_, true)) => {
                self.strings.remove(key);
                Ok(None)
            }
            Some((value, false)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> AppResult<Vec<(String, f64)>> {
        let hit = self
            .zsets
            .get(key)
            .map(|entry| (entry.members.clone(), is_expired(entry.expires_at)));
        let members = match hit {
            Some((_, true)) => {
                self.zsets.remove(key);
                return Ok(vec![]);
            }
            Some((members, false)) => members,
            None => return Ok(vec![]),
        };

        // score 降序，同分按 member 字典序降序（与 Redis ZREVRANGE 一致）
        let mut ranked = members;
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.cmp(&a.1))
        });

        let len = ranked.len() as isize;
        let norm = |idx: isize| -> isize {
            if idx < 0 {
                (len + idx).max(0)
            } else {
                idx
            }
        };
        let from = norm(start).min(len);
        let to = (norm(stop) + 1).min(len);
        if from >= to {
            return Ok(vec![]);
        }

        Ok(ranked[from as usize..to as usize]
            .iter()
            .map(|(score, member)| (member.clone(), *score))
            .collect())
    }

    async fn exec_atomic(&self, ops: Vec<WriteOp>) -> AppResult<()> {
        for op in ops {
            match op {
                WriteOp::SetEx {
                    key,
                    value,
                    ttl_secs,
                } => {
                    self.strings.insert(
                        key,
                        StoredString {
                            value,
                            expires_at: expires_after(ttl_secs),
                        },
                    );
                }
                WriteOp::ReplaceZset {
                    key,
                    members,
                    ttl_secs,
                } => {
                    self.zsets.insert(
                        key,
                        StoredZset {
                            members,
                            expires_at: expires_after(ttl_secs),
                        },
                    );
                }
                WriteOp::Del { key } => {
                    self.strings.remove(&key);
                    self.zsets.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn ping(&self) -> AppResult<bool> {
        Ok(true)
    }
}
