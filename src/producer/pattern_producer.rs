//! 外部形态分析服务客户端
//!
//! 重算本身不在本系统内完成：编排器只负责把目标周期子集交给外部服务，
//! 拿回各周期的形态列表与扫描总数。

use std::collections::BTreeMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::app_config::env::env_or_default;
use crate::error::{AppError, AppResult};
use crate::market::model::pattern::{PatternRecord, Timeframe};

/// 分析服务返回
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PatternAnalysisOutput {
    #[serde(default)]
    pub patterns: BTreeMap<Timeframe, Vec<PatternRecord>>,
    #[serde(default)]
    pub total_scanned: u32,
}

/// 形态分析生产者：按显式周期子集调用，force 原样透传
#[async_trait]
pub trait PatternAnalysisProducer: Send + Sync {
    async fn analyze(
        &self,
        classes: &[Timeframe],
        force: bool,
    ) -> AppResult<PatternAnalysisOutput>;
}

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

fn class_list(classes: &[Timeframe]) -> String {
    classes
        .iter()
        .map(|tf| tf.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// HTTP 实现：POST JSON 到分析服务
pub struct HttpPatternProducer {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpPatternProducer {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: HTTP_CLIENT.clone(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(env_or_default(
            "PATTERN_PRODUCER_URL",
            "http://127.0.0.1:8000/api/patterns/analyze",
        ))
    }
}

#[async_trait]
impl PatternAnalysisProducer for HttpPatternProducer {
    async fn analyze(
        &self,
        classes: &[Timeframe],
        force: bool,
    ) -> AppResult<PatternAnalysisOutput> {
        let classes_label = class_list(classes);
        let body = json!({
            "classes": classes.iter().map(|tf| tf.as_str()).collect::<Vec<_>>(),
            "force": force,
        });

        debug!("调用形态分析服务: classes={}, force={}", classes_label, force);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ComputeProducer {
                classes: classes_label.clone(),
                status: 0,
                body: e.to_string(),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::ComputeProducer {
                classes: classes_label.clone(),
                status: status.as_u16(),
                body: e.to_string(),
            })?;

        if !status.is_success() {
            // 上游状态与 body 原样透传给调用方
            return Err(AppError::ComputeProducer {
                classes: classes_label,
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str::<PatternAnalysisOutput>(&text).map_err(|e| {
            AppError::ComputeProducer {
                classes: classes_label,
                status: status.as_u16(),
                body: format!("响应解析失败: {}; body={}", e, text),
            }
        })
    }
}
