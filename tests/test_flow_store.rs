use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use flow_radar::app_config::redis::flow_key;
use flow_radar::cache::{KvBackend, MemoryKvBackend, WriteOp};
use flow_radar::error::AppError;
use flow_radar::market::model::flow::{rank_cmp, FlowRecord};
use flow_radar::market::store::PriorityFlowStore;
use flow_radar::time_util::{Clock, FixedClock};

fn record(symbol: &str, score: f64) -> FlowRecord {
    FlowRecord {
        symbol: symbol.to_string(),
        price: 100.0,
        volume_24h: 1_000_000.0,
        net_inflow: 50_000.0,
        priority_score: score,
        manipulation_confidence: 0.0,
        abnormality_score: 0.0,
        open_interest_value: 0.0,
        updated_at: 0,
    }
}

fn setup() -> (PriorityFlowStore, Arc<MemoryKvBackend>, Arc<FixedClock>) {
    let backend = Arc::new(MemoryKvBackend::new());
    let clock = Arc::new(FixedClock::at(
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 3, 0).unwrap(),
    ));
    let store = PriorityFlowStore::new(backend.clone(), clock.clone());
    (store, backend, clock)
}

#[tokio::test]
async fn test_upsert_bounded_and_sorted() -> Result<()> {
    let (store, _backend, clock) = setup();

    let batch: Vec<FlowRecord> = (0..15)
        .map(|i| record(&format!("COIN{}-USDT-SWAP", i), i as f64))
        .collect();
    let summary = store.upsert_batch(batch).await?;
    assert_eq!(summary.added, 15);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.removed, 5);

    let all = store.get_all().await;
    assert_eq!(all.len(), 10);
    // 排名单调不增
    for pair in all.windows(2) {
        assert_ne!(rank_cmp(&pair[0], &pair[1]), Ordering::Greater);
    }
    assert_eq!(all[0].priority_score, 14.0);
    // 全部重打了落库时间戳
    assert!(all.iter().all(|r| r.updated_at == clock.now_millis()));
    Ok(())
}

#[tokio::test]
async fn test_upsert_replaces_wholesale() -> Result<()> {
    let (store, _backend, _clock) = setup();

    let mut first = record("BTC-USDT-SWAP", 5.0);
    first.manipulation_confidence = 0.9;
    first.net_inflow = 123.0;
    store.upsert_batch(vec![first]).await?;

    // 同 symbol 再次摄入：整条替换，不做逐字段合并
    let second = record("BTC-USDT-SWAP", 7.0);
    let summary = store.upsert_batch(vec![second]).await?;
    assert_eq!(summary.added, 0);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.removed, 0);

    let all = store.get_all().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].priority_score, 7.0);
    assert_eq!(all[0].manipulation_confidence, 0.0);
    assert_eq!(all[0].net_inflow, 50_000.0);
    Ok(())
}

#[tokio::test]
async fn test_eviction_only_removes_lowest_ranked_excess() -> Result<()> {
    let (store, _backend, _clock) = setup();

    let seed: Vec<FlowRecord> = (0..10)
        .map(|i| record(&format!("S{}-USDT-SWAP", i), 10.0 + i as f64))
        .collect();
    store.upsert_batch(seed).await?;

    // 已有 symbol 降分：不会挤掉任何更高排名的已有记录
    let summary = store
        .upsert_batch(vec![record("S0-USDT-SWAP", 1.0)])
        .await?;
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.removed, 0);
    let all = store.get_all().await;
    assert_eq!(all.len(), 10);
    assert!(all.iter().any(|r| r.symbol == "S0-USDT-SWAP"));

    // 新 symbol 分数垫底：被挤出的只能是它自己
    let summary = store
        .upsert_batch(vec![record("NEW-USDT-SWAP", 0.5)])
        .await?;
    assert_eq!(summary.added, 1);
    assert_eq!(summary.removed, 1);
    let all = store.get_all().await;
    assert_eq!(all.len(), 10);
    assert!(!all.iter().any(|r| r.symbol == "NEW-USDT-SWAP"));
    for i in 0..10 {
        let symbol = format!("S{}-USDT-SWAP", i);
        assert!(all.iter().any(|r| r.symbol == symbol));
    }
    Ok(())
}

#[tokio::test]
async fn test_invalid_batches_are_rejected() {
    let (store, _backend, _clock) = setup();

    // 批次内重复 symbol
    let err = store
        .upsert_batch(vec![
            record("BTC-USDT-SWAP", 1.0),
            record("BTC-USDT-SWAP", 2.0),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    // 空 symbol
    let err = store.upsert_batch(vec![record("  ", 1.0)]).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    // 非有限评分
    let err = store
        .upsert_batch(vec![record("ETH-USDT-SWAP", f64::NAN)])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_get_all_falls_back_to_rank_index() -> Result<()> {
    let (store, backend, _clock) = setup();

    store
        .upsert_batch(vec![
            record("BTC-USDT-SWAP", 9.0),
            record("ETH-USDT-SWAP", 7.0),
            record("SOL-USDT-SWAP", 8.0),
        ])
        .await?;

    // 模拟整合快照丢失（过期/被删），排名索引仍在
    backend
        .exec_atomic(vec![WriteOp::Del {
            key: flow_key::TOP.to_string(),
        }])
        .await?;

    let all = store.get_all().await;
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].symbol, "BTC-USDT-SWAP");
    assert_eq!(all[1].symbol, "SOL-USDT-SWAP");
    assert_eq!(all[2].symbol, "ETH-USDT-SWAP");
    Ok(())
}

#[tokio::test]
async fn test_empty_store_is_valid_state() {
    let (store, _backend, _clock) = setup();
    assert!(store.get_all().await.is_empty());
    assert!(store.health_check().await);
}

#[tokio::test]
async fn test_malformed_snapshot_degrades_to_index() -> Result<()> {
    let (store, backend, _clock) = setup();

    store
        .upsert_batch(vec![record("BTC-USDT-SWAP", 9.0)])
        .await?;

    // 快照被写坏：读路径视为未命中，从索引重建而不是报错
    backend
        .exec_atomic(vec![WriteOp::SetEx {
            key: flow_key::TOP.to_string(),
            value: "{not-json".to_string(),
            ttl_secs: 3600,
        }])
        .await?;

    let all = store.get_all().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].symbol, "BTC-USDT-SWAP");
    Ok(())
}
