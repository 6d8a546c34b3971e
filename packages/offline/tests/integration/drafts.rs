use std::time::Duration;

use offline::KeyValueEngine;
use serde_json::json;

use crate::support::{open_drafts, setup};

#[tokio::test]
async fn drafts_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let window = Duration::from_secs(3600);
    {
        let drafts = open_drafts(&dir, 0, window).await;
        drafts
            .put("J1", json!({"notes": "gutter loose", "score": 3}))
            .await
            .unwrap();
    }

    let drafts = open_drafts(&dir, 0, window).await;
    assert_eq!(
        drafts.get("J1").await.unwrap(),
        Some(json!({"notes": "gutter loose", "score": 3}))
    );
    assert_eq!(drafts.list_known_keys().await.unwrap(), vec!["J1"]);
}

#[tokio::test]
async fn delete_then_get_is_absent() {
    let stores = setup().await;
    stores.drafts.put("J1", json!({"a": 1})).await.unwrap();

    stores.drafts.delete("J1").await.unwrap();
    stores.drafts.delete("J1").await.unwrap();

    assert_eq!(stores.drafts.get("J1").await.unwrap(), None);
    assert!(stores.drafts.list_known_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn quota_exhaustion_is_reported_after_one_retry() {
    let dir = tempfile::tempdir().unwrap();
    let drafts = open_drafts(&dir, 256, Duration::from_secs(3600)).await;

    let err = drafts
        .put("J1", json!({"notes": "x".repeat(512)}))
        .await
        .unwrap_err();

    assert!(err.is_capacity());
    let stats = drafts.stats();
    assert_eq!(stats.capacity_sweeps, 1);
    assert_eq!(stats.capacity_retries, 1);
    assert_eq!(drafts.get("J1").await.unwrap(), None);
    assert!(drafts.engine().usage_bytes().await <= 256);
}

#[tokio::test]
async fn sweep_with_zero_window_clears_everything() {
    let stores = setup().await;
    stores.drafts.put("J1", json!({})).await.unwrap();
    stores.drafts.put("J2", json!({})).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let sweeper = offline::RetentionSweeper::new(Duration::ZERO);
    let report = sweeper.sweep_drafts(&stores.drafts).await.unwrap();

    assert_eq!(report.removed, 2);
    assert!(stores.drafts.list_known_keys().await.unwrap().is_empty());
}
