//! SQLite store integration tests
//!
//! Every test opens its own database file under a temp directory.

mod common;

use fmea_common::config::PersistenceConfig;
use fmea_common::db::{init_database, CommitPlan, SqliteStore, WorksheetStore};
use fmea_common::ids::IdMinter;
use fmea_common::migrate::to_atomic;
use fmea_common::model::{AnalysisKey, AtomicBatch, EntityKind, FailureLink};
use std::collections::BTreeSet;
use tempfile::TempDir;

async fn open_store(dir: &TempDir) -> SqliteStore {
    let pool = init_database(&dir.path().join("fmea.db"), &PersistenceConfig::default())
        .await
        .expect("database opens");
    SqliteStore::new(pool)
}

fn key(raw: &str) -> AnalysisKey {
    AnalysisKey::parse(raw).unwrap()
}

fn full_plan(key: &AnalysisKey) -> CommitPlan {
    let doc = common::brake_caliper();
    let batch = to_atomic(key, &doc, &mut IdMinter::sequential()).value;
    CommitPlan {
        key: key.clone(),
        replace: EntityKind::ALL.into_iter().collect(),
        batch,
        snapshot: Some(doc),
    }
}

#[tokio::test]
async fn test_commit_and_reload_preserves_order_and_values() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let key = key("PFM-DB1");

    let plan = full_plan(&key);
    let expected = plan.batch.clone();
    store.commit(plan).await.unwrap();

    let loaded = store.load_batch(&key).await.unwrap().unwrap();
    assert_eq!(loaded, expected);
    assert_eq!(loaded.risk_analyses[0].ap.map(|ap| ap.code()), Some("H"));
    assert_eq!(loaded.optimizations[0].new_detection.map(|r| r.get()), Some(3));

    let snapshot = store.load_snapshot(&key).await.unwrap().unwrap();
    assert_eq!(snapshot.project.unwrap().customer, "OEM");
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let key = key("PFM-DB2");

    {
        let store = open_store(&dir).await;
        store.commit(full_plan(&key)).await.unwrap();
        store.pool().close().await;
    }

    let store = open_store(&dir).await;
    let loaded = store.load_batch(&key).await.unwrap().unwrap();
    assert_eq!(loaded.failure_links.len(), 1);
}

#[tokio::test]
async fn test_partial_replace_leaves_other_kinds_alone() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let key = key("PFM-DB3");
    store.commit(full_plan(&key)).await.unwrap();

    // Replace only links, with none
    store
        .commit(CommitPlan {
            key: key.clone(),
            replace: BTreeSet::from([EntityKind::FailureLink]),
            batch: AtomicBatch::new(key.clone()),
            snapshot: None,
        })
        .await
        .unwrap();

    let loaded = store.load_batch(&key).await.unwrap().unwrap();
    assert!(loaded.failure_links.is_empty());
    assert_eq!(loaded.failure_modes.len(), 1);
    assert_eq!(loaded.risk_analyses.len(), 1);
    // Snapshot untouched when the plan carries none
    assert!(store.load_snapshot(&key).await.unwrap().is_some());
}

#[tokio::test]
async fn test_failed_commit_rolls_back_everything() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let key = key("PFM-DB4");
    store.commit(full_plan(&key)).await.unwrap();

    // Same triple twice violates the link uniqueness constraint mid-transaction
    let mut batch = AtomicBatch::new(key.clone());
    for id in ["LK-A", "LK-B"] {
        batch.failure_links.push(FailureLink {
            id: id.to_string(),
            fmea_id: key.clone(),
            fm_id: "FM-1".to_string(),
            fe_id: "FE-1".to_string(),
            fc_id: "FC-1".to_string(),
        });
    }
    let result = store
        .commit(CommitPlan {
            key: key.clone(),
            replace: BTreeSet::from([EntityKind::FailureMode, EntityKind::FailureLink]),
            batch,
            snapshot: None,
        })
        .await;
    assert!(result.is_err());

    let loaded = store.load_batch(&key).await.unwrap().unwrap();
    assert_eq!(loaded.failure_modes.len(), 1, "delete was rolled back");
    assert_eq!(loaded.failure_links[0].id, "LK-1");
}

#[tokio::test]
async fn test_delete_cascades_and_analyses_are_isolated() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let a = key("PFM-A");
    let b = key("PFM-B");
    store.commit(full_plan(&a)).await.unwrap();
    store.commit(full_plan(&b)).await.unwrap();

    let listed: Vec<String> = store
        .list_analyses()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.fmea_id.to_string())
        .collect();
    assert_eq!(listed, vec!["PFM-A", "PFM-B"]);

    assert!(store.delete_analysis(&a).await.unwrap());
    assert!(store.load_batch(&a).await.unwrap().is_none());
    assert!(store.load_snapshot(&a).await.unwrap().is_none());

    let orphans: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM fmea_failure_modes WHERE fmea_id = 'PFM-A'")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(orphans, 0);

    let untouched = store.load_batch(&b).await.unwrap().unwrap();
    assert_eq!(untouched.failure_modes.len(), 1);
}
