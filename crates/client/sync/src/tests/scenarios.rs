use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use serde_json::json;

use wc_db::{MemBackend, Table};
use wp_utils::service::ServiceContext;

use crate::doctor::Doctor;
use crate::orchestrator::{SyncConfig, SyncOrchestrator};
use crate::tests::node_mock::{node_mock, NodeMock};
use crate::tests::{seed_block, seed_chain};

fn caught_up_config(parallel_workers: usize) -> SyncConfig {
    SyncConfig { parallel_workers, stop_on_sync: true, ..Default::default() }
}

fn heights(backend: &Arc<MemBackend>, table: Table) -> Vec<i64> {
    backend.rows(table).iter().filter_map(|row| row.bigint("height")).collect()
}

#[rstest]
#[tokio::test]
async fn fresh_sync_imports_the_whole_hash_list(node_mock: NodeMock) {
    let mock = node_mock;
    mock.mock_hash_list(&["h0", "h1", "h2"]);
    mock.mock_block(0, "h0", "", &[]);
    mock.mock_block(1, "h1", "h0", &[]);
    mock.mock_block(2, "h2", "h1", &[]);

    let backend = MemBackend::open_for_testing();
    let orchestrator =
        SyncOrchestrator::new(mock.client(), backend.clone(), caught_up_config(2)).await.unwrap();
    orchestrator.start_sync(ServiceContext::new()).await.unwrap();

    assert_eq!(backend.row_count(Table::Block), 3);
    assert_eq!(heights(&backend, Table::BlockGqlAsc), vec![0, 1, 2]);
    assert_eq!(heights(&backend, Table::BlockGqlDesc), vec![2, 1, 0]);
    assert_eq!(orchestrator.status().top_height.load(Ordering::Relaxed), 3);
    assert_eq!(orchestrator.status().gateway_height.load(Ordering::Relaxed), 2);

    let hash_list: Vec<String> = ["h0", "h1", "h2"].iter().map(|s| s.to_string()).collect();
    assert!(Doctor::new(backend.clone()).find_missing_blocks(&hash_list).await.unwrap().is_empty());
}

#[tokio::test]
async fn resyncing_a_synced_store_is_a_no_op() {
    let mock = NodeMock::new();
    mock.mock_hash_list(&["h0", "h1"]);
    mock.mock_block(0, "h0", "", &[]);
    mock.mock_block(1, "h1", "h0", &[]);

    let backend = MemBackend::open_for_testing();
    let orchestrator =
        SyncOrchestrator::new(mock.client(), backend.clone(), caught_up_config(1)).await.unwrap();
    orchestrator.start_sync(ServiceContext::new()).await.unwrap();
    let snapshot: Vec<_> = Table::ALL.iter().map(|table| backend.rows(*table)).collect();

    orchestrator.start_sync(ServiceContext::new()).await.unwrap();
    let resynced: Vec<_> = Table::ALL.iter().map(|table| backend.rows(*table)).collect();
    assert_eq!(snapshot, resynced);
}

#[rstest]
#[tokio::test]
async fn gap_repair_fills_missing_heights(node_mock: NodeMock) {
    let mock = node_mock;
    mock.mock_hash_list(&["h0", "h1", "h2", "h3", "h4"]);
    mock.mock_block(2, "h2", "h1", &[]);

    let backend = MemBackend::open_for_testing();
    for height in [0u64, 1, 3, 4] {
        let parent = if height == 0 { String::new() } else { format!("h{}", height - 1) };
        seed_block(&backend, height, &format!("h{height}"), &parent).await;
    }
    assert_eq!(Doctor::new(backend.clone()).find_block_gaps(5).await.unwrap(), vec![2]);

    let orchestrator =
        SyncOrchestrator::new(mock.client(), backend.clone(), caught_up_config(1)).await.unwrap();
    orchestrator.start_sync(ServiceContext::new()).await.unwrap();

    assert_eq!(heights(&backend, Table::BlockGqlAsc), vec![0, 1, 2, 3, 4]);
    assert!(Doctor::new(backend.clone()).find_block_gaps(5).await.unwrap().is_empty());
}

#[tokio::test]
async fn development_sync_length_truncates_the_first_run() {
    let mock = NodeMock::new();
    mock.mock_hash_list(&["h0", "h1", "h2", "h3", "h4"]);
    mock.mock_block(3, "h3", "h2", &[]);
    mock.mock_block(4, "h4", "h3", &[]);

    let backend = MemBackend::open_for_testing();
    let config = SyncConfig { development_sync_length: Some(3), ..caught_up_config(1) };
    let orchestrator = SyncOrchestrator::new(mock.client(), backend.clone(), config).await.unwrap();
    orchestrator.start_sync(ServiceContext::new()).await.unwrap();

    // The first dispatched height is the slice start.
    assert_eq!(heights(&backend, Table::BlockGqlAsc), vec![3, 4]);
}

#[tokio::test]
async fn transactions_fan_out_into_every_projection() {
    let mock = NodeMock::new();
    mock.mock_hash_list(&["h0"]);
    mock.mock_block(0, "h0", "", &["tx-a", "tx-b"]);
    mock.mock_tx("tx-a", "512", json!([{"name": "App", "value": "X"}, {"name": "Type", "value": "tx"}]));
    mock.mock_tx("tx-b", "0", json!([]));

    let backend = MemBackend::open_for_testing();
    let orchestrator =
        SyncOrchestrator::new(mock.client(), backend.clone(), caught_up_config(1)).await.unwrap();
    orchestrator.start_sync(ServiceContext::new()).await.unwrap();

    assert_eq!(backend.row_count(Table::Transaction), 2);
    // Referential closure: every tx points back at its block.
    let by_tx = backend.rows(Table::BlockByTxId);
    assert_eq!(by_tx.len(), 2);
    assert!(by_tx.iter().all(|row| row.text("block_hash") == Some("h0")));
    // Tag completeness: two tag rows for tx-a, none for tx-b.
    assert_eq!(backend.row_count(Table::TxTag), 2);
    // Offset row only for the data-carrying transaction.
    let offsets = backend.rows(Table::TxOffset);
    assert_eq!(offsets.len(), 1);
    assert_eq!(offsets[0].text("tx_id"), Some("tx-a"));

    assert!(!orchestrator.status().is_paused.load(Ordering::Relaxed));
}

#[tokio::test]
async fn a_failed_import_is_fatal() {
    let mock = NodeMock::new();
    mock.mock_hash_list(&["h0", "h1"]);
    mock.mock_block(0, "h0", "", &[]);
    mock.mock_block_not_found(1);

    let backend = MemBackend::open_for_testing();
    let orchestrator =
        SyncOrchestrator::new(mock.client(), backend.clone(), caught_up_config(2)).await.unwrap();
    let err = orchestrator.start_sync(ServiceContext::new()).await.unwrap_err();
    assert!(format!("{err:#}").contains("Importing block"));
}

#[tokio::test]
async fn incremental_tip_is_imported_when_the_parent_matches() {
    let mock = NodeMock::new();
    mock.mock_info(10, "h10");
    mock.mock_block(10, "h10", "h9", &[]);

    let backend = MemBackend::open_for_testing();
    seed_chain(&backend, 9).await;

    let orchestrator =
        SyncOrchestrator::new(mock.client(), backend.clone(), caught_up_config(1)).await.unwrap();
    orchestrator.poll_once().await.unwrap();

    assert_eq!(backend.row_count(Table::Block), 11);
    assert_eq!(orchestrator.status().gateway_height.load(Ordering::Relaxed), 10);
    let (top_hash, top_height) = orchestrator.get_max_height_block().await.unwrap().unwrap();
    assert_eq!((top_hash.as_str(), top_height), ("h10", 10));
}

#[tokio::test]
async fn an_unchanged_tip_leaves_the_store_alone() {
    let mock = NodeMock::new();
    mock.mock_info(9, "h9");

    let backend = MemBackend::open_for_testing();
    seed_chain(&backend, 9).await;

    let orchestrator =
        SyncOrchestrator::new(mock.client(), backend.clone(), caught_up_config(1)).await.unwrap();
    orchestrator.poll_once().await.unwrap();

    assert_eq!(backend.row_count(Table::Block), 10);
}

#[tokio::test]
async fn an_unreachable_node_is_not_fatal_to_polling() {
    // No /info mock mounted: the poll logs and waits for the next tick.
    let mock = NodeMock::new();
    let backend = MemBackend::open_for_testing();
    seed_chain(&backend, 1).await;

    let orchestrator =
        SyncOrchestrator::new(mock.client(), backend.clone(), caught_up_config(1)).await.unwrap();
    orchestrator.poll_once().await.unwrap();
    assert_eq!(backend.row_count(Table::Block), 2);
}

#[tokio::test]
async fn polling_stops_on_cancellation() {
    let mock = NodeMock::new();
    mock.mock_hash_list(&["h0"]);
    mock.mock_info(0, "h0");
    mock.mock_block(0, "h0", "", &[]);

    let backend = MemBackend::open_for_testing();
    let config = SyncConfig { poll_interval: Duration::from_millis(20), ..Default::default() };
    let orchestrator = SyncOrchestrator::new(mock.client(), backend.clone(), config).await.unwrap();
    let status = orchestrator.status();

    let ctx = ServiceContext::new();
    let handle = {
        let ctx = ctx.branch();
        tokio::spawn(async move { orchestrator.start_sync(ctx).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(status.is_polling_started.load(Ordering::Relaxed));
    ctx.cancel_global();

    handle.await.unwrap().unwrap();
}
