
mod scenarios;

use std::sync::Arc;

use serde_json::json;
use wc_db::projector::project_block;
use wc_db::writer::Writer;
use wc_db::MemBackend;
use wp_chain::ChainBlock;

/// Seeds the store with a fully projected block, as if it had been imported.
pub async fn seed_block(backend: &Arc<MemBackend>, height: u64, hash: &str, parent: &str) {
    let block = ChainBlock::from_value(json!({
        "indep_hash": hash,
        "height": height,
        "previous_block": parent,
        "timestamp": 1_700_000_000 + height,
        "txs": [],
    }))
    .unwrap();
    let statements = project_block(&block, &[]).unwrap();
    Writer::new(backend.clone()).write_block(&statements).await.unwrap();
}

/// Seeds heights `0..=top`, hashes `h0..h<top>` chained in order.
pub async fn seed_chain(backend: &Arc<MemBackend>, top: u64) {
    for height in 0..=top {
        let parent = if height == 0 { String::new() } else { format!("h{}", height - 1) };
        seed_block(backend, height, &format!("h{height}"), &parent).await;
    }
}
