//! Executes one block's projected statements against the store.

use std::sync::Arc;

use crate::statement::BoundStatement;
use crate::{ExecProfile, StoreClient, StoreError};

/// Submits projected writes on the `full` profile. The statements of one
/// block are deliberately not wrapped in a logged batch: they fan out
/// concurrently and are joined, idempotence plus content-addressed keys
/// stand in for transactionality across crashes.
#[derive(Clone)]
pub struct Writer {
    store: Arc<dyn StoreClient>,
}

impl Writer {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    /// A block counts as imported only once every projected statement has
    /// resolved successfully.
    pub async fn write_block(&self, statements: &[BoundStatement]) -> Result<(), StoreError> {
        futures::future::try_join_all(
            statements.iter().map(|statement| self.store.execute(statement, ExecProfile::Full)),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemBackend;
    use crate::projector::project_block;
    use crate::table::Table;
    use serde_json::json;
    use wp_chain::{ChainBlock, ChainTransaction};

    fn sample() -> (ChainBlock, Vec<ChainTransaction>) {
        let block = ChainBlock::from_value(json!({
            "indep_hash": "h5",
            "height": 5,
            "previous_block": "h4",
            "timestamp": 1700000000,
            "txs": ["tx-a"],
        }))
        .unwrap();
        let tx = ChainTransaction::from_value(json!({
            "id": "tx-a",
            "owner": "o",
            "data_size": "256",
            "tags": [{"name": "App", "value": "X"}],
        }))
        .unwrap();
        (block, vec![tx])
    }

    #[tokio::test]
    async fn write_block_lands_in_every_projection() {
        let backend = MemBackend::open_for_testing();
        let writer = Writer::new(backend.clone());
        let (block, txs) = sample();

        writer.write_block(&project_block(&block, &txs).unwrap()).await.unwrap();

        assert_eq!(backend.row_count(Table::Block), 1);
        assert_eq!(backend.row_count(Table::BlockGqlAsc), 1);
        assert_eq!(backend.row_count(Table::BlockGqlDesc), 1);
        assert_eq!(backend.row_count(Table::Transaction), 1);
        assert_eq!(backend.row_count(Table::BlockByTxId), 1);
        assert_eq!(backend.row_count(Table::TxTag), 1);
        assert_eq!(backend.row_count(Table::TxOffset), 1);
    }

    #[tokio::test]
    async fn reimporting_a_block_is_idempotent() {
        let backend = MemBackend::open_for_testing();
        let writer = Writer::new(backend.clone());
        let (block, txs) = sample();
        let statements = project_block(&block, &txs).unwrap();

        writer.write_block(&statements).await.unwrap();
        let first: Vec<_> = Table::ALL.iter().map(|t| backend.rows(*t)).collect();

        writer.write_block(&statements).await.unwrap();
        let second: Vec<_> = Table::ALL.iter().map(|t| backend.rows(*t)).collect();

        assert_eq!(first, second);
    }
}
