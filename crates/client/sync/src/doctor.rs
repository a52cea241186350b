//! Detects gaps and divergence between the local mirror and the
//! authoritative hash list.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use wc_db::{ExecProfile, SelectBuilder, StoreClient, StoreError, Table};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingBlock {
    pub height: u64,
    pub hash: String,
}

pub struct Doctor {
    store: Arc<dyn StoreClient>,
}

impl Doctor {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    pub async fn block_count(&self) -> Result<u64, StoreError> {
        let statement = SelectBuilder::new(Table::Block).count().build();
        let rows = self.store.execute(&statement, ExecProfile::Fast).await?;
        Ok(rows.first().and_then(|row| row.bigint("count")).unwrap_or(0) as u64)
    }

    /// Cheap existence probe: are there fewer local blocks than the chain is
    /// tall?
    pub async fn check_for_block_gaps(&self, top_height: u64) -> Result<bool, StoreError> {
        Ok(self.block_count().await? < top_height)
    }

    /// Heights the hash list knows but the local store does not, ascending.
    pub async fn find_block_gaps(&self, top_height: u64) -> Result<Vec<u64>, StoreError> {
        let statement = SelectBuilder::new(Table::Block).columns(&["height"]).build();
        let mut present = HashSet::new();
        self.store
            .each_row(&statement, ExecProfile::Fast, &mut |row| {
                if let Some(height) = row.bigint("height") {
                    present.insert(height as u64);
                }
            })
            .await?;
        Ok((0..top_height).filter(|height| !present.contains(height)).collect())
    }

    /// Diffs the full `block` table against the hash list. A local row only
    /// discharges an entry when both height and hash match, so blocks left
    /// over from an unresolved fork show up as missing and get re-imported.
    pub async fn find_missing_blocks(&self, hash_list: &[String]) -> Result<Vec<MissingBlock>, StoreError> {
        let mut remaining: HashMap<u64, &String> =
            hash_list.iter().enumerate().map(|(height, hash)| (height as u64, hash)).collect();

        let statement = SelectBuilder::new(Table::Block).columns(&["height", "indep_hash"]).build();
        self.store
            .each_row(&statement, ExecProfile::Fast, &mut |row| {
                if let (Some(height), Some(hash)) = (row.bigint("height"), row.text("indep_hash")) {
                    let height = height as u64;
                    if remaining.get(&height).is_some_and(|expected| expected.as_str() == hash) {
                        remaining.remove(&height);
                    }
                }
            })
            .await?;

        let mut missing: Vec<MissingBlock> =
            remaining.into_iter().map(|(height, hash)| MissingBlock { height, hash: hash.clone() }).collect();
        missing.sort_by_key(|block| block.height);
        Ok(missing)
    }
}
