//! Drives the first-run bulk import, gap repair, live polling and fork
//! recovery.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use futures::{stream, StreamExt};
use tokio::time::MissedTickBehavior;

use wc_db::projector::{GQL_ASC_PARTITION, GQL_DESC_PARTITION};
use wc_db::{
    CqlValue, DeleteBuilder, ExecProfile, SelectBuilder, StoreClient, StoreError, Table,
};
use wc_gateway_client::NodeProvider;
use wp_chain::ChainBlock;
use wp_utils::service::ServiceContext;
use wp_utils::trim_hash;

use crate::doctor::Doctor;
use crate::metrics::SyncMetrics;
use crate::pool::WorkerPool;

/// Poll interval of the live loop, in seconds.
pub const POLLTIME_DELAY_SECONDS: u64 = 5;

/// A reorg deeper than this is considered pathological and kills the
/// process rather than letting the parent walk monopolize it.
pub const FORK_DEPTH_LIMIT: u64 = 1024;

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub parallel_workers: usize,
    /// Development-only truncation: slice the unsynced list from this index.
    pub development_sync_length: Option<usize>,
    pub poll_interval: Duration,
    /// Stop once caught up instead of entering the polling loop.
    pub stop_on_sync: bool,
    pub fork_depth_limit: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 1,
            development_sync_length: None,
            poll_interval: Duration::from_secs(POLLTIME_DELAY_SECONDS),
            stop_on_sync: false,
            fork_depth_limit: FORK_DEPTH_LIMIT,
        }
    }
}

/// Read-only snapshot of the sync state, shared with the progress renderer
/// through atomics.
#[derive(Debug, Default)]
pub struct SyncStatus {
    pub top_height: AtomicU64,
    pub gateway_height: AtomicU64,
    pub current_height: AtomicU64,
    pub is_paused: AtomicBool,
    pub is_polling_started: AtomicBool,
}

pub struct SyncOrchestrator {
    node: Arc<NodeProvider>,
    store: Arc<dyn StoreClient>,
    pool: WorkerPool,
    doctor: Doctor,
    config: SyncConfig,
    status: Arc<SyncStatus>,
}

impl SyncOrchestrator {
    /// Spawns the worker pool (awaiting every ready handshake) and wires the
    /// orchestrator up.
    pub async fn new(
        node: Arc<NodeProvider>,
        store: Arc<dyn StoreClient>,
        config: SyncConfig,
    ) -> anyhow::Result<Self> {
        let pool = WorkerPool::spawn(config.parallel_workers, Arc::clone(&node), Arc::clone(&store)).await?;
        Ok(Self {
            doctor: Doctor::new(Arc::clone(&store)),
            node,
            store,
            pool,
            config,
            status: Arc::new(SyncStatus::default()),
        })
    }

    pub fn status(&self) -> Arc<SyncStatus> {
        Arc::clone(&self.status)
    }

    /// Catches the mirror up with the chain, then keeps it live. Any failed
    /// import surfaces as an error so the supervisor restarts the process
    /// from a known-safe state; the doctor repairs the rest on the way back
    /// up.
    pub async fn start_sync(&self, ctx: ServiceContext) -> anyhow::Result<()> {
        let hash_list = self.node.get_hash_list().await.context("Fetching the authoritative hash list")?;
        let top_height = hash_list.len() as u64;
        self.status.top_height.store(top_height, Ordering::Relaxed);
        tracing::info!("⛓  Chain height is {top_height}");

        let first_run = self.doctor.block_count().await.context("Probing the block table")? == 0;

        if !first_run && self.doctor.check_for_block_gaps(top_height).await? {
            let gaps = self.doctor.find_block_gaps(top_height).await?;
            if !gaps.is_empty() {
                tracing::info!("🩺 Repairing {} gap(s) in the block table", gaps.len());
                self.import_heights(gaps).await?;
            }
        }

        let unsynced: Vec<u64> = if first_run {
            (0..top_height).collect()
        } else {
            self.doctor
                .find_missing_blocks(&hash_list)
                .await
                .context("Diffing the store against the hash list")?
                .into_iter()
                .map(|block| block.height)
                .collect()
        };
        let unsynced = match self.config.development_sync_length {
            Some(from) => unsynced.get(from..).unwrap_or(&[]).to_vec(),
            None => unsynced,
        };

        if unsynced.is_empty() {
            tracing::info!("🥳 The mirror has caught up with the tip of the chain");
        } else {
            tracing::info!("⏳ {} block(s) to sync", unsynced.len());
            self.import_heights(unsynced).await?;
        }

        if self.config.stop_on_sync {
            tracing::info!("🌐 Reached stop-on-sync condition, not polling");
            return Ok(());
        }
        self.start_polling(ctx).await
    }

    /// Fans `import_block` out over the pool, dispatching in ascending
    /// height order with parallelism bounded by the worker count.
    /// Completions arrive out of order; idempotent, content-addressed
    /// writes make that irrelevant.
    async fn import_heights(&self, heights: Vec<u64>) -> anyhow::Result<()> {
        let total = heights.len();
        let mut metrics = SyncMetrics::register();
        let mut completed = 0usize;

        let mut imports = stream::iter(heights.into_iter().map(|height| self.pool.import_block(height)))
            .buffer_unordered(self.config.parallel_workers.max(1));
        while let Some(result) = imports.next().await {
            let height = result.context("Importing block")?;
            completed += 1;
            metrics.update();
            self.status.current_height.fetch_max(height, Ordering::Relaxed);
            self.status.gateway_height.fetch_max(height, Ordering::Relaxed);
            tracing::debug!("✨ Imported #{height}");
            if completed % 50 == 0 || completed == total {
                let eta = metrics.eta(total).map(|eta| format!(", ETA {eta:.0?}")).unwrap_or_default();
                tracing::info!(
                    "🔗 Sync is at {completed}/{total} [{:.2} blocks/s, {} txs in flight{eta}]",
                    metrics.counter.get_throughput(),
                    self.pool.txs_in_flight()
                );
            }
        }
        Ok(())
    }

    /// The live loop: wake every poll interval, compare the node's tip with
    /// ours, import or recover from a fork. Transient node trouble is logged
    /// and retried on the next tick.
    async fn start_polling(&self, ctx: ServiceContext) -> anyhow::Result<()> {
        self.status.is_polling_started.store(true, Ordering::Relaxed);
        tracing::info!("👂 Polling the node every {:?}", self.config.poll_interval);

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            if ctx.run_until_cancelled(interval.tick()).await.is_none() {
                tracing::info!("🌐 Sync process ended");
                return Ok(());
            }
            if self.status.is_paused.load(Ordering::Relaxed) {
                continue;
            }
            self.poll_once().await?;
        }
    }

    pub(crate) async fn poll_once(&self) -> anyhow::Result<()> {
        let info = match self.node.get_node_info().await {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!("Node info unavailable: {err:#}");
                return Ok(());
            }
        };

        let Some((top_hash, gateway_height)) = self.get_max_height_block().await? else {
            // Nothing mirrored yet, treat the tip as a plain import.
            self.import_tip(info.height, &info.current).await?;
            return Ok(());
        };
        self.status.gateway_height.store(gateway_height, Ordering::Relaxed);

        if info.current == top_hash {
            return Ok(());
        }

        let current_remote = match self.node.get_block_by_hash(&info.current).await {
            Ok(block) => block,
            Err(err) => {
                tracing::warn!("Could not fetch the remote tip {}: {err:#}", trim_hash(&info.current));
                return Ok(());
            }
        };

        // The parent of the remote tip must be our tip, otherwise the node
        // is on another branch.
        if current_remote.previous_block() != Some(top_hash.as_str()) {
            self.resolve_fork(current_remote).await
        } else {
            self.import_tip(info.height, &info.current).await
        }
    }

    async fn import_tip(&self, height: u64, hash: &str) -> anyhow::Result<()> {
        tracing::info!("📥 New tip #{height} ({})", trim_hash(hash));
        self.pool
            .import_block(height)
            .await
            .with_context(|| format!("Importing new tip #{height}"))?;
        self.status.current_height.fetch_max(height, Ordering::Relaxed);
        self.status.gateway_height.fetch_max(height, Ordering::Relaxed);
        Ok(())
    }

    /// Walks the remote parent chain back to the first ancestor we already
    /// mirror, rolls back everything above it, then re-imports the diverged
    /// heights. Polling is gated on the pause flag for the whole recovery so
    /// no tip import interleaves with the rollback.
    pub(crate) async fn resolve_fork(&self, tip: ChainBlock) -> anyhow::Result<()> {
        self.status.is_paused.store(true, Ordering::Relaxed);
        let result = self.resolve_fork_inner(tip).await;
        self.status.is_paused.store(false, Ordering::Relaxed);
        result
    }

    async fn resolve_fork_inner(&self, tip: ChainBlock) -> anyhow::Result<()> {
        let tip_hash = tip.indep_hash()?.to_string();
        let tip_height = tip.height()?;
        tracing::warn!("⚠️  Fork detected at tip #{tip_height} ({})", trim_hash(&tip_hash));

        let mut reimport = vec![tip_height];
        let mut block = tip;
        for _ in 0..self.config.fork_depth_limit {
            let parent_hash = block.previous_block().context("Fork walk reached a block without a parent")?;
            let parent = self
                .node
                .get_block_by_hash(parent_hash)
                .await
                .with_context(|| format!("Fetching fork ancestor {}", trim_hash(parent_hash)))?;
            let parent_height = parent.height()?;

            if self.block_exists(parent.indep_hash()?).await? {
                let deleted = self.delete_blocks_above(parent_height).await?;
                tracing::info!("🔀 Rolled back {deleted} block(s) above #{parent_height}");
                reimport.sort_unstable();
                self.import_heights(reimport).await?;
                return Ok(());
            }
            reimport.push(parent_height);
            block = parent;
        }
        bail!("Fork deeper than {} blocks, giving up", self.config.fork_depth_limit)
    }

    /// Local tip from `block_gql_desc` (single `gql2` partition, clustering
    /// already descending, `LIMIT 1`).
    pub(crate) async fn get_max_height_block(&self) -> Result<Option<(String, u64)>, StoreError> {
        let statement = SelectBuilder::new(Table::BlockGqlDesc)
            .columns(&["height", "indep_hash"])
            .and_where_eq("partition_id", GQL_DESC_PARTITION)
            .limit(1)
            .build();
        let rows = self.store.execute(&statement, ExecProfile::Fast).await?;
        Ok(rows
            .first()
            .and_then(|row| Some((row.text("indep_hash")?.to_string(), row.bigint("height")? as u64))))
    }

    async fn block_exists(&self, hash: &str) -> Result<bool, StoreError> {
        let statement =
            SelectBuilder::new(Table::Block).columns(&["height"]).and_where_eq("indep_hash", hash).build();
        Ok(!self.store.execute(&statement, ExecProfile::Fast).await?.is_empty())
    }

    /// Streams the block table and deletes every projection of every block
    /// above `height`. Rows are deleted only here, fork rollback is the one
    /// mutation the mirror knows.
    async fn delete_blocks_above(&self, height: u64) -> Result<usize, StoreError> {
        let scan = SelectBuilder::new(Table::Block).columns(&["indep_hash", "height"]).build();
        let mut doomed: Vec<(String, i64)> = Vec::new();
        self.store
            .each_row(&scan, ExecProfile::Fast, &mut |row| {
                if let (Some(hash), Some(block_height)) = (row.text("indep_hash"), row.bigint("height")) {
                    if block_height > height as i64 {
                        doomed.push((hash.to_string(), block_height));
                    }
                }
            })
            .await?;

        for (hash, block_height) in &doomed {
            for statement in rollback_statements(hash, *block_height) {
                self.store.execute(&statement, ExecProfile::Fast).await?;
            }
        }
        Ok(doomed.len())
    }
}

fn rollback_statements(hash: &str, height: i64) -> Vec<wc_db::BoundStatement> {
    vec![
        DeleteBuilder::new(Table::Block).and_where_eq("indep_hash", hash).build(),
        DeleteBuilder::new(Table::BlockGqlAsc)
            .and_where_eq("partition_id", GQL_ASC_PARTITION)
            .and_where_eq("height", CqlValue::Bigint(height))
            .and_where_eq("indep_hash", hash)
            .build(),
        DeleteBuilder::new(Table::BlockGqlDesc)
            .and_where_eq("partition_id", GQL_DESC_PARTITION)
            .and_where_eq("height", CqlValue::Bigint(height))
            .and_where_eq("indep_hash", hash)
            .build(),
        DeleteBuilder::new(Table::BlockHeightByBlockHash).and_where_eq("block_hash", hash).build(),
        DeleteBuilder::new(Table::Poa).and_where_eq("block_hash", hash).build(),
    ]
}
