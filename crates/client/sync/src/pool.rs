//! Long-lived pool of import workers.
//!
//! Workers are tokio tasks fed by one bounded job channel whose capacity is
//! the worker count, which is both the "any free worker" routing policy and
//! the backpressure bound. Each worker fetches the block from the remote
//! node, projects its rows and submits the writes; typed progress messages
//! flow back to the pool on a separate channel consumed by a listener task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

use wc_db::projector::{project_block, ProjectionError};
use wc_db::writer::Writer;
use wc_db::{StoreClient, StoreError};
use wc_gateway_client::NodeProvider;
use wp_utils::AbortOnDrop;

use crate::fetch::{fetch_block_and_txs, FetchError};

/// Messages a worker sends to the pool.
#[derive(Debug)]
pub enum WorkerMsg {
    Ready { worker_id: usize },
    LogInfo { worker_id: usize, message: String },
    BlockNew { worker_id: usize, height: u64 },
    TxsInFlight { worker_id: usize, count: i64 },
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Worker pool is shut down")]
    PoolClosed,
}

struct ImportJob {
    height: u64,
    ack: oneshot::Sender<Result<u64, WorkerError>>,
}

pub struct WorkerPool {
    job_tx: mpsc::Sender<ImportJob>,
    tx_in_flight: Arc<Mutex<HashMap<usize, i64>>>,
    _listener: AbortOnDrop<()>,
    _workers: Vec<AbortOnDrop<()>>,
}

impl WorkerPool {
    /// Starts `worker_count` workers and waits for every ready handshake
    /// before accepting jobs.
    pub async fn spawn(
        worker_count: usize,
        node: Arc<NodeProvider>,
        store: Arc<dyn StoreClient>,
    ) -> anyhow::Result<Self> {
        let worker_count = worker_count.max(1);
        let (job_tx, job_rx) = mpsc::channel(worker_count);
        let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));
        let (msg_tx, mut msg_rx) = mpsc::unbounded_channel();

        let writer = Writer::new(store);
        let workers = (0..worker_count)
            .map(|worker_id| {
                AbortOnDrop::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&node),
                    writer.clone(),
                    Arc::clone(&job_rx),
                    msg_tx.clone(),
                ))
            })
            .collect();
        drop(msg_tx);

        let mut ready = 0;
        while ready < worker_count {
            match msg_rx.recv().await {
                Some(WorkerMsg::Ready { worker_id }) => {
                    tracing::debug!("Worker {worker_id} is ready");
                    ready += 1;
                }
                Some(other) => tracing::debug!("Dropping early worker message: {other:?}"),
                None => anyhow::bail!("Worker pool died during startup"),
            }
        }
        tracing::info!("👷 {worker_count} import worker(s) ready");

        let tx_in_flight = Arc::new(Mutex::new(HashMap::new()));
        let listener = AbortOnDrop::spawn(listen(msg_rx, Arc::clone(&tx_in_flight)));

        Ok(Self { job_tx, tx_in_flight, _listener: listener, _workers: workers })
    }

    /// Routes an import to the next free worker and waits for its ack.
    pub async fn import_block(&self, height: u64) -> Result<u64, WorkerError> {
        let (ack, ack_rx) = oneshot::channel();
        self.job_tx.send(ImportJob { height, ack }).await.map_err(|_| WorkerError::PoolClosed)?;
        ack_rx.await.map_err(|_| WorkerError::PoolClosed)?
    }

    /// Transactions currently being fetched across all workers.
    pub fn txs_in_flight(&self) -> i64 {
        let tx_in_flight = self.tx_in_flight.lock().expect("poisoned lock");
        tx_in_flight.values().fold(0i64, |acc, count| acc.saturating_add(*count))
    }
}

async fn worker_loop(
    worker_id: usize,
    node: Arc<NodeProvider>,
    writer: Writer,
    job_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<ImportJob>>>,
    msg_tx: mpsc::UnboundedSender<WorkerMsg>,
) {
    let _ = msg_tx.send(WorkerMsg::Ready { worker_id });
    loop {
        // Only one idle worker holds the receiver at a time; whichever gets
        // the lock next is the "any free" routing policy.
        let job = {
            let mut job_rx = job_rx.lock().await;
            job_rx.recv().await
        };
        let Some(ImportJob { height, ack }) = job else { break };

        let result = import_one(worker_id, height, &node, &writer, &msg_tx).await;
        match &result {
            Ok(height) => {
                let _ = msg_tx.send(WorkerMsg::BlockNew { worker_id, height: *height });
            }
            Err(err) => {
                let _ = msg_tx.send(WorkerMsg::LogInfo {
                    worker_id,
                    message: format!("Import of block {height} failed: {err:#}"),
                });
            }
        }
        let _ = ack.send(result);
    }
}

async fn import_one(
    worker_id: usize,
    height: u64,
    node: &NodeProvider,
    writer: &Writer,
    msg_tx: &mpsc::UnboundedSender<WorkerMsg>,
) -> Result<u64, WorkerError> {
    let (block, txs) = fetch_block_and_txs(node, height, |count| {
        let _ = msg_tx.send(WorkerMsg::TxsInFlight { worker_id, count });
    })
    .await?;
    let statements = project_block(&block, &txs)?;
    writer.write_block(&statements).await?;
    Ok(height)
}

async fn listen(mut msg_rx: mpsc::UnboundedReceiver<WorkerMsg>, tx_in_flight: Arc<Mutex<HashMap<usize, i64>>>) {
    while let Some(msg) = msg_rx.recv().await {
        match msg {
            WorkerMsg::Ready { worker_id } => {
                // Handshakes are consumed at spawn; a late one is dropped.
                tracing::debug!("Dropping unexpected ready message from worker {worker_id}");
            }
            WorkerMsg::LogInfo { worker_id, message } => tracing::info!("[worker {worker_id}] {message}"),
            WorkerMsg::BlockNew { worker_id, height } => {
                tracing::debug!("Worker {worker_id} imported block {height}")
            }
            WorkerMsg::TxsInFlight { worker_id, count } => {
                tx_in_flight.lock().expect("poisoned lock").insert(worker_id, count);
            }
        }
    }
}
