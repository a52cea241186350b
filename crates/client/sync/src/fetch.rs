//! Fetching blocks and their transactions from the remote node.

use std::time::Duration;

use wc_gateway_client::{NodeError, NodeProvider};
use wp_chain::{ChainBlock, ChainTransaction};
use wp_utils::{stopwatch_end, PerfStopwatch};

const MAX_RETRY: u32 = 15;
const BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error(transparent)]
    Chain(#[from] wp_chain::ChainError),
}

/// Fetches a block by height along with the full body of every transaction
/// it contains. Transaction fetches run concurrently; `on_txs_in_flight` is
/// told how many are outstanding so the pool can surface progress.
pub async fn fetch_block_and_txs(
    node: &NodeProvider,
    height: u64,
    on_txs_in_flight: impl Fn(i64),
) -> Result<(ChainBlock, Vec<ChainTransaction>), FetchError> {
    let sw = PerfStopwatch::new();
    let block = retry(|| node.get_block_by_height(height), MAX_RETRY, BASE_DELAY).await?;

    let tx_ids = block.txs();
    on_txs_in_flight(tx_ids.len() as i64);
    let txs = futures::future::try_join_all(
        tx_ids.iter().map(|id| retry(|| node.get_transaction(id), MAX_RETRY, BASE_DELAY)),
    )
    .await;
    on_txs_in_flight(0);
    let txs = txs?;

    stopwatch_end!(sw, "fetching block {}: {:?}", height);
    Ok((block, txs))
}

/// Retries transient node errors with capped exponential backoff. A
/// not-found is never retried, it is the node telling us the answer.
pub async fn retry<F, Fut, T>(mut f: F, max_retries: u32, base_delay: Duration) -> Result<T, NodeError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, NodeError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(res) => return Ok(res),
            Err(err) if err.is_not_found() => break Err(err),
            Err(err) => {
                let delay = base_delay * 2_u32.pow(attempt.min(6));
                attempt += 1;
                if attempt > max_retries {
                    break Err(err);
                }
                tracing::warn!("The node has returned an error: {err:#}, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retry_gives_up_on_not_found_immediately() {
        let calls = AtomicU32::new(0);
        let res: Result<(), _> = retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(NodeError::NotFound("/block/height/99".to_string()))
            },
            3,
            Duration::from_millis(1),
        )
        .await;
        assert!(res.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let res = retry(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(NodeError::Status { status: reqwest_status(), body: "overloaded".to_string() })
                } else {
                    Ok(42)
                }
            },
            5,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(res.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    fn reqwest_status() -> reqwest::StatusCode {
        reqwest::StatusCode::SERVICE_UNAVAILABLE
    }
}
