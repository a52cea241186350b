//! Cooperative cancellation shared by every long-running service loop.
//!
//! All suspension points in the sync engine (node HTTP calls, store
//! executions, poll timers, worker channels) race against the context's
//! cancellation token, so a shutdown request drains cleanly instead of
//! aborting mid-import.

use std::pin::pin;

use futures::Future;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct ServiceContext {
    token: CancellationToken,
}

impl ServiceContext {
    pub fn new() -> Self {
        Self { token: CancellationToken::new() }
    }

    /// Resolves when a shutdown has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Request a process-wide shutdown.
    pub fn cancel_global(&self) {
        self.token.cancel()
    }

    /// A child context, cancelled when the parent is.
    pub fn branch(&self) -> Self {
        Self { token: self.token.child_token() }
    }

    /// Runs `future` to completion unless a shutdown is requested first.
    /// Returns `None` on shutdown.
    pub async fn run_until_cancelled<T>(&self, future: impl Future<Output = T>) -> Option<T> {
        let future = pin!(future);
        tokio::select! {
            _ = self.token.cancelled() => None,
            res = future => Some(res),
        }
    }
}
