//! One-shot readiness latch between the listener and the connector.
//!
//! Both halves are consumed on use, so the listener can release at most
//! once and the connector can wait at most once.

use crate::{Error, Result};
use std::net::SocketAddr;
use tokio::sync::oneshot;

/// Released by the listener once its bind has completed.
#[derive(Debug)]
pub struct ReadySignal(oneshot::Sender<SocketAddr>);

/// Awaited by the connector before its first connect attempt.
#[derive(Debug)]
pub struct ReadyWaiter(oneshot::Receiver<SocketAddr>);

/// Create a connected signal/waiter pair.
pub fn readiness_latch() -> (ReadySignal, ReadyWaiter) {
    let (tx, rx) = oneshot::channel();
    (ReadySignal(tx), ReadyWaiter(rx))
}

impl ReadySignal {
    /// Publish the address the listener actually bound (relevant for port 0).
    pub fn release(self, bound: SocketAddr) {
        if self.0.send(bound).is_err() {
            tracing::debug!(%bound, "readiness released with nobody waiting");
        }
    }
}

impl ReadyWaiter {
    /// Suspend until the listener is bound. Fails with
    /// [`Error::ListenerAborted`] if the signal is dropped unreleased.
    pub async fn wait(self) -> Result<SocketAddr> {
        self.0.await.map_err(|_| Error::ListenerAborted)
    }
}
