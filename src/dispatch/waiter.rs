//! Pending waiters - one-shot slots resolved by the next publish

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use super::engine::Shared;
use crate::error::{RxnError, RxnResult};

/// Waiters in registration order
pub(crate) struct WaiterQueue<P> {
    next_id: u64,
    pending: Vec<(u64, oneshot::Sender<P>)>,
}

impl<P> WaiterQueue<P> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            pending: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self) -> (u64, oneshot::Receiver<P>) {
        let id = self.next_id;
        self.next_id += 1;
        let (tx, rx) = oneshot::channel();
        self.pending.push((id, tx));
        (id, rx)
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        match self.pending.iter().position(|(pending_id, _)| *pending_id == id) {
            Some(index) => {
                self.pending.remove(index);
                true
            }
            None => false,
        }
    }

    /// Take every pending waiter, leaving the queue empty for the next round
    pub(crate) fn drain(&mut self) -> Vec<(u64, oneshot::Sender<P>)> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

/// A registered wait for the next publish
///
/// The slot is registered when the `Waiter` is created, so a publish that
/// happens before it is awaited still resolves it. Dropping an unresolved
/// `Waiter` withdraws it from the engine.
pub struct Waiter<P> {
    id: u64,
    rx: oneshot::Receiver<P>,
    shared: Weak<Shared<P>>,
}

impl<P> Waiter<P> {
    pub(crate) fn new(id: u64, rx: oneshot::Receiver<P>, shared: Weak<Shared<P>>) -> Self {
        Self { id, rx, shared }
    }

    /// Await the payload of the next publish
    ///
    /// `Duration::ZERO` waits indefinitely. On timeout this waiter alone is
    /// withdrawn and `RxnError::Timeout` carries `timeout`.
    pub async fn recv(mut self, timeout: Duration) -> RxnResult<P> {
        debug!(id = self.id, ?timeout, "Waiter::recv: called");
        let outcome = if timeout.is_zero() {
            Ok((&mut self.rx).await)
        } else {
            tokio::time::timeout(timeout, &mut self.rx).await
        };

        match outcome {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(RxnError::Disposed),
            Err(_) => {
                debug!(id = self.id, ?timeout, "Waiter::recv: timed out");
                if let Some(shared) = self.shared.upgrade() {
                    shared.counters.record_timeout();
                }
                Err(RxnError::Timeout { timeout })
            }
        }
    }
}

impl<P> Drop for Waiter<P> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.waiters.lock().remove(self.id);
        }
    }
}
