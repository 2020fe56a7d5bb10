//! Dispatch Engine - the publish/subscribe primitive under every reactive type
//!
//! A publish pass runs in two phases:
//!
//! 1. Synchronous subscribers, in registration order, over a snapshot of the
//!    registry. Subscribers added during the pass wait for the next publish;
//!    subscribers removed during the pass are skipped; subscribers whose owner
//!    is dead are skipped and pruned once the pass is over.
//! 2. Pending waiters, in registration order, each receiving a clone of the
//!    payload. The waiter set is emptied before any waiter resumes.
//!
//! Waiters resume on their own task after `publish` has returned, so code
//! continuing from `wait` sees fully settled state and may publish again.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, trace};

use super::metrics::{DispatchCounters, DispatchMetrics};
use super::registry::{Callback, Handle, HandleAllocator, SubscriberRegistry, Subscription};
use super::waiter::{Waiter, WaiterQueue};
use crate::error::RxnResult;
use crate::owner::OwnerRef;

pub(crate) struct Shared<P> {
    pub(crate) registry: Mutex<SubscriberRegistry<P>>,
    pub(crate) waiters: Mutex<WaiterQueue<P>>,
    pub(crate) counters: DispatchCounters,
}

/// Generic event dispatch engine over payload type `P`
///
/// Cloning yields another handle to the same engine.
pub struct Dispatcher<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for Dispatcher<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P> std::fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("subscribers", &self.shared.registry.lock().len())
            .field("pending_waiters", &self.shared.waiters.lock().len())
            .finish()
    }
}

impl<P: Clone + Send + 'static> Dispatcher<P> {
    /// Create an engine with its own handle counter
    pub fn new() -> Self {
        Self::with_allocator(HandleAllocator::new())
    }

    /// Create an engine drawing handles from a shared allocator
    pub fn with_allocator(handles: HandleAllocator) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(SubscriberRegistry::with_allocator(handles)),
                waiters: Mutex::new(WaiterQueue::new()),
                counters: DispatchCounters::default(),
            }),
        }
    }

    /// Register `callback` under `owner`
    pub fn subscribe<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.subscribe_callback(owner.into(), Arc::new(callback))
    }

    pub(crate) fn subscribe_callback(&self, owner: OwnerRef, callback: Callback<P>) -> Handle {
        let handle = self.shared.registry.lock().register(owner, callback);
        debug!(%handle, "Dispatcher::subscribe: registered");
        handle
    }

    /// Register `callback`, then immediately invoke it with `payload` in the caller's context
    pub fn subscribe_and_replay<F>(&self, owner: impl Into<OwnerRef>, callback: F, payload: P) -> Handle
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.subscribe_and_replay_each(owner, callback, std::iter::once(payload))
    }

    /// Register `callback`, then replay each payload to it in iteration order
    pub fn subscribe_and_replay_each<F, I>(&self, owner: impl Into<OwnerRef>, callback: F, payloads: I) -> Handle
    where
        F: Fn(&P) + Send + Sync + 'static,
        I: IntoIterator<Item = P>,
    {
        let callback: Callback<P> = Arc::new(callback);
        let handle = self.subscribe_callback(owner.into(), Arc::clone(&callback));
        for payload in payloads {
            callback(&payload);
        }
        handle
    }

    /// Run one dispatch pass with `payload`
    ///
    /// A publish from inside a subscriber runs its own full pass first. Its
    /// waiter phase drains every waiter pending at that moment, so waiters
    /// registered before the outer publish resolve with the nested payload.
    pub(crate) fn publish(&self, payload: P) {
        let snapshot = self.shared.registry.lock().snapshot();
        trace!(subscribers = snapshot.len(), "Dispatcher::publish: called");
        self.shared.counters.record_publish();

        let mut dead = Vec::new();
        for sub in &snapshot {
            let registered = self.shared.registry.lock().contains(sub.handle);
            if !registered {
                continue;
            }
            if !sub.owner.is_alive() {
                dead.push(sub.handle);
                continue;
            }
            self.invoke(sub, &payload);
        }

        if !dead.is_empty() {
            let pruned = self.shared.registry.lock().unregister_many(&dead);
            debug!(pruned, "Dispatcher::publish: removed subscriptions of destroyed owners");
            self.shared.counters.record_pruned(pruned);
        }

        let waiters = self.shared.waiters.lock().drain();
        let mut resolved = 0;
        for (_, tx) in waiters {
            if tx.send(payload.clone()).is_ok() {
                resolved += 1;
            }
        }
        if resolved > 0 {
            trace!(resolved, "Dispatcher::publish: resolved waiters");
            self.shared.counters.record_resolved(resolved);
        }
    }

    fn invoke(&self, sub: &Subscription<P>, payload: &P) {
        match panic::catch_unwind(AssertUnwindSafe(|| (sub.callback)(payload))) {
            Ok(()) => self.shared.counters.record_delivery(),
            Err(cause) => {
                error!(
                    handle = %sub.handle,
                    cause = %panic_message(cause.as_ref()),
                    "Dispatcher::publish: subscriber panicked, continuing dispatch"
                );
                self.shared.counters.record_panic();
            }
        }
    }

    /// Register a waiter for the next publish without awaiting it yet
    pub fn waiter(&self) -> Waiter<P> {
        let (id, rx) = self.shared.waiters.lock().push();
        trace!(id, "Dispatcher::waiter: registered");
        Waiter::new(id, rx, Arc::downgrade(&self.shared))
    }

    /// Wait for the payload of the next publish
    ///
    /// The waiter is registered before this returns, so a publish issued before
    /// the future is first polled still resolves it. `Duration::ZERO` waits
    /// indefinitely.
    pub fn wait(&self, timeout: Duration) -> impl Future<Output = RxnResult<P>> + Send + use<P> {
        self.waiter().recv(timeout)
    }

    /// Remove one subscription; unknown handles are ignored
    pub fn remove_handler(&self, handle: Handle) -> bool {
        self.shared.registry.lock().unregister(handle)
    }

    /// Remove every subscription tied to `owner`
    pub fn remove_handlers(&self, owner: impl Into<OwnerRef>) -> usize {
        self.shared.registry.lock().unregister_all(&owner.into())
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.shared.registry.lock().contains(handle)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.lock().len()
    }

    pub fn pending_waiters(&self) -> usize {
        self.shared.waiters.lock().len()
    }

    pub fn metrics(&self) -> DispatchMetrics {
        let subscribers = self.subscriber_count();
        let pending = self.pending_waiters();
        self.shared.counters.snapshot(subscribers, pending)
    }
}

impl<P: Clone + Send + 'static> Default for Dispatcher<P> {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(msg) = cause.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = cause.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
