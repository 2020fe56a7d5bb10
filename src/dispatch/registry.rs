//! Subscriber Registry - ordered mapping from handle to subscription
//!
//! Handles come from a monotonically increasing counter and are never reused,
//! so handle order is registration order and doubles as invocation order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::owner::OwnerRef;

/// Subscriber callback for a payload of type `P`
pub type Callback<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Subscription handle returned by every `on_*` / `subscribe` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u64);

impl Handle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source of handles
///
/// Cloning shares the counter. Reactive entities with several channels hand one
/// allocator to all of them so a handle identifies exactly one channel.
#[derive(Debug, Clone, Default)]
pub struct HandleAllocator(Arc<AtomicU64>);

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next(&self) -> Handle {
        Handle(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// A registered subscriber
pub struct Subscription<P> {
    pub handle: Handle,
    pub owner: OwnerRef,
    pub callback: Callback<P>,
}

impl<P> Clone for Subscription<P> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle,
            owner: self.owner.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<P> fmt::Debug for Subscription<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("handle", &self.handle)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Ordered handle -> subscription storage
pub struct SubscriberRegistry<P> {
    handles: HandleAllocator,
    entries: BTreeMap<Handle, Subscription<P>>,
}

impl<P> SubscriberRegistry<P> {
    /// Create a registry with its own handle counter
    pub fn new() -> Self {
        Self::with_allocator(HandleAllocator::new())
    }

    /// Create a registry drawing handles from a shared allocator
    pub fn with_allocator(handles: HandleAllocator) -> Self {
        Self {
            handles,
            entries: BTreeMap::new(),
        }
    }

    /// Append a subscription and return its fresh handle
    pub fn register(&mut self, owner: OwnerRef, callback: Callback<P>) -> Handle {
        let handle = self.handles.next();
        trace!(%handle, "SubscriberRegistry::register: called");
        self.entries.insert(
            handle,
            Subscription {
                handle,
                owner,
                callback,
            },
        );
        handle
    }

    /// Remove one subscription; unknown handles are ignored
    pub fn unregister(&mut self, handle: Handle) -> bool {
        trace!(%handle, "SubscriberRegistry::unregister: called");
        self.entries.remove(&handle).is_some()
    }

    /// Remove every subscription tied to `owner`, returning how many were removed
    pub fn unregister_all(&mut self, owner: &OwnerRef) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, sub| !sub.owner.same_owner(owner));
        let removed = before - self.entries.len();
        trace!(removed, "SubscriberRegistry::unregister_all: called");
        removed
    }

    /// Remove a batch of handles, returning how many were present
    pub fn unregister_many(&mut self, handles: &[Handle]) -> usize {
        handles.iter().filter(|h| self.entries.remove(*h).is_some()).count()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point-in-time copy in registration order
    pub fn snapshot(&self) -> Vec<Subscription<P>> {
        self.entries.values().cloned().collect()
    }
}

impl<P> Default for SubscriberRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}
