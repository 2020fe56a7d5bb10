//! Reactive collections - list, set, dictionary
//!
//! Each collection owns independent "changed", "added" and "removed" channels.
//! A mutation fires its specific signal first and "changed" last, at most once
//! per operation. All channels of one collection draw handles from one
//! allocator, so `remove_handler` finds a handle wherever it lives.

mod container;
mod dictionary;

pub use container::Container;
pub use dictionary::{DictionaryOwner, KeyChange, RxnDictionary};

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::Config;
use crate::dispatch::{DispatchMetrics, Dispatcher, Handle, HandleAllocator};
use crate::error::RxnResult;
use crate::owner::{OwnerRef, OwnerValidator};

/// Ordered reactive sequence
pub type RxnList<T> = RxnCollection<Vec<T>>;

/// Deduplicated reactive set
pub type RxnSet<T> = RxnCollection<HashSet<T>>;

struct CollectionInner<C: Container> {
    items: RwLock<C>,
    changed: Dispatcher<()>,
    added: Dispatcher<C::Item>,
    removed: Dispatcher<C::Item>,
}

/// Observable collection over container `C`
pub struct RxnCollection<C: Container> {
    inner: Arc<CollectionInner<C>>,
    validator: OwnerValidator,
    default_timeout: Duration,
}

impl<C: Container> Clone for RxnCollection<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            validator: self.validator,
            default_timeout: self.default_timeout,
        }
    }
}

impl<C: Container + std::fmt::Debug> std::fmt::Debug for RxnCollection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RxnCollection")
            .field("items", &*self.inner.items.read())
            .finish()
    }
}

impl<C: Container> RxnCollection<C> {
    #[track_caller]
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    #[track_caller]
    pub fn with_config(config: &Config) -> Self {
        let handles = HandleAllocator::new();
        Self {
            inner: Arc::new(CollectionInner {
                items: RwLock::new(C::default()),
                changed: Dispatcher::with_allocator(handles.clone()),
                added: Dispatcher::with_allocator(handles.clone()),
                removed: Dispatcher::with_allocator(handles),
            }),
            validator: OwnerValidator::capture(config.owner_validation.enabled),
            default_timeout: config.default_timeout(),
        }
    }

    pub fn contains(&self, item: &C::Item) -> bool {
        self.inner.items.read().contains_item(item)
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().item_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the items in iteration order
    pub fn items(&self) -> Vec<C::Item> {
        self.inner.items.read().to_vec()
    }

    /// Any structural mutation
    pub fn on_changed<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.changed.subscribe(owner, move |_: &()| callback())
    }

    /// Any structural mutation, also running `callback` once right away
    pub fn on_changed_init<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.changed.subscribe_and_replay(owner, move |_: &()| callback(), ())
    }

    pub fn on_added<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&C::Item) + Send + Sync + 'static,
    {
        self.inner.added.subscribe(owner, callback)
    }

    /// Future additions, after replaying every current item in container order
    pub fn on_added_init<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&C::Item) + Send + Sync + 'static,
    {
        self.inner.added.subscribe_and_replay_each(owner, callback, self.items())
    }

    pub fn on_added_when<W, F>(&self, owner: impl Into<OwnerRef>, predicate: W, callback: F) -> Handle
    where
        W: Fn(&C::Item) -> bool + Send + Sync + 'static,
        F: Fn(&C::Item) + Send + Sync + 'static,
    {
        self.inner.added.subscribe(owner, filter(predicate, callback))
    }

    /// Like [`on_added_when`](Self::on_added_when), replaying the current items it accepts
    pub fn on_added_when_init<W, F>(&self, owner: impl Into<OwnerRef>, predicate: W, callback: F) -> Handle
    where
        W: Fn(&C::Item) -> bool + Send + Sync + 'static,
        F: Fn(&C::Item) + Send + Sync + 'static,
    {
        self.inner
            .added
            .subscribe_and_replay_each(owner, filter(predicate, callback), self.items())
    }

    /// Additions equal to `item`
    pub fn on_item_added<F>(&self, item: C::Item, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&C::Item) + Send + Sync + 'static,
    {
        self.on_added_when(owner, move |added: &C::Item| *added == item, callback)
    }

    pub fn on_item_added_init<F>(&self, item: C::Item, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&C::Item) + Send + Sync + 'static,
    {
        self.on_added_when_init(owner, move |added: &C::Item| *added == item, callback)
    }

    pub fn on_removed<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&C::Item) + Send + Sync + 'static,
    {
        self.inner.removed.subscribe(owner, callback)
    }

    pub fn on_removed_when<W, F>(&self, owner: impl Into<OwnerRef>, predicate: W, callback: F) -> Handle
    where
        W: Fn(&C::Item) -> bool + Send + Sync + 'static,
        F: Fn(&C::Item) + Send + Sync + 'static,
    {
        self.inner.removed.subscribe(owner, filter(predicate, callback))
    }

    /// Removals equal to `item`
    pub fn on_item_removed<F>(&self, item: C::Item, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&C::Item) + Send + Sync + 'static,
    {
        self.on_removed_when(owner, move |removed: &C::Item| *removed == item, callback)
    }

    pub fn wait_changed(&self, timeout: Duration) -> impl Future<Output = RxnResult<()>> + Send + use<C> {
        self.inner.changed.wait(timeout)
    }

    pub fn wait_added(&self, timeout: Duration) -> impl Future<Output = RxnResult<C::Item>> + Send + use<C> {
        self.inner.added.wait(timeout)
    }

    pub fn wait_removed(&self, timeout: Duration) -> impl Future<Output = RxnResult<C::Item>> + Send + use<C> {
        self.inner.removed.wait(timeout)
    }

    /// [`wait_changed`](Self::wait_changed) with the configured default timeout
    pub fn wait_changed_default(&self) -> impl Future<Output = RxnResult<()>> + Send + use<C> {
        self.wait_changed(self.default_timeout)
    }

    /// Remove a subscription from whichever channel holds it
    pub fn remove_handler(&self, handle: Handle) -> bool {
        self.inner.added.remove_handler(handle)
            || self.inner.removed.remove_handler(handle)
            || self.inner.changed.remove_handler(handle)
    }

    /// Remove every subscription of `owner` across all channels
    pub fn remove_handlers(&self, owner: impl Into<OwnerRef>) -> usize {
        let owner = owner.into();
        self.inner.added.remove_handlers(&owner)
            + self.inner.removed.remove_handlers(&owner)
            + self.inner.changed.remove_handlers(&owner)
    }

    /// Counters summed over all channels
    pub fn metrics(&self) -> DispatchMetrics {
        let mut total = self.inner.changed.metrics();
        total += self.inner.added.metrics();
        total += self.inner.removed.metrics();
        total
    }

    /// Obtain the mutation capability
    ///
    /// Fails with `UnauthorizedMutation` when called from a source file other
    /// than the one that constructed this collection (debug builds only).
    #[track_caller]
    pub fn as_owner(&self) -> RxnResult<CollectionOwner<C>> {
        self.validator.validate()?;
        Ok(CollectionOwner {
            inner: Arc::clone(&self.inner),
        })
    }
}

impl<C: Container> Default for RxnCollection<C> {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

/// Capability to mutate an [`RxnCollection`]
pub struct CollectionOwner<C: Container> {
    inner: Arc<CollectionInner<C>>,
}

impl<C: Container> Clone for CollectionOwner<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Container> CollectionOwner<C> {
    /// Insert `item`, firing "added" then "changed"
    ///
    /// Returns false, firing nothing, when the container rejects the item.
    pub fn add(&self, item: C::Item) -> bool {
        let inserted = self.inner.items.write().insert_item(item.clone());
        if !inserted {
            return false;
        }
        self.inner.added.publish(item);
        self.inner.changed.publish(());
        true
    }

    /// Remove `item`, firing "removed" then "changed"
    ///
    /// Removing an absent item is a no-op.
    pub fn remove(&self, item: &C::Item) -> bool {
        let removed = self.inner.items.write().remove_item(item);
        if !removed {
            return false;
        }
        self.inner.removed.publish(item.clone());
        self.inner.changed.publish(());
        true
    }

    /// Remove everything, firing "removed" per item in iteration order and then one "changed"
    pub fn clear(&self) -> usize {
        let drained = self.inner.items.write().take_all();
        if drained.is_empty() {
            return 0;
        }
        debug!(count = drained.len(), "CollectionOwner::clear: called");
        let count = drained.len();
        for item in drained {
            self.inner.removed.publish(item);
        }
        self.inner.changed.publish(());
        count
    }
}

pub(crate) fn filter<T, W, F>(predicate: W, callback: F) -> impl Fn(&T) + Send + Sync + 'static
where
    T: ?Sized,
    W: Fn(&T) -> bool + Send + Sync + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    move |item: &T| {
        if predicate(item) {
            callback(item);
        }
    }
}
