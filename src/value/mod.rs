//! Reactive Scalar - a single value that notifies on change
//!
//! Subscribers receive a [`ValueChange`] carrying the previous and the new
//! value. A `set` notifies only when the value actually changes, unless
//! forced; a suppressed `set` stores the value silently.

mod ext;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::Config;
use crate::dispatch::{DispatchMetrics, Dispatcher, Handle};
use crate::error::{RxnError, RxnResult};
use crate::owner::{OwnerRef, OwnerValidator};

/// Payload of a value notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueChange<T> {
    pub old: T,
    pub new: T,
}

/// Flags for [`ValueOwner::set_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Notify even if the value is unchanged
    pub force: bool,
    /// Store the value without notifying; wins over `force`
    pub suppress: bool,
}

impl SetOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            suppress: false,
        }
    }

    pub fn suppressed() -> Self {
        Self {
            force: false,
            suppress: true,
        }
    }
}

struct ValueInner<T> {
    value: RwLock<T>,
    changed: Dispatcher<ValueChange<T>>,
}

/// Observable value of type `T`
///
/// Cloning yields another handle to the same value.
pub struct RxnValue<T> {
    inner: Arc<ValueInner<T>>,
    validator: OwnerValidator,
    default_timeout: Duration,
}

impl<T> Clone for RxnValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            validator: self.validator,
            default_timeout: self.default_timeout,
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RxnValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RxnValue").field("value", &*self.inner.value.read()).finish()
    }
}

impl<T> RxnValue<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    #[track_caller]
    pub fn new(initial: T) -> Self {
        Self::with_config(initial, &Config::default())
    }

    #[track_caller]
    pub fn with_config(initial: T, config: &Config) -> Self {
        Self {
            inner: Arc::new(ValueInner {
                value: RwLock::new(initial),
                changed: Dispatcher::new(),
            }),
            validator: OwnerValidator::capture(config.owner_validation.enabled),
            default_timeout: config.default_timeout(),
        }
    }

    /// Current value
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Borrow the current value for the duration of `f`
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Every future change
    pub fn on_changed<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&ValueChange<T>) + Send + Sync + 'static,
    {
        self.inner.changed.subscribe(owner, callback)
    }

    /// Every future change, replaying the current value first as an `old == new` change
    pub fn on_changed_init<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&ValueChange<T>) + Send + Sync + 'static,
    {
        let current = self.get();
        self.inner.changed.subscribe_and_replay(
            owner,
            callback,
            ValueChange {
                old: current.clone(),
                new: current,
            },
        )
    }

    /// Future changes accepted by `predicate`
    pub fn on_changed_when<W, F>(&self, owner: impl Into<OwnerRef>, predicate: W, callback: F) -> Handle
    where
        W: Fn(&ValueChange<T>) -> bool + Send + Sync + 'static,
        F: Fn(&ValueChange<T>) + Send + Sync + 'static,
    {
        self.on_changed(owner, move |change: &ValueChange<T>| {
            if predicate(change) {
                callback(change);
            }
        })
    }

    /// Future changes accepted by `predicate`, replaying the current value if it is accepted too
    pub fn on_changed_when_init<W, F>(&self, owner: impl Into<OwnerRef>, predicate: W, callback: F) -> Handle
    where
        W: Fn(&ValueChange<T>) -> bool + Send + Sync + 'static,
        F: Fn(&ValueChange<T>) + Send + Sync + 'static,
    {
        self.on_changed_init(owner, move |change: &ValueChange<T>| {
            if predicate(change) {
                callback(change);
            }
        })
    }

    /// Future changes whose new value equals `target`
    pub fn on_changed_to<F>(&self, target: T, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&ValueChange<T>) + Send + Sync + 'static,
    {
        self.on_changed_when(owner, move |change: &ValueChange<T>| change.new == target, callback)
    }

    /// Like [`on_changed_to`](Self::on_changed_to), replaying immediately when already at `target`
    pub fn on_changed_to_init<F>(&self, target: T, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&ValueChange<T>) + Send + Sync + 'static,
    {
        self.on_changed_when_init(owner, move |change: &ValueChange<T>| change.new == target, callback)
    }

    /// Wait for the next notification
    pub fn wait_changed(&self, timeout: Duration) -> impl Future<Output = RxnResult<ValueChange<T>>> + Send + use<T> {
        self.inner.changed.wait(timeout)
    }

    /// Resolve once the value equals `target`
    ///
    /// Returns immediately when it already does. Intermediate changes that miss
    /// the target keep waiting on the remaining budget; running out of budget
    /// raises `Timeout` carrying the full `timeout`. `Duration::ZERO` waits forever,
    /// as does a timeout too large to place on the clock.
    pub async fn wait_until(&self, target: T, timeout: Duration) -> RxnResult<()> {
        debug!(?timeout, "RxnValue::wait_until: called");
        let deadline = if timeout.is_zero() {
            None
        } else {
            Instant::now().checked_add(timeout)
        };
        loop {
            // Register before checking so a change between the two is not missed
            let waiter = self.inner.changed.waiter();
            let reached = *self.inner.value.read() == target;
            if reached {
                return Ok(());
            }

            let remaining = match deadline {
                None => Duration::ZERO,
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Err(RxnError::Timeout { timeout });
                    }
                    left
                }
            };

            match waiter.recv(remaining).await {
                Ok(_) => trace!("RxnValue::wait_until: woke on change"),
                Err(RxnError::Timeout { .. }) => return Err(RxnError::Timeout { timeout }),
                Err(e) => return Err(e),
            }
        }
    }

    /// [`wait_until`](Self::wait_until) with the configured default timeout
    pub async fn wait_until_default(&self, target: T) -> RxnResult<()> {
        self.wait_until(target, self.default_timeout).await
    }

    pub fn remove_handler(&self, handle: Handle) -> bool {
        self.inner.changed.remove_handler(handle)
    }

    pub fn remove_handlers(&self, owner: impl Into<OwnerRef>) -> usize {
        self.inner.changed.remove_handlers(owner)
    }

    pub fn metrics(&self) -> DispatchMetrics {
        self.inner.changed.metrics()
    }

    /// Obtain the set capability
    ///
    /// Fails with `UnauthorizedMutation` when called from a source file other
    /// than the one that constructed this value (debug builds only).
    #[track_caller]
    pub fn as_owner(&self) -> RxnResult<ValueOwner<T>> {
        self.validator.validate()?;
        Ok(ValueOwner {
            inner: Arc::clone(&self.inner),
        })
    }
}

impl<T> Default for RxnValue<T>
where
    T: Clone + Default + PartialEq + Send + Sync + 'static,
{
    #[track_caller]
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Capability to set an [`RxnValue`]
pub struct ValueOwner<T> {
    inner: Arc<ValueInner<T>>,
}

impl<T> Clone for ValueOwner<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> ValueOwner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Store `value`, notifying if it differs from the current one
    pub fn set(&self, value: T) -> bool {
        self.set_with(value, SetOptions::default())
    }

    /// Store `value`; returns whether subscribers were notified
    pub fn set_with(&self, value: T, options: SetOptions) -> bool {
        let change = {
            let mut current = self.inner.value.write();
            let changed = *current != value;
            let old = std::mem::replace(&mut *current, value);
            let notify = !options.suppress && (options.force || changed);
            notify.then(|| ValueChange {
                old,
                new: current.clone(),
            })
        };

        match change {
            Some(change) => {
                trace!(force = options.force, "ValueOwner::set_with: notifying");
                self.inner.changed.publish(change);
                true
            }
            None => false,
        }
    }

    /// Mirror `other` into this value while `owner` is alive, starting with its current value
    pub fn bind_to(&self, owner: impl Into<OwnerRef>, other: &RxnValue<T>) -> Handle {
        let target = self.clone();
        other.on_changed_init(owner, move |change: &ValueChange<T>| {
            target.set(change.new.clone());
        })
    }

    /// Mirror the changes of `other` accepted by `predicate`
    pub fn bind_to_when<W>(&self, owner: impl Into<OwnerRef>, other: &RxnValue<T>, predicate: W) -> Handle
    where
        W: Fn(&ValueChange<T>) -> bool + Send + Sync + 'static,
    {
        let target = self.clone();
        other.on_changed_when_init(owner, predicate, move |change: &ValueChange<T>| {
            target.set(change.new.clone());
        })
    }
}

/// Records every notification, for tests
#[cfg(test)]
pub(crate) fn record<T: Clone + Send + 'static>() -> (
    Arc<parking_lot::Mutex<Vec<ValueChange<T>>>>,
    impl Fn(&ValueChange<T>) + Send + Sync + 'static,
) {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |change: &ValueChange<T>| sink.lock().push(change.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::Entity;

    fn change<T>(old: T, new: T) -> ValueChange<T> {
        ValueChange { old, new }
    }

    #[test]
    fn test_set_equal_value_is_silent() {
        let value = RxnValue::new(5);
        let (seen, cb) = record();
        value.on_changed(OwnerRef::unowned(), cb);

        assert!(!value.as_owner().unwrap().set(5));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_set_force_and_change() {
        let value = RxnValue::new(5);
        let (seen, cb) = record();
        value.on_changed(OwnerRef::unowned(), cb);
        let owner = value.as_owner().unwrap();

        assert!(owner.set_with(5, SetOptions::forced()));
        assert!(owner.set(6));

        assert_eq!(*seen.lock(), vec![change(5, 5), change(5, 6)]);
        assert_eq!(value.get(), 6);
    }

    #[test]
    fn test_suppress_wins_over_force() {
        let value = RxnValue::new(1);
        let (seen, cb) = record();
        value.on_changed(OwnerRef::unowned(), cb);

        let options = SetOptions {
            force: true,
            suppress: true,
        };
        assert!(!value.as_owner().unwrap().set_with(2, options));
        assert!(seen.lock().is_empty());
        assert_eq!(value.get(), 2);
    }

    #[test]
    fn test_optional_unset_and_set_are_changes() {
        let value: RxnValue<Option<&str>> = RxnValue::new(None);
        let (seen, cb) = record();
        value.on_changed(OwnerRef::unowned(), cb);
        let owner = value.as_owner().unwrap();

        owner.set(Some("x"));
        owner.set(None);
        owner.set(None);

        assert_eq!(*seen.lock(), vec![change(None, Some("x")), change(Some("x"), None)]);
    }

    #[test]
    fn test_on_changed_init_replays_current() {
        let value = RxnValue::new("idle".to_string());
        let (seen, cb) = record();
        value.on_changed_init(OwnerRef::unowned(), cb);

        assert_eq!(*seen.lock(), vec![change("idle".to_string(), "idle".to_string())]);
    }

    #[test]
    fn test_on_changed_to_filters() {
        let value = RxnValue::new(0);
        let (seen, cb) = record();
        value.on_changed_to(3, OwnerRef::unowned(), cb);
        let owner = value.as_owner().unwrap();

        for v in 1..=4 {
            owner.set(v);
        }
        assert_eq!(*seen.lock(), vec![change(2, 3)]);
    }

    #[test]
    fn test_on_changed_to_init_only_replays_on_match() {
        let value = RxnValue::new(3);
        let (matched, cb) = record();
        value.on_changed_to_init(3, OwnerRef::unowned(), cb);
        let (missed, cb) = record();
        value.on_changed_to_init(4, OwnerRef::unowned(), cb);

        assert_eq!(*matched.lock(), vec![change(3, 3)]);
        assert!(missed.lock().is_empty());
    }

    #[test]
    fn test_on_changed_when_sees_old_and_new() {
        let value = RxnValue::new(10);
        let (seen, cb) = record();
        value.on_changed_when(OwnerRef::unowned(), |c: &ValueChange<i32>| c.new - c.old > 5, cb);
        let owner = value.as_owner().unwrap();

        owner.set(12);
        owner.set(20);
        assert_eq!(*seen.lock(), vec![change(12, 20)]);
    }

    #[test]
    fn test_bind_to_mirrors_source() {
        let source = RxnValue::new(1);
        let mirror = RxnValue::new(0);
        let entity = Entity::new("binding");

        mirror.as_owner().unwrap().bind_to(&entity, &source);
        assert_eq!(mirror.get(), 1);

        source.as_owner().unwrap().set(7);
        assert_eq!(mirror.get(), 7);

        entity.destroy();
        source.as_owner().unwrap().set(8);
        assert_eq!(mirror.get(), 7);
    }

    #[test]
    fn test_bind_to_when_filters() {
        let source = RxnValue::new(0);
        let evens = RxnValue::new(0);
        evens
            .as_owner()
            .unwrap()
            .bind_to_when(OwnerRef::unowned(), &source, |c: &ValueChange<i32>| c.new % 2 == 0);

        let owner = source.as_owner().unwrap();
        owner.set(3);
        assert_eq!(evens.get(), 0);
        owner.set(4);
        assert_eq!(evens.get(), 4);
    }

    #[tokio::test]
    async fn test_wait_until_already_satisfied() {
        let value = RxnValue::new(2);
        value.wait_until(2, Duration::from_millis(10)).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_until_skips_intermediate_values() {
        let value = RxnValue::new(0);
        let owner = value.as_owner().unwrap();
        let watcher = value.clone();
        let task = tokio::spawn(async move { watcher.wait_until(3, Duration::from_secs(2)).await });

        for v in 1..=3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            owner.set(v);
        }
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_wait_until_with_unbounded_timeout() {
        let value = RxnValue::new(0);
        let owner = value.as_owner().unwrap();
        let watcher = value.clone();
        let task = tokio::spawn(async move { watcher.wait_until(1, Duration::MAX).await });

        tokio::time::sleep(Duration::from_millis(5)).await;
        owner.set(1);
        task.await.unwrap().unwrap();
        assert_eq!(value.metrics().pending_waiters, 0);
    }

    #[tokio::test]
    async fn test_wait_until_timeout_carries_full_budget() {
        let value = RxnValue::new(0);
        let owner = value.as_owner().unwrap();
        let timeout = Duration::from_millis(60);
        let watcher = value.clone();
        let task = tokio::spawn(async move { watcher.wait_until(99, timeout).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        owner.set(1);

        match task.await.unwrap() {
            Err(RxnError::Timeout { timeout: t }) => assert_eq!(t, timeout),
            other => panic!("Expected timeout, got {:?}", other),
        }
        assert_eq!(value.metrics().pending_waiters, 0);
    }

    #[tokio::test]
    async fn test_wait_changed_returns_change() {
        let value = RxnValue::new("a");
        let waiting = value.wait_changed(Duration::from_secs(1));
        value.as_owner().unwrap().set("b");
        assert_eq!(waiting.await.unwrap(), change("a", "b"));
    }
}
