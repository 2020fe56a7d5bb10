//! Reactive dictionary - keyed collection with per-key overwrite signals
//!
//! Inserting a new key fires "added" with the `(key, value)` pair. Overwriting
//! an existing key fires "key-changed" instead, even with an equal value.
//! Either is followed by a single "changed".

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, trace};

use super::filter;
use crate::config::Config;
use crate::dispatch::{DispatchMetrics, Dispatcher, Handle, HandleAllocator};
use crate::error::RxnResult;
use crate::owner::{OwnerRef, OwnerValidator};

/// Payload of a "key-changed" notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyChange<K, V> {
    pub key: K,
    pub old: V,
    pub new: V,
}

struct DictionaryInner<K, V> {
    entries: RwLock<HashMap<K, V>>,
    changed: Dispatcher<()>,
    added: Dispatcher<(K, V)>,
    removed: Dispatcher<(K, V)>,
    key_changed: Dispatcher<KeyChange<K, V>>,
}

/// Observable key-unique mapping
pub struct RxnDictionary<K, V> {
    inner: Arc<DictionaryInner<K, V>>,
    validator: OwnerValidator,
    default_timeout: Duration,
}

impl<K, V> Clone for RxnDictionary<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            validator: self.validator,
            default_timeout: self.default_timeout,
        }
    }
}

impl<K: std::fmt::Debug, V: std::fmt::Debug> std::fmt::Debug for RxnDictionary<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RxnDictionary")
            .field("entries", &*self.inner.entries.read())
            .finish()
    }
}

impl<K, V> RxnDictionary<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    #[track_caller]
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    #[track_caller]
    pub fn with_config(config: &Config) -> Self {
        let handles = HandleAllocator::new();
        Self {
            inner: Arc::new(DictionaryInner {
                entries: RwLock::new(HashMap::new()),
                changed: Dispatcher::with_allocator(handles.clone()),
                added: Dispatcher::with_allocator(handles.clone()),
                removed: Dispatcher::with_allocator(handles.clone()),
                key_changed: Dispatcher::with_allocator(handles),
            }),
            validator: OwnerValidator::capture(config.owner_validation.enabled),
            default_timeout: config.default_timeout(),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.entries.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.entries.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner.entries.read().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<V> {
        self.inner.entries.read().values().cloned().collect()
    }

    /// Snapshot of the entries in iteration order
    pub fn items(&self) -> Vec<(K, V)> {
        self.inner
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn on_changed<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.changed.subscribe(owner, move |_: &()| callback())
    }

    pub fn on_changed_init<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.changed.subscribe_and_replay(owner, move |_: &()| callback(), ())
    }

    /// New keys, as `(key, value)` pairs
    pub fn on_added<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&(K, V)) + Send + Sync + 'static,
    {
        self.inner.added.subscribe(owner, callback)
    }

    /// New keys, after replaying every current entry
    pub fn on_added_init<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&(K, V)) + Send + Sync + 'static,
    {
        self.inner.added.subscribe_and_replay_each(owner, callback, self.items())
    }

    pub fn on_added_when<W, F>(&self, owner: impl Into<OwnerRef>, predicate: W, callback: F) -> Handle
    where
        W: Fn(&(K, V)) -> bool + Send + Sync + 'static,
        F: Fn(&(K, V)) + Send + Sync + 'static,
    {
        self.inner.added.subscribe(owner, filter(predicate, callback))
    }

    pub fn on_added_when_init<W, F>(&self, owner: impl Into<OwnerRef>, predicate: W, callback: F) -> Handle
    where
        W: Fn(&(K, V)) -> bool + Send + Sync + 'static,
        F: Fn(&(K, V)) + Send + Sync + 'static,
    {
        self.inner
            .added
            .subscribe_and_replay_each(owner, filter(predicate, callback), self.items())
    }

    /// Insertion of one specific key
    pub fn on_key_added<F>(&self, key: K, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&(K, V)) + Send + Sync + 'static,
    {
        self.on_added_when(owner, move |(k, _): &(K, V)| *k == key, callback)
    }

    /// Insertion of one specific key, replaying it if already present
    pub fn on_key_added_init<F>(&self, key: K, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&(K, V)) + Send + Sync + 'static,
    {
        self.on_added_when_init(owner, move |(k, _): &(K, V)| *k == key, callback)
    }

    /// Keys of new entries
    pub fn on_added_key<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&K) + Send + Sync + 'static,
    {
        self.on_added(owner, move |(k, _): &(K, V)| callback(k))
    }

    /// Values of new entries
    pub fn on_added_value<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.on_added(owner, move |(_, v): &(K, V)| callback(v))
    }

    pub fn on_removed<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&(K, V)) + Send + Sync + 'static,
    {
        self.inner.removed.subscribe(owner, callback)
    }

    pub fn on_removed_when<W, F>(&self, owner: impl Into<OwnerRef>, predicate: W, callback: F) -> Handle
    where
        W: Fn(&(K, V)) -> bool + Send + Sync + 'static,
        F: Fn(&(K, V)) + Send + Sync + 'static,
    {
        self.inner.removed.subscribe(owner, filter(predicate, callback))
    }

    /// Removal of one specific key
    pub fn on_key_removed<F>(&self, key: K, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&(K, V)) + Send + Sync + 'static,
    {
        self.on_removed_when(owner, move |(k, _): &(K, V)| *k == key, callback)
    }

    /// Overwrites of any existing key
    pub fn on_key_changed<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&KeyChange<K, V>) + Send + Sync + 'static,
    {
        self.inner.key_changed.subscribe(owner, callback)
    }

    /// Overwrites of any key, replaying every current entry as an `old == new` change
    pub fn on_key_changed_init<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&KeyChange<K, V>) + Send + Sync + 'static,
    {
        let replay = self.items().into_iter().map(|(key, value)| KeyChange {
            key,
            old: value.clone(),
            new: value,
        });
        self.inner.key_changed.subscribe_and_replay_each(owner, callback, replay)
    }

    /// Overwrites of one specific key
    pub fn on_key_changed_for<F>(&self, key: K, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&KeyChange<K, V>) + Send + Sync + 'static,
    {
        let matches = move |change: &KeyChange<K, V>| change.key == key;
        self.inner.key_changed.subscribe(owner, filter(matches, callback))
    }

    /// Overwrites of one specific key, replaying its current value if present
    pub fn on_key_changed_for_init<F>(&self, key: K, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&KeyChange<K, V>) + Send + Sync + 'static,
    {
        let replay = self.get(&key).map(|value| KeyChange {
            key: key.clone(),
            old: value.clone(),
            new: value,
        });
        let matches = move |change: &KeyChange<K, V>| change.key == key;
        self.inner
            .key_changed
            .subscribe_and_replay_each(owner, filter(matches, callback), replay)
    }

    pub fn wait_changed(&self, timeout: Duration) -> impl Future<Output = RxnResult<()>> + Send + use<K, V> {
        self.inner.changed.wait(timeout)
    }

    pub fn wait_added(&self, timeout: Duration) -> impl Future<Output = RxnResult<(K, V)>> + Send + use<K, V> {
        self.inner.added.wait(timeout)
    }

    pub fn wait_removed(&self, timeout: Duration) -> impl Future<Output = RxnResult<(K, V)>> + Send + use<K, V> {
        self.inner.removed.wait(timeout)
    }

    pub fn wait_key_changed(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = RxnResult<KeyChange<K, V>>> + Send + use<K, V> {
        self.inner.key_changed.wait(timeout)
    }

    pub fn wait_changed_default(&self) -> impl Future<Output = RxnResult<()>> + Send + use<K, V> {
        self.wait_changed(self.default_timeout)
    }

    /// Remove a subscription from whichever channel holds it
    pub fn remove_handler(&self, handle: Handle) -> bool {
        self.inner.added.remove_handler(handle)
            || self.inner.removed.remove_handler(handle)
            || self.inner.key_changed.remove_handler(handle)
            || self.inner.changed.remove_handler(handle)
    }

    pub fn remove_handlers(&self, owner: impl Into<OwnerRef>) -> usize {
        let owner = owner.into();
        self.inner.added.remove_handlers(&owner)
            + self.inner.removed.remove_handlers(&owner)
            + self.inner.key_changed.remove_handlers(&owner)
            + self.inner.changed.remove_handlers(&owner)
    }

    pub fn metrics(&self) -> DispatchMetrics {
        let mut total = self.inner.changed.metrics();
        total += self.inner.added.metrics();
        total += self.inner.removed.metrics();
        total += self.inner.key_changed.metrics();
        total
    }

    /// Obtain the mutation capability
    #[track_caller]
    pub fn as_owner(&self) -> RxnResult<DictionaryOwner<K, V>> {
        self.validator.validate()?;
        Ok(DictionaryOwner {
            inner: Arc::clone(&self.inner),
        })
    }
}

impl<K, V> Default for RxnDictionary<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

enum Insertion<V> {
    Added,
    Overwrote(V),
}

/// Capability to mutate an [`RxnDictionary`]
pub struct DictionaryOwner<K, V> {
    inner: Arc<DictionaryInner<K, V>>,
}

impl<K, V> Clone for DictionaryOwner<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> DictionaryOwner<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Set `key` to `value`
    ///
    /// A new key fires "added" then "changed". A different value for an
    /// existing key fires "key-changed" then "changed", even when the new value
    /// equals the old one. Returns the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let outcome = {
            let mut entries = self.inner.entries.write();
            match entries.get_mut(&key) {
                None => {
                    entries.insert(key.clone(), value.clone());
                    Insertion::Added
                }
                Some(current) => Insertion::Overwrote(std::mem::replace(current, value.clone())),
            }
        };

        match outcome {
            Insertion::Added => {
                trace!("DictionaryOwner::insert: new key");
                self.inner.added.publish((key, value));
                self.inner.changed.publish(());
                None
            }
            Insertion::Overwrote(old) => {
                trace!("DictionaryOwner::insert: overwrote key");
                self.inner.key_changed.publish(KeyChange {
                    key,
                    old: old.clone(),
                    new: value,
                });
                self.inner.changed.publish(());
                Some(old)
            }
        }
    }

    /// Remove `key`, firing "removed" then "changed"; absent keys are a no-op
    pub fn remove(&self, key: &K) -> Option<V> {
        let value = self.inner.entries.write().remove(key)?;
        self.inner.removed.publish((key.clone(), value.clone()));
        self.inner.changed.publish(());
        Some(value)
    }

    /// Remove every entry, firing "removed" per entry and then one "changed"
    pub fn clear(&self) -> usize {
        let drained: Vec<(K, V)> = self.inner.entries.write().drain().collect();
        if drained.is_empty() {
            return 0;
        }
        debug!(count = drained.len(), "DictionaryOwner::clear: called");
        let count = drained.len();
        for entry in drained {
            self.inner.removed.publish(entry);
        }
        self.inner.changed.publish(());
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn wire(dict: &RxnDictionary<i32, &'static str>) -> Log {
        let log: Log = Arc::default();
        let sink = Arc::clone(&log);
        dict.on_added(OwnerRef::unowned(), move |(k, v): &(i32, &str)| {
            sink.lock().push(format!("added:{k}={v}"))
        });
        let sink = Arc::clone(&log);
        dict.on_key_changed(OwnerRef::unowned(), move |c: &KeyChange<i32, &str>| {
            sink.lock().push(format!("key-changed:{}:{}->{}", c.key, c.old, c.new))
        });
        let sink = Arc::clone(&log);
        dict.on_removed(OwnerRef::unowned(), move |(k, v): &(i32, &str)| {
            sink.lock().push(format!("removed:{k}={v}"))
        });
        let sink = Arc::clone(&log);
        dict.on_changed(OwnerRef::unowned(), move || sink.lock().push("changed".to_string()));
        log
    }

    #[test]
    fn test_insert_new_then_overwrite() {
        let dict = RxnDictionary::new();
        let log = wire(&dict);
        let owner = dict.as_owner().unwrap();

        assert_eq!(owner.insert(1, "a"), None);
        assert_eq!(owner.insert(1, "b"), Some("a"));

        assert_eq!(
            *log.lock(),
            vec!["added:1=a", "changed", "key-changed:1:a->b", "changed"]
        );
        assert_eq!(dict.get(&1), Some("b"));
    }

    #[test]
    fn test_overwrite_with_equal_value_still_notifies() {
        let dict = RxnDictionary::new();
        let owner = dict.as_owner().unwrap();
        owner.insert(1, "a");
        let log = wire(&dict);

        assert_eq!(owner.insert(1, "a"), Some("a"));
        assert_eq!(*log.lock(), vec!["key-changed:1:a->a", "changed"]);
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let dict = RxnDictionary::new();
        let owner = dict.as_owner().unwrap();
        owner.insert(1, "a");
        let log = wire(&dict);

        assert_eq!(owner.remove(&1), Some("a"));
        assert_eq!(owner.remove(&1), None);
        assert_eq!(owner.clear(), 0);

        assert_eq!(*log.lock(), vec!["removed:1=a", "changed"]);
        assert!(dict.is_empty());
    }

    #[test]
    fn test_clear_fires_once_per_entry() {
        let dict = RxnDictionary::new();
        let owner = dict.as_owner().unwrap();
        owner.insert(1, "a");
        owner.insert(2, "b");
        let log = wire(&dict);

        assert_eq!(owner.clear(), 2);
        let log = log.lock();
        assert_eq!(log.iter().filter(|l| l.starts_with("removed:")).count(), 2);
        assert_eq!(log.last().map(String::as_str), Some("changed"));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_key_specific_subscriptions() {
        let dict: RxnDictionary<&'static str, u32> = RxnDictionary::new();
        let owner = dict.as_owner().unwrap();
        owner.insert("gold", 10);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dict.on_key_changed_for_init("gold", OwnerRef::unowned(), move |c: &KeyChange<&str, u32>| {
            sink.lock().push((c.old, c.new))
        });
        let sink = Arc::clone(&seen);
        dict.on_key_added("silver", OwnerRef::unowned(), move |(_, v): &(&str, u32)| {
            sink.lock().push((0, *v))
        });
        let sink = Arc::clone(&seen);
        dict.on_key_removed("gold", OwnerRef::unowned(), move |(_, v): &(&str, u32)| {
            sink.lock().push((*v, 0))
        });

        owner.insert("gold", 15);
        owner.insert("copper", 1);
        owner.insert("silver", 3);
        owner.remove(&"gold");

        assert_eq!(*seen.lock(), vec![(10, 10), (10, 15), (0, 3), (15, 0)]);
    }

    #[test]
    fn test_added_key_and_value_projections() {
        let dict: RxnDictionary<String, i32> = RxnDictionary::new();
        let keys = Arc::new(Mutex::new(Vec::new()));
        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&keys);
        dict.on_added_key(OwnerRef::unowned(), move |k: &String| sink.lock().push(k.clone()));
        let sink = Arc::clone(&values);
        dict.on_added_value(OwnerRef::unowned(), move |v: &i32| sink.lock().push(*v));

        dict.as_owner().unwrap().insert("hp".to_string(), 30);
        assert_eq!(*keys.lock(), vec!["hp".to_string()]);
        assert_eq!(*values.lock(), vec![30]);
    }

    #[test]
    fn test_on_added_init_replays_entries() {
        let dict: RxnDictionary<i32, i32> = RxnDictionary::new();
        let owner = dict.as_owner().unwrap();
        owner.insert(1, 100);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dict.on_added_init(OwnerRef::unowned(), move |entry: &(i32, i32)| sink.lock().push(*entry));
        owner.insert(2, 200);

        assert_eq!(*seen.lock(), vec![(1, 100), (2, 200)]);
    }

    #[tokio::test]
    async fn test_wait_key_changed() {
        let dict: RxnDictionary<i32, i32> = RxnDictionary::new();
        let owner = dict.as_owner().unwrap();
        owner.insert(1, 1);

        let waiting = dict.wait_key_changed(Duration::from_secs(1));
        owner.insert(1, 2);
        assert_eq!(
            waiting.await.unwrap(),
            KeyChange {
                key: 1,
                old: 1,
                new: 2
            }
        );
    }
}
