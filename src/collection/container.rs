//! Storage behind a reactive collection

use std::collections::HashSet;
use std::hash::Hash;

/// Backing store for [`RxnCollection`](super::RxnCollection)
///
/// `insert_item` and `remove_item` report whether the container changed; a
/// call that leaves it untouched fires no signals.
pub trait Container: Default + Send + Sync + 'static {
    type Item: Clone + PartialEq + Send + Sync + 'static;

    fn insert_item(&mut self, item: Self::Item) -> bool;

    fn remove_item(&mut self, item: &Self::Item) -> bool;

    fn contains_item(&self, item: &Self::Item) -> bool;

    fn item_count(&self) -> usize;

    /// Items in iteration order
    fn to_vec(&self) -> Vec<Self::Item>;

    /// Remove every item, returning them in iteration order
    fn take_all(&mut self) -> Vec<Self::Item>;
}

/// Ordered, duplicates allowed
impl<T> Container for Vec<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Item = T;

    fn insert_item(&mut self, item: T) -> bool {
        self.push(item);
        true
    }

    /// Removes the first occurrence only
    fn remove_item(&mut self, item: &T) -> bool {
        match self.iter().position(|x| x == item) {
            Some(index) => {
                self.remove(index);
                true
            }
            None => false,
        }
    }

    fn contains_item(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn item_count(&self) -> usize {
        self.len()
    }

    fn to_vec(&self) -> Vec<T> {
        self.clone()
    }

    fn take_all(&mut self) -> Vec<T> {
        std::mem::take(self)
    }
}

/// Deduplicated, unordered
impl<T> Container for HashSet<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    type Item = T;

    fn insert_item(&mut self, item: T) -> bool {
        self.insert(item)
    }

    fn remove_item(&mut self, item: &T) -> bool {
        self.remove(item)
    }

    fn contains_item(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn item_count(&self) -> usize {
        self.len()
    }

    fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    fn take_all(&mut self) -> Vec<T> {
        self.drain().collect()
    }
}
