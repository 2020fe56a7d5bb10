//! Direction-aware subscriptions for ordered values

use super::{RxnValue, ValueChange};
use crate::dispatch::Handle;
use crate::owner::OwnerRef;

impl<T> RxnValue<T>
where
    T: Clone + PartialOrd + Send + Sync + 'static,
{
    /// Changes where the new value is greater than the old one
    pub fn on_increased<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&ValueChange<T>) + Send + Sync + 'static,
    {
        self.on_changed_when(owner, |c: &ValueChange<T>| c.new > c.old, callback)
    }

    /// Changes where the new value is less than the old one
    pub fn on_decreased<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&ValueChange<T>) + Send + Sync + 'static,
    {
        self.on_changed_when(owner, |c: &ValueChange<T>| c.new < c.old, callback)
    }
}
