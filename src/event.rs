//! Typed events with an owner-gated invoke capability
//!
//! Anyone holding an `RxnEvent<P>` may subscribe or wait. Only code in the file
//! that constructed the event can obtain its [`EventOwner`] and invoke it.
//! Multi-argument events use tuple payloads: `RxnEvent<(u32, String)>`.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::config::Config;
use crate::dispatch::{DispatchMetrics, Dispatcher, Handle};
use crate::error::RxnResult;
use crate::owner::{OwnerRef, OwnerValidator};

/// Observable event carrying payload `P`
#[derive(Debug, Clone)]
pub struct RxnEvent<P> {
    dispatcher: Dispatcher<P>,
    validator: OwnerValidator,
    default_timeout: Duration,
}

impl<P: Clone + Send + 'static> RxnEvent<P> {
    #[track_caller]
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    #[track_caller]
    pub fn with_config(config: &Config) -> Self {
        Self {
            dispatcher: Dispatcher::new(),
            validator: OwnerValidator::capture(config.owner_validation.enabled),
            default_timeout: config.default_timeout(),
        }
    }

    /// Invoke `callback` on every future invocation while `owner` is alive
    pub fn on_invoked<F>(&self, owner: impl Into<OwnerRef>, callback: F) -> Handle
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(owner, callback)
    }

    /// Like [`on_invoked`](Self::on_invoked), also running `callback` once with `initial` right away
    pub fn on_invoked_init<F>(&self, owner: impl Into<OwnerRef>, callback: F, initial: P) -> Handle
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe_and_replay(owner, callback, initial)
    }

    /// Wait for the next invocation; `Duration::ZERO` waits forever
    pub fn wait(&self, timeout: Duration) -> impl Future<Output = RxnResult<P>> + Send + use<P> {
        self.dispatcher.wait(timeout)
    }

    /// Wait for the next invocation using the configured default timeout
    pub fn wait_default(&self) -> impl Future<Output = RxnResult<P>> + Send + use<P> {
        self.dispatcher.wait(self.default_timeout)
    }

    pub fn remove_handler(&self, handle: Handle) -> bool {
        self.dispatcher.remove_handler(handle)
    }

    pub fn remove_handlers(&self, owner: impl Into<OwnerRef>) -> usize {
        self.dispatcher.remove_handlers(owner)
    }

    pub fn subscriber_count(&self) -> usize {
        self.dispatcher.subscriber_count()
    }

    pub fn metrics(&self) -> DispatchMetrics {
        self.dispatcher.metrics()
    }

    /// Obtain the invoke capability
    ///
    /// Fails with `UnauthorizedMutation` when called from a source file other
    /// than the one that constructed this event (debug builds only).
    #[track_caller]
    pub fn as_owner(&self) -> RxnResult<EventOwner<P>> {
        self.validator.validate()?;
        Ok(EventOwner {
            dispatcher: self.dispatcher.clone(),
        })
    }
}

impl<P: Clone + Send + 'static> Default for RxnEvent<P> {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

/// Capability to invoke an [`RxnEvent`]
#[derive(Debug, Clone)]
pub struct EventOwner<P> {
    dispatcher: Dispatcher<P>,
}

impl<P: Clone + Send + 'static> EventOwner<P> {
    /// Notify every subscriber, then every pending waiter
    pub fn invoke(&self, payload: P) {
        self.dispatcher.publish(payload);
    }

    /// Forward every invocation of `other` into this event while `owner` is alive
    pub fn bind_to(&self, owner: impl Into<OwnerRef>, other: &RxnEvent<P>) -> Handle {
        debug!("EventOwner::bind_to: called");
        let target = self.clone();
        other.on_invoked(owner, move |payload: &P| target.invoke(payload.clone()))
    }
}
