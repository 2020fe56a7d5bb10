//! Dispatch - subscriber registry, publish pass, async waiters
//!
//! Every reactive type in the crate is a thin adapter over [`Dispatcher`].

mod engine;
mod metrics;
mod registry;
mod waiter;

pub use engine::Dispatcher;
pub use metrics::DispatchMetrics;
pub use registry::{Callback, Handle, HandleAllocator, SubscriberRegistry, Subscription};
pub use waiter::Waiter;
