//! Rxn - reactive values, collections and events
//!
//! Typed cells and collections that broadcast change notifications to
//! registered observers, support one-shot "wait for the next change" with
//! timeouts, and tie every subscription to an owner whose death silently
//! retires it.
//!
//! # Core Concepts
//!
//! - **Registration order**: subscribers run in the order they subscribed,
//!   exactly once per publish
//! - **Settled waiters**: every synchronous subscriber runs before any waiter resumes
//! - **Owner liveness**: subscriptions of a dead owner are skipped and pruned
//! - **Owner-gated mutation**: only the constructing source file may obtain
//!   the mutation capability (debug builds)
//!
//! # Modules
//!
//! - [`dispatch`] - Subscriber registry, publish pass and async waiters
//! - [`owner`] - Owner liveness and owner-site validation
//! - [`event`] - Typed events
//! - [`value`] - Reactive scalar values
//! - [`collection`] - Reactive list, set and dictionary
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface of the `rxn` binary

pub mod cli;
pub mod collection;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod owner;
pub mod value;

// Re-export commonly used types
pub use collection::{
    CollectionOwner, Container, DictionaryOwner, KeyChange, RxnCollection, RxnDictionary, RxnList, RxnSet,
};
pub use config::{Config, OwnerValidationConfig, WaitConfig};
pub use dispatch::{DispatchMetrics, Dispatcher, Handle, HandleAllocator, Waiter};
pub use error::{RxnError, RxnResult};
pub use event::{EventOwner, RxnEvent};
pub use owner::{Entity, Liveness, OwnerRef, OwnerValidator};
pub use value::{RxnValue, SetOptions, ValueChange, ValueOwner};
