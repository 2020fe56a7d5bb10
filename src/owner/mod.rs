//! Owner lifetimes and owner-site validation
//!
//! - [`OwnerRef`] ties a subscription to an external entity's lifetime
//! - [`OwnerValidator`] restricts who may obtain a mutation capability

mod liveness;
mod validator;

pub use liveness::{Entity, Liveness, OwnerRef};
pub use validator::OwnerValidator;
