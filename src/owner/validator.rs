//! Owner-site gate for mutation capabilities
//!
//! Each reactive entity records the source file it was constructed in. Asking for
//! its mutation capability from any other file is an `UnauthorizedMutation`.
//! The check is a debug-build diagnostic: release builds compile it out and
//! every request succeeds.

use std::panic::Location;

use tracing::warn;

use crate::error::{RxnError, RxnResult};

/// Records the constructing call site and validates later capability requests
#[derive(Debug, Clone, Copy)]
pub struct OwnerValidator {
    #[cfg(debug_assertions)]
    site: Option<&'static Location<'static>>,
}

impl OwnerValidator {
    /// Capture the caller's location as the owner site
    ///
    /// `enabled == false` produces a validator that accepts every caller.
    #[track_caller]
    pub fn capture(enabled: bool) -> Self {
        #[cfg(debug_assertions)]
        {
            let caller = Location::caller();
            Self {
                site: enabled.then_some(caller),
            }
        }
        #[cfg(not(debug_assertions))]
        {
            let _ = enabled;
            Self {}
        }
    }

    /// Check that the caller lives in the owner's source file
    #[track_caller]
    pub fn validate(&self) -> RxnResult<()> {
        #[cfg(debug_assertions)]
        if let Some(owner) = self.site {
            let caller = Location::caller();
            if caller.file() != owner.file() {
                warn!(owner = %owner, caller = %caller, "OwnerValidator::validate: foreign mutation attempt");
                return Err(RxnError::UnauthorizedMutation {
                    owner: owner.to_string(),
                    caller: caller.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Source location the entity was constructed at, when validation is active
    pub fn owner_site(&self) -> Option<&'static Location<'static>> {
        #[cfg(debug_assertions)]
        {
            self.site
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    }
}
