//! Owner references and the liveness query against the host lifecycle
//!
//! A subscription never owns the entity it is tied to. It holds an [`OwnerRef`],
//! which answers "is this owner still alive" through the [`Liveness`] trait and
//! compares by owner identity so all subscriptions of one owner can be dropped
//! together.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::debug;

/// Liveness query supplied by the host environment
///
/// Implementations may report a dead owner as alive for a while, but must never
/// report a live owner as dead.
pub trait Liveness: Send + Sync + 'static {
    fn is_alive(&self) -> bool;
}

/// Non-owning reference from a subscription to the entity gating it
#[derive(Clone)]
pub struct OwnerRef {
    key: usize,
    probe: Option<Arc<dyn Liveness>>,
}

impl OwnerRef {
    /// Reference an owner through a host-supplied liveness probe
    ///
    /// Identity is the probe allocation: clones of the same `Arc` are the same owner.
    pub fn new<L: Liveness>(probe: Arc<L>) -> Self {
        let key = Arc::as_ptr(&probe) as *const () as usize;
        Self {
            key,
            probe: Some(probe),
        }
    }

    /// Owner that stays alive exactly as long as `target` has strong references
    pub fn from_weak<T: Send + Sync + 'static>(target: &Arc<T>) -> Self {
        let key = Arc::as_ptr(target) as *const () as usize;
        Self {
            key,
            probe: Some(Arc::new(WeakProbe(Arc::downgrade(target)))),
        }
    }

    /// Owner that never dies; subscriptions under it live until removed by handle
    pub fn unowned() -> Self {
        Self { key: 0, probe: None }
    }

    /// Query the host for liveness
    pub fn is_alive(&self) -> bool {
        match &self.probe {
            Some(probe) => probe.is_alive(),
            None => true,
        }
    }

    /// Whether both references point at the same owner
    pub fn same_owner(&self, other: &OwnerRef) -> bool {
        self.key == other.key
    }
}

impl PartialEq for OwnerRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_owner(other)
    }
}

impl Eq for OwnerRef {}

impl fmt::Debug for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerRef")
            .field("key", &format_args!("{:#x}", self.key))
            .field("alive", &self.is_alive())
            .finish()
    }
}

struct WeakProbe<T>(Weak<T>);

impl<T: Send + Sync + 'static> Liveness for WeakProbe<T> {
    fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// In-process lifecycle-tracked object
///
/// Stands in for a host scene object: it is alive from creation until
/// [`Entity::destroy`] is called on any of its clones.
#[derive(Clone)]
pub struct Entity {
    state: Arc<EntityState>,
}

struct EntityState {
    name: String,
    alive: AtomicBool,
}

impl Liveness for EntityState {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl Entity {
    /// Create a live entity
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(%name, "Entity::new: called");
        Self {
            state: Arc::new(EntityState {
                name,
                alive: AtomicBool::new(true),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    /// Mark the entity dead; subscriptions it owns stop firing on the next publish
    pub fn destroy(&self) {
        debug!(name = %self.state.name, "Entity::destroy: called");
        self.state.alive.store(false, Ordering::Release);
    }

    /// Owner reference for subscriptions tied to this entity
    pub fn owner(&self) -> OwnerRef {
        OwnerRef::new(Arc::clone(&self.state))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.state.name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl From<&Entity> for OwnerRef {
    fn from(entity: &Entity) -> Self {
        entity.owner()
    }
}

impl From<&OwnerRef> for OwnerRef {
    fn from(owner: &OwnerRef) -> Self {
        owner.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_lifecycle() {
        let entity = Entity::new("player");
        let owner = entity.owner();
        assert!(owner.is_alive());

        entity.clone().destroy();
        assert!(!entity.is_alive());
        assert!(!owner.is_alive());
    }

    #[test]
    fn test_owner_identity() {
        let a = Entity::new("a");
        let b = Entity::new("b");

        assert_eq!(a.owner(), OwnerRef::from(&a));
        assert_eq!(a.owner(), a.clone().owner());
        assert_ne!(a.owner(), b.owner());
    }

    #[test]
    fn test_weak_owner_follows_target() {
        let target = Arc::new(String::from("scene"));
        let owner = OwnerRef::from_weak(&target);
        assert!(owner.is_alive());
        assert_eq!(owner, OwnerRef::from_weak(&target));

        drop(target);
        assert!(!owner.is_alive());
    }

    #[test]
    fn test_unowned_is_always_alive() {
        let owner = OwnerRef::unowned();
        assert!(owner.is_alive());
        assert_eq!(owner, OwnerRef::unowned());
    }

    #[test]
    fn test_custom_probe() {
        struct Flag(AtomicBool);
        impl Liveness for Flag {
            fn is_alive(&self) -> bool {
                self.0.load(Ordering::SeqCst)
            }
        }

        let flag = Arc::new(Flag(AtomicBool::new(true)));
        let owner = OwnerRef::new(Arc::clone(&flag));
        assert!(owner.is_alive());

        flag.0.store(false, Ordering::SeqCst);
        assert!(!owner.is_alive());
    }
}
