//! Shared fixtures for integration tests
//!
//! Reactive state here is constructed in this file, so only this file may
//! obtain its mutation capabilities.

#![allow(dead_code)]

use rxn::{Config, RxnEvent, RxnList, RxnValue};

/// Game-style model owning its reactive state
pub struct Player {
    pub health: RxnValue<i32>,
    pub inventory: RxnList<String>,
    pub died: RxnEvent<()>,
}

impl Player {
    pub fn new(health: i32) -> Self {
        Self {
            health: RxnValue::new(health),
            inventory: RxnList::new(),
            died: RxnEvent::new(),
        }
    }

    pub fn damage(&self, amount: i32) {
        let owner = self.health.as_owner().expect("owner file may mutate health");
        let next = (self.health.get() - amount).max(0);
        owner.set(next);
        if next == 0 {
            self.died.as_owner().expect("owner file may invoke died").invoke(());
        }
    }

    pub fn pick_up(&self, item: &str) {
        self.inventory
            .as_owner()
            .expect("owner file may mutate inventory")
            .add(item.to_string());
    }
}

/// Counter constructed in this file under `config`
pub fn counter_with_config(config: &Config) -> RxnValue<u8> {
    RxnValue::with_config(0, config)
}
