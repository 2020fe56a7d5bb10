//! Property tests for dispatch ordering and collection signals

use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use rxn::{Entity, OwnerRef, RxnEvent, RxnList};

#[derive(Debug, Clone)]
enum ListOp {
    Add(u8),
    Remove(u8),
    Clear,
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        4 => (0u8..6).prop_map(ListOp::Add),
        2 => (0u8..6).prop_map(ListOp::Remove),
        1 => Just(ListOp::Clear),
    ]
}

proptest! {
    #[test]
    fn subscribers_fire_in_order_exactly_once(subscribers in 1usize..20, publishes in 1u32..8) {
        let event: RxnEvent<u32> = RxnEvent::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for index in 0..subscribers {
            let sink = Arc::clone(&log);
            event.on_invoked(OwnerRef::unowned(), move |payload: &u32| sink.lock().push((*payload, index)));
        }

        let owner = event.as_owner().unwrap();
        for payload in 0..publishes {
            owner.invoke(payload);
        }

        let expected: Vec<(u32, usize)> = (0..publishes)
            .flat_map(|payload| (0..subscribers).map(move |index| (payload, index)))
            .collect();
        prop_assert_eq!(&*log.lock(), &expected);
    }

    #[test]
    fn removed_handlers_never_fire(removals in proptest::collection::vec(any::<bool>(), 1..16)) {
        let event: RxnEvent<()> = RxnEvent::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..removals.len())
            .map(|index| {
                let sink = Arc::clone(&log);
                event.on_invoked(OwnerRef::unowned(), move |_: &()| sink.lock().push(index))
            })
            .collect();

        for (handle, remove) in handles.iter().zip(&removals) {
            if *remove {
                prop_assert!(event.remove_handler(*handle));
                prop_assert!(!event.remove_handler(*handle));
            }
        }
        event.as_owner().unwrap().invoke(());

        let expected: Vec<usize> = removals
            .iter()
            .enumerate()
            .filter(|(_, remove)| !**remove)
            .map(|(index, _)| index)
            .collect();
        prop_assert_eq!(&*log.lock(), &expected);
    }

    #[test]
    fn dead_owners_are_pruned_in_one_pass(alive in proptest::collection::vec(any::<bool>(), 1..16)) {
        let event: RxnEvent<u8> = RxnEvent::new();
        let hits = Arc::new(Mutex::new(0usize));
        let entities: Vec<Entity> = alive.iter().map(|_| Entity::new("subscriber")).collect();
        for entity in &entities {
            let counter = Arc::clone(&hits);
            event.on_invoked(entity, move |_: &u8| *counter.lock() += 1);
        }
        for (entity, keep) in entities.iter().zip(&alive) {
            if !*keep {
                entity.destroy();
            }
        }

        event.as_owner().unwrap().invoke(1);

        let live = alive.iter().filter(|keep| **keep).count();
        prop_assert_eq!(*hits.lock(), live);
        prop_assert_eq!(event.subscriber_count(), live);
    }

    #[test]
    fn list_tracks_model_and_changed_count(ops in proptest::collection::vec(list_op(), 0..40)) {
        let list: RxnList<u8> = RxnList::new();
        let changes = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&changes);
        list.on_changed(OwnerRef::unowned(), move || *counter.lock() += 1);

        let owner = list.as_owner().unwrap();
        let mut model: Vec<u8> = Vec::new();
        let mut effective = 0usize;
        for op in ops {
            match op {
                ListOp::Add(v) => {
                    owner.add(v);
                    model.push(v);
                    effective += 1;
                }
                ListOp::Remove(v) => {
                    if let Some(index) = model.iter().position(|x| *x == v) {
                        model.remove(index);
                        effective += 1;
                    }
                    owner.remove(&v);
                }
                ListOp::Clear => {
                    if !model.is_empty() {
                        model.clear();
                        effective += 1;
                    }
                    owner.clear();
                }
            }
        }

        prop_assert_eq!(list.items(), model);
        prop_assert_eq!(*changes.lock(), effective);
    }
}
