//! Property tests for the entity registry and deferred command buffer.
//!
//! Random sequences of inserts, immediate removals and deferred
//! spawn/despawn commands must keep the registry consistent with a simple
//! model: every id the model considers live resolves to its value, every
//! removed id stays dead forever, and the live count always matches.

use std::collections::BTreeMap;

use floe_world::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Insert(u32),
    Remove(usize),
    QueueSpawn(u32),
    QueueDespawn(usize),
    Apply,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u32>().prop_map(Op::Insert),
        (0..64usize).prop_map(Op::Remove),
        any::<u32>().prop_map(Op::QueueSpawn),
        (0..64usize).prop_map(Op::QueueDespawn),
        Just(Op::Apply),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn registry_matches_model(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let mut reg: Registry<u32> = Registry::new();
        let mut cmds: CommandBuffer<u32> = CommandBuffer::new();
        let mut model: BTreeMap<EntityId, u32> = BTreeMap::new();
        let mut dead: Vec<EntityId> = Vec::new();
        let mut ever: Vec<EntityId> = Vec::new();

        for op in ops {
            match op {
                Op::Insert(v) => {
                    let id = reg.insert(v);
                    prop_assert!(!model.contains_key(&id));
                    model.insert(id, v);
                    ever.push(id);
                }
                Op::Remove(i) => {
                    if ever.is_empty() { continue; }
                    let id = ever[i % ever.len()];
                    let expected = model.remove(&id);
                    prop_assert_eq!(reg.remove(id), expected);
                    if expected.is_some() { dead.push(id); }
                }
                Op::QueueSpawn(v) => {
                    cmds.spawn(v, SystemId::INTERACTION, CausalReason::GameRule("spawn".into()));
                }
                Op::QueueDespawn(i) => {
                    if ever.is_empty() { continue; }
                    let id = ever[i % ever.len()];
                    cmds.despawn(id, SystemId::INTERACTION, CausalReason::GameRule("despawn".into()));
                }
                Op::Apply => {
                    for record in cmds.apply(&mut reg) {
                        if let Some(id) = record.spawned {
                            prop_assert!(reg.contains(id));
                            model.insert(id, *reg.get(id).unwrap());
                            ever.push(id);
                        } else if record.applied_successfully {
                            let id = record.target.unwrap();
                            prop_assert!(model.remove(&id).is_some());
                            dead.push(id);
                        }
                    }
                }
            }

            prop_assert_eq!(reg.len(), model.len());
            for (id, v) in &model {
                prop_assert_eq!(reg.get(*id), Some(v));
            }
            for id in &dead {
                prop_assert!(!reg.contains(*id));
            }
            let ids = reg.ids();
            let mut sorted = ids.clone();
            sorted.sort();
            prop_assert_eq!(ids, sorted);
        }
    }
}
