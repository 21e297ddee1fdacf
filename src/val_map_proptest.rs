#![cfg(test)]

// Property tests for ValMap kept inside the crate so they can reach the
// handle and hash internals directly.

use crate::key_hash::{KeyHash, ValueKey};
use crate::val_map::ValMap;
use proptest::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::hash::{BuildHasher, Hasher};

// Identified by `id` alone; `label` shows which instance became canonical.
#[derive(Clone, Debug, Serialize)]
struct Keyed {
    id: u8,
    label: String,
}

impl ValueKey for Keyed {
    fn value_hash(&self) -> Option<String> {
        Some(format!("Keyed({})", self.id))
    }
}

#[derive(Clone, Debug)]
enum Op {
    Set(u8, String, i32),
    Get(u8, String),
    Delete(u8, String),
    Mutate(u8, i32),
    Iterate,
    Clear,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let id = 0u8..6;
    let label = "[a-c]{0,2}";
    let op = prop_oneof![
        4 => (id.clone(), label, any::<i32>()).prop_map(|(i, l, v)| Op::Set(i, l, v)),
        3 => (id.clone(), label).prop_map(|(i, l)| Op::Get(i, l)),
        2 => (id.clone(), label).prop_map(|(i, l)| Op::Delete(i, l)),
        1 => (id.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
        1 => Just(Op::Iterate),
        1 => Just(Op::Clear),
    ];
    proptest::collection::vec(op, 1..80)
}

// Model entry: (canonical label, value).
type Model = HashMap<u8, (String, i32)>;

fn run<S: BuildHasher>(mut sut: ValMap<Keyed, i32, S>, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let mut model: Model = HashMap::new();
    for op in ops {
        match op {
            Op::Set(id, label, v) => {
                let prev = sut.insert(Keyed { id, label: label.clone() }, v).expect("non-absent key");
                let expected = model.get(&id).map(|(_, mv)| *mv);
                prop_assert_eq!(prev, expected);
                model
                    .entry(id)
                    .and_modify(|e| e.1 = v)
                    .or_insert((label, v));
            }
            Op::Get(id, label) => {
                let query = Keyed { id, label };
                prop_assert_eq!(sut.get(&query), model.get(&id).map(|(_, v)| v));
                prop_assert_eq!(sut.has(&query), model.contains_key(&id));
                prop_assert_eq!(
                    sut.canonical_key(&query).map(|k| k.label.clone()),
                    model.get(&id).map(|(l, _)| l.clone())
                );
            }
            Op::Delete(id, label) => {
                let removed = sut.remove(&Keyed { id, label });
                let expected = model.remove(&id);
                prop_assert_eq!(removed.map(|(k, v)| (k.label, v)), expected);
            }
            Op::Mutate(id, d) => {
                let query = Keyed { id, label: String::new() };
                if let Some(h) = sut.find(&query) {
                    let vr = h.value_mut(&mut sut).expect("live handle resolves");
                    *vr = vr.wrapping_add(d);
                    let mv = model.get_mut(&id).expect("present in model");
                    mv.1 = mv.1.wrapping_add(d);
                } else {
                    prop_assert!(!model.contains_key(&id));
                }
            }
            Op::Iterate => {
                let s: BTreeSet<_> = sut.iter().map(|(k, v)| (k.id, k.label.clone(), *v)).collect();
                let m: BTreeSet<_> = model.iter().map(|(id, (l, v))| (*id, l.clone(), *v)).collect();
                prop_assert_eq!(s, m);
                for (h, k, _) in sut.handles() {
                    let expected = KeyHash::Text(format!("Keyed({})", k.id));
                    prop_assert_eq!(h.hash(&sut), Some(&expected));
                }
            }
            Op::Clear => {
                sut.clear();
                model.clear();
            }
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Property: state-machine equivalence against a HashMap keyed by the
// self-reported hash. Exercised invariants:
// - one entry per hash; `len` parity after every op;
// - first writer stays canonical until deletion;
// - `insert` returns the previous value, `remove` the canonical key;
// - iteration yields exactly the model's entries.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(ops in arb_ops()) {
        run(ValMap::new(), ops)?;
    }
}

#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: same invariants when every registry hash collides, so slot
// resolution relies on `KeyHash` equality alone.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions(ops in arb_ops()) {
        run(ValMap::with_hasher(ConstBuildHasher), ops)?;
    }
}
