use proptest::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use val_map::{ValMap, ValueKey};

#[derive(Clone, Debug, Serialize)]
struct Record {
    name: String,
    tags: BTreeMap<String, i32>,
    nested: Vec<(u8, bool)>,
}

impl ValueKey for Record {}

fn arb_record() -> impl Strategy<Value = Record> {
    (
        "[a-c]{0,3}",
        proptest::collection::btree_map("[a-c]{1,2}", -3i32..3, 0..3),
        proptest::collection::vec((0u8..3, any::<bool>()), 0..3),
    )
        .prop_map(|(name, tags, nested)| Record { name, tags, nested })
}

// Model a ValMap against a HashMap keyed by the records' JSON value, which
// compares structurally. Sets and deletes go through fresh clones so no
// lookup reuses the stored instance.
proptest! {
    #[test]
    fn prop_structural_keys_match_model(
        pool in proptest::collection::vec(arb_record(), 1..6),
        ops in proptest::collection::vec((0u8..3, 0usize..100, any::<i16>()), 1..60),
    ) {
        let mut m: ValMap<Record, i16> = ValMap::new();
        let mut model: HashMap<String, i16> = HashMap::new();
        let id = |r: &Record| serde_json::to_value(r).unwrap().to_string();

        for (op, raw, v) in ops {
            let key = pool[raw % pool.len()].clone();
            match op {
                0 => {
                    m.set(key.clone(), v).unwrap();
                    model.insert(id(&key), v);
                }
                1 => {
                    prop_assert_eq!(m.delete(&key), model.remove(&id(&key)).is_some());
                }
                2 => {
                    prop_assert_eq!(m.get(&key), model.get(&id(&key)));
                    prop_assert_eq!(m.has(&key), model.contains_key(&id(&key)));
                }
                _ => unreachable!(),
            }
            prop_assert_eq!(m.len(), model.len());
        }
        prop_assert_eq!(m.values().count(), model.len());
    }
}

// Property: distinct structures never alias, equal ones always do.
proptest! {
    #[test]
    fn prop_no_cross_contamination(a in arb_record(), b in arb_record()) {
        let mut m = ValMap::new();
        m.set(a.clone(), 1).unwrap();
        m.set(b.clone(), 2).unwrap();
        let same = serde_json::to_value(&a).unwrap() == serde_json::to_value(&b).unwrap();
        if same {
            prop_assert_eq!(m.len(), 1);
            prop_assert_eq!(m.get(&a), Some(&2));
        } else {
            prop_assert_eq!(m.len(), 2);
            prop_assert_eq!(m.get(&a), Some(&1));
            prop_assert_eq!(m.get(&b), Some(&2));
        }
    }
}
