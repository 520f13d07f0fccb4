#![cfg(test)]

// Property tests for RawTable kept inside the crate so they can observe
// tombstone and capacity bookkeeping directly.

use crate::hasher::KeyHasher;
use crate::options::TableOptions;
use crate::raw_table::RawTable;
use proptest::prelude::*;

// Pool-indexed operations so shrinking moves towards earlier keys and
// shorter op lists.
#[derive(Clone, Debug)]
enum OpI {
    Set(usize, u32),
    Remove(usize),
    Get(usize),
    Swap(usize, usize),
    RemoveFirst,
    Resize(usize),
}

#[derive(Copy, Clone, Debug)]
enum HashKind {
    Fnv,
    Constant,
    LowEntropy,
}

fn build(kind: HashKind, capacity: usize) -> RawTable {
    let opts = TableOptions::new().initial_capacity(capacity);
    let table = match kind {
        HashKind::Fnv => RawTable::with_options(4, opts),
        HashKind::Constant => RawTable::with_options_and_hasher(4, opts, |_: &[u8]| 0u64),
        HashKind::LowEntropy => RawTable::with_options_and_hasher(4, opts, |k: &[u8]| {
            k.first().copied().unwrap_or(0) as u64 % 4
        }),
    };
    table.unwrap()
}

fn arb_scenario() -> impl Strategy<Value = (Vec<Vec<u8>>, Vec<OpI>)> {
    proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..6), 1..=24).prop_flat_map(
        |pool| {
            let n = pool.len();
            let op = prop_oneof![
                4 => (0..n, any::<u32>()).prop_map(|(i, v)| OpI::Set(i, v)),
                3 => (0..n).prop_map(OpI::Remove),
                2 => (0..n).prop_map(OpI::Get),
                1 => (0..n, 0..n).prop_map(|(i, j)| OpI::Swap(i, j)),
                1 => Just(OpI::RemoveFirst),
                1 => (0usize..80).prop_map(OpI::Resize),
            ];
            proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
        },
    )
}

fn arb_hash_kind() -> impl Strategy<Value = HashKind> {
    prop_oneof![
        Just(HashKind::Fnv),
        Just(HashKind::Constant),
        Just(HashKind::LowEntropy)
    ]
}

fn value_of(bytes: &[u8]) -> u32 {
    u32::from_ne_bytes(bytes.try_into().expect("4-byte value"))
}

fn check_against_model(
    sut: &RawTable,
    model: &[(Vec<u8>, u32)],
) -> Result<(), TestCaseError> {
    prop_assert_eq!(sut.len(), model.len());
    prop_assert!(
        sut.len() + sut.tombstones() <= sut.capacity() / 2,
        "load bound: len={} tombstones={} capacity={}",
        sut.len(),
        sut.tombstones(),
        sut.capacity()
    );
    let forward: Vec<(Vec<u8>, u32)> = sut.iter().map(|(k, v)| (k.to_vec(), value_of(v))).collect();
    prop_assert_eq!(&forward[..], model);
    let mut backward: Vec<(Vec<u8>, u32)> =
        sut.iter().rev().map(|(k, v)| (k.to_vec(), value_of(v))).collect();
    backward.reverse();
    prop_assert_eq!(&backward[..], model);
    for (k, v) in model {
        prop_assert_eq!(sut.get(k).map(value_of), Some(*v));
    }
    Ok(())
}

// Property: state-machine equivalence against an ordered Vec model.
// Invariants exercised across random insert/remove/lookup sequences under
// colliding hashers:
// - Every present key stays reachable; tombstones never cut a probe run.
// - Removed keys are absent; removing an absent key changes nothing.
// - Iteration order equals first-insertion order, overwrites keep position,
//   and prev/next links agree in both directions.
// - `len + tombstones <= capacity / 2` after every operation.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(
        kind in arb_hash_kind(),
        capacity in 1usize..16,
        (pool, ops) in arb_scenario(),
    ) {
        let mut sut = build(kind, capacity);
        let mut model: Vec<(Vec<u8>, u32)> = Vec::new();

        for op in ops {
            match op {
                OpI::Set(i, v) => {
                    let k = &pool[i];
                    let h = sut.set(k, &v.to_ne_bytes()).unwrap();
                    prop_assert_eq!(sut.key_at(h), Some(&k[..]));
                    match model.iter_mut().find(|(mk, _)| mk == k) {
                        Some(entry) => entry.1 = v,
                        None => model.push((k.clone(), v)),
                    }
                }
                OpI::Remove(i) => {
                    let k = &pool[i];
                    let pos = model.iter().position(|(mk, _)| mk == k);
                    prop_assert_eq!(sut.remove(k), pos.is_some());
                    if let Some(pos) = pos {
                        model.remove(pos);
                    }
                    prop_assert!(sut.get(k).is_none());
                }
                OpI::Get(i) => {
                    let k = &pool[i];
                    let expected = model.iter().find(|(mk, _)| mk == k).map(|(_, v)| *v);
                    prop_assert_eq!(sut.get(k).map(value_of), expected);
                    prop_assert_eq!(sut.find(k).is_some(), expected.is_some());
                }
                OpI::Swap(i, j) => {
                    let (ki, kj) = (&pool[i], &pool[j]);
                    let pi = model.iter().position(|(mk, _)| mk == ki);
                    let pj = model.iter().position(|(mk, _)| mk == kj);
                    if let (Some(pi), Some(pj)) = (pi, pj) {
                        let hi = sut.find(ki).unwrap();
                        let hj = sut.find(kj).unwrap();
                        prop_assert!(sut.swap_order(hi, hj));
                        model.swap(pi, pj);
                        // Swapping keeps both handles valid.
                        prop_assert_eq!(sut.key_at(hi), Some(&ki[..]));
                    }
                }
                OpI::RemoveFirst => {
                    match sut.first() {
                        Some(h) => {
                            prop_assert!(sut.remove_at(h));
                            model.remove(0);
                        }
                        None => prop_assert!(model.is_empty()),
                    }
                }
                OpI::Resize(n) => {
                    sut.resize(n).unwrap();
                    prop_assert_eq!(sut.tombstones(), 0);
                }
            }
            check_against_model(&sut, &model)?;
        }
    }
}

// Property: growth preserves contents and order for any number of distinct
// keys, however small the starting capacity.
proptest! {
    #[test]
    fn prop_growth_preserves_order(capacity in 1usize..8, n in 0usize..300) {
        let mut sut = RawTable::with_capacity(4, capacity).unwrap();
        let mut grew = 0;
        for i in 0..n as u32 {
            let before = sut.capacity();
            sut.set(format!("key-{i}").as_bytes(), &i.to_ne_bytes()).unwrap();
            if sut.capacity() != before {
                grew += 1;
            }
            prop_assert!(sut.len() <= sut.capacity() / 2);
        }
        let got: Vec<u32> = sut.iter().map(|(_, v)| value_of(v)).collect();
        prop_assert_eq!(got, (0..n as u32).collect::<Vec<_>>());
        if n >= 4 * capacity {
            prop_assert!(grew >= 2, "expected at least two growth events, saw {}", grew);
        }
    }
}

// Property: replacing the hasher mid-life rehashes without losing entries.
proptest! {
    #[test]
    fn prop_hasher_swap_keeps_entries(keys in proptest::collection::hash_set("[a-z]{1,8}", 0..40), modulus in 1u64..8) {
        let keys: Vec<String> = keys.into_iter().collect();
        let mut sut = RawTable::with_capacity(4, 2).unwrap();
        for (i, k) in keys.iter().enumerate() {
            sut.set(k.as_bytes(), &(i as u32).to_ne_bytes()).unwrap();
        }
        sut.set_hasher(move |k: &[u8]| crate::Fnv1a.hash_key(k) % modulus).unwrap();
        for (i, k) in keys.iter().enumerate() {
            prop_assert_eq!(sut.get(k.as_bytes()).map(value_of), Some(i as u32));
        }
        let order: Vec<Vec<u8>> = sut.iter().map(|(k, _)| k.to_vec()).collect();
        let expected: Vec<Vec<u8>> = keys.iter().map(|k| k.as_bytes().to_vec()).collect();
        prop_assert_eq!(order, expected);
    }
}
