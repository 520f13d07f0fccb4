// Table unit test suite (consolidated).
//
// Each test documents what behavior is being verified. The core invariants
// exercised:
// - Round-trip: set then get yields the stored value.
// - Order: iteration follows first insertion; overwrites keep position;
//   removals keep the relative order of the rest.
// - Growth: contents and order survive repeated doubling; the load factor
//   stays at or below one half.
// - Errors: a missing key is `None`; oversized allocations fail softly.
// - Lifecycle: deinit releases everything and can be repeated.
use ordered_hm::{AllocPolicy, Handle, Table, TableError, TableOptions, DEFAULT_CAPACITY};
use std::sync::{Arc, Mutex};

fn ten_keys() -> Table<i32> {
    let mut t = Table::with_capacity(0).expect("default allocation");
    for i in 0..10 {
        t.set(&format!("key-{i}"), i).expect("insert");
    }
    t
}

fn keys(t: &Table<i32>) -> Vec<String> {
    t.keys()
        .map(|k| String::from_utf8(k.to_vec()).expect("utf8 key"))
        .collect()
}

// Test: basic insertion with the default capacity.
// Verifies: init(0) picks the default; get returns the value.
#[test]
fn insertion() {
    let mut t: Table<i32> = Table::with_capacity(0).unwrap();
    assert_eq!(t.capacity(), DEFAULT_CAPACITY);
    t.set("test", 2).unwrap();
    assert_eq!(t.get("test"), Some(&2));
}

// Test: removal of the only key.
// Verifies: get reports absence afterwards; a second remove is a no-op.
#[test]
fn removal() {
    let mut t: Table<i32> = Table::with_capacity(0).unwrap();
    t.set("test", 2).unwrap();
    assert_eq!(t.remove("test"), Some(2));
    assert_eq!(t.get("test"), None);
    assert_eq!(t.remove("test"), None);
    assert!(t.is_empty());
}

// Test: growth from capacity 2.
// Verifies: the table grew; count and order are exact.
#[test]
fn resize_from_two_slots() {
    let mut t: Table<i32> = Table::with_capacity(2).unwrap();
    assert_eq!(t.capacity(), 2);
    t.set("key-1", 1).unwrap();
    t.set("key-2", 2).unwrap();
    t.set("key-3", 3).unwrap();
    assert!(t.capacity() >= 3);
    assert_eq!(t.len(), 3);
    let entries: Vec<(Vec<u8>, i32)> = t.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
    assert_eq!(
        entries,
        vec![
            (b"key-1".to_vec(), 1),
            (b"key-2".to_vec(), 2),
            (b"key-3".to_vec(), 3)
        ]
    );
}

// Test: re-setting existing keys.
// Verifies: count does not change and order is preserved; values update.
#[test]
fn reinsertion_overwrites_in_place() {
    let mut t: Table<i32> = Table::with_capacity(2).unwrap();
    for (k, v) in [("key-1", 1), ("key-2", 2), ("key-3", 3)] {
        t.set(k, v).unwrap();
    }
    assert_eq!(t.len(), 3);
    let h = t.find("key-1").unwrap();
    let capacity = t.capacity();
    t.set("key-1", 10).unwrap();
    t.set("key-2", 2).unwrap();
    t.set("key-3", 3).unwrap();
    assert_eq!(t.len(), 3);
    assert_eq!(t.capacity(), capacity);
    assert_eq!(t.value_at(h), Some(&10), "overwrite keeps the handle valid");
    assert_eq!(t.values().copied().collect::<Vec<_>>(), vec![10, 2, 3]);
}

// Test: binary keys given with an explicit length.
// Verifies: raw integer bytes round-trip and report their length.
#[test]
fn key_with_length() {
    let mut t: Table<i32> = Table::with_capacity(0).unwrap();
    let value = 2i32;
    t.set(&value.to_ne_bytes(), value).unwrap();
    assert_eq!(t.get(&value.to_ne_bytes()), Some(&2));
    let h = t.find(&value.to_ne_bytes()).unwrap();
    assert_eq!(t.key_len_at(h), Some(4));
    t.remove(&value.to_ne_bytes());
    assert_eq!(t.get(&value.to_ne_bytes()), None);
}

#[test]
fn key_with_length_resize() {
    let mut t: Table<i32> = Table::with_capacity(2).unwrap();
    for i in 1..=3i32 {
        t.set_pod_key(&i, i).unwrap();
    }
    assert!(t.capacity() >= 3);
    assert_eq!(t.get_pod_key(&2i32), Some(&2));
}

// Test: cursor-based iteration.
// Verifies: visits all ten entries in insertion order.
#[test]
fn iterate_with_cursor() {
    let t = ten_keys();
    let mut count = 0;
    let mut cursor: Option<Handle> = t.iterate(None);
    while let Some(h) = cursor {
        assert_eq!(t.key_at(h), Some(format!("key-{count}").as_bytes()));
        assert_eq!(t.value_at(h), Some(&count));
        count += 1;
        cursor = t.iterate(Some(h));
    }
    assert_eq!(count, 10);
}

// Test: removing the first, last or a middle key from ten.
// Verifies: nine keys remain in original relative order; the removed key is gone.
#[test]
fn remove_first_last_middle() {
    for removed in ["key-0", "key-9", "key-4"] {
        let mut t = ten_keys();
        t.remove(removed);
        let expected: Vec<String> = (0..10)
            .map(|i| format!("key-{i}"))
            .filter(|k| k != removed)
            .collect();
        assert_eq!(keys(&t), expected);
        assert_eq!(t.get(removed), None);
        assert_eq!(t.len(), 9);
    }
}

// Test: many growth events.
// Verifies: every pair survives and insertion order is kept.
#[test]
fn growth_preserves_contents_and_order() {
    let mut t: Table<u64> = Table::with_capacity(4).unwrap();
    let mut capacities = vec![t.capacity()];
    for i in 0..1_000u64 {
        t.set(&i.to_le_bytes(), i * 3).unwrap();
        if *capacities.last().unwrap() != t.capacity() {
            capacities.push(t.capacity());
        }
        assert!(t.len() <= t.capacity() / 2);
    }
    assert!(capacities.len() >= 3, "grew {:?}", capacities);
    for i in 0..1_000u64 {
        assert_eq!(t.get(&i.to_le_bytes()), Some(&(i * 3)));
    }
    let order: Vec<u64> = t.values().map(|v| v / 3).collect();
    assert_eq!(order, (0..1_000).collect::<Vec<_>>());
}

// Test: deinit twice.
// Verifies: no entries, no storage, no double free; the table is reusable.
#[test]
fn idempotent_deinit() {
    let mut t = ten_keys();
    t.deinit();
    assert_eq!(t.len(), 0);
    assert_eq!(t.capacity(), 0);
    assert_eq!(t.iterate(None), None);
    t.deinit();
    assert_eq!(t.get("key-1"), None);
    t.set("again", 1).unwrap();
    assert_eq!(keys(&t), ["again"]);
}

// Test: huge capacity request.
// Verifies: fail-soft returns AllocationFailure instead of crashing.
#[test]
fn huge_number_should_fail_to_allocate() {
    let capacity = !(usize::MAX >> 1);
    let opts = TableOptions::new()
        .initial_capacity(capacity)
        .alloc_policy(AllocPolicy::FailSoft);
    let err = Table::<u8>::with_options(opts).expect_err("must not allocate");
    assert!(matches!(err, TableError::AllocationFailure { slots, .. } if slots == capacity));
    assert!(err.to_string().contains("failed to allocate"));
}

// Test: failure while growing.
// Verifies: a reserve that cannot be satisfied leaves the table intact.
#[test]
fn failed_reserve_leaves_table_untouched() {
    let opts = TableOptions::new().alloc_policy(AllocPolicy::FailSoft);
    let mut t: Table<i32> = Table::with_options(opts).unwrap();
    for i in 0..10 {
        t.set(&format!("key-{i}"), i).unwrap();
    }
    let capacity = t.capacity();
    assert!(t.reserve(usize::MAX / 2).is_err());
    assert_eq!(t.capacity(), capacity);
    assert_eq!(t.len(), 10);
    assert_eq!(t.get("key-7"), Some(&7));
}

// Test: storage allocation failing while rebuilding.
// Verifies: resize reports the failure and the table keeps its capacity,
// contents, order and handles.
#[test]
fn failed_rebuild_leaves_table_untouched() {
    let opts = TableOptions::new()
        .initial_capacity(32)
        .alloc_policy(AllocPolicy::FailSoft);
    let mut t: Table<i32> = Table::with_options(opts).unwrap();
    for i in 0..10 {
        t.set(&format!("key-{i}"), i).unwrap();
    }
    let handle = t.find("key-3").unwrap();
    let before = keys(&t);

    let err = t.resize(usize::MAX / 64).expect_err("rebuild must not allocate");
    assert!(matches!(err, TableError::AllocationFailure { slots, .. } if slots == usize::MAX / 64));
    assert_eq!(t.capacity(), 32);
    assert_eq!(t.len(), 10);
    assert_eq!(keys(&t), before);
    assert_eq!(t.value_at(handle), Some(&3));
    t.set("key-10", 10).unwrap();
    assert_eq!(t.get("key-10"), Some(&10));
}

// Test: custom ordering after the fact.
// Verifies: swap_order changes iteration only.
#[test]
fn swap_order_reorders_iteration() {
    let mut t = ten_keys();
    let a = t.find("key-0").unwrap();
    let b = t.find("key-9").unwrap();
    assert!(t.swap_order(a, b));
    let k = keys(&t);
    assert_eq!(k.first().map(String::as_str), Some("key-9"));
    assert_eq!(k.last().map(String::as_str), Some("key-0"));
    assert_eq!(t.get("key-0"), Some(&0));
}

// Test: a caller-supplied hash strategy.
// Verifies: a fully colliding closure still behaves like a map.
#[test]
fn custom_hasher_with_collisions() {
    let mut t: Table<i32> = Table::with_hasher(|_: &[u8]| 42u64);
    for i in 0..50 {
        t.set(&format!("k{i}"), i).unwrap();
    }
    for i in (0..50).step_by(3) {
        t.remove(&format!("k{i}"));
    }
    for i in 0..50 {
        let expected = (i % 3 != 0).then_some(i);
        assert_eq!(t.get(&format!("k{i}")).copied(), expected, "k{i}");
    }
}

#[test]
fn randomized_hasher_behaves_like_default() {
    let mut t: Table<i32> = Table::with_hasher(ordered_hm::RandomizedKeys::new());
    for i in 0..100 {
        t.set(&format!("k{i}"), i).unwrap();
    }
    assert_eq!(t.get("k57"), Some(&57));
    assert_eq!(t.len(), 100);
}

// Test: external serialization.
// Verifies: the table is Send, so a Mutex makes it shareable across threads.
#[test]
fn shared_behind_a_mutex() {
    let table = Arc::new(Mutex::new(Table::<u32>::new()));
    let workers: Vec<_> = (0..4u32)
        .map(|w| {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                for i in 0..100u32 {
                    let mut t = table.lock().unwrap();
                    t.set(&format!("{w}-{i}"), i).unwrap();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    let t = table.lock().unwrap();
    assert_eq!(t.len(), 400);
    assert_eq!(t.get("3-99"), Some(&99));
}

#[test]
fn mutable_iteration_updates_values() {
    let mut t = ten_keys();
    for (_, v) in &mut t {
        *v *= 2;
    }
    assert_eq!(t.get("key-9"), Some(&18));
    let sum: i32 = (&t).into_iter().map(|(_, v)| *v).sum();
    assert_eq!(sum, 90);
}
