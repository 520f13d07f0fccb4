//! RawTable: untyped engine storing byte keys and `element_size`-byte values.
//!
//! Layout
//! - `slots[i]` holds the state of position `i`: never used, tombstone, or a
//!   live entry owning its key bytes plus its links in the insertion-order
//!   list.
//! - `values` is one region of `element_size * capacity` bytes; the value of
//!   slot `i` lives at `i * element_size`. The region is made of 16-byte
//!   aligned blocks so typed layers can borrow values in place.
//!
//! Probing is linear from `hash(key) % capacity`. Lookups stop at the first
//! never-used slot; tombstones keep probe runs intact after removal.
//! `count + tombstones <= capacity / 2` holds after every completed mutation.

use crate::error::TableError;
use crate::hasher::{Fnv1a, KeyHasher};
use crate::options::{AllocPolicy, TableOptions, DEFAULT_CAPACITY};
use crate::reentrancy::DebugReentrancy;
use bytemuck::{Pod, Zeroable};
use core::fmt;
use core::ops::Range;

/// Largest value alignment a typed table can borrow in place.
pub const MAX_VALUE_ALIGN: usize = 16;

#[derive(Copy, Clone, Pod, Zeroable)]
#[repr(C, align(16))]
pub(crate) struct ValueBlock([u8; MAX_VALUE_ALIGN]);

/// Position of a live entry, usable for repeated access without re-hashing.
///
/// A handle stays valid until its entry is removed or the table rebuilds
/// its storage (growth, tombstone purge, `clear`, `deinit`, hasher
/// replacement). A stale handle never resolves to another entry: the
/// per-slot generation and table-wide epoch are 64-bit counters, so they
/// do not wrap in practice.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle {
    index: usize,
    generation: u64,
    epoch: u64,
}

impl Handle {
    /// Physical slot index this handle points at.
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) key: Box<[u8]>,
    pub(crate) prev: Option<usize>,
    pub(crate) next: Option<usize>,
}

#[derive(Debug)]
pub(crate) enum SlotState {
    Vacant,
    Tombstone,
    Live(Entry),
}

#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) state: SlotState,
    generation: u64,
}

impl Slot {
    const fn vacant() -> Self {
        Slot {
            state: SlotState::Vacant,
            generation: 0,
        }
    }

    #[inline]
    pub(crate) fn live(&self) -> Option<&Entry> {
        match &self.state {
            SlotState::Live(entry) => Some(entry),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn live_mut(&mut self) -> Option<&mut Entry> {
        match &mut self.state {
            SlotState::Live(entry) => Some(entry),
            _ => None,
        }
    }
}

enum Probe {
    Found(usize),
    /// First reusable slot on the run: a tombstone if one was crossed,
    /// otherwise the never-used slot that ended the run.
    Vacant(usize),
    Exhausted,
}

fn probe_slots(slots: &[Slot], home: usize, key: &[u8]) -> Probe {
    let capacity = slots.len();
    let mut reusable = None;
    let mut i = home;
    loop {
        match &slots[i].state {
            SlotState::Vacant => return Probe::Vacant(reusable.unwrap_or(i)),
            SlotState::Tombstone => {
                if reusable.is_none() {
                    reusable = Some(i);
                }
            }
            SlotState::Live(entry) => {
                if *entry.key == *key {
                    return Probe::Found(i);
                }
            }
        }
        i += 1;
        if i == capacity {
            i = 0;
        }
        if i == home {
            return reusable.map_or(Probe::Exhausted, Probe::Vacant);
        }
    }
}

/// First never-used slot from `home`; only valid on storage without
/// tombstones or duplicate keys.
fn first_vacant(slots: &[Slot], home: usize) -> usize {
    let capacity = slots.len();
    let mut i = home;
    while !matches!(slots[i].state, SlotState::Vacant) {
        i += 1;
        if i == capacity {
            i = 0;
        }
        if i == home {
            probe_cycle_exhausted();
        }
    }
    i
}

#[cold]
#[inline(never)]
fn probe_cycle_exhausted() -> ! {
    panic!("probe cycle exhausted: no vacant slot despite load factor bound");
}

struct Storage {
    slots: Vec<Slot>,
    values: Vec<ValueBlock>,
}

impl Storage {
    fn allocate(capacity: usize, element_size: usize) -> Result<Self, TableError> {
        let fail = |source| TableError::allocation(capacity, element_size, source);
        let blocks = capacity
            .checked_mul(element_size)
            .map(|bytes| bytes.div_ceil(MAX_VALUE_ALIGN))
            .ok_or_else(|| fail(None))?;

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|e| fail(Some(e)))?;
        slots.resize_with(capacity, Slot::vacant);

        let mut values = Vec::new();
        values.try_reserve_exact(blocks).map_err(|e| fail(Some(e)))?;
        values.resize(blocks, ValueBlock::zeroed());

        Ok(Storage { slots, values })
    }
}

fn check_alloc<T>(policy: AllocPolicy, result: Result<T, TableError>) -> Result<T, TableError> {
    result.map_err(|err| {
        tracing::error!(error = %err, ?policy, "table allocation failed");
        if policy == AllocPolicy::FailFast {
            panic!("{err}");
        }
        err
    })
}

/// Untyped insertion-ordered hash table.
///
/// Values are opaque `element_size`-byte blobs copied in and out; see
/// [`Table`](crate::Table) for the typed layer.
pub struct RawTable {
    pub(crate) slots: Vec<Slot>,
    values: Vec<ValueBlock>,
    element_size: usize,
    pub(crate) count: usize,
    tombstones: usize,
    pub(crate) first: Option<usize>,
    pub(crate) last: Option<usize>,
    epoch: u64,
    policy: AllocPolicy,
    hasher: Box<dyn KeyHasher + Send>,
    reentrancy: DebugReentrancy,
}

impl RawTable {
    /// Unallocated table; the first insert allocates [`DEFAULT_CAPACITY`]
    /// slots.
    pub fn new(element_size: usize) -> Self {
        Self::with_hasher(element_size, Fnv1a)
    }

    /// Unallocated table hashing keys with `hasher`.
    pub fn with_hasher<H>(element_size: usize, hasher: H) -> Self
    where
        H: KeyHasher + Send + 'static,
    {
        Self::from_storage(
            Storage {
                slots: Vec::new(),
                values: Vec::new(),
            },
            element_size,
            AllocPolicy::default(),
            Box::new(hasher),
        )
    }

    /// Allocate `capacity` slots up front; `0` selects [`DEFAULT_CAPACITY`].
    pub fn with_capacity(element_size: usize, capacity: usize) -> Result<Self, TableError> {
        Self::with_options(element_size, TableOptions::new().initial_capacity(capacity))
    }

    pub fn with_options(element_size: usize, options: TableOptions) -> Result<Self, TableError> {
        Self::with_options_and_hasher(element_size, options, Fnv1a)
    }

    pub fn with_options_and_hasher<H>(
        element_size: usize,
        options: TableOptions,
        hasher: H,
    ) -> Result<Self, TableError>
    where
        H: KeyHasher + Send + 'static,
    {
        let storage = check_alloc(
            options.alloc_policy,
            Storage::allocate(options.resolved_capacity(), element_size),
        )?;
        Ok(Self::from_storage(
            storage,
            element_size,
            options.alloc_policy,
            Box::new(hasher),
        ))
    }

    fn from_storage(
        storage: Storage,
        element_size: usize,
        policy: AllocPolicy,
        hasher: Box<dyn KeyHasher + Send>,
    ) -> Self {
        Self {
            slots: storage.slots,
            values: storage.values,
            element_size,
            count: 0,
            tombstones: 0,
            first: None,
            last: None,
            epoch: 0,
            policy,
            hasher,
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of slots, live or not.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Slots vacated by removal that still extend probe runs.
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    pub fn alloc_policy(&self) -> AllocPolicy {
        self.policy
    }

    #[inline]
    fn hash(&self, key: &[u8]) -> u64 {
        let _g = self.reentrancy.enter();
        self.hasher.hash_key(key)
    }

    #[inline]
    fn home(&self, key: &[u8], capacity: usize) -> usize {
        (self.hash(key) % capacity as u64) as usize
    }

    fn probe(&self, key: &[u8]) -> Probe {
        if self.slots.is_empty() {
            return Probe::Exhausted;
        }
        probe_slots(&self.slots, self.home(key, self.slots.len()), key)
    }

    pub(crate) fn lookup(&self, key: &[u8]) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        match self.probe(key) {
            Probe::Found(index) => Some(index),
            Probe::Vacant(_) | Probe::Exhausted => None,
        }
    }

    pub(crate) fn handle(&self, index: usize) -> Handle {
        Handle {
            index,
            generation: self.slots[index].generation,
            epoch: self.epoch,
        }
    }

    /// Slot index of a handle that still refers to a live entry.
    pub(crate) fn resolve(&self, handle: Handle) -> Option<usize> {
        if handle.epoch != self.epoch {
            return None;
        }
        let slot = self.slots.get(handle.index)?;
        (slot.generation == handle.generation && slot.live().is_some()).then_some(handle.index)
    }

    #[inline]
    fn value_range(&self, index: usize) -> Range<usize> {
        let start = index * self.element_size;
        start..start + self.element_size
    }

    pub(crate) fn value_bytes(&self, index: usize) -> &[u8] {
        let range = self.value_range(index);
        &bytemuck::cast_slice::<ValueBlock, u8>(&self.values)[range]
    }

    pub(crate) fn value_bytes_mut(&mut self, index: usize) -> &mut [u8] {
        let range = self.value_range(index);
        &mut bytemuck::cast_slice_mut::<ValueBlock, u8>(&mut self.values)[range]
    }

    /// Whole value region, `element_size * capacity` bytes long.
    pub(crate) fn value_region_mut(&mut self) -> (&[Slot], &mut [u8]) {
        let len = self.slots.len() * self.element_size;
        let bytes = bytemuck::cast_slice_mut::<ValueBlock, u8>(&mut self.values);
        (&self.slots, &mut bytes[..len])
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.lookup(key).map(|index| self.value_bytes(index))
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut [u8]> {
        let index = self.lookup(key)?;
        Some(self.value_bytes_mut(index))
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.lookup(key).is_some()
    }

    pub fn find(&self, key: &[u8]) -> Option<Handle> {
        self.lookup(key).map(|index| self.handle(index))
    }

    /// Insert `key` or overwrite its value in place.
    ///
    /// Overwriting keeps the entry's position in iteration order and its
    /// key allocation. Inserting a new key may grow the table first, which
    /// invalidates every outstanding handle.
    ///
    /// # Panics
    ///
    /// If `value.len() != self.element_size()`.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<Handle, TableError> {
        assert_eq!(
            value.len(),
            self.element_size,
            "value length must equal the table's element size"
        );
        let index = match self.probe(key) {
            Probe::Found(index) => index,
            Probe::Vacant(index) if self.has_room() => self.claim(index, key),
            Probe::Vacant(_) | Probe::Exhausted => {
                self.make_room()?;
                match self.probe(key) {
                    Probe::Vacant(index) => self.claim(index, key),
                    Probe::Found(_) | Probe::Exhausted => probe_cycle_exhausted(),
                }
            }
        };
        self.value_bytes_mut(index).copy_from_slice(value);
        Ok(self.handle(index))
    }

    /// Remove `key`; absent keys are a no-op. Returns whether an entry was
    /// removed.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        self.remove_slot(key).is_some()
    }

    /// Remove the entry behind `handle`. Returns `false` for stale handles.
    pub fn remove_at(&mut self, handle: Handle) -> bool {
        match self.resolve(handle) {
            Some(index) => {
                self.vacate(index);
                true
            }
            None => false,
        }
    }

    /// Remove `key` and return the slot it occupied. The value bytes at that
    /// slot stay readable until the next insertion.
    pub(crate) fn remove_slot(&mut self, key: &[u8]) -> Option<usize> {
        let index = self.lookup(key)?;
        self.vacate(index);
        Some(index)
    }

    fn has_room(&self) -> bool {
        self.count + self.tombstones < self.slots.len() / 2
    }

    fn claim(&mut self, index: usize, key: &[u8]) -> usize {
        if matches!(self.slots[index].state, SlotState::Tombstone) {
            self.tombstones -= 1;
        }
        self.slots[index].state = SlotState::Live(Entry {
            key: key.into(),
            prev: None,
            next: None,
        });
        self.push_back(index);
        self.count += 1;
        index
    }

    fn vacate(&mut self, index: usize) {
        self.unlink(index);
        let capacity = self.slots.len();
        let next = (index + 1) % capacity;
        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        if matches!(self.slots[next].state, SlotState::Vacant) {
            // No probe run continues past `index`, so it and the tombstones
            // directly before it can become never-used again.
            self.slots[index].state = SlotState::Vacant;
            let mut i = index;
            loop {
                i = if i == 0 { capacity - 1 } else { i - 1 };
                if i == index || !matches!(self.slots[i].state, SlotState::Tombstone) {
                    break;
                }
                self.slots[i].state = SlotState::Vacant;
                self.tombstones -= 1;
            }
        } else {
            self.slots[index].state = SlotState::Tombstone;
            self.tombstones += 1;
        }
        self.count -= 1;
    }

    /// Rebuild so one more entry fits under the load factor bound.
    fn make_room(&mut self) -> Result<(), TableError> {
        let capacity = self.slots.len();
        let needed = self.count + 1;
        if capacity > 0 && needed <= capacity / 4 {
            tracing::trace!(
                count = self.count,
                tombstones = self.tombstones,
                capacity,
                "purging tombstones"
            );
            return self.rebuild(capacity);
        }
        let new_capacity = self.grown_capacity(needed)?;
        tracing::debug!(
            count = self.count,
            old_capacity = capacity,
            new_capacity,
            "growing table"
        );
        self.rebuild(new_capacity)
    }

    fn grown_capacity(&self, entries: usize) -> Result<usize, TableError> {
        let capacity = self.slots.len();
        let doubled = if capacity == 0 {
            Some(DEFAULT_CAPACITY)
        } else {
            capacity.checked_mul(2)
        };
        let grown = doubled
            .zip(entries.checked_mul(2))
            .map(|(doubled, minimum)| doubled.max(minimum));
        let overflow = || TableError::allocation(usize::MAX, self.element_size, None);
        check_alloc(self.policy, grown.ok_or_else(overflow))
    }

    /// Move every live entry, in order, into fresh storage of
    /// `new_capacity` slots. On allocation failure nothing changes.
    fn rebuild(&mut self, new_capacity: usize) -> Result<(), TableError> {
        debug_assert!(self.count <= new_capacity / 2);
        let mut storage = check_alloc(
            self.policy,
            Storage::allocate(new_capacity, self.element_size),
        )?;

        // Pass 1 places entries and copies values while the old table is
        // still intact; the key hasher may panic here.
        let (mut first, mut last) = (None, None);
        let mut cursor = self.first;
        while let Some(old) = cursor {
            let Some(entry) = self.slots[old].live() else {
                unreachable!("order list points at a non-live slot");
            };
            let index = first_vacant(&storage.slots, self.home(&entry.key, new_capacity));
            storage.slots[index].state = SlotState::Live(Entry {
                key: Box::default(),
                prev: last,
                next: None,
            });
            if let Some(tail) = last.and_then(|l| storage.slots[l].live_mut()) {
                tail.next = Some(index);
            }
            first = first.or(Some(index));
            last = Some(index);

            let dst = self.value_range(index);
            bytemuck::cast_slice_mut::<ValueBlock, u8>(&mut storage.values)[dst]
                .copy_from_slice(self.value_bytes(old));
            cursor = entry.next;
        }

        // Pass 2 moves the keys across; both lists have the same order.
        let (mut old_cursor, mut new_cursor) = (self.first, first);
        while let (Some(old), Some(new)) = (old_cursor, new_cursor) {
            let (Some(from), Some(to)) = (self.slots[old].live_mut(), storage.slots[new].live_mut())
            else {
                unreachable!("order lists diverged during rebuild");
            };
            to.key = core::mem::take(&mut from.key);
            old_cursor = from.next;
            new_cursor = to.next;
        }

        self.slots = storage.slots;
        self.values = storage.values;
        self.first = first;
        self.last = last;
        self.tombstones = 0;
        self.epoch = self.epoch.wrapping_add(1);
        Ok(())
    }

    /// Rebuild with `new_capacity` slots, raised to the smallest capacity
    /// that keeps the current entries within the load factor bound.
    pub fn resize(&mut self, new_capacity: usize) -> Result<(), TableError> {
        self.rebuild(new_capacity.max(self.count * 2))
    }

    /// Ensure `additional` more entries fit without another rebuild.
    pub fn reserve(&mut self, additional: usize) -> Result<(), TableError> {
        let entries = self.count.checked_add(additional);
        let needed = check_alloc(
            self.policy,
            entries
                .and_then(|e| e.checked_add(self.tombstones))
                .ok_or_else(|| TableError::allocation(usize::MAX, self.element_size, None)),
        )?;
        if needed <= self.slots.len() / 2 {
            return Ok(());
        }
        let new_capacity = self.grown_capacity(self.count + additional)?;
        self.rebuild(new_capacity)
    }

    /// Replace the key hasher. A non-empty table is rehashed in place so
    /// existing keys stay reachable; on allocation failure the previous
    /// hasher is kept.
    pub fn set_hasher<H>(&mut self, hasher: H) -> Result<(), TableError>
    where
        H: KeyHasher + Send + 'static,
    {
        let previous = core::mem::replace(&mut self.hasher, Box::new(hasher));
        if self.count == 0 && self.tombstones == 0 {
            return Ok(());
        }
        tracing::warn!(count = self.count, "key hasher replaced on a non-empty table; rehashing");
        self.rebuild(self.slots.len()).inspect_err(|_| {
            self.hasher = previous;
        })
    }

    /// Remove every entry, keeping the allocation.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.state = SlotState::Vacant;
        }
        self.count = 0;
        self.tombstones = 0;
        self.first = None;
        self.last = None;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Remove every entry and release all storage. Calling it again is a
    /// no-op; inserting afterwards allocates [`DEFAULT_CAPACITY`] slots.
    pub fn deinit(&mut self) {
        self.slots = Vec::new();
        self.values = Vec::new();
        self.count = 0;
        self.tombstones = 0;
        self.first = None;
        self.last = None;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

impl fmt::Debug for RawTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawTable")
            .field("len", &self.count)
            .field("capacity", &self.slots.len())
            .field("element_size", &self.element_size)
            .field("tombstones", &self.tombstones)
            .finish_non_exhaustive()
    }
}
