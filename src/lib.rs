//! ordered-hm: an insertion-ordered, open-addressing hash table mapping
//! byte-sequence keys to fixed-size values.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a small, embeddable table with explicit control over memory
//!   layout and growth, whose iteration order is the order keys were first
//!   inserted.
//! - Layers:
//!   - RawTable: untyped engine. Owns the slot array, the value region
//!     (`element_size * capacity` bytes), the insertion-order list and the
//!     key hasher. Values are opaque byte blobs.
//!   - Table<T>: typed layer for plain-old-data values; borrows values in
//!     place and holds no state of its own.
//!
//! Slots and probing
//! - Linear probing from `hash(key) % capacity`, wrapping at the end.
//! - Removal leaves a tombstone unless no probe run continues past the
//!   slot, so lookups for other keys never stop early at a hole.
//! - Load bound: `len + tombstones <= capacity / 2` after every mutation.
//!   An insert that would break it doubles the table, or rehashes in place
//!   when tombstones dominate.
//!
//! Order
//! - Live slots form a doubly linked list (`prev`/`next` slot indices)
//!   from the oldest to the newest entry. Overwriting a key keeps its
//!   position; removal unlinks it; `swap_order` exchanges two positions.
//! - Growth walks the old list and re-inserts in that order, so the new
//!   list comes out identical.
//!
//! Handles and references
//! - `find`/`set` return a [`Handle`]: a slot index plus generation and
//!   epoch counters. Handles resolve in O(1) without hashing and go stale
//!   when their entry is removed or storage is rebuilt.
//! - Value references borrow the table, so they cannot be held across a
//!   mutating call that might move the value region.
//!
//! Errors
//! - Allocation failure is the only error ([`TableError`]). Under
//!   [`AllocPolicy::FailSoft`] it is returned and the table is unchanged;
//!   under [`AllocPolicy::FailFast`] it panics. A missing key is `None`.
//!
//! Concurrency
//! - Single-threaded and synchronous. Tables are `Send`, so callers that
//!   share one wrap it in a lock.
//! - The key hasher is the only user code the engine calls; a debug-only
//!   guard panics if it re-enters the table.

mod error;
mod hasher;
mod options;
mod order;
pub mod raw_table;
mod raw_table_proptest;
mod reentrancy;
pub mod table;

pub use error::TableError;
pub use hasher::{fnv1a, BuildHasherKeys, Fnv1a, KeyHasher, RandomizedKeys};
pub use options::{AllocPolicy, TableOptions, DEFAULT_CAPACITY};
pub use order::{Iter as RawIter, IterMut as RawIterMut};
pub use raw_table::{Handle, RawTable, MAX_VALUE_ALIGN};
pub use table::Table;
