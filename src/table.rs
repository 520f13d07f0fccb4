//! Table<T>: typed layer over `RawTable` for plain-old-data values.
//!
//! Values are stored as their bytes and borrowed back in place, so `T` must
//! be [`Pod`] with an alignment of at most [`MAX_VALUE_ALIGN`]. Keys are any
//! byte sequence: `&str`, `String`, `&[u8]`, byte arrays, or (through the
//! `*_pod_key` methods) the raw bytes of a plain-old-data value.

use crate::error::TableError;
use crate::hasher::KeyHasher;
use crate::options::TableOptions;
use crate::raw_table::{Handle, RawTable, MAX_VALUE_ALIGN};
use crate::{RawIter, RawIterMut};
use bytemuck::{NoUninit, Pod};
use core::fmt;
use core::iter::FusedIterator;
use core::marker::PhantomData;

/// Insertion-ordered hash table from byte keys to `T`.
///
/// References returned by lookups borrow the table, so they cannot outlive
/// the next mutating call; growth may move every value.
pub struct Table<T> {
    raw: RawTable,
    _values: PhantomData<T>,
}

impl Handle {
    pub fn key<'a, T: Pod>(&self, table: &'a Table<T>) -> Option<&'a [u8]> {
        table.key_at(*self)
    }

    pub fn value<'a, T: Pod>(&self, table: &'a Table<T>) -> Option<&'a T> {
        table.value_at(*self)
    }

    pub fn value_mut<'a, T: Pod>(&self, table: &'a mut Table<T>) -> Option<&'a mut T> {
        table.value_at_mut(*self)
    }
}

impl<T: Pod> Table<T> {
    const ALIGN_FITS: () = assert!(
        core::mem::align_of::<T>() <= MAX_VALUE_ALIGN,
        "value alignment exceeds MAX_VALUE_ALIGN"
    );

    fn from_raw(raw: RawTable) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::ALIGN_FITS;
        Self {
            raw,
            _values: PhantomData,
        }
    }

    /// Unallocated table; the first insert allocates the default capacity.
    pub fn new() -> Self {
        Self::from_raw(RawTable::new(core::mem::size_of::<T>()))
    }

    pub fn with_hasher<H>(hasher: H) -> Self
    where
        H: KeyHasher + Send + 'static,
    {
        Self::from_raw(RawTable::with_hasher(core::mem::size_of::<T>(), hasher))
    }

    /// Allocate `capacity` slots; `0` selects the default capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self, TableError> {
        RawTable::with_capacity(core::mem::size_of::<T>(), capacity).map(Self::from_raw)
    }

    pub fn with_options(options: TableOptions) -> Result<Self, TableError> {
        RawTable::with_options(core::mem::size_of::<T>(), options).map(Self::from_raw)
    }

    pub fn with_options_and_hasher<H>(options: TableOptions, hasher: H) -> Result<Self, TableError>
    where
        H: KeyHasher + Send + 'static,
    {
        RawTable::with_options_and_hasher(core::mem::size_of::<T>(), options, hasher)
            .map(Self::from_raw)
    }

    /// The untyped engine underneath.
    pub fn as_raw(&self) -> &RawTable {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.raw.get(key.as_ref()).map(bytemuck::from_bytes)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut T>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.raw.get_mut(key.as_ref()).map(bytemuck::from_bytes_mut)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.raw.contains_key(key.as_ref())
    }

    pub fn find<Q>(&self, key: &Q) -> Option<Handle>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.raw.find(key.as_ref())
    }

    /// Insert `key` or overwrite its value, keeping its iteration position.
    pub fn set<Q>(&mut self, key: &Q, value: T) -> Result<Handle, TableError>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.raw.set(key.as_ref(), bytemuck::bytes_of(&value))
    }

    /// Remove `key`, returning its value. Absent keys are a no-op.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        let index = self.raw.remove_slot(key.as_ref())?;
        Some(bytemuck::pod_read_unaligned(self.raw.value_bytes(index)))
    }

    pub fn remove_at(&mut self, handle: Handle) -> bool {
        self.raw.remove_at(handle)
    }

    pub fn get_pod_key<K: NoUninit>(&self, key: &K) -> Option<&T> {
        self.get(bytemuck::bytes_of(key))
    }

    pub fn set_pod_key<K: NoUninit>(&mut self, key: &K, value: T) -> Result<Handle, TableError> {
        self.set(bytemuck::bytes_of(key), value)
    }

    pub fn remove_pod_key<K: NoUninit>(&mut self, key: &K) -> Option<T> {
        self.remove(bytemuck::bytes_of(key))
    }

    pub fn first(&self) -> Option<Handle> {
        self.raw.first()
    }

    pub fn last(&self) -> Option<Handle> {
        self.raw.last()
    }

    /// Cursor iteration; see [`RawTable::iterate`].
    pub fn iterate(&self, cursor: Option<Handle>) -> Option<Handle> {
        self.raw.iterate(cursor)
    }

    pub fn iterate_rev(&self, cursor: Option<Handle>) -> Option<Handle> {
        self.raw.iterate_rev(cursor)
    }

    pub fn key_at(&self, handle: Handle) -> Option<&[u8]> {
        self.raw.key_at(handle)
    }

    pub fn key_len_at(&self, handle: Handle) -> Option<usize> {
        self.raw.key_len_at(handle)
    }

    pub fn value_at(&self, handle: Handle) -> Option<&T> {
        self.raw.value_at(handle).map(bytemuck::from_bytes)
    }

    pub fn value_at_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.raw.value_at_mut(handle).map(bytemuck::from_bytes_mut)
    }

    pub fn swap_order(&mut self, a: Handle, b: Handle) -> bool {
        self.raw.swap_order(a, b)
    }

    pub fn set_hasher<H>(&mut self, hasher: H) -> Result<(), TableError>
    where
        H: KeyHasher + Send + 'static,
    {
        self.raw.set_hasher(hasher)
    }

    pub fn resize(&mut self, new_capacity: usize) -> Result<(), TableError> {
        self.raw.resize(new_capacity)
    }

    pub fn reserve(&mut self, additional: usize) -> Result<(), TableError> {
        self.raw.reserve(additional)
    }

    pub fn clear(&mut self) {
        self.raw.clear()
    }

    /// Release all storage; idempotent.
    pub fn deinit(&mut self) {
        self.raw.deinit()
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.raw.iter(),
            _pd: PhantomData,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            inner: self.raw.iter_mut(),
            _pd: PhantomData,
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &[u8]> + ExactSizeIterator + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        self.iter().map(|(_, v)| v)
    }
}

impl<T: Pod> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (String::from_utf8_lossy(k), v)))
            .finish()
    }
}

impl<'a, T: Pod> IntoIterator for &'a Table<T> {
    type Item = (&'a [u8], &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T: Pod> IntoIterator for &'a mut Table<T> {
    type Item = (&'a [u8], &'a mut T);
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// Iterator over `(key, &T)` in insertion order.
pub struct Iter<'a, T> {
    inner: RawIter<'a>,
    _pd: PhantomData<&'a T>,
}

impl<'a, T: Pod> Iterator for Iter<'a, T> {
    type Item = (&'a [u8], &'a T);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, bytemuck::from_bytes(v)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T: Pod> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, v)| (k, bytemuck::from_bytes(v)))
    }
}

impl<T: Pod> ExactSizeIterator for Iter<'_, T> {}
impl<T: Pod> FusedIterator for Iter<'_, T> {}

/// Iterator over `(key, &mut T)` in insertion order.
pub struct IterMut<'a, T> {
    inner: RawIterMut<'a>,
    _pd: PhantomData<&'a mut T>,
}

impl<'a, T: Pod> Iterator for IterMut<'a, T> {
    type Item = (&'a [u8], &'a mut T);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(k, v)| (k, bytemuck::from_bytes_mut(v)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T: Pod> DoubleEndedIterator for IterMut<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner
            .next_back()
            .map(|(k, v)| (k, bytemuck::from_bytes_mut(v)))
    }
}

impl<T: Pod> ExactSizeIterator for IterMut<'_, T> {}
impl<T: Pod> FusedIterator for IterMut<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Default, Pod, bytemuck::Zeroable)]
    #[repr(C)]
    struct Point {
        x: f64,
        y: f64,
    }

    #[test]
    fn typed_round_trip_with_struct_values() {
        let mut t: Table<Point> = Table::new();
        t.set("origin", Point::default()).unwrap();
        t.set("unit", Point { x: 1.0, y: 1.0 }).unwrap();
        assert_eq!(t.get("unit"), Some(&Point { x: 1.0, y: 1.0 }));
        t.get_mut("origin").unwrap().x = 5.0;
        assert_eq!(t.get("origin").map(|p| p.x), Some(5.0));
    }

    /// Invariant: `remove` hands back the stored value and forgets the key.
    #[test]
    fn remove_returns_value() {
        let mut t: Table<u64> = Table::with_capacity(4).unwrap();
        t.set("a", 7).unwrap();
        assert_eq!(t.remove("a"), Some(7));
        assert_eq!(t.remove("a"), None);
        assert!(!t.contains_key("a"));
    }

    /// Invariant: the bytes of a plain value work as a key, distinct from
    /// string keys with other bytes.
    #[test]
    fn pod_keys() {
        let mut t: Table<i32> = Table::new();
        for i in 0..10i32 {
            t.set_pod_key(&i, i * 2).unwrap();
        }
        assert_eq!(t.get_pod_key(&4i32), Some(&8));
        let mut cursor = t.iterate(None);
        while let Some(h) = cursor {
            assert_eq!(t.key_len_at(h), Some(core::mem::size_of::<i32>()));
            cursor = t.iterate(Some(h));
        }
        assert_eq!(t.remove_pod_key(&4i32), Some(8));
        assert_eq!(t.get_pod_key(&4i32), None);
        assert_eq!(t.len(), 9);
    }

    #[test]
    fn handle_accessors() {
        let mut t: Table<u32> = Table::new();
        let h = t.set("k", 1).unwrap();
        assert_eq!(h.key(&t), Some(&b"k"[..]));
        *h.value_mut(&mut t).unwrap() += 1;
        assert_eq!(h.value(&t), Some(&2));
        assert!(t.remove_at(h));
        assert_eq!(h.value(&t), None);
    }

    #[test]
    fn debug_lists_entries_in_order() {
        let mut t: Table<u8> = Table::new();
        t.set("b", 2).unwrap();
        t.set("a", 1).unwrap();
        assert_eq!(format!("{t:?}"), r#"{"b": 2, "a": 1}"#);
    }

    /// Invariant: 16-byte aligned values borrow in place at every slot.
    #[test]
    fn over_aligned_values() {
        let mut t: Table<u128> = Table::with_capacity(2).unwrap();
        for i in 0..50u128 {
            t.set(&(i as u32).to_le_bytes(), i << 64).unwrap();
        }
        for i in 0..50u128 {
            assert_eq!(t.get(&(i as u32).to_le_bytes()), Some(&(i << 64)));
        }
    }

    #[test]
    fn unit_values_form_a_set() {
        let mut t: Table<()> = Table::new();
        t.set("x", ()).unwrap();
        t.set("y", ()).unwrap();
        t.set("x", ()).unwrap();
        assert_eq!(t.keys().collect::<Vec<_>>(), vec![&b"x"[..], &b"y"[..]]);
    }
}
