//! Insertion-order list threaded through the live slots of a `RawTable`.
//!
//! Iteration always walks this list, never the slot array, so the order is
//! independent of where probing placed each entry.

use crate::raw_table::{Handle, RawTable};
use core::iter::FusedIterator;

impl RawTable {
    fn links(&self, index: usize) -> (Option<usize>, Option<usize>) {
        match self.slots[index].live() {
            Some(entry) => (entry.prev, entry.next),
            None => unreachable!("order list points at a non-live slot"),
        }
    }

    /// Make `prev` and `next` adjacent; `None` stands for the list ends.
    fn connect(&mut self, prev: Option<usize>, next: Option<usize>) {
        match prev.and_then(|p| self.slots[p].live_mut()) {
            Some(entry) => entry.next = next,
            None => self.first = next,
        }
        match next.and_then(|n| self.slots[n].live_mut()) {
            Some(entry) => entry.prev = prev,
            None => self.last = prev,
        }
    }

    pub(crate) fn push_back(&mut self, index: usize) {
        self.connect(self.last, Some(index));
        self.connect(Some(index), None);
    }

    pub(crate) fn unlink(&mut self, index: usize) {
        let (prev, next) = self.links(index);
        self.connect(prev, next);
    }

    /// Handle of the oldest entry.
    pub fn first(&self) -> Option<Handle> {
        self.first.map(|index| self.handle(index))
    }

    /// Handle of the newest entry.
    pub fn last(&self) -> Option<Handle> {
        self.last.map(|index| self.handle(index))
    }

    /// Advance an iteration cursor: `None` yields the first entry, the last
    /// entry yields `None`. A stale cursor also ends the iteration.
    pub fn iterate(&self, cursor: Option<Handle>) -> Option<Handle> {
        match cursor {
            None => self.first(),
            Some(handle) => {
                let (_, next) = self.links(self.resolve(handle)?);
                next.map(|index| self.handle(index))
            }
        }
    }

    /// [`iterate`](Self::iterate) from the newest entry towards the oldest.
    pub fn iterate_rev(&self, cursor: Option<Handle>) -> Option<Handle> {
        match cursor {
            None => self.last(),
            Some(handle) => {
                let (prev, _) = self.links(self.resolve(handle)?);
                prev.map(|index| self.handle(index))
            }
        }
    }

    pub fn key_at(&self, handle: Handle) -> Option<&[u8]> {
        let index = self.resolve(handle)?;
        self.slots[index].live().map(|entry| &*entry.key)
    }

    pub fn key_len_at(&self, handle: Handle) -> Option<usize> {
        self.key_at(handle).map(<[u8]>::len)
    }

    pub fn value_at(&self, handle: Handle) -> Option<&[u8]> {
        self.resolve(handle).map(|index| self.value_bytes(index))
    }

    pub fn value_at_mut(&mut self, handle: Handle) -> Option<&mut [u8]> {
        let index = self.resolve(handle)?;
        Some(self.value_bytes_mut(index))
    }

    /// Exchange the iteration positions of two live entries. Slots, keys and
    /// values stay where they are, so both handles remain valid. Returns
    /// `false` if either handle is stale.
    pub fn swap_order(&mut self, a: Handle, b: Handle) -> bool {
        let (Some(mut a), Some(mut b)) = (self.resolve(a), self.resolve(b)) else {
            return false;
        };
        if a == b {
            return true;
        }
        if self.links(b).1 == Some(a) {
            core::mem::swap(&mut a, &mut b);
        }
        let (a_prev, a_next) = self.links(a);
        let (b_prev, b_next) = self.links(b);
        if a_next == Some(b) {
            self.connect(a_prev, Some(b));
            self.connect(Some(b), Some(a));
            self.connect(Some(a), b_next);
        } else {
            self.connect(a_prev, Some(b));
            self.connect(Some(b), a_next);
            self.connect(b_prev, Some(a));
            self.connect(Some(a), b_next);
        }
        true
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            table: self,
            front: self.first,
            back: self.last,
            remaining: self.count,
        }
    }

    /// Entries in insertion order with mutable values.
    ///
    /// Splits the value region into disjoint slices up front, so building the
    /// iterator costs `O(len log len)` time and one `len`-sized buffer.
    pub fn iter_mut(&mut self) -> IterMut<'_> {
        let element_size = self.element_size();
        let mut ranked: Vec<(usize, usize)> = Vec::with_capacity(self.count);
        let mut cursor = self.first;
        while let Some(index) = cursor {
            ranked.push((index, ranked.len()));
            cursor = self.links(index).1;
        }
        // Hand out the region in slot order, then restore list order.
        ranked.sort_unstable();

        let (slots, mut region) = self.value_region_mut();
        let mut entries = Vec::with_capacity(ranked.len());
        let mut offset = 0;
        for (index, rank) in ranked {
            let Some(entry) = slots[index].live() else {
                unreachable!("order list points at a non-live slot");
            };
            let start = index * element_size;
            let (_, tail) = core::mem::take(&mut region).split_at_mut(start - offset);
            let (value, rest) = tail.split_at_mut(element_size);
            region = rest;
            offset = start + element_size;
            entries.push((rank, &*entry.key, value));
        }
        entries.sort_unstable_by_key(|&(rank, ..)| rank);
        IterMut {
            inner: entries.into_iter(),
        }
    }
}

/// Iterator over `(key, value)` byte slices in insertion order.
#[derive(Clone)]
pub struct Iter<'a> {
    table: &'a RawTable,
    front: Option<usize>,
    back: Option<usize>,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let table = self.table;
        let index = self.front?;
        let entry = table.slots[index].live()?;
        self.front = entry.next;
        self.remaining -= 1;
        Some((&*entry.key, table.value_bytes(index)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let table = self.table;
        let index = self.back?;
        let entry = table.slots[index].live()?;
        self.back = entry.prev;
        self.remaining -= 1;
        Some((&*entry.key, table.value_bytes(index)))
    }
}

impl ExactSizeIterator for Iter<'_> {}
impl FusedIterator for Iter<'_> {}

/// Iterator over `(key, mutable value)` byte slices in insertion order.
pub struct IterMut<'a> {
    inner: std::vec::IntoIter<(usize, &'a [u8], &'a mut [u8])>,
}

impl<'a> Iterator for IterMut<'a> {
    type Item = (&'a [u8], &'a mut [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, key, value)| (key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for IterMut<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, key, value)| (key, value))
    }
}

impl ExactSizeIterator for IterMut<'_> {}
impl FusedIterator for IterMut<'_> {}
