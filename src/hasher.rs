//! Pluggable key hashing.
//!
//! The table hashes raw key bytes through a [`KeyHasher`] strategy. The
//! default is 64-bit FNV-1a, which is fast and deterministic but offers no
//! protection against crafted collisions; [`RandomizedKeys`] trades speed for
//! a per-table random seed.

use core::hash::{BuildHasher, Hasher};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Strategy mapping key bytes to a 64-bit hash.
///
/// Implemented for any `Fn(&[u8]) -> u64`, so a closure can be passed
/// wherever a hasher is expected.
pub trait KeyHasher {
    fn hash_key(&self, key: &[u8]) -> u64;
}

impl<F> KeyHasher for F
where
    F: Fn(&[u8]) -> u64,
{
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        self(key)
    }
}

/// 64-bit FNV-1a over the key bytes.
#[inline]
pub const fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash = (hash ^ bytes[i] as u64).wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Default strategy: [`fnv1a`].
#[derive(Copy, Clone, Debug, Default)]
pub struct Fnv1a;

impl KeyHasher for Fnv1a {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        fnv1a(key)
    }
}

/// Adapts any [`BuildHasher`] into a [`KeyHasher`] by feeding it the key
/// bytes with a single `write`.
#[derive(Clone, Debug, Default)]
pub struct BuildHasherKeys<S>(pub S);

impl<S: BuildHasher> KeyHasher for BuildHasherKeys<S> {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        let mut state = self.0.build_hasher();
        state.write(key);
        state.finish()
    }
}

/// Randomly seeded strategy for tables exposed to untrusted keys.
pub type RandomizedKeys = BuildHasherKeys<hashbrown::DefaultHashBuilder>;

impl RandomizedKeys {
    pub fn new() -> Self {
        BuildHasherKeys(hashbrown::DefaultHashBuilder::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Known FNV-1a 64 test vectors.
    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a(b"foobar"), 0x8594_4171_f739_67e8);
        assert_eq!(Fnv1a.hash_key(b"foobar"), fnv1a(b"foobar"));
    }

    #[test]
    fn closures_are_hashers() {
        let constant = |_: &[u8]| 7u64;
        assert_eq!(constant.hash_key(b"anything"), 7);
    }

    /// A given randomized instance is deterministic for its lifetime.
    #[test]
    fn randomized_is_stable_per_instance() {
        let h = RandomizedKeys::new();
        assert_eq!(h.hash_key(b"key-1"), h.hash_key(b"key-1"));
    }
}
