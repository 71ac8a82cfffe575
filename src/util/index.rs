// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Typed indices and the interning table built on top of them.
//!
//! Id types are declared with `index_vec::define_index_type!`; an `Interner`
//! hands them out as positions in an `IndexSet`.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use indexmap::IndexSet;

pub use index_vec::{Idx, IndexVec};

/// Hash-consing table: every distinct key is assigned exactly one index, and
/// interning an equal key again returns that same index.
pub struct Interner<K, I: Idx> {
    keys: IndexSet<K>,
    marker: PhantomData<fn() -> I>,
}

impl<K, I: Idx> fmt::Debug for Interner<K, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interner({} keys)", self.keys.len())
    }
}

impl<K: Eq + Hash, I: Idx> Default for Interner<K, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, I: Idx> Interner<K, I> {
    pub fn new() -> Self {
        Interner {
            keys: IndexSet::new(),
            marker: PhantomData,
        }
    }

    /// Returns the index of `key`, assigning a fresh one on first sight.
    #[inline]
    pub fn intern(&mut self, key: K) -> I {
        let (pos, _) = self.keys.insert_full(key);
        I::from_usize(pos)
    }

    /// Returns the index of `key` if it has been interned before.
    #[inline]
    pub fn get(&self, key: &K) -> Option<I> {
        self.keys.get_index_of(key).map(I::from_usize)
    }

    /// Returns the key stored at `id`. Panics if `id` was not handed out by
    /// this interner.
    #[inline]
    pub fn lookup(&self, id: I) -> &K {
        &self.keys[id.index()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (I, &K)> + '_ {
        self.keys.iter().enumerate().map(|(pos, key)| (I::from_usize(pos), key))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    index_vec::define_index_type! {
        struct TestId = u32;
        DEBUG_FORMAT = "TestId({})";
    }

    #[test]
    fn index_vec_push_and_lookup() {
        let mut v: IndexVec<TestId, &str> = IndexVec::new();
        let a = v.push("a");
        let b = v.push("b");
        assert_eq!(a, TestId::from_raw(0));
        assert_eq!(b, TestId::from_raw(1));
        assert_eq!(v[b], "b");
        assert_eq!(v.next_idx(), TestId::from_raw(2));
        assert_eq!(format!("{:?}", b), "TestId(1)");
    }

    #[test]
    fn interner_returns_same_index_for_equal_keys() {
        let mut interner: Interner<(u32, String), TestId> = Interner::new();
        let x = interner.intern((1, "x".to_string()));
        let y = interner.intern((2, "x".to_string()));
        let x2 = interner.intern((1, "x".to_string()));
        assert_eq!(x, x2);
        assert_ne!(x, y);
        assert_eq!(interner.len(), 2);
        assert_eq!(interner.lookup(y), &(2, "x".to_string()));
        assert_eq!(interner.get(&(3, "x".to_string())), None);
        assert_eq!(
            interner.iter().map(|(id, key)| (id, key.0)).collect::<Vec<_>>(),
            vec![(x, 1), (y, 2)]
        );
    }
}
