// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::{hash_set, HashSet};
use std::fmt;
use std::slice;

use crate::util::bit_vec::{BitIter, BitVec};
use crate::util::index::Idx;

const SMALL_SET_CAPACITY: usize = 32;

/// A growable set of abstract objects owned by a pointer.
///
/// The solver never removes objects from the points-to set of a pointer;
/// `subtract` and `clear` only operate on scratch sets such as pending deltas.
/// `new()` doubles as the points-to set factory: the representation is picked
/// by the type parameter of the solver.
pub trait PointsToSet<T> {
    type Iter<'a>: Iterator<Item = T>
    where
        Self: 'a;

    fn new() -> Self;
    fn clear(&mut self);
    fn count(&self) -> usize;
    fn contains(&self, elem: T) -> bool;
    fn is_empty(&self) -> bool;
    fn superset(&self, other: &Self) -> bool;
    fn insert(&mut self, elem: T) -> bool;
    fn union(&mut self, other: &Self) -> bool;
    fn subtract(&mut self, other: &Self) -> bool;
    fn iter<'a>(&'a self) -> Self::Iter<'a>;

    /// Creates a set holding exactly `elem`.
    fn singleton(elem: T) -> Self
    where
        Self: Sized,
    {
        let mut set = Self::new();
        set.insert(elem);
        set
    }
}

/// Hybrid implementation of points to set,
/// which uses an explicit array for small sets, and a bit vector for large sets.
#[derive(Clone)]
pub struct HybridPointsToSet<T> {
    points_to: HybridSet<T>,
}

impl<T: Idx> fmt::Debug for HybridPointsToSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.points_to.fmt(f)
    }
}

impl<'a, T: Idx> IntoIterator for &'a HybridPointsToSet<T> {
    type Item = T;
    type IntoIter = HybridIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Idx> PointsToSet<T> for HybridPointsToSet<T> {
    fn new() -> Self {
        HybridPointsToSet {
            points_to: HybridSet::SmallSet(Vec::new()),
        }
    }

    fn clear(&mut self) {
        self.points_to = HybridSet::SmallSet(Vec::new());
    }

    fn count(&self) -> usize {
        match &self.points_to {
            HybridSet::SmallSet(small) => small.len(),
            HybridSet::LargeSet(large) => large.count(),
        }
    }

    fn contains(&self, elem: T) -> bool {
        self.points_to.contains(elem)
    }

    fn is_empty(&self) -> bool {
        match &self.points_to {
            HybridSet::SmallSet(small) => small.is_empty(),
            HybridSet::LargeSet(large) => large.is_empty(),
        }
    }

    fn superset(&self, other: &HybridPointsToSet<T>) -> bool {
        match (&self.points_to, &other.points_to) {
            (HybridSet::LargeSet(self_large), HybridSet::LargeSet(other_large)) => {
                self_large.superset(other_large)
            }
            _ => other.iter().all(|elem| self.contains(elem)),
        }
    }

    /// Adds `elem` to this set, returns true if it was not already in this set.
    fn insert(&mut self, elem: T) -> bool {
        self.points_to.insert(elem)
    }

    fn union(&mut self, other: &HybridPointsToSet<T>) -> bool {
        match (&mut self.points_to, &other.points_to) {
            (HybridSet::LargeSet(self_large), HybridSet::LargeSet(other_large)) => {
                self_large.union(other_large)
            }
            (HybridSet::SmallSet(self_small), HybridSet::LargeSet(other_large)) => {
                // Convert self to a large set first.
                let mut self_large = BitVec::new_empty();
                for elem in self_small.iter() {
                    self_large.insert(*elem);
                }
                let changed = self_large.union(other_large);
                self.points_to = HybridSet::LargeSet(self_large);
                changed
            }
            (self_set, HybridSet::SmallSet(other_small)) => {
                let mut changed = false;
                for &elem in other_small.iter() {
                    changed |= self_set.insert(elem);
                }
                changed
            }
        }
    }

    fn subtract(&mut self, other: &HybridPointsToSet<T>) -> bool {
        match (&mut self.points_to, &other.points_to) {
            (HybridSet::LargeSet(self_large), HybridSet::LargeSet(other_large)) => {
                self_large.subtract(other_large)
            }
            (HybridSet::LargeSet(self_large), HybridSet::SmallSet(other_small)) => {
                let mut changed = false;
                for &elem in other_small.iter() {
                    changed |= self_large.remove(elem);
                }
                changed
            }
            (HybridSet::SmallSet(self_small), _) => {
                let before = self_small.len();
                self_small.retain(|&elem| !other.points_to.contains(elem));
                before != self_small.len()
            }
        }
    }

    type Iter<'a> = HybridIter<'a, T>;
    fn iter(&self) -> HybridIter<'_, T> {
        match &self.points_to {
            HybridSet::SmallSet(small) => HybridIter::SmallIter(small.iter()),
            HybridSet::LargeSet(large) => HybridIter::LargeIter(large.iter()),
        }
    }
}

#[derive(Clone)]
enum HybridSet<T> {
    SmallSet(Vec<T>),
    LargeSet(BitVec<T>),
}

impl<T: Idx> fmt::Debug for HybridSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SmallSet(s) => f.debug_set().entries(s.iter()).finish(),
            Self::LargeSet(s) => s.fmt(f),
        }
    }
}

impl<T: Idx> HybridSet<T> {
    fn contains(&self, elem: T) -> bool {
        match self {
            HybridSet::SmallSet(small) => small.contains(&elem),
            HybridSet::LargeSet(large) => large.contains(elem),
        }
    }

    fn insert(&mut self, elem: T) -> bool {
        match self {
            HybridSet::SmallSet(small) if small.contains(&elem) => false,
            HybridSet::SmallSet(small) if small.len() < SMALL_SET_CAPACITY => {
                small.push(elem);
                true
            }
            HybridSet::SmallSet(small) => {
                // The set is small and full. Convert to a large set.
                let mut large = BitVec::new_empty();
                for elem in small.iter() {
                    large.insert(*elem);
                }
                large.insert(elem);
                *self = HybridSet::LargeSet(large);
                true
            }
            HybridSet::LargeSet(large) => large.insert(elem),
        }
    }
}

pub enum HybridIter<'a, T: Idx> {
    SmallIter(slice::Iter<'a, T>),
    LargeIter(BitIter<'a, T>),
}

impl<'a, T: Idx> Iterator for HybridIter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self {
            HybridIter::SmallIter(small) => small.next().copied(),
            HybridIter::LargeIter(large) => large.next(),
        }
    }
}

/// Points-to set backed by a hash set. Iteration order is unspecified.
#[derive(Clone)]
pub struct HashPointsToSet<T> {
    points_to: HashSet<T>,
}

impl<T: Idx> fmt::Debug for HashPointsToSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.points_to.iter()).finish()
    }
}

impl<'a, T: Idx> IntoIterator for &'a HashPointsToSet<T> {
    type Item = T;
    type IntoIter = std::iter::Copied<hash_set::Iter<'a, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.points_to.iter().copied()
    }
}

impl<T: Idx> PointsToSet<T> for HashPointsToSet<T> {
    fn new() -> Self {
        HashPointsToSet {
            points_to: HashSet::new(),
        }
    }

    fn clear(&mut self) {
        self.points_to.clear();
    }

    fn count(&self) -> usize {
        self.points_to.len()
    }

    fn contains(&self, elem: T) -> bool {
        self.points_to.contains(&elem)
    }

    fn is_empty(&self) -> bool {
        self.points_to.is_empty()
    }

    fn superset(&self, other: &Self) -> bool {
        self.points_to.is_superset(&other.points_to)
    }

    fn insert(&mut self, elem: T) -> bool {
        self.points_to.insert(elem)
    }

    fn union(&mut self, other: &Self) -> bool {
        let before = self.points_to.len();
        self.points_to.extend(other.points_to.iter().copied());
        before != self.points_to.len()
    }

    fn subtract(&mut self, other: &Self) -> bool {
        let before = self.points_to.len();
        self.points_to.retain(|elem| !other.points_to.contains(elem));
        before != self.points_to.len()
    }

    type Iter<'a> = std::iter::Copied<hash_set::Iter<'a, T>>;
    fn iter(&self) -> Self::Iter<'_> {
        self.points_to.iter().copied()
    }
}

#[cfg(test)]
mod test {
    use rand::Rng;
    use std::collections::HashSet;

    use super::{HashPointsToSet, HybridPointsToSet, HybridSet, PointsToSet, SMALL_SET_CAPACITY};

    index_vec::define_index_type! {
        struct Elem = u32;
    }

    fn random_set(len: usize) -> HashSet<Elem> {
        let mut rng = rand::thread_rng();
        let mut set = HashSet::new();
        while set.len() < len {
            set.insert(Elem::new(rng.gen_range(1..1000)));
        }
        set
    }

    fn hybrid_from(elems: &HashSet<Elem>) -> HybridPointsToSet<Elem> {
        let mut set = HybridPointsToSet::new();
        for x in elems {
            set.insert(*x);
        }
        set
    }

    #[test]
    fn small_set_stays_small() {
        let rand_set = random_set(8);
        let small_set = hybrid_from(&rand_set);
        assert_eq!(small_set.count(), 8);
        assert!(matches!(small_set.points_to, HybridSet::SmallSet(_)));
        assert_eq!(small_set.iter().collect::<HashSet<_>>(), rand_set);
    }

    #[test]
    fn set_grows_into_bit_vector() {
        let rand_set = random_set(SMALL_SET_CAPACITY + 3);
        let mut large_set = hybrid_from(&rand_set);
        assert_eq!(large_set.count(), SMALL_SET_CAPACITY + 3);
        assert!(matches!(large_set.points_to, HybridSet::LargeSet(_)));
        assert_eq!(large_set.iter().collect::<HashSet<_>>(), rand_set);

        let present = *rand_set.iter().next().unwrap();
        assert!(!large_set.insert(present));
        assert!(large_set.insert(Elem::new(5000)));
        assert!(large_set.contains(Elem::new(5000)));
    }

    #[test]
    fn union_reports_change_only_for_new_elements() {
        let rand_small = random_set(8);
        let rand_large = random_set(SMALL_SET_CAPACITY + 3);
        let small_set = hybrid_from(&rand_small);
        let large_set = hybrid_from(&rand_large);

        let mut union_set = small_set.clone();
        union_set.union(&large_set);
        assert!(union_set.superset(&small_set));
        assert!(union_set.superset(&large_set));
        assert_eq!(
            union_set.iter().collect::<HashSet<_>>(),
            rand_small.union(&rand_large).cloned().collect::<HashSet<_>>()
        );
        assert!(!union_set.clone().union(&small_set));
        assert!(!union_set.clone().union(&large_set));
    }

    #[test]
    fn subtract_small_and_large() {
        let rand_small = random_set(8);
        let mut rand_large = random_set(SMALL_SET_CAPACITY + 3);
        for &x in rand_small.iter().take(5) {
            rand_large.insert(x);
        }
        let small_set = hybrid_from(&rand_small);
        let large_set = hybrid_from(&rand_large);

        let mut diff = small_set.clone();
        assert!(diff.subtract(&large_set));
        assert_eq!(
            diff.iter().collect::<HashSet<_>>(),
            rand_small.difference(&rand_large).cloned().collect::<HashSet<_>>()
        );

        let mut diff = large_set.clone();
        assert!(diff.subtract(&small_set));
        assert_eq!(
            diff.iter().collect::<HashSet<_>>(),
            rand_large.difference(&rand_small).cloned().collect::<HashSet<_>>()
        );
    }

    #[test]
    fn hash_set_representation_agrees_with_hybrid() {
        let rand_a = random_set(SMALL_SET_CAPACITY + 10);
        let rand_b = random_set(12);
        let mut hybrid = hybrid_from(&rand_a);
        let mut hashed = HashPointsToSet::new();
        for x in &rand_a {
            hashed.insert(*x);
        }
        let mut hashed_b = HashPointsToSet::new();
        for x in &rand_b {
            hashed_b.insert(*x);
        }
        hybrid.union(&hybrid_from(&rand_b));
        hashed.union(&hashed_b);
        assert_eq!(hybrid.count(), hashed.count());
        assert_eq!(
            hybrid.iter().collect::<HashSet<_>>(),
            hashed.iter().collect::<HashSet<_>>()
        );
        assert!(hashed.superset(&hashed_b));
        assert_eq!(HashPointsToSet::singleton(Elem::new(7)).count(), 1);
    }
}
