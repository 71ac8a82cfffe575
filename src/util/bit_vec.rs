//! Dense bit vector keyed by a newtyped index, used as the large
//! representation of points-to sets. Modelled on `rustc_index::bit_set`, see
//! <https://doc.rust-lang.org/stable/nightly-rustc/src/rustc_index/bit_set.rs.html>

use std::fmt;
use std::fmt::Debug;
use std::marker::PhantomData;

use crate::util::index::Idx;

type Word = u64;
const WORD_BITS: usize = Word::BITS as usize;

/// Splits an index into its word position and bit mask.
#[inline]
fn locate<T: Idx>(elem: T) -> (usize, Word) {
    let idx = elem.index();
    (idx / WORD_BITS, 1 << (idx % WORD_BITS))
}

/// The words grow on demand; trailing zero words are allowed, so equality is
/// only meaningful between vectors built the same way.
#[derive(Eq, PartialEq, Hash)]
pub struct BitVec<T> {
    words: Vec<Word>,
    marker: PhantomData<T>,
}

impl<T: Idx> BitVec<T> {
    #[inline]
    pub fn new_empty() -> BitVec<T> {
        BitVec {
            words: Vec::new(),
            marker: PhantomData,
        }
    }

    fn grow_to(&mut self, num_words: usize) {
        if self.words.len() < num_words {
            self.words.resize(num_words, 0);
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    #[inline]
    pub fn contains(&self, elem: T) -> bool {
        let (pos, mask) = locate(elem);
        self.words.get(pos).map_or(false, |w| w & mask != 0)
    }

    /// Every bit of `other` is also set in `self`.
    pub fn superset(&self, other: &BitVec<T>) -> bool {
        other.words.iter().enumerate().all(|(pos, &theirs)| {
            let ours = self.words.get(pos).copied().unwrap_or(0);
            theirs & !ours == 0
        })
    }

    /// Returns true if `elem` was not present.
    #[inline]
    pub fn insert(&mut self, elem: T) -> bool {
        let (pos, mask) = locate(elem);
        self.grow_to(pos + 1);
        let fresh = self.words[pos] & mask == 0;
        self.words[pos] |= mask;
        fresh
    }

    /// Returns true if `elem` was present.
    #[inline]
    pub fn remove(&mut self, elem: T) -> bool {
        let (pos, mask) = locate(elem);
        match self.words.get_mut(pos) {
            Some(w) if *w & mask != 0 => {
                *w &= !mask;
                true
            }
            _ => false,
        }
    }

    /// Visits set indices in increasing order.
    #[inline]
    pub fn iter(&self) -> BitIter<'_, T> {
        BitIter {
            words: &self.words,
            pos: 0,
            pending: self.words.first().copied().unwrap_or(0),
            marker: PhantomData,
        }
    }

    pub fn union(&mut self, other: &BitVec<T>) -> bool {
        self.grow_to(other.words.len());
        let mut changed = false;
        for (ours, &theirs) in self.words.iter_mut().zip(&other.words) {
            changed |= theirs & !*ours != 0;
            *ours |= theirs;
        }
        changed
    }

    pub fn subtract(&mut self, other: &BitVec<T>) -> bool {
        let mut changed = false;
        for (ours, &theirs) in self.words.iter_mut().zip(&other.words) {
            changed |= *ours & theirs != 0;
            *ours &= !theirs;
        }
        changed
    }
}

impl<T> Clone for BitVec<T> {
    fn clone(&self) -> Self {
        BitVec {
            words: self.words.clone(),
            marker: PhantomData,
        }
    }
}

impl<T: Idx> Debug for BitVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

pub struct BitIter<'a, T: Idx> {
    words: &'a [Word],
    /// Index of the word held in `pending`.
    pos: usize,
    /// Bits of the current word not yet yielded.
    pending: Word,
    marker: PhantomData<T>,
}

impl<'a, T: Idx> Iterator for BitIter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        while self.pending == 0 {
            self.pos += 1;
            self.pending = *self.words.get(self.pos)?;
        }
        let bit = self.pending.trailing_zeros() as usize;
        // clear the lowest set bit
        self.pending &= self.pending - 1;
        Some(T::from_usize(self.pos * WORD_BITS + bit))
    }
}
