// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use arrayvec::ArrayVec;
use std::fmt::{Debug, Formatter, Result};

// The maximum number of elements a chunk can hold.
const CHUNK_CAP: usize = 60;

/// An append-only queue stored as a list of fixed-size chunks, so that pushing
/// never moves elements that were pushed earlier.
///
/// Consumers read the queue through a [`Cursor`], which only records a
/// position. A cursor therefore stays valid while the queue keeps growing,
/// and several consumers can walk the same queue at their own pace.
pub struct ChunkedQueue<T> {
    chunks: Vec<ArrayVec<T, CHUNK_CAP>>,
    len: usize,
}

impl<T: Debug> Debug for ChunkedQueue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Default for ChunkedQueue<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChunkedQueue<T> {
    #[inline]
    pub fn new() -> Self {
        ChunkedQueue {
            chunks: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of elements ever pushed.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends an element to the back of a queue.
    pub fn push(&mut self, elem: T) {
        match self.chunks.last_mut() {
            Some(chunk) if !chunk.is_full() => chunk.push(elem),
            _ => {
                let mut chunk = ArrayVec::new();
                chunk.push(elem);
                self.chunks.push(chunk);
            }
        }
        self.len += 1;
    }

    /// Provides a forward iterator over all pushed elements.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }

    /// Returns a cursor positioned before the first element.
    #[inline]
    pub fn cursor(&self) -> Cursor {
        Cursor::default()
    }

    #[inline]
    fn get(&self, chunk: usize, index: usize) -> Option<&T> {
        self.chunks.get(chunk).and_then(|c| c.get(index))
    }
}

/// A read position in a [`ChunkedQueue`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    /// The chunk holding the next element.
    chunk: usize,
    /// The index of the next element in the chunk.
    index: usize,
}

impl Cursor {
    /// Returns `true` if elements were pushed after this position.
    #[inline]
    pub fn has_next<T>(&self, queue: &ChunkedQueue<T>) -> bool {
        self.chunk * CHUNK_CAP + self.index < queue.len()
    }

    /// Advances past the next element and returns a copy of it, or `None` if
    /// the cursor has caught up with the queue.
    pub fn next<T: Copy>(&mut self, queue: &ChunkedQueue<T>) -> Option<T> {
        if self.index == CHUNK_CAP {
            self.chunk += 1;
            self.index = 0;
        }
        let elem = queue.get(self.chunk, self.index).copied();
        if elem.is_some() {
            self.index += 1;
        }
        elem
    }
}
