// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The two coupled queues driving the solver.

use std::collections::{HashSet, VecDeque};

use crate::graph::call_graph::CallEdge;
use crate::ir::cs_manager::{CSCallSiteId, CSMethodId, PointerId};
use crate::util::chunked_queue::{ChunkedQueue, Cursor};

pub type CSCallEdge = CallEdge<CSMethodId, CSCallSiteId>;

/// Pointers whose pending points-to delta has to be propagated, and call
/// edges awaiting their first processing.
///
/// The deltas themselves are kept in the solver's diff points-to data, so a
/// pointer is queued at most once no matter how many deltas reach it before
/// it is processed.
#[derive(Debug)]
pub struct WorkList {
    pointers: VecDeque<PointerId>,
    queued: HashSet<PointerId>,
    call_edges: ChunkedQueue<CSCallEdge>,
    call_edge_cursor: Cursor,
}

impl Default for WorkList {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkList {
    pub fn new() -> Self {
        let call_edges = ChunkedQueue::new();
        let call_edge_cursor = call_edges.cursor();
        WorkList {
            pointers: VecDeque::new(),
            queued: HashSet::new(),
            call_edges,
            call_edge_cursor,
        }
    }

    /// Returns false if the pointer is already waiting.
    pub fn push_pointer(&mut self, pointer: PointerId) -> bool {
        if self.queued.insert(pointer) {
            self.pointers.push_back(pointer);
            true
        } else {
            false
        }
    }

    pub fn pop_pointer(&mut self) -> Option<PointerId> {
        let pointer = self.pointers.pop_front()?;
        self.queued.remove(&pointer);
        Some(pointer)
    }

    pub fn push_call_edge(&mut self, edge: CSCallEdge) {
        self.call_edges.push(edge);
    }

    pub fn pop_call_edge(&mut self) -> Option<CSCallEdge> {
        self.call_edge_cursor.next(&self.call_edges)
    }

    pub fn has_pointers(&self) -> bool {
        !self.pointers.is_empty()
    }

    pub fn has_call_edges(&self) -> bool {
        self.call_edge_cursor.has_next(&self.call_edges)
    }

    pub fn is_empty(&self) -> bool {
        !self.has_pointers() && !self.has_call_edges()
    }

    /// Number of call edges ever queued.
    pub fn num_queued_call_edges(&self) -> usize {
        self.call_edges.len()
    }
}
