// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DefaultIx, EdgeIndex, EdgeReference, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Graph;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{self, Write};

use crate::ir::cs_manager::PointerId;

// Unique identifiers for graph node and edges.
pub type PFGNodeId = NodeIndex<DefaultIx>;
pub type PFGEdgeId = EdgeIndex<DefaultIx>;

/// Why points-to information flows along an edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PFGEdgeKind {
    /// `to = from`
    LocalAssign,
    /// From the stored variable to an instance field.
    InstanceStore,
    /// From an instance field to the loaded variable.
    InstanceLoad,
    /// From an argument to a parameter (or a receiver object to `this`).
    ParameterPassing,
    /// From a return variable to the call result.
    Return,
}

impl fmt::Display for PFGEdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PFGEdgeKind::LocalAssign => "assign",
            PFGEdgeKind::InstanceStore => "store",
            PFGEdgeKind::InstanceLoad => "load",
            PFGEdgeKind::ParameterPassing => "param",
            PFGEdgeKind::Return => "return",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct PFGNode {
    pointer: PointerId,
}

#[derive(Debug)]
pub struct PFGEdge {
    pub kind: PFGEdgeKind,
}

/// Pointer flow graph. Additive; each (source, target, kind) edge exists at most once.
#[derive(Default)]
pub struct PointerFlowGraph {
    pub(crate) graph: Graph<PFGNode, PFGEdge>,
    /// A map from pointers to node id.
    pub(crate) nodes: HashMap<PointerId, PFGNodeId>,
    edge_set: HashSet<(PointerId, PointerId, PFGEdgeKind)>,
}

impl PointerFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_insert_node(&mut self, pointer: PointerId) -> PFGNodeId {
        match self.nodes.entry(pointer) {
            Entry::Occupied(o) => *o.get(),
            Entry::Vacant(v) => *v.insert(self.graph.add_node(PFGNode { pointer })),
        }
    }

    /// Returns true iff the edge is newly inserted.
    pub fn add_edge(&mut self, from: PointerId, to: PointerId, kind: PFGEdgeKind) -> bool {
        if !self.edge_set.insert((from, to, kind)) {
            return false;
        }
        let src = self.get_or_insert_node(from);
        let dst = self.get_or_insert_node(to);
        self.graph.add_edge(src, dst, PFGEdge { kind });
        true
    }

    pub fn contains_edge(&self, from: PointerId, to: PointerId, kind: PFGEdgeKind) -> bool {
        self.edge_set.contains(&(from, to, kind))
    }

    /// Targets of the edges leaving `pointer`, with their kinds.
    pub fn out_edges_of(&self, pointer: PointerId) -> Vec<(PointerId, PFGEdgeKind)> {
        match self.nodes.get(&pointer) {
            Some(node) => self
                .graph
                .edges(*node)
                .map(|e| (self.graph[e.target()].pointer, e.weight().kind))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// Produce a dot file representation of the graph
    /// for displaying with Graphviz.
    pub fn to_dot<W: Write>(&self, w: &mut W, pointer_label: impl Fn(PointerId) -> String) -> io::Result<()> {
        let node_attr = |_: &Graph<PFGNode, PFGEdge>, (_, node): (PFGNodeId, &PFGNode)| {
            format!("label = {:?}", pointer_label(node.pointer))
        };
        let edge_attr = |_: &Graph<PFGNode, PFGEdge>, edge: EdgeReference<'_, PFGEdge>| {
            format!("label = \"{}\"", edge.weight().kind)
        };
        let dot = Dot::with_attr_getters(
            &self.graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &edge_attr,
            &node_attr,
        );
        write!(w, "{:?}", dot)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn edges_are_deduplicated_per_kind() {
        let p = |i| PointerId::from_raw(i);
        let mut pfg = PointerFlowGraph::new();
        assert!(pfg.add_edge(p(0), p(1), PFGEdgeKind::LocalAssign));
        assert!(!pfg.add_edge(p(0), p(1), PFGEdgeKind::LocalAssign));
        assert!(pfg.add_edge(p(0), p(1), PFGEdgeKind::ParameterPassing));
        assert!(pfg.add_edge(p(0), p(2), PFGEdgeKind::LocalAssign));
        assert_eq!(pfg.num_edges(), 3);
        assert_eq!(pfg.num_nodes(), 3);

        let mut out = pfg.out_edges_of(p(0));
        out.sort_by_key(|(t, _)| *t);
        assert_eq!(out.len(), 3);
        assert_eq!(out[2], (p(2), PFGEdgeKind::LocalAssign));
        assert!(pfg.out_edges_of(p(1)).is_empty());
        assert!(pfg.out_edges_of(p(7)).is_empty());

        let mut dot = Vec::new();
        pfg.to_dot(&mut dot, |p| format!("{:?}", p)).unwrap();
        assert!(String::from_utf8(dot).unwrap().contains("label = \"param\""));
    }
}
