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
use std::fmt::Debug;
use std::hash::Hash;
use std::io::{self, Write};

use crate::ir::cs_manager::{CSCallSiteId, CSMethodId};
use crate::ir::program::{CallKind, CallSiteId, MethodId};
use crate::util::chunked_queue::{ChunkedQueue, Cursor};

/// Unique identifiers for call graph nodes.
pub type CGNodeId = NodeIndex<DefaultIx>;
/// Unique identifiers for call graph edges.
pub type CGEdgeId = EdgeIndex<DefaultIx>;
/// Context-sensitive call graph.
pub type CSCallGraph = CallGraph<CSMethodId, CSCallSiteId>;
/// Context-insensitive projection of a call graph.
pub type CICallGraph = CallGraph<MethodId, CallSiteId>;

pub type CGGraph<F, S> = Graph<CallGraphNode<F>, CallGraphEdge<S>>;

pub trait CGFunction: Copy + Clone + PartialEq + Eq + Hash + Debug {}

impl CGFunction for MethodId {}

impl CGFunction for CSMethodId {}

pub trait CGCallSite: Copy + Clone + PartialEq + Eq + Hash + Debug {}

impl CGCallSite for CallSiteId {}

impl CGCallSite for CSCallSiteId {}

/// A resolved call: `caller` invokes `callee` at `callsite`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallEdge<F: CGFunction, S: CGCallSite> {
    pub caller: F,
    pub callsite: S,
    pub callee: F,
    pub kind: CallKind,
}

impl<F: CGFunction, S: CGCallSite> CallEdge<F, S> {
    pub fn new(caller: F, callsite: S, callee: F, kind: CallKind) -> Self {
        CallEdge {
            caller,
            callsite,
            callee,
            kind,
        }
    }
}

#[derive(Debug)]
pub struct CallGraphNode<F: CGFunction> {
    pub(crate) func: F,
}

impl<F: CGFunction> CallGraphNode<F> {
    pub fn new(func: F) -> Self {
        CallGraphNode { func }
    }
}

#[derive(Debug)]
pub struct CallGraphEdge<S: CGCallSite> {
    pub(crate) callsite: S,
    pub(crate) kind: CallKind,
}

impl<S: CGCallSite> CallGraphEdge<S> {
    pub fn new(callsite: S, kind: CallKind) -> Self {
        CallGraphEdge { callsite, kind }
    }
}

/// An additive call graph. Graph nodes only record call relationships;
/// reachability is tracked separately so that a callee node created by
/// `add_edge` is still reported as new by `add_new_method`.
pub struct CallGraph<F: CGFunction, S: CGCallSite> {
    /// The graph structure capturing call relationships.
    pub graph: CGGraph<F, S>,
    /// A map from functions to their corresponding call graph nodes.
    pub func_nodes: HashMap<F, CGNodeId>,
    /// A map from call sites to call graph edges, in insertion order.
    pub callsite_to_edges: HashMap<S, Vec<CGEdgeId>>,
    /// Every (callsite, callee) pair that has an edge.
    edge_set: HashSet<(S, F)>,
    entry_funcs: Vec<F>,
    reach_funcs_set: HashSet<F>,
    /// A queue of reachable nodes.
    pub(crate) reach_funcs: ChunkedQueue<F>,
}

impl<F: CGFunction, S: CGCallSite> Default for CallGraph<F, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: CGFunction, S: CGCallSite> CallGraph<F, S> {
    pub fn new() -> Self {
        CallGraph {
            graph: CGGraph::new(),
            func_nodes: HashMap::new(),
            callsite_to_edges: HashMap::new(),
            edge_set: HashSet::new(),
            entry_funcs: Vec::new(),
            reach_funcs_set: HashSet::new(),
            reach_funcs: ChunkedQueue::new(),
        }
    }

    /// Helper function to get a node or insert a new
    /// node if it does not exist in the map.
    fn get_or_insert_node(&mut self, func: F) -> CGNodeId {
        match self.func_nodes.entry(func) {
            Entry::Occupied(o) => o.get().to_owned(),
            Entry::Vacant(v) => {
                let node_id = self.graph.add_node(CallGraphNode::new(func));
                *v.insert(node_id)
            }
        }
    }

    /// Marks `func` as an entry of the program.
    pub fn add_entry_method(&mut self, func: F) {
        self.get_or_insert_node(func);
        if !self.entry_funcs.contains(&func) {
            self.entry_funcs.push(func);
        }
    }

    /// Records `func` as reachable.
    /// Returns true if it was not reachable before.
    pub fn add_new_method(&mut self, func: F) -> bool {
        if !self.reach_funcs_set.insert(func) {
            return false;
        }
        self.get_or_insert_node(func);
        self.reach_funcs.push(func);
        true
    }

    pub fn is_reachable(&self, func: F) -> bool {
        self.reach_funcs_set.contains(&func)
    }

    /// Returns true if an edge to the callee already existed for the callsite.
    pub fn contains_edge(&self, edge: &CallEdge<F, S>) -> bool {
        self.edge_set.contains(&(edge.callsite, edge.callee))
    }

    /// Adds a new edge to the call graph.
    /// Returns false if the edge already existed, and true otherwise.
    pub fn add_edge(&mut self, edge: CallEdge<F, S>) -> bool {
        if !self.edge_set.insert((edge.callsite, edge.callee)) {
            return false;
        }
        let caller_node = self.get_or_insert_node(edge.caller);
        let callee_node = self.get_or_insert_node(edge.callee);
        let edge_id = self
            .graph
            .add_edge(caller_node, callee_node, CallGraphEdge::new(edge.callsite, edge.kind));
        self.callsite_to_edges.entry(edge.callsite).or_default().push(edge_id);
        true
    }

    /// Returns all callees of a callsite, in the order they were discovered.
    pub fn get_callees(&self, callsite: &S) -> Vec<F> {
        match self.callsite_to_edges.get(callsite) {
            Some(edges) => edges
                .iter()
                .filter_map(|edge_id| self.graph.edge_endpoints(*edge_id))
                .map(|(_, target)| self.graph[target].func)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Returns the callees of `func` over all of its callsites.
    pub fn callees_of(&self, func: F) -> Vec<F> {
        match self.func_nodes.get(&func) {
            Some(node) => self
                .graph
                .edges(*node)
                .map(|e| self.graph[e.target()].func)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn entry_funcs(&self) -> &[F] {
        &self.entry_funcs
    }

    /// Return a cursor over the reachable functions queue.
    pub fn reach_funcs_cursor(&self) -> Cursor {
        self.reach_funcs.cursor()
    }

    /// Reachable functions, in the order they were discovered.
    pub fn reach_funcs(&self) -> impl Iterator<Item = F> + '_ {
        self.reach_funcs.iter().copied()
    }

    pub fn num_reach_funcs(&self) -> usize {
        self.reach_funcs.len()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// All edges, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = CallEdge<F, S>> + '_ {
        self.graph.edge_references().map(|e| {
            let weight = e.weight();
            CallEdge::new(
                self.graph[e.source()].func,
                weight.callsite,
                self.graph[e.target()].func,
                weight.kind,
            )
        })
    }

    /// Projects the graph onto other function and callsite domains, merging
    /// nodes and edges that map to the same values.
    pub fn project<F2, S2>(&self, map_func: impl Fn(F) -> F2, map_callsite: impl Fn(S) -> S2) -> CallGraph<F2, S2>
    where
        F2: CGFunction,
        S2: CGCallSite,
    {
        let mut projected = CallGraph::new();
        for func in &self.entry_funcs {
            projected.add_entry_method(map_func(*func));
        }
        for func in self.reach_funcs() {
            projected.add_new_method(map_func(func));
        }
        for edge in self.edges() {
            projected.add_edge(CallEdge::new(
                map_func(edge.caller),
                map_callsite(edge.callsite),
                map_func(edge.callee),
                edge.kind,
            ));
        }
        projected
    }

    /// Produce a dot file representation of the call graph
    /// for displaying with Graphviz.
    pub fn to_dot<W: Write>(
        &self,
        w: &mut W,
        func_label: impl Fn(F) -> String,
        callsite_label: impl Fn(S) -> String,
    ) -> io::Result<()> {
        let node_attr = |_: &CGGraph<F, S>, (_, node): (CGNodeId, &CallGraphNode<F>)| {
            format!("label = {:?}", func_label(node.func))
        };
        let edge_attr = |_: &CGGraph<F, S>, edge: EdgeReference<'_, CallGraphEdge<S>>| {
            let weight = edge.weight();
            format!("label = {:?}", format!("{} ({})", callsite_label(weight.callsite), weight.kind))
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

    fn m(i: u32) -> MethodId {
        MethodId::from_raw(i)
    }

    fn cs(i: u32) -> CallSiteId {
        CallSiteId::from_raw(i)
    }

    #[test]
    fn reachability_is_independent_of_edges() {
        let mut cg = CICallGraph::new();
        cg.add_entry_method(m(0));
        assert!(cg.add_new_method(m(0)));
        assert!(!cg.add_new_method(m(0)));

        let edge = CallEdge::new(m(0), cs(0), m(1), CallKind::Static);
        assert!(!cg.contains_edge(&edge));
        assert!(cg.add_edge(edge));
        assert!(cg.contains_edge(&edge));
        assert!(!cg.add_edge(edge));
        // the callee gained a node but is not reachable until processed
        assert!(!cg.is_reachable(m(1)));
        assert!(cg.add_new_method(m(1)));
        assert_eq!(cg.num_reach_funcs(), 2);
        assert_eq!(cg.num_edges(), 1);
    }

    #[test]
    fn one_callsite_many_callees() {
        let mut cg = CICallGraph::new();
        cg.add_edge(CallEdge::new(m(0), cs(0), m(1), CallKind::Virtual));
        cg.add_edge(CallEdge::new(m(0), cs(0), m(2), CallKind::Virtual));
        cg.add_edge(CallEdge::new(m(0), cs(1), m(1), CallKind::Virtual));
        assert_eq!(cg.get_callees(&cs(0)), vec![m(1), m(2)]);
        assert_eq!(cg.get_callees(&cs(1)), vec![m(1)]);
        assert_eq!(cg.callees_of(m(0)).len(), 3);
        assert!(cg.get_callees(&cs(2)).is_empty());
    }

    #[test]
    fn projection_merges_edges() {
        let mut cg = CICallGraph::new();
        cg.add_entry_method(m(0));
        cg.add_new_method(m(0));
        cg.add_edge(CallEdge::new(m(0), cs(0), m(1), CallKind::Virtual));
        cg.add_edge(CallEdge::new(m(0), cs(0), m(2), CallKind::Virtual));
        let merged = cg.project(|_| m(9), |s| s);
        assert_eq!(merged.num_edges(), 1);
        assert_eq!(merged.entry_funcs(), &[m(9)]);

        let mut out = Vec::new();
        cg.to_dot(&mut out, |f| format!("{:?}", f), |s| format!("{:?}", s)).unwrap();
        let dot = String::from_utf8(out).unwrap();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("CallSiteId(0) (virtual)"));
    }
}
