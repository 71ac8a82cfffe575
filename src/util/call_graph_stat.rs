// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashSet;
use std::io::{self, Write};

use crate::graph::call_graph::{CICallGraph, CSCallGraph};
use crate::ir::context::ContextElement;
use crate::ir::cs_manager::CSManager;
use crate::ir::program::{CallKind, CallSiteId};
use crate::ir::ProgramManager;

#[derive(Default, Debug, PartialEq, Eq)]
struct CallKindCounts {
    static_calls: usize,
    static_edges: usize,
    special_calls: usize,
    special_edges: usize,
    virtual_calls: usize,
    virtual_edges: usize,
}

fn count_call_kinds(call_graph: &CICallGraph) -> CallKindCounts {
    let mut counts = CallKindCounts::default();
    let mut resolved_calls: HashSet<CallSiteId> = HashSet::new();
    for edge in call_graph.edges() {
        let new_call = resolved_calls.insert(edge.callsite);
        match edge.kind {
            CallKind::Static => {
                counts.static_calls += new_call as usize;
                counts.static_edges += 1;
            }
            CallKind::Special => {
                counts.special_calls += new_call as usize;
                counts.special_edges += 1;
            }
            CallKind::Virtual => {
                counts.virtual_calls += new_call as usize;
                counts.virtual_edges += 1;
            }
        }
    }
    counts
}

fn write_call_kind_counts<W: Write>(counts: &CallKindCounts, stat_writer: &mut W) -> io::Result<()> {
    writeln!(
        stat_writer,
        "#Static calls: {}, #call graph edges: {}",
        counts.static_calls, counts.static_edges
    )?;
    writeln!(
        stat_writer,
        "#Special calls: {}, #call graph edges: {}",
        counts.special_calls, counts.special_edges
    )?;
    writeln!(
        stat_writer,
        "#Virtual calls: {}, #call graph edges: {}",
        counts.virtual_calls, counts.virtual_edges
    )
}

/// Summary of a context-insensitive call graph.
pub fn ci_call_graph_stat<W: Write>(call_graph: &CICallGraph, stat_writer: &mut W) -> io::Result<()> {
    writeln!(stat_writer, "Call Graph Statistics: ")?;
    writeln!(stat_writer, "#Reachable methods: {}", call_graph.num_reach_funcs())?;
    writeln!(stat_writer, "#Call graph edges: {}", call_graph.num_edges())?;
    write_call_kind_counts(&count_call_kinds(call_graph), stat_writer)
}

/// Summary of a context-sensitive call graph together with its
/// context-insensitive projection.
pub fn cs_call_graph_stat<E: ContextElement, W: Write>(
    program: &dyn ProgramManager,
    csm: &CSManager<E>,
    call_graph: &CSCallGraph,
    stat_writer: &mut W,
) -> io::Result<()> {
    let ci_call_graph = call_graph.project(
        |m| csm.cs_method(m).method,
        |cs| csm.cs_callsite(cs).callsite,
    );
    let num_cs_reach_funcs = call_graph.num_reach_funcs();
    let num_ci_reach_funcs = ci_call_graph.num_reach_funcs();
    let avg_contexts = if num_ci_reach_funcs == 0 {
        0.0
    } else {
        num_cs_reach_funcs as f64 / num_ci_reach_funcs as f64
    };
    let num_reachable_stmts: usize = ci_call_graph
        .reach_funcs()
        .map(|m| program.method(m).stmts.len())
        .sum();

    writeln!(stat_writer, "Call Graph Statistics: ")?;
    writeln!(stat_writer, "#Contexts: {}", csm.num_contexts())?;
    writeln!(stat_writer, "#Reachable CS methods: {}", num_cs_reach_funcs)?;
    writeln!(stat_writer, "#Reachable CI methods: {}", num_ci_reach_funcs)?;
    writeln!(stat_writer, "#Avg contexts per method: {:.2}", avg_contexts)?;
    writeln!(stat_writer, "#Reachable statements: {}", num_reachable_stmts)?;
    writeln!(stat_writer, "#CS call graph edges: {}", call_graph.num_edges())?;
    writeln!(stat_writer, "#CI call graph edges: {}", ci_call_graph.num_edges())?;
    write_call_kind_counts(&count_call_kinds(&ci_call_graph), stat_writer)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::call_graph::CallEdge;
    use crate::ir::program::MethodId;

    #[test]
    fn calls_are_counted_once_per_callsite() {
        let m = |i| MethodId::from_raw(i);
        let cs = |i| CallSiteId::from_raw(i);
        let mut cg = CICallGraph::new();
        cg.add_entry_method(m(0));
        cg.add_edge(CallEdge::new(m(0), cs(0), m(1), CallKind::Virtual));
        cg.add_edge(CallEdge::new(m(0), cs(0), m(2), CallKind::Virtual));
        cg.add_edge(CallEdge::new(m(0), cs(1), m(3), CallKind::Static));
        cg.add_edge(CallEdge::new(m(1), cs(2), m(3), CallKind::Special));

        let counts = count_call_kinds(&cg);
        assert_eq!(
            counts,
            CallKindCounts {
                static_calls: 1,
                static_edges: 1,
                special_calls: 1,
                special_edges: 1,
                virtual_calls: 1,
                virtual_edges: 2,
            }
        );

        let mut out = Vec::new();
        ci_call_graph_stat(&cg, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("#Call graph edges: 4"));
        assert!(text.contains("#Virtual calls: 1, #call graph edges: 2"));
    }
}
