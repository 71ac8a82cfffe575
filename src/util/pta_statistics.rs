// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use log::*;
use std::collections::{HashMap, HashSet};
use std::io::{self, BufWriter, Write};

use crate::ir::cs_manager::{CSObjId, Pointer};
use crate::ir::heap::ObjId;
use crate::ir::program::{FieldId, VarId};
use crate::pta::context_sensitive::ContextSensitivePTA;
use crate::pta::context_strategy::ContextSelector;
use crate::pta::heap_model::HeapModel;
use crate::pts_set::points_to::PointsToSet;

/// Pointers with the contexts dropped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum CIPointer {
    Var(VarId),
    InstanceField(ObjId, FieldId),
}

pub struct ContextSensitiveStat<'a, 'pta, S, H, DS>
where
    S: ContextSelector,
    H: HeapModel,
    DS: PointsToSet<CSObjId> + Clone,
{
    pta: &'a ContextSensitivePTA<'pta, S, H, DS>,
}

impl<'a, 'pta, S, H, DS> ContextSensitiveStat<'a, 'pta, S, H, DS>
where
    S: ContextSelector,
    H: HeapModel,
    DS: PointsToSet<CSObjId> + Clone,
{
    pub fn new(pta: &'a ContextSensitivePTA<'pta, S, H, DS>) -> Self {
        ContextSensitiveStat { pta }
    }

    pub fn dump_stats(&self) -> io::Result<()> {
        info!("Dumping pta statistics...");
        let mut stat_writer = BufWriter::new(io::stdout());
        self.write_stats(&mut stat_writer)?;
        stat_writer.flush()
    }

    pub fn write_stats<W: Write>(&self, stat_writer: &mut W) -> io::Result<()> {
        writeln!(stat_writer, "##########################################################")?;
        crate::util::call_graph_stat::cs_call_graph_stat(
            self.pta.program(),
            self.pta.cs_manager(),
            self.pta.call_graph(),
            stat_writer,
        )?;
        writeln!(stat_writer, "----------------------------------------------------------")?;
        self.write_pts_stat(stat_writer)?;
        writeln!(stat_writer, "##########################################################")
    }

    pub fn write_pts_stat<W: Write>(&self, stat_writer: &mut W) -> io::Result<()> {
        let csm = self.pta.cs_manager();
        let mut ci_pts_map: HashMap<CIPointer, HashSet<ObjId>> = HashMap::new();
        let mut num_cs_pointers = 0;
        let mut num_cs_pts_relations = 0;
        for (ptr_id, pointer) in csm.pointers() {
            let pts = self.pta.get_pts(ptr_id);
            num_cs_pointers += 1;
            num_cs_pts_relations += pts.count();

            let ci_pointer = match *pointer {
                Pointer::Var { var, .. } => CIPointer::Var(var),
                Pointer::InstanceField { obj, field } => CIPointer::InstanceField(csm.cs_obj(obj).obj, field),
            };
            let ci_pts = ci_pts_map.entry(ci_pointer).or_default();
            for pointee in pts.iter() {
                ci_pts.insert(csm.cs_obj(pointee).obj);
            }
        }
        let num_ci_pointers = ci_pts_map.len();
        let num_ci_pts_relations: usize = ci_pts_map.values().map(|pts| pts.len()).sum();

        writeln!(stat_writer, "CS Points-to Statistics: ")?;
        writeln!(stat_writer, "#Objects: {}", csm.num_cs_objs())?;
        writeln!(stat_writer, "#Pointers: {}", num_cs_pointers)?;
        writeln!(stat_writer, "#Points-to relations: {}", num_cs_pts_relations)?;
        writeln!(stat_writer, "#Avg points-to size: {:.2}", average(num_cs_pts_relations, num_cs_pointers))?;
        writeln!(stat_writer, "#Propagations: {}", self.pta.num_propagations())?;
        writeln!(stat_writer, "#PFG edges: {}", self.pta.pfg().num_edges())?;

        writeln!(stat_writer, "CI Points-to Statistics: ")?;
        writeln!(stat_writer, "#Objects: {}", csm.num_objs())?;
        writeln!(stat_writer, "#Pointers: {}", num_ci_pointers)?;
        writeln!(stat_writer, "#Points-to relations: {}", num_ci_pts_relations)?;
        writeln!(stat_writer, "#Avg points-to size: {:.2}", average(num_ci_pts_relations, num_ci_pointers))
    }
}

fn average(total: usize, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}
