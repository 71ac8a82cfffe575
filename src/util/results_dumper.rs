// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use log::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::ir::context::ContextElement;
use crate::ir::cs_manager::{CSManager, CSObjId, Pointer, PointerId};
use crate::ir::heap::{Obj, ObjKind};
use crate::ir::program::Program;
use crate::pta::context_sensitive::ContextSensitivePTA;
use crate::pta::context_strategy::ContextSelector;
use crate::pta::heap_model::HeapModel;
use crate::pts_set::points_to::PointsToSet;
use crate::util::options::AnalysisOptions;

/// Writes every output requested by `options`.
pub fn dump_results<S, H, DS>(
    program: &Program,
    pta: &ContextSensitivePTA<S, H, DS>,
    options: &AnalysisOptions,
) -> io::Result<()>
where
    S: ContextSelector,
    H: HeapModel,
    DS: PointsToSet<CSObjId> + Clone,
{
    if let Some(pts_output) = &options.pts_output {
        info!("Dumping points-to results...");
        let mut writer = create_writer(pts_output)?;
        writeln!(writer, "# Context-sensitive points-to sets")?;
        write_cs_pts(program, pta, &mut writer)?;
        writeln!(writer, "# Context-insensitive points-to sets")?;
        write_ci_pts(program, pta, &mut writer)?;
        writer.flush()?;
    }

    if let Some(cg_output) = &options.call_graph_output {
        info!("Dumping call graph...");
        let mut writer = create_writer(cg_output)?;
        write_call_graph(program, pta, &mut writer)?;
        writer.flush()?;
    }

    if let Some(pfg_output) = &options.pfg_output {
        info!("Dumping pointer flow graph...");
        let mut writer = create_writer(pfg_output)?;
        pta.pfg()
            .to_dot(&mut writer, |ptr| pointer_label(program, pta.cs_manager(), ptr))?;
        writer.flush()?;
    }
    Ok(())
}

fn create_writer(path: &str) -> io::Result<BufWriter<Box<dyn Write>>> {
    let inner: Box<dyn Write> = match path {
        "stdout" => Box::new(io::stdout()),
        _ => Box::new(File::create(path)?),
    };
    Ok(BufWriter::new(inner))
}

/// Writes the context-insensitive call graph in DOT format.
pub fn write_call_graph<S, H, DS, W>(
    program: &Program,
    pta: &ContextSensitivePTA<S, H, DS>,
    w: &mut W,
) -> io::Result<()>
where
    S: ContextSelector,
    H: HeapModel,
    DS: PointsToSet<CSObjId> + Clone,
    W: Write,
{
    let csm = pta.cs_manager();
    let ci_call_graph = pta.call_graph().project(
        |m| csm.cs_method(m).method,
        |cs| csm.cs_callsite(cs).callsite,
    );
    ci_call_graph.to_dot(w, |m| program.method_name(m), |cs| format!("{:?}", cs))
}

/// Writes the points-to set of every context-sensitive variable and instance
/// field, ordered by pointer label.
pub fn write_cs_pts<S, H, DS, W>(
    program: &Program,
    pta: &ContextSensitivePTA<S, H, DS>,
    w: &mut W,
) -> io::Result<()>
where
    S: ContextSelector,
    H: HeapModel,
    DS: PointsToSet<CSObjId> + Clone,
    W: Write,
{
    let csm = pta.cs_manager();
    let mut lines = Vec::new();
    for (ptr_id, _) in csm.pointers() {
        let pts = pta.get_pts(ptr_id);
        if pts.is_empty() {
            continue;
        }
        let pointees = pts
            .iter()
            .map(|pointee| cs_obj_label(program, csm, pointee))
            .collect::<BTreeSet<_>>();
        lines.push((pointer_label(program, csm, ptr_id), pointees));
    }
    lines.sort();
    for (pointer, pts) in lines {
        write!(w, "{} ==> {{ ", pointer)?;
        for pointee in pts {
            write!(w, "{} ", pointee)?;
        }
        writeln!(w, "}}")?;
    }
    Ok(())
}

/// Writes points-to results with contexts merged, one pointer per line,
/// ordered by pointer name.
pub fn write_ci_pts<S, H, DS, W>(
    program: &Program,
    pta: &ContextSensitivePTA<S, H, DS>,
    w: &mut W,
) -> io::Result<()>
where
    S: ContextSelector,
    H: HeapModel,
    DS: PointsToSet<CSObjId> + Clone,
    W: Write,
{
    let csm = pta.cs_manager();
    let mut ci_pts_map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (ptr_id, pointer) in csm.pointers() {
        let pts = pta.get_pts(ptr_id);
        if pts.is_empty() {
            continue;
        }
        let ci_label = match *pointer {
            Pointer::Var { var, .. } => program.var_name(var),
            Pointer::InstanceField { obj, field } => format!(
                "{}.{}",
                obj_label(program, csm.obj(csm.cs_obj(obj).obj)),
                program.field(field).name
            ),
        };
        let ci_pts = ci_pts_map.entry(ci_label).or_default();
        for pointee in pts.iter() {
            ci_pts.insert(obj_label(program, csm.obj(csm.cs_obj(pointee).obj)));
        }
    }
    for (pointer, pts) in ci_pts_map {
        write!(w, "{} ==> {{ ", pointer)?;
        for pointee in pts {
            write!(w, "{} ", pointee)?;
        }
        writeln!(w, "}}")?;
    }
    Ok(())
}

fn obj_label(program: &Program, obj: &Obj) -> String {
    let ty_name = &program.ty(obj.ty).name;
    match obj.kind {
        ObjKind::AllocationSite(site) => match obj.container {
            Some(method) => format!("NewObj#{}<{}>@{}", site.raw(), ty_name, program.method_name(method)),
            None => format!("NewObj#{}<{}>", site.raw(), ty_name),
        },
        ObjKind::MergedByType => format!("MergedObj<{}>", ty_name),
    }
}

fn cs_obj_label<E: ContextElement>(program: &Program, csm: &CSManager<E>, obj: CSObjId) -> String {
    let cs_obj = csm.cs_obj(obj);
    format!("{:?}:{}", csm.get_context(cs_obj.cid), obj_label(program, csm.obj(cs_obj.obj)))
}

fn pointer_label<E: ContextElement>(program: &Program, csm: &CSManager<E>, ptr: PointerId) -> String {
    match *csm.pointer(ptr) {
        Pointer::Var { cid, var } => format!("{:?}:{}", csm.get_context(cid), program.var_name(var)),
        Pointer::InstanceField { obj, field } => {
            format!("{}.{}", cs_obj_label(program, csm, obj), program.field(field).name)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::builder::ProgramBuilder;
    use crate::pta::context_strategy::KCallSiteSensitive;
    use crate::pta::heap_model::AllocationSiteHeapModel;
    use crate::pta::PointerAnalysis;

    fn analyzed_program() -> Program {
        let mut b = ProgramBuilder::new();
        let ty = b.add_type("Main", None);
        let id = b.add_static_method(ty, "id", &["p"]);
        let p = b.params(id)[0];
        b.ret(id, p);
        let main = b.add_static_method(ty, "main", &[]);
        let (x, y) = (b.var(main, "x"), b.var(main, "y"));
        let f = b.field("f");
        b.new_obj(main, x, ty);
        b.call_static(main, id, &[x], Some(y));
        b.store(main, y, f, x);
        b.add_entry(main);
        b.build()
    }

    #[test]
    fn ci_pts_are_sorted_and_merged() {
        let program = analyzed_program();
        let mut pta: ContextSensitivePTA<_, _> =
            ContextSensitivePTA::new(&program, KCallSiteSensitive::new(1), AllocationSiteHeapModel);
        pta.analyze().unwrap();

        let mut out = Vec::new();
        write_ci_pts(&program, &pta, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Main.id/p ==> { NewObj#0<Main>@Main.main }",
                "Main.main/x ==> { NewObj#0<Main>@Main.main }",
                "Main.main/y ==> { NewObj#0<Main>@Main.main }",
                "NewObj#0<Main>@Main.main.f ==> { NewObj#0<Main>@Main.main }",
            ]
        );
    }

    #[test]
    fn cs_pts_keep_contexts_apart() {
        let program = analyzed_program();
        let mut pta: ContextSensitivePTA<_, _> =
            ContextSensitivePTA::new(&program, KCallSiteSensitive::new(1), AllocationSiteHeapModel);
        pta.analyze().unwrap();

        let mut out = Vec::new();
        write_cs_pts(&program, &pta, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("[]:Main.main/x ==> { []:NewObj#0<Main>@Main.main }"));
        assert!(text.contains("[CallSiteId(0)]:Main.id/p ==> { []:NewObj#0<Main>@Main.main }"));
    }

    #[test]
    fn graphs_are_written_as_dot() {
        let program = analyzed_program();
        let mut pta: ContextSensitivePTA<_, _> =
            ContextSensitivePTA::new(&program, KCallSiteSensitive::new(1), AllocationSiteHeapModel);
        pta.analyze().unwrap();

        let mut out = Vec::new();
        write_call_graph(&program, &pta, &mut out).unwrap();
        let cg = String::from_utf8(out).unwrap();
        assert!(cg.starts_with("digraph"));
        assert!(cg.contains("Main.main"));
        assert!(cg.contains("Main.id"));

        let mut out = Vec::new();
        pta.pfg()
            .to_dot(&mut out, |ptr| pointer_label(&program, pta.cs_manager(), ptr))
            .unwrap();
        let pfg = String::from_utf8(out).unwrap();
        assert!(pfg.contains("param"));
        assert!(pfg.contains("return"));
        assert!(pfg.contains("store"));
    }
}
