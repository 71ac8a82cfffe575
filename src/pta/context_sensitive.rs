// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Instant;

use itertools::Itertools;
use log::*;

use super::context_strategy::{ContextInsensitive, ContextSelector, KCallSiteSensitive, KObjectSensitive};
use super::heap_model::HeapModel;
use super::worklist::{CSCallEdge, WorkList};
use super::{AnalysisError, PointerAnalysis, PointsTo};
use crate::graph::call_graph::{CSCallGraph, CallEdge};
use crate::graph::pfg::{PFGEdgeKind, PointerFlowGraph};
use crate::ir::context::ContextId;
use crate::ir::cs_manager::{CSCallSite, CSManager, CSMethod, CSMethodId, CSObjId, Pointer, PointerId};
use crate::ir::heap::ObjId;
use crate::ir::program::{CallKind, CallSiteId, FieldId, MethodId, Stmt, VarId};
use crate::ir::ProgramManager;
use crate::pts_set::points_to::PointsToSet;
use crate::pts_set::pt_data::DiffPTData;

pub type ContextInsensitivePTA<'pta, H> = ContextSensitivePTA<'pta, ContextInsensitive, H>;
pub type CallSiteSensitivePTA<'pta, H> = ContextSensitivePTA<'pta, KCallSiteSensitive, H>;
pub type ObjectSensitivePTA<'pta, H> = ContextSensitivePTA<'pta, KObjectSensitive, H>;

/// On-the-fly context-sensitive pointer analysis.
///
/// Points-to sets, the pointer flow graph and the call graph grow together
/// in one fixpoint driven by the work list.
pub struct ContextSensitivePTA<'pta, S, H, DS = PointsTo<CSObjId>>
where
    S: ContextSelector,
    H: HeapModel,
    DS: PointsToSet<CSObjId> + Clone,
{
    program: &'pta dyn ProgramManager,
    /// Points-to data
    pub(crate) pt_data: DiffPTData<PointerId, CSObjId, DS>,
    /// Pointer flow graph
    pub(crate) pfg: PointerFlowGraph,
    /// Call graph
    pub(crate) call_graph: CSCallGraph,
    pub(crate) csm: CSManager<S::E>,
    work_list: WorkList,
    /// Set while the call-edge queue is being drained.
    draining_call_edges: bool,
    ctx_strategy: S,
    heap_model: H,
    empty_pts: DS,
    num_propagations: usize,
}

impl<'pta, S, H, DS> Debug for ContextSensitivePTA<'pta, S, H, DS>
where
    S: ContextSelector,
    H: HeapModel,
    DS: PointsToSet<CSObjId> + Clone,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        "ContextSensitivePTA".fmt(f)
    }
}

/// Constructor
impl<'pta, S, H, DS> ContextSensitivePTA<'pta, S, H, DS>
where
    S: ContextSelector,
    H: HeapModel,
    DS: PointsToSet<CSObjId> + Clone,
{
    pub fn new(program: &'pta dyn ProgramManager, ctx_strategy: S, heap_model: H) -> Self {
        ContextSensitivePTA {
            program,
            pt_data: DiffPTData::new(),
            pfg: PointerFlowGraph::new(),
            call_graph: CSCallGraph::new(),
            csm: CSManager::new(),
            work_list: WorkList::new(),
            draining_call_edges: false,
            ctx_strategy,
            heap_model,
            empty_pts: DS::new(),
            num_propagations: 0,
        }
    }

    /// Initialize the analysis: every entry method becomes reachable in the
    /// default context.
    pub fn initialize(&mut self) -> Result<(), AnalysisError> {
        let default_ctx = self.ctx_strategy.default_context();
        let cid = self.csm.get_context_id(&default_ctx);
        for &entry in self.program.entry_methods() {
            let cs_entry = self.csm.intern_method(cid, entry);
            self.call_graph.add_entry_method(cs_entry);
            self.add_reachable(cs_entry)?;
        }
        Ok(())
    }

    /// Solve the worklist problem until both queues are empty.
    pub fn propagate(&mut self) -> Result<(), AnalysisError> {
        while self.step()? {}
        Ok(())
    }

    /// Initializes the analysis and runs it to its fixpoint.
    pub fn solve(&mut self) -> Result<(), AnalysisError> {
        self.initialize()?;
        self.propagate()
    }

    /// Performs one unit of work. The pointer queue is drained before the
    /// call-edge queue, and the call-edge queue is drained before pointers
    /// queued meanwhile are looked at again.
    /// Returns false once the fixpoint is reached.
    pub fn step(&mut self) -> Result<bool, AnalysisError> {
        if !self.draining_call_edges {
            if let Some(pointer) = self.work_list.pop_pointer() {
                self.propagate_pointer(pointer)?;
                return Ok(true);
            }
            self.draining_call_edges = true;
        }
        if let Some(edge) = self.work_list.pop_call_edge() {
            self.process_call_edge(edge)?;
            return Ok(true);
        }
        self.draining_call_edges = false;
        if let Some(pointer) = self.work_list.pop_pointer() {
            self.propagate_pointer(pointer)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Processes the statements of a method the first time it becomes reachable.
    fn add_reachable(&mut self, cs_method: CSMethodId) -> Result<(), AnalysisError> {
        if !self.call_graph.add_new_method(cs_method) {
            return Ok(());
        }
        let program = self.program;
        let CSMethod { cid, method } = *self.csm.cs_method(cs_method);
        debug!(
            "Processing method {:?}, context: {:?}",
            method,
            self.csm.get_context(cid)
        );
        for stmt in &program.method(method).stmts {
            match *stmt {
                Stmt::Allocation { var, site, ty } => {
                    let obj = self.heap_model.get_obj(site, ty, method)?;
                    let method_ctx = self.csm.get_context(cid);
                    let heap_ctx = self.ctx_strategy.select_heap_context(&method_ctx, method, &obj)?;
                    let heap_cid = self.csm.get_context_id(&heap_ctx);
                    let obj_id = self.csm.intern_obj(obj);
                    let cs_obj = self.csm.intern_cs_obj(heap_cid, obj_id);
                    let ptr = self.csm.intern_var(cid, var);
                    self.add_pts(ptr, cs_obj);
                }
                Stmt::Assign { to, from } => {
                    let from = self.csm.intern_var(cid, from);
                    let to = self.csm.intern_var(cid, to);
                    self.add_pfg_edge(from, to, PFGEdgeKind::LocalAssign);
                }
                // Field accesses are handled when objects reach their base variable.
                Stmt::InstanceLoad { .. } | Stmt::InstanceStore { .. } => {}
                Stmt::Call(callsite) => self.process_call_stmt(cid, method, callsite)?,
            }
        }
        Ok(())
    }

    /// Calls without receiver are resolved right away; receiver calls wait
    /// for objects to reach the receiver variable.
    fn process_call_stmt(&mut self, cid: ContextId, container: MethodId, callsite: CallSiteId) -> Result<(), AnalysisError> {
        let program = self.program;
        let call_site = program.call_site(callsite);
        let kind = call_site.kind;
        let callee = match (kind, call_site.receiver) {
            (CallKind::Static, None) => call_site.target,
            (CallKind::Special, None) => self.resolve_special(callsite, container)?,
            (CallKind::Static, Some(_)) => return Err(AnalysisError::UnresolvableCallKind { callsite, kind }),
            (CallKind::Virtual, None) => return Err(AnalysisError::MissingReceiver { callsite, kind }),
            (_, Some(_)) => return Ok(()),
        };
        let caller_ctx = self.csm.get_context(cid);
        let callee_ctx = self.ctx_strategy.select_context(&caller_ctx, callsite, callee)?;
        let callee_cid = self.csm.get_context_id(&callee_ctx);
        self.push_call_edge(cid, callsite, container, callee, callee_cid, kind);
        Ok(())
    }

    /// Propagates the pending delta of `pointer`.
    fn propagate_pointer(&mut self, pointer: PointerId) -> Result<(), AnalysisError> {
        let delta = self.pt_data.flush(pointer);
        if delta.is_empty() {
            return Ok(());
        }
        self.num_propagations += 1;
        debug!("Propagating {} objects from {:?}", delta.count(), self.csm.pointer(pointer));

        for (target, _) in self.pfg.out_edges_of(pointer) {
            self.enqueue(target, &delta);
        }
        if let Pointer::Var { cid, var } = *self.csm.pointer(pointer) {
            self.process_instance_store(cid, var, &delta);
            self.process_instance_load(cid, var, &delta);
            self.process_receiver_calls(cid, var, &delta)?;
        }
        Ok(())
    }

    /// `var.field = from`: connects `from` to the field of every new object.
    fn process_instance_store(&mut self, cid: ContextId, var: VarId, delta: &DS) {
        let program = self.program;
        for &(field, from) in &program.var(var).stores {
            let from = self.csm.intern_var(cid, from);
            for obj in delta.iter() {
                let field_ptr = self.csm.intern_field(obj, field);
                self.add_pfg_edge(from, field_ptr, PFGEdgeKind::InstanceStore);
            }
        }
    }

    /// `to = var.field`: connects the field of every new object to `to`.
    fn process_instance_load(&mut self, cid: ContextId, var: VarId, delta: &DS) {
        let program = self.program;
        for &(field, to) in &program.var(var).loads {
            let to = self.csm.intern_var(cid, to);
            for obj in delta.iter() {
                let field_ptr = self.csm.intern_field(obj, field);
                self.add_pfg_edge(field_ptr, to, PFGEdgeKind::InstanceLoad);
            }
        }
    }

    /// Resolves the calls on `var` for every new receiver object. Each object
    /// seeds the `this` variable of its callee, even when the call edge
    /// itself is already known.
    fn process_receiver_calls(&mut self, cid: ContextId, var: VarId, delta: &DS) -> Result<(), AnalysisError> {
        let program = self.program;
        for &callsite in &program.var(var).calls {
            let call_site = program.call_site(callsite);
            for recv in delta.iter() {
                let callee = self.resolve_callee(recv, callsite)?;
                let recv_obj = *self.csm.cs_obj(recv);
                let caller_ctx = self.csm.get_context(cid);
                let recv_ctx = self.csm.get_context(recv_obj.cid);
                let callee_ctx = self.ctx_strategy.select_instance_context(
                    &caller_ctx,
                    callsite,
                    &recv_ctx,
                    recv_obj.obj,
                    callee,
                )?;
                let callee_cid = self.csm.get_context_id(&callee_ctx);
                self.push_call_edge(cid, callsite, call_site.container, callee, callee_cid, call_site.kind);

                let this_var = program
                    .method(callee)
                    .this_var
                    .ok_or(AnalysisError::MissingThis(callee))?;
                let this_ptr = self.csm.intern_var(callee_cid, this_var);
                self.add_pts(this_ptr, recv);
            }
        }
        Ok(())
    }

    /// Resolves the callee of a receiver call on `recv`.
    fn resolve_callee(&self, recv: CSObjId, callsite: CallSiteId) -> Result<MethodId, AnalysisError> {
        let program = self.program;
        let call_site = program.call_site(callsite);
        match call_site.kind {
            CallKind::Virtual => {
                let ty = self.csm.obj(self.csm.cs_obj(recv).obj).ty;
                program
                    .resolve_virtual_call(ty, call_site.target)
                    .ok_or_else(|| AnalysisError::DispatchFailure {
                        callsite,
                        ty: program.type_name(ty).to_string(),
                    })
            }
            CallKind::Special => self.resolve_special(callsite, call_site.container),
            CallKind::Static => Err(AnalysisError::UnresolvableCallKind {
                callsite,
                kind: CallKind::Static,
            }),
        }
    }

    fn resolve_special(&self, callsite: CallSiteId, container: MethodId) -> Result<MethodId, AnalysisError> {
        let program = self.program;
        program.resolve_special_call(callsite, container).ok_or_else(|| {
            let target = program.method(program.call_site(callsite).target);
            AnalysisError::DispatchFailure {
                callsite,
                ty: program.type_name(target.declaring_type).to_string(),
            }
        })
    }

    fn push_call_edge(
        &mut self,
        cid: ContextId,
        callsite: CallSiteId,
        container: MethodId,
        callee: MethodId,
        callee_cid: ContextId,
        kind: CallKind,
    ) {
        let cs_callsite = self.csm.intern_callsite(cid, callsite);
        let caller = self.csm.intern_method(cid, container);
        let cs_callee = self.csm.intern_method(callee_cid, callee);
        self.work_list
            .push_call_edge(CallEdge::new(caller, cs_callsite, cs_callee, kind));
    }

    /// Adds a call edge to the call graph and wires parameters and return
    /// values. Edges already in the call graph are skipped.
    fn process_call_edge(&mut self, edge: CSCallEdge) -> Result<(), AnalysisError> {
        if self.call_graph.contains_edge(&edge) {
            return Ok(());
        }
        let program = self.program;
        let CSCallSite { cid: caller_cid, callsite } = *self.csm.cs_callsite(edge.callsite);
        let CSMethod { cid: callee_cid, method: callee } = *self.csm.cs_method(edge.callee);
        let call_site = program.call_site(callsite);
        let callee_method = program.method(callee);
        if call_site.args.len() != callee_method.params.len() {
            return Err(AnalysisError::ArityMismatch {
                callsite,
                callee,
                args: call_site.args.len(),
                params: callee_method.params.len(),
            });
        }

        self.call_graph.add_edge(edge);
        debug!("New call edge {:?} --{:?}--> {:?}", edge.caller, callsite, edge.callee);
        self.add_reachable(edge.callee)?;

        for (&arg, &param) in call_site.args.iter().zip(&callee_method.params) {
            let arg = self.csm.intern_var(caller_cid, arg);
            let param = self.csm.intern_var(callee_cid, param);
            self.add_pfg_edge(arg, param, PFGEdgeKind::ParameterPassing);
        }
        if let Some(result) = call_site.result {
            let result = self.csm.intern_var(caller_cid, result);
            for &ret in &callee_method.ret_vars {
                let ret = self.csm.intern_var(callee_cid, ret);
                self.add_pfg_edge(ret, result, PFGEdgeKind::Return);
            }
        }
        Ok(())
    }

    /// Adds an edge to the pointer flow graph. A new edge immediately receives
    /// everything already propagated from its source.
    fn add_pfg_edge(&mut self, from: PointerId, to: PointerId, kind: PFGEdgeKind) {
        if !self.pfg.add_edge(from, to, kind) {
            return;
        }
        if let Some(pts) = self.pt_data.get_propa_pts(from) {
            if !pts.is_empty() {
                let pts = pts.clone();
                self.enqueue(to, &pts);
            }
        }
    }

    /// Schedules `pts` for propagation to `pointer`.
    /// Objects already known to `pointer` are dropped.
    fn enqueue(&mut self, pointer: PointerId, pts: &DS) {
        if self.pt_data.union_pts_to(pointer, pts) {
            self.work_list.push_pointer(pointer);
        }
    }

    fn add_pts(&mut self, pointer: PointerId, obj: CSObjId) {
        if self.pt_data.add_pts(pointer, obj) {
            self.work_list.push_pointer(pointer);
        }
    }

    #[inline]
    pub fn call_graph(&self) -> &CSCallGraph {
        &self.call_graph
    }

    #[inline]
    pub fn cs_manager(&self) -> &CSManager<S::E> {
        &self.csm
    }

    #[inline]
    pub fn pfg(&self) -> &PointerFlowGraph {
        &self.pfg
    }

    #[inline]
    pub fn get_pt_data(&self) -> &DiffPTData<PointerId, CSObjId, DS> {
        &self.pt_data
    }

    #[inline]
    pub fn program(&self) -> &'pta dyn ProgramManager {
        self.program
    }

    /// The points-to set of `pointer`, complete once the analysis has finished.
    pub fn get_pts(&self, pointer: PointerId) -> &DS {
        self.pt_data.get_propa_pts(pointer).unwrap_or(&self.empty_pts)
    }

    /// Every context-sensitive variable with its points-to set.
    pub fn variables(&self) -> impl Iterator<Item = (PointerId, ContextId, VarId, &DS)> + '_ {
        self.csm
            .cs_vars()
            .map(move |(id, cid, var)| (id, cid, var, self.get_pts(id)))
    }

    /// Every instance field pointer with its points-to set.
    pub fn instance_fields(&self) -> impl Iterator<Item = (PointerId, CSObjId, FieldId, &DS)> + '_ {
        self.csm
            .instance_fields()
            .map(move |(id, obj, field)| (id, obj, field, self.get_pts(id)))
    }

    /// The abstract objects `var` may point to in any context.
    pub fn objects_of_var(&self, var: VarId) -> Vec<ObjId> {
        self.csm
            .cs_vars()
            .filter(|(_, _, v)| *v == var)
            .flat_map(|(id, _, _)| self.get_pts(id).iter())
            .map(|cs_obj| self.csm.cs_obj(cs_obj).obj)
            .sorted()
            .dedup()
            .collect()
    }

    /// Number of non-empty deltas propagated so far.
    pub fn num_propagations(&self) -> usize {
        self.num_propagations
    }
}

impl<'pta, S, H, DS> PointerAnalysis for ContextSensitivePTA<'pta, S, H, DS>
where
    S: ContextSelector,
    H: HeapModel,
    DS: PointsToSet<CSObjId> + Clone,
{
    fn analyze(&mut self) -> Result<(), AnalysisError> {
        let now = Instant::now();

        self.solve()?;

        let elapsed = now.elapsed();
        info!("Context-sensitive PTA completed.");
        info!(
            "Analysis time: {}",
            humantime::format_duration(elapsed).to_string()
        );
        info!(
            "Reachable methods: {}, call edges: {}, propagations: {}",
            self.call_graph.num_reach_funcs(),
            self.call_graph.num_edges(),
            self.num_propagations
        );
        Ok(())
    }
}
