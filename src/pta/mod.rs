// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use log::*;
use thiserror::Error;

use self::context_sensitive::ContextSensitivePTA;
use self::context_strategy::{ContextInsensitive, ContextSelector, KCallSiteSensitive, KObjectSensitive};
use self::heap_model::{AllocationSiteHeapModel, HeapModel, TypeBasedHeapModel};
use crate::ir::program::{CallKind, CallSiteId, MethodId, Program};
use crate::pts_set::points_to::HybridPointsToSet;
use crate::util::options::AnalysisOptions;
use crate::util::pta_statistics::ContextSensitiveStat;
use crate::util::results_dumper;

pub mod context_sensitive;
pub mod context_strategy;
pub mod heap_model;
pub mod worklist;

pub type PointsTo<T> = HybridPointsToSet<T>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PTAType {
    Andersen,
    CallSiteSensitive,
    ObjectSensitive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeapModelType {
    AllocSite,
    TypeBased,
}

/// Fatal conditions that abort a run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Unresolvable call kind {kind} at call site {callsite:?}")]
    UnresolvableCallKind { callsite: CallSiteId, kind: CallKind },

    #[error("Call site {callsite:?} of kind {kind} has no receiver")]
    MissingReceiver { callsite: CallSiteId, kind: CallKind },

    #[error("Failed to dispatch call site {callsite:?} on type {ty}")]
    DispatchFailure { callsite: CallSiteId, ty: String },

    #[error("Call site {callsite:?} passes {args} arguments to {callee:?}, which takes {params}")]
    ArityMismatch {
        callsite: CallSiteId,
        callee: MethodId,
        args: usize,
        params: usize,
    },

    #[error("Instance call target {0:?} has no this variable")]
    MissingThis(MethodId),

    #[error(transparent)]
    Policy(#[from] anyhow::Error),
}

pub trait PointerAnalysis {
    /// Runs the analysis to its fixpoint.
    fn analyze(&mut self) -> Result<(), AnalysisError>;
}

/// Runs the analysis selected by `options` on `program`, then dumps the
/// requested results and statistics.
pub fn run_pointer_analysis(program: &Program, options: &AnalysisOptions) -> anyhow::Result<()> {
    let k = options.context_depth as usize;
    match (options.pta_type, options.heap_model) {
        (PTAType::Andersen, HeapModelType::AllocSite) => {
            run_with(program, options, ContextInsensitive, AllocationSiteHeapModel)
        }
        (PTAType::Andersen, HeapModelType::TypeBased) => {
            run_with(program, options, ContextInsensitive, TypeBasedHeapModel)
        }
        (PTAType::CallSiteSensitive, HeapModelType::AllocSite) => {
            run_with(program, options, KCallSiteSensitive::new(k), AllocationSiteHeapModel)
        }
        (PTAType::CallSiteSensitive, HeapModelType::TypeBased) => {
            run_with(program, options, KCallSiteSensitive::new(k), TypeBasedHeapModel)
        }
        (PTAType::ObjectSensitive, HeapModelType::AllocSite) => {
            run_with(program, options, KObjectSensitive::new(k), AllocationSiteHeapModel)
        }
        (PTAType::ObjectSensitive, HeapModelType::TypeBased) => {
            run_with(program, options, KObjectSensitive::new(k), TypeBasedHeapModel)
        }
    }
}

fn run_with<S: ContextSelector, H: HeapModel>(
    program: &Program,
    options: &AnalysisOptions,
    selector: S,
    heap_model: H,
) -> anyhow::Result<()> {
    info!(
        "Running {:?} pointer analysis (context depth {}, heap model {:?})",
        options.pta_type, options.context_depth, options.heap_model
    );
    let mut pta: ContextSensitivePTA<S, H> = ContextSensitivePTA::new(program, selector, heap_model);
    if let Err(e) = pta.analyze() {
        error!("Pointer analysis aborted: {}", e);
        return Err(e.into());
    }
    results_dumper::dump_results(program, &pta, options)?;
    if options.dump_stats {
        ContextSensitiveStat::new(&pta).dump_stats()?;
    }
    Ok(())
}
