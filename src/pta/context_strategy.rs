// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Context selectors.
//!
//! A selector only computes contexts; interning them into `ContextId`s is
//! left to the solver's `CSManager`, so selectors hold no mutable state.

use std::rc::Rc;

use crate::ir::context::{Context, ContextElement};
use crate::ir::heap::{Obj, ObjId};
use crate::ir::program::{CallSiteId, MethodId};

pub trait ContextSelector {
    type E: ContextElement;

    /// The context of entry methods.
    fn default_context(&self) -> Rc<Context<Self::E>>;

    /// The context of an object allocated in `method` under `method_ctx`.
    fn select_heap_context(
        &self,
        method_ctx: &Rc<Context<Self::E>>,
        method: MethodId,
        obj: &Obj,
    ) -> anyhow::Result<Rc<Context<Self::E>>>;

    /// The callee context of a call without receiver object.
    fn select_context(
        &self,
        caller_ctx: &Rc<Context<Self::E>>,
        callsite: CallSiteId,
        callee: MethodId,
    ) -> anyhow::Result<Rc<Context<Self::E>>>;

    /// The callee context of a call on the receiver object `recv_obj` whose
    /// heap context is `recv_ctx`.
    fn select_instance_context(
        &self,
        caller_ctx: &Rc<Context<Self::E>>,
        callsite: CallSiteId,
        recv_ctx: &Rc<Context<Self::E>>,
        recv_obj: ObjId,
        callee: MethodId,
    ) -> anyhow::Result<Rc<Context<Self::E>>>;
}

/// Every entity lives in the empty context.
#[derive(Debug, Default)]
pub struct ContextInsensitive;

impl ContextSelector for ContextInsensitive {
    type E = ();

    fn default_context(&self) -> Rc<Context<()>> {
        Context::empty()
    }

    fn select_heap_context(
        &self,
        _method_ctx: &Rc<Context<()>>,
        _method: MethodId,
        _obj: &Obj,
    ) -> anyhow::Result<Rc<Context<()>>> {
        Ok(self.default_context())
    }

    fn select_context(
        &self,
        _caller_ctx: &Rc<Context<()>>,
        _callsite: CallSiteId,
        _callee: MethodId,
    ) -> anyhow::Result<Rc<Context<()>>> {
        Ok(self.default_context())
    }

    fn select_instance_context(
        &self,
        _caller_ctx: &Rc<Context<()>>,
        _callsite: CallSiteId,
        _recv_ctx: &Rc<Context<()>>,
        _recv_obj: ObjId,
        _callee: MethodId,
    ) -> anyhow::Result<Rc<Context<()>>> {
        Ok(self.default_context())
    }
}

/// k-limited call strings.
#[derive(Debug)]
pub struct KCallSiteSensitive {
    /// Context length limit for methods
    k: usize,
}

impl KCallSiteSensitive {
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl ContextSelector for KCallSiteSensitive {
    type E = CallSiteId;

    fn default_context(&self) -> Rc<Context<CallSiteId>> {
        Context::empty()
    }

    fn select_heap_context(
        &self,
        method_ctx: &Rc<Context<CallSiteId>>,
        _method: MethodId,
        _obj: &Obj,
    ) -> anyhow::Result<Rc<Context<CallSiteId>>> {
        Ok(Context::truncated(method_ctx, self.k.saturating_sub(1)))
    }

    fn select_context(
        &self,
        caller_ctx: &Rc<Context<CallSiteId>>,
        callsite: CallSiteId,
        _callee: MethodId,
    ) -> anyhow::Result<Rc<Context<CallSiteId>>> {
        Ok(Context::push_limited(caller_ctx, callsite, self.k))
    }

    fn select_instance_context(
        &self,
        caller_ctx: &Rc<Context<CallSiteId>>,
        callsite: CallSiteId,
        _recv_ctx: &Rc<Context<CallSiteId>>,
        _recv_obj: ObjId,
        callee: MethodId,
    ) -> anyhow::Result<Rc<Context<CallSiteId>>> {
        self.select_context(caller_ctx, callsite, callee)
    }
}

/// k-limited receiver object sequences.
#[derive(Debug)]
pub struct KObjectSensitive {
    /// Context length limit for methods
    k: usize,
}

impl KObjectSensitive {
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl ContextSelector for KObjectSensitive {
    type E = ObjId;

    fn default_context(&self) -> Rc<Context<ObjId>> {
        Context::empty()
    }

    fn select_heap_context(
        &self,
        method_ctx: &Rc<Context<ObjId>>,
        _method: MethodId,
        _obj: &Obj,
    ) -> anyhow::Result<Rc<Context<ObjId>>> {
        Ok(Context::truncated(method_ctx, self.k.saturating_sub(1)))
    }

    /// Static calls are analyzed under the caller's context.
    fn select_context(
        &self,
        caller_ctx: &Rc<Context<ObjId>>,
        _callsite: CallSiteId,
        _callee: MethodId,
    ) -> anyhow::Result<Rc<Context<ObjId>>> {
        Ok(caller_ctx.clone())
    }

    fn select_instance_context(
        &self,
        _caller_ctx: &Rc<Context<ObjId>>,
        _callsite: CallSiteId,
        recv_ctx: &Rc<Context<ObjId>>,
        recv_obj: ObjId,
        _callee: MethodId,
    ) -> anyhow::Result<Rc<Context<ObjId>>> {
        Ok(Context::push_limited(recv_ctx, recv_obj, self.k))
    }
}
