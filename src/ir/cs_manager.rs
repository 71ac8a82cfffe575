// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Canonicalization of context-sensitive entities.
//!
//! Every (context, entity) pair is interned once and referred to by a dense
//! handle afterwards. Graphs and points-to sets only ever store these handles,
//! so two equal pairs always end up as the same node or set element.

use std::fmt::{Debug, Formatter, Result};
use std::rc::Rc;

use super::context::{Context, ContextCache, ContextElement, ContextId};
use super::heap::{Obj, ObjId};
use super::program::{CallSiteId, FieldId, MethodId, VarId};
use crate::util::index::Interner;

index_vec::define_index_type! {
    /// The unique identifier for each pointer (context-sensitive variable or instance field).
    pub struct PointerId = u32;
    DEBUG_FORMAT = "PointerId({})";
}

index_vec::define_index_type! {
    pub struct CSObjId = u32;
    DEBUG_FORMAT = "CSObjId({})";
}

index_vec::define_index_type! {
    pub struct CSMethodId = u32;
    DEBUG_FORMAT = "CSMethodId({})";
}

index_vec::define_index_type! {
    pub struct CSCallSiteId = u32;
    DEBUG_FORMAT = "CSCallSiteId({})";
}

/// An entity owning a points-to set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pointer {
    /// A local variable under a method context.
    Var { cid: ContextId, var: VarId },
    /// The field of a context-sensitive object.
    InstanceField { obj: CSObjId, field: FieldId },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CSObj {
    pub cid: ContextId,
    pub obj: ObjId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CSMethod {
    pub cid: ContextId,
    pub method: MethodId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CSCallSite {
    pub cid: ContextId,
    pub callsite: CallSiteId,
}

pub struct CSManager<E: ContextElement> {
    ctx_cache: ContextCache<E>,
    objs: Interner<Obj, ObjId>,
    cs_objs: Interner<CSObj, CSObjId>,
    pointers: Interner<Pointer, PointerId>,
    cs_methods: Interner<CSMethod, CSMethodId>,
    cs_callsites: Interner<CSCallSite, CSCallSiteId>,
}

impl<E: ContextElement> Debug for CSManager<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("CSManager")
            .field("contexts", &self.ctx_cache.len())
            .field("objs", &self.objs.len())
            .field("cs_objs", &self.cs_objs.len())
            .field("pointers", &self.pointers.len())
            .field("cs_methods", &self.cs_methods.len())
            .field("cs_callsites", &self.cs_callsites.len())
            .finish()
    }
}

impl<E: ContextElement> Default for CSManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ContextElement> CSManager<E> {
    pub fn new() -> Self {
        CSManager {
            ctx_cache: ContextCache::new(),
            objs: Interner::new(),
            cs_objs: Interner::new(),
            pointers: Interner::new(),
            cs_methods: Interner::new(),
            cs_callsites: Interner::new(),
        }
    }

    #[inline]
    pub fn get_context_id(&mut self, context: &Rc<Context<E>>) -> ContextId {
        self.ctx_cache.get_context_id(context)
    }

    /// Every `ContextId` handed out by this manager is known to its cache.
    #[inline]
    pub fn get_context(&self, cid: ContextId) -> Rc<Context<E>> {
        self.ctx_cache.context(cid).clone()
    }

    pub fn intern_var(&mut self, cid: ContextId, var: VarId) -> PointerId {
        self.pointers.intern(Pointer::Var { cid, var })
    }

    /// Returns the pointer of `var` under `cid` if it has been created.
    pub fn get_var(&self, cid: ContextId, var: VarId) -> Option<PointerId> {
        self.pointers.get(&Pointer::Var { cid, var })
    }

    pub fn intern_field(&mut self, obj: CSObjId, field: FieldId) -> PointerId {
        self.pointers.intern(Pointer::InstanceField { obj, field })
    }

    #[inline]
    pub fn pointer(&self, id: PointerId) -> &Pointer {
        self.pointers.lookup(id)
    }

    pub fn intern_obj(&mut self, obj: Obj) -> ObjId {
        self.objs.intern(obj)
    }

    #[inline]
    pub fn obj(&self, id: ObjId) -> &Obj {
        self.objs.lookup(id)
    }

    pub fn intern_cs_obj(&mut self, cid: ContextId, obj: ObjId) -> CSObjId {
        self.cs_objs.intern(CSObj { cid, obj })
    }

    #[inline]
    pub fn cs_obj(&self, id: CSObjId) -> &CSObj {
        self.cs_objs.lookup(id)
    }

    pub fn intern_method(&mut self, cid: ContextId, method: MethodId) -> CSMethodId {
        self.cs_methods.intern(CSMethod { cid, method })
    }

    #[inline]
    pub fn cs_method(&self, id: CSMethodId) -> &CSMethod {
        self.cs_methods.lookup(id)
    }

    pub fn intern_callsite(&mut self, cid: ContextId, callsite: CallSiteId) -> CSCallSiteId {
        self.cs_callsites.intern(CSCallSite { cid, callsite })
    }

    #[inline]
    pub fn cs_callsite(&self, id: CSCallSiteId) -> &CSCallSite {
        self.cs_callsites.lookup(id)
    }

    pub fn pointers(&self) -> impl Iterator<Item = (PointerId, &Pointer)> + '_ {
        self.pointers.iter()
    }

    /// All context-sensitive variables, in creation order.
    pub fn cs_vars(&self) -> impl Iterator<Item = (PointerId, ContextId, VarId)> + '_ {
        self.pointers.iter().filter_map(|(id, p)| match *p {
            Pointer::Var { cid, var } => Some((id, cid, var)),
            Pointer::InstanceField { .. } => None,
        })
    }

    /// All instance field pointers, in creation order.
    pub fn instance_fields(&self) -> impl Iterator<Item = (PointerId, CSObjId, FieldId)> + '_ {
        self.pointers.iter().filter_map(|(id, p)| match *p {
            Pointer::InstanceField { obj, field } => Some((id, obj, field)),
            Pointer::Var { .. } => None,
        })
    }

    pub fn objs(&self) -> impl Iterator<Item = (ObjId, &Obj)> + '_ {
        self.objs.iter()
    }

    pub fn num_contexts(&self) -> usize {
        self.ctx_cache.len()
    }

    pub fn num_objs(&self) -> usize {
        self.objs.len()
    }

    pub fn num_cs_objs(&self) -> usize {
        self.cs_objs.len()
    }

    pub fn num_pointers(&self) -> usize {
        self.pointers.len()
    }

    pub fn num_cs_methods(&self) -> usize {
        self.cs_methods.len()
    }
}
