// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The intermediate representation consumed by the pointer analysis.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ProgramManager;
use crate::util::index::IndexVec;

index_vec::define_index_type! {
    /// The unique identifier for each method.
    pub struct MethodId = u32;
    DEBUG_FORMAT = "MethodId({})";
}

index_vec::define_index_type! {
    /// The unique identifier for each local variable (including parameters,
    /// `this` and return variables).
    pub struct VarId = u32;
    DEBUG_FORMAT = "VarId({})";
}

index_vec::define_index_type! {
    /// The unique identifier for each instance field.
    pub struct FieldId = u32;
    DEBUG_FORMAT = "FieldId({})";
}

index_vec::define_index_type! {
    /// The unique identifier for each class type.
    pub struct TypeId = u32;
    DEBUG_FORMAT = "TypeId({})";
}

index_vec::define_index_type! {
    /// The unique identifier for each call site.
    pub struct CallSiteId = u32;
    DEBUG_FORMAT = "CallSiteId({})";
}

index_vec::define_index_type! {
    /// The unique identifier for each allocation site.
    pub struct AllocSiteId = u32;
    DEBUG_FORMAT = "AllocSiteId({})";
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// The kind of a call site and, for resolved calls, of a call graph edge.
pub enum CallKind {
    /// Calls of static methods, resolved directly.
    Static,
    /// Constructor, private and super calls, resolved against the static target.
    Special,
    /// Calls resolved by dynamic dispatch on the receiver object's type.
    Virtual,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallKind::Static => f.write_str("static"),
            CallKind::Special => f.write_str("special"),
            CallKind::Virtual => f.write_str("virtual"),
        }
    }
}

/// Name and arity of a method, the key of dynamic dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subsignature {
    pub name: String,
    pub arity: usize,
}

#[derive(Debug)]
pub struct Type {
    pub name: String,
    pub super_type: Option<TypeId>,
    /// Methods declared (not inherited) by this type.
    pub declared_methods: HashMap<Subsignature, MethodId>,
}

#[derive(Debug)]
pub struct Field {
    pub name: String,
}

#[derive(Debug)]
pub struct Method {
    pub name: String,
    pub declaring_type: TypeId,
    pub is_static: bool,
    pub is_abstract: bool,
    /// Formal parameters, excluding `this`.
    pub params: Vec<VarId>,
    pub this_var: Option<VarId>,
    pub ret_vars: Vec<VarId>,
    pub stmts: Vec<Stmt>,
}

impl Method {
    pub fn subsignature(&self) -> Subsignature {
        Subsignature {
            name: self.name.clone(),
            arity: self.params.len(),
        }
    }
}

#[derive(Debug)]
pub struct Variable {
    pub name: String,
    pub method: MethodId,
    /// Instance stores `self.field = from` that write through this variable.
    pub stores: Vec<(FieldId, VarId)>,
    /// Instance loads `to = self.field` that read through this variable.
    pub loads: Vec<(FieldId, VarId)>,
    /// Call sites using this variable as the receiver.
    pub calls: Vec<CallSiteId>,
}

#[derive(Debug)]
pub struct CallSite {
    pub container: MethodId,
    pub kind: CallKind,
    /// The statically referenced method.
    pub target: MethodId,
    pub receiver: Option<VarId>,
    pub args: Vec<VarId>,
    pub result: Option<VarId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    /// `var = new ty` at `site`.
    Allocation {
        var: VarId,
        site: AllocSiteId,
        ty: TypeId,
    },
    /// `to = from`
    Assign { to: VarId, from: VarId },
    /// `to = base.field`
    InstanceLoad {
        to: VarId,
        base: VarId,
        field: FieldId,
    },
    /// `base.field = from`
    InstanceStore {
        base: VarId,
        field: FieldId,
        from: VarId,
    },
    Call(CallSiteId),
}

/// A whole program: every method, variable and call site, plus the entries.
#[derive(Debug, Default)]
pub struct Program {
    pub(crate) types: IndexVec<TypeId, Type>,
    pub(crate) fields: IndexVec<FieldId, Field>,
    pub(crate) methods: IndexVec<MethodId, Method>,
    pub(crate) vars: IndexVec<VarId, Variable>,
    pub(crate) call_sites: IndexVec<CallSiteId, CallSite>,
    pub(crate) num_alloc_sites: usize,
    pub(crate) entry_methods: Vec<MethodId>,
}

impl Program {
    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id]
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id]
    }

    pub fn methods(&self) -> impl Iterator<Item = (MethodId, &Method)> + '_ {
        self.methods.iter_enumerated()
    }

    pub fn num_methods(&self) -> usize {
        self.methods.len()
    }

    pub fn num_alloc_sites(&self) -> usize {
        self.num_alloc_sites
    }

    /// Finds a method by its `Type.name` qualified name.
    pub fn find_method(&self, qualified: &str) -> Option<MethodId> {
        let (ty_name, name) = qualified.rsplit_once('.')?;
        self.methods
            .iter_enumerated()
            .find(|(_, m)| m.name == name && self.types[m.declaring_type].name == ty_name)
            .map(|(id, _)| id)
    }

    /// Finds a variable of `method` by name.
    pub fn find_var(&self, method: MethodId, name: &str) -> Option<VarId> {
        self.vars
            .iter_enumerated()
            .find(|(_, v)| v.method == method && v.name == name)
            .map(|(id, _)| id)
    }

    /// Replaces the entry methods, e.g. from a command-line override.
    pub fn set_entry_methods(&mut self, entries: Vec<MethodId>) {
        self.entry_methods = entries;
    }

    /// Looks up the implementation of `subsig` visible from `ty`, walking up the
    /// super type chain. Abstract declarations are skipped.
    pub fn dispatch(&self, ty: TypeId, subsig: &Subsignature) -> Option<MethodId> {
        let mut current = Some(ty);
        while let Some(t) = current {
            let ty = &self.types[t];
            if let Some(&method) = ty.declared_methods.get(subsig) {
                if !self.methods[method].is_abstract {
                    return Some(method);
                }
            }
            current = ty.super_type;
        }
        None
    }

    /// Human readable `Type.method` name.
    pub fn method_name(&self, id: MethodId) -> String {
        let method = &self.methods[id];
        format!("{}.{}", self.types[method.declaring_type].name, method.name)
    }

    /// Human readable `Type.method/var` name.
    pub fn var_name(&self, id: VarId) -> String {
        let var = &self.vars[id];
        format!("{}/{}", self.method_name(var.method), var.name)
    }
}

impl ProgramManager for Program {
    fn entry_methods(&self) -> &[MethodId] {
        &self.entry_methods
    }

    fn method(&self, id: MethodId) -> &Method {
        &self.methods[id]
    }

    fn var(&self, id: VarId) -> &Variable {
        &self.vars[id]
    }

    fn call_site(&self, id: CallSiteId) -> &CallSite {
        &self.call_sites[id]
    }

    fn type_name(&self, id: TypeId) -> &str {
        &self.types[id].name
    }

    fn resolve_virtual_call(&self, recv_type: TypeId, target: MethodId) -> Option<MethodId> {
        self.dispatch(recv_type, &self.methods[target].subsignature())
    }

    fn resolve_special_call(&self, call_site: CallSiteId, _container: MethodId) -> Option<MethodId> {
        let target = &self.methods[self.call_sites[call_site].target];
        self.dispatch(target.declaring_type, &target.subsignature())
    }
}
