// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Incremental construction of a [`Program`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::program::*;

/// Builds a program statement by statement while maintaining the per-variable
/// indices (stores, loads and receiver calls) that the solver relies on.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
    type_names: HashMap<String, TypeId>,
    field_names: HashMap<String, FieldId>,
    var_names: HashMap<(MethodId, String), VarId>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a class type.
    pub fn add_type(&mut self, name: &str, super_type: Option<TypeId>) -> TypeId {
        let id = self.program.types.push(Type {
            name: name.to_string(),
            super_type,
            declared_methods: HashMap::new(),
        });
        self.type_names.insert(name.to_string(), id);
        id
    }

    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.type_names.get(name).copied()
    }

    pub fn super_type(&self, ty: TypeId) -> Option<TypeId> {
        self.program.types[ty].super_type
    }

    /// The largest parameter count among the declared methods.
    pub fn max_arity(&self) -> usize {
        self.program.methods.iter().map(|m| m.params.len()).max().unwrap_or(0)
    }

    pub fn set_super_type(&mut self, ty: TypeId, super_type: Option<TypeId>) {
        self.program.types[ty].super_type = super_type;
    }

    /// Finds the method `subsig` declared by `ty` or inherited from its super
    /// types. Unlike dispatch, abstract declarations are returned.
    pub fn lookup_method(&self, ty: TypeId, subsig: &Subsignature) -> Option<MethodId> {
        let mut current = Some(ty);
        while let Some(t) = current {
            let ty = &self.program.types[t];
            if let Some(&method) = ty.declared_methods.get(subsig) {
                return Some(method);
            }
            current = ty.super_type;
        }
        None
    }

    /// Returns the field named `name`, declaring it on first use.
    pub fn field(&mut self, name: &str) -> FieldId {
        match self.field_names.entry(name.to_string()) {
            Entry::Occupied(o) => *o.get(),
            Entry::Vacant(v) => {
                let id = self.program.fields.push(Field {
                    name: name.to_string(),
                });
                *v.insert(id)
            }
        }
    }

    /// Declares an instance method with a `this` variable.
    pub fn add_method(&mut self, ty: TypeId, name: &str, params: &[&str]) -> MethodId {
        self.declare_method(ty, name, params, false, false)
    }

    pub fn add_static_method(&mut self, ty: TypeId, name: &str, params: &[&str]) -> MethodId {
        self.declare_method(ty, name, params, true, false)
    }

    /// Declares an instance method without a body; dispatch skips it.
    pub fn add_abstract_method(&mut self, ty: TypeId, name: &str, params: &[&str]) -> MethodId {
        self.declare_method(ty, name, params, false, true)
    }

    fn declare_method(
        &mut self,
        ty: TypeId,
        name: &str,
        params: &[&str],
        is_static: bool,
        is_abstract: bool,
    ) -> MethodId {
        let id = self.program.methods.push(Method {
            name: name.to_string(),
            declaring_type: ty,
            is_static,
            is_abstract,
            params: Vec::new(),
            this_var: None,
            ret_vars: Vec::new(),
            stmts: Vec::new(),
        });
        let params = params.iter().map(|p| self.var(id, p)).collect();
        let this_var = if is_static { None } else { Some(self.var(id, "this")) };
        let method = &mut self.program.methods[id];
        method.params = params;
        method.this_var = this_var;
        let subsig = method.subsignature();
        self.program.types[ty].declared_methods.insert(subsig, id);
        id
    }

    /// Returns the local variable `name` of `method`, declaring it on first use.
    pub fn var(&mut self, method: MethodId, name: &str) -> VarId {
        match self.var_names.entry((method, name.to_string())) {
            Entry::Occupied(o) => *o.get(),
            Entry::Vacant(v) => {
                let id = self.program.vars.push(Variable {
                    name: name.to_string(),
                    method,
                    stores: Vec::new(),
                    loads: Vec::new(),
                    calls: Vec::new(),
                });
                *v.insert(id)
            }
        }
    }

    pub fn params(&self, method: MethodId) -> &[VarId] {
        &self.program.methods[method].params
    }

    pub fn this_var(&self, method: MethodId) -> Option<VarId> {
        self.program.methods[method].this_var
    }

    /// `var = new ty`
    pub fn new_obj(&mut self, method: MethodId, var: VarId, ty: TypeId) -> AllocSiteId {
        let site = AllocSiteId::from_raw(self.program.num_alloc_sites as u32);
        self.program.num_alloc_sites += 1;
        self.push_stmt(method, Stmt::Allocation { var, site, ty });
        site
    }

    /// `to = from`
    pub fn assign(&mut self, method: MethodId, to: VarId, from: VarId) {
        self.push_stmt(method, Stmt::Assign { to, from });
    }

    /// `to = base.field`
    pub fn load(&mut self, method: MethodId, to: VarId, base: VarId, field: FieldId) {
        self.program.vars[base].loads.push((field, to));
        self.push_stmt(method, Stmt::InstanceLoad { to, base, field });
    }

    /// `base.field = from`
    pub fn store(&mut self, method: MethodId, base: VarId, field: FieldId, from: VarId) {
        self.program.vars[base].stores.push((field, from));
        self.push_stmt(method, Stmt::InstanceStore { base, field, from });
    }

    /// Adds a call statement of any kind.
    pub fn call(
        &mut self,
        method: MethodId,
        kind: CallKind,
        target: MethodId,
        receiver: Option<VarId>,
        args: &[VarId],
        result: Option<VarId>,
    ) -> CallSiteId {
        let id = self.program.call_sites.push(CallSite {
            container: method,
            kind,
            target,
            receiver,
            args: args.to_vec(),
            result,
        });
        if let Some(recv) = receiver {
            self.program.vars[recv].calls.push(id);
        }
        self.push_stmt(method, Stmt::Call(id));
        id
    }

    pub fn call_static(
        &mut self,
        method: MethodId,
        target: MethodId,
        args: &[VarId],
        result: Option<VarId>,
    ) -> CallSiteId {
        self.call(method, CallKind::Static, target, None, args, result)
    }

    pub fn call_virtual(
        &mut self,
        method: MethodId,
        receiver: VarId,
        target: MethodId,
        args: &[VarId],
        result: Option<VarId>,
    ) -> CallSiteId {
        self.call(method, CallKind::Virtual, target, Some(receiver), args, result)
    }

    pub fn call_special(
        &mut self,
        method: MethodId,
        receiver: VarId,
        target: MethodId,
        args: &[VarId],
        result: Option<VarId>,
    ) -> CallSiteId {
        self.call(method, CallKind::Special, target, Some(receiver), args, result)
    }

    /// `return var`
    pub fn ret(&mut self, method: MethodId, var: VarId) {
        let ret_vars = &mut self.program.methods[method].ret_vars;
        if !ret_vars.contains(&var) {
            ret_vars.push(var);
        }
    }

    pub fn add_entry(&mut self, method: MethodId) {
        self.program.entry_methods.push(method);
    }

    pub fn build(self) -> Program {
        self.program
    }

    fn push_stmt(&mut self, method: MethodId, stmt: Stmt) {
        self.program.methods[method].stmts.push(stmt);
    }
}
