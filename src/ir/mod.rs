// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

pub mod builder;
pub mod context;
pub mod cs_manager;
pub mod heap;
pub mod loader;
pub mod program;

use self::program::{CallSite, CallSiteId, Method, MethodId, TypeId, VarId, Variable};

/// Access to the analyzed program and its method resolution.
///
/// This is the boundary between the solver and the frontend: the solver only
/// sees the program through this trait.
pub trait ProgramManager {
    fn entry_methods(&self) -> &[MethodId];
    fn method(&self, id: MethodId) -> &Method;
    fn var(&self, id: VarId) -> &Variable;
    fn call_site(&self, id: CallSiteId) -> &CallSite;
    fn type_name(&self, id: TypeId) -> &str;

    /// Resolves the callee of a virtual call on a receiver of `recv_type`.
    fn resolve_virtual_call(&self, recv_type: TypeId, target: MethodId) -> Option<MethodId>;

    /// Resolves the callee of a special (constructor, private or super) call.
    fn resolve_special_call(&self, call_site: CallSiteId, container: MethodId) -> Option<MethodId>;
}
