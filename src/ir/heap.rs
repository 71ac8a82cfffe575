// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Abstract objects produced by a heap model.

use super::program::{AllocSiteId, MethodId, TypeId};

index_vec::define_index_type! {
    /// The unique identifier for each abstract object.
    pub struct ObjId = u32;
    DEBUG_FORMAT = "ObjId({})";
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjKind {
    /// One object per allocation site.
    AllocationSite(AllocSiteId),
    /// One object per type, shared by all of its allocation sites.
    MergedByType,
}

/// A context-insensitive abstract object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Obj {
    pub kind: ObjKind,
    pub ty: TypeId,
    /// The method holding the allocation, absent for merged objects.
    pub container: Option<MethodId>,
}

impl Obj {
    pub fn alloc_site(&self) -> Option<AllocSiteId> {
        match self.kind {
            ObjKind::AllocationSite(site) => Some(site),
            ObjKind::MergedByType => None,
        }
    }
}
