// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use crate::ir::heap::{Obj, ObjKind};
use crate::ir::program::{AllocSiteId, MethodId, TypeId};

/// Maps allocation sites to abstract objects.
/// Must be deterministic: the same site always yields the same object.
pub trait HeapModel {
    fn get_obj(&self, site: AllocSiteId, ty: TypeId, container: MethodId) -> anyhow::Result<Obj>;
}

/// One abstract object per allocation site.
#[derive(Debug, Default)]
pub struct AllocationSiteHeapModel;

impl HeapModel for AllocationSiteHeapModel {
    fn get_obj(&self, site: AllocSiteId, ty: TypeId, container: MethodId) -> anyhow::Result<Obj> {
        Ok(Obj {
            kind: ObjKind::AllocationSite(site),
            ty,
            container: Some(container),
        })
    }
}

/// Merges all allocations of a type into a single abstract object.
#[derive(Debug, Default)]
pub struct TypeBasedHeapModel;

impl HeapModel for TypeBasedHeapModel {
    fn get_obj(&self, _site: AllocSiteId, ty: TypeId, _container: MethodId) -> anyhow::Result<Obj> {
        Ok(Obj {
            kind: ObjKind::MergedByType,
            ty,
            container: None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn type_based_model_merges_sites() {
        let ty = TypeId::from_raw(1);
        let m = MethodId::from_raw(0);
        let a = AllocSiteId::from_raw(0);
        let b = AllocSiteId::from_raw(1);

        let per_site = AllocationSiteHeapModel;
        assert_ne!(per_site.get_obj(a, ty, m).unwrap(), per_site.get_obj(b, ty, m).unwrap());
        assert_eq!(per_site.get_obj(a, ty, m).unwrap().alloc_site(), Some(a));

        let by_type = TypeBasedHeapModel;
        assert_eq!(by_type.get_obj(a, ty, m).unwrap(), by_type.get_obj(b, ty, m).unwrap());
        assert_eq!(by_type.get_obj(a, ty, m).unwrap().alloc_site(), None);
    }
}
