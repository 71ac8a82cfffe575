// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use super::points_to::PointsToSet;
use crate::util::index::Idx;

/// Diff points-to data.
///
/// The points-to set of every key is split in two parts: the objects that have
/// already been propagated (`propa`) and the objects that reached the key but
/// have not been propagated yet (`diff`). Only the diff part is ever pushed
/// along outgoing edges, and an object that is already in `propa` never enters
/// `diff` again, which bounds the work of the solver.
///
/// K  (Key):     "owning" pointer of a points-to set.
/// D  (Data):    elements in points-to sets.
/// DS (DataSet): the points-to set; a collection of Data.
pub struct DiffPTData<K, D, DS> {
    /// Diff points-to to be propagated.
    pub(crate) diff_pts_map: HashMap<K, DS>,
    /// Points-to already propagated.
    pub(crate) propa_pts_map: HashMap<K, DS>,

    marker: PhantomData<D>,
}

impl<K, D, DS> fmt::Debug for DiffPTData<K, D, DS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "DiffPTData".fmt(f)
    }
}

impl<K, D, DS> Default for DiffPTData<K, D, DS>
where
    K: Hash + Eq + Copy,
    D: Idx,
    DS: PointsToSet<D> + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, D, DS> DiffPTData<K, D, DS>
where
    K: Hash + Eq + Copy,
    D: Idx,
    DS: PointsToSet<D> + Clone,
{
    pub fn new() -> DiffPTData<K, D, DS> {
        DiffPTData {
            diff_pts_map: HashMap::new(),
            propa_pts_map: HashMap::new(),
            marker: PhantomData,
        }
    }

    /// Adds element to the diff points-to set associated with var.
    /// Returns false if elem is already known to var.
    #[inline]
    pub fn add_pts(&mut self, var: K, elem: D) -> bool {
        if let Some(propa) = self.propa_pts_map.get(&var) {
            if propa.contains(elem) {
                return false;
            }
        }
        self.diff_pts_map.entry(var).or_insert_with(DS::new).insert(elem)
    }

    /// Performs diff_pts(dst_var) = diff_pts(dst_var) U (src_ds - propa_pts(dst_var)).
    /// Returns true if the diff points-to set of `dst_var` has changed.
    pub fn union_pts_to(&mut self, dst_var: K, src_ds: &DS) -> bool {
        if src_ds.is_empty() {
            return false;
        }
        match self.propa_pts_map.get(&dst_var) {
            Some(propa) if !propa.is_empty() => {
                let mut new = src_ds.clone();
                new.subtract(propa);
                if new.is_empty() {
                    return false;
                }
                self.diff_pts_map.entry(dst_var).or_insert_with(DS::new).union(&new)
            }
            _ => self.diff_pts_map.entry(dst_var).or_insert_with(DS::new).union(src_ds),
        }
    }

    /// Get diff points to.
    #[inline]
    pub fn get_diff_pts(&self, var: K) -> Option<&DS> {
        self.diff_pts_map.get(&var)
    }

    /// Get propagated points to.
    #[inline]
    pub fn get_propa_pts(&self, var: K) -> Option<&DS> {
        self.propa_pts_map.get(&var)
    }

    /// Returns true if `var` has objects waiting to be propagated.
    #[inline]
    pub fn has_diff_pts(&self, var: K) -> bool {
        self.diff_pts_map.get(&var).map_or(false, |diff| !diff.is_empty())
    }

    /// Moves all diff elems of `var` into its propagated set and returns them.
    pub fn flush(&mut self, var: K) -> DS {
        let delta = match self.diff_pts_map.get_mut(&var) {
            Some(diff) if !diff.is_empty() => std::mem::replace(diff, DS::new()),
            _ => return DS::new(),
        };
        self.propa_pts_map.entry(var).or_insert_with(DS::new).union(&delta);
        delta
    }

    /// Total number of (pointer, object) pairs in the propagated sets.
    pub fn num_pts_relations(&self) -> usize {
        self.propa_pts_map.values().map(|pts| pts.count()).sum()
    }
}

#[cfg(test)]
mod test {
    use super::DiffPTData;
    use crate::pts_set::points_to::{HybridPointsToSet, PointsToSet};

    index_vec::define_index_type! {
        struct Obj = u32;
    }

    type PTData = DiffPTData<u32, Obj, HybridPointsToSet<Obj>>;

    fn set(elems: &[usize]) -> HybridPointsToSet<Obj> {
        let mut s = HybridPointsToSet::new();
        for e in elems {
            s.insert(Obj::new(*e));
        }
        s
    }

    fn elems(pts: &HybridPointsToSet<Obj>) -> Vec<usize> {
        pts.iter().map(|o| o.index()).collect()
    }

    #[test]
    fn flush_moves_diff_into_propa() {
        let mut pt_data = PTData::new();
        assert!(pt_data.add_pts(1, Obj::new(10)));
        assert!(!pt_data.add_pts(1, Obj::new(10)));
        assert!(pt_data.has_diff_pts(1));

        let delta = pt_data.flush(1);
        assert_eq!(elems(&delta), vec![10]);
        assert!(!pt_data.has_diff_pts(1));
        assert!(pt_data.get_propa_pts(1).unwrap().contains(Obj::new(10)));
        assert!(pt_data.flush(1).is_empty());
    }

    #[test]
    fn propagated_objects_never_reenter_diff() {
        let mut pt_data = PTData::new();
        pt_data.union_pts_to(2, &set(&[1, 2]));
        pt_data.flush(2);

        assert!(!pt_data.union_pts_to(2, &set(&[1, 2])));
        assert!(!pt_data.add_pts(2, Obj::new(1)));
        assert!(pt_data.union_pts_to(2, &set(&[2, 3])));
        assert_eq!(elems(pt_data.get_diff_pts(2).unwrap()), vec![3]);
        assert_eq!(pt_data.num_pts_relations(), 2);
    }

    #[test]
    fn pending_deltas_coalesce() {
        let mut pt_data = PTData::new();
        assert!(pt_data.union_pts_to(5, &set(&[1])));
        assert!(pt_data.union_pts_to(5, &set(&[2])));
        assert!(!pt_data.union_pts_to(5, &set(&[1, 2])));
        let delta = pt_data.flush(5);
        assert_eq!(delta.count(), 2);
    }
}
