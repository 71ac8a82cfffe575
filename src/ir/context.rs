// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Calling contexts and their interning.

use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use super::heap::ObjId;
use super::program::CallSiteId;
use crate::util::index::Interner;

index_vec::define_index_type! {
    /// The unique identifier for each context.
    pub struct ContextId = u32;
    DEBUG_FORMAT = "ContextId({})";
}

/// Anything a context can be built from: call sites for call-site
/// sensitivity, receiver objects for object sensitivity.
pub trait ContextElement: Clone + Eq + fmt::Debug + Hash {}

impl ContextElement for CallSiteId {}

impl ContextElement for ObjId {}

/// Contexts of the insensitive analysis never hold an element.
impl ContextElement for () {}

/// A bounded sequence of context elements, most recent first.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Context<E: ContextElement> {
    elems: Vec<E>,
}

impl<E: ContextElement> fmt::Debug for Context<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.elems).finish()
    }
}

impl<E: ContextElement> Context<E> {
    pub fn empty() -> Rc<Self> {
        Rc::new(Context { elems: Vec::new() })
    }

    pub fn from_elems(elems: Vec<E>) -> Rc<Self> {
        Rc::new(Context { elems })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn elements(&self) -> &[E] {
        &self.elems
    }

    /// Prepends `elem` to `ctx` and keeps at most `k` elements. With `k == 0`
    /// the result is the empty context.
    pub fn push_limited(ctx: &Rc<Self>, elem: E, k: usize) -> Rc<Self> {
        if k == 0 {
            return Self::empty();
        }
        let kept = ctx.len().min(k - 1);
        let elems = std::iter::once(elem).chain(ctx.elems[..kept].iter().cloned()).collect();
        Rc::new(Context { elems })
    }

    /// The `k` most recent elements of `ctx`, sharing `ctx` when it is
    /// already short enough.
    pub fn truncated(ctx: &Rc<Self>, k: usize) -> Rc<Self> {
        if ctx.len() <= k {
            return ctx.clone();
        }
        Rc::new(Context {
            elems: ctx.elems[..k].to_vec(),
        })
    }
}

/// Interns contexts so that equal contexts share one `ContextId`.
pub struct ContextCache<E: ContextElement> {
    contexts: Interner<Rc<Context<E>>, ContextId>,
}

impl<E: ContextElement> fmt::Debug for ContextCache<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextCache({} contexts)", self.contexts.len())
    }
}

impl<E: ContextElement> Default for ContextCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ContextElement> ContextCache<E> {
    pub fn new() -> ContextCache<E> {
        ContextCache {
            contexts: Interner::new(),
        }
    }

    pub fn get_context_id(&mut self, context: &Rc<Context<E>>) -> ContextId {
        match self.contexts.get(context) {
            Some(id) => id,
            None => self.contexts.intern(context.clone()),
        }
    }

    /// Returns the context stored at `id`, which must come from this cache.
    #[inline]
    pub fn context(&self, id: ContextId) -> &Rc<Context<E>> {
        self.contexts.lookup(id)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
