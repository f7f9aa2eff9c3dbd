//! Runtime lexical environments.
//!
//! Frames live on the heap arena so closures can capture them by reference.
//! The prepare pass resolved most identifiers to `(hops, slot)` pairs, so
//! lookups normally index straight into a frame; by-name search exists for
//! code inside `with` and for diagnostics.

use std::rc::Rc;

use crate::{
    ast::{BindKind, ScopeInfo},
    heap::HeapId,
    intern::Name,
    value::Value,
};

/// One binding slot. `let`/`const` slots start uninitialized; reading one
/// before its declarator runs is the temporal dead zone.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Uninitialized,
    Value(Value),
}

/// What kind of frame this is, which drives `this` lookup and dynamic name
/// search.
#[derive(Debug, Clone)]
pub(crate) enum EnvKind {
    /// Top-level frame of a script; holds top-level `let`/`const`.
    Script,
    /// A function activation with its bound `this`.
    Function { this_val: Value },
    /// An arrow activation; transparent to `this` lookup.
    Arrow,
    /// A block, loop head, switch, or catch scope.
    Block,
    /// A `with` frame layering an object over outer bindings.
    With { object: HeapId },
}

#[derive(Debug)]
pub(crate) struct Environment {
    pub parent: Option<HeapId>,
    pub kind: EnvKind,
    pub slots: Vec<Slot>,
    /// Binding names and kinds, copied from the scope table at frame
    /// creation. Needed for dynamic lookup and const-assignment checks.
    pub names: Vec<(Name, BindKind)>,
}

impl Environment {
    /// Creates a frame laid out per `scope`. Hoisted bindings (params,
    /// vars, functions) start as `undefined`; lexical ones start in the
    /// dead zone.
    pub fn from_scope(kind: EnvKind, parent: Option<HeapId>, scope: &ScopeInfo) -> Self {
        let mut slots = Vec::with_capacity(scope.bindings.len());
        let mut names = Vec::with_capacity(scope.bindings.len());
        for binding in &scope.bindings {
            slots.push(if binding.kind.has_tdz() {
                Slot::Uninitialized
            } else {
                Slot::Value(Value::Undefined)
            });
            names.push((Rc::clone(&binding.name), binding.kind));
        }
        Self {
            parent,
            kind,
            slots,
            names,
        }
    }

    pub fn with_frame(parent: Option<HeapId>, object: HeapId) -> Self {
        Self {
            parent,
            kind: EnvKind::With { object },
            slots: Vec::new(),
            names: Vec::new(),
        }
    }

    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|(n, _)| &**n == name)
    }

    pub fn estimate_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.slots.len() * (std::mem::size_of::<Slot>() + std::mem::size_of::<Name>())
    }
}
