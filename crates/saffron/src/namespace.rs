//! The global variable table backing `OP_GET_GLOBAL`/`OP_SET_GLOBAL`/
//! `OP_DEFINE_GLOBAL` (§4.5). Grounded on `original_source/src/table.c`'s
//! `vm.globals` (a name -> `Value` table keyed by interned `ObjString*`);
//! Saffron keys by `HeapId` instead of a pointer since strings are already
//! interned on `Heap` (`ouros::namespace::Namespace` uses slot indices
//! resolved at compile time instead, but spec.md's globals are resolved by
//! name at runtime exactly as the C original does, so this follows the
//! original rather than `ouros::namespace::Namespace`'s statically-indexed
//! design).

use ahash::AHashMap;

use crate::{heap::HeapId, value::Value};

#[derive(Debug, Default)]
pub struct GlobalTable {
    values: AHashMap<HeapId, Value>,
}

impl GlobalTable {
    pub fn new() -> Self {
        Self { values: AHashMap::default() }
    }

    pub fn get(&self, name: HeapId) -> Option<Value> {
        self.values.get(&name).copied()
    }

    /// `var x;`/`fun x() {}`/`class X {}` at module scope: always succeeds,
    /// shadowing any previous definition of the same name.
    pub fn define(&mut self, name: HeapId, value: Value) {
        self.values.insert(name, value);
    }

    /// Plain assignment to an existing global. Returns `false` if `name` was
    /// never defined — the VM turns that into a `NameError` (§7), matching
    /// the reference's `tableSet` + "Undefined variable" check in `OP_SET_GLOBAL`.
    pub fn set(&mut self, name: HeapId, value: Value) -> bool {
        if let Some(slot) = self.values.get_mut(&name) {
            *slot = value;
            true
        } else {
            false
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = HeapId> + '_ {
        self.values.keys().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.values.values().copied()
    }
}
