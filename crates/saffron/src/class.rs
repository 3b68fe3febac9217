//! Classes, instances, and method tables (§3, §4.5 "Class instantiation").

use ahash::AHashMap;

use crate::{heap::HeapId, value::Value};

/// A class's method table, keyed by interned method-name `HeapId` (the
/// string's own heap slot doubles as its interned identity, so "exact name
/// equality" per §3 Invariants is a `HeapId` compare).
pub type MethodTable = AHashMap<HeapId, HeapId>;
/// A class's default-field table: field name -> default value expression's
/// compiled-in constant, evaluated once at `class` statement execution time.
pub type FieldTable = AHashMap<HeapId, Value>;

#[derive(Debug)]
pub struct ObjClass {
    pub name: HeapId,
    pub superclass: Option<HeapId>,
    pub methods: MethodTable,
    pub fields: FieldTable,
}

impl ObjClass {
    pub fn new(name: HeapId) -> Self {
        Self { name, superclass: None, methods: MethodTable::default(), fields: FieldTable::default() }
    }
}

#[derive(Debug)]
pub struct ObjInstance {
    pub class: HeapId,
    pub fields: AHashMap<HeapId, Value>,
}

impl ObjInstance {
    pub fn new(class: HeapId) -> Self {
        Self { class, fields: AHashMap::default() }
    }
}
