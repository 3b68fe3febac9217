//! Callable runtime object kinds (§3): functions, closures, upvalues, and
//! bound methods.

use crate::{
    bytecode::Chunk,
    heap::HeapId,
    value::Value,
};

/// What an [`ObjFunction`] was compiled for (§4.4's `FunctionType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Script,
    Function,
    Method,
    Initializer,
}

/// A compiled function: arity, upvalue count, and its bytecode chunk.
/// Corresponds to `ObjFunction` in `original_source/src/object.h`.
#[derive(Debug)]
pub struct ObjFunction {
    pub name: Option<HeapId>,
    pub arity: u8,
    pub upvalue_count: u8,
    pub kind: FunctionKind,
    pub chunk: Chunk,
}

/// One upvalue slot a closure captures, either still pointing at a live
/// stack slot or hoisted onto the heap once that slot is popped (§3
/// Invariants: "closing is irreversible").
///
/// The reference VM stores an actual pointer into one shared stack array;
/// Saffron gives every call frame its own private stack (§5's task-isolation
/// invariant), so "open" alone isn't enough to find the value — it also has
/// to remember which frame's stack the slot lives in, since the frame
/// currently executing when an upvalue is *read* is often not the frame that
/// *captured* it (a nested closure called back into its defining function's
/// caller, for instance).
#[derive(Debug, Clone, Copy)]
pub enum UpvalueLocation {
    Open(HeapId, usize),
    Closed(Value),
}

#[derive(Debug)]
pub struct ObjUpvalue {
    pub location: UpvalueLocation,
}

impl ObjUpvalue {
    pub fn is_open(&self) -> bool {
        matches!(self.location, UpvalueLocation::Open(_, _))
    }
}

/// A function value together with the upvalues it captured at creation time.
#[derive(Debug)]
pub struct ObjClosure {
    pub function: HeapId,
    pub upvalues: Vec<HeapId>,
}

/// A native (host-implemented) callable: `(argc, argv) -> Result<Value, String>`.
pub type NativeFn = fn(&mut crate::bytecode::vm::Vm, &[Value]) -> Result<Value, String>;

/// A native callable that also receives a bound receiver, used for methods on
/// built-in object kinds (`List`, `Map`, `Task`).
pub type NativeMethodFn = fn(&mut crate::bytecode::vm::Vm, Value, &[Value]) -> Result<Value, String>;

/// Receiver + method pairing produced by `a.m` when `m` resolves to a method
/// rather than a plain field (§3 `BoundMethod`).
#[derive(Debug, Clone, Copy)]
pub enum BoundMethodKind {
    Closure(HeapId),
    Native(NativeMethodFn),
}

#[derive(Debug, Clone, Copy)]
pub struct ObjBoundMethod {
    pub receiver: Value,
    pub method: BoundMethodKind,
}
