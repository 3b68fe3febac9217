//! The garbage-collected object arena (§3, §4.6).
//!
//! Grounded structurally on `ouros::heap::Heap` (an index-addressed arena
//! with a free list, rather than `Box`/`Rc`-per-object), but the lifetime
//! policy is a deliberate divergence: `ouros::heap::Heap` keeps objects
//! alive by atomic refcounting, while spec.md §4.6 requires a true
//! mark-and-sweep tracing collector with an explicit gray-stack worklist
//! (matching `original_source/src/memory.c`'s `collectGarbage`). Saffron
//! keeps `ouros::heap::Heap`'s arena/`HeapId`/free-list shape and replaces
//! its refcounting with mark-sweep.

use ahash::AHashMap;

use crate::{
    class::{ObjClass, ObjInstance},
    function::{NativeFn, ObjBoundMethod, ObjClosure, ObjFunction, ObjUpvalue, UpvalueLocation},
    intern::fnv1a_32,
    map::SaffronMap,
    modules::ModuleObj,
    scheduler::{CallFrameObj, TaskObj},
    value::Value,
};

/// An index into the heap arena. `u32` keeps `Value` at 16 bytes alongside
/// `f64`; spec.md's programs are not expected to outlive four billion live
/// allocations in a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u32);

impl HeapId {
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An interned string or atom payload: the bytes plus their precomputed
/// FNV-1a hash, so `Map` lookups and equality never re-hash the bytes.
#[derive(Debug, Clone)]
pub struct InternedStr {
    bytes: Box<str>,
    pub hash: u32,
}

impl InternedStr {
    fn new(bytes: Box<str>) -> Self {
        let hash = fnv1a_32(bytes.as_bytes());
        Self { bytes, hash }
    }

    pub fn as_str(&self) -> &str {
        &self.bytes
    }
}

/// The set of heap-resident object kinds (§3's object-kind table).
#[derive(Debug)]
pub enum HeapObject {
    Str(InternedStr),
    Atom(InternedStr),
    List(Vec<Value>),
    Map(SaffronMap),
    Function(ObjFunction),
    Closure(ObjClosure),
    Upvalue(ObjUpvalue),
    BoundMethod(ObjBoundMethod),
    Class(ObjClass),
    Instance(ObjInstance),
    CallFrame(CallFrameObj),
    Task(TaskObj),
    Module(ModuleObj),
    /// A built-in namespace value exposing natives as properties, e.g. the
    /// `time` global in `time.clock()` (§6). Distinct from `Module`, which
    /// holds a user script's own top-level globals after `import`.
    Namespace(&'static str),
    /// A host-implemented free function (`print`, `spawn`, ...).
    /// Bound native *methods* on `List`/`Map`/`Task`/namespaces are
    /// represented as `BoundMethod` instead — this kind is only ever reached
    /// through a global variable.
    Native(NativeFn),
}

impl HeapObject {
    pub fn kind_name(&self) -> &'static str {
        match self {
            HeapObject::Str(_) => "String",
            HeapObject::Atom(_) => "Atom",
            HeapObject::List(_) => "List",
            HeapObject::Map(_) => "Map",
            HeapObject::Function(_) => "Function",
            HeapObject::Closure(_) => "Function",
            HeapObject::Upvalue(_) => "Upvalue",
            HeapObject::BoundMethod(_) => "Function",
            HeapObject::Class(_) => "Class",
            HeapObject::Instance(_) => "Instance",
            HeapObject::CallFrame(_) => "CallFrame",
            HeapObject::Task(_) => "Task",
            HeapObject::Module(_) => "Module",
            HeapObject::Namespace(_) => "Namespace",
            HeapObject::Native(_) => "Function",
        }
    }

    /// Every [`HeapId`] this object directly references, for the GC's
    /// `blacken` step (§4.6's gray-stack worklist).
    fn trace(&self, out: &mut Vec<HeapId>) {
        match self {
            HeapObject::Str(_) | HeapObject::Atom(_) => {}
            HeapObject::List(items) => out.extend(items.iter().filter_map(Value::as_obj)),
            HeapObject::Map(map) => {
                for (k, v) in map.iter() {
                    out.extend(k.as_obj());
                    out.extend(v.as_obj());
                }
            }
            HeapObject::Function(f) => {
                out.extend(f.name);
                out.extend(f.chunk.constants.iter().filter_map(Value::as_obj));
            }
            HeapObject::Closure(c) => {
                out.push(c.function);
                out.extend(c.upvalues.iter().copied());
            }
            HeapObject::Upvalue(u) => match u.location {
                UpvalueLocation::Closed(v) => out.extend(v.as_obj()),
                // The defining frame is already reachable through the active
                // call chain whenever this upvalue is still open (closing
                // happens unconditionally on `OP_RETURN`), but tracing it too
                // costs nothing and doesn't depend on that invariant holding.
                UpvalueLocation::Open(frame, _) => out.push(frame),
            },
            HeapObject::BoundMethod(b) => {
                out.extend(b.receiver.as_obj());
                if let crate::function::BoundMethodKind::Closure(id) = b.method {
                    out.push(id);
                }
            }
            HeapObject::Class(c) => {
                out.push(c.name);
                out.extend(c.superclass);
                out.extend(c.methods.keys().copied());
                out.extend(c.methods.values().copied());
                out.extend(c.fields.keys().copied());
                out.extend(c.fields.values().filter_map(Value::as_obj));
            }
            HeapObject::Instance(i) => {
                out.push(i.class);
                out.extend(i.fields.keys().copied());
                out.extend(i.fields.values().filter_map(Value::as_obj));
            }
            HeapObject::CallFrame(f) => {
                out.push(f.closure);
                out.extend(f.stack.iter().filter_map(Value::as_obj));
                out.extend(f.result.as_obj());
                out.extend(f.stored.as_obj());
                out.extend(f.parent);
                out.extend(f.open_upvalues.iter().copied());
            }
            HeapObject::Task(t) => out.push(t.frame),
            HeapObject::Module(m) => {
                out.push(m.name);
                out.extend(m.globals.keys());
                out.extend(m.globals.values().filter_map(|v| v.as_obj()));
            }
            HeapObject::Namespace(_) | HeapObject::Native(_) => {}
        }
    }
}

#[derive(Debug)]
struct Slot {
    data: Option<HeapObject>,
    marked: bool,
    /// Assigned once, on first occupation of this slot, and never reused —
    /// the stable identity spec.md §9 wants in place of a (reusable) raw
    /// arena index or pointer, fixing the "hash truncates pointer" bug.
    serial: u32,
}

/// The GC heap: a `Vec`-backed arena of slots addressed by [`HeapId`], with
/// a free list for reuse after a sweep, plus intern tables so equal string
/// and atom literals always resolve to the same slot (§3 Invariants).
#[derive(Debug)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_serial: u32,
    strings: AHashMap<Box<str>, HeapId>,
    atoms: AHashMap<Box<str>, HeapId>,
    bytes_allocated: usize,
    next_gc: usize,
}

const INITIAL_NEXT_GC: usize = 1024 * 1024;
const GC_HEAP_GROW_FACTOR: usize = 2;

impl Heap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            next_serial: 0,
            strings: AHashMap::default(),
            atoms: AHashMap::default(),
            bytes_allocated: 0,
            next_gc: INITIAL_NEXT_GC,
        }
    }

    pub fn allocate(&mut self, object: HeapObject) -> HeapId {
        self.bytes_allocated += 1;
        let serial = self.next_serial;
        self.next_serial += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.data = Some(object);
            slot.marked = false;
            slot.serial = serial;
            HeapId(index)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { data: Some(object), marked: false, serial });
            HeapId(index)
        }
    }

    pub fn get(&self, id: HeapId) -> &HeapObject {
        self.slots[id.index()].data.as_ref().expect("dangling HeapId")
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapObject {
        self.slots[id.index()].data.as_mut().expect("dangling HeapId")
    }

    pub fn serial(&self, id: HeapId) -> u32 {
        self.slots[id.index()].serial
    }

    pub fn should_collect(&self) -> bool {
        self.bytes_allocated > self.next_gc
    }

    pub fn object_count(&self) -> usize {
        self.bytes_allocated
    }

    /// Temporarily removes an object from its slot so it can be mutated with
    /// a live `&Heap` borrow alongside it (`Map`'s hashing needs to read
    /// other heap objects while the map being mutated is itself heap-
    /// resident — an aliasing conflict the borrow checker can't see through
    /// without this). Must be paired with [`Heap::put_back`].
    pub fn take(&mut self, id: HeapId) -> HeapObject {
        self.slots[id.index()].data.take().expect("dangling HeapId")
    }

    pub fn put_back(&mut self, id: HeapId, object: HeapObject) {
        self.slots[id.index()].data = Some(object);
    }

    /// Interns a string literal, allocating a new `Str` object only on first
    /// occurrence of these exact bytes (§3 Invariants: string equality by
    /// content is an identity compare after interning).
    pub fn intern_string(&mut self, text: &str) -> HeapId {
        if let Some(id) = self.strings.get(text) {
            return *id;
        }
        let id = self.allocate(HeapObject::Str(InternedStr::new(text.into())));
        self.strings.insert(text.into(), id);
        id
    }

    pub fn intern_atom(&mut self, text: &str) -> HeapId {
        if let Some(id) = self.atoms.get(text) {
            return *id;
        }
        let id = self.allocate(HeapObject::Atom(InternedStr::new(text.into())));
        self.atoms.insert(text.into(), id);
        id
    }

    /// Runs one full mark-and-sweep cycle (§4.6): mark roots, blacken the
    /// gray stack to a fixed point, drop intern-table entries for strings
    /// that turned out unreachable, then sweep. `roots` must enumerate
    /// every live [`HeapId`] reachable from outside the heap (VM stacks,
    /// call frames, globals, the scheduler's run/sleep queues) — the heap
    /// has no way to discover those itself, so the caller supplies them.
    pub fn collect_garbage(&mut self, roots: impl IntoIterator<Item = HeapId>) {
        let mut gray: Vec<HeapId> = Vec::new();
        for root in roots {
            self.mark(root, &mut gray);
        }
        while let Some(id) = gray.pop() {
            self.blacken(id, &mut gray);
        }
        self.remove_white_strings();
        self.sweep();
        self.next_gc = self.bytes_allocated * GC_HEAP_GROW_FACTOR;
        if self.next_gc < INITIAL_NEXT_GC {
            self.next_gc = INITIAL_NEXT_GC;
        }
    }

    fn mark(&mut self, id: HeapId, gray: &mut Vec<HeapId>) {
        let slot = &mut self.slots[id.index()];
        if slot.marked || slot.data.is_none() {
            return;
        }
        slot.marked = true;
        gray.push(id);
    }

    fn blacken(&mut self, id: HeapId, gray: &mut Vec<HeapId>) {
        let mut children = Vec::new();
        self.get(id).trace(&mut children);
        for child in children {
            self.mark(child, gray);
        }
    }

    /// "Remove white strings between mark and sweep" (§4.6): once marking
    /// is done, any interned string/atom not reached is about to be freed,
    /// so its intern-table entry must go too or a future `intern_string`
    /// would hand back a `HeapId` that sweep is about to invalidate.
    fn remove_white_strings(&mut self) {
        let slots = &self.slots;
        self.strings.retain(|_, id| slots[id.index()].marked);
        self.atoms.retain(|_, id| slots[id.index()].marked);
    }

    fn sweep(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.data.is_none() {
                continue;
            }
            if slot.marked {
                slot.marked = false;
            } else {
                slot.data = None;
                self.bytes_allocated -= 1;
                self.free.push(index as u32);
            }
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn interning_the_same_text_twice_returns_the_same_id() {
        let mut heap = Heap::new();
        let a = heap.intern_string("hello");
        let b = heap.intern_string("hello");
        assert_eq!(a, b);
    }

    #[test]
    fn strings_and_atoms_are_tracked_in_separate_tables() {
        let mut heap = Heap::new();
        let s = heap.intern_string("ok");
        let a = heap.intern_atom("ok");
        assert_ne!(s, a);
    }

    #[test]
    fn unreached_object_is_freed_and_its_slot_is_recycled() {
        let mut heap = Heap::new();
        let list = heap.allocate(HeapObject::List(Vec::new()));
        heap.collect_garbage([]);
        let replacement = heap.allocate(HeapObject::List(Vec::new()));
        assert_eq!(list, replacement);
    }

    #[test]
    fn rooted_object_survives_a_collection() {
        let mut heap = Heap::new();
        let list = heap.allocate(HeapObject::List(Vec::new()));
        heap.collect_garbage([list]);
        assert!(matches!(heap.get(list), HeapObject::List(_)));
    }

    #[test]
    fn collecting_an_unreached_interned_string_lets_it_be_re_interned() {
        let mut heap = Heap::new();
        let first = heap.intern_string("gone");
        heap.collect_garbage([]);
        let second = heap.intern_string("gone");
        assert_eq!(first, second);
    }

    /// §8: running the collector twice with no intervening allocation has no
    /// effect after the first run (all survivors are already black, nothing
    /// new to free).
    #[test]
    fn running_collect_garbage_twice_in_a_row_is_idempotent() {
        let mut heap = Heap::new();
        let list = heap.allocate(HeapObject::List(Vec::new()));
        heap.collect_garbage([list]);
        let count_after_first = heap.object_count();
        heap.collect_garbage([list]);
        assert_eq!(heap.object_count(), count_after_first);
        assert!(matches!(heap.get(list), HeapObject::List(_)));
    }
}
