//! The bytecode dispatch loop (§4.5, §4.6, §4.7).
//!
//! Grounded on `original_source/src/vm.c`'s `run()` switch — one `match` arm
//! per `OP_*`, the same arithmetic/comparison/truthiness rules, the same
//! `ObjClass`/`ObjInstance`/`BoundMethod` dispatch for properties and calls.
//! The one structural divergence from the C original is call frames: the
//! reference shares one big `Value` stack across every frame and only
//! heap-allocates a frame struct for *spawned* tasks; Saffron heap-allocates
//! a [`CallFrameObj`] with its own private stack for every call, spawned or
//! not (§5's task-isolation invariant), so an ordinary call and `spawn` share
//! one code path end to end.

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use crate::{
    builtins,
    bytecode::OpCode,
    class::ObjInstance,
    error::{BacktraceFrame, InterpretResult, RuntimeError, RuntimeErrorKind},
    function::{BoundMethodKind, NativeFn, NativeMethodFn, ObjBoundMethod, ObjClosure, ObjFunction, UpvalueLocation},
    heap::{Heap, HeapId, HeapObject},
    io::PrintWriter,
    map::SaffronMap,
    modules::{ModuleCache, ModuleObj, ModuleResult},
    namespace::GlobalTable,
    resource::{ResourceError, ResourceTracker},
    scheduler::{self, CallFrameObj, Scheduler, TaskObj},
    tracer::VmTracer,
    value::Value,
};

/// The interpreter: heap, globals, scheduler, module cache, and the
/// pluggable resource/print/trace hooks an embedder supplies (§6).
pub struct Vm {
    heap: Heap,
    globals: GlobalTable,
    scheduler: Scheduler,
    modules: ModuleCache,
    resource: Box<dyn ResourceTracker>,
    print: Box<dyn PrintWriter>,
    tracer: Box<dyn VmTracer>,
    process_start: Instant,
    /// The currently executing call frame. Round-robins between task frames
    /// on `yield`/return exactly as `self.scheduler.current_frame()` directs.
    frame: HeapId,
    /// The frame that, when it returns, ends the whole `interpret()` call —
    /// either the top-level script or (while `import_module` is nested
    /// inside `run_nested`) the module currently being loaded.
    main_frame: HeapId,
    frame_depth: usize,
    script_dir: PathBuf,
    init_name: HeapId,
    /// Importers' `GlobalTable`s swapped out while `import_module` runs a
    /// nested module's top level. `GlobalTable` isn't a `HeapObject`, so
    /// without this `gc_roots()` couldn't see them and a GC triggered mid-
    /// import would sweep anything reachable only from an importer's
    /// globals.
    import_stack: Vec<GlobalTable>,
}

impl Vm {
    pub fn new(
        mut heap: Heap,
        script_dir: PathBuf,
        resource: Box<dyn ResourceTracker>,
        print: Box<dyn PrintWriter>,
        tracer: Box<dyn VmTracer>,
    ) -> Self {
        let init_name = heap.intern_string("init");
        let sentinel = HeapId::from_raw(0);
        let mut vm = Self {
            heap,
            globals: GlobalTable::new(),
            scheduler: Scheduler::new(),
            modules: ModuleCache::new(),
            resource,
            print,
            tracer,
            process_start: Instant::now(),
            frame: sentinel,
            main_frame: sentinel,
            frame_depth: 0,
            script_dir,
            init_name,
            import_stack: Vec::new(),
        };
        vm.register_builtins();
        vm
    }

    fn register_builtins(&mut self) {
        self.define_native("print", builtins::print);
        self.define_native("println", builtins::println);
        self.define_native("spawn", builtins::spawn);
        self.define_namespace("time");
    }

    fn define_native(&mut self, name: &str, f: NativeFn) {
        let id = self.heap.allocate(HeapObject::Native(f));
        let name_id = self.heap.intern_string(name);
        self.globals.define(name_id, Value::Obj(id));
    }

    /// Registers a `time`-shaped global: a bare value whose properties are
    /// dispatched through [`Self::namespace_method`] (§6's `time.clock()`).
    fn define_namespace(&mut self, name: &'static str) {
        let id = self.heap.allocate(HeapObject::Namespace(name));
        let name_id = self.heap.intern_string(name);
        self.globals.define(name_id, Value::Obj(id));
    }

    /// Runs a freshly compiled script to completion. The script's own frame
    /// is registered with the scheduler like any other task, so a top-level
    /// `yield` round-robins with whatever it has already `spawn`ed.
    pub fn interpret(&mut self, function: ObjFunction) -> InterpretResult {
        let function_id = self.heap.allocate(HeapObject::Function(function));
        let closure_id = self.heap.allocate(HeapObject::Closure(ObjClosure { function: function_id, upvalues: Vec::new() }));
        let mut frame = CallFrameObj::new(closure_id, 0);
        frame.stack.push(Value::Obj(closure_id));
        let frame_id = self.heap.allocate(HeapObject::CallFrame(frame));
        self.frame = frame_id;
        self.main_frame = frame_id;
        self.frame_depth = 1;
        self.scheduler.spawn(frame_id);
        match self.run() {
            Ok(value) => InterpretResult::Ok(value),
            Err(err) => InterpretResult::RuntimeError(err),
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn process_start(&self) -> Instant {
        self.process_start
    }

    pub fn print_str(&mut self, text: &str) {
        self.print.write_str(text);
    }

    pub fn print_value(&mut self, value: &Value) {
        let text = self.display_value(*value);
        self.print.write_str(&text);
    }

    /// `spawn(fn)` (§4.7): builds a fresh, independent call frame for `fn`
    /// and hands it to the scheduler, returning a `Task` handle. Unlike an
    /// ordinary call, this never switches `self.frame` — the caller keeps
    /// running until its own next `yield`.
    pub fn spawn_task(&mut self, closure_id: HeapId) -> Value {
        let mut frame = CallFrameObj::new(closure_id, 0);
        frame.state |= scheduler::frame_state::SPAWNED;
        frame.stack.push(Value::Obj(closure_id));
        let frame_id = self.heap.allocate(HeapObject::CallFrame(frame));
        self.scheduler.spawn(frame_id);
        let task_id = self.heap.allocate(HeapObject::Task(TaskObj { frame: frame_id }));
        Value::Obj(task_id)
    }

    pub fn task_result(&mut self, task_id: HeapId) -> Result<Value, String> {
        let frame_id = match self.heap.get(task_id) {
            HeapObject::Task(t) => t.frame,
            _ => return Err("getResult() called on a non-Task value".into()),
        };
        match self.heap.get(frame_id) {
            HeapObject::CallFrame(f) if f.is_finished() => Ok(f.result),
            HeapObject::CallFrame(_) => Err("task has not finished yet".into()),
            _ => Err("getResult() called on a non-Task value".into()),
        }
    }

    pub fn task_is_ready(&self, task_id: HeapId) -> bool {
        let frame_id = match self.heap.get(task_id) {
            HeapObject::Task(t) => t.frame,
            _ => return false,
        };
        matches!(self.heap.get(frame_id), HeapObject::CallFrame(f) if f.is_finished())
    }

    fn now(&self) -> f64 {
        self.process_start.elapsed().as_secs_f64()
    }

    // ---- frame-local helpers -------------------------------------------------

    fn frame_ref(&self) -> &CallFrameObj {
        match self.heap.get(self.frame) {
            HeapObject::CallFrame(f) => f,
            _ => unreachable!("self.frame does not point at a CallFrame"),
        }
    }

    fn frame_mut(&mut self) -> &mut CallFrameObj {
        match self.heap.get_mut(self.frame) {
            HeapObject::CallFrame(f) => f,
            _ => unreachable!("self.frame does not point at a CallFrame"),
        }
    }

    fn push(&mut self, value: Value) {
        self.frame_mut().stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.frame_mut().stack.pop().expect("value stack underflow")
    }

    fn peek(&self, back: usize) -> Value {
        let stack = &self.frame_ref().stack;
        stack[stack.len() - 1 - back]
    }

    fn push_to(&mut self, frame_id: HeapId, value: Value) {
        if let HeapObject::CallFrame(f) = self.heap.get_mut(frame_id) {
            f.stack.push(value);
        }
    }

    fn current_closure(&self) -> HeapId {
        match self.heap.get(self.frame) {
            HeapObject::CallFrame(f) => f.closure,
            _ => unreachable!(),
        }
    }

    fn current_function(&self) -> HeapId {
        match self.heap.get(self.current_closure()) {
            HeapObject::Closure(c) => c.function,
            _ => unreachable!(),
        }
    }

    fn fetch_byte(&mut self) -> u8 {
        let ip = self.frame_ref().ip;
        let function = self.current_function();
        let byte = match self.heap.get(function) {
            HeapObject::Function(f) => f.chunk.code[ip],
            _ => unreachable!(),
        };
        self.frame_mut().ip = ip + 1;
        byte
    }

    fn fetch_op(&mut self) -> OpCode {
        let byte = self.fetch_byte();
        OpCode::from_repr(byte).expect("invalid opcode byte")
    }

    fn read_u16(&mut self) -> u16 {
        let hi = self.fetch_byte();
        let lo = self.fetch_byte();
        (u16::from(hi) << 8) | u16::from(lo)
    }

    fn read_constant(&self, idx: u8) -> Value {
        let function = self.current_function();
        match self.heap.get(function) {
            HeapObject::Function(f) => f.chunk.constants[idx as usize],
            _ => unreachable!(),
        }
    }

    fn name_text(&self, id: HeapId) -> String {
        match self.heap.get(id) {
            HeapObject::Str(s) | HeapObject::Atom(s) => s.as_str().to_string(),
            _ => String::new(),
        }
    }

    // ---- error construction ---------------------------------------------

    fn backtrace(&self) -> Vec<BacktraceFrame> {
        let mut frames = Vec::new();
        let mut current = Some(self.frame);
        while let Some(id) = current {
            let Some(HeapObject::CallFrame(f)) = Some(self.heap.get(id)) else { break };
            let closure_id = f.closure;
            let ip = f.ip;
            let parent = f.parent;
            let (name, line) = match self.heap.get(closure_id) {
                HeapObject::Closure(c) => match self.heap.get(c.function) {
                    HeapObject::Function(func) => {
                        let name = func.name.map(|n| self.name_text(n)).unwrap_or_else(|| "<script>".to_string());
                        (name, func.chunk.line_at(ip.saturating_sub(1)))
                    }
                    _ => ("<unknown>".to_string(), 0),
                },
                _ => ("<unknown>".to_string(), 0),
            };
            frames.push(BacktraceFrame { function_name: name, line });
            current = parent;
        }
        frames
    }

    fn runtime_err(&self, kind: RuntimeErrorKind, message: impl Into<String>) -> RuntimeError {
        RuntimeError { kind, message: message.into(), backtrace: self.backtrace() }
    }

    fn type_error(&self, message: impl Into<String>) -> RuntimeError {
        self.runtime_err(RuntimeErrorKind::TypeError, message)
    }

    fn undefined_variable_error(&self, name_id: HeapId) -> RuntimeError {
        self.runtime_err(RuntimeErrorKind::NameError, format!("undefined variable '{}'", self.name_text(name_id)))
    }

    fn resource_error(&self, err: ResourceError) -> RuntimeError {
        self.runtime_err(RuntimeErrorKind::ResourceExceeded, err.to_string())
    }

    // ---- the dispatch loop ------------------------------------------------

    fn run(&mut self) -> Result<Value, RuntimeError> {
        loop {
            if self.heap.should_collect() {
                self.collect_garbage();
            }
            self.resource.check_time().map_err(|e| self.resource_error(e))?;
            self.resource.check_stack_depth(self.frame_ref().stack.len()).map_err(|e| self.resource_error(e))?;

            let ip_before = self.frame_ref().ip;
            let op = self.fetch_op();
            self.tracer.on_instruction(ip_before, op);

            match op {
                OpCode::Constant => {
                    let idx = self.fetch_byte();
                    let value = self.read_constant(idx);
                    self.push(value);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.fetch_byte() as usize;
                    let value = self.frame_ref().stack[slot];
                    self.push(value);
                }
                OpCode::SetLocal => {
                    let slot = self.fetch_byte() as usize;
                    let value = self.peek(0);
                    self.frame_mut().stack[slot] = value;
                }
                OpCode::GetGlobal => {
                    let idx = self.fetch_byte();
                    let name_id = self.read_constant(idx).as_obj().expect("global name constant is not a string");
                    match self.globals.get(name_id) {
                        Some(value) => self.push(value),
                        None => return Err(self.undefined_variable_error(name_id)),
                    }
                }
                OpCode::DefineGlobal => {
                    let idx = self.fetch_byte();
                    let name_id = self.read_constant(idx).as_obj().expect("global name constant is not a string");
                    let value = self.pop();
                    self.globals.define(name_id, value);
                }
                OpCode::SetGlobal => {
                    let idx = self.fetch_byte();
                    let name_id = self.read_constant(idx).as_obj().expect("global name constant is not a string");
                    let value = self.peek(0);
                    if !self.globals.set(name_id, value) {
                        return Err(self.undefined_variable_error(name_id));
                    }
                }
                OpCode::GetUpvalue => {
                    let idx = self.fetch_byte() as usize;
                    let uv_id = match self.heap.get(self.current_closure()) {
                        HeapObject::Closure(c) => c.upvalues[idx],
                        _ => unreachable!(),
                    };
                    let value = self.read_upvalue(uv_id);
                    self.push(value);
                }
                OpCode::SetUpvalue => {
                    let idx = self.fetch_byte() as usize;
                    let uv_id = match self.heap.get(self.current_closure()) {
                        HeapObject::Closure(c) => c.upvalues[idx],
                        _ => unreachable!(),
                    };
                    let value = self.peek(0);
                    self.write_upvalue(uv_id, value);
                }
                OpCode::GetProperty => {
                    let idx = self.fetch_byte();
                    let name_id = self.read_constant(idx).as_obj().expect("property name constant is not a string");
                    let object = self.pop();
                    let value = self.get_property(object, name_id)?;
                    self.push(value);
                }
                OpCode::SetProperty => {
                    let idx = self.fetch_byte();
                    let name_id = self.read_constant(idx).as_obj().expect("property name constant is not a string");
                    let value = self.pop();
                    let object = self.pop();
                    let result = self.set_property(object, name_id, value)?;
                    self.push(result);
                }
                OpCode::GetSuper => {
                    let idx = self.fetch_byte();
                    let name_id = self.read_constant(idx).as_obj().expect("method name constant is not a string");
                    let superclass_v = self.pop();
                    let this_v = self.pop();
                    let bound = self.bind_super_method(superclass_v, this_v, name_id)?;
                    self.push(bound);
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a.equals(&b, &self.heap)));
                }
                OpCode::Greater => {
                    let b = self.pop();
                    let a = self.pop();
                    let result = self.compare(a, b, |x, y| x > y)?;
                    self.push(Value::Bool(result));
                }
                OpCode::Less => {
                    let b = self.pop();
                    let a = self.pop();
                    let result = self.compare(a, b, |x, y| x < y)?;
                    self.push(Value::Bool(result));
                }
                OpCode::Add => {
                    let b = self.pop();
                    let a = self.pop();
                    let result = self.add(a, b)?;
                    self.push(result);
                }
                OpCode::Subtract => {
                    let b = self.pop();
                    let a = self.pop();
                    let result = self.numeric_binop(a, b, |x, y| x - y)?;
                    self.push(result);
                }
                OpCode::Multiply => {
                    let b = self.pop();
                    let a = self.pop();
                    let result = self.numeric_binop(a, b, |x, y| x * y)?;
                    self.push(result);
                }
                OpCode::Divide => {
                    let b = self.pop();
                    let a = self.pop();
                    let result = self.numeric_binop(a, b, |x, y| x / y)?;
                    self.push(result);
                }
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(!value.is_truthy()));
                }
                OpCode::Negate => {
                    let value = self.pop();
                    match value {
                        Value::Number(n) => self.push(Value::Number(-n)),
                        _ => return Err(self.type_error("operand to unary '-' must be a number")),
                    }
                }
                OpCode::Jump => {
                    let offset = self.read_u16();
                    self.frame_mut().ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16();
                    if !self.peek(0).is_truthy() {
                        self.frame_mut().ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16();
                    self.frame_mut().ip -= offset as usize;
                }
                OpCode::Call => {
                    let argc = self.fetch_byte() as usize;
                    let args = self.pop_args(argc);
                    let callee = self.pop();
                    self.call_value(callee, args)?;
                }
                OpCode::Invoke => {
                    let name_idx = self.fetch_byte();
                    let argc = self.fetch_byte() as usize;
                    let name_id = self.read_constant(name_idx).as_obj().expect("method name constant is not a string");
                    let args = self.pop_args(argc);
                    let receiver = self.pop();
                    self.invoke(receiver, name_id, args)?;
                }
                OpCode::SuperInvoke => {
                    let name_idx = self.fetch_byte();
                    let argc = self.fetch_byte() as usize;
                    let name_id = self.read_constant(name_idx).as_obj().expect("method name constant is not a string");
                    let superclass_v = self.pop();
                    let args = self.pop_args(argc);
                    let this_v = self.pop();
                    let super_id = superclass_v.as_obj().ok_or_else(|| self.type_error("'super' must be a class"))?;
                    let method = match self.heap.get(super_id) {
                        HeapObject::Class(c) => c.methods.get(&name_id).copied(),
                        _ => None,
                    };
                    match method {
                        Some(closure_id) => self.call_closure(closure_id, this_v, args)?,
                        None => {
                            return Err(self.runtime_err(
                                RuntimeErrorKind::NameError,
                                format!("undefined superclass method '{}'", self.name_text(name_id)),
                            ));
                        }
                    }
                }
                OpCode::Closure => {
                    let const_idx = self.fetch_byte();
                    let function_id = self.read_constant(const_idx).as_obj().expect("closure constant is not a function");
                    let upvalue_count = match self.heap.get(function_id) {
                        HeapObject::Function(f) => f.upvalue_count,
                        _ => unreachable!(),
                    };
                    let mut upvalues = Vec::with_capacity(upvalue_count as usize);
                    for _ in 0..upvalue_count {
                        let is_local = self.fetch_byte() != 0;
                        let index = self.fetch_byte() as usize;
                        let uv_id = if is_local {
                            self.capture_upvalue(index)
                        } else {
                            match self.heap.get(self.current_closure()) {
                                HeapObject::Closure(c) => c.upvalues[index],
                                _ => unreachable!(),
                            }
                        };
                        upvalues.push(uv_id);
                    }
                    let closure_id = self.heap.allocate(HeapObject::Closure(ObjClosure { function: function_id, upvalues }));
                    self.push(Value::Obj(closure_id));
                }
                OpCode::CloseUpvalue => {
                    let slot = self.frame_ref().stack.len() - 1;
                    self.close_upvalues_from(slot);
                    self.pop();
                }
                OpCode::Return => {
                    let value = self.pop();
                    self.close_upvalues_from(0);
                    self.do_return(value)?;
                    if self.frame_depth == 0 {
                        return Ok(value);
                    }
                }
                OpCode::Class => {
                    let idx = self.fetch_byte();
                    let value = self.read_constant(idx);
                    self.push(value);
                }
                OpCode::Inherit => {
                    let subclass_v = self.pop();
                    let superclass_v = self.peek(0);
                    self.inherit(superclass_v, subclass_v)?;
                }
                OpCode::Method => {
                    let idx = self.fetch_byte();
                    let name_id = self.read_constant(idx).as_obj().expect("method name constant is not a string");
                    let method_v = self.pop();
                    let class_v = self.peek(0);
                    self.define_method(class_v, name_id, method_v)?;
                }
                OpCode::List => {
                    let n = self.fetch_byte() as usize;
                    let items = self.pop_args(n);
                    let id = self.heap.allocate(HeapObject::List(items));
                    self.push(Value::Obj(id));
                }
                OpCode::Map => {
                    let n = self.fetch_byte() as usize;
                    let mut pairs = Vec::with_capacity(n);
                    for _ in 0..n {
                        let value = self.pop();
                        let key = self.pop();
                        pairs.push((key, value));
                    }
                    pairs.reverse();
                    let mut map = SaffronMap::new();
                    for (key, value) in pairs {
                        map.set(key, value, &self.heap);
                    }
                    let id = self.heap.allocate(HeapObject::Map(map));
                    self.push(Value::Obj(id));
                }
                OpCode::GetItem => {
                    let index = self.pop();
                    let object = self.pop();
                    let value = self.get_item(object, index)?;
                    self.push(value);
                }
                OpCode::SetItem => {
                    let value = self.pop();
                    let index = self.pop();
                    let object = self.pop();
                    let result = self.set_item(object, index, value)?;
                    self.push(result);
                }
                OpCode::Import => {
                    let path_idx = self.fetch_byte();
                    let alias_idx = self.fetch_byte();
                    let path_id = self.read_constant(path_idx).as_obj().expect("import path constant is not a string");
                    let alias_id = self.read_constant(alias_idx).as_obj().expect("import alias constant is not a string");
                    let path_text = self.name_text(path_id);
                    let value = self.import_module(alias_id, &path_text)?;
                    self.push(value);
                }
                OpCode::Yield => self.do_yield()?,
                OpCode::Resume => {
                    // No surface syntax compiles to `OP_RESUME` (the
                    // reference's own `astcompile.c` never emits it either —
                    // it is only dispatched in `vm.c`). Kept as a defined,
                    // harmless error rather than an `unreachable!`.
                    return Err(self.type_error("resume is not supported"));
                }
            }
        }
    }

    fn pop_args(&mut self, n: usize) -> Vec<Value> {
        let mut args = vec![Value::Nil; n];
        for slot in args.iter_mut().rev() {
            *slot = self.pop();
        }
        args
    }

    // ---- arithmetic / comparison ------------------------------------------

    fn add(&mut self, a: Value, b: Value) -> Result<Value, RuntimeError> {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x + y)),
            (Value::Obj(_), Value::Obj(_)) => match (self.as_str(a), self.as_str(b)) {
                (Some(x), Some(y)) => {
                    let id = self.heap.intern_string(&format!("{x}{y}"));
                    Ok(Value::Obj(id))
                }
                _ => Err(self.type_error("operands to '+' must both be numbers or both be strings")),
            },
            _ => Err(self.type_error("operands to '+' must both be numbers or both be strings")),
        }
    }

    fn as_str(&self, value: Value) -> Option<String> {
        match value {
            Value::Obj(id) => match self.heap.get(id) {
                HeapObject::Str(s) => Some(s.as_str().to_string()),
                _ => None,
            },
            _ => None,
        }
    }

    fn numeric_binop(&self, a: Value, b: Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, RuntimeError> {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => Ok(Value::Number(f(x, y))),
            _ => Err(self.type_error("operands must be numbers")),
        }
    }

    fn compare(&self, a: Value, b: Value, f: impl Fn(f64, f64) -> bool) -> Result<bool, RuntimeError> {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => Ok(f(x, y)),
            _ => Err(self.type_error("operands must be numbers")),
        }
    }

    // ---- upvalues -----------------------------------------------------------

    fn capture_upvalue(&mut self, slot: usize) -> HeapId {
        let frame_id = self.frame;
        let existing_ids: Vec<HeapId> = self.frame_ref().open_upvalues.clone();
        for uv_id in existing_ids {
            if let HeapObject::Upvalue(u) = self.heap.get(uv_id) {
                if let UpvalueLocation::Open(f, s) = u.location {
                    if f == frame_id && s == slot {
                        return uv_id;
                    }
                }
            }
        }
        let uv_id = self.heap.allocate(HeapObject::Upvalue(crate::function::ObjUpvalue {
            location: UpvalueLocation::Open(frame_id, slot),
        }));
        self.frame_mut().open_upvalues.push(uv_id);
        uv_id
    }

    fn read_upvalue(&self, uv_id: HeapId) -> Value {
        match self.heap.get(uv_id) {
            HeapObject::Upvalue(u) => match u.location {
                UpvalueLocation::Open(frame_id, slot) => match self.heap.get(frame_id) {
                    HeapObject::CallFrame(f) => f.stack[slot],
                    _ => unreachable!(),
                },
                UpvalueLocation::Closed(v) => v,
            },
            _ => unreachable!(),
        }
    }

    fn write_upvalue(&mut self, uv_id: HeapId, value: Value) {
        let location = match self.heap.get(uv_id) {
            HeapObject::Upvalue(u) => u.location,
            _ => unreachable!(),
        };
        match location {
            UpvalueLocation::Open(frame_id, slot) => {
                if let HeapObject::CallFrame(f) = self.heap.get_mut(frame_id) {
                    f.stack[slot] = value;
                }
            }
            UpvalueLocation::Closed(_) => {
                if let HeapObject::Upvalue(u) = self.heap.get_mut(uv_id) {
                    u.location = UpvalueLocation::Closed(value);
                }
            }
        }
    }

    /// Closes every upvalue this frame still has open at or above `min_slot`
    /// (§3 Invariants: "closing is irreversible"). Called both for a single
    /// local going out of scope (`OP_CLOSE_UPVALUE`, `min_slot` = that local's
    /// exact slot) and in bulk on `OP_RETURN` (`min_slot` = 0).
    fn close_upvalues_from(&mut self, min_slot: usize) {
        let ids: Vec<HeapId> = self.frame_ref().open_upvalues.clone();
        let mut remaining = Vec::new();
        for uv_id in ids {
            let open_slot = match self.heap.get(uv_id) {
                HeapObject::Upvalue(u) => match u.location {
                    UpvalueLocation::Open(_, s) => Some(s),
                    UpvalueLocation::Closed(_) => None,
                },
                _ => None,
            };
            match open_slot {
                Some(slot) if slot >= min_slot => {
                    let value = self.frame_ref().stack[slot];
                    if let HeapObject::Upvalue(u) = self.heap.get_mut(uv_id) {
                        u.location = UpvalueLocation::Closed(value);
                    }
                }
                _ => remaining.push(uv_id),
            }
        }
        self.frame_mut().open_upvalues = remaining;
    }

    // ---- calls, classes, instances -----------------------------------------

    fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Result<(), RuntimeError> {
        enum Callable {
            Closure(HeapId, Value),
            Native(NativeFn),
            BoundNative(NativeMethodFn, Value),
            Class(HeapId),
        }
        let Value::Obj(id) = callee else {
            return Err(self.type_error("value is not callable"));
        };
        let action = match self.heap.get(id) {
            HeapObject::Closure(_) => Callable::Closure(id, Value::Obj(id)),
            HeapObject::Native(f) => Callable::Native(*f),
            HeapObject::BoundMethod(b) => match b.method {
                BoundMethodKind::Closure(cid) => Callable::Closure(cid, b.receiver),
                BoundMethodKind::Native(f) => Callable::BoundNative(f, b.receiver),
            },
            HeapObject::Class(_) => Callable::Class(id),
            other => return Err(self.type_error(format!("{} is not callable", other.kind_name()))),
        };
        match action {
            Callable::Closure(cid, receiver) => self.call_closure(cid, receiver, args),
            Callable::Native(f) => {
                let result = f(self, &args).map_err(|m| self.type_error(m))?;
                self.push(result);
                Ok(())
            }
            Callable::BoundNative(f, receiver) => {
                let result = f(self, receiver, &args).map_err(|m| self.type_error(m))?;
                self.push(result);
                Ok(())
            }
            Callable::Class(cid) => self.instantiate(cid, args),
        }
    }

    /// Creates a new heap-resident call frame for `closure_id` and switches
    /// execution to it. `receiver` occupies reserved slot 0 — the closure's
    /// own value for a plain function call, `this` for a bound method call.
    fn call_closure(&mut self, closure_id: HeapId, receiver: Value, args: Vec<Value>) -> Result<(), RuntimeError> {
        let function_id = match self.heap.get(closure_id) {
            HeapObject::Closure(c) => c.function,
            _ => unreachable!(),
        };
        let arity = match self.heap.get(function_id) {
            HeapObject::Function(f) => f.arity,
            _ => unreachable!(),
        };
        if args.len() != arity as usize {
            return Err(self.runtime_err(
                RuntimeErrorKind::ArityMismatch,
                format!("expected {arity} argument(s) but got {}", args.len()),
            ));
        }
        self.frame_depth += 1;
        self.resource.check_frame_depth(self.frame_depth).map_err(|e| self.resource_error(e))?;
        let mut frame = CallFrameObj::new(closure_id, 0);
        frame.parent = Some(self.frame);
        frame.stack.push(receiver);
        frame.stack.extend(args);
        let frame_id = self.heap.allocate(HeapObject::CallFrame(frame));
        self.frame = frame_id;
        let function_name = match self.heap.get(function_id) {
            HeapObject::Function(f) => f.name.map(|n| self.name_text(n)),
            _ => None,
        };
        self.tracer.on_call(function_name.as_deref(), self.frame_depth);
        Ok(())
    }

    /// `ClassName(args...)` (§4.5 "class instantiation"): allocates a new
    /// instance seeded from the class's default-field table, then runs
    /// `init` (if any) as a bound method call against it.
    fn instantiate(&mut self, class_id: HeapId, args: Vec<Value>) -> Result<(), RuntimeError> {
        let fields = match self.heap.get(class_id) {
            HeapObject::Class(c) => c.fields.clone(),
            _ => unreachable!(),
        };
        let init = match self.heap.get(class_id) {
            HeapObject::Class(c) => c.methods.get(&self.init_name).copied(),
            _ => unreachable!(),
        };
        let instance_id = self.heap.allocate(HeapObject::Instance(ObjInstance { class: class_id, fields }));
        match init {
            Some(closure_id) => self.call_closure(closure_id, Value::Obj(instance_id), args),
            None => {
                if !args.is_empty() {
                    return Err(self.runtime_err(
                        RuntimeErrorKind::ArityMismatch,
                        "class has no initializer but arguments were given",
                    ));
                }
                self.push(Value::Obj(instance_id));
                Ok(())
            }
        }
    }

    fn inherit(&mut self, superclass_v: Value, subclass_v: Value) -> Result<(), RuntimeError> {
        let (Value::Obj(sub_id), Value::Obj(super_id)) = (subclass_v, superclass_v) else {
            return Err(self.type_error("superclass must be a class"));
        };
        if !matches!(self.heap.get(super_id), HeapObject::Class(_)) {
            return Err(self.type_error("superclass must be a class"));
        }
        let methods = match self.heap.get(super_id) {
            HeapObject::Class(c) => c.methods.clone(),
            _ => unreachable!(),
        };
        if let HeapObject::Class(c) = self.heap.get_mut(sub_id) {
            c.superclass = Some(super_id);
            for (name, closure) in methods {
                c.methods.insert(name, closure);
            }
        }
        Ok(())
    }

    fn define_method(&mut self, class_v: Value, name_id: HeapId, method_v: Value) -> Result<(), RuntimeError> {
        let (Value::Obj(class_id), Value::Obj(closure_id)) = (class_v, method_v) else {
            return Err(self.type_error("invalid method definition"));
        };
        if let HeapObject::Class(c) = self.heap.get_mut(class_id) {
            c.methods.insert(name_id, closure_id);
        }
        Ok(())
    }

    fn bind_super_method(&mut self, superclass_v: Value, this_v: Value, name_id: HeapId) -> Result<Value, RuntimeError> {
        let super_id = superclass_v.as_obj().ok_or_else(|| self.type_error("'super' must be a class"))?;
        let method = match self.heap.get(super_id) {
            HeapObject::Class(c) => c.methods.get(&name_id).copied(),
            _ => None,
        };
        match method {
            Some(closure_id) => {
                let bound = self
                    .heap
                    .allocate(HeapObject::BoundMethod(ObjBoundMethod { receiver: this_v, method: BoundMethodKind::Closure(closure_id) }));
                Ok(Value::Obj(bound))
            }
            None => Err(self.runtime_err(
                RuntimeErrorKind::NameError,
                format!("undefined superclass method '{}'", self.name_text(name_id)),
            )),
        }
    }

    fn list_method(&self, name_id: HeapId) -> Result<NativeMethodFn, RuntimeError> {
        match self.name_text(name_id).as_str() {
            "length" => Ok(builtins::list_length),
            "push" => Ok(builtins::list_push),
            "pop" => Ok(builtins::list_pop),
            "reverse" => Ok(builtins::list_reverse),
            "copy" => Ok(builtins::list_copy),
            "sort" => Ok(builtins::list_sort),
            other => Err(self.runtime_err(RuntimeErrorKind::NameError, format!("List has no method '{other}'"))),
        }
    }

    fn map_method(&self, name_id: HeapId) -> Result<NativeMethodFn, RuntimeError> {
        match self.name_text(name_id).as_str() {
            "keys" => Ok(builtins::map_keys),
            "values" => Ok(builtins::map_values),
            other => Err(self.runtime_err(RuntimeErrorKind::NameError, format!("Map has no method '{other}'"))),
        }
    }

    fn task_method(&self, name_id: HeapId) -> Result<NativeMethodFn, RuntimeError> {
        match self.name_text(name_id).as_str() {
            "getResult" => Ok(builtins::task_get_result),
            "isReady" => Ok(builtins::task_is_ready),
            other => Err(self.runtime_err(RuntimeErrorKind::NameError, format!("Task has no method '{other}'"))),
        }
    }

    fn namespace_method(&self, namespace: &'static str, name_id: HeapId) -> Result<NativeMethodFn, RuntimeError> {
        match (namespace, self.name_text(name_id).as_str()) {
            ("time", "clock") => Ok(builtins::time_clock),
            (_, other) => Err(self.runtime_err(RuntimeErrorKind::NameError, format!("'{namespace}' has no member '{other}'"))),
        }
    }

    fn get_property(&mut self, object: Value, name_id: HeapId) -> Result<Value, RuntimeError> {
        enum Resolved {
            Value(Value),
            BindClosure(HeapId),
            BindNative(NativeMethodFn),
            Err(RuntimeErrorKind, String),
        }
        let Value::Obj(id) = object else {
            return Err(self.type_error("only objects have properties"));
        };
        let resolved = match self.heap.get(id) {
            HeapObject::Instance(inst) => {
                if let Some(v) = inst.fields.get(&name_id).copied() {
                    Resolved::Value(v)
                } else {
                    let class_id = inst.class;
                    let method = match self.heap.get(class_id) {
                        HeapObject::Class(c) => c.methods.get(&name_id).copied(),
                        _ => unreachable!(),
                    };
                    match method {
                        Some(cid) => Resolved::BindClosure(cid),
                        None => Resolved::Err(
                            RuntimeErrorKind::NameError,
                            format!("undefined property '{}'", self.name_text(name_id)),
                        ),
                    }
                }
            }
            HeapObject::Class(c) => match c.fields.get(&name_id).copied() {
                Some(v) => Resolved::Value(v),
                None => Resolved::Err(RuntimeErrorKind::NameError, format!("undefined property '{}'", self.name_text(name_id))),
            },
            HeapObject::List(_) => match self.list_method(name_id) {
                Ok(f) => Resolved::BindNative(f),
                Err(e) => Resolved::Err(e.kind, e.message),
            },
            HeapObject::Map(_) => match self.map_method(name_id) {
                Ok(f) => Resolved::BindNative(f),
                Err(e) => Resolved::Err(e.kind, e.message),
            },
            HeapObject::Task(_) => match self.task_method(name_id) {
                Ok(f) => Resolved::BindNative(f),
                Err(e) => Resolved::Err(e.kind, e.message),
            },
            HeapObject::Namespace(namespace) => match self.namespace_method(*namespace, name_id) {
                Ok(f) => Resolved::BindNative(f),
                Err(e) => Resolved::Err(e.kind, e.message),
            },
            other => Resolved::Err(RuntimeErrorKind::TypeError, format!("{} has no properties", other.kind_name())),
        };
        match resolved {
            Resolved::Value(v) => Ok(v),
            Resolved::BindClosure(cid) => {
                let bound = self
                    .heap
                    .allocate(HeapObject::BoundMethod(ObjBoundMethod { receiver: object, method: BoundMethodKind::Closure(cid) }));
                Ok(Value::Obj(bound))
            }
            Resolved::BindNative(f) => {
                let bound = self
                    .heap
                    .allocate(HeapObject::BoundMethod(ObjBoundMethod { receiver: object, method: BoundMethodKind::Native(f) }));
                Ok(Value::Obj(bound))
            }
            Resolved::Err(kind, message) => Err(self.runtime_err(kind, message)),
        }
    }

    /// `object.field = value` (§4.4): fields live on `Instance.fields` for
    /// ordinary objects and on `Class.fields` for enum members / class-level
    /// defaults set during `class`/`enum` statement execution.
    fn set_property(&mut self, object: Value, name_id: HeapId, value: Value) -> Result<Value, RuntimeError> {
        enum Target {
            Instance,
            Class,
            Unsupported(&'static str),
        }
        let Value::Obj(id) = object else {
            return Err(self.type_error("only objects have settable properties"));
        };
        let target = match self.heap.get(id) {
            HeapObject::Instance(_) => Target::Instance,
            HeapObject::Class(_) => Target::Class,
            other => Target::Unsupported(other.kind_name()),
        };
        match target {
            Target::Instance => {
                if let HeapObject::Instance(inst) = self.heap.get_mut(id) {
                    inst.fields.insert(name_id, value);
                }
                Ok(value)
            }
            Target::Class => {
                if let HeapObject::Class(c) = self.heap.get_mut(id) {
                    c.fields.insert(name_id, value);
                }
                Ok(value)
            }
            Target::Unsupported(kind) => Err(self.type_error(format!("cannot set a property on {kind}"))),
        }
    }

    fn invoke(&mut self, receiver: Value, name_id: HeapId, args: Vec<Value>) -> Result<(), RuntimeError> {
        enum Target {
            Field(Value),
            Method(HeapId, Value),
            Native(NativeMethodFn, Value),
            Err(RuntimeErrorKind, String),
        }
        let Value::Obj(id) = receiver else {
            return Err(self.type_error("cannot call a method on a non-object value"));
        };
        let target = match self.heap.get(id) {
            HeapObject::Instance(inst) => {
                if let Some(v) = inst.fields.get(&name_id).copied() {
                    Target::Field(v)
                } else {
                    let class_id = inst.class;
                    let method = match self.heap.get(class_id) {
                        HeapObject::Class(c) => c.methods.get(&name_id).copied(),
                        _ => unreachable!(),
                    };
                    match method {
                        Some(cid) => Target::Method(cid, receiver),
                        None => Target::Err(RuntimeErrorKind::NameError, format!("undefined property '{}'", self.name_text(name_id))),
                    }
                }
            }
            HeapObject::List(_) => match self.list_method(name_id) {
                Ok(f) => Target::Native(f, receiver),
                Err(e) => Target::Err(e.kind, e.message),
            },
            HeapObject::Map(_) => match self.map_method(name_id) {
                Ok(f) => Target::Native(f, receiver),
                Err(e) => Target::Err(e.kind, e.message),
            },
            HeapObject::Task(_) => match self.task_method(name_id) {
                Ok(f) => Target::Native(f, receiver),
                Err(e) => Target::Err(e.kind, e.message),
            },
            other => Target::Err(RuntimeErrorKind::TypeError, format!("{} has no methods", other.kind_name())),
        };
        match target {
            Target::Field(v) => self.call_value(v, args),
            Target::Method(cid, recv) => self.call_closure(cid, recv, args),
            Target::Native(f, recv) => {
                let result = f(self, recv, &args).map_err(|m| self.type_error(m))?;
                self.push(result);
                Ok(())
            }
            Target::Err(kind, message) => Err(self.runtime_err(kind, message)),
        }
    }

    // ---- list / map indexing ------------------------------------------------

    fn get_item(&mut self, object: Value, index: Value) -> Result<Value, RuntimeError> {
        enum Kind {
            List,
            Map,
            Other(&'static str),
        }
        let Value::Obj(id) = object else {
            return Err(self.type_error("value is not indexable"));
        };
        let kind = match self.heap.get(id) {
            HeapObject::List(_) => Kind::List,
            HeapObject::Map(_) => Kind::Map,
            other => Kind::Other(other.kind_name()),
        };
        match kind {
            Kind::List => {
                let idx = index.as_number().ok_or_else(|| self.type_error("list index must be a number"))? as i64;
                let items = match self.heap.get(id) {
                    HeapObject::List(items) => items,
                    _ => unreachable!(),
                };
                if idx < 0 || idx as usize >= items.len() {
                    return Err(self.runtime_err(RuntimeErrorKind::IndexError, format!("list index {idx} out of range")));
                }
                Ok(items[idx as usize])
            }
            Kind::Map => {
                let mut map_obj = self.heap.take(id);
                let result = match &map_obj {
                    HeapObject::Map(map) => map.get(&index, &self.heap),
                    _ => unreachable!(),
                };
                self.heap.put_back(id, map_obj);
                result.ok_or_else(|| self.runtime_err(RuntimeErrorKind::KeyError, "key not found in map"))
            }
            Kind::Other(k) => Err(self.type_error(format!("{k} is not indexable"))),
        }
    }

    fn set_item(&mut self, object: Value, index: Value, value: Value) -> Result<Value, RuntimeError> {
        enum Kind {
            List,
            Map,
            Other(&'static str),
        }
        let Value::Obj(id) = object else {
            return Err(self.type_error("value does not support item assignment"));
        };
        let kind = match self.heap.get(id) {
            HeapObject::List(_) => Kind::List,
            HeapObject::Map(_) => Kind::Map,
            other => Kind::Other(other.kind_name()),
        };
        match kind {
            Kind::List => {
                let idx = index.as_number().ok_or_else(|| self.type_error("list index must be a number"))? as i64;
                let len = match self.heap.get(id) {
                    HeapObject::List(items) => items.len(),
                    _ => unreachable!(),
                };
                if idx < 0 || idx as usize >= len {
                    return Err(self.runtime_err(RuntimeErrorKind::IndexError, format!("list index {idx} out of range")));
                }
                if let HeapObject::List(items) = self.heap.get_mut(id) {
                    items[idx as usize] = value;
                }
                Ok(value)
            }
            Kind::Map => {
                let mut map_obj = self.heap.take(id);
                if let HeapObject::Map(map) = &mut map_obj {
                    map.set(index, value, &self.heap);
                }
                self.heap.put_back(id, map_obj);
                Ok(value)
            }
            Kind::Other(k) => Err(self.type_error(format!("{k} does not support item assignment"))),
        }
    }

    // ---- return / scheduling ------------------------------------------------

    /// Closes out the current frame: if it was an ordinary (non-root) call,
    /// resumes the caller with `value` on top of its stack. Otherwise this
    /// was a task/script root — either the whole `run()` ends (caller checks
    /// `self.frame_depth == 0` after this returns) or the task is retired
    /// and the scheduler's next runnable frame takes over.
    fn do_return(&mut self, value: Value) -> Result<(), RuntimeError> {
        self.tracer.on_return(self.frame_depth);
        let finished_frame = self.frame;
        let parent = self.frame_ref().parent;
        match parent {
            Some(parent_id) => {
                self.frame = parent_id;
                self.push(value);
                self.frame_depth = self.frame_depth.saturating_sub(1);
                Ok(())
            }
            None if finished_frame == self.main_frame => {
                self.frame_depth = 0;
                Ok(())
            }
            None => {
                if let HeapObject::CallFrame(f) = self.heap.get_mut(finished_frame) {
                    f.state |= scheduler::frame_state::FINISHED;
                    f.result = value;
                }
                let now = self.now();
                self.scheduler.retire_current(now);
                match self.next_runnable(now) {
                    Some(next) => {
                        self.frame = next;
                        self.frame_depth = self.frame_depth.saturating_sub(1);
                        Ok(())
                    }
                    None => {
                        self.frame_depth = 0;
                        Ok(())
                    }
                }
            }
        }
    }

    fn do_yield(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop();
        let now = self.now();
        let sleep_seconds = self.decode_sleep_request(value);
        let suspended = self.frame;
        // A sleeping task is only ever brought back by `wake_expired` once
        // its deadline has passed; a plain `yield` is only ever brought back
        // by ordinary round-robin advancement. Which path this frame took is
        // therefore already known here, not just at resume time.
        let woke_by_deadline = sleep_seconds.is_some();
        match sleep_seconds {
            Some(seconds) => self.scheduler.sleep_current(now, seconds),
            None => self.scheduler.advance(now),
        }
        self.tracer.on_yield(suspended);
        // The yield expression's value once this frame resumes: `true` if a
        // sleep deadline is what woke it, mirroring
        // `AS_CALL_FRAME(sleeper)->stored = BOOL_VAL(true)` in
        // `original_source/src/libc/async.c`'s `getTasks`.
        let resume_value = Value::Bool(woke_by_deadline);
        if let HeapObject::CallFrame(frame) = self.heap.get_mut(suspended) {
            frame.stored = resume_value;
        }
        self.push_to(suspended, resume_value);
        match self.next_runnable(now) {
            Some(next) => self.frame = next,
            None => self.frame = suspended,
        }
        Ok(())
    }

    fn decode_sleep_request(&self, value: Value) -> Option<f64> {
        let Value::Obj(id) = value else { return None };
        let HeapObject::List(items) = self.heap.get(id) else { return None };
        if items.len() != 2 {
            return None;
        }
        let op = items[0].as_number()?;
        if op as i64 != scheduler::YIELD_SLEEP {
            return None;
        }
        items[1].as_number()
    }

    /// Picks the scheduler's next frame, physically sleeping (there being
    /// only one OS thread here) if the run queue is empty but a task is
    /// waiting on a deadline — the cooperative-scheduler equivalent of an
    /// event loop blocking on its next timer.
    fn next_runnable(&mut self, mut now: f64) -> Option<HeapId> {
        loop {
            if let Some(frame) = self.scheduler.current_frame() {
                return Some(frame);
            }
            let wake_at = self.scheduler.earliest_wake()?;
            let delay = (wake_at - now).max(0.0);
            std::thread::sleep(Duration::from_secs_f64(delay));
            now = self.now();
            self.scheduler.wake_expired(now);
        }
    }

    // ---- modules --------------------------------------------------------

    fn import_module(&mut self, alias_id: HeapId, path_text: &str) -> Result<Value, RuntimeError> {
        let resolved = self.script_dir.join(path_text);
        if let Some(existing) = self.modules.get(&resolved) {
            if self.modules.is_loading(&resolved, &self.heap) {
                return Err(self.runtime_err(RuntimeErrorKind::NameError, format!("import cycle detected for '{path_text}'")));
            }
            return Ok(Value::Obj(existing));
        }
        let source = std::fs::read_to_string(&resolved)
            .map_err(|e| self.runtime_err(RuntimeErrorKind::NameError, format!("cannot read module '{path_text}': {e}")))?;
        let module_id = self.heap.allocate(HeapObject::Module(ModuleObj::new(alias_id, resolved.clone())));
        self.modules.insert(resolved.clone(), module_id);

        let statements = crate::parser::parse(&source)
            .map_err(|errors| self.runtime_err(RuntimeErrorKind::NameError, format!("{} error(s) parsing '{path_text}'", errors.len())))?;
        let function = crate::bytecode::compiler::Compiler::new(&mut self.heap).compile_script(&statements).map_err(|errors| {
            self.runtime_err(RuntimeErrorKind::NameError, format!("{} error(s) compiling '{path_text}'", errors.len()))
        })?;

        self.import_stack.push(std::mem::replace(&mut self.globals, GlobalTable::new()));
        let result = self.run_nested(function);
        let saved_globals = self.import_stack.pop().expect("import_stack pushed just above");
        let module_globals = std::mem::replace(&mut self.globals, saved_globals);

        if let HeapObject::Module(m) = self.heap.get_mut(module_id) {
            m.globals = module_globals;
            m.result_code = Some(if result.is_ok() { ModuleResult::Ok } else { ModuleResult::Err });
        }
        result?;
        Ok(Value::Obj(module_id))
    }

    /// Runs one compiled top-level body to completion as its own isolated
    /// frame chain, outside the scheduler — a module's top level runs
    /// synchronously to completion (§4.8 Invariants), so it cannot itself
    /// `yield` into the importing script's tasks.
    fn run_nested(&mut self, function: ObjFunction) -> Result<Value, RuntimeError> {
        let function_id = self.heap.allocate(HeapObject::Function(function));
        let closure_id = self.heap.allocate(HeapObject::Closure(ObjClosure { function: function_id, upvalues: Vec::new() }));
        let mut frame = CallFrameObj::new(closure_id, 0);
        frame.stack.push(Value::Obj(closure_id));
        let frame_id = self.heap.allocate(HeapObject::CallFrame(frame));
        let saved_frame = self.frame;
        let saved_main = self.main_frame;
        let saved_depth = self.frame_depth;
        self.frame = frame_id;
        self.main_frame = frame_id;
        self.frame_depth = 1;
        let result = self.run();
        self.frame = saved_frame;
        self.main_frame = saved_main;
        self.frame_depth = saved_depth;
        result
    }

    // ---- garbage collection ------------------------------------------------

    fn gc_roots(&self) -> Vec<HeapId> {
        let mut roots = vec![self.frame, self.main_frame, self.init_name];
        roots.extend(self.globals.values().filter_map(|v| v.as_obj()));
        for saved in &self.import_stack {
            roots.extend(saved.values().filter_map(|v| v.as_obj()));
        }
        roots.extend(self.scheduler.all_frames());
        roots.extend(self.modules.all_modules());
        roots
    }

    fn collect_garbage(&mut self) {
        let before = self.heap.object_count();
        let roots = self.gc_roots();
        self.heap.collect_garbage(roots);
        let after = self.heap.object_count();
        self.tracer.on_gc(before.saturating_sub(after), after);
    }

    // ---- display ------------------------------------------------------------

    fn display_value(&self, value: Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(_) => value.to_string(),
            Value::Obj(id) => match self.heap.get(id) {
                HeapObject::Str(s) => s.as_str().to_string(),
                HeapObject::Atom(s) => format!(":{}", s.as_str()),
                HeapObject::List(items) => {
                    let parts: Vec<String> = items.iter().map(|v| self.display_value(*v)).collect();
                    format!("[{}]", parts.join(", "))
                }
                HeapObject::Map(map) => {
                    let parts: Vec<String> =
                        map.iter().map(|(k, v)| format!("{}: {}", self.display_value(k), self.display_value(v))).collect();
                    format!("{{{}}}", parts.join(", "))
                }
                HeapObject::Function(f) => {
                    format!("<fn {}>", f.name.map(|n| self.name_text(n)).unwrap_or_else(|| "script".to_string()))
                }
                HeapObject::Closure(c) => self.display_value(Value::Obj(c.function)),
                HeapObject::Native(_) => "<native fn>".to_string(),
                HeapObject::BoundMethod(_) => "<bound method>".to_string(),
                HeapObject::Class(c) => format!("<class {}>", self.name_text(c.name)),
                HeapObject::Instance(i) => {
                    let class_name = match self.heap.get(i.class) {
                        HeapObject::Class(c) => self.name_text(c.name),
                        _ => "?".to_string(),
                    };
                    format!("<{class_name} instance>")
                }
                HeapObject::Upvalue(_) | HeapObject::CallFrame(_) => "<internal>".to_string(),
                HeapObject::Task(_) => "<task>".to_string(),
                HeapObject::Module(m) => format!("<module {}>", self.name_text(m.name)),
                HeapObject::Namespace(name) => format!("<namespace {name}>"),
            },
        }
    }
}
