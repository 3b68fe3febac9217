//! AST -> bytecode compiler (§4.4).
//!
//! Grounded on `original_source/src/ast/astcompile.c`'s `compileNode`
//! dispatch. The reference keeps one global `currentCompiler` pointer and
//! chains nested function compilers through `enclosing`; Saffron keeps the
//! same nesting but as an explicit `Vec<FunctionCompiler>` stack so upvalue
//! resolution (walking outward through enclosing functions) is a safe index
//! walk instead of a linked borrow chain. The reference's `NODE_IF` case has
//! a copy-paste bug — it compiles `thenBranch` twice instead of
//! `elseBranch` — which `compile_if` below does not reproduce (see the
//! regression test in `tests/`).

use crate::{
    bytecode::{Chunk, OpCode},
    class::ObjClass,
    error::CompileError,
    expressions::{
        BinaryOp, ClassDecl, Expr, ExprKind, FunctionDecl, Literal, LogicalOp, Param, Stmt, StmtKind, UnaryOp,
    },
    function::{FunctionKind, ObjFunction},
    heap::{Heap, HeapObject},
    value::Value,
};

const MAX_LOCAL_COUNT: usize = 256;

struct Local {
    name: String,
    depth: i32,
    is_captured: bool,
}

struct Upvalue {
    index: u8,
    is_local: bool,
}

struct FunctionCompiler {
    chunk: Chunk,
    name: Option<String>,
    kind: FunctionKind,
    arity: u8,
    locals: Vec<Local>,
    upvalues: Vec<Upvalue>,
    scope_depth: i32,
    loop_break_jumps: Vec<Vec<usize>>,
}

impl FunctionCompiler {
    fn new(name: Option<String>, kind: FunctionKind) -> Self {
        // Slot 0 is reserved for the receiver in methods/initializers and
        // for the function value itself at the top level (§4.4's frame
        // layout), matching the reference compiler's `local[0]`.
        let receiver_name = if kind == FunctionKind::Function { "" } else { "this" };
        Self {
            chunk: Chunk::new(),
            name,
            kind,
            arity: 0,
            locals: vec![Local { name: receiver_name.into(), depth: 0, is_captured: false }],
            upvalues: Vec::new(),
            scope_depth: 0,
            loop_break_jumps: Vec::new(),
        }
    }
}

pub struct CompiledFunction {
    pub function: ObjFunction,
}

/// Compiles a full program (or, recursively, one function body) into
/// bytecode, allocating each nested function's `ObjFunction` directly onto
/// the heap as it finishes (so `OP_CLOSURE` constants are real heap values,
/// never a placeholder patched later).
pub struct Compiler<'h> {
    heap: &'h mut Heap,
    stack: Vec<FunctionCompiler>,
    errors: Vec<CompileError>,
}

impl<'h> Compiler<'h> {
    pub fn new(heap: &'h mut Heap) -> Self {
        Self { heap, stack: Vec::new(), errors: Vec::new() }
    }

    pub fn compile_script(mut self, statements: &[Stmt]) -> Result<ObjFunction, Vec<CompileError>> {
        self.stack.push(FunctionCompiler::new(None, FunctionKind::Script));
        for stmt in statements {
            self.compile_stmt(stmt);
        }
        let fc = self.stack.pop().unwrap();
        let mut chunk = fc.chunk;
        chunk.write_op(OpCode::Nil, 0);
        chunk.write_op(OpCode::Return, 0);
        if self.errors.is_empty() {
            Ok(ObjFunction { name: None, arity: 0, upvalue_count: 0, kind: FunctionKind::Script, chunk })
        } else {
            Err(self.errors)
        }
    }

    fn error(&mut self, line: u32, message: impl Into<String>) {
        self.errors.push(CompileError { line, message: message.into() });
    }

    fn cur(&mut self) -> &mut FunctionCompiler {
        self.stack.last_mut().expect("compiler stack is never empty mid-compile")
    }

    fn begin_scope(&mut self) {
        self.cur().scope_depth += 1;
    }

    fn end_scope(&mut self, line: u32) {
        self.cur().scope_depth -= 1;
        let depth = self.cur().scope_depth;
        while let Some(local) = self.cur().locals.last() {
            if local.depth <= depth {
                break;
            }
            let captured = self.cur().locals.last().unwrap().is_captured;
            if captured {
                self.cur().chunk.write_op(OpCode::CloseUpvalue, line);
            } else {
                self.cur().chunk.write_op(OpCode::Pop, line);
            }
            self.cur().locals.pop();
        }
    }

    fn declare_local(&mut self, name: &str, line: u32) {
        let depth = self.cur().scope_depth;
        if depth == 0 {
            return;
        }
        if self.cur().locals.len() >= MAX_LOCAL_COUNT {
            self.error(line, "Too many local variables in function");
            return;
        }
        if self.cur().locals.iter().any(|l| l.depth == depth && l.name == name) {
            self.error(line, format!("Variable '{name}' already declared in this scope"));
            return;
        }
        self.cur().locals.push(Local { name: name.to_string(), depth, is_captured: false });
    }

    fn resolve_local(fc: &FunctionCompiler, name: &str) -> Option<u8> {
        fc.locals.iter().rposition(|l| l.name == name).map(|i| i as u8)
    }

    /// Walks outward from `stack_index` looking for `name` as a local in an
    /// enclosing function, threading an upvalue chain down through every
    /// intermediate function that needs to forward the capture.
    fn resolve_upvalue(&mut self, stack_index: usize, name: &str) -> Option<u8> {
        if stack_index == 0 {
            return None;
        }
        let enclosing = stack_index - 1;
        if let Some(local) = Self::resolve_local(&self.stack[enclosing], name) {
            self.stack[enclosing].locals[local as usize].is_captured = true;
            return Some(self.add_upvalue(stack_index, local, true));
        }
        if let Some(upvalue) = self.resolve_upvalue(enclosing, name) {
            return Some(self.add_upvalue(stack_index, upvalue, false));
        }
        None
    }

    fn add_upvalue(&mut self, stack_index: usize, index: u8, is_local: bool) -> u8 {
        let fc = &mut self.stack[stack_index];
        for (i, up) in fc.upvalues.iter().enumerate() {
            if up.index == index && up.is_local == is_local {
                return i as u8;
            }
        }
        fc.upvalues.push(Upvalue { index, is_local });
        (fc.upvalues.len() - 1) as u8
    }

    fn compile_stmt(&mut self, stmt: &Stmt) {
        let line = stmt.line;
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.compile_expr(expr);
                self.cur().chunk.write_op(OpCode::Pop, line);
            }
            StmtKind::VarDecl { name, init, .. } => {
                self.declare_local(name, line);
                if let Some(init) = init {
                    self.compile_expr(init);
                } else {
                    self.cur().chunk.write_op(OpCode::Nil, line);
                }
                self.define_variable(name, line);
            }
            StmtKind::Block(stmts) => {
                self.begin_scope();
                for s in stmts {
                    self.compile_stmt(s);
                }
                self.end_scope(line);
            }
            StmtKind::If { condition, then_branch, else_branch } => self.compile_if(condition, then_branch, else_branch.as_deref(), line),
            StmtKind::While { condition, body } => self.compile_while(condition, body, line),
            StmtKind::For { init, condition, increment, body } => self.compile_for(init.as_deref(), condition.as_ref(), increment.as_ref(), body, line),
            StmtKind::Break => {
                if self.cur().loop_break_jumps.is_empty() {
                    self.error(line, "Cannot use 'break' outside of a loop");
                } else {
                    let jump = self.emit_jump(OpCode::Jump, line);
                    self.cur().loop_break_jumps.last_mut().unwrap().push(jump);
                }
            }
            StmtKind::Return(value) => {
                if self.cur().kind == FunctionKind::Script {
                    self.error(line, "Cannot return from top-level code");
                }
                let is_initializer = self.cur().kind == FunctionKind::Initializer;
                match value {
                    Some(_) if is_initializer => self.error(line, "Cannot return a value from an initializer"),
                    Some(expr) => self.compile_expr(expr),
                    None if is_initializer => {
                        self.cur().chunk.write_op(OpCode::GetLocal, line);
                        self.cur().chunk.write(0, line);
                    }
                    None => self.cur().chunk.write_op(OpCode::Nil, line),
                }
                self.cur().chunk.write_op(OpCode::Return, line);
            }
            StmtKind::Function(decl) => self.compile_function_decl(decl, FunctionKind::Function, line),
            StmtKind::Class(decl) => self.compile_class(decl, line),
            StmtKind::Import { path, alias } => {
                // The VM needs the literal path to resolve and load the file;
                // the alias constant is only for naming the resulting module
                // object, so both ride along on `OP_IMPORT` (§4.8).
                let path_id = self.heap.intern_string(path);
                let path_const = self.cur().chunk.add_constant(Value::Obj(path_id)) as u8;
                let alias_const = self.identifier_constant(alias);
                self.declare_local(alias, line);
                self.cur().chunk.write_op(OpCode::Import, line);
                self.cur().chunk.write(path_const, line);
                self.cur().chunk.write(alias_const, line);
                self.define_variable(alias, line);
            }
            StmtKind::Enum { name, items } => {
                // Compiles to a class whose variants live in its field table
                // (§4.5 "enum" sugar) rather than a distinct heap kind. The
                // class is allocated once, up front, like `compile_class`
                // does, so `OP_CLASS` always means "push a pre-built class
                // constant" regardless of which statement produced it.
                let name_id = self.heap.intern_string(name);
                let class = ObjClass::new(name_id);
                let class_id = self.heap.allocate(HeapObject::Class(class));
                let class_const = self.cur().chunk.add_constant(Value::Obj(class_id)) as u8;
                self.declare_local(name, line);
                self.cur().chunk.write_op(OpCode::Class, line);
                self.cur().chunk.write(class_const, line);
                self.define_variable(name, line);
                for item in items {
                    self.emit_variable_get(name, line);
                    let atom_id = self.heap.intern_atom(item);
                    let value_const = self.cur().chunk.add_constant(Value::Obj(atom_id)) as u8;
                    self.cur().chunk.write_op(OpCode::Constant, line);
                    self.cur().chunk.write(value_const, line);
                    let field_const = self.identifier_constant(item);
                    self.cur().chunk.write_op(OpCode::SetProperty, line);
                    self.cur().chunk.write(field_const, line);
                    self.cur().chunk.write_op(OpCode::Pop, line);
                }
            }
            StmtKind::TypeDecl(_) => {}
        }
    }

    fn compile_if(&mut self, condition: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>, line: u32) {
        self.compile_expr(condition);
        let then_jump = self.emit_jump(OpCode::JumpIfFalse, line);
        self.cur().chunk.write_op(OpCode::Pop, line);
        self.compile_stmt(then_branch);
        let else_jump = self.emit_jump(OpCode::Jump, line);
        self.patch_jump(then_jump);
        self.cur().chunk.write_op(OpCode::Pop, line);
        // Unlike `original_source/src/ast/astcompile.c`'s NODE_IF case,
        // which recompiles `thenBranch` here, this compiles `elseBranch`.
        if let Some(else_branch) = else_branch {
            self.compile_stmt(else_branch);
        }
        self.patch_jump(else_jump);
    }

    fn compile_while(&mut self, condition: &Expr, body: &Stmt, line: u32) {
        let loop_start = self.cur().chunk.code.len();
        self.compile_expr(condition);
        let exit_jump = self.emit_jump(OpCode::JumpIfFalse, line);
        self.cur().chunk.write_op(OpCode::Pop, line);
        self.cur().loop_break_jumps.push(Vec::new());
        self.compile_stmt(body);
        self.emit_loop(loop_start, line);
        self.patch_jump(exit_jump);
        self.cur().chunk.write_op(OpCode::Pop, line);
        for jump in self.cur().loop_break_jumps.pop().unwrap() {
            self.patch_jump(jump);
        }
    }

    fn compile_for(&mut self, init: Option<&Stmt>, condition: Option<&Expr>, increment: Option<&Expr>, body: &Stmt, line: u32) {
        self.begin_scope();
        if let Some(init) = init {
            self.compile_stmt(init);
        }
        let loop_start = self.cur().chunk.code.len();
        let exit_jump = condition.map(|condition| {
            self.compile_expr(condition);
            let j = self.emit_jump(OpCode::JumpIfFalse, line);
            self.cur().chunk.write_op(OpCode::Pop, line);
            j
        });
        self.cur().loop_break_jumps.push(Vec::new());
        self.compile_stmt(body);
        if let Some(increment) = increment {
            self.compile_expr(increment);
            self.cur().chunk.write_op(OpCode::Pop, line);
        }
        self.emit_loop(loop_start, line);
        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.cur().chunk.write_op(OpCode::Pop, line);
        }
        for jump in self.cur().loop_break_jumps.pop().unwrap() {
            self.patch_jump(jump);
        }
        self.end_scope(line);
    }

    fn compile_function_decl(&mut self, decl: &FunctionDecl, kind: FunctionKind, line: u32) {
        self.declare_local(&decl.name, line);
        self.compile_function(decl, kind, line);
        self.define_variable(&decl.name, line);
    }

    /// Compiles `decl`'s body as a nested function, allocates its
    /// `ObjFunction` onto the heap, and emits `OP_CLOSURE` plus the
    /// upvalue-capture descriptors into the *enclosing* function's chunk.
    fn compile_function(&mut self, decl: &FunctionDecl, kind: FunctionKind, line: u32) {
        self.stack.push(FunctionCompiler::new(Some(decl.name.clone()), kind));
        self.cur().scope_depth += 1;
        for param in &decl.params {
            self.declare_local(param.name(), line);
            self.arity_bump(param);
        }
        for stmt in &decl.body {
            self.compile_stmt(stmt);
        }
        if kind == FunctionKind::Initializer {
            self.cur().chunk.write_op(OpCode::GetLocal, line);
            self.cur().chunk.write(0, line);
        } else {
            self.cur().chunk.write_op(OpCode::Nil, line);
        }
        self.cur().chunk.write_op(OpCode::Return, line);

        let fc = self.stack.pop().unwrap();
        let upvalue_count = fc.upvalues.len() as u8;
        let name_id = self.heap.intern_string(&decl.name);
        let function = ObjFunction { name: Some(name_id), arity: fc.arity, upvalue_count, kind, chunk: fc.chunk };
        let function_id = self.heap.allocate(HeapObject::Function(function));
        let const_idx = self.cur().chunk.add_constant(Value::Obj(function_id)) as u8;
        self.cur().chunk.write_op(OpCode::Closure, line);
        self.cur().chunk.write(const_idx, line);
        for up in &fc.upvalues {
            self.cur().chunk.write(u8::from(up.is_local), line);
            self.cur().chunk.write(up.index, line);
        }
    }

    fn arity_bump(&mut self, param: &Param) {
        if matches!(param, Param::Positional { .. } | Param::Keyword { .. }) {
            self.cur().arity += 1;
        }
    }

    fn compile_class(&mut self, decl: &ClassDecl, line: u32) {
        let name_id = self.heap.intern_string(&decl.name);
        let class = ObjClass::new(name_id);
        let class_id = self.heap.allocate(HeapObject::Class(class));
        let name_const = self.cur().chunk.add_constant(Value::Obj(class_id)) as u8;
        self.declare_local(&decl.name, line);
        self.cur().chunk.write_op(OpCode::Class, line);
        self.cur().chunk.write(name_const, line);
        self.define_variable(&decl.name, line);

        if let Some(super_name) = &decl.superclass {
            self.emit_variable_get(super_name, line);
            self.emit_variable_get(&decl.name, line);
            self.cur().chunk.write_op(OpCode::Inherit, line);
        }

        self.begin_scope();
        if decl.superclass.is_some() {
            self.declare_local("super", line);
            self.define_variable("super", line);
        }

        self.emit_variable_get(&decl.name, line);
        // Default field values (§4.5 "class instantiation") are stored on
        // the class object itself, the same slot `new` pulls from to seed
        // each instance's field table before `init` runs.
        for (field_name, _type_ann, default) in &decl.fields {
            self.emit_variable_get(&decl.name, line);
            match default {
                Some(expr) => self.compile_expr(expr),
                None => self.cur().chunk.write_op(OpCode::Nil, line),
            }
            let field_const = self.identifier_constant(field_name);
            self.cur().chunk.write_op(OpCode::SetProperty, line);
            self.cur().chunk.write(field_const, line);
            self.cur().chunk.write_op(OpCode::Pop, line);
        }
        for method in &decl.methods {
            let kind = if method.name == "init" { FunctionKind::Initializer } else { FunctionKind::Method };
            self.compile_function(method, kind, line);
            let name_const = self.identifier_constant(&method.name);
            self.cur().chunk.write_op(OpCode::Method, line);
            self.cur().chunk.write(name_const, line);
        }
        self.cur().chunk.write_op(OpCode::Pop, line);
        self.end_scope(line);
    }

    fn define_variable(&mut self, name: &str, line: u32) {
        if self.cur().scope_depth > 0 {
            let depth = self.cur().scope_depth;
            if let Some(local) = self.cur().locals.last_mut() {
                if local.depth == -1 {
                    local.depth = depth;
                }
            }
            return;
        }
        let const_idx = self.identifier_constant(name);
        self.cur().chunk.write_op(OpCode::DefineGlobal, line);
        self.cur().chunk.write(const_idx, line);
    }

    fn identifier_constant(&mut self, name: &str) -> u8 {
        let id = self.heap.intern_string(name);
        self.cur().chunk.add_constant(Value::Obj(id)) as u8
    }

    fn emit_variable_get(&mut self, name: &str, line: u32) {
        let stack_index = self.stack.len() - 1;
        if let Some(slot) = Self::resolve_local(&self.stack[stack_index], name) {
            self.cur().chunk.write_op(OpCode::GetLocal, line);
            self.cur().chunk.write(slot, line);
        } else if let Some(slot) = self.resolve_upvalue(stack_index, name) {
            self.cur().chunk.write_op(OpCode::GetUpvalue, line);
            self.cur().chunk.write(slot, line);
        } else {
            let const_idx = self.identifier_constant(name);
            self.cur().chunk.write_op(OpCode::GetGlobal, line);
            self.cur().chunk.write(const_idx, line);
        }
    }

    fn emit_variable_set(&mut self, name: &str, line: u32) {
        let stack_index = self.stack.len() - 1;
        if let Some(slot) = Self::resolve_local(&self.stack[stack_index], name) {
            self.cur().chunk.write_op(OpCode::SetLocal, line);
            self.cur().chunk.write(slot, line);
        } else if let Some(slot) = self.resolve_upvalue(stack_index, name) {
            self.cur().chunk.write_op(OpCode::SetUpvalue, line);
            self.cur().chunk.write(slot, line);
        } else {
            let const_idx = self.identifier_constant(name);
            self.cur().chunk.write_op(OpCode::SetGlobal, line);
            self.cur().chunk.write(const_idx, line);
        }
    }

    fn emit_jump(&mut self, op: OpCode, line: u32) -> usize {
        let chunk = &mut self.cur().chunk;
        chunk.write_op(op, line);
        chunk.write(0xff, line);
        chunk.write(0xff, line);
        chunk.code.len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        let chunk = &mut self.cur().chunk;
        let jump = chunk.code.len() - offset - 2;
        chunk.code[offset] = ((jump >> 8) & 0xff) as u8;
        chunk.code[offset + 1] = (jump & 0xff) as u8;
    }

    fn emit_loop(&mut self, loop_start: usize, line: u32) {
        let chunk = &mut self.cur().chunk;
        chunk.write_op(OpCode::Loop, line);
        let offset = chunk.code.len() - loop_start + 2;
        chunk.write(((offset >> 8) & 0xff) as u8, line);
        chunk.write((offset & 0xff) as u8, line);
    }

    fn compile_expr(&mut self, expr: &Expr) {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Literal(lit) => self.compile_literal(lit, line),
            ExprKind::Grouping(inner) => self.compile_expr(inner),
            ExprKind::Unary { op, right } => {
                self.compile_expr(right);
                match op {
                    UnaryOp::Negate => self.cur().chunk.write_op(OpCode::Negate, line),
                    UnaryOp::Not => self.cur().chunk.write_op(OpCode::Not, line),
                }
            }
            ExprKind::Binary { left, op, right } => {
                self.compile_expr(left);
                self.compile_expr(right);
                self.emit_binary(*op, line);
            }
            ExprKind::Logical { left, op, right } => self.compile_logical(left, *op, right, line),
            ExprKind::Variable { name } => self.emit_variable_get(name, line),
            ExprKind::Assign { target, value } => self.compile_assign(target, value, line),
            ExprKind::Call { callee, args } => self.compile_call(callee, args, line),
            ExprKind::GetItem { object, index } => {
                self.compile_expr(object);
                self.compile_expr(index);
                self.cur().chunk.write_op(OpCode::GetItem, line);
            }
            ExprKind::GetProperty { object, name } => {
                self.compile_expr(object);
                let const_idx = self.identifier_constant(name);
                self.cur().chunk.write_op(OpCode::GetProperty, line);
                self.cur().chunk.write(const_idx, line);
            }
            ExprKind::Super { method } => {
                self.emit_variable_get("this", line);
                self.emit_variable_get("super", line);
                let const_idx = self.identifier_constant(method);
                self.cur().chunk.write_op(OpCode::GetSuper, line);
                self.cur().chunk.write(const_idx, line);
            }
            ExprKind::This => self.emit_variable_get("this", line),
            ExprKind::Yield { value } => {
                self.compile_expr(value);
                self.cur().chunk.write_op(OpCode::Yield, line);
            }
            ExprKind::Lambda { params, body, .. } => {
                let decl = FunctionDecl { name: "<lambda>".into(), params: params.clone(), return_type: None, body: body.clone() };
                self.compile_function(&decl, FunctionKind::Function, line);
            }
            ExprKind::List(items) => {
                for item in items {
                    self.compile_expr(item);
                }
                self.cur().chunk.write_op(OpCode::List, line);
                self.cur().chunk.write(items.len() as u8, line);
            }
            ExprKind::Map(entries) => {
                for (key, value) in entries {
                    self.compile_expr(key);
                    self.compile_expr(value);
                }
                self.cur().chunk.write_op(OpCode::Map, line);
                self.cur().chunk.write(entries.len() as u8, line);
            }
        }
    }

    fn compile_logical(&mut self, left: &Expr, op: LogicalOp, right: &Expr, line: u32) {
        self.compile_expr(left);
        match op {
            LogicalOp::And => {
                let end_jump = self.emit_jump(OpCode::JumpIfFalse, line);
                self.cur().chunk.write_op(OpCode::Pop, line);
                self.compile_expr(right);
                self.patch_jump(end_jump);
            }
            LogicalOp::Or => {
                let else_jump = self.emit_jump(OpCode::JumpIfFalse, line);
                let end_jump = self.emit_jump(OpCode::Jump, line);
                self.patch_jump(else_jump);
                self.cur().chunk.write_op(OpCode::Pop, line);
                self.compile_expr(right);
                self.patch_jump(end_jump);
            }
        }
    }

    fn compile_assign(&mut self, target: &Expr, value: &Expr, line: u32) {
        match &target.kind {
            ExprKind::Variable { name } => {
                self.compile_expr(value);
                self.emit_variable_set(name, line);
            }
            ExprKind::GetProperty { object, name } => {
                // `OP_SET_PROPERTY` pops value then object and pushes value
                // back, so object-then-value is the order it expects (§4.4).
                self.compile_expr(object);
                self.compile_expr(value);
                let const_idx = self.identifier_constant(name);
                self.cur().chunk.write_op(OpCode::SetProperty, line);
                self.cur().chunk.write(const_idx, line);
            }
            ExprKind::GetItem { object, index } => {
                self.compile_expr(object);
                self.compile_expr(index);
                self.compile_expr(value);
                self.cur().chunk.write_op(OpCode::SetItem, line);
            }
            _ => self.error(line, "Invalid assignment target"),
        }
    }

    fn compile_call(&mut self, callee: &Expr, args: &[Expr], line: u32) {
        if let ExprKind::Super { method } = &callee.kind {
            // `super.method(args)` fuses the lookup and call (§4.4's
            // OP_SUPER_INVOKE), skipping the intermediate bound-method value
            // a plain OP_GET_SUPER + OP_CALL pair would allocate.
            self.emit_variable_get("this", line);
            for arg in args {
                self.compile_expr(arg);
            }
            self.emit_variable_get("super", line);
            let const_idx = self.identifier_constant(method);
            self.cur().chunk.write_op(OpCode::SuperInvoke, line);
            self.cur().chunk.write(const_idx, line);
            self.cur().chunk.write(args.len() as u8, line);
            return;
        }
        if let ExprKind::GetProperty { object, name } = &callee.kind {
            self.compile_expr(object);
            for arg in args {
                self.compile_expr(arg);
            }
            let const_idx = self.identifier_constant(name);
            self.cur().chunk.write_op(OpCode::Invoke, line);
            self.cur().chunk.write(const_idx, line);
            self.cur().chunk.write(args.len() as u8, line);
            return;
        }
        self.compile_expr(callee);
        for arg in args {
            self.compile_expr(arg);
        }
        self.cur().chunk.write_op(OpCode::Call, line);
        self.cur().chunk.write(args.len() as u8, line);
    }

    fn compile_literal(&mut self, lit: &Literal, line: u32) {
        match lit {
            Literal::Nil => self.cur().chunk.write_op(OpCode::Nil, line),
            Literal::Bool(true) => self.cur().chunk.write_op(OpCode::True, line),
            Literal::Bool(false) => self.cur().chunk.write_op(OpCode::False, line),
            Literal::Number(n) => {
                let idx = self.cur().chunk.add_constant(Value::Number(*n)) as u8;
                self.cur().chunk.write_op(OpCode::Constant, line);
                self.cur().chunk.write(idx, line);
            }
            Literal::String(s) => {
                let id = self.heap.intern_string(s);
                let idx = self.cur().chunk.add_constant(Value::Obj(id)) as u8;
                self.cur().chunk.write_op(OpCode::Constant, line);
                self.cur().chunk.write(idx, line);
            }
            Literal::Atom(a) => {
                let id = self.heap.intern_atom(a);
                let idx = self.cur().chunk.add_constant(Value::Obj(id)) as u8;
                self.cur().chunk.write_op(OpCode::Constant, line);
                self.cur().chunk.write(idx, line);
            }
        }
    }

    fn emit_binary(&mut self, op: BinaryOp, line: u32) {
        match op {
            BinaryOp::Add => self.cur().chunk.write_op(OpCode::Add, line),
            BinaryOp::Subtract => self.cur().chunk.write_op(OpCode::Subtract, line),
            BinaryOp::Multiply => self.cur().chunk.write_op(OpCode::Multiply, line),
            BinaryOp::Divide => self.cur().chunk.write_op(OpCode::Divide, line),
            BinaryOp::Equal => self.cur().chunk.write_op(OpCode::Equal, line),
            BinaryOp::NotEqual => {
                self.cur().chunk.write_op(OpCode::Equal, line);
                self.cur().chunk.write_op(OpCode::Not, line);
            }
            BinaryOp::Greater => self.cur().chunk.write_op(OpCode::Greater, line),
            BinaryOp::GreaterEqual => {
                self.cur().chunk.write_op(OpCode::Less, line);
                self.cur().chunk.write_op(OpCode::Not, line);
            }
            BinaryOp::Less => self.cur().chunk.write_op(OpCode::Less, line),
            BinaryOp::LessEqual => {
                self.cur().chunk.write_op(OpCode::Greater, line);
                self.cur().chunk.write_op(OpCode::Not, line);
            }
        }
    }
}
