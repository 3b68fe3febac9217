//! Structural type checker (§4.3): a separate AST traversal that infers a
//! type for every node, checks it against declared annotations and the
//! built-in operator/call contracts, and reports diagnostics without
//! aborting — mirroring `hadError` in the reference checker
//! (`original_source/src/ast/asttypecheck.c`), kept here as a plain
//! `Vec<TypeDiagnostic>` collected over the whole traversal instead of a
//! global flag.

mod env;
mod types;

use ahash::AHashMap;
use saffron::expressions::{
    BinaryOp, ClassDecl, Expr, ExprKind, FunctionDecl, Literal, LogicalOp, Param, Stmt, StmtKind, TypeExpr, UnaryOp,
};

use env::TypeEnv;
pub use types::{FunctorType, GenericType, InterfaceType, SimpleType, Type, is_subtype};

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDiagnostic {
    pub line: u32,
    pub message: String,
}

impl std::fmt::Display for TypeDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.line, self.message)
    }
}

/// Checks a whole program, returning every diagnostic found. An empty result
/// means the program passed every check the checker implements; per §7 this
/// never prevents the VM from running the program regardless.
pub fn check(statements: &[Stmt]) -> Vec<TypeDiagnostic> {
    let mut checker = Checker::new();
    for stmt in statements {
        checker.check_stmt(stmt);
    }
    checker.diagnostics
}

struct Checker {
    env: TypeEnv,
    classes: AHashMap<String, SimpleType>,
    diagnostics: Vec<TypeDiagnostic>,
    return_stack: Vec<Option<Type>>,
    this_stack: Vec<Type>,
}

impl Checker {
    fn new() -> Self {
        let mut env = TypeEnv::new();
        for name in ["Number", "Nil", "Bool", "Atom", "String", "Never", "Any", "List", "Map", "Task"] {
            env.type_defs.insert(name.to_string(), Type::simple(name));
        }
        env.define("print", native_variadic());
        env.define("println", native_variadic());
        env.define(
            "spawn",
            Type::Functor(FunctorType { args: vec![Type::Any], generics: Vec::new(), ret: Box::new(Type::simple("Task")) }),
        );
        let mut time_methods = AHashMap::new();
        time_methods.insert(
            "clock".to_string(),
            Type::Functor(FunctorType { args: Vec::new(), generics: Vec::new(), ret: Box::new(Type::simple("Number")) }),
        );
        env.define(
            "time",
            Type::Simple(SimpleType { name: "time".to_string(), fields: AHashMap::new(), methods: time_methods, generics: Vec::new(), super_type: None }),
        );
        Self { env, classes: AHashMap::new(), diagnostics: Vec::new(), return_stack: Vec::new(), this_stack: Vec::new() }
    }

    fn error(&mut self, line: u32, message: impl Into<String>) {
        self.diagnostics.push(TypeDiagnostic { line, message: message.into() });
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        let line = stmt.line;
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.infer_expr(expr);
            }
            StmtKind::VarDecl { name, type_ann, init } => {
                let init_ty = init.as_ref().map_or(Type::simple("Nil"), |e| self.infer_expr(e));
                let declared = type_ann.as_ref().map(|t| self.resolve_type(t));
                if let Some(declared) = &declared {
                    if init.is_some() && !is_subtype(&init_ty, declared) {
                        self.error(line, format!("Cannot assign value of type `{}` to `{name}` of type `{}`", init_ty.name(), declared.name()));
                    }
                }
                self.env.define(name.clone(), declared.unwrap_or(init_ty));
            }
            StmtKind::Block(stmts) => {
                self.env.push_scope();
                for s in stmts {
                    self.check_stmt(s);
                }
                self.env.pop_scope();
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                self.infer_expr(condition);
                self.check_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch);
                }
            }
            StmtKind::While { condition, body } => {
                self.infer_expr(condition);
                self.check_stmt(body);
            }
            StmtKind::For { init, condition, increment, body } => {
                self.env.push_scope();
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(condition) = condition {
                    self.infer_expr(condition);
                }
                if let Some(increment) = increment {
                    self.infer_expr(increment);
                }
                self.check_stmt(body);
                self.env.pop_scope();
            }
            StmtKind::Break => {}
            StmtKind::Return(value) => {
                let actual = value.as_ref().map_or(Type::simple("Nil"), |e| self.infer_expr(e));
                if let Some(Some(expected)) = self.return_stack.last() {
                    if !is_subtype(&actual, expected) {
                        self.error(line, format!("Returned `{}` but function declares return type `{}`", actual.name(), expected.name()));
                    }
                }
            }
            StmtKind::Function(decl) => {
                let functor = self.declare_function_type(decl);
                self.env.define(decl.name.clone(), functor);
                self.check_function_body(decl, None);
            }
            StmtKind::Class(decl) => self.check_class(decl, line),
            StmtKind::Import { alias, .. } => {
                // Cross-file module typing needs filesystem access this
                // AST-only checker doesn't have; an imported alias types as
                // `Any` until a resolver is threaded in (see DESIGN.md).
                self.env.define(alias.clone(), Type::Any);
            }
            StmtKind::Enum { name, items } => {
                let mut fields = AHashMap::new();
                for item in items {
                    fields.insert(item.clone(), Type::simple("Atom"));
                }
                let simple = SimpleType { name: name.clone(), fields, methods: AHashMap::new(), generics: Vec::new(), super_type: None };
                self.classes.insert(name.clone(), simple.clone());
                self.env.define(name.clone(), Type::Simple(simple));
            }
            StmtKind::TypeDecl(type_expr) => {
                let resolved = self.resolve_type(type_expr);
                let name = match type_expr {
                    TypeExpr::Declaration { name, .. } | TypeExpr::Interface { name, .. } => name.clone(),
                    _ => return,
                };
                self.env.type_defs.insert(name, resolved);
            }
        }
    }

    fn declare_function_type(&mut self, decl: &FunctionDecl) -> Type {
        let args = decl.params.iter().map(|p| self.param_type(p)).collect();
        let ret = decl.return_type.as_ref().map_or(Type::Any, |t| self.resolve_type(t));
        Type::Functor(FunctorType { args, generics: Vec::new(), ret: Box::new(ret) })
    }

    fn param_type(&mut self, param: &Param) -> Type {
        match param {
            Param::Positional { type_ann, .. } | Param::Keyword { type_ann, .. } | Param::Variadic { type_ann, .. } => {
                type_ann.as_ref().map_or(Type::Any, |t| self.resolve_type(t))
            }
        }
    }

    fn check_function_body(&mut self, decl: &FunctionDecl, this_type: Option<Type>) {
        self.env.push_scope();
        if let Some(this_type) = this_type {
            self.this_stack.push(this_type.clone());
            self.env.define("this", this_type);
        }
        for param in &decl.params {
            let ty = self.param_type(param);
            self.env.define(param.name().to_string(), ty);
        }
        let ret = decl.return_type.as_ref().map(|t| self.resolve_type(t));
        self.return_stack.push(ret);
        for stmt in &decl.body {
            self.check_stmt(stmt);
        }
        self.return_stack.pop();
        self.env.pop_scope();
    }

    fn check_class(&mut self, decl: &ClassDecl, line: u32) {
        let super_type = decl.superclass.as_ref().and_then(|name| self.classes.get(name).cloned());
        if let Some(name) = &decl.superclass {
            if super_type.is_none() {
                self.error(line, format!("Unknown superclass `{name}`"));
            }
        }

        let mut fields = AHashMap::new();
        for (name, type_ann, default) in &decl.fields {
            let declared = type_ann.as_ref().map(|t| self.resolve_type(t));
            let inferred = default.as_ref().map(|e| self.infer_expr(e));
            fields.insert(name.clone(), declared.or(inferred).unwrap_or(Type::Any));
        }

        let mut methods = AHashMap::new();
        for method in &decl.methods {
            methods.insert(method.name.clone(), self.declare_function_type(method));
        }

        let simple = SimpleType {
            name: decl.name.clone(),
            fields,
            methods,
            generics: Vec::new(),
            super_type: super_type.map(|s| Box::new(Type::Simple(s))),
        };
        self.classes.insert(decl.name.clone(), simple.clone());
        self.env.define(decl.name.clone(), Type::Simple(simple.clone()));

        for method in &decl.methods {
            self.check_function_body(method, Some(Type::Simple(simple.clone())));
            self.this_stack.pop();
        }
    }

    fn resolve_type(&mut self, type_expr: &TypeExpr) -> Type {
        match type_expr {
            TypeExpr::Simple { name, generics } => {
                let base = self.env.type_defs.get(name).cloned().or_else(|| self.classes.get(name).cloned().map(Type::Simple));
                let Some(base) = base else {
                    self.error(0, format!("Unknown type `{name}`"));
                    return Type::Any;
                };
                if generics.is_empty() {
                    base
                } else {
                    let args = generics.iter().map(|g| self.resolve_type(g)).collect();
                    Type::Generic(GenericType { target: Box::new(base), args })
                }
            }
            TypeExpr::Functor { args, ret, .. } => {
                let args = args.iter().map(|a| self.resolve_type(a)).collect();
                let ret = Box::new(self.resolve_type(ret));
                Type::Functor(FunctorType { args, generics: Vec::new(), ret })
            }
            TypeExpr::Union { left, right } => Type::Union(Box::new(self.resolve_type(left)), Box::new(self.resolve_type(right))),
            TypeExpr::Interface { extends, fields, methods, generics, .. } => {
                let super_type = extends.as_ref().map(|name| Box::new(self.env.type_defs.get(name).cloned().unwrap_or(Type::Any)));
                let fields = fields.iter().map(|(n, t)| (n.clone(), self.resolve_type(t))).collect();
                let methods = methods.iter().map(|(n, t)| (n.clone(), self.resolve_type(t))).collect();
                Type::Interface(InterfaceType { fields, methods, super_type, generics: generics.clone() })
            }
            TypeExpr::Declaration { target, .. } => self.resolve_type(target),
        }
    }

    fn infer_expr(&mut self, expr: &Expr) -> Type {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Literal(lit) => literal_type(lit),
            ExprKind::Grouping(inner) => self.infer_expr(inner),
            ExprKind::Unary { op, right } => {
                let right_ty = self.infer_expr(right);
                match op {
                    UnaryOp::Negate => {
                        if !is_subtype(&right_ty, &Type::simple("Number")) {
                            self.error(line, format!("Cannot negate a value of type `{}`", right_ty.name()));
                        }
                        Type::simple("Number")
                    }
                    UnaryOp::Not => Type::simple("Bool"),
                }
            }
            ExprKind::Binary { left, op, right } => self.infer_binary(left, *op, right, line),
            ExprKind::Logical { left, op: _, right } => {
                self.infer_expr(left);
                self.infer_expr(right);
                Type::simple("Bool")
            }
            ExprKind::Variable { name } => self.env.get(name).cloned().unwrap_or_else(|| {
                self.error(line, format!("Undefined variable `{name}`"));
                Type::Any
            }),
            ExprKind::Assign { target, value } => {
                let value_ty = self.infer_expr(value);
                self.check_assign_target(target, &value_ty, line);
                value_ty
            }
            ExprKind::Call { callee, args } => self.infer_call(callee, args, line),
            ExprKind::GetItem { object, index } => {
                let object_ty = self.infer_expr(object);
                self.infer_expr(index);
                match &object_ty {
                    Type::Generic(g) if g.target.name() == "List" => g.args.first().cloned().unwrap_or(Type::Any),
                    Type::Generic(g) if g.target.name() == "Map" => g.args.get(1).cloned().unwrap_or(Type::Any),
                    _ => Type::Any,
                }
            }
            ExprKind::GetProperty { object, name } => {
                let object_ty = self.infer_expr(object);
                self.lookup_member(&object_ty, name, line)
            }
            ExprKind::Super { method } => {
                if let Some(Type::Simple(this_ty)) = self.this_stack.last() {
                    if let Some(Type::Simple(super_ty)) = this_ty.super_type.as_deref() {
                        if let Some(ty) = super_ty.methods.get(method) {
                            return ty.clone();
                        }
                    }
                }
                self.error(line, format!("No superclass method `{method}`"));
                Type::Any
            }
            ExprKind::This => self.this_stack.last().cloned().unwrap_or_else(|| {
                self.error(line, "'this' used outside a method");
                Type::Any
            }),
            ExprKind::Yield { value } => {
                self.infer_expr(value);
                Type::Any
            }
            ExprKind::Lambda { params, return_type, body } => {
                let decl = FunctionDecl { name: "<lambda>".into(), params: params.clone(), return_type: return_type.clone(), body: body.clone() };
                let functor = self.declare_function_type(&decl);
                self.check_function_body(&decl, None);
                functor
            }
            ExprKind::List(items) => {
                let elem = items.first().map_or(Type::Any, |first| self.infer_expr(first));
                for item in items.iter().skip(1) {
                    self.infer_expr(item);
                }
                Type::Generic(GenericType { target: Box::new(Type::simple("List")), args: vec![elem] })
            }
            ExprKind::Map(entries) => {
                let (key, value) = entries.first().map_or((Type::Any, Type::Any), |(k, v)| (self.infer_expr(k), self.infer_expr(v)));
                for (k, v) in entries.iter().skip(1) {
                    self.infer_expr(k);
                    self.infer_expr(v);
                }
                Type::Generic(GenericType { target: Box::new(Type::simple("Map")), args: vec![key, value] })
            }
        }
    }

    fn infer_binary(&mut self, left: &Expr, op: BinaryOp, right: &Expr, line: u32) -> Type {
        let left_ty = self.infer_expr(left);
        let right_ty = self.infer_expr(right);
        match op {
            BinaryOp::Add => {
                let string = Type::simple("String");
                let number = Type::simple("Number");
                if is_subtype(&left_ty, &string) && is_subtype(&right_ty, &string) {
                    return string;
                }
                if !is_subtype(&left_ty, &number) || !is_subtype(&right_ty, &number) {
                    self.error(line, format!("Cannot add `{}` and `{}`", left_ty.name(), right_ty.name()));
                }
                number
            }
            BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide => {
                let number = Type::simple("Number");
                if !is_subtype(&left_ty, &number) || !is_subtype(&right_ty, &number) {
                    self.error(line, format!("Expected `Number` operands, found `{}` and `{}`", left_ty.name(), right_ty.name()));
                }
                number
            }
            BinaryOp::Greater | BinaryOp::GreaterEqual | BinaryOp::Less | BinaryOp::LessEqual => {
                let number = Type::simple("Number");
                if !is_subtype(&left_ty, &number) || !is_subtype(&right_ty, &number) {
                    self.error(line, format!("Cannot compare `{}` and `{}`", left_ty.name(), right_ty.name()));
                }
                Type::simple("Bool")
            }
            BinaryOp::Equal | BinaryOp::NotEqual => Type::simple("Bool"),
        }
    }

    fn infer_call(&mut self, callee: &Expr, args: &[Expr], line: u32) -> Type {
        let callee_ty = self.infer_expr(callee);
        let arg_types: Vec<_> = args.iter().map(|a| self.infer_expr(a)).collect();
        match &callee_ty {
            Type::Functor(functor) => {
                self.check_call_args(&functor.args, &arg_types, line);
                (*functor.ret).clone()
            }
            Type::Simple(class) => {
                if let Some(Type::Functor(init)) = class.methods.get("init") {
                    self.check_call_args(&init.args, &arg_types, line);
                }
                callee_ty.clone()
            }
            Type::Any => Type::Any,
            other => {
                self.error(line, format!("`{}` is not callable", other.name()));
                Type::Any
            }
        }
    }

    fn check_call_args(&mut self, expected: &[Type], actual: &[Type], line: u32) {
        if expected.len() != actual.len() {
            self.error(line, format!("Expected {} argument(s), found {}", expected.len(), actual.len()));
            return;
        }
        for (expected, actual) in expected.iter().zip(actual) {
            if !is_subtype(actual, expected) {
                self.error(line, format!("Expected argument of type `{}`, found `{}`", expected.name(), actual.name()));
            }
        }
    }

    fn lookup_member(&mut self, object_ty: &Type, name: &str, line: u32) -> Type {
        match object_ty {
            Type::Simple(_) => self.lookup_on_simple(object_ty, name, line),
            Type::Interface(interface) => interface.fields.get(name).or_else(|| interface.methods.get(name)).cloned().unwrap_or_else(|| {
                self.error(line, format!("`{}` has no property `{name}`", object_ty.name()));
                Type::Any
            }),
            Type::Any => Type::Any,
            _ => {
                self.error(line, format!("`{}` has no property `{name}`", object_ty.name()));
                Type::Any
            }
        }
    }

    fn lookup_on_simple(&mut self, object_ty: &Type, name: &str, line: u32) -> Type {
        let mut current = object_ty.clone();
        loop {
            let Type::Simple(simple) = &current else { break };
            if let Some(ty) = simple.fields.get(name).or_else(|| simple.methods.get(name)) {
                return ty.clone();
            }
            match &simple.super_type {
                Some(next) => current = (**next).clone(),
                None => break,
            }
        }
        self.error(line, format!("`{}` has no property `{name}`", object_ty.name()));
        Type::Any
    }

    fn check_assign_target(&mut self, target: &Expr, value_ty: &Type, line: u32) {
        match &target.kind {
            ExprKind::Variable { name } => {
                if let Some(declared) = self.env.get(name).cloned() {
                    if !is_subtype(value_ty, &declared) {
                        self.error(line, format!("Cannot assign `{}` to `{name}` of type `{}`", value_ty.name(), declared.name()));
                    }
                } else {
                    self.error(line, format!("Undefined variable `{name}`"));
                }
            }
            ExprKind::GetProperty { object, name } => {
                let object_ty = self.infer_expr(object);
                let field_ty = self.lookup_member(&object_ty, name, line);
                if !matches!(field_ty, Type::Any) && !is_subtype(value_ty, &field_ty) {
                    self.error(line, format!("Cannot assign `{}` to field `{name}` of type `{}`", value_ty.name(), field_ty.name()));
                }
            }
            ExprKind::GetItem { object, index } => {
                self.infer_expr(object);
                self.infer_expr(index);
            }
            _ => {}
        }
    }
}

fn literal_type(lit: &Literal) -> Type {
    match lit {
        Literal::Number(_) => Type::simple("Number"),
        Literal::String(_) => Type::simple("String"),
        Literal::Atom(_) => Type::simple("Atom"),
        Literal::Bool(_) => Type::simple("Bool"),
        Literal::Nil => Type::simple("Nil"),
    }
}

fn native_variadic() -> Type {
    Type::Functor(FunctorType { args: Vec::new(), generics: Vec::new(), ret: Box::new(Type::simple("Nil")) })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn diagnostics(source: &str) -> Vec<TypeDiagnostic> {
        let statements = saffron::parse(source).expect("parses");
        check(&statements)
    }

    #[test]
    fn well_typed_function_produces_no_diagnostics() {
        let diags = diagnostics("fun add(x: Number, y: Number): Number { return x + y; } var r = add(1, 2);");
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }

    #[test]
    fn wrong_argument_type_is_reported() {
        let diags = diagnostics("fun add(x: Number, y: Number): Number { return x + y; } var r = add(1, \"two\");");
        assert_eq!(diags.len(), 1, "unexpected diagnostics: {diags:?}");
    }

    #[test]
    fn assigning_incompatible_declared_type_is_reported() {
        let diags = diagnostics("var x: Number = \"not a number\";");
        assert!(diags.iter().any(|d| d.message.contains("Cannot assign")));
    }

    #[test]
    fn undefined_variable_is_reported() {
        let diags = diagnostics("print(nonexistent);");
        assert!(diags.iter().any(|d| d.message.contains("Undefined variable")));
    }

    #[test]
    fn class_field_access_type_checks_structurally() {
        let diags = diagnostics(
            "class Dog { var name: String = \"Rex\"; bark(): String { return this.name; } } var d = Dog(); var n: String = d.name;",
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }

    #[test]
    fn unknown_field_access_is_reported() {
        let diags = diagnostics("class Dog { var name: String = \"Rex\"; } var d = Dog(); print(d.nonexistent);");
        assert!(diags.iter().any(|d| d.message.contains("no property")));
    }
}
