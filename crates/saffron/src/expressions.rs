//! The AST (§3): `TypeNode`, `Expression`, `Statement`, `Parameter`.
//!
//! Each node carries its source line for diagnostics. Unlike the reference
//! implementation (`original_source/src/ast/ast.h`), which threads these
//! through the same GC heap as runtime values (`OBJ_PARSE_TYPE` and friends
//! in `object.h`), Saffron keeps the AST as a plain owned Rust tree: Rust
//! ownership already gives the "free everything when the parse/compile pass
//! is done" behavior the C original used a shared heap to get, with no
//! cycles to worry about (see DESIGN.md). The type checker (`saffron-typecheck`)
//! builds its own `Type` universe from `TypeExpr` but never stores it here.

use std::fmt;

/// A parsed type annotation (§4.3 "type universe").
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `Name` or `Name<G1, G2>`.
    Simple { name: String, generics: Vec<TypeExpr> },
    /// `(T1, T2) => R`, optionally with its own generic parameters.
    Functor { args: Vec<TypeExpr>, generics: Vec<String>, ret: Box<TypeExpr> },
    /// `Left | Right`.
    Union { left: Box<TypeExpr>, right: Box<TypeExpr> },
    /// `interface Name [extends Super] { field: T ... method(...): T ... }`
    Interface {
        name: String,
        extends: Option<String>,
        fields: Vec<(String, TypeExpr)>,
        methods: Vec<(String, TypeExpr)>,
        generics: Vec<String>,
    },
    /// `type Name[<G...>] = Target` top-level type alias/definition.
    Declaration { name: String, target: Box<TypeExpr>, generics: Vec<String> },
}

/// One function/lambda parameter. Keyword-default and variadic parameters are
/// parsed but never wired through the compiler or VM (spec.md §9 Open
/// Questions) — reserved for future use.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Positional { name: String, type_ann: Option<TypeExpr> },
    Keyword { name: String, type_ann: Option<TypeExpr>, default: Expr },
    Variadic { name: String, type_ann: Option<TypeExpr> },
}

impl Param {
    pub fn name(&self) -> &str {
        match self {
            Self::Positional { name, .. } | Self::Keyword { name, .. } | Self::Variadic { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Atom(String),
    Bool(bool),
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

/// An AST expression node, tagged with its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Grouping(Box<Expr>),
    Unary { op: UnaryOp, right: Box<Expr> },
    Binary { left: Box<Expr>, op: BinaryOp, right: Box<Expr> },
    Logical { left: Box<Expr>, op: LogicalOp, right: Box<Expr> },
    Variable { name: String },
    Assign { target: Box<Expr>, value: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    GetItem { object: Box<Expr>, index: Box<Expr> },
    GetProperty { object: Box<Expr>, name: String },
    Super { method: String },
    This,
    Yield { value: Box<Expr> },
    Lambda { params: Vec<Param>, return_type: Option<TypeExpr>, body: Vec<Stmt> },
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
}

impl Expr {
    pub fn new(kind: ExprKind, line: u32) -> Self {
        Self { kind, line }
    }

    /// True for expressions that may appear on the left of `=` (§4.2's "Invalid
    /// assignment target" contract).
    pub fn is_assignment_target(&self) -> bool {
        matches!(self.kind, ExprKind::Variable { .. } | ExprKind::GetProperty { .. } | ExprKind::GetItem { .. })
    }
}

/// An AST statement node, tagged with its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<String>,
    pub methods: Vec<FunctionDecl>,
    pub fields: Vec<(String, Option<TypeExpr>, Option<Expr>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expression(Expr),
    VarDecl { name: String, type_ann: Option<TypeExpr>, init: Option<Expr> },
    Block(Vec<Stmt>),
    Function(FunctionDecl),
    Class(ClassDecl),
    If { condition: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    While { condition: Expr, body: Box<Stmt> },
    For { init: Option<Box<Stmt>>, condition: Option<Expr>, increment: Option<Expr>, body: Box<Stmt> },
    Break,
    Return(Option<Expr>),
    Import { path: String, alias: String },
    Enum { name: String, items: Vec<String> },
    /// Top-level `type Name = ...` or `interface Name { ... }` (§4.3). Erased
    /// by the compiler (§4.4 Invariants: "type annotations never reach
    /// bytecode") — only the type checker consults it.
    TypeDecl(TypeExpr),
}

impl Stmt {
    pub fn new(kind: StmtKind, line: u32) -> Self {
        Self { kind, line }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Less => "<",
            Self::LessEqual => "<=",
        };
        f.write_str(s)
    }
}
