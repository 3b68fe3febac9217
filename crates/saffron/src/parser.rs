//! Token stream -> AST (§4.2).
//!
//! Grounded on `original_source/src/parser.c`'s Pratt-style `rules[]` table
//! (`(prefix, infix, precedence)` triples keyed on the leading/infix token),
//! kept here as a single `precedence_of`/`parse_precedence` pair over an
//! explicit enum instead of a global function-pointer table. Statement
//! dispatch mirrors `compiler.c`'s `declaration`/`statement` split, including
//! `synchronize()`'s panic-mode recovery so one file can report every parse
//! error it contains (§7) rather than stopping at the first.

use crate::{
    error::CompileError,
    expressions::{
        BinaryOp, ClassDecl, Expr, ExprKind, FunctionDecl, Literal, LogicalOp, Param, Stmt, StmtKind, TypeExpr, UnaryOp,
    },
    scanner::tokenize,
    token::{Token, TokenKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    YieldPipe,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Self {
        match self {
            Self::None => Self::Assignment,
            Self::Assignment => Self::YieldPipe,
            Self::YieldPipe => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Equality,
            Self::Equality => Self::Comparison,
            Self::Comparison => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Unary,
            Self::Unary => Self::Call,
            Self::Call | Self::Primary => Self::Primary,
        }
    }
}

fn infix_precedence(kind: TokenKind) -> Precedence {
    use TokenKind::*;
    match kind {
        Equal => Precedence::Assignment,
        Pipe => Precedence::YieldPipe,
        Or => Precedence::Or,
        And => Precedence::And,
        EqualEqual | BangEqual => Precedence::Equality,
        Less | LessEqual | Greater | GreaterEqual => Precedence::Comparison,
        Plus | Minus => Precedence::Term,
        Star | Slash => Precedence::Factor,
        LeftParen | Dot | LeftBracket => Precedence::Call,
        _ => Precedence::None,
    }
}

/// Parses a whole program, returning every diagnostic collected rather than
/// stopping at the first (§7).
pub fn parse(source: &str) -> Result<Vec<Stmt>, Vec<CompileError>> {
    let tokens = tokenize(source);
    let mut parser = Parser::new(tokens);
    let mut statements = Vec::new();
    while !parser.check(TokenKind::Eof) {
        if let Some(stmt) = parser.declaration() {
            statements.push(stmt);
        }
    }
    if parser.errors.is_empty() {
        Ok(statements)
    } else {
        Err(parser.errors)
    }
}

struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    current: usize,
    errors: Vec<CompileError>,
    panic_mode: bool,
}

impl<'src> Parser<'src> {
    fn new(tokens: Vec<Token<'src>>) -> Self {
        Self { tokens, current: 0, errors: Vec::new(), panic_mode: false }
    }

    fn peek(&self) -> &Token<'src> {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token<'src> {
        &self.tokens[self.current - 1]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token<'src> {
        if !self.check(TokenKind::Eof) {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Token<'src> {
        if self.check(kind) {
            return self.advance();
        }
        self.error_at_current(message);
        self.previous().clone()
    }

    fn error_at_current(&mut self, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors.push(CompileError { line: self.peek().line, message: message.to_string() });
    }

    fn error(&mut self, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors.push(CompileError { line: self.previous().line, message: message.to_string() });
    }

    /// Panic-mode recovery (§4.2): skip ahead past the mess to the next
    /// statement boundary so later errors in the file are still found.
    fn synchronize(&mut self) {
        self.panic_mode = false;
        while !self.check(TokenKind::Eof) {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return
                | TokenKind::Import => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ---- statements ----

    fn declaration(&mut self) -> Option<Stmt> {
        let stmt = if self.matches(TokenKind::Class) {
            self.class_declaration()
        } else if self.matches(TokenKind::Fun) {
            self.function_declaration()
        } else if self.matches(TokenKind::Var) {
            self.var_declaration()
        } else if self.matches(TokenKind::Import) {
            self.import_statement()
        } else if self.matches(TokenKind::Enum) {
            self.enum_declaration()
        } else if self.matches(TokenKind::Type) || self.matches(TokenKind::Interface) {
            self.type_declaration()
        } else {
            self.statement()
        };
        if self.panic_mode {
            self.synchronize();
        }
        stmt
    }

    fn block(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            if let Some(stmt) = self.declaration() {
                stmts.push(stmt);
            }
        }
        self.consume(TokenKind::RightBrace, "Expected '}' after block.");
        stmts
    }

    fn var_declaration(&mut self) -> Option<Stmt> {
        let line = self.previous().line;
        let name = self.consume(TokenKind::Identifier, "Expected variable name.").lexeme.to_string();
        let type_ann = if self.matches(TokenKind::Colon) { Some(self.parse_type()) } else { None };
        let init = if self.matches(TokenKind::Equal) { Some(self.expression()) } else { None };
        self.consume(TokenKind::Semicolon, "Expected ';' after variable declaration.");
        Some(Stmt::new(StmtKind::VarDecl { name, type_ann, init }, line))
    }

    fn function_declaration(&mut self) -> Option<Stmt> {
        let line = self.previous().line;
        let decl = self.function_body("function")?;
        Some(Stmt::new(StmtKind::Function(decl), line))
    }

    fn function_body(&mut self, kind: &str) -> Option<FunctionDecl> {
        let name = self.consume(TokenKind::Identifier, &format!("Expected {kind} name.")).lexeme.to_string();
        let (params, return_type, body) = self.function_tail();
        Some(FunctionDecl { name, params, return_type, body })
    }

    /// Parses `(params) [: ReturnType] { body }`, shared by named functions,
    /// methods, and `fun` lambdas.
    fn function_tail(&mut self) -> (Vec<Param>, Option<TypeExpr>, Vec<Stmt>) {
        self.consume(TokenKind::LeftParen, "Expected '(' after name.");
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                params.push(self.parameter());
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expected ')' after parameters.");
        let return_type = if self.matches(TokenKind::Colon) { Some(self.parse_type()) } else { None };
        self.consume(TokenKind::LeftBrace, "Expected '{' before body.");
        let body = self.block();
        (params, return_type, body)
    }

    fn parameter(&mut self) -> Param {
        if self.matches(TokenKind::Dot) {
            // `...rest` variadic tail parameter.
            self.consume(TokenKind::Dot, "Expected '...' for variadic parameter.");
            self.consume(TokenKind::Dot, "Expected '...' for variadic parameter.");
            let name = self.consume(TokenKind::Identifier, "Expected parameter name.").lexeme.to_string();
            let type_ann = if self.matches(TokenKind::Colon) { Some(self.parse_type()) } else { None };
            return Param::Variadic { name, type_ann };
        }
        let name = self.consume(TokenKind::Identifier, "Expected parameter name.").lexeme.to_string();
        let type_ann = if self.matches(TokenKind::Colon) { Some(self.parse_type()) } else { None };
        if self.matches(TokenKind::Equal) {
            let default = self.expression();
            Param::Keyword { name, type_ann, default }
        } else {
            Param::Positional { name, type_ann }
        }
    }

    fn class_declaration(&mut self) -> Option<Stmt> {
        let line = self.previous().line;
        let name = self.consume(TokenKind::Identifier, "Expected class name.").lexeme.to_string();
        let superclass = if self.matches(TokenKind::Extends) {
            Some(self.consume(TokenKind::Identifier, "Expected superclass name.").lexeme.to_string())
        } else {
            None
        };
        self.consume(TokenKind::LeftBrace, "Expected '{' before class body.");
        let mut methods = Vec::new();
        let mut fields = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            if self.matches(TokenKind::Var) {
                let field_name = self.consume(TokenKind::Identifier, "Expected field name.").lexeme.to_string();
                let type_ann = if self.matches(TokenKind::Colon) { Some(self.parse_type()) } else { None };
                let default = if self.matches(TokenKind::Equal) { Some(self.expression()) } else { None };
                self.consume(TokenKind::Semicolon, "Expected ';' after field declaration.");
                fields.push((field_name, type_ann, default));
            } else if let Some(decl) = self.function_body("method") {
                methods.push(decl);
            }
        }
        self.consume(TokenKind::RightBrace, "Expected '}' after class body.");
        Some(Stmt::new(StmtKind::Class(ClassDecl { name, superclass, methods, fields }), line))
    }

    fn import_statement(&mut self) -> Option<Stmt> {
        let line = self.previous().line;
        let path_token = self.consume(TokenKind::String, "Expected module path string.");
        let path = unescape_string(path_token.lexeme);
        let alias = if self.matches(TokenKind::As) {
            self.consume(TokenKind::Identifier, "Expected alias after 'as'.").lexeme.to_string()
        } else {
            default_alias(&path)
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after import.");
        Some(Stmt::new(StmtKind::Import { path, alias }, line))
    }

    fn enum_declaration(&mut self) -> Option<Stmt> {
        let line = self.previous().line;
        let name = self.consume(TokenKind::Identifier, "Expected enum name.").lexeme.to_string();
        self.consume(TokenKind::LeftBrace, "Expected '{' before enum body.");
        let mut items = Vec::new();
        if !self.check(TokenKind::RightBrace) {
            loop {
                items.push(self.consume(TokenKind::Identifier, "Expected enum variant name.").lexeme.to_string());
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBrace, "Expected '}' after enum body.");
        Some(Stmt::new(StmtKind::Enum { name, items }, line))
    }

    fn type_declaration(&mut self) -> Option<Stmt> {
        let line = self.previous().line;
        let was_interface = self.previous().kind == TokenKind::Interface;
        let type_expr = if was_interface { self.parse_interface_body() } else { self.parse_type_alias() };
        Some(Stmt::new(StmtKind::TypeDecl(type_expr), line))
    }

    fn parse_type_alias(&mut self) -> TypeExpr {
        let name = self.consume(TokenKind::Identifier, "Expected type name.").lexeme.to_string();
        let generics = self.parse_optional_generic_params();
        self.consume(TokenKind::Equal, "Expected '=' in type declaration.");
        let target = Box::new(self.parse_type());
        self.consume(TokenKind::Semicolon, "Expected ';' after type declaration.");
        TypeExpr::Declaration { name, target, generics }
    }

    fn parse_interface_body(&mut self) -> TypeExpr {
        let name = self.consume(TokenKind::Identifier, "Expected interface name.").lexeme.to_string();
        let generics = self.parse_optional_generic_params();
        let extends = if self.matches(TokenKind::Extends) {
            Some(self.consume(TokenKind::Identifier, "Expected interface name.").lexeme.to_string())
        } else {
            None
        };
        self.consume(TokenKind::LeftBrace, "Expected '{' before interface body.");
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            let member_name = self.consume(TokenKind::Identifier, "Expected member name.").lexeme.to_string();
            if self.check(TokenKind::LeftParen) {
                let (params, return_type, _) = self.function_signature_only();
                let arg_types = params.iter().map(|p| self.param_type_for_signature(p)).collect();
                let ret = Box::new(return_type.unwrap_or(TypeExpr::Simple { name: "Nil".into(), generics: Vec::new() }));
                methods.push((member_name, TypeExpr::Functor { args: arg_types, generics: Vec::new(), ret }));
            } else {
                self.consume(TokenKind::Colon, "Expected ':' after field name.");
                let field_type = self.parse_type();
                fields.push((member_name, field_type));
            }
            self.matches(TokenKind::Semicolon);
        }
        self.consume(TokenKind::RightBrace, "Expected '}' after interface body.");
        TypeExpr::Interface { name, extends, fields, methods, generics }
    }

    fn param_type_for_signature(&self, param: &Param) -> TypeExpr {
        match param {
            Param::Positional { type_ann, .. } | Param::Keyword { type_ann, .. } | Param::Variadic { type_ann, .. } => {
                type_ann.clone().unwrap_or(TypeExpr::Simple { name: "Any".into(), generics: Vec::new() })
            }
        }
    }

    /// Parses an interface method's `(params): Return` signature without a body.
    fn function_signature_only(&mut self) -> (Vec<Param>, Option<TypeExpr>, Vec<Stmt>) {
        self.consume(TokenKind::LeftParen, "Expected '(' after method name.");
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                params.push(self.parameter());
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expected ')' after parameters.");
        let return_type = if self.matches(TokenKind::Colon) { Some(self.parse_type()) } else { None };
        (params, return_type, Vec::new())
    }

    fn parse_optional_generic_params(&mut self) -> Vec<String> {
        if !self.matches(TokenKind::Less) {
            return Vec::new();
        }
        let mut generics = Vec::new();
        if !self.check(TokenKind::Greater) {
            loop {
                generics.push(self.consume(TokenKind::Identifier, "Expected generic parameter name.").lexeme.to_string());
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::Greater, "Expected '>' after generic parameters.");
        generics
    }

    /// Parses a type annotation: `Name`, `Name<G,...>`, `(T,...) => R`, or a
    /// `|`-separated union of any of those (§4.3's type universe).
    fn parse_type(&mut self) -> TypeExpr {
        let left = self.parse_type_atom();
        if self.matches(TokenKind::BitwiseOr) {
            let right = self.parse_type();
            return TypeExpr::Union { left: Box::new(left), right: Box::new(right) };
        }
        left
    }

    fn parse_type_atom(&mut self) -> TypeExpr {
        if self.matches(TokenKind::LeftParen) {
            let mut args = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    args.push(self.parse_type());
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightParen, "Expected ')' after functor argument types.");
            self.consume(TokenKind::Arrow, "Expected '=>' in functor type.");
            let ret = Box::new(self.parse_type());
            return TypeExpr::Functor { args, generics: Vec::new(), ret };
        }
        let name = self.consume(TokenKind::Identifier, "Expected type name.").lexeme.to_string();
        let mut generics = Vec::new();
        if self.matches(TokenKind::Less) {
            loop {
                generics.push(self.parse_type());
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
            self.consume(TokenKind::Greater, "Expected '>' after type arguments.");
        }
        TypeExpr::Simple { name, generics }
    }

    fn statement(&mut self) -> Option<Stmt> {
        if self.matches(TokenKind::If) {
            return self.if_statement();
        }
        if self.matches(TokenKind::While) {
            return self.while_statement();
        }
        if self.matches(TokenKind::For) {
            return self.for_statement();
        }
        if self.matches(TokenKind::Return) {
            return self.return_statement();
        }
        if self.matches(TokenKind::Break) {
            let line = self.previous().line;
            self.consume(TokenKind::Semicolon, "Expected ';' after 'break'.");
            return Some(Stmt::new(StmtKind::Break, line));
        }
        if self.matches(TokenKind::LeftBrace) {
            let line = self.previous().line;
            return Some(Stmt::new(StmtKind::Block(self.block()), line));
        }
        self.expression_statement()
    }

    fn if_statement(&mut self) -> Option<Stmt> {
        let line = self.previous().line;
        self.consume(TokenKind::LeftParen, "Expected '(' after 'if'.");
        let condition = self.expression();
        self.consume(TokenKind::RightParen, "Expected ')' after condition.");
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(TokenKind::Else) { Some(Box::new(self.statement()?)) } else { None };
        Some(Stmt::new(StmtKind::If { condition, then_branch, else_branch }, line))
    }

    fn while_statement(&mut self) -> Option<Stmt> {
        let line = self.previous().line;
        self.consume(TokenKind::LeftParen, "Expected '(' after 'while'.");
        let condition = self.expression();
        self.consume(TokenKind::RightParen, "Expected ')' after condition.");
        let body = Box::new(self.statement()?);
        Some(Stmt::new(StmtKind::While { condition, body }, line))
    }

    fn for_statement(&mut self) -> Option<Stmt> {
        let line = self.previous().line;
        self.consume(TokenKind::LeftParen, "Expected '(' after 'for'.");
        let init = if self.matches(TokenKind::Semicolon) {
            None
        } else if self.matches(TokenKind::Var) {
            self.var_declaration().map(Box::new)
        } else {
            self.expression_statement().map(Box::new)
        };
        let condition = if !self.check(TokenKind::Semicolon) { Some(self.expression()) } else { None };
        self.consume(TokenKind::Semicolon, "Expected ';' after loop condition.");
        let increment = if !self.check(TokenKind::RightParen) { Some(self.expression()) } else { None };
        self.consume(TokenKind::RightParen, "Expected ')' after for clauses.");
        let body = Box::new(self.statement()?);
        Some(Stmt::new(StmtKind::For { init, condition, increment, body }, line))
    }

    fn return_statement(&mut self) -> Option<Stmt> {
        let line = self.previous().line;
        let value = if self.check(TokenKind::Semicolon) { None } else { Some(self.expression()) };
        self.consume(TokenKind::Semicolon, "Expected ';' after return value.");
        Some(Stmt::new(StmtKind::Return(value), line))
    }

    fn expression_statement(&mut self) -> Option<Stmt> {
        let line = self.peek().line;
        let expr = self.expression();
        self.consume(TokenKind::Semicolon, "Expected ';' after expression.");
        Some(Stmt::new(StmtKind::Expression(expr), line))
    }

    // ---- expressions ----

    fn expression(&mut self) -> Expr {
        self.parse_precedence(Precedence::Assignment)
    }

    fn parse_precedence(&mut self, min_prec: Precedence) -> Expr {
        let mut expr = self.parse_prefix();
        while min_prec <= infix_precedence(self.peek().kind) {
            expr = self.parse_infix(expr);
        }
        expr
    }

    fn parse_prefix(&mut self) -> Expr {
        let token = self.advance();
        let line = token.line;
        match token.kind {
            TokenKind::LeftParen => {
                let inner = self.expression();
                self.consume(TokenKind::RightParen, "Expected ')' after expression.");
                Expr::new(ExprKind::Grouping(Box::new(inner)), line)
            }
            TokenKind::Minus => {
                let right = self.parse_precedence(Precedence::Unary);
                Expr::new(ExprKind::Unary { op: UnaryOp::Negate, right: Box::new(right) }, line)
            }
            TokenKind::Bang => {
                let right = self.parse_precedence(Precedence::Unary);
                Expr::new(ExprKind::Unary { op: UnaryOp::Not, right: Box::new(right) }, line)
            }
            TokenKind::Number => {
                let n = token.lexeme.parse::<f64>().unwrap_or(0.0);
                Expr::new(ExprKind::Literal(Literal::Number(n)), line)
            }
            TokenKind::String => Expr::new(ExprKind::Literal(Literal::String(unescape_string(token.lexeme))), line),
            TokenKind::Atom => Expr::new(ExprKind::Literal(Literal::Atom(token.lexeme[1..].to_string())), line),
            TokenKind::True => Expr::new(ExprKind::Literal(Literal::Bool(true)), line),
            TokenKind::False => Expr::new(ExprKind::Literal(Literal::Bool(false)), line),
            TokenKind::Nil => Expr::new(ExprKind::Literal(Literal::Nil), line),
            TokenKind::This => Expr::new(ExprKind::This, line),
            TokenKind::Super => {
                self.consume(TokenKind::Dot, "Expected '.' after 'super'.");
                let method = self.consume(TokenKind::Identifier, "Expected superclass method name.").lexeme.to_string();
                Expr::new(ExprKind::Super { method }, line)
            }
            TokenKind::Identifier => Expr::new(ExprKind::Variable { name: token.lexeme.to_string() }, line),
            TokenKind::Yield => {
                let value = self.parse_precedence(Precedence::YieldPipe.next());
                Expr::new(ExprKind::Yield { value: Box::new(value) }, line)
            }
            TokenKind::Fun => {
                let (params, return_type, body) = self.function_tail();
                Expr::new(ExprKind::Lambda { params, return_type, body }, line)
            }
            TokenKind::LeftBracket => self.finish_list(line),
            TokenKind::LeftBrace => self.finish_map(line),
            _ => {
                self.error("Expected expression.");
                Expr::new(ExprKind::Literal(Literal::Nil), line)
            }
        }
    }

    fn finish_list(&mut self, line: u32) -> Expr {
        let mut items = Vec::new();
        if !self.check(TokenKind::RightBracket) {
            loop {
                items.push(self.expression());
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBracket, "Expected ']' after list elements.");
        Expr::new(ExprKind::List(items), line)
    }

    fn finish_map(&mut self, line: u32) -> Expr {
        let mut entries = Vec::new();
        if !self.check(TokenKind::RightBrace) {
            loop {
                let key = self.expression();
                self.consume(TokenKind::Colon, "Expected ':' after map key.");
                let value = self.expression();
                entries.push((key, value));
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBrace, "Expected '}' after map entries.");
        Expr::new(ExprKind::Map(entries), line)
    }

    fn parse_infix(&mut self, left: Expr) -> Expr {
        let token = self.advance();
        let line = token.line;
        match token.kind {
            TokenKind::Equal => {
                let value = self.parse_precedence(Precedence::Assignment);
                if !left.is_assignment_target() {
                    self.error("Invalid assignment target.");
                    return left;
                }
                Expr::new(ExprKind::Assign { target: Box::new(left), value: Box::new(value) }, line)
            }
            TokenKind::Or => {
                let right = self.parse_precedence(Precedence::Or.next());
                Expr::new(ExprKind::Logical { left: Box::new(left), op: LogicalOp::Or, right: Box::new(right) }, line)
            }
            TokenKind::And => {
                let right = self.parse_precedence(Precedence::And.next());
                Expr::new(ExprKind::Logical { left: Box::new(left), op: LogicalOp::And, right: Box::new(right) }, line)
            }
            TokenKind::Pipe => {
                // `a |> f` is sugar for `f(a)`: thread `left` in as `f`'s
                // first argument (§4.2's pipe operator).
                let callee = self.parse_precedence(Precedence::YieldPipe.next());
                let mut args = vec![left];
                if let ExprKind::Call { callee: inner_callee, args: inner_args } = callee.kind {
                    args.extend(inner_args);
                    return Expr::new(ExprKind::Call { callee: inner_callee, args }, line);
                }
                Expr::new(ExprKind::Call { callee: Box::new(callee), args }, line)
            }
            TokenKind::BangEqual => self.binary(left, BinaryOp::NotEqual, Precedence::Equality, line),
            TokenKind::EqualEqual => self.binary(left, BinaryOp::Equal, Precedence::Equality, line),
            TokenKind::Less => self.binary(left, BinaryOp::Less, Precedence::Comparison, line),
            TokenKind::LessEqual => self.binary(left, BinaryOp::LessEqual, Precedence::Comparison, line),
            TokenKind::Greater => self.binary(left, BinaryOp::Greater, Precedence::Comparison, line),
            TokenKind::GreaterEqual => self.binary(left, BinaryOp::GreaterEqual, Precedence::Comparison, line),
            TokenKind::Plus => self.binary(left, BinaryOp::Add, Precedence::Term, line),
            TokenKind::Minus => self.binary(left, BinaryOp::Subtract, Precedence::Term, line),
            TokenKind::Star => self.binary(left, BinaryOp::Multiply, Precedence::Factor, line),
            TokenKind::Slash => self.binary(left, BinaryOp::Divide, Precedence::Factor, line),
            TokenKind::LeftParen => self.finish_call(left, line),
            TokenKind::Dot => {
                let name = self.consume(TokenKind::Identifier, "Expected property name after '.'.").lexeme.to_string();
                Expr::new(ExprKind::GetProperty { object: Box::new(left), name }, line)
            }
            TokenKind::LeftBracket => {
                let index = self.expression();
                self.consume(TokenKind::RightBracket, "Expected ']' after index.");
                Expr::new(ExprKind::GetItem { object: Box::new(left), index: Box::new(index) }, line)
            }
            _ => {
                self.error("Unexpected token in expression.");
                left
            }
        }
    }

    fn binary(&mut self, left: Expr, op: BinaryOp, prec: Precedence, line: u32) -> Expr {
        let right = self.parse_precedence(prec.next());
        Expr::new(ExprKind::Binary { left: Box::new(left), op, right: Box::new(right) }, line)
    }

    fn finish_call(&mut self, callee: Expr, line: u32) -> Expr {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                args.push(self.expression());
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expected ')' after arguments.");
        Expr::new(ExprKind::Call { callee: Box::new(callee), args }, line)
    }
}

/// Strips the surrounding quotes and resolves `\n \t \\ \"` escapes (§4.1
/// strings permit raw newlines; escapes are a usability addition not in the
/// reference scanner, which the parser resolves once per literal here).
fn unescape_string(lexeme: &str) -> String {
    let inner = &lexeme[1..lexeme.len().saturating_sub(1).max(1)];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// `import "lib/math";` without an explicit `as` binds under the file stem.
fn default_alias(path: &str) -> String {
    let stem = path.rsplit('/').next().unwrap_or(path);
    stem.strip_suffix(".saf").unwrap_or(stem).to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse_ok(source: &str) -> Vec<Stmt> {
        parse(source).unwrap_or_else(|errs| panic!("unexpected parse errors: {errs:?}"))
    }

    #[test]
    fn parses_arithmetic_with_correct_precedence() {
        let stmts = parse_ok("var x = 1 + 2 * 3;");
        match &stmts[0].kind {
            StmtKind::VarDecl { init: Some(expr), .. } => match &expr.kind {
                ExprKind::Binary { op: BinaryOp::Add, right, .. } => {
                    assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Multiply, .. }));
                }
                other => panic!("expected addition at the top, got {other:?}"),
            },
            other => panic!("expected a var decl with an initializer, got {other:?}"),
        }
    }

    #[test]
    fn parses_class_with_superclass_fields_and_init() {
        let stmts = parse_ok("class Dog extends Animal { var name = \"Rex\"; init() { this.name = \"Rex\"; } }");
        match &stmts[0].kind {
            StmtKind::Class(decl) => {
                assert_eq!(decl.superclass.as_deref(), Some("Animal"));
                assert_eq!(decl.fields.len(), 1);
                assert_eq!(decl.methods[0].name, "init");
            }
            other => panic!("expected a class declaration, got {other:?}"),
        }
    }

    #[test]
    fn parses_yield_of_a_sleep_request() {
        let stmts = parse_ok("fun slow() { yield [1, 0.01]; return 7; }");
        match &stmts[0].kind {
            StmtKind::Function(decl) => match &decl.body[0].kind {
                StmtKind::Expression(expr) => assert!(matches!(expr.kind, ExprKind::Yield { .. })),
                other => panic!("expected an expression statement, got {other:?}"),
            },
            other => panic!("expected a function declaration, got {other:?}"),
        }
    }

    #[test]
    fn pipe_threads_the_left_operand_as_the_first_argument() {
        let stmts = parse_ok("value |> transform(extra);");
        match &stmts[0].kind {
            StmtKind::Expression(expr) => match &expr.kind {
                ExprKind::Call { args, .. } => assert_eq!(args.len(), 2),
                other => panic!("expected a call, got {other:?}"),
            },
            other => panic!("expected an expression statement, got {other:?}"),
        }
    }

    #[test]
    fn import_without_alias_derives_one_from_the_path() {
        let stmts = parse_ok("import \"lib/math.saf\";");
        match &stmts[0].kind {
            StmtKind::Import { path, alias } => {
                assert_eq!(path, "lib/math.saf");
                assert_eq!(alias, "math");
            }
            other => panic!("expected an import statement, got {other:?}"),
        }
    }

    #[test]
    fn assigning_to_a_call_result_is_a_parse_error() {
        let errors = parse("f() = 1;").unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn recovers_after_an_error_to_report_later_ones_too() {
        let errors = parse("var = ; var also_bad = ;").unwrap_err();
        assert!(errors.len() >= 2);
    }

    #[test]
    fn enum_declaration_collects_its_variant_names() {
        let stmts = parse_ok("enum Color { Red, Green, Blue }");
        match &stmts[0].kind {
            StmtKind::Enum { items, .. } => assert_eq!(items, &["Red", "Green", "Blue"]),
            other => panic!("expected an enum declaration, got {other:?}"),
        }
    }
}
