//! Error types (§7). Grounded on `ouros::exception_private`'s
//! `Result<T, RunError>` shape and `strum`-derived `Display` on small fixed
//! enums, scoped down to spec.md §7's three-class model (compile-time
//! scan/parse/type errors, runtime errors, and the `InterpretResult`
//! envelope that wraps either) instead of Python's exception hierarchy.

use std::fmt;

use strum::Display;

use crate::value::Value;

/// A single scan, parse, or type-check diagnostic (§7: "the checker emits
/// diagnostics but does not abort compilation — it keeps checking after the
/// first error"). The CLI reports every one collected during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub line: u32,
    pub message: String,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error: {}", self.line, self.message)
    }
}

impl std::error::Error for CompileError {}

/// One frame of a runtime error's backtrace, built by walking
/// `CallFrame::parent` links (§7).
#[derive(Debug, Clone, PartialEq)]
pub struct BacktraceFrame {
    pub function_name: String,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RuntimeErrorKind {
    TypeError,
    NameError,
    IndexError,
    KeyError,
    StackOverflow,
    ArityMismatch,
    ResourceExceeded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    pub backtrace: Vec<BacktraceFrame>,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.kind, self.message)?;
        for frame in &self.backtrace {
            writeln!(f, "  at {} (line {})", frame.function_name, frame.line)?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

/// The top-level result of running a program (§7's `InterpretResult`
/// contract, extended with the `Ok` payload the reference's bare enum
/// doesn't carry since Saffron's public API returns the script's result
/// value, not just a status code).
#[derive(Debug)]
pub enum InterpretResult {
    Ok(Value),
    CompileError(Vec<CompileError>),
    RuntimeError(RuntimeError),
}
