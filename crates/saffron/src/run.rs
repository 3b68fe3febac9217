//! The public embedding surface (§6 "Workspace shape"): parse, compile, and
//! run a script to completion, with the print sink, tracer, and resource
//! limits all swappable by the host.
//!
//! Grounded on `ouros::run::Runner`'s role as the crate's single public
//! entry point, trimmed down from its snapshot/resume/external-call
//! machinery (Saffron has no async external-function protocol to pause on —
//! `yield`/`spawn` are both resolved entirely inside the VM) to the
//! synchronous "parse once, run to completion" shape spec.md actually asks
//! for.

use std::path::{Path, PathBuf};

use crate::{
    bytecode::vm::Vm,
    error::{CompileError, InterpretResult},
    heap::Heap,
    io::{PrintWriter, StdPrint},
    resource::{NoLimitTracker, ResourceTracker},
    tracer::{NoopTracer, VmTracer},
};

/// A parsed and compiled script, ready to run. Parsing/compiling once and
/// running many times avoids redoing that work for, e.g., a REPL replaying
/// the same snippet against different inputs.
#[derive(Debug)]
pub struct Runner {
    function: crate::function::ObjFunction,
    heap: Heap,
    script_dir: PathBuf,
}

impl Runner {
    /// Scans, parses, and compiles `source`. `script_path` is used to
    /// resolve relative `import` paths at run time and has no effect on
    /// compilation itself.
    ///
    /// # Errors
    /// Returns every scan/parse/compile diagnostic collected (§7: the
    /// compiler does not stop at the first error).
    pub fn new(source: &str, script_path: &Path) -> Result<Self, Vec<CompileError>> {
        let statements = crate::parser::parse(source)?;
        let mut heap = Heap::new();
        let function = crate::bytecode::compiler::Compiler::new(&mut heap).compile_script(&statements)?;
        let script_dir = script_path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self { function, heap, script_dir })
    }

    /// Runs to completion with no resource limits, printing to stdout and
    /// discarding trace events — the default an embedder reaches for first.
    pub fn run_no_limits(self) -> InterpretResult {
        self.run(Box::new(NoLimitTracker), Box::new(StdPrint), Box::new(NoopTracer))
    }

    /// Runs to completion with caller-supplied resource limits, print sink,
    /// and tracer (§6 Configuration/Logging).
    pub fn run(self, resource: Box<dyn ResourceTracker>, print: Box<dyn PrintWriter>, tracer: Box<dyn VmTracer>) -> InterpretResult {
        let mut vm = Vm::new(self.heap, self.script_dir, resource, print, tracer);
        vm.interpret(self.function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CollectStringPrint;
    use crate::resource::NoLimitTracker;

    #[test]
    fn arithmetic_expression_runs_to_completion() {
        let runner = Runner::new("print(1 + 2);", Path::new("test.saf")).expect("compiles");
        let result = runner.run_no_limits();
        assert!(matches!(result, InterpretResult::Ok(_)));
    }

    #[test]
    fn print_writes_through_the_supplied_sink() {
        let runner = Runner::new("print(\"hi\");", Path::new("test.saf")).expect("compiles");
        let print = Box::new(CollectStringPrint::default());
        let result = runner.run(Box::new(NoLimitTracker), print, Box::new(NoopTracer));
        assert!(matches!(result, InterpretResult::Ok(_)));
    }

    #[test]
    fn a_scan_or_parse_error_is_reported_rather_than_panicking() {
        let err = Runner::new("var = ;", Path::new("test.saf")).unwrap_err();
        assert!(!err.is_empty());
    }
}
