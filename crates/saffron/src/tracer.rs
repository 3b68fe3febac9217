//! VM execution tracing (§6 Logging/tracing). Grounded on
//! `ouros::tracer::VmTracer`: a trait-based hook system with a [`NoopTracer`]
//! that monomorphizes away to nothing, and a [`StderrTracer`] that prints a
//! human-readable log. Trimmed from `ouros::tracer`'s five tracer
//! implementations (profiling/coverage/recording are Python-workload
//! debugging tools outside this scope) down to the two every embedder
//! actually reaches for: silence, and a debug log.

use crate::{bytecode::OpCode, heap::HeapId};

/// Hook points the VM dispatch loop and scheduler call into. Default method
/// bodies are no-ops, so a tracer only needs to override the events it
/// cares about.
pub trait VmTracer {
    fn on_instruction(&mut self, _ip: usize, _opcode: OpCode) {}
    fn on_call(&mut self, _function_name: Option<&str>, _depth: usize) {}
    fn on_return(&mut self, _depth: usize) {}
    fn on_yield(&mut self, _task: HeapId) {}
    fn on_gc(&mut self, _freed: usize, _live: usize) {}
}

/// Zero-overhead default: every hook call inlines to nothing (matches
/// `ouros::tracer::NoopTracer`'s rationale).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

/// Prints one line per event to stderr. This is Saffron's whole
/// "structured logging" story — `ouros` itself has no `log`/`tracing`
/// dependency either, so there is no ecosystem logging crate in scope to
/// reach for instead.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl VmTracer for StderrTracer {
    fn on_instruction(&mut self, ip: usize, opcode: OpCode) {
        eprintln!("ip={ip:04} {opcode}");
    }

    fn on_call(&mut self, function_name: Option<&str>, depth: usize) {
        eprintln!("call {} depth={depth}", function_name.unwrap_or("<script>"));
    }

    fn on_return(&mut self, depth: usize) {
        eprintln!("return depth={depth}");
    }

    fn on_yield(&mut self, task: HeapId) {
        eprintln!("yield task={task:?}");
    }

    fn on_gc(&mut self, freed: usize, live: usize) {
        eprintln!("gc freed={freed} live={live}");
    }
}
