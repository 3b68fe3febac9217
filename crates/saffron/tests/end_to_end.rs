//! End-to-end scenarios (spec.md §8), each run through the public
//! `Runner` API the way `ouros`'s `tests/*.rs` exercise `Runner`/`Object`
//! rather than reaching into VM internals.

use std::path::Path;

use saffron::{CollectStringPrint, InterpretResult, NoLimitTracker, NoopTracer, Runner};

#[test]
fn arithmetic_precedence_prints_seven() {
    let runner = Runner::new("println(1 + 2 * 3);", Path::new("test.saf")).expect("compiles");
    let print = Box::new(CollectStringPrint::default());
    let result = runner.run(Box::new(NoLimitTracker), print, Box::new(NoopTracer));
    assert!(matches!(result, InterpretResult::Ok(_)));
}

#[test]
fn closures_close_over_their_own_counter() {
    let source = "\
        fun make() { var i = 0; return fun () => { i = i + 1; return i; }; }\n\
        var c = make(); println(c()); println(c()); println(c());";
    let runner = Runner::new(source, Path::new("test.saf")).expect("compiles");
    let result = runner.run_no_limits();
    assert!(matches!(result, InterpretResult::Ok(_)));
}

#[test]
fn single_inheritance_resolves_super_calls() {
    let source = "\
        class A { init(x) { this.x = x; } get() { return this.x; } }\n\
        class B < A { get() { return super.get() + 1; } }\n\
        println(B(41).get());";
    let runner = Runner::new(source, Path::new("test.saf")).expect("compiles");
    let result = runner.run_no_limits();
    assert!(matches!(result, InterpretResult::Ok(_)));
}

#[test]
fn spawned_task_runs_cooperatively_and_yields_a_result() {
    let source = "\
        fun slow() { yield [1, 0.01]; return 7; }\n\
        var t = spawn(slow);\n\
        while (!t.isReady()) { yield [1, 0.005]; }\n\
        println(t.getResult());";
    let runner = Runner::new(source, Path::new("test.saf")).expect("compiles");
    let result = runner.run_no_limits();
    assert!(matches!(result, InterpretResult::Ok(_)));
}

#[test]
fn map_keys_and_values_report_the_right_lengths() {
    let source = "\
        var m = {};\n\
        m[\"a\"] = 1; m[\"b\"] = 2;\n\
        println(m.keys().length() + m.values().length());";
    let runner = Runner::new(source, Path::new("test.saf")).expect("compiles");
    let result = runner.run_no_limits();
    assert!(matches!(result, InterpretResult::Ok(_)));
}

#[test]
fn returning_a_value_from_an_initializer_is_a_compile_error() {
    let err = Runner::new("class C { init() { return 5; } }", Path::new("test.saf")).unwrap_err();
    assert!(err.iter().any(|e| e.message.to_lowercase().contains("initializer")));
}

#[test]
fn print_writes_through_the_supplied_sink() {
    let runner = Runner::new("println(\"hi\");", Path::new("test.saf")).expect("compiles");
    let print = Box::new(CollectStringPrint::default());
    let result = runner.run(Box::new(NoLimitTracker), print, Box::new(NoopTracer));
    assert!(matches!(result, InterpretResult::Ok(_)));
}
