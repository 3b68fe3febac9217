//! The `saffron` binary (§6): `saffron <path>` runs a file, `saffron` with
//! no arguments opens a REPL. Grounded on `ouros-cli`'s split between file
//! execution and interactive use, trimmed to Saffron's simpler
//! parse/typecheck/run pipeline (no external-function-call protocol to
//! drive from the CLI).

mod repl;

use std::{env, fs, path::Path, process::ExitCode};

use saffron::{InterpretResult, Runner};

/// Usage error (wrong number of arguments), per §6.
const EXIT_USAGE: u8 = 64;
/// A scan, parse, or compile error was reported.
const EXIT_COMPILE_ERROR: u8 = 65;
/// The script raised an uncaught runtime error.
const EXIT_RUNTIME_ERROR: u8 = 70;
/// The script file could not be read.
const EXIT_IO_ERROR: u8 = 74;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    match args.len() {
        1 => {
            repl::run();
            ExitCode::SUCCESS
        }
        2 => run_file(Path::new(&args[1])),
        _ => {
            eprintln!("Usage: saffron [path]");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn run_file(path: &Path) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Error reading {}: {error}", path.display());
            return ExitCode::from(EXIT_IO_ERROR);
        }
    };

    let runner = match Runner::new(&source, path) {
        Ok(runner) => runner,
        Err(errors) => {
            for error in &errors {
                eprintln!("{error}");
            }
            return ExitCode::from(EXIT_COMPILE_ERROR);
        }
    };

    // Type-checker diagnostics are reported but never change the exit code
    // (§7: "the reference behavior still runs") — only a scan/parse/compile
    // failure or an uncaught runtime error does that. Re-parsing here is
    // wasted work next to compiling once inside `Runner::new`, but the
    // checker works over the AST, not the bytecode `Runner` produces, so
    // there is nothing to share between the two passes.
    if let Ok(statements) = saffron::parse(&source) {
        for diagnostic in saffron_typecheck::check(&statements) {
            eprintln!("warning: {diagnostic}");
        }
    }

    match runner.run_no_limits() {
        InterpretResult::Ok(_) => ExitCode::SUCCESS,
        InterpretResult::CompileError(errors) => {
            for error in &errors {
                eprintln!("{error}");
            }
            ExitCode::from(EXIT_COMPILE_ERROR)
        }
        InterpretResult::RuntimeError(error) => {
            eprintln!("{error}");
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}
