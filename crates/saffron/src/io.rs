//! Output sinks for the `print`/`println` built-ins (§6). Grounded on
//! `ouros::io::PrintWriter`/`StdPrint`, trimmed to the two implementations
//! Saffron actually needs: real stdout, and an in-memory collector for
//! embedding/tests (`ouros::io::CollectStringPrint`'s counterpart).

use std::io::{self, Write as _};

/// Where `print`/`println` output goes. Swappable so an embedder (or a test)
/// can capture output instead of writing to the process's real stdout.
pub trait PrintWriter: std::fmt::Debug {
    fn write_str(&mut self, text: &str);
}

#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn write_str(&mut self, text: &str) {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        let _ = lock.write_all(text.as_bytes());
    }
}

/// Collects everything written to it into an in-memory buffer instead of
/// touching the real stdout (`ouros::io::CollectStringPrint`'s counterpart;
/// used by the integration tests under `tests/`).
#[derive(Debug, Default)]
pub struct CollectStringPrint {
    pub buffer: String,
}

impl PrintWriter for CollectStringPrint {
    fn write_str(&mut self, text: &str) {
        self.buffer.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn collect_string_print_accumulates_across_calls() {
        let mut writer = CollectStringPrint::default();
        writer.write_str("hello");
        writer.write_str(" world\n");
        assert_eq!(writer.buffer, "hello world\n");
    }
}
