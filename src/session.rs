//! Batch and interactive session loops
//!
//! Both modes drain the microtask queue after every top-level unit, before the
//! next unit is loaded, so continuations of different units never interleave.

use std::borrow::Cow;
use std::io::BufRead;

use tracing::{info, warn};

use crate::interpreter::constants::SHELL_ORIGIN;
use crate::interpreter::engine::Interpreter;

/// Run each named source in order.
///
/// A source that cannot be loaded is reported and skipped. The first unit that
/// fails (including its microtasks) stops the batch. Returns the process exit
/// status.
pub fn run_batch<S: AsRef<str>>(interpreter: &mut Interpreter, files: &[S]) -> i32 {
    for name in files {
        let name = name.as_ref();
        let source = match interpreter.load_source(name) {
            Ok(source) => source,
            Err(err) => {
                warn!(name, error = %err, "skipping unreadable source");
                interpreter
                    .console_mut()
                    .err(&format!("Error reading '{}'\n", name));
                continue;
            }
        };

        let executed = interpreter.execute(&source, name, false, true);
        let drained = interpreter.run_microtasks();
        if !(executed && drained) {
            info!(name, "batch stopped at failing unit");
            return 1;
        }
    }
    0
}

/// Read-eval-print until end of input. Failures are reported and the loop
/// continues; the exit status is always 0.
///
/// The banner and prompts go to the error stream, so the output stream only
/// carries what scripts print. Bytes that are not valid UTF-8 are replaced.
pub fn run_interactive<R: BufRead>(interpreter: &mut Interpreter, mut input: R) -> i32 {
    let max_line_length = interpreter.config().max_line_length;
    interpreter
        .console_mut()
        .err(&format!("Welcome to Spectre {}\n", crate::VERSION));

    let mut buffer = Vec::new();
    loop {
        interpreter.console_mut().err("> ");

        buffer.clear();
        match input.read_until(b'\n', &mut buffer) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "stopped reading input");
                break;
            }
        }

        let line = decode_line(&buffer);
        let line = truncate_line(line, max_line_length);
        interpreter.execute(&line, SHELL_ORIGIN, true, true);
        interpreter.run_microtasks();
    }

    interpreter.console_mut().err("\n");
    0
}

/// One input line without its terminator
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(line) => line.to_string(),
        Cow::Owned(line) => {
            warn!("replaced invalid UTF-8 in interactive line");
            line
        }
    }
}

/// Cut a line down to `max` characters
fn truncate_line(line: String, max: usize) -> String {
    match line.char_indices().nth(max) {
        Some((cut, _)) => {
            warn!(max, length = line.chars().count(), "interactive line truncated");
            line[..cut].to_string()
        }
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_line() {
        assert_eq!(truncate_line("abcdef".to_string(), 3), "abc");
        assert_eq!(truncate_line("abc".to_string(), 3), "abc");
        assert_eq!(truncate_line("héllo".to_string(), 2), "hé");
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"1 + 1\n"), "1 + 1");
        assert_eq!(decode_line(b"x\r\n"), "x");
        assert_eq!(decode_line(b"last"), "last");
        assert_eq!(decode_line(b"\"\xff\"\n"), "\"\u{fffd}\"");
    }
}
