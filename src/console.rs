//! Output channels
//!
//! Script output (`print`, `haunt`, printed results) goes to the standard output
//! channel; diagnostics (exception reports, the interactive banner) go to the
//! standard error channel. [`StdConsole`] writes to the process streams;
//! [`MockConsole`] records everything for tests.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

/// Destination for host output
pub trait Console {
    /// Write to the standard output channel
    fn out(&mut self, text: &str);
    /// Write to the diagnostic channel
    fn err(&mut self, text: &str);
}

/// Console backed by the process's stdout and stderr
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn out(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        // A closed pipe is not worth failing a script over
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn err(&mut self, text: &str) {
        let mut stderr = io::stderr().lock();
        let _ = stderr.write_all(text.as_bytes());
        let _ = stderr.flush();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Out,
    Err,
}

/// One write to the console, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleChunk {
    pub stream: Stream,
    pub text: String,
}

/// Mock console capturing output. Clones share the same buffer, so a test can
/// keep a handle while the interpreter owns another.
#[derive(Debug, Clone, Default)]
pub struct MockConsole {
    chunks: Rc<RefCell<Vec<ConsoleChunk>>>,
}

impl MockConsole {
    pub fn new() -> Self {
        MockConsole::default()
    }

    /// Everything written to the standard output channel
    pub fn stdout(&self) -> String {
        self.collect(Stream::Out)
    }

    /// Everything written to the diagnostic channel
    pub fn stderr(&self) -> String {
        self.collect(Stream::Err)
    }

    /// Lines written to one channel, without their terminators
    pub fn lines(&self, stream: Stream) -> Vec<String> {
        let text = self.collect(stream);
        let mut lines: Vec<String> = text.split('\n').map(|s| s.to_string()).collect();
        // Remove trailing empty string if text ended with newline
        if lines.last().is_some_and(|s| s.is_empty()) {
            lines.pop();
        }
        lines
    }

    pub fn chunks(&self) -> Vec<ConsoleChunk> {
        self.chunks.borrow().clone()
    }

    pub fn clear(&self) {
        self.chunks.borrow_mut().clear();
    }

    fn collect(&self, stream: Stream) -> String {
        self.chunks
            .borrow()
            .iter()
            .filter(|chunk| chunk.stream == stream)
            .map(|chunk| chunk.text.as_str())
            .collect()
    }

    fn push(&self, stream: Stream, text: &str) {
        self.chunks.borrow_mut().push(ConsoleChunk {
            stream,
            text: text.to_string(),
        });
    }
}

impl Console for MockConsole {
    fn out(&mut self, text: &str) {
        self.push(Stream::Out, text);
    }

    fn err(&mut self, text: &str) {
        self.push(Stream::Err, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_console_shares_buffer() {
        let console = MockConsole::new();
        let mut handle = console.clone();

        handle.out("a\nb");
        handle.err("oops\n");
        handle.out("c\n");

        assert_eq!(console.stdout(), "a\nbc\n");
        assert_eq!(console.lines(Stream::Out), vec!["a", "bc"]);
        assert_eq!(console.lines(Stream::Err), vec!["oops"]);
        assert_eq!(console.chunks().len(), 3);
    }
}
