//! Runtime error types for the script engine
//!
//! This module defines:
//! - [`ErrorKind`]: the script-visible error classes (`TypeError`, ...)
//! - [`RuntimeError`]: every failure the engine itself can raise
//! - [`Exception`]: an in-flight failure, with its throw site and stack trace
//! - [`HostError`]: the tagged result built-ins use at the host boundary
//!
//! A runtime error aborts the unit that raised it unless a `try` statement
//! catches it; it never leaves the execution context half-updated beyond the
//! assignments that already happened.

use std::fmt;

use thiserror::Error;

use crate::interpreter::context::ScriptId;
use crate::memory::heap::HeapError;
use crate::memory::value::Value;
use crate::parser::ast::SourceLocation;

/// Script-visible error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Error,
    SyntaxError,
    ReferenceError,
    TypeError,
    RangeError,
    /// A required heap graph edge was missing
    GraphLookupMiss,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::Error,
        ErrorKind::SyntaxError,
        ErrorKind::ReferenceError,
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::GraphLookupMiss,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::GraphLookupMiss => "GraphLookupMiss",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failures raised during compilation or execution
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// Compile error
    #[error("{message}")]
    Syntax {
        message: String,
        location: SourceLocation,
    },

    /// Read of an identifier with no binding
    #[error("{name} is not defined")]
    UndefinedVariable {
        name: String,
        location: SourceLocation,
    },

    /// Property read on `undefined` or `null`
    #[error("Cannot read properties of {base} (reading '{property}')")]
    ReadOfNullish {
        base: &'static str,
        property: String,
        location: SourceLocation,
    },

    /// Property write on `undefined` or `null`
    #[error("Cannot set properties of {base} (setting '{property}')")]
    WriteToNullish {
        base: &'static str,
        property: String,
        location: SourceLocation,
    },

    /// Call of a value that is not a function
    #[error("{callee} is not a function")]
    NotCallable {
        callee: String,
        location: SourceLocation,
    },

    #[error("Assignment to constant variable.")]
    ConstAssignment { location: SourceLocation },

    #[error("Identifier '{name}' has already been declared")]
    Redeclaration {
        name: String,
        location: SourceLocation,
    },

    #[error("Maximum call stack size exceeded")]
    StackOverflow { location: SourceLocation },

    /// Error raised by a built-in, or by the heap
    #[error("{message}")]
    Host {
        kind: ErrorKind,
        message: String,
        location: SourceLocation,
    },

    /// Value thrown by script code; `display` is its string form
    #[error("{display}")]
    Thrown {
        value: Value,
        display: String,
        location: SourceLocation,
    },
}

impl RuntimeError {
    /// Error class of an engine-raised error; `None` for thrown script values
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            RuntimeError::Syntax { .. } | RuntimeError::Redeclaration { .. } => {
                Some(ErrorKind::SyntaxError)
            }
            RuntimeError::UndefinedVariable { .. } => Some(ErrorKind::ReferenceError),
            RuntimeError::ReadOfNullish { .. }
            | RuntimeError::WriteToNullish { .. }
            | RuntimeError::NotCallable { .. }
            | RuntimeError::ConstAssignment { .. } => Some(ErrorKind::TypeError),
            RuntimeError::StackOverflow { .. } => Some(ErrorKind::RangeError),
            RuntimeError::Host { kind, .. } => Some(*kind),
            RuntimeError::Thrown { .. } => None,
        }
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            RuntimeError::Syntax { location, .. }
            | RuntimeError::UndefinedVariable { location, .. }
            | RuntimeError::ReadOfNullish { location, .. }
            | RuntimeError::WriteToNullish { location, .. }
            | RuntimeError::NotCallable { location, .. }
            | RuntimeError::ConstAssignment { location }
            | RuntimeError::Redeclaration { location, .. }
            | RuntimeError::StackOverflow { location }
            | RuntimeError::Host { location, .. }
            | RuntimeError::Thrown { location, .. } => location,
        }
    }

    /// The `Name: message` form shown to the user
    pub fn headline(&self) -> String {
        match self.kind() {
            Some(kind) => format!("{}: {}", kind, self),
            None => self.to_string(),
        }
    }
}

/// Where an exception was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrowSite {
    pub script: ScriptId,
    pub location: SourceLocation,
}

/// An in-flight failure
#[derive(Debug, Clone, Error)]
#[error("{}", .error.headline())]
pub struct Exception {
    pub error: RuntimeError,
    /// Absent when no script was running, e.g. a failure while setting up
    pub site: Option<ThrowSite>,
    /// V8-style trace: the headline followed by `    at ...` lines
    pub stack_trace: Option<String>,
}

impl Exception {
    pub fn message(&self) -> String {
        self.error.headline()
    }
}

/// Failure of a built-in, before it has been turned into an [`Exception`]
#[derive(Debug, Clone)]
pub enum HostError {
    /// Throw a fresh error of this kind at the call site
    Throw { kind: ErrorKind, message: String },
    /// Rethrow an exception raised by script code the built-in ran
    Propagate(Box<Exception>),
}

impl HostError {
    pub fn throw(kind: ErrorKind, message: impl Into<String>) -> Self {
        HostError::Throw {
            kind,
            message: message.into(),
        }
    }
}

impl From<HeapError> for HostError {
    fn from(err: HeapError) -> Self {
        HostError::throw(ErrorKind::RangeError, err.to_string())
    }
}

impl From<Exception> for HostError {
    fn from(exception: Exception) -> Self {
        HostError::Propagate(Box::new(exception))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headlines() {
        let location = SourceLocation::new(1, 1);
        let err = RuntimeError::UndefinedVariable {
            name: "x".to_string(),
            location,
        };
        assert_eq!(err.headline(), "ReferenceError: x is not defined");

        let err = RuntimeError::ReadOfNullish {
            base: "undefined",
            property: "y".to_string(),
            location,
        };
        assert_eq!(
            err.headline(),
            "TypeError: Cannot read properties of undefined (reading 'y')"
        );

        let err = RuntimeError::Thrown {
            value: Value::Number(42.0),
            display: "42".to_string(),
            location,
        };
        assert_eq!(err.headline(), "42");
        assert_eq!(err.kind(), None);
    }

    #[test]
    fn test_exception_displays_headline() {
        let exception = Exception {
            error: RuntimeError::StackOverflow {
                location: SourceLocation::new(3, 7),
            },
            site: None,
            stack_trace: None,
        };
        assert_eq!(
            exception.to_string(),
            "RangeError: Maximum call stack size exceeded"
        );
        assert_eq!(exception.to_string(), exception.message());
    }
}
