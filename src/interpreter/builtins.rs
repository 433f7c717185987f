//! Built-in function implementations
//!
//! Built-ins are native function objects installed on the global object when
//! the interpreter starts. Each one runs with the evaluated arguments and
//! reports failure through [`HostError`], which the engine turns into an
//! exception thrown at the call site.
//!
//! # Supported Built-ins
//!
//! - `print(...values)`: write the values, space separated, to the output stream
//! - `read(path)`: return a file's contents as a string
//! - `ghostify(...paths)`: load and run script files in the shared context
//! - `haunt()`: snapshot the heap and print facts about the global object's shape
//! - `queueMicrotask(fn)`: run `fn` once the current unit has finished
//! - `version()`: host version string
//! - `Error(message)` and its siblings: create error objects

use tracing::debug;

use crate::interpreter::context::ExecutionContext;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ErrorKind, HostError};
use crate::memory::heap::{HeapError, ObjectKind};
use crate::memory::value::Value;
use crate::parser::ast::SourceLocation;
use crate::snapshot;

/// Native functions provided by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Read,
    Ghostify,
    Haunt,
    QueueMicrotask,
    Version,
    ErrorConstructor(ErrorKind),
}

impl Builtin {
    /// Every built-in installed on the global object
    pub const ALL: [Builtin; 11] = [
        Builtin::Print,
        Builtin::Read,
        Builtin::Ghostify,
        Builtin::Haunt,
        Builtin::QueueMicrotask,
        Builtin::Version,
        Builtin::ErrorConstructor(ErrorKind::Error),
        Builtin::ErrorConstructor(ErrorKind::TypeError),
        Builtin::ErrorConstructor(ErrorKind::RangeError),
        Builtin::ErrorConstructor(ErrorKind::ReferenceError),
        Builtin::ErrorConstructor(ErrorKind::SyntaxError),
    ];

    /// Global name the built-in is installed under
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Read => "read",
            Builtin::Ghostify => "ghostify",
            Builtin::Haunt => "haunt",
            Builtin::QueueMicrotask => "queueMicrotask",
            Builtin::Version => "version",
            Builtin::ErrorConstructor(kind) => kind.name(),
        }
    }
}

/// Populate the global object with the built-ins and the numeric constants
pub(crate) fn install(context: &mut ExecutionContext) -> Result<(), HeapError> {
    let global = context.global;
    for builtin in Builtin::ALL {
        let function = context.heap.allocate(ObjectKind::Native(builtin))?;
        context
            .heap
            .set_property(global, builtin.name(), Value::Object(function))?;
    }
    context
        .heap
        .set_property(global, "NaN", Value::Number(f64::NAN))?;
    context
        .heap
        .set_property(global, "Infinity", Value::Number(f64::INFINITY))?;

    debug!(count = Builtin::ALL.len(), "built-ins installed");
    Ok(())
}

impl Interpreter {
    pub(crate) fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: &[Value],
        call_site: SourceLocation,
    ) -> Result<Value, HostError> {
        match builtin {
            Builtin::Print => self.builtin_print(args),
            Builtin::Read => self.builtin_read(args),
            Builtin::Ghostify => self.builtin_ghostify(args, call_site),
            Builtin::Haunt => self.builtin_haunt(),
            Builtin::QueueMicrotask => self.builtin_queue_microtask(args),
            Builtin::Version => Ok(Value::string(crate::VERSION)),
            Builtin::ErrorConstructor(kind) => self.builtin_error(kind, args, call_site),
        }
    }

    fn builtin_print(&mut self, args: &[Value]) -> Result<Value, HostError> {
        let line = args
            .iter()
            .map(|value| self.display_string(value))
            .collect::<Vec<_>>()
            .join(" ");
        self.console.out(&format!("{}\n", line));
        Ok(Value::Undefined)
    }

    fn builtin_read(&mut self, args: &[Value]) -> Result<Value, HostError> {
        let [path] = args else {
            return Err(HostError::throw(ErrorKind::Error, "Bad parameters"));
        };
        let path = self.display_string(path);
        match self.sources.load_source(&path) {
            Ok(text) => Ok(Value::string(text)),
            Err(err) => {
                debug!(path, error = %err, "read failed");
                Err(HostError::throw(ErrorKind::Error, "Error loading file"))
            }
        }
    }

    /// Run each file as its own unit, stopping at the first failure
    fn builtin_ghostify(
        &mut self,
        args: &[Value],
        call_site: SourceLocation,
    ) -> Result<Value, HostError> {
        for arg in args {
            let path = self.display_string(arg);
            let source = self.sources.load_source(&path).map_err(|err| {
                debug!(path, error = %err, "ghostify load failed");
                HostError::throw(ErrorKind::Error, "Error loading file")
            })?;
            self.run_unit(&source, &path, Some(call_site))?;
        }
        Ok(Value::Undefined)
    }

    fn builtin_haunt(&mut self) -> Result<Value, HostError> {
        let roots = self.context.roots();
        let report = snapshot::haunt(&mut self.profiler, &self.context.heap, &roots)
            .map_err(|miss| HostError::throw(ErrorKind::GraphLookupMiss, miss.to_string()))?;
        self.console.out(&format!("{}\n", report));
        Ok(Value::Undefined)
    }

    fn builtin_queue_microtask(&mut self, args: &[Value]) -> Result<Value, HostError> {
        let task = args.first().cloned().unwrap_or_default();
        let callable = task
            .as_object()
            .is_some_and(|id| self.context.heap.object(id).kind.is_callable());
        if !callable {
            return Err(HostError::throw(
                ErrorKind::TypeError,
                "The \"callback\" argument must be of type function",
            ));
        }
        self.context.microtasks.push_back(task);
        Ok(Value::Undefined)
    }

    /// Error objects capture the stack at their creation site
    fn builtin_error(
        &mut self,
        kind: ErrorKind,
        args: &[Value],
        call_site: SourceLocation,
    ) -> Result<Value, HostError> {
        let message = match args.first() {
            Some(value) if !value.is_undefined() => self.display_string(value),
            _ => String::new(),
        };
        let headline = if message.is_empty() {
            kind.to_string()
        } else {
            format!("{}: {}", kind, message)
        };
        let stack = self.capture_stack_trace(&headline, call_site);
        let id = self.new_error_object(kind, &message, Some(&stack))?;
        Ok(Value::Object(id))
    }
}
