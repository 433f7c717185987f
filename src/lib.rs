//! # Introduction
//!
//! Spectre is a diagnostic script host. It runs scripts from files or an
//! interactive shell inside one persistent execution context, and lets the
//! scripts themselves capture and query a snapshot of the live object heap.
//!
//! ## Execution pipeline
//!
//! ```text
//! Source → Lexer → Parser → AST → Interpreter → (print | exception report)
//!                                      ↓
//!                        haunt() → HeapSnapshot → query
//! ```
//!
//! 1. [`parser`] tokenises the source and builds an AST.
//! 2. [`interpreter`] runs each unit against the shared
//!    [`interpreter::context::ExecutionContext`] and renders uncaught failures.
//! 3. [`memory`] is the object model: tagged [`memory::value::Value`]s, the
//!    [`memory::heap::Heap`] with hidden-class shapes, and the call stack.
//! 4. [`snapshot`] captures the heap into an immutable node/edge arena and
//!    answers typed, named edge queries over it.
//! 5. [`session`] drives batch and interactive modes; [`console`] and
//!    [`source`] are the host's output and input seams.

pub mod config;
pub mod console;
pub mod interpreter;
pub mod memory;
pub mod parser;
pub mod session;
pub mod snapshot;
pub mod source;

/// Host version, printed by the interactive banner and `version()`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
