//! Script execution engine
//!
//! This module provides the core execution logic:
//! - [`engine`]: the [`engine::Interpreter`], unit execution, calls and scopes
//! - [`statements`] / [`expressions`]: AST evaluation
//! - [`builtins`]: native functions installed on the global object
//! - [`context`]: the persistent execution context and script registry
//! - [`errors`]: runtime error and exception types
//! - [`report`]: rendering of uncaught exceptions
//!
//! # Execution Model
//!
//! Every unit (a file, a `ghostify` argument, or a shell line) is compiled and
//! run against the same [`context::ExecutionContext`], so globals defined by
//! one unit are visible to the next. Function activations store their
//! variables in heap scope objects, which closures capture and which show up
//! in heap snapshots.

pub mod builtins;
pub mod constants;
pub mod context;
pub mod engine;
pub mod errors;
pub mod expressions;
pub mod report;
pub mod statements;
