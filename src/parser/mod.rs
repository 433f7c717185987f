//! Script source parser
//!
//! This module transforms script source text into an Abstract Syntax Tree (AST):
//! - [`lexer`]: Tokenization (source text → tokens)
//! - [`parse`]: The [`parse::Parser`] struct, its helpers and the entry point
//! - [`statements`] / [`expressions`]: grammar rules, split across `impl Parser` blocks
//! - [`ast`]: AST node definitions
//!
//! # Supported Subset
//!
//! - Declarations: `var`, `let`, `const`, `function`
//! - Statements: `if`/`else`, `while`, `do`/`while`, `for`, `break`, `continue`,
//!   `return`, `throw`, `try`/`catch`/`finally`, blocks
//! - Expressions: arithmetic, comparison, logical, ternary, assignment and
//!   compound assignment, `typeof`, `++`/`--`, calls, member and index access,
//!   object and array literals, function expressions and arrow functions
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent parser, one method per precedence level.
//! No external parser generator dependencies.

pub mod ast;
pub mod expressions;
pub mod lexer;
pub mod parse;
pub mod statements;

pub use parse::{parse, ParseError};
