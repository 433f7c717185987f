//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct and core parsing infrastructure,
//! including the error type, helper methods, and the main parse entry point.
//!
//! # Parser Architecture
//!
//! The Parser uses a recursive descent approach with the following organization:
//! - This module: Parser struct, helper methods, and coordination
//! - `statements`: Parsing declarations and statements (if, while, try, etc.)
//! - `expressions`: Parsing expressions with one method per precedence level
//!
//! Parser methods are split across multiple files using `impl Parser` blocks,
//! allowing each module to extend the Parser with related functionality while
//! maintaining access to the shared parser state.
//!
//! # Semicolons
//!
//! A statement terminator may be omitted before `}`, at the end of input, or
//! when the next token starts on a later line.

use crate::parser::ast::*;
use crate::parser::lexer::{LexError, Lexer, Token, TokenKind};
use rustc_hash::FxHashSet;
use thiserror::Error;

/// Deepest nesting of expressions and statements a unit may use
pub const MAX_NESTING_DEPTH: usize = 1000;

/// Parser error type
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub location: SourceLocation,
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError {
            message: err.message,
            location: err.location,
        }
    }
}

/// Recursive descent parser for the script language
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) position: usize,
    /// Enclosing function literals; `return` is only legal inside one
    pub(crate) function_depth: usize,
    /// Enclosing loops of the innermost function; gates `break` / `continue`
    pub(crate) loop_depth: usize,
    /// Syntax tree depth of the construct being parsed
    pub(crate) nesting_depth: usize,
    /// Positions of `(` tokens that open an arrow function's parameters
    pub(crate) arrow_params: FxHashSet<usize>,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;
        let arrow_params = arrow_parameter_lists(&tokens);
        Ok(Self {
            tokens,
            position: 0,
            function_depth: 0,
            loop_depth: 0,
            nesting_depth: 0,
            arrow_params,
        })
    }

    /// Parse the entire unit
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::new();

        while !self.is_at_end() {
            let stmt = self.parse_statement()?;
            program.nodes.push(stmt);
        }

        Ok(program)
    }

    // ===== Helper methods =====

    /// Runs `parse` as the body of a function: `return` becomes legal and
    /// loops of the enclosing function no longer count.
    pub(crate) fn in_function_body<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;
        let result = parse(self);
        self.function_depth -= 1;
        self.loop_depth = saved_loops;
        result
    }

    /// Runs `parse` one nesting level deeper
    pub(crate) fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.enter_nesting()?;
        let result = parse(self);
        self.leave_nesting(1);
        result
    }

    /// Claim one nesting level; released again with [`Parser::leave_nesting`]
    pub(crate) fn enter_nesting(&mut self) -> Result<(), ParseError> {
        if self.nesting_depth >= MAX_NESTING_DEPTH {
            return Err(ParseError {
                message: "Maximum call stack size exceeded".to_string(),
                location: self.current_location(),
            });
        }
        self.nesting_depth += 1;
        Ok(())
    }

    pub(crate) fn leave_nesting(&mut self, levels: usize) {
        self.nesting_depth -= levels;
    }

    /// Runs `parse` as a loop body
    pub(crate) fn in_loop_body<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.loop_depth += 1;
        let result = parse(self);
        self.loop_depth -= 1;
        result
    }

    pub(crate) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn check_ahead(&self, n: usize, kind: &TokenKind) -> bool {
        self.peek_ahead(n)
            .is_some_and(|t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.position += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.position]
    }

    pub(crate) fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n)
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.position.saturating_sub(1)]
    }

    pub(crate) fn previous_location(&self) -> SourceLocation {
        self.previous().location()
    }

    pub(crate) fn current_location(&self) -> SourceLocation {
        self.peek().location()
    }

    /// Whether a line break separates the previous token from the current one
    pub(crate) fn line_break_before(&self) -> bool {
        self.position > 0 && self.current_location().line > self.previous_location().line
    }

    /// Error describing the current token as unexpected
    pub(crate) fn unexpected(&self) -> ParseError {
        ParseError {
            message: self.peek().unexpected_message(),
            location: self.current_location(),
        }
    }

    pub(crate) fn expect_token(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// Consumes a statement terminator, applying automatic semicolon insertion
    pub(crate) fn consume_semicolon(&mut self) -> Result<(), ParseError> {
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(());
        }
        if self.check(&TokenKind::RBrace) || self.is_at_end() || self.line_break_before() {
            return Ok(());
        }
        Err(self.unexpected())
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.unexpected())
        }
    }

    /// Accepts an identifier or a reserved word, as allowed after `.` and as
    /// an object literal key.
    pub(crate) fn expect_property_name(&mut self) -> Result<String, ParseError> {
        let name = match &self.peek().kind {
            TokenKind::Ident(name) => name.clone(),
            other => match keyword_text(other) {
                Some(text) => text.to_string(),
                None => return Err(self.unexpected()),
            },
        };
        self.advance();
        Ok(name)
    }
}

/// Source text of a keyword token
fn keyword_text(kind: &TokenKind) -> Option<&'static str> {
    let text = match kind {
        TokenKind::Var => "var",
        TokenKind::Let => "let",
        TokenKind::Const => "const",
        TokenKind::Function => "function",
        TokenKind::Return => "return",
        TokenKind::If => "if",
        TokenKind::Else => "else",
        TokenKind::While => "while",
        TokenKind::Do => "do",
        TokenKind::For => "for",
        TokenKind::Break => "break",
        TokenKind::Continue => "continue",
        TokenKind::Throw => "throw",
        TokenKind::Try => "try",
        TokenKind::Catch => "catch",
        TokenKind::Finally => "finally",
        TokenKind::Typeof => "typeof",
        TokenKind::True => "true",
        TokenKind::False => "false",
        TokenKind::Null => "null",
        TokenKind::Undefined => "undefined",
        _ => return None,
    };
    Some(text)
}

/// Finds every `(` whose matching `)` is directly followed by `=>`
fn arrow_parameter_lists(tokens: &[Token]) -> FxHashSet<usize> {
    let mut open = Vec::new();
    let mut starts = FxHashSet::default();
    for (position, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => open.push(position),
            TokenKind::RParen => {
                let followed_by_arrow = tokens
                    .get(position + 1)
                    .is_some_and(|next| matches!(next.kind, TokenKind::Arrow));
                if let Some(start) = open.pop() {
                    if followed_by_arrow {
                        starts.insert(start);
                    }
                }
            }
            _ => {}
        }
    }
    starts
}

/// Parses a complete unit of source text
pub fn parse(source: &str) -> Result<Program, ParseError> {
    Parser::new(source)?.parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_declaration() {
        let program = parse("var x = 1 + 2 * 3;").unwrap();

        assert_eq!(program.nodes.len(), 1);
        match &program.nodes[0] {
            AstNode::VarDecl {
                kind, declarations, ..
            } => {
                assert_eq!(*kind, DeclKind::Var);
                assert_eq!(declarations.len(), 1);
                assert_eq!(declarations[0].name, "x");
                assert!(matches!(
                    declarations[0].init,
                    Some(AstNode::BinaryOp { op: BinOp::Add, .. })
                ));
            }
            other => panic!("Expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_declaration() {
        let program = parse("function add(a, b) { return a + b; }").unwrap();

        match &program.nodes[0] {
            AstNode::FunctionDecl { function } => {
                assert_eq!(function.name.as_deref(), Some("add"));
                assert_eq!(function.params, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(function.location.offset, 0);
                assert_eq!(function.location.len, 36);
            }
            other => panic!("Expected function declaration, got {:?}", other),
        }
    }

    /// Runs `test` on a thread with room for deeply nested parses
    fn with_large_stack(test: impl FnOnce() + Send + 'static) {
        std::thread::Builder::new()
            .stack_size(256 * 1024 * 1024)
            .spawn(test)
            .unwrap()
            .join()
            .unwrap();
    }

    #[test]
    fn test_nesting_limit() {
        with_large_stack(|| {
            let nested = |depth: usize| format!("{}1{}", "[".repeat(depth), "]".repeat(depth));

            assert!(parse(&nested(100)).is_ok());

            let err = parse(&nested(1_000_000)).unwrap_err();
            assert_eq!(err.message, "Maximum call stack size exceeded");

            let chain = format!("1{}", " + 1".repeat(MAX_NESTING_DEPTH + 1));
            assert!(parse(&chain).is_err());

            let blocks = format!("{}{}", "{".repeat(MAX_NESTING_DEPTH + 1), "}".repeat(MAX_NESTING_DEPTH + 1));
            assert!(parse(&blocks).is_err());
        });
    }

    #[test]
    fn test_arrow_parameter_lists() {
        let tokens = Lexer::new("((a) => a)((b))").tokenize().unwrap();
        let starts = arrow_parameter_lists(&tokens);
        assert_eq!(starts.len(), 1);
        assert!(starts.contains(&1));
    }

    #[test]
    fn test_automatic_semicolons() {
        let program = parse("var a = 1\nvar b = 2\na + b").unwrap();
        assert_eq!(program.nodes.len(), 3);
    }

    #[test]
    fn test_missing_semicolon_on_same_line() {
        let err = parse("var a = 1 var b = 2").unwrap_err();
        assert_eq!(err.message, "Unexpected token 'var'");
        assert_eq!(err.location.column, 11);
    }

    #[test]
    fn test_stray_closing_brace() {
        let err = parse("}").unwrap_err();
        assert_eq!(err.message, "Unexpected token '}'");
        assert_eq!(err.location.line, 1);
        assert_eq!(err.location.column, 1);
    }

    #[test]
    fn test_unexpected_end_of_input() {
        let err = parse("function f() {").unwrap_err();
        assert_eq!(err.message, "Unexpected end of input");
    }

    #[test]
    fn test_jump_statements_need_context() {
        assert_eq!(parse("return 1;").unwrap_err().message, "Illegal return statement");
        assert_eq!(parse("break;").unwrap_err().message, "Illegal break statement");
        assert!(parse("while (true) { break; }").is_ok());
        assert!(parse("function f() { return 1; }").is_ok());
        // A loop outside the function does not make `break` legal inside it
        assert!(parse("while (true) { var f = function () { break; }; }").is_err());
    }

    #[test]
    fn test_keyword_property_names() {
        let program = parse("var o = { if: 1, 'two': 2 }; o.if;").unwrap();
        assert_eq!(program.nodes.len(), 2);
    }
}
