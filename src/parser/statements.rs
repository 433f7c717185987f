//! Statement parsing implementation
//!
//! This module handles parsing of all statement types:
//!
//! - Declarations: `var`, `let`, `const`, `function name(...) { ... }`
//! - Control flow: `if`, `while`, `do-while`, `for`
//! - Jump statements: `return`, `break`, `continue`, `throw`
//! - Exception handling: `try` / `catch` / `finally`
//! - Blocks and expression statements
//!
//! # Grammar
//!
//! ```text
//! statement ::= var_decl | function_decl | if_stmt | while_stmt | for_stmt
//!             | do_while_stmt | return_stmt | break_stmt | continue_stmt
//!             | throw_stmt | try_stmt | block | ';' | expr_stmt
//! ```

use std::rc::Rc;

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse block statements (inside braces, excluding the braces themselves)
    pub(crate) fn parse_block_statements(&mut self) -> Result<Vec<AstNode>, ParseError> {
        let mut statements = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        Ok(statements)
    }

    /// Parse `{ statements }`, consuming both braces
    pub(crate) fn parse_braced_block(&mut self) -> Result<Vec<AstNode>, ParseError> {
        self.expect_token(&TokenKind::LBrace)?;
        let statements = self.parse_block_statements()?;
        self.expect_token(&TokenKind::RBrace)?;
        Ok(statements)
    }

    /// Parse a statement
    pub(crate) fn parse_statement(&mut self) -> Result<AstNode, ParseError> {
        self.nested(Self::parse_statement_level)
    }

    fn parse_statement_level(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();

        match self.peek().kind {
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                let decl = self.parse_variable_declaration()?;
                self.consume_semicolon()?;
                Ok(decl)
            }
            TokenKind::Function => self.parse_function_declaration(),
            TokenKind::Return => {
                if self.function_depth == 0 {
                    return Err(ParseError {
                        message: "Illegal return statement".to_string(),
                        location: loc,
                    });
                }
                self.advance();
                self.parse_return_statement(loc)
            }
            TokenKind::If => {
                self.advance();
                self.parse_if_statement(loc)
            }
            TokenKind::While => {
                self.advance();
                self.parse_while_statement(loc)
            }
            TokenKind::Do => {
                self.advance();
                self.parse_do_while_statement(loc)
            }
            TokenKind::For => {
                self.advance();
                self.parse_for_statement(loc)
            }
            TokenKind::Break => {
                if self.loop_depth == 0 {
                    return Err(ParseError {
                        message: "Illegal break statement".to_string(),
                        location: loc,
                    });
                }
                self.advance();
                self.consume_semicolon()?;
                Ok(AstNode::Break { location: loc })
            }
            TokenKind::Continue => {
                if self.loop_depth == 0 {
                    return Err(ParseError {
                        message: "Illegal continue statement: no surrounding iteration statement"
                            .to_string(),
                        location: loc,
                    });
                }
                self.advance();
                self.consume_semicolon()?;
                Ok(AstNode::Continue { location: loc })
            }
            TokenKind::Throw => {
                self.advance();
                if self.line_break_before() {
                    return Err(ParseError {
                        message: "Illegal newline after throw".to_string(),
                        location: loc,
                    });
                }
                let expr = Box::new(self.parse_expression()?);
                self.consume_semicolon()?;
                Ok(AstNode::Throw {
                    expr,
                    location: loc,
                })
            }
            TokenKind::Try => {
                self.advance();
                self.parse_try_statement(loc)
            }
            TokenKind::LBrace => {
                let statements = self.parse_braced_block()?;
                Ok(AstNode::Block {
                    statements,
                    location: loc,
                })
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(AstNode::Empty { location: loc })
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(AstNode::ExpressionStatement {
                    expr: Box::new(expr),
                    location: loc,
                })
            }
        }
    }

    /// Parse a statement used as a branch or loop body; a lone statement is
    /// wrapped so every body is a statement list
    fn parse_statement_or_block(&mut self) -> Result<Vec<AstNode>, ParseError> {
        if self.check(&TokenKind::LBrace) {
            self.parse_braced_block()
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    /// Parse `var|let|const name [= init] (, name [= init])*` without the terminator
    pub(crate) fn parse_variable_declaration(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        let kind = match self.advance().kind {
            TokenKind::Let => DeclKind::Let,
            TokenKind::Const => DeclKind::Const,
            _ => DeclKind::Var,
        };

        let mut declarations = Vec::new();
        loop {
            let name_loc = self.current_location();
            let name = self.expect_identifier()?;
            let init = if self.match_token(&TokenKind::Eq) {
                Some(self.parse_assignment()?)
            } else {
                None
            };

            if kind == DeclKind::Const && init.is_none() {
                return Err(ParseError {
                    message: "Missing initializer in const declaration".to_string(),
                    location: name_loc,
                });
            }

            declarations.push(Declarator {
                name,
                init,
                location: name_loc,
            });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(AstNode::VarDecl {
            kind,
            declarations,
            location: loc,
        })
    }

    /// Parse `function name(params) { body }`
    fn parse_function_declaration(&mut self) -> Result<AstNode, ParseError> {
        let function = self.parse_function_literal(true)?;
        Ok(AstNode::FunctionDecl {
            function: Rc::new(function),
        })
    }

    /// Parse a `function` literal; the name is mandatory for declarations
    pub(crate) fn parse_function_literal(
        &mut self,
        require_name: bool,
    ) -> Result<FunctionDef, ParseError> {
        let start = self.current_location();
        self.expect_token(&TokenKind::Function)?;

        let name = if require_name || matches!(self.peek().kind, TokenKind::Ident(_)) {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        self.expect_token(&TokenKind::LParen)?;
        let params = self.parse_parameter_list()?;
        self.expect_token(&TokenKind::RParen)?;

        let body = self.in_function_body(Self::parse_braced_block)?;

        Ok(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
            location: start.through(self.previous_location()),
        })
    }

    /// Parse parameter names up to (not including) the closing parenthesis
    pub(crate) fn parse_parameter_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut params = Vec::new();

        if self.check(&TokenKind::RParen) {
            return Ok(params);
        }

        loop {
            let loc = self.current_location();
            let name = self.expect_identifier()?;
            if params.contains(&name) {
                return Err(ParseError {
                    message: "Duplicate parameter name not allowed in this context".to_string(),
                    location: loc,
                });
            }
            params.push(name);

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(params)
    }

    fn parse_return_statement(&mut self, loc: SourceLocation) -> Result<AstNode, ParseError> {
        let expr = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.is_at_end()
            || self.line_break_before()
        {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        self.consume_semicolon()?;

        Ok(AstNode::Return {
            expr,
            location: loc,
        })
    }

    fn parse_if_statement(&mut self, loc: SourceLocation) -> Result<AstNode, ParseError> {
        self.expect_token(&TokenKind::LParen)?;
        let condition = Box::new(self.parse_expression()?);
        self.expect_token(&TokenKind::RParen)?;

        let then_branch = self.parse_statement_or_block()?;

        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(self.parse_statement_or_block()?)
        } else {
            None
        };

        Ok(AstNode::If {
            condition,
            then_branch,
            else_branch,
            location: loc,
        })
    }

    fn parse_while_statement(&mut self, loc: SourceLocation) -> Result<AstNode, ParseError> {
        self.expect_token(&TokenKind::LParen)?;
        let condition = Box::new(self.parse_expression()?);
        self.expect_token(&TokenKind::RParen)?;

        let body = self.in_loop_body(Self::parse_statement_or_block)?;

        Ok(AstNode::While {
            condition,
            body,
            location: loc,
        })
    }

    fn parse_do_while_statement(&mut self, loc: SourceLocation) -> Result<AstNode, ParseError> {
        let body = self.in_loop_body(Self::parse_statement_or_block)?;

        self.expect_token(&TokenKind::While)?;
        self.expect_token(&TokenKind::LParen)?;
        let condition = Box::new(self.parse_expression()?);
        self.expect_token(&TokenKind::RParen)?;
        // The terminator after do-while is always optional
        self.match_token(&TokenKind::Semicolon);

        Ok(AstNode::DoWhile {
            body,
            condition,
            location: loc,
        })
    }

    fn parse_for_statement(&mut self, loc: SourceLocation) -> Result<AstNode, ParseError> {
        self.expect_token(&TokenKind::LParen)?;

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if matches!(
            self.peek().kind,
            TokenKind::Var | TokenKind::Let | TokenKind::Const
        ) {
            Some(Box::new(self.parse_variable_declaration()?))
        } else {
            let expr_loc = self.current_location();
            let expr = self.parse_expression()?;
            Some(Box::new(AstNode::ExpressionStatement {
                expr: Box::new(expr),
                location: expr_loc,
            }))
        };
        self.expect_token(&TokenKind::Semicolon)?;

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect_token(&TokenKind::Semicolon)?;

        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect_token(&TokenKind::RParen)?;

        let body = self.in_loop_body(Self::parse_statement_or_block)?;

        Ok(AstNode::For {
            init,
            condition,
            update,
            body,
            location: loc,
        })
    }

    fn parse_try_statement(&mut self, loc: SourceLocation) -> Result<AstNode, ParseError> {
        let block = self.parse_braced_block()?;

        let handler = if self.match_token(&TokenKind::Catch) {
            let param = if self.match_token(&TokenKind::LParen) {
                let name = self.expect_identifier()?;
                self.expect_token(&TokenKind::RParen)?;
                Some(name)
            } else {
                None
            };
            let body = self.parse_braced_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };

        let finalizer = if self.match_token(&TokenKind::Finally) {
            Some(self.parse_braced_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(ParseError {
                message: "Missing catch or finally after try".to_string(),
                location: self.current_location(),
            });
        }

        Ok(AstNode::Try {
            block,
            handler,
            finalizer,
            location: loc,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::parse;

    #[test]
    fn test_parse_if_else() {
        let program = parse("if (x > 0) y = 1; else { y = 2; }").unwrap();
        match &program.nodes[0] {
            AstNode::If {
                then_branch,
                else_branch,
                ..
            } => {
                assert_eq!(then_branch.len(), 1);
                assert_eq!(else_branch.as_ref().map(|b| b.len()), Some(1));
            }
            other => panic!("Expected if statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_for_loop() {
        let program = parse("for (var i = 0; i < 3; i++) { print(i); }").unwrap();
        match &program.nodes[0] {
            AstNode::For {
                init,
                condition,
                update,
                body,
                ..
            } => {
                assert!(matches!(init.as_deref(), Some(AstNode::VarDecl { .. })));
                assert!(condition.is_some());
                assert!(update.is_some());
                assert_eq!(body.len(), 1);
            }
            other => panic!("Expected for statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_try_catch_finally() {
        let program = parse("try { f(); } catch (e) { g(e); } finally { h(); }").unwrap();
        match &program.nodes[0] {
            AstNode::Try {
                handler, finalizer, ..
            } => {
                assert_eq!(
                    handler.as_ref().and_then(|h| h.param.as_deref()),
                    Some("e")
                );
                assert!(finalizer.is_some());
            }
            other => panic!("Expected try statement, got {:?}", other),
        }
    }

    #[test]
    fn test_try_without_handler_is_rejected() {
        assert!(parse("try { f(); }").is_err());
    }

    #[test]
    fn test_const_requires_initializer() {
        let err = parse("const k;").unwrap_err();
        assert_eq!(err.message, "Missing initializer in const declaration");
    }

    #[test]
    fn test_return_without_value_before_newline() {
        let program = parse("function f() {\n return\n 42\n}").unwrap();
        match &program.nodes[0] {
            AstNode::FunctionDecl { function } => match &function.body {
                FunctionBody::Block(body) => {
                    assert!(matches!(body[0], AstNode::Return { expr: None, .. }));
                    assert_eq!(body.len(), 2);
                }
                other => panic!("Expected block body, got {:?}", other),
            },
            other => panic!("Expected function declaration, got {:?}", other),
        }
    }
}
