//! Expression parsing implementation
//!
//! One method per precedence level, lowest first:
//!
//! ```text
//! assignment  = arrow | ternary (('=' | '+=' | ...) assignment)?
//! ternary     = logical_or ('?' assignment ':' assignment)?
//! logical_or  = logical_and ('||' logical_and)*
//! logical_and = equality ('&&' equality)*
//! equality    = relational (('==' | '!=' | '===' | '!==') relational)*
//! relational  = additive (('<' | '<=' | '>' | '>=') additive)*
//! additive    = multiplicative (('+' | '-') multiplicative)*
//! multiplicative = unary (('*' | '/' | '%') unary)*
//! unary       = ('!' | '-' | '+' | 'typeof' | '++' | '--') unary | postfix
//! postfix     = call ('++' | '--')?
//! call        = primary ('(' args ')' | '.' name | '[' expr ']')*
//! ```

use std::rc::Rc;

use crate::memory::value::number_to_string;
use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse expression (top-level entry point)
    pub(crate) fn parse_expression(&mut self) -> Result<AstNode, ParseError> {
        self.parse_assignment()
    }

    /// Parse assignment, arrow function or ternary (right-associative)
    pub(crate) fn parse_assignment(&mut self) -> Result<AstNode, ParseError> {
        self.nested(Self::parse_assignment_level)
    }

    fn parse_assignment_level(&mut self) -> Result<AstNode, ParseError> {
        if self.at_arrow_function() {
            return self.parse_arrow_function();
        }

        let expr = self.parse_ternary()?;

        let loc = self.current_location();
        let compound_op = match self.peek().kind {
            TokenKind::Eq => None,
            TokenKind::PlusEq => Some(BinOp::Add),
            TokenKind::MinusEq => Some(BinOp::Sub),
            TokenKind::StarEq => Some(BinOp::Mul),
            TokenKind::SlashEq => Some(BinOp::Div),
            TokenKind::PercentEq => Some(BinOp::Mod),
            _ => return Ok(expr),
        };

        if !expr.is_assignable() {
            return Err(ParseError {
                message: "Invalid left-hand side in assignment".to_string(),
                location: *expr.location(),
            });
        }
        self.advance();

        let value = Box::new(self.parse_assignment()?);
        let target = Box::new(expr);
        Ok(match compound_op {
            None => AstNode::Assignment {
                target,
                value,
                location: loc,
            },
            Some(op) => AstNode::CompoundAssignment {
                target,
                op,
                value,
                location: loc,
            },
        })
    }

    /// Whether the upcoming tokens start `x =>` or `(a, b) =>`
    fn at_arrow_function(&self) -> bool {
        match self.peek().kind {
            TokenKind::Ident(_) => self.check_ahead(1, &TokenKind::Arrow),
            TokenKind::LParen => self.arrow_params.contains(&self.position),
            _ => false,
        }
    }

    fn parse_arrow_function(&mut self) -> Result<AstNode, ParseError> {
        let start = self.current_location();

        let params = if self.match_token(&TokenKind::LParen) {
            let params = self.parse_parameter_list()?;
            self.expect_token(&TokenKind::RParen)?;
            params
        } else {
            vec![self.expect_identifier()?]
        };
        self.expect_token(&TokenKind::Arrow)?;

        let body = self.in_function_body(|parser| {
            if parser.check(&TokenKind::LBrace) {
                Ok(FunctionBody::Block(parser.parse_braced_block()?))
            } else {
                Ok(FunctionBody::Expression(Box::new(parser.parse_assignment()?)))
            }
        })?;

        Ok(AstNode::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
            location: start.through(self.previous_location()),
        })))
    }

    /// Parse ternary: condition ? true_expr : false_expr
    fn parse_ternary(&mut self) -> Result<AstNode, ParseError> {
        let expr = self.parse_logical_or()?;

        if self.match_token(&TokenKind::Question) {
            let loc = self.previous_location();
            let true_expr = Box::new(self.parse_assignment()?);
            self.expect_token(&TokenKind::Colon)?;
            let false_expr = Box::new(self.parse_assignment()?);

            return Ok(AstNode::TernaryOp {
                condition: Box::new(expr),
                true_expr,
                false_expr,
                location: loc,
            });
        }

        Ok(expr)
    }

    /// Parse logical OR (||)
    fn parse_logical_or(&mut self) -> Result<AstNode, ParseError> {
        let mut left = self.parse_logical_and()?;
        let mut links = 0;

        while self.match_token(&TokenKind::OrOr) {
            let loc = self.previous_location();
            self.enter_nesting()?;
            links += 1;
            let right = Box::new(self.parse_logical_and()?);
            left = AstNode::BinaryOp {
                op: BinOp::Or,
                left: Box::new(left),
                right,
                location: loc,
            };
        }

        self.leave_nesting(links);
        Ok(left)
    }

    /// Parse logical AND (&&)
    fn parse_logical_and(&mut self) -> Result<AstNode, ParseError> {
        let mut left = self.parse_equality()?;
        let mut links = 0;

        while self.match_token(&TokenKind::AndAnd) {
            let loc = self.previous_location();
            self.enter_nesting()?;
            links += 1;
            let right = Box::new(self.parse_equality()?);
            left = AstNode::BinaryOp {
                op: BinOp::And,
                left: Box::new(left),
                right,
                location: loc,
            };
        }

        self.leave_nesting(links);
        Ok(left)
    }

    /// Parse equality (== != === !==)
    fn parse_equality(&mut self) -> Result<AstNode, ParseError> {
        let mut left = self.parse_relational()?;
        let mut links = 0;

        loop {
            let loc = self.current_location();
            let op = match self.peek().kind {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                TokenKind::EqEqEq => BinOp::StrictEq,
                TokenKind::NotEqEq => BinOp::StrictNe,
                _ => break,
            };
            self.advance();

            self.enter_nesting()?;
            links += 1;
            let right = Box::new(self.parse_relational()?);
            left = AstNode::BinaryOp {
                op,
                left: Box::new(left),
                right,
                location: loc,
            };
        }

        self.leave_nesting(links);
        Ok(left)
    }

    /// Parse relational (< <= > >=)
    fn parse_relational(&mut self) -> Result<AstNode, ParseError> {
        let mut left = self.parse_additive()?;
        let mut links = 0;

        loop {
            let loc = self.current_location();
            let op = match self.peek().kind {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();

            self.enter_nesting()?;
            links += 1;
            let right = Box::new(self.parse_additive()?);
            left = AstNode::BinaryOp {
                op,
                left: Box::new(left),
                right,
                location: loc,
            };
        }

        self.leave_nesting(links);
        Ok(left)
    }

    /// Parse additive (+ -)
    fn parse_additive(&mut self) -> Result<AstNode, ParseError> {
        let mut left = self.parse_multiplicative()?;
        let mut links = 0;

        loop {
            let loc = self.current_location();
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();

            self.enter_nesting()?;
            links += 1;
            let right = Box::new(self.parse_multiplicative()?);
            left = AstNode::BinaryOp {
                op,
                left: Box::new(left),
                right,
                location: loc,
            };
        }

        self.leave_nesting(links);
        Ok(left)
    }

    /// Parse multiplicative (* / %)
    fn parse_multiplicative(&mut self) -> Result<AstNode, ParseError> {
        let mut left = self.parse_unary()?;
        let mut links = 0;

        loop {
            let loc = self.current_location();
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();

            self.enter_nesting()?;
            links += 1;
            let right = Box::new(self.parse_unary()?);
            left = AstNode::BinaryOp {
                op,
                left: Box::new(left),
                right,
                location: loc,
            };
        }

        self.leave_nesting(links);
        Ok(left)
    }

    /// Parse unary (! - + typeof ++ --)
    fn parse_unary(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();

        let op = match self.peek().kind {
            TokenKind::Bang => UnOp::Not,
            TokenKind::Minus => UnOp::Neg,
            TokenKind::Plus => UnOp::Plus,
            TokenKind::Typeof => UnOp::Typeof,
            TokenKind::PlusPlus => UnOp::PreInc,
            TokenKind::MinusMinus => UnOp::PreDec,
            _ => return self.parse_postfix(),
        };
        self.advance();

        let operand = self.nested(Self::parse_unary)?;
        if op.is_update() && !operand.is_assignable() {
            return Err(ParseError {
                message: "Invalid left-hand side expression in prefix operation".to_string(),
                location: *operand.location(),
            });
        }

        Ok(AstNode::UnaryOp {
            op,
            operand: Box::new(operand),
            location: loc,
        })
    }

    /// Parse postfix (++ --); a line break before the operator ends the expression
    fn parse_postfix(&mut self) -> Result<AstNode, ParseError> {
        let expr = self.parse_call_member()?;

        if self.line_break_before() {
            return Ok(expr);
        }

        let loc = self.current_location();
        let op = match self.peek().kind {
            TokenKind::PlusPlus => UnOp::PostInc,
            TokenKind::MinusMinus => UnOp::PostDec,
            _ => return Ok(expr),
        };

        if !expr.is_assignable() {
            return Err(ParseError {
                message: "Invalid left-hand side expression in postfix operation".to_string(),
                location: *expr.location(),
            });
        }
        self.advance();

        Ok(AstNode::UnaryOp {
            op,
            operand: Box::new(expr),
            location: loc,
        })
    }

    /// Parse calls, member access and indexing
    fn parse_call_member(&mut self) -> Result<AstNode, ParseError> {
        let mut expr = self.parse_primary()?;
        let mut links = 0;

        loop {
            if matches!(
                self.peek().kind,
                TokenKind::LParen | TokenKind::Dot | TokenKind::LBracket
            ) {
                self.enter_nesting()?;
                links += 1;
            }

            if self.match_token(&TokenKind::LParen) {
                let paren_loc = self.previous_location();
                let args = self.parse_argument_list()?;
                self.expect_token(&TokenKind::RParen)?;

                let location = match &expr {
                    AstNode::Variable(_, loc)
                    | AstNode::Member { location: loc, .. }
                    | AstNode::Index { location: loc, .. } => *loc,
                    _ => paren_loc,
                };
                expr = AstNode::Call {
                    callee: Box::new(expr),
                    args,
                    location,
                };
            } else if self.match_token(&TokenKind::Dot) {
                let location = self.current_location();
                let property = self.expect_property_name()?;
                expr = AstNode::Member {
                    object: Box::new(expr),
                    property,
                    location,
                };
            } else if self.match_token(&TokenKind::LBracket) {
                let start = self.previous_location();
                let index = Box::new(self.parse_expression()?);
                self.expect_token(&TokenKind::RBracket)?;
                expr = AstNode::Index {
                    object: Box::new(expr),
                    index,
                    location: start.through(self.previous_location()),
                };
            } else {
                break;
            }
        }

        self.leave_nesting(links);
        Ok(expr)
    }

    /// Parse argument list up to (not including) the closing parenthesis
    fn parse_argument_list(&mut self) -> Result<Vec<AstNode>, ParseError> {
        let mut args = Vec::new();

        while !self.check(&TokenKind::RParen) {
            args.push(self.parse_assignment()?);

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(args)
    }

    /// Parse primary (literals, variables, parenthesized expressions)
    fn parse_primary(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();

        let node = match &self.peek().kind {
            TokenKind::Number(n) => AstNode::NumberLiteral(*n, loc),
            TokenKind::String(s) => AstNode::StringLiteral(s.clone(), loc),
            TokenKind::Ident(name) => AstNode::Variable(name.clone(), loc),
            TokenKind::True => AstNode::BoolLiteral(true, loc),
            TokenKind::False => AstNode::BoolLiteral(false, loc),
            TokenKind::Null => AstNode::Null { location: loc },
            TokenKind::Undefined => AstNode::Undefined { location: loc },
            TokenKind::Function => {
                let function = self.parse_function_literal(false)?;
                return Ok(AstNode::Function(Rc::new(function)));
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_token(&TokenKind::RParen)?;
                return Ok(expr);
            }
            TokenKind::LBracket => return self.parse_array_literal(),
            TokenKind::LBrace => return self.parse_object_literal(),
            _ => return Err(self.unexpected()),
        };

        self.advance();
        Ok(node)
    }

    fn parse_array_literal(&mut self) -> Result<AstNode, ParseError> {
        let start = self.current_location();
        self.expect_token(&TokenKind::LBracket)?;

        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            elements.push(self.parse_assignment()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_token(&TokenKind::RBracket)?;

        Ok(AstNode::ArrayLiteral {
            elements,
            location: start.through(self.previous_location()),
        })
    }

    fn parse_object_literal(&mut self) -> Result<AstNode, ParseError> {
        let start = self.current_location();
        self.expect_token(&TokenKind::LBrace)?;

        let mut properties = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let key_loc = self.current_location();
            let (key, shorthand_ok) = match &self.peek().kind {
                TokenKind::String(s) => {
                    let key = s.clone();
                    self.advance();
                    (key, false)
                }
                TokenKind::Number(n) => {
                    let key = number_to_string(*n);
                    self.advance();
                    (key, false)
                }
                TokenKind::Ident(_) => (self.expect_property_name()?, true),
                _ => (self.expect_property_name()?, false),
            };

            let value = if self.match_token(&TokenKind::Colon) {
                self.parse_assignment()?
            } else if shorthand_ok
                && (self.check(&TokenKind::Comma) || self.check(&TokenKind::RBrace))
            {
                AstNode::Variable(key.clone(), key_loc)
            } else {
                return Err(self.unexpected());
            };

            properties.push(PropertyInit { key, value });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_token(&TokenKind::RBrace)?;

        Ok(AstNode::ObjectLiteral {
            properties,
            location: start.through(self.previous_location()),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::parse;

    fn expression(source: &str) -> AstNode {
        let mut program = parse(source).unwrap();
        match program.nodes.remove(0) {
            AstNode::ExpressionStatement { expr, .. } => *expr,
            other => panic!("Expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        match expression("1 + 2 * 3") {
            AstNode::BinaryOp {
                op: BinOp::Add,
                right,
                ..
            } => assert!(matches!(*right, AstNode::BinaryOp { op: BinOp::Mul, .. })),
            other => panic!("Expected addition, got {:?}", other),
        }
    }

    #[test]
    fn test_member_location_spans_property() {
        match expression("x.y") {
            AstNode::Member {
                property, location, ..
            } => {
                assert_eq!(property, "y");
                assert_eq!(location.column, 3);
                assert_eq!(location.len, 1);
            }
            other => panic!("Expected member access, got {:?}", other),
        }
    }

    #[test]
    fn test_arrow_functions() {
        assert!(matches!(
            expression("(a, b) => a + b"),
            AstNode::Function(f) if f.params.len() == 2
                && matches!(f.body, FunctionBody::Expression(_))
        ));
        assert!(matches!(
            expression("x => { return x; }"),
            AstNode::Function(f) if f.params == vec!["x".to_string()]
        ));
    }

    #[test]
    fn test_parenthesized_expression_is_not_arrow() {
        assert!(matches!(
            expression("(a + b) * 2"),
            AstNode::BinaryOp { op: BinOp::Mul, .. }
        ));
    }

    #[test]
    fn test_object_and_array_literals() {
        match expression("({ a: 1, b: [1, 2, 3], c })") {
            AstNode::ObjectLiteral { properties, .. } => {
                let keys: Vec<_> = properties.iter().map(|p| p.key.as_str()).collect();
                assert_eq!(keys, vec!["a", "b", "c"]);
                assert!(matches!(
                    &properties[1].value,
                    AstNode::ArrayLiteral { elements, .. } if elements.len() == 3
                ));
            }
            other => panic!("Expected object literal, got {:?}", other),
        }
    }

    #[test]
    fn test_call_location_is_callee_name() {
        match expression("obj.method(1)") {
            AstNode::Call { location, args, .. } => {
                assert_eq!(location.column, 5);
                assert_eq!(args.len(), 1);
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse("1 = 2;").unwrap_err();
        assert_eq!(err.message, "Invalid left-hand side in assignment");
    }
}
