//! Statement execution implementation
//!
//! This module handles the execution of every statement type:
//!
//! - Declarations (`var`, `let`, `const`; function declarations are hoisted)
//! - Control flow (if/else, while, do-while, for, break, continue, return)
//! - Exceptions (throw, try/catch/finally)
//! - Blocks and expression statements
//!
//! # Control Flow
//!
//! Each statement reports how it completed through [`ControlFlow`]; loops
//! consume `Break` and `Continue`, function calls consume `Return`. Exceptions
//! travel on the `Err` side and are consumed only by `try`.

use std::rc::Rc;

use crate::interpreter::engine::{ControlFlow, ExecResult, Interpreter};
use crate::interpreter::errors::Exception;
use crate::memory::heap::{Binding, ObjectKind};
use crate::memory::value::{ObjectId, Value};
use crate::parser::ast::*;

impl Interpreter {
    pub(crate) fn execute_statement(&mut self, stmt: &AstNode) -> ExecResult<ControlFlow> {
        match stmt {
            AstNode::VarDecl {
                kind, declarations, ..
            } => {
                for decl in declarations {
                    self.execute_declarator(*kind, decl)?;
                }
                Ok(ControlFlow::Normal)
            }

            AstNode::FunctionDecl { .. } | AstNode::Empty { .. } => Ok(ControlFlow::Normal),

            AstNode::ExpressionStatement { expr, .. } => {
                self.evaluate_expr(expr)?;
                Ok(ControlFlow::Normal)
            }

            AstNode::Return { expr, .. } => {
                let value = match expr {
                    Some(expr) => self.evaluate_expr(expr)?,
                    None => Value::Undefined,
                };
                Ok(ControlFlow::Return(value))
            }

            AstNode::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.evaluate_expr(condition)?.truthy() {
                    self.execute_block(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute_block(else_branch)
                } else {
                    Ok(ControlFlow::Normal)
                }
            }

            AstNode::While {
                condition, body, ..
            } => {
                while self.evaluate_expr(condition)?.truthy() {
                    match self.execute_block(body)? {
                        ControlFlow::Break => break,
                        ControlFlow::Return(value) => return Ok(ControlFlow::Return(value)),
                        ControlFlow::Normal | ControlFlow::Continue => {}
                    }
                }
                Ok(ControlFlow::Normal)
            }

            AstNode::DoWhile {
                body, condition, ..
            } => {
                loop {
                    match self.execute_block(body)? {
                        ControlFlow::Break => break,
                        ControlFlow::Return(value) => return Ok(ControlFlow::Return(value)),
                        ControlFlow::Normal | ControlFlow::Continue => {}
                    }
                    if !self.evaluate_expr(condition)?.truthy() {
                        break;
                    }
                }
                Ok(ControlFlow::Normal)
            }

            AstNode::For {
                init,
                condition,
                update,
                body,
                ..
            } => self.execute_for(
                init.as_deref(),
                condition.as_deref(),
                update.as_deref(),
                body,
            ),

            AstNode::Break { .. } => Ok(ControlFlow::Break),
            AstNode::Continue { .. } => Ok(ControlFlow::Continue),

            AstNode::Throw { expr, location } => {
                let value = self.evaluate_expr(expr)?;
                Err(self.throw_value(value, *location))
            }

            AstNode::Try {
                block,
                handler,
                finalizer,
                ..
            } => self.execute_try(block, handler.as_ref(), finalizer.as_deref()),

            AstNode::Block { statements, .. } => self.execute_block(statements),

            // Any other node is an expression in statement position
            expr => {
                self.evaluate_expr(expr)?;
                Ok(ControlFlow::Normal)
            }
        }
    }

    /// Run statements in order, stopping at the first abrupt completion
    pub(crate) fn execute_block(&mut self, statements: &[AstNode]) -> ExecResult<ControlFlow> {
        for stmt in statements {
            let flow = self.execute_statement(stmt)?;
            if !matches!(flow, ControlFlow::Normal) {
                return Ok(flow);
            }
        }
        Ok(ControlFlow::Normal)
    }

    fn execute_declarator(&mut self, kind: DeclKind, decl: &Declarator) -> ExecResult<()> {
        match (&decl.init, kind) {
            (Some(init), DeclKind::Var) => {
                let value = self.evaluate_expr(init)?;
                self.write_variable(&decl.name, value, decl.location)
            }
            // Already bound to undefined when the body was entered
            (None, DeclKind::Var) => Ok(()),
            (Some(init), _) => {
                let value = self.evaluate_expr(init)?;
                self.declare_variable(kind, &decl.name, value, decl.location)
            }
            (None, _) => self.declare_variable(kind, &decl.name, Value::Undefined, decl.location),
        }
    }

    fn execute_for(
        &mut self,
        init: Option<&AstNode>,
        condition: Option<&AstNode>,
        update: Option<&AstNode>,
        body: &[AstNode],
    ) -> ExecResult<ControlFlow> {
        if let Some(init) = init {
            self.execute_statement(init)?;
        }

        loop {
            if let Some(condition) = condition {
                if !self.evaluate_expr(condition)?.truthy() {
                    break;
                }
            }

            match self.execute_block(body)? {
                ControlFlow::Break => break,
                ControlFlow::Return(value) => return Ok(ControlFlow::Return(value)),
                ControlFlow::Normal | ControlFlow::Continue => {}
            }

            if let Some(update) = update {
                self.evaluate_expr(update)?;
            }
        }

        Ok(ControlFlow::Normal)
    }

    fn execute_try(
        &mut self,
        block: &[AstNode],
        handler: Option<&CatchClause>,
        finalizer: Option<&[AstNode]>,
    ) -> ExecResult<ControlFlow> {
        let depth = self.context.stack.depth();
        let result = match (self.execute_block(block), handler) {
            (Err(exception), Some(handler)) => {
                self.context.stack.truncate(depth);
                self.execute_catch(handler, &exception)
            }
            (result, _) => result,
        };

        if let Some(finalizer) = finalizer {
            // An abrupt finally overrides whatever the try or catch produced
            match self.execute_block(finalizer)? {
                ControlFlow::Normal => {}
                flow => return Ok(flow),
            }
        }

        result
    }

    fn execute_catch(
        &mut self,
        handler: &CatchClause,
        exception: &Exception,
    ) -> ExecResult<ControlFlow> {
        let value = self.exception_value(exception)?;
        let Some(param) = &handler.param else {
            return self.execute_block(&handler.body);
        };

        let parent = self.context.current_scope();
        let catch_scope = self
            .context
            .heap
            .allocate(ObjectKind::Scope {
                parent,
                bindings: vec![Binding {
                    name: Rc::from(param.as_str()),
                    value,
                    mutable: true,
                }],
            })
            .map_err(|err| self.heap_failure(err, *exception.error.location()))?;

        self.set_frame_scope(Some(catch_scope));
        let result = self.execute_block(&handler.body);
        self.set_frame_scope(parent);
        result
    }

    fn set_frame_scope(&mut self, scope: Option<ObjectId>) {
        if let Some(frame) = self.context.stack.current_frame_mut() {
            frame.scope = scope;
        }
    }
}
