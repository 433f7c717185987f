//! Expression evaluation implementation
//!
//! This module handles evaluation of every expression type:
//!
//! - Literals, including array, object and function literals
//! - Variables (scope chain, then the global object)
//! - Binary operators with the usual coercions (`+` concatenates strings)
//! - Unary operators, `typeof`, and prefix/postfix update
//! - Assignment and compound assignment to names, members and elements
//! - Member and index access, on objects, arrays and strings
//! - Calls to closures and built-ins

use std::cmp::Ordering;

use crate::interpreter::engine::{ExecResult, Interpreter};
use crate::interpreter::errors::RuntimeError;
use crate::memory::heap::ObjectKind;
use crate::memory::value::{number_to_string, ObjectId, Value};
use crate::parser::ast::*;

/// Something that can be assigned to
enum Reference {
    Variable(String),
    Property(Value, String),
    Element(Value, Value),
}

impl Interpreter {
    /// Evaluate an expression and return its value
    pub(crate) fn evaluate_expr(&mut self, expr: &AstNode) -> ExecResult<Value> {
        if self.expression_depth >= self.config().max_expression_depth {
            return Err(self.raise(RuntimeError::StackOverflow {
                location: *expr.location(),
            }));
        }
        self.expression_depth += 1;
        let result = self.evaluate_node(expr);
        self.expression_depth -= 1;
        result
    }

    fn evaluate_node(&mut self, expr: &AstNode) -> ExecResult<Value> {
        match expr {
            AstNode::NumberLiteral(n, _) => Ok(Value::Number(*n)),
            AstNode::StringLiteral(s, _) => Ok(Value::string(s.as_str())),
            AstNode::BoolLiteral(b, _) => Ok(Value::Bool(*b)),
            AstNode::Null { .. } => Ok(Value::Null),
            AstNode::Undefined { .. } => Ok(Value::Undefined),

            AstNode::Variable(name, location) => self.read_variable(name).ok_or_else(|| {
                self.raise(RuntimeError::UndefinedVariable {
                    name: name.clone(),
                    location: *location,
                })
            }),

            AstNode::ArrayLiteral { elements, location } => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate_expr(element)?);
                }
                self.context
                    .heap
                    .allocate(ObjectKind::Array(values))
                    .map(Value::Object)
                    .map_err(|err| self.heap_failure(err, *location))
            }

            AstNode::ObjectLiteral {
                properties,
                location,
            } => {
                let object = self
                    .context
                    .heap
                    .allocate(ObjectKind::Ordinary)
                    .map_err(|err| self.heap_failure(err, *location))?;
                for property in properties {
                    let value = self.evaluate_expr(&property.value)?;
                    self.context
                        .heap
                        .set_property(object, &property.key, value)
                        .map_err(|err| self.heap_failure(err, *location))?;
                }
                Ok(Value::Object(object))
            }

            AstNode::Function(function) => self.make_closure(function),

            AstNode::BinaryOp {
                op: BinOp::And,
                left,
                right,
                ..
            } => {
                let left = self.evaluate_expr(left)?;
                if left.truthy() {
                    self.evaluate_expr(right)
                } else {
                    Ok(left)
                }
            }

            AstNode::BinaryOp {
                op: BinOp::Or,
                left,
                right,
                ..
            } => {
                let left = self.evaluate_expr(left)?;
                if left.truthy() {
                    Ok(left)
                } else {
                    self.evaluate_expr(right)
                }
            }

            AstNode::BinaryOp {
                op, left, right, ..
            } => {
                let left = self.evaluate_expr(left)?;
                let right = self.evaluate_expr(right)?;
                Ok(self.binary_op(*op, &left, &right))
            }

            AstNode::UnaryOp { op, operand, .. } => self.evaluate_unary(*op, operand),

            AstNode::Assignment { target, value, .. } => {
                let reference = self.resolve_reference(target)?;
                let value = self.evaluate_expr(value)?;
                self.put_reference(reference, value.clone(), *target.location())?;
                Ok(value)
            }

            AstNode::CompoundAssignment {
                target, op, value, ..
            } => {
                let location = *target.location();
                let reference = self.resolve_reference(target)?;
                let current = self.get_reference(&reference, location)?;
                let rhs = self.evaluate_expr(value)?;
                let result = self.binary_op(*op, &current, &rhs);
                self.put_reference(reference, result.clone(), location)?;
                Ok(result)
            }

            AstNode::TernaryOp {
                condition,
                true_expr,
                false_expr,
                ..
            } => {
                if self.evaluate_expr(condition)?.truthy() {
                    self.evaluate_expr(true_expr)
                } else {
                    self.evaluate_expr(false_expr)
                }
            }

            AstNode::Call {
                callee,
                args,
                location,
            } => {
                let function = self.evaluate_expr(callee)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate_expr(arg)?);
                }
                match function.as_object().filter(|&id| self.is_callable(id)) {
                    Some(id) => self.call_function(id, values, Some(*location)),
                    None => Err(self.raise(RuntimeError::NotCallable {
                        callee: describe_callee(callee),
                        location: *location,
                    })),
                }
            }

            AstNode::Member {
                object,
                property,
                location,
            } => {
                let base = self.evaluate_expr(object)?;
                self.get_member(&base, property, *location)
            }

            AstNode::Index {
                object,
                index,
                location,
            } => {
                let base = self.evaluate_expr(object)?;
                let key = self.evaluate_expr(index)?;
                self.get_index(&base, &key, *location)
            }

            stmt => {
                // Statements never reach expression position after parsing
                self.execute_statement(stmt)?;
                Ok(Value::Undefined)
            }
        }
    }

    fn evaluate_unary(&mut self, op: UnOp, operand: &AstNode) -> ExecResult<Value> {
        match op {
            UnOp::Neg => {
                let value = self.evaluate_expr(operand)?;
                Ok(Value::Number(-self.to_number(&value)))
            }
            UnOp::Plus => {
                let value = self.evaluate_expr(operand)?;
                Ok(Value::Number(self.to_number(&value)))
            }
            UnOp::Not => Ok(Value::Bool(!self.evaluate_expr(operand)?.truthy())),
            UnOp::Typeof => {
                // Undeclared names are not an error under typeof
                let value = match operand {
                    AstNode::Variable(name, _) => self.read_variable(name).unwrap_or_default(),
                    _ => self.evaluate_expr(operand)?,
                };
                Ok(Value::string(self.type_of(&value)))
            }
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                let location = *operand.location();
                let reference = self.resolve_reference(operand)?;
                let current = self.get_reference(&reference, location)?;
                let old = self.to_number(&current);
                let new = if matches!(op, UnOp::PreInc | UnOp::PostInc) {
                    old + 1.0
                } else {
                    old - 1.0
                };
                self.put_reference(reference, Value::Number(new), location)?;
                Ok(Value::Number(if matches!(op, UnOp::PreInc | UnOp::PreDec) {
                    new
                } else {
                    old
                }))
            }
        }
    }

    // ===== References =====

    fn resolve_reference(&mut self, target: &AstNode) -> ExecResult<Reference> {
        match target {
            AstNode::Variable(name, _) => Ok(Reference::Variable(name.clone())),
            AstNode::Member {
                object, property, ..
            } => Ok(Reference::Property(
                self.evaluate_expr(object)?,
                property.clone(),
            )),
            AstNode::Index { object, index, .. } => {
                let base = self.evaluate_expr(object)?;
                let key = self.evaluate_expr(index)?;
                Ok(Reference::Element(base, key))
            }
            other => Err(self.raise(RuntimeError::Syntax {
                message: "Invalid left-hand side in assignment".to_string(),
                location: *other.location(),
            })),
        }
    }

    fn get_reference(&self, reference: &Reference, location: SourceLocation) -> ExecResult<Value> {
        match reference {
            Reference::Variable(name) => self.read_variable(name).ok_or_else(|| {
                self.raise(RuntimeError::UndefinedVariable {
                    name: name.clone(),
                    location,
                })
            }),
            Reference::Property(base, key) => self.get_member(base, key, location),
            Reference::Element(base, key) => self.get_index(base, key, location),
        }
    }

    fn put_reference(
        &mut self,
        reference: Reference,
        value: Value,
        location: SourceLocation,
    ) -> ExecResult<()> {
        match reference {
            Reference::Variable(name) => self.write_variable(&name, value, location),
            Reference::Property(base, key) => self.set_member(&base, &key, value, location),
            Reference::Element(base, key) => {
                if let (Some(id), Some(index)) = (base.as_object(), element_index(&key)) {
                    if self.is_array(id) {
                        return self
                            .context
                            .heap
                            .set_element(id, index, value)
                            .map_err(|err| self.heap_failure(err, location));
                    }
                }
                let key = self.property_key(&key);
                self.set_member(&base, &key, value, location)
            }
        }
    }

    // ===== Property access =====

    pub(crate) fn get_member(
        &self,
        base: &Value,
        key: &str,
        location: SourceLocation,
    ) -> ExecResult<Value> {
        match base {
            Value::Undefined | Value::Null => Err(self.raise(RuntimeError::ReadOfNullish {
                base: nullish_name(base),
                property: key.to_string(),
                location,
            })),
            Value::String(s) => Ok(if key == "length" {
                Value::Number(s.chars().count() as f64)
            } else {
                array_index(key)
                    .and_then(|index| s.chars().nth(index))
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or_default()
            }),
            Value::Object(id) => Ok(self.object_member(*id, key)),
            _ => Ok(Value::Undefined),
        }
    }

    fn object_member(&self, id: ObjectId, key: &str) -> Value {
        let heap = &self.context.heap;
        if let Some(value) = heap.get_property(id, key) {
            return value.clone();
        }

        match (&heap.object(id).kind, key) {
            (ObjectKind::Array(elements), "length") => Value::Number(elements.len() as f64),
            (ObjectKind::Array(elements), key) => array_index(key)
                .and_then(|index| elements.get(index).cloned())
                .unwrap_or_default(),
            (ObjectKind::Closure { function, .. }, "name") => {
                Value::string(function.name.as_deref().unwrap_or(""))
            }
            (ObjectKind::Closure { function, .. }, "length") => {
                Value::Number(function.params.len() as f64)
            }
            (ObjectKind::Native(builtin), "name") => Value::string(builtin.name()),
            (ObjectKind::Error(kind), "name") => Value::string(kind.name()),
            _ => Value::Undefined,
        }
    }

    fn get_index(&self, base: &Value, key: &Value, location: SourceLocation) -> ExecResult<Value> {
        if let (Some(id), Some(index)) = (base.as_object(), element_index(key)) {
            if let ObjectKind::Array(elements) = &self.context.heap.object(id).kind {
                return Ok(elements.get(index).cloned().unwrap_or_default());
            }
        }
        self.get_member(base, &self.property_key(key), location)
    }

    fn set_member(
        &mut self,
        base: &Value,
        key: &str,
        value: Value,
        location: SourceLocation,
    ) -> ExecResult<()> {
        match base {
            Value::Undefined | Value::Null => Err(self.raise(RuntimeError::WriteToNullish {
                base: nullish_name(base),
                property: key.to_string(),
                location,
            })),
            Value::Object(id) => {
                let id = *id;
                if self.is_array(id) {
                    if let Some(index) = array_index(key) {
                        return self
                            .context
                            .heap
                            .set_element(id, index, value)
                            .map_err(|err| self.heap_failure(err, location));
                    }
                }
                self.context
                    .heap
                    .set_property(id, key, value)
                    .map_err(|err| self.heap_failure(err, location))
            }
            // Writes to primitives are silently dropped
            _ => Ok(()),
        }
    }

    fn property_key(&self, key: &Value) -> String {
        self.display_string(key)
    }

    fn is_array(&self, id: ObjectId) -> bool {
        matches!(self.context.heap.object(id).kind, ObjectKind::Array(_))
    }

    fn is_callable(&self, id: ObjectId) -> bool {
        self.context.heap.object(id).kind.is_callable()
    }

    // ===== Operators =====

    pub(crate) fn binary_op(&self, op: BinOp, left: &Value, right: &Value) -> Value {
        match op {
            BinOp::Add => {
                let left = self.to_primitive(left);
                let right = self.to_primitive(right);
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    Value::string(format!("{}{}", left, right))
                } else {
                    Value::Number(left.to_number() + right.to_number())
                }
            }
            BinOp::Sub => Value::Number(self.to_number(left) - self.to_number(right)),
            BinOp::Mul => Value::Number(self.to_number(left) * self.to_number(right)),
            BinOp::Div => Value::Number(self.to_number(left) / self.to_number(right)),
            BinOp::Mod => Value::Number(self.to_number(left) % self.to_number(right)),
            BinOp::Eq => Value::Bool(self.loose_equals(left, right)),
            BinOp::Ne => Value::Bool(!self.loose_equals(left, right)),
            BinOp::StrictEq => Value::Bool(left.strict_equals(right)),
            BinOp::StrictNe => Value::Bool(!left.strict_equals(right)),
            BinOp::Lt => Value::Bool(self.compare(left, right) == Some(Ordering::Less)),
            BinOp::Gt => Value::Bool(self.compare(left, right) == Some(Ordering::Greater)),
            BinOp::Le => Value::Bool(matches!(
                self.compare(left, right),
                Some(Ordering::Less | Ordering::Equal)
            )),
            BinOp::Ge => Value::Bool(matches!(
                self.compare(left, right),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            // Short-circuit operators are handled before operands are evaluated
            BinOp::And => {
                if left.truthy() {
                    right.clone()
                } else {
                    left.clone()
                }
            }
            BinOp::Or => {
                if left.truthy() {
                    left.clone()
                } else {
                    right.clone()
                }
            }
        }
    }

    /// Objects convert to their display string; primitives are unchanged
    fn to_primitive(&self, value: &Value) -> Value {
        match value {
            Value::Object(_) => Value::string(self.display_string(value)),
            other => other.clone(),
        }
    }

    pub(crate) fn to_number(&self, value: &Value) -> f64 {
        self.to_primitive(value).to_number()
    }

    fn loose_equals(&self, left: &Value, right: &Value) -> bool {
        let left_is_object = matches!(left, Value::Object(_));
        let right_is_object = matches!(right, Value::Object(_));
        if left_is_object != right_is_object {
            let (object, other) = if left_is_object {
                (left, right)
            } else {
                (right, left)
            };
            if !other.is_nullish() {
                return self.to_primitive(object).loose_equals(other);
            }
        }
        left.loose_equals(right)
    }

    /// Relational comparison; `None` when either side is NaN
    fn compare(&self, left: &Value, right: &Value) -> Option<Ordering> {
        let left = self.to_primitive(left);
        let right = self.to_primitive(right);
        match (&left, &right) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => left.to_number().partial_cmp(&right.to_number()),
        }
    }

    pub(crate) fn type_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(id) if self.is_callable(*id) => "function",
            Value::Object(_) => "object",
        }
    }
}

fn nullish_name(value: &Value) -> &'static str {
    if matches!(value, Value::Null) {
        "null"
    } else {
        "undefined"
    }
}

/// Canonical array index form of a property key: digits without a leading zero
fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>()
        .ok()
        .filter(|&index| index < u32::MAX)
        .map(|index| index as usize)
}

fn element_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < u32::MAX as f64 => {
            Some(*n as usize)
        }
        Value::String(s) => array_index(s),
        _ => None,
    }
}

/// Source-like rendering of a callee for "is not a function" messages
fn describe_callee(callee: &AstNode) -> String {
    match callee {
        AstNode::Variable(name, _) => name.clone(),
        AstNode::Member {
            object, property, ..
        } => format!("{}.{}", describe_callee(object), property),
        AstNode::Index { object, index, .. } => {
            format!("{}[{}]", describe_callee(object), describe_callee(index))
        }
        AstNode::NumberLiteral(n, _) => number_to_string(*n),
        AstNode::StringLiteral(s, _) => format!("\"{}\"", s),
        AstNode::Call { callee, .. } => format!("{}(...)", describe_callee(callee)),
        _ => "(intermediate value)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_index() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("12"), Some(12));
        assert_eq!(array_index("012"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("+1"), None);
        assert_eq!(array_index("length"), None);
        assert_eq!(array_index("4294967294"), Some(4294967294));
        assert_eq!(array_index("4294967295"), None);
        assert_eq!(array_index("18446744073709551615"), None);
    }

    #[test]
    fn test_element_index() {
        assert_eq!(element_index(&Value::Number(3.0)), Some(3));
        assert_eq!(element_index(&Value::Number(1.5)), None);
        assert_eq!(element_index(&Value::Number(-1.0)), None);
        assert_eq!(element_index(&Value::string("2")), Some(2));
    }
}
