// AST (Abstract Syntax Tree) definitions for the script language

use std::rc::Rc;

/// Source location information for error reporting.
///
/// `line` and `column` are 1-based and point at the first character of the
/// construct. `offset` is the 0-based character offset of that character in the
/// unit's source text and `len` the number of characters the construct spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub len: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line,
            column,
            offset: 0,
            len: 0,
        }
    }

    pub fn with_extent(mut self, offset: usize, len: usize) -> Self {
        self.offset = offset;
        self.len = len;
        self
    }

    /// Character offset one past the end of this span
    pub fn end_offset(&self) -> usize {
        self.offset + self.len
    }

    /// Extends this span so that it ends where `other` ends.
    pub fn through(self, other: SourceLocation) -> Self {
        let end = other.end_offset().max(self.end_offset());
        Self {
            len: end - self.offset,
            ..self
        }
    }
}

/// Declaration keyword used by a variable declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical (short-circuit)
    And,
    Or,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,     // -x
    Plus,    // +x
    Not,     // !x
    Typeof,  // typeof x
    PreInc,  // ++x
    PreDec,  // --x
    PostInc, // x++
    PostDec, // x--
}

impl UnOp {
    pub fn is_update(self) -> bool {
        matches!(
            self,
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec
        )
    }
}

/// Body of a function literal
#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Vec<AstNode>),
    /// Concise arrow body: `x => x + 1`
    Expression(Box<AstNode>),
}

/// A function literal, shared between every closure created from it
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: FunctionBody,
    /// Span of the whole function text, used for `toString`
    pub location: SourceLocation,
}

/// One `name = init` entry of a declaration statement
#[derive(Debug, Clone)]
pub struct Declarator {
    pub name: String,
    pub init: Option<AstNode>,
    pub location: SourceLocation,
}

/// `catch (param) { body }` clause of a try statement
#[derive(Debug, Clone)]
pub struct CatchClause {
    pub param: Option<String>,
    pub body: Vec<AstNode>,
}

/// Key/value entry of an object literal
#[derive(Debug, Clone)]
pub struct PropertyInit {
    pub key: String,
    pub value: AstNode,
}

/// AST nodes representing statements and expressions
#[derive(Debug, Clone)]
pub enum AstNode {
    // Statements
    VarDecl {
        kind: DeclKind,
        declarations: Vec<Declarator>,
        location: SourceLocation,
    },
    FunctionDecl {
        function: Rc<FunctionDef>,
    },
    Return {
        expr: Option<Box<AstNode>>,
        location: SourceLocation,
    },
    If {
        condition: Box<AstNode>,
        then_branch: Vec<AstNode>,
        else_branch: Option<Vec<AstNode>>,
        location: SourceLocation,
    },
    While {
        condition: Box<AstNode>,
        body: Vec<AstNode>,
        location: SourceLocation,
    },
    DoWhile {
        body: Vec<AstNode>,
        condition: Box<AstNode>,
        location: SourceLocation,
    },
    For {
        init: Option<Box<AstNode>>,
        condition: Option<Box<AstNode>>,
        update: Option<Box<AstNode>>,
        body: Vec<AstNode>,
        location: SourceLocation,
    },
    Break {
        location: SourceLocation,
    },
    Continue {
        location: SourceLocation,
    },
    Throw {
        expr: Box<AstNode>,
        location: SourceLocation,
    },
    Try {
        block: Vec<AstNode>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<AstNode>>,
        location: SourceLocation,
    },
    Block {
        statements: Vec<AstNode>,
        location: SourceLocation,
    },
    Empty {
        location: SourceLocation,
    },
    ExpressionStatement {
        expr: Box<AstNode>,
        location: SourceLocation,
    },

    // Expressions
    NumberLiteral(f64, SourceLocation),
    StringLiteral(String, SourceLocation),
    BoolLiteral(bool, SourceLocation),
    Null {
        location: SourceLocation,
    },
    Undefined {
        location: SourceLocation,
    },
    Variable(String, SourceLocation),
    ArrayLiteral {
        elements: Vec<AstNode>,
        location: SourceLocation,
    },
    ObjectLiteral {
        properties: Vec<PropertyInit>,
        location: SourceLocation,
    },
    Function(Rc<FunctionDef>),
    BinaryOp {
        op: BinOp,
        left: Box<AstNode>,
        right: Box<AstNode>,
        location: SourceLocation,
    },
    UnaryOp {
        op: UnOp,
        operand: Box<AstNode>,
        location: SourceLocation,
    },
    Assignment {
        target: Box<AstNode>,
        value: Box<AstNode>,
        location: SourceLocation,
    },
    CompoundAssignment {
        target: Box<AstNode>,
        op: BinOp,
        value: Box<AstNode>,
        location: SourceLocation,
    },
    TernaryOp {
        condition: Box<AstNode>,
        true_expr: Box<AstNode>,
        false_expr: Box<AstNode>,
        location: SourceLocation,
    },
    /// `location` is the call site: the callee name or the accessed member
    Call {
        callee: Box<AstNode>,
        args: Vec<AstNode>,
        location: SourceLocation,
    },
    /// `object.property`; `location` spans the property name
    Member {
        object: Box<AstNode>,
        property: String,
        location: SourceLocation,
    },
    /// `object[index]`; `location` spans the bracketed index
    Index {
        object: Box<AstNode>,
        index: Box<AstNode>,
        location: SourceLocation,
    },
}

impl AstNode {
    /// Get the source location of this node
    pub fn location(&self) -> &SourceLocation {
        match self {
            AstNode::VarDecl { location, .. } => location,
            AstNode::FunctionDecl { function } => &function.location,
            AstNode::Return { location, .. } => location,
            AstNode::If { location, .. } => location,
            AstNode::While { location, .. } => location,
            AstNode::DoWhile { location, .. } => location,
            AstNode::For { location, .. } => location,
            AstNode::Break { location } => location,
            AstNode::Continue { location } => location,
            AstNode::Throw { location, .. } => location,
            AstNode::Try { location, .. } => location,
            AstNode::Block { location, .. } => location,
            AstNode::Empty { location } => location,
            AstNode::ExpressionStatement { location, .. } => location,
            AstNode::NumberLiteral(_, loc) => loc,
            AstNode::StringLiteral(_, loc) => loc,
            AstNode::BoolLiteral(_, loc) => loc,
            AstNode::Null { location } => location,
            AstNode::Undefined { location } => location,
            AstNode::Variable(_, loc) => loc,
            AstNode::ArrayLiteral { location, .. } => location,
            AstNode::ObjectLiteral { location, .. } => location,
            AstNode::Function(function) => &function.location,
            AstNode::BinaryOp { location, .. } => location,
            AstNode::UnaryOp { location, .. } => location,
            AstNode::Assignment { location, .. } => location,
            AstNode::CompoundAssignment { location, .. } => location,
            AstNode::TernaryOp { location, .. } => location,
            AstNode::Call { location, .. } => location,
            AstNode::Member { location, .. } => location,
            AstNode::Index { location, .. } => location,
        }
    }

    /// Whether this expression may appear on the left of `=`
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            AstNode::Variable(..) | AstNode::Member { .. } | AstNode::Index { .. }
        )
    }
}

/// A compiled unit: the statements of one script
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub nodes: Vec<AstNode>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }
}
