//! Host-language syntax tree handed over by the external parser.
//!
//! Only the shapes the transpiler inspects are modelled precisely; anything
//! else the parser saw still gets a variant so that it can be reported with
//! its kind and line instead of being dropped.

use serde::{Deserialize, Serialize};

use crate::span::{Span, Spanned};

/// One parsed host source file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path of the declaring file, as it should appear in diagnostics.
    pub path: String,
    /// Original source text, used for rich diagnostic rendering when present.
    #[serde(default)]
    pub text: Option<String>,
    pub classes: Vec<ClassDecl>,
}

/// A class whose fields and methods make up one kernel file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: Spanned<String>,
    #[serde(default)]
    pub members: Vec<Spanned<Member>>,
}

impl ClassDecl {
    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.members.iter().filter_map(|m| match &m.node {
            Member::Field(field) => Some(field),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|m| match &m.node {
            Member::Method(method) => Some(method),
            _ => None,
        })
    }
}

/// Class members. Constructors and properties are carried along but never
/// translated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
    Constructor { name: String },
    Property { name: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub ty: Spanned<TypeRef>,
    pub variables: Vec<VariableDecl>,
}

/// One declarator of a field or local: `name = init`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: Spanned<String>,
    #[serde(default)]
    pub init: Option<Spanned<Expr>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    #[serde(default)]
    pub attributes: Vec<AttributeList>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub return_ty: Spanned<TypeRef>,
    pub name: Spanned<String>,
    #[serde(default)]
    pub params: Vec<Param>,
    /// `None` for abstract or expression-bodied methods.
    #[serde(default)]
    pub body: Option<Spanned<Block>>,
}

impl MethodDecl {
    /// Whether any attribute list carries an attribute with this name.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes
            .iter()
            .flat_map(|list| list.attributes.iter())
            .any(|attr| attr.name.node == name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Param {
    #[serde(default)]
    pub attributes: Vec<AttributeList>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub ty: Spanned<TypeRef>,
    pub name: Spanned<String>,
    #[serde(default)]
    pub default: Option<Spanned<Expr>>,
}

/// A bracketed attribute group: `[a, b(1, 2)]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeList {
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: Spanned<String>,
    /// `None` when the attribute is written without parentheses.
    #[serde(default)]
    pub args: Option<Vec<Spanned<Expr>>>,
}

/// Type references as written in source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TypeRef {
    /// `float4`, `MyStruct`
    Identifier { name: String },
    /// Keyword types: `uint`, `float`, `void`
    Predefined { name: String },
    /// `Left.Right`
    Qualified {
        left: Box<Spanned<TypeRef>>,
        right: Box<Spanned<TypeRef>>,
    },
    /// `Name<A, B>`
    Generic {
        name: String,
        #[serde(default)]
        args: Option<Vec<Spanned<TypeRef>>>,
    },
    Array {
        element: Box<Spanned<TypeRef>>,
        rank: u32,
    },
    Pointer { element: Box<Spanned<TypeRef>> },
    Nullable { element: Box<Spanned<TypeRef>> },
    Tuple { elements: Vec<Spanned<TypeRef>> },
}

impl TypeRef {
    pub fn syntax_kind(&self) -> &'static str {
        match self {
            TypeRef::Identifier { .. } => "IdentifierName",
            TypeRef::Predefined { .. } => "PredefinedType",
            TypeRef::Qualified { .. } => "QualifiedName",
            TypeRef::Generic { .. } => "GenericName",
            TypeRef::Array { .. } => "ArrayType",
            TypeRef::Pointer { .. } => "PointerType",
            TypeRef::Nullable { .. } => "NullableType",
            TypeRef::Tuple { .. } => "TupleType",
        }
    }

    pub fn node_type(&self) -> &'static str {
        match self {
            TypeRef::Identifier { .. } => "TypeRef::Identifier",
            TypeRef::Predefined { .. } => "TypeRef::Predefined",
            TypeRef::Qualified { .. } => "TypeRef::Qualified",
            TypeRef::Generic { .. } => "TypeRef::Generic",
            TypeRef::Array { .. } => "TypeRef::Array",
            TypeRef::Pointer { .. } => "TypeRef::Pointer",
            TypeRef::Nullable { .. } => "TypeRef::Nullable",
            TypeRef::Tuple { .. } => "TypeRef::Tuple",
        }
    }
}

/// A method body or braced statement group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Spanned<Stmt>>,
}

/// Statements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Stmt {
    Expression {
        expr: Spanned<Expr>,
    },
    Return {
        #[serde(default)]
        value: Option<Spanned<Expr>>,
    },
    If {
        condition: Spanned<Expr>,
        then_branch: Box<Spanned<Stmt>>,
        #[serde(default)]
        else_branch: Option<Box<Spanned<Stmt>>>,
    },
    Block(Block),
    LocalDeclaration {
        ty: Spanned<TypeRef>,
        variables: Vec<VariableDecl>,
    },
    While {
        condition: Spanned<Expr>,
        body: Box<Spanned<Stmt>>,
    },
    For {
        body: Box<Spanned<Stmt>>,
    },
    Break,
    Continue,
    Empty,
}

impl Stmt {
    pub fn syntax_kind(&self) -> &'static str {
        match self {
            Stmt::Expression { .. } => "ExpressionStatement",
            Stmt::Return { .. } => "ReturnStatement",
            Stmt::If { .. } => "IfStatement",
            Stmt::Block(_) => "Block",
            Stmt::LocalDeclaration { .. } => "LocalDeclarationStatement",
            Stmt::While { .. } => "WhileStatement",
            Stmt::For { .. } => "ForStatement",
            Stmt::Break => "BreakStatement",
            Stmt::Continue => "ContinueStatement",
            Stmt::Empty => "EmptyStatement",
        }
    }

    pub fn node_type(&self) -> &'static str {
        match self {
            Stmt::Expression { .. } => "Stmt::Expression",
            Stmt::Return { .. } => "Stmt::Return",
            Stmt::If { .. } => "Stmt::If",
            Stmt::Block(_) => "Stmt::Block",
            Stmt::LocalDeclaration { .. } => "Stmt::LocalDeclaration",
            Stmt::While { .. } => "Stmt::While",
            Stmt::For { .. } => "Stmt::For",
            Stmt::Break => "Stmt::Break",
            Stmt::Continue => "Stmt::Continue",
            Stmt::Empty => "Stmt::Empty",
        }
    }
}

/// Expressions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Expr {
    /// Literal text exactly as written, suffix included (`5f`, `10u`).
    NumericLiteral {
        text: String,
    },
    StringLiteral {
        text: String,
    },
    BoolLiteral {
        value: bool,
    },
    Identifier {
        name: String,
    },
    MemberAccess {
        target: Box<Spanned<Expr>>,
        name: Spanned<String>,
    },
    Invocation {
        callee: Box<Spanned<Expr>>,
        /// `None` when the argument list is syntactically absent.
        #[serde(default)]
        args: Option<Vec<Spanned<Expr>>>,
    },
    Cast {
        ty: Spanned<TypeRef>,
        operand: Box<Spanned<Expr>>,
    },
    ElementAccess {
        target: Box<Spanned<Expr>>,
        indices: Vec<Spanned<Expr>>,
    },
    Parenthesized {
        inner: Box<Spanned<Expr>>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    Assignment {
        op: AssignOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    ObjectCreation {
        ty: Spanned<TypeRef>,
        #[serde(default)]
        args: Option<Vec<Spanned<Expr>>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Spanned<Expr>>,
    },
    Conditional {
        condition: Box<Spanned<Expr>>,
        when_true: Box<Spanned<Expr>>,
        when_false: Box<Spanned<Expr>>,
    },
}

impl Expr {
    pub fn syntax_kind(&self) -> &'static str {
        match self {
            Expr::NumericLiteral { .. } => "NumericLiteralExpression",
            Expr::StringLiteral { .. } => "StringLiteralExpression",
            Expr::BoolLiteral { value: true } => "TrueLiteralExpression",
            Expr::BoolLiteral { value: false } => "FalseLiteralExpression",
            Expr::Identifier { .. } => "IdentifierName",
            Expr::MemberAccess { .. } => "SimpleMemberAccessExpression",
            Expr::Invocation { .. } => "InvocationExpression",
            Expr::Cast { .. } => "CastExpression",
            Expr::ElementAccess { .. } => "ElementAccessExpression",
            Expr::Parenthesized { .. } => "ParenthesizedExpression",
            Expr::Binary { op, .. } => op.syntax_kind(),
            Expr::Assignment { op, .. } => op.syntax_kind(),
            Expr::ObjectCreation { .. } => "ObjectCreationExpression",
            Expr::Unary { op, .. } => op.syntax_kind(),
            Expr::Conditional { .. } => "ConditionalExpression",
        }
    }

    pub fn node_type(&self) -> &'static str {
        match self {
            Expr::NumericLiteral { .. } => "Expr::NumericLiteral",
            Expr::StringLiteral { .. } => "Expr::StringLiteral",
            Expr::BoolLiteral { .. } => "Expr::BoolLiteral",
            Expr::Identifier { .. } => "Expr::Identifier",
            Expr::MemberAccess { .. } => "Expr::MemberAccess",
            Expr::Invocation { .. } => "Expr::Invocation",
            Expr::Cast { .. } => "Expr::Cast",
            Expr::ElementAccess { .. } => "Expr::ElementAccess",
            Expr::Parenthesized { .. } => "Expr::Parenthesized",
            Expr::Binary { .. } => "Expr::Binary",
            Expr::Assignment { .. } => "Expr::Assignment",
            Expr::ObjectCreation { .. } => "Expr::ObjectCreation",
            Expr::Unary { .. } => "Expr::Unary",
            Expr::Conditional { .. } => "Expr::Conditional",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,                // +
    Subtract,           // -
    Multiply,           // *
    Divide,             // /
    Modulo,             // %
    LeftShift,          // <<
    RightShift,         // >>
    LessThan,           // <
    LessThanOrEqual,    // <=
    GreaterThan,        // >
    GreaterThanOrEqual, // >=
    NotEquals,          // !=
    Equals,             // ==
    LogicalAnd,         // &&
    LogicalOr,          // ||
    BitwiseAnd,         // &
    BitwiseOr,          // |
    ExclusiveOr,        // ^
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::NotEquals => "!=",
            BinaryOp::Equals => "==",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::ExclusiveOr => "^",
        }
    }

    pub fn syntax_kind(&self) -> &'static str {
        match self {
            BinaryOp::Add => "AddExpression",
            BinaryOp::Subtract => "SubtractExpression",
            BinaryOp::Multiply => "MultiplyExpression",
            BinaryOp::Divide => "DivideExpression",
            BinaryOp::Modulo => "ModuloExpression",
            BinaryOp::LeftShift => "LeftShiftExpression",
            BinaryOp::RightShift => "RightShiftExpression",
            BinaryOp::LessThan => "LessThanExpression",
            BinaryOp::LessThanOrEqual => "LessThanOrEqualExpression",
            BinaryOp::GreaterThan => "GreaterThanExpression",
            BinaryOp::GreaterThanOrEqual => "GreaterThanOrEqualExpression",
            BinaryOp::NotEquals => "NotEqualsExpression",
            BinaryOp::Equals => "EqualsExpression",
            BinaryOp::LogicalAnd => "LogicalAndExpression",
            BinaryOp::LogicalOr => "LogicalOrExpression",
            BinaryOp::BitwiseAnd => "BitwiseAndExpression",
            BinaryOp::BitwiseOr => "BitwiseOrExpression",
            BinaryOp::ExclusiveOr => "ExclusiveOrExpression",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,         // =
    AddAssign,      // +=
    SubtractAssign, // -=
    MultiplyAssign, // *=
    DivideAssign,   // /=
}

impl AssignOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubtractAssign => "-=",
            AssignOp::MultiplyAssign => "*=",
            AssignOp::DivideAssign => "/=",
        }
    }

    pub fn syntax_kind(&self) -> &'static str {
        match self {
            AssignOp::Assign => "SimpleAssignmentExpression",
            AssignOp::AddAssign => "AddAssignmentExpression",
            AssignOp::SubtractAssign => "SubtractAssignmentExpression",
            AssignOp::MultiplyAssign => "MultiplyAssignmentExpression",
            AssignOp::DivideAssign => "DivideAssignmentExpression",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,        // -x
    Not,           // !x
    PreIncrement,  // ++x
    PostIncrement, // x++
}

impl UnaryOp {
    pub fn syntax_kind(&self) -> &'static str {
        match self {
            UnaryOp::Negate => "UnaryMinusExpression",
            UnaryOp::Not => "LogicalNotExpression",
            UnaryOp::PreIncrement => "PreIncrementExpression",
            UnaryOp::PostIncrement => "PostIncrementExpression",
        }
    }
}
