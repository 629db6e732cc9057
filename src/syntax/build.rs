//! Shorthand constructors for assembling syntax trees in code.
//!
//! Every node gets a dummy span; use [`Spanned::on_line`] where a line
//! matters.

use crate::ast::*;
use crate::span::{Span, Spanned};

fn boxed(expr: Spanned<Expr>) -> Box<Spanned<Expr>> {
    Box::new(expr)
}

pub fn name(text: &str) -> Spanned<String> {
    Spanned::dummy(text.to_string())
}

// --- Types ---

pub fn ty(name: &str) -> Spanned<TypeRef> {
    Spanned::dummy(TypeRef::Identifier {
        name: name.to_string(),
    })
}

pub fn predefined(name: &str) -> Spanned<TypeRef> {
    Spanned::dummy(TypeRef::Predefined {
        name: name.to_string(),
    })
}

pub fn generic(name: &str, args: Vec<Spanned<TypeRef>>) -> Spanned<TypeRef> {
    Spanned::dummy(TypeRef::Generic {
        name: name.to_string(),
        args: Some(args),
    })
}

pub fn qualified(left: Spanned<TypeRef>, right: Spanned<TypeRef>) -> Spanned<TypeRef> {
    Spanned::dummy(TypeRef::Qualified {
        left: Box::new(left),
        right: Box::new(right),
    })
}

// --- Expressions ---

pub fn num(text: &str) -> Spanned<Expr> {
    Spanned::dummy(Expr::NumericLiteral {
        text: text.to_string(),
    })
}

pub fn ident(name: &str) -> Spanned<Expr> {
    Spanned::dummy(Expr::Identifier {
        name: name.to_string(),
    })
}

pub fn member(target: Spanned<Expr>, field: &str) -> Spanned<Expr> {
    Spanned::dummy(Expr::MemberAccess {
        target: boxed(target),
        name: name(field),
    })
}

pub fn call(callee: Spanned<Expr>, args: Vec<Spanned<Expr>>) -> Spanned<Expr> {
    Spanned::dummy(Expr::Invocation {
        callee: boxed(callee),
        args: Some(args),
    })
}

pub fn cast(target: Spanned<TypeRef>, operand: Spanned<Expr>) -> Spanned<Expr> {
    Spanned::dummy(Expr::Cast {
        ty: target,
        operand: boxed(operand),
    })
}

pub fn index(target: Spanned<Expr>, indices: Vec<Spanned<Expr>>) -> Spanned<Expr> {
    Spanned::dummy(Expr::ElementAccess {
        target: boxed(target),
        indices,
    })
}

pub fn paren(inner: Spanned<Expr>) -> Spanned<Expr> {
    Spanned::dummy(Expr::Parenthesized {
        inner: boxed(inner),
    })
}

pub fn binary(op: BinaryOp, lhs: Spanned<Expr>, rhs: Spanned<Expr>) -> Spanned<Expr> {
    Spanned::dummy(Expr::Binary {
        op,
        lhs: boxed(lhs),
        rhs: boxed(rhs),
    })
}

pub fn assign(lhs: Spanned<Expr>, rhs: Spanned<Expr>) -> Spanned<Expr> {
    Spanned::dummy(Expr::Assignment {
        op: AssignOp::Assign,
        lhs: boxed(lhs),
        rhs: boxed(rhs),
    })
}

pub fn new_object(target: Spanned<TypeRef>, args: Vec<Spanned<Expr>>) -> Spanned<Expr> {
    Spanned::dummy(Expr::ObjectCreation {
        ty: target,
        args: Some(args),
    })
}

pub fn conditional(
    condition: Spanned<Expr>,
    when_true: Spanned<Expr>,
    when_false: Spanned<Expr>,
) -> Spanned<Expr> {
    Spanned::dummy(Expr::Conditional {
        condition: boxed(condition),
        when_true: boxed(when_true),
        when_false: boxed(when_false),
    })
}

// --- Statements ---

pub fn expr_stmt(expr: Spanned<Expr>) -> Spanned<Stmt> {
    let span = expr.span;
    Spanned::new(Stmt::Expression { expr }, span)
}

pub fn ret(value: Spanned<Expr>) -> Spanned<Stmt> {
    let span = value.span;
    Spanned::new(Stmt::Return { value: Some(value) }, span)
}

pub fn if_stmt(
    condition: Spanned<Expr>,
    then_branch: Spanned<Stmt>,
    else_branch: Option<Spanned<Stmt>>,
) -> Spanned<Stmt> {
    let span = condition.span;
    Spanned::new(
        Stmt::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        },
        span,
    )
}

pub fn block(stmts: Vec<Spanned<Stmt>>) -> Spanned<Stmt> {
    Spanned::dummy(Stmt::Block(Block { stmts }))
}

// --- Members ---

pub fn attribute(attr: &str, args: Option<Vec<Spanned<Expr>>>) -> Attribute {
    Attribute {
        name: name(attr),
        args,
    }
}

pub fn attribute_list(attributes: Vec<Attribute>) -> AttributeList {
    AttributeList {
        attributes,
        span: Span::dummy(),
    }
}

/// `[numthreads(x, y, z)]`
pub fn numthreads(x: u32, y: u32, z: u32) -> AttributeList {
    attribute_list(vec![attribute(
        "numthreads",
        Some(vec![
            num(&x.to_string()),
            num(&y.to_string()),
            num(&z.to_string()),
        ]),
    )])
}

pub fn field(field_ty: Spanned<TypeRef>, field: &str, init: Option<Spanned<Expr>>) -> Spanned<Member> {
    Spanned::dummy(Member::Field(FieldDecl {
        modifiers: Vec::new(),
        ty: field_ty,
        variables: vec![VariableDecl {
            name: name(field),
            init,
        }],
    }))
}

pub fn param(param_ty: Spanned<TypeRef>, param: &str) -> Param {
    Param {
        attributes: Vec::new(),
        modifiers: Vec::new(),
        ty: param_ty,
        name: name(param),
        default: None,
    }
}

/// `[SV_DispatchThreadID] uint3 id`
pub fn dispatch_id_param(param: &str) -> Param {
    Param {
        attributes: vec![attribute_list(vec![attribute("SV_DispatchThreadID", None)])],
        ..self::param(ty("uint3"), param)
    }
}

pub fn method(
    return_ty: Spanned<TypeRef>,
    method: &str,
    attributes: Vec<AttributeList>,
    params: Vec<Param>,
    body: Vec<Spanned<Stmt>>,
) -> Spanned<Member> {
    Spanned::dummy(Member::Method(MethodDecl {
        attributes,
        modifiers: vec!["public".to_string()],
        return_ty,
        name: name(method),
        params,
        body: Some(Spanned::dummy(Block { stmts: body })),
    }))
}

pub fn class(class: &str, members: Vec<Spanned<Member>>) -> ClassDecl {
    ClassDecl {
        name: name(class),
        members,
    }
}
