use std::path::Path;

use super::*;
use crate::ast::{BinaryOp, Expr, Member, MethodDecl, Stmt, TypeRef};
use crate::span::{Span, Spanned};
use crate::syntax::build::*;

const PATH: &str = "Kernels/Test.cs";

fn lossy(class: &ClassDecl) -> Transpiled {
    transpile_lossy(Path::new(PATH), class)
}

/// Kernel class with a single `void CSMain(uint3 id : SV_DispatchThreadID)`
/// entry point whose body is `body`.
fn kernel_with_body(body: Vec<Spanned<Stmt>>) -> ClassDecl {
    class(
        "Test",
        vec![method(
            predefined("void"),
            "CSMain",
            vec![numthreads(8, 8, 1)],
            vec![dispatch_id_param("id")],
            body,
        )],
    )
}

/// Body lines of the only method, indentation included.
fn body_of(source: &str) -> Vec<&str> {
    let start = source.find("{\n").unwrap() + 2;
    let end = source.rfind("\n}\n").unwrap();
    source[start..end + 1].lines().collect()
}

fn emit_expr(expr: Spanned<Expr>) -> Transpiled {
    lossy(&kernel_with_body(vec![expr_stmt(expr)]))
}

fn expr_text(expr: Spanned<Expr>) -> String {
    let out = emit_expr(expr);
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
    body_of(&out.source)[0].trim().trim_end_matches(';').to_string()
}

fn field_text(ty: Spanned<TypeRef>) -> Transpiled {
    lossy(&class("Fields", vec![field(ty, "value", None)]))
}

// --- Whole classes ---

#[test]
fn test_simple_counter_kernel() {
    let class = class(
        "SimpleCounterKernel",
        vec![
            field(
                generic("RWStructuredBuffer", vec![predefined("uint")]),
                "strutureBuffer",
                None,
            ),
            Spanned::dummy(Member::Constructor {
                name: "SimpleCounterKernel".to_string(),
            }),
            method(
                predefined("void"),
                "CSMain",
                vec![numthreads(1, 1, 1)],
                vec![dispatch_id_param("id")],
                vec![expr_stmt(assign(
                    index(ident("strutureBuffer"), vec![member(ident("id"), "x")]),
                    binary(BinaryOp::Multiply, member(ident("id"), "x"), num("2")),
                ))],
            ),
        ],
    );
    let source = transpile(Path::new(PATH), &class).unwrap();
    assert_eq!(
        source,
        "#pragma kernel CSMain\n\
         \n\
         RWStructuredBuffer<uint> strutureBuffer;\n\
         \n\
         [numthreads(1, 1, 1)]\n\
         void CSMain (uint3 id : SV_DispatchThreadID)\n\
         {\n    strutureBuffer[id.x] = id.x * 2;\n}\n\n"
    );
}

#[test]
fn test_rainbow_kernel() {
    let id_x = || member(ident("id"), "x");
    let id_y = || member(ident("id"), "y");
    let channel = |id: Spanned<Expr>, period: &str| {
        binary(
            BinaryOp::Divide,
            binary(BinaryOp::Modulo, id, num(period)),
            num(period),
        )
    };
    let class = class(
        "RainbowExample",
        vec![
            field(generic("RWTexture2D", vec![ty("float4")]), "m_texture", None),
            method(
                predefined("void"),
                "Main",
                vec![numthreads(32, 32, 1)],
                vec![dispatch_id_param("id")],
                vec![expr_stmt(assign(
                    index(ident("m_texture"), vec![member(ident("id"), "xy")]),
                    new_object(
                        ty("float4"),
                        vec![
                            channel(id_x(), "10f"),
                            channel(id_y(), "15f"),
                            num("1f"),
                            num("1f"),
                        ],
                    ),
                ))],
            ),
        ],
    );
    let source = transpile(Path::new(PATH), &class).unwrap();
    assert!(source.starts_with("#pragma kernel Main\n\nRWTexture2D<float4> m_texture;\n\n"));
    assert!(source.contains("[numthreads(32, 32, 1)]\nvoid Main (uint3 id : SV_DispatchThreadID)\n"));
    assert!(source.contains(
        "    m_texture[id.xy] = float4(id.x % 10.0 / 10.0, id.y % 15.0 / 15.0, 1.0, 1.0);\n"
    ));
}

#[test]
fn test_pragmas_in_declaration_order_before_fields() {
    let class = class(
        "Multi",
        vec![
            method(predefined("void"), "Helper", vec![], vec![], vec![]),
            method(predefined("void"), "Second", vec![numthreads(1, 1, 1)], vec![], vec![]),
            field(predefined("float"), "scale", Some(num("2f"))),
            method(predefined("void"), "First", vec![numthreads(64, 1, 1)], vec![], vec![]),
        ],
    );
    let source = transpile(Path::new(PATH), &class).unwrap();
    assert!(source.starts_with("#pragma kernel Second\n#pragma kernel First\n\nfloat scale = 2.0;\n\n"));
    assert!(!source.contains("#pragma kernel Helper"));
    let helper = source.find("void Helper ()").unwrap();
    let second = source.find("void Second ()").unwrap();
    let first = source.find("void First ()").unwrap();
    assert!(helper < second && second < first);
}

#[test]
fn test_no_entry_points_still_separates_sections() {
    let class = class("Plain", vec![field(predefined("int"), "count", None)]);
    let source = transpile(Path::new(PATH), &class).unwrap();
    assert_eq!(source, "\nint count;\n\n");
}

#[test]
fn test_field_with_several_declarators() {
    let member = Spanned::dummy(Member::Field(crate::ast::FieldDecl {
        modifiers: vec![],
        ty: predefined("float"),
        variables: vec![
            crate::ast::VariableDecl {
                name: name("a"),
                init: None,
            },
            crate::ast::VariableDecl {
                name: name("b"),
                init: Some(num("0.5f")),
            },
        ],
    }));
    let source = transpile(Path::new(PATH), &class("Pair", vec![member])).unwrap();
    assert!(source.contains("float a;\nfloat b = 0.5;\n"));
}

#[test]
fn test_constructors_and_properties_are_skipped() {
    let class = class(
        "Skip",
        vec![
            Spanned::dummy(Member::Constructor {
                name: "Skip".to_string(),
            }),
            Spanned::dummy(Member::Property {
                name: "Size".to_string(),
            }),
        ],
    );
    let out = lossy(&class);
    assert!(out.diagnostics.is_empty());
    assert_eq!(out.source, "\n\n");
}

// --- Methods and parameters ---

#[test]
fn test_parameter_modifiers_semantics_and_defaults() {
    let mut counter = param(predefined("int"), "counter");
    counter.modifiers = vec!["ref".to_string()];
    let mut scale = param(predefined("float"), "scale");
    scale.default = Some(num("1f"));
    let class = class(
        "Params",
        vec![method(
            predefined("float"),
            "Apply",
            vec![],
            vec![counter, scale, dispatch_id_param("id")],
            vec![ret(binary(BinaryOp::Multiply, ident("scale"), num("2")))],
        )],
    );
    let source = transpile(Path::new(PATH), &class).unwrap();
    assert!(source.contains(
        "float Apply (inout int counter, float scale = 1.0, uint3 id : SV_DispatchThreadID)\n"
    ));
    assert!(source.contains("    return scale * 2;\n"));
}

#[test]
fn test_multiple_attribute_lists() {
    let class = class(
        "Attrs",
        vec![method(
            predefined("void"),
            "Main",
            vec![
                numthreads(4, 4, 4),
                attribute_list(vec![
                    attribute("unroll", None),
                    attribute("branch", Some(vec![])),
                ]),
            ],
            vec![],
            vec![],
        )],
    );
    let source = transpile(Path::new(PATH), &class).unwrap();
    assert!(source.contains("[numthreads(4, 4, 4)]\n[unroll, branch()]\nvoid Main ()\n{\n}\n"));
}

#[test]
fn test_method_without_body_is_reported() {
    let mut member = method(predefined("void"), "Abstract", vec![], vec![], vec![]);
    if let Member::Method(MethodDecl { body, .. }) = &mut member.node {
        *body = None;
    }
    let out = lossy(&class("NoBody", vec![member]));
    assert_eq!(out.diagnostics.len(), 1);
    assert!(out.diagnostics[0].message.contains("Abstract without a block body"));
}

// --- Types ---

#[test]
fn test_native_array_maps_to_structured_buffer() {
    let out = field_text(generic("NativeArray", vec![predefined("float")]));
    assert!(out.source.contains("RWStructuredBuffer<float> value;"));
}

#[test]
fn test_read_only_qualifier_uses_counterpart() {
    let out = field_text(qualified(
        generic("NativeArray", vec![predefined("float")]),
        ty("ReadOnly"),
    ));
    assert!(out.diagnostics.is_empty());
    assert!(out.source.contains("StructuredBuffer<float> value;"));
    assert!(!out.source.contains("RWStructuredBuffer"));
}

#[test]
fn test_read_only_without_counterpart_is_an_error() {
    let out = field_text(qualified(
        generic("NativeList", vec![predefined("int")]),
        ty("ReadOnly"),
    ));
    assert_eq!(out.diagnostics.len(), 1);
    assert!(out.diagnostics[0]
        .message
        .contains("failed to convert AppendStructuredBuffer to read only"));
    // Partial text is still produced.
    assert!(out.source.contains("AppendStructuredBuffer<int> value;"));
}

#[test]
fn test_read_only_on_plain_identifier_is_an_error() {
    let out = field_text(qualified(ty("float4"), ty("ReadOnly")));
    assert_eq!(out.diagnostics.len(), 1);
    assert!(out.diagnostics[0].message.contains("failed to convert float4 to read only"));
}

#[test]
fn test_generic_arguments_are_space_separated() {
    let out = field_text(generic("Pair", vec![ty("A"), generic("NativeArray", vec![ty("B")])]));
    assert!(out.source.contains("Pair<A RWStructuredBuffer<B>> value;"));
}

#[test]
fn test_namespace_qualification_is_dropped() {
    let out = field_text(qualified(qualified(ty("Unity"), ty("Mathematics")), ty("float4")));
    assert!(out.diagnostics.is_empty());
    assert!(out.source.contains("float4 value;"));
}

#[test]
fn test_unsupported_type_shape() {
    let array = Spanned::new(
        TypeRef::Array {
            element: Box::new(predefined("float")),
            rank: 1,
        },
        Span::at_line(5),
    );
    let out = field_text(array);
    assert_eq!(out.diagnostics.len(), 1);
    assert!(out.diagnostics[0]
        .message
        .contains("uses ArrayType (TypeRef::Array) which isn't supported"));
    assert_eq!(out.diagnostics[0].link().as_deref(), Some("Kernels/Test.cs:5"));
    assert!(out.source.contains(" value;"));
}

// --- Expressions ---

#[test]
fn test_numeric_literals() {
    assert_eq!(expr_text(num("5f")), "5.0");
    assert_eq!(expr_text(num("5.0f")), "5.0");
    assert_eq!(expr_text(num("7u")), "7");
}

#[test]
fn test_member_and_element_access() {
    assert_eq!(
        expr_text(index(member(ident("grid"), "cells"), vec![ident("x"), ident("y")])),
        "grid.cells[x, y]"
    );
    assert_eq!(expr_text(index(ident("grid"), vec![])), "grid");
}

#[test]
fn test_invocation_argument_lists() {
    assert_eq!(expr_text(call(ident("max"), vec![ident("a"), num("0")])), "max(a, 0)");
    assert_eq!(expr_text(call(ident("Barrier"), vec![])), "Barrier()");
    let bare = Spanned::dummy(Expr::Invocation {
        callee: Box::new(ident("Barrier")),
        args: None,
    });
    assert_eq!(expr_text(bare), "Barrier");
}

#[test]
fn test_cast_and_parentheses() {
    assert_eq!(
        expr_text(cast(
            predefined("float"),
            paren(binary(BinaryOp::Add, ident("a"), ident("b")))
        )),
        "(float)(a + b)"
    );
}

#[test]
fn test_supported_binary_operators() {
    let cases = [
        (BinaryOp::Add, "+"),
        (BinaryOp::Subtract, "-"),
        (BinaryOp::Multiply, "*"),
        (BinaryOp::Divide, "/"),
        (BinaryOp::Modulo, "%"),
        (BinaryOp::LeftShift, "<<"),
        (BinaryOp::RightShift, ">>"),
        (BinaryOp::LessThan, "<"),
        (BinaryOp::LessThanOrEqual, "<="),
        (BinaryOp::GreaterThan, ">"),
        (BinaryOp::GreaterThanOrEqual, ">="),
        (BinaryOp::NotEquals, "!="),
    ];
    for (op, token) in cases {
        assert_eq!(
            expr_text(binary(op, ident("a"), ident("b"))),
            format!("a {} b", token)
        );
    }
}

#[test]
fn test_equality_is_not_supported() {
    let out = emit_expr(binary(BinaryOp::Equals, ident("a"), ident("b")));
    assert_eq!(out.diagnostics.len(), 1);
    assert!(out.diagnostics[0].message.contains("EqualsExpression"));
}

#[test]
fn test_compound_assignment_is_not_supported() {
    let expr = Spanned::dummy(Expr::Assignment {
        op: crate::ast::AssignOp::AddAssign,
        lhs: Box::new(ident("a")),
        rhs: Box::new(num("1")),
    });
    let out = emit_expr(expr);
    assert_eq!(out.diagnostics.len(), 1);
    assert!(out.diagnostics[0].message.contains("AddAssignmentExpression"));
}

#[test]
fn test_object_creation() {
    assert_eq!(
        expr_text(new_object(ty("float2"), vec![num("1f"), num("0")])),
        "float2(1.0, 0)"
    );
}

#[test]
fn test_conditional_reports_line_and_siblings_continue() {
    let ternary = assign(
        ident("x"),
        conditional(ident("a"), ident("b"), ident("c")).on_line(12),
    );
    let body = vec![
        expr_stmt(ternary).on_line(12),
        expr_stmt(assign(ident("y"), num("1"))).on_line(13),
    ];
    let out = lossy(&kernel_with_body(body));
    assert_eq!(out.diagnostics.len(), 1);
    let diag = &out.diagnostics[0];
    assert_eq!(
        diag.message,
        "Shader \"Test\" uses ConditionalExpression (Expr::Conditional) which isn't supported."
    );
    assert_eq!(diag.link().as_deref(), Some("Kernels/Test.cs:12"));
    assert_eq!(diag.notes, vec!["Kernels/Test.cs:12".to_string()]);
    assert!(out.source.contains("    x = ;\n"));
    assert!(out.source.contains("    y = 1;\n"));
}

#[test]
fn test_every_error_in_a_class_is_reported() {
    let body = vec![
        expr_stmt(binary(BinaryOp::Equals, ident("a"), ident("b")).on_line(3)),
        Spanned::new(Stmt::Break, Span::at_line(4)),
        expr_stmt(conditional(ident("a"), ident("b"), ident("c")).on_line(5)),
    ];
    let errors = transpile(Path::new(PATH), &kernel_with_body(body)).unwrap_err();
    assert_eq!(errors.len(), 3);
    let lines: Vec<u32> = errors.iter().map(|d| d.span.line).collect();
    assert_eq!(lines, vec![3, 4, 5]);
}

#[test]
fn test_windows_paths_are_normalized() {
    let body = vec![Spanned::new(Stmt::Empty, Span::at_line(2))];
    let out = transpile_lossy(Path::new("Kernels\\Blur.cs"), &kernel_with_body(body));
    assert_eq!(out.diagnostics[0].link().as_deref(), Some("Kernels/Blur.cs:2"));
}

// --- Statements ---

#[test]
fn test_return_without_value_is_reported() {
    let body = vec![Spanned::new(Stmt::Return { value: None }, Span::at_line(9))];
    let out = lossy(&kernel_with_body(body));
    assert_eq!(out.diagnostics.len(), 1);
    assert!(out.diagnostics[0].message.contains("returns without a value"));
    assert_eq!(out.diagnostics[0].span.line, 9);
}

#[test]
fn test_if_else_layout_and_indent_restoration() {
    let id_x = || member(ident("id"), "x");
    let body = vec![
        if_stmt(
            binary(BinaryOp::LessThan, id_x(), ident("n")),
            block(vec![expr_stmt(assign(ident("a"), num("1")))]),
            Some(if_stmt(
                binary(BinaryOp::GreaterThan, id_x(), num("2")),
                expr_stmt(assign(ident("b"), num("2"))),
                None,
            )),
        ),
        expr_stmt(assign(ident("c"), num("3"))),
    ];
    let out = lossy(&kernel_with_body(body));
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
    assert_eq!(
        body_of(&out.source),
        vec![
            "    if (id.x < n)",
            "    {",
            "        a = 1;",
            "    }",
            "    else",
            "    {",
            "        if (id.x > 2)",
            "        {",
            "            b = 2;",
            "        }",
            "    }",
            "    c = 3;",
        ]
    );
}

#[test]
fn test_block_branch_with_several_statements() {
    let body = vec![if_stmt(
        ident("flag"),
        block(vec![
            expr_stmt(assign(ident("a"), num("1"))),
            expr_stmt(assign(ident("b"), num("2"))),
        ]),
        None,
    )];
    let out = lossy(&kernel_with_body(body));
    assert_eq!(
        body_of(&out.source),
        vec!["    if (flag)", "    {", "        a = 1;", "        b = 2;", "    }"]
    );
}

#[test]
fn test_indent_restored_after_error_inside_branch() {
    let body = vec![
        if_stmt(ident("flag"), Spanned::new(Stmt::Continue, Span::at_line(6)), None),
        expr_stmt(assign(ident("z"), num("0"))),
    ];
    let out = lossy(&kernel_with_body(body));
    assert_eq!(out.diagnostics.len(), 1);
    assert!(out.diagnostics[0].message.contains("ContinueStatement"));
    assert!(out.source.ends_with("    }\n    z = 0;\n}\n\n"));
}

#[test]
fn test_local_declarations_are_not_supported() {
    let local = Spanned::new(
        Stmt::LocalDeclaration {
            ty: predefined("float"),
            variables: vec![],
        },
        Span::at_line(8),
    );
    let out = lossy(&kernel_with_body(vec![local]));
    assert!(out.has_errors());
    assert!(out.diagnostics[0]
        .message
        .contains("uses LocalDeclarationStatement (Stmt::LocalDeclaration)"));
}
