use crate::ast::{AssignOp, BinaryOp, Expr};
use crate::span::Spanned;

use super::Emitter;

/// Suffix characters the host language allows on numeric literals.
const NUMERIC_SUFFIXES: &[char] = &['f', 'd', 'u', 'm', 'l', 'F', 'D', 'U', 'M', 'L'];

/// Render a host numeric literal in kernel syntax: suffixes are stripped and
/// float literals without a decimal point gain `.0` (`5f` → `5.0`).
pub(super) fn format_numeric_literal(text: &str) -> String {
    if text.starts_with("0x") || text.starts_with("0X") {
        // d and f are hex digits here.
        return text.trim_end_matches(['u', 'l', 'U', 'L']).to_string();
    }
    let mut out = text.trim_end_matches(NUMERIC_SUFFIXES).to_string();
    let is_float = text.ends_with(['f', 'F']);
    if is_float && !text.contains('.') {
        out.push_str(".0");
    }
    out
}

fn is_supported_binary(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Modulo
            | BinaryOp::LeftShift
            | BinaryOp::RightShift
            | BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual
            | BinaryOp::NotEquals
    )
}

impl Emitter<'_> {
    pub(super) fn emit_expr(&mut self, expr: &Spanned<Expr>) {
        match &expr.node {
            Expr::NumericLiteral { text } => {
                self.output.push_str(&format_numeric_literal(text));
            }
            Expr::Assignment {
                op: AssignOp::Assign,
                lhs,
                rhs,
            } => {
                self.emit_expr(lhs);
                self.output.push(' ');
                self.output.push_str(AssignOp::Assign.as_str());
                self.output.push(' ');
                self.emit_expr(rhs);
            }
            Expr::Identifier { name } => self.output.push_str(name),
            Expr::MemberAccess { target, name } => {
                self.emit_expr(target);
                self.output.push('.');
                self.output.push_str(&name.node);
            }
            Expr::Invocation { callee, args } => {
                self.emit_expr(callee);
                self.emit_arguments(args.as_deref());
            }
            Expr::Cast { ty, operand } => {
                let target = self.translate_type(ty, false);
                self.output.push('(');
                self.output.push_str(&target);
                self.output.push(')');
                self.emit_expr(operand);
            }
            Expr::ElementAccess { target, indices } => {
                self.emit_expr(target);
                if !indices.is_empty() {
                    self.output.push('[');
                    self.emit_comma_separated(indices);
                    self.output.push(']');
                }
            }
            Expr::Parenthesized { inner } => {
                self.output.push('(');
                self.emit_expr(inner);
                self.output.push(')');
            }
            Expr::Binary { op, lhs, rhs } if is_supported_binary(*op) => {
                self.emit_expr(lhs);
                self.output.push(' ');
                self.output.push_str(op.as_str());
                self.output.push(' ');
                self.emit_expr(rhs);
            }
            Expr::ObjectCreation { ty, args } => {
                let target = self.translate_type(ty, false);
                self.output.push_str(&target);
                self.emit_arguments(args.as_deref());
            }
            other => self.unsupported(other.syntax_kind(), other.node_type(), expr.span),
        }
    }

    /// Parenthesized argument list. An absent list emits nothing; an
    /// explicit empty one emits `()`.
    pub(super) fn emit_arguments(&mut self, args: Option<&[Spanned<Expr>]>) {
        if let Some(args) = args {
            self.output.push('(');
            self.emit_comma_separated(args);
            self.output.push(')');
        }
    }

    pub(super) fn emit_comma_separated(&mut self, exprs: &[Spanned<Expr>]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.emit_expr(expr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_suffix_gets_decimal_point() {
        assert_eq!(format_numeric_literal("5f"), "5.0");
        assert_eq!(format_numeric_literal("5F"), "5.0");
        assert_eq!(format_numeric_literal("10f"), "10.0");
    }

    #[test]
    fn test_float_with_decimal_point_unchanged() {
        assert_eq!(format_numeric_literal("5.0f"), "5.0");
        assert_eq!(format_numeric_literal("0.25f"), "0.25");
    }

    #[test]
    fn test_other_suffixes_stripped() {
        assert_eq!(format_numeric_literal("10u"), "10");
        assert_eq!(format_numeric_literal("10UL"), "10");
        assert_eq!(format_numeric_literal("2.5d"), "2.5");
        assert_eq!(format_numeric_literal("3m"), "3");
        assert_eq!(format_numeric_literal("42"), "42");
    }

    #[test]
    fn test_hex_literal_keeps_digits() {
        assert_eq!(format_numeric_literal("0xFF"), "0xFF");
        assert_eq!(format_numeric_literal("0x1Fu"), "0x1F");
    }
}
