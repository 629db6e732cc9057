use crate::ast::Stmt;
use crate::span::Spanned;

use super::Emitter;

impl Emitter<'_> {
    /// Emit one statement starting at the current cursor (indentation
    /// already written). The statement's last line is left unterminated.
    pub(super) fn emit_stmt(&mut self, stmt: &Spanned<Stmt>) {
        match &stmt.node {
            Stmt::Expression { expr } => {
                self.emit_expr(expr);
                self.output.push(';');
            }
            Stmt::Return { value } => {
                self.output.push_str("return ");
                match value {
                    Some(value) => self.emit_expr(value),
                    None => self.error(
                        "returns without a value, which isn't supported".to_string(),
                        stmt.span,
                    ),
                }
                self.output.push(';');
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.output.push_str("if (");
                self.emit_expr(condition);
                self.output.push_str(")\n");
                self.emit_branch(then_branch);
                if let Some(else_branch) = else_branch {
                    self.output.push('\n');
                    self.push_indented_line("else");
                    self.emit_branch(else_branch);
                }
            }
            Stmt::Block(block) => {
                self.output.push_str("{\n");
                self.nested(|e| {
                    for inner in &block.stmts {
                        e.emit_stmt_line(inner);
                    }
                });
                self.push_indent();
                self.output.push('}');
            }
            other => self.unsupported(other.syntax_kind(), other.node_type(), stmt.span),
        }
    }

    /// Indent, emit, terminate the line.
    pub(super) fn emit_stmt_line(&mut self, stmt: &Spanned<Stmt>) {
        self.push_indent();
        self.emit_stmt(stmt);
        self.output.push('\n');
    }

    /// Braced branch body. A block's statements and a lone statement are
    /// laid out the same way, one level deeper than the braces.
    fn emit_branch(&mut self, body: &Spanned<Stmt>) {
        self.push_indented_line("{");
        self.nested(|e| match &body.node {
            Stmt::Block(block) => {
                for inner in &block.stmts {
                    e.emit_stmt_line(inner);
                }
            }
            _ => e.emit_stmt_line(body),
        });
        self.push_indent();
        self.output.push('}');
    }
}
