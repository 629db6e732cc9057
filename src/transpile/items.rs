use crate::ast::{Attribute, AttributeList, FieldDecl, MethodDecl, Param};

use super::{Emitter, ENTRY_ATTRIBUTE};

/// Host parameter modifiers and their kernel spelling.
const MODIFIER_TABLE: &[(&str, &str)] = &[("ref", "inout")];

fn translate_modifier(modifier: &str) -> &str {
    MODIFIER_TABLE
        .iter()
        .find(|(host, _)| *host == modifier)
        .map(|(_, kernel)| *kernel)
        .unwrap_or(modifier)
}

impl Emitter<'_> {
    pub(super) fn emit_class(&mut self) {
        let class = self.class;
        self.emit_kernel_pragmas(class.methods());
        for field in class.fields() {
            self.emit_field(field);
        }
        self.output.push('\n');
        for method in class.methods() {
            self.emit_method(method);
        }
    }

    fn emit_kernel_pragmas<'m>(&mut self, methods: impl Iterator<Item = &'m MethodDecl>) {
        for method in methods {
            if method.has_attribute(ENTRY_ATTRIBUTE) {
                self.output.push_str("#pragma kernel ");
                self.output.push_str(&method.name.node);
                self.output.push('\n');
            }
        }
        self.output.push('\n');
    }

    fn emit_field(&mut self, field: &FieldDecl) {
        let ty = self.translate_type(&field.ty, false);
        for var in &field.variables {
            self.output.push_str(&ty);
            self.output.push(' ');
            self.output.push_str(&var.name.node);
            if let Some(init) = &var.init {
                self.output.push_str(" = ");
                self.emit_expr(init);
            }
            self.output.push_str(";\n");
        }
    }

    fn emit_method(&mut self, method: &MethodDecl) {
        for list in &method.attributes {
            self.output.push('[');
            self.emit_attribute_list(list);
            self.output.push_str("]\n");
        }

        let return_ty = self.translate_type(&method.return_ty, false);
        self.output.push_str(&return_ty);
        self.output.push(' ');
        self.output.push_str(&method.name.node);
        self.output.push_str(" (");
        for (i, param) in method.params.iter().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.emit_param(param);
        }
        self.output.push_str(")\n");

        self.output.push_str("{\n");
        match &method.body {
            Some(body) => self.nested(|e| {
                for stmt in &body.node.stmts {
                    e.emit_stmt_line(stmt);
                }
            }),
            None => self.error(
                format!("declares {} without a block body", method.name.node),
                method.name.span,
            ),
        }
        self.output.push_str("}\n\n");
    }

    fn emit_attribute_list(&mut self, list: &AttributeList) {
        for (i, attr) in list.attributes.iter().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.emit_attribute(attr);
        }
    }

    fn emit_attribute(&mut self, attr: &Attribute) {
        self.output.push_str(&attr.name.node);
        self.emit_arguments(attr.args.as_deref());
    }

    fn emit_param(&mut self, param: &Param) {
        for modifier in &param.modifiers {
            self.output.push_str(translate_modifier(modifier));
            self.output.push(' ');
        }

        let ty = self.translate_type(&param.ty, false);
        self.output.push_str(&ty);
        self.output.push(' ');
        self.output.push_str(&param.name.node);

        if !param.attributes.is_empty() {
            self.output.push_str(" : ");
            for (i, list) in param.attributes.iter().enumerate() {
                if i > 0 {
                    self.output.push_str(", ");
                }
                self.emit_attribute_list(list);
            }
        }

        if let Some(default) = &param.default {
            self.output.push_str(" = ");
            self.emit_expr(default);
        }
    }
}
