use crate::ast::TypeRef;
use crate::span::Spanned;

use super::Emitter;

/// Host container names and the kernel resource types they become.
const TYPE_TABLE: &[(&str, &str)] = &[
    ("NativeArray", "RWStructuredBuffer"),
    ("NativeList", "AppendStructuredBuffer"),
];

/// Read-write resource types and their read-only counterparts.
const READ_ONLY_TABLE: &[(&str, &str)] = &[("RWStructuredBuffer", "StructuredBuffer")];

/// Qualifier segment that requests the read-only counterpart.
const READ_ONLY_MARKER: &str = "ReadOnly";

/// Map a host type name through the translation table; unknown names pass
/// through unchanged.
pub fn translate_type_name(name: &str) -> &str {
    TYPE_TABLE
        .iter()
        .find(|(host, _)| *host == name)
        .map(|(_, kernel)| *kernel)
        .unwrap_or(name)
}

/// Read-only counterpart of a kernel resource type, if one is registered.
pub fn read_only_counterpart(name: &str) -> Option<&'static str> {
    READ_ONLY_TABLE
        .iter()
        .find(|(rw, _)| *rw == name)
        .map(|(_, ro)| *ro)
}

impl Emitter<'_> {
    /// Render a type reference in kernel syntax.
    ///
    /// On failure a diagnostic is recorded and whatever text was built so far
    /// is returned, so the caller can keep going.
    pub(super) fn translate_type(&mut self, ty: &Spanned<TypeRef>, read_only: bool) -> String {
        let mut out = String::new();
        match &ty.node {
            TypeRef::Identifier { name } | TypeRef::Predefined { name } => {
                let mapped = translate_type_name(name);
                if read_only {
                    self.push_read_only(&mut out, mapped, ty);
                } else {
                    out.push_str(mapped);
                }
            }
            TypeRef::Qualified { left, right } => {
                let segment = self.translate_type(right, false);
                if segment == READ_ONLY_MARKER {
                    out.push_str(&self.translate_type(left, true));
                } else {
                    // Kernel code has no namespaces: keep the innermost name.
                    out.push_str(&segment);
                }
            }
            TypeRef::Generic { name, args } => {
                let mapped = translate_type_name(name);
                if read_only {
                    self.push_read_only(&mut out, mapped, ty);
                } else {
                    out.push_str(mapped);
                }
                if let Some(args) = args {
                    out.push('<');
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            out.push(' ');
                        }
                        out.push_str(&self.translate_type(arg, false));
                    }
                    out.push('>');
                }
            }
            other => self.unsupported(other.syntax_kind(), other.node_type(), ty.span),
        }
        out
    }

    fn push_read_only(&mut self, out: &mut String, mapped: &str, ty: &Spanned<TypeRef>) {
        match read_only_counterpart(mapped) {
            Some(ro) => out.push_str(ro),
            None => {
                self.error(format!("failed to convert {} to read only", mapped), ty.span);
                out.push_str(mapped);
            }
        }
    }
}
