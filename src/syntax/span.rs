use serde::{Deserialize, Serialize};

/// A source location: byte offset range plus the 1-based line it starts on.
///
/// The external parser fills these in; the transpiler only reads them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
    pub line: u32,
}

impl Span {
    pub fn new(start: u32, end: u32, line: u32) -> Self {
        Self { start, end, line }
    }

    /// A span that only knows its line (offsets collapse to zero).
    pub fn at_line(line: u32) -> Self {
        Self {
            start: 0,
            end: 0,
            line,
        }
    }

    pub fn dummy() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 0,
        }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: if self.start <= other.start {
                self.line
            } else {
                other.line
            },
        }
    }

    /// Line number as shown to users; unknown lines (0) report as line 1.
    pub fn display_line(&self) -> u32 {
        self.line.max(1)
    }
}

/// A value annotated with its source span.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub node: T,
    #[serde(default)]
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn dummy(node: T) -> Self {
        Self {
            node,
            span: Span::dummy(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }

    /// Re-anchor the node on a given source line.
    pub fn on_line(mut self, line: u32) -> Self {
        self.span.line = line;
        self
    }
}
