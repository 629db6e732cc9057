use std::fmt;

use crate::span::Span;

/// A transpiler diagnostic (error or warning).
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    /// Declaring file, relative to the project root.
    pub path: Option<String>,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Diagnostic {
    pub fn error(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message,
            span,
            path: None,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn warning(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message,
            span,
            path: None,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn in_file(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// `path:line` location an editor or terminal can jump to.
    pub fn link(&self) -> Option<String> {
        self.path
            .as_ref()
            .map(|path| format!("{}:{}", path, self.span.display_line()))
    }

    /// Render the diagnostic to stderr. With the source text at hand the
    /// report is drawn by ariadne; otherwise a plain one-line form is used.
    pub fn render(&self, source: Option<&str>) {
        match source {
            Some(source) => self.render_with_source(source),
            None => eprintln!("{}", self),
        }
    }

    fn render_with_source(&self, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let filename = self.path.as_deref().unwrap_or("<unknown>");

        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };

        let color = match self.severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        };

        let start = (self.span.start as usize).min(source.len());
        let end = (self.span.end as usize).clamp(start, source.len());

        let mut report = Report::build(kind, filename, start)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, start..end))
                    .with_message(&self.message)
                    .with_color(color),
            );

        for note in &self.notes {
            report = report.with_note(note);
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        if report
            .finish()
            .eprint((filename, Source::from(source)))
            .is_err()
        {
            eprintln!("{}", self);
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", label, self.message)?;
        if let Some(link) = self.link() {
            write!(f, "\n  --> {}", link)?;
        }
        for note in &self.notes {
            write!(f, "\n  = note: {}", note)?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  = help: {}", help)?;
        }
        Ok(())
    }
}

/// Render a list of diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic], source: Option<&str>) {
    for diag in diagnostics {
        diag.render(source);
    }
}
