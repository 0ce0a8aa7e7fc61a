use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::span::Span;

/// A capture-script error.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(message: String, span: Span) -> Self {
        Self {
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    fn report<'a>(&self, filename: &'a str, color: bool) -> Report<'static, (&'a str, std::ops::Range<usize>)> {
        let mut report = Report::build(ReportKind::Error, filename, self.span.start as usize)
            .with_config(Config::default().with_color(color))
            .with_message(&self.message)
            .with_label(
                Label::new((filename, self.span.range()))
                    .with_message(&self.message)
                    .with_color(Color::Red),
            );
        for note in &self.notes {
            report = report.with_note(note);
        }
        if let Some(help) = &self.help {
            report = report.with_help(help);
        }
        report.finish()
    }

    /// Render the diagnostic to stderr using ariadne.
    pub fn render(&self, filename: &str, source: &str) {
        if let Err(err) = self
            .report(filename, true)
            .eprint((filename, Source::from(source)))
        {
            eprintln!("error: cannot render diagnostic: {}", err);
        }
    }

    /// Render the diagnostic as plain text, without colors.
    pub fn render_to_string(&self, filename: &str, source: &str) -> String {
        let mut out = Vec::new();
        if self
            .report(filename, false)
            .write((filename, Source::from(source)), &mut out)
            .is_err()
        {
            return format!("{}: {}", filename, self.message);
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

/// Render a list of diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    for diag in diagnostics {
        diag.render(filename, source);
    }
}
