use crate::span::Span;

/// A build error with labelled spans, ready for rendering.
///
/// `source` is the text the spans point into: the rendered statement or
/// operation that failed, or a config file's contents.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
    pub labels: Vec<(Span, String)>,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(message: String, span: Span) -> Self {
        Self {
            message,
            span,
            labels: Vec::new(),
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_label(mut self, span: Span, message: String) -> Self {
        self.labels.push((span, message));
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

    fn report<'a>(
        &self,
        filename: &'a str,
        color: bool,
    ) -> ariadne::Report<'a, (&'a str, std::ops::Range<usize>)> {
        use ariadne::{Color, Config, Label, Report, ReportKind};

        let mut report = Report::build(ReportKind::Error, filename, self.span.start as usize)
            .with_config(Config::default().with_color(color))
            .with_message(&self.message);

        if self.labels.is_empty() {
            report = report.with_label(
                Label::new((filename, self.span.range()))
                    .with_message(&self.message)
                    .with_color(Color::Red),
            );
        }
        for (span, text) in &self.labels {
            report = report.with_label(
                Label::new((filename, span.range()))
                    .with_message(text)
                    .with_color(Color::Cyan),
            );
        }

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
        use ariadne::Source;

        if let Err(e) = self
            .report(filename, true)
            .eprint((filename, Source::from(source)))
        {
            eprintln!("error: {} ({})", self.message, e);
        }
    }

    /// Render without colors into a string.
    pub fn render_to_string(&self, filename: &str, source: &str) -> String {
        use ariadne::Source;

        let mut buf = Vec::new();
        if self
            .report(filename, false)
            .write((filename, Source::from(source)), &mut buf)
            .is_err()
        {
            return self.message.clone();
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}
