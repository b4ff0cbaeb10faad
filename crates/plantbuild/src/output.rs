//! Colored terminal output utilities.

use console::{Style, Term};

/// Color of a message or report label.
#[derive(Clone, Copy)]
pub(crate) enum Tone {
    Success,
    Warning,
    Error,
}

/// Terminal output formatter.
///
/// Messages go to stderr; [`Output::data`] writes machine-readable results
/// to stdout.
pub(crate) struct Output {
    term: Term,
    stdout: Term,
    green: Style,
    yellow: Style,
    red: Style,
    cyan_bold: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            stdout: Term::stdout(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            cyan_bold: Style::new().cyan().bold(),
        }
    }

    fn style(&self, tone: Tone) -> &Style {
        match tone {
            Tone::Success => &self.green,
            Tone::Warning => &self.yellow,
            Tone::Error => &self.red,
        }
    }

    /// Print an info message.
    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Print a whole message in the given tone.
    pub(crate) fn message(&self, tone: Tone, msg: &str) {
        let _ = self.term.write_line(&self.style(tone).apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        self.message(Tone::Error, msg);
    }

    /// Print a report line: colored fixed-width label, then plain detail.
    pub(crate) fn status(&self, tone: Tone, label: &str, detail: &str) {
        let label = self.style(tone).apply_to(format!("{label:>9}"));
        let _ = self.term.write_line(&format!("{label} {detail}"));
    }

    /// Print a highlighted message (cyan bold).
    pub(crate) fn highlight(&self, msg: &str) {
        let _ = self
            .term
            .write_line(&self.cyan_bold.apply_to(msg).to_string());
    }

    /// Write a result line to stdout.
    pub(crate) fn data(&self, line: &str) -> std::io::Result<()> {
        self.stdout.write_line(line)
    }
}
