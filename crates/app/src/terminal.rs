use std::io::Write as _;
use std::path::PathBuf;

use quiz_core::model::{AttemptState, Question};
use services::{Notice, NoticeLevel, Notifier, PrintError, PrintSink};

/// Prints notices as single tagged lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: Notice) {
        let line = format_notice(&notice);
        match notice.level {
            NoticeLevel::Error => eprintln!("{line}"),
            NoticeLevel::Success | NoticeLevel::Info => println!("{line}"),
        }
    }
}

fn format_notice(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Info => "info",
        NoticeLevel::Error => "error",
    };
    format!("[{tag}] {}", notice.message)
}

/// Writes the report to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutPrinter;

impl PrintSink for StdoutPrinter {
    fn print(&self, _title: &str, document: &str) -> Result<(), PrintError> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(document.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

/// Exports the report to a file, replacing any previous export.
#[derive(Debug, Clone)]
pub struct FilePrinter {
    path: PathBuf,
}

impl FilePrinter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PrintSink for FilePrinter {
    fn print(&self, title: &str, document: &str) -> Result<(), PrintError> {
        std::fs::write(&self.path, document)?;
        tracing::info!(title, path = %self.path.display(), "report exported");
        Ok(())
    }
}

/// One question as shown during an attempt.
pub fn render_question(question: &Question, attempt: &AttemptState) -> String {
    let position = question.id().position();
    let selected = attempt.answer(position);

    let mut out = format!(
        "\nQuestion {}/{} (answered {}/{})\n{}\n",
        question.id(),
        attempt.question_count(),
        attempt.answered_count(),
        attempt.question_count(),
        question.prompt()
    );
    for (index, option) in question.options().iter().enumerate() {
        let marker = if selected == Some(index) { '>' } else { ' ' };
        out.push_str(&format!(" {marker} {}) {option}\n", index + 1));
    }
    out
}
