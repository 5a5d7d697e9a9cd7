use std::fmt;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use quiz_core::model::{AttemptState, QuestionSet};
use quiz_core::scoring::ScoreCard;
use quiz_core::time::format_duration;

/// Everything a printed report shows.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub questions: &'a QuestionSet,
    pub attempt: &'a AttemptState,
    pub score: &'a ScoreCard,
    pub submitted_at: Option<DateTime<Utc>>,
    pub time_spent: Option<Duration>,
}

/// Plain-text renderer for finished attempts.
///
/// Output depends only on the input, so the same attempt always renders to
/// the same bytes.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    title: String,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new("Quiz Report")
    }
}

impl ReportRenderer {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn render(&self, input: &ReportInput<'_>) -> String {
        Report {
            title: &self.title,
            input,
        }
        .to_string()
    }
}

struct Report<'r, 'a> {
    title: &'r str,
    input: &'r ReportInput<'a>,
}

impl fmt::Display for Report<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let input = self.input;
        let score = input.score;

        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", "=".repeat(self.title.chars().count()))?;
        if let Some(at) = input.submitted_at {
            writeln!(
                f,
                "Submitted:  {}",
                at.to_rfc3339_opts(SecondsFormat::Secs, true)
            )?;
        }
        if let Some(spent) = input.time_spent {
            writeln!(f, "Time spent: {}", format_duration(spent))?;
        }
        writeln!(
            f,
            "Score:      {}/{} ({}%)",
            score.score, score.total, score.percentage
        )?;
        writeln!(f, "Grade:      {}", score.grade)?;
        writeln!(
            f,
            "Answered:   {}/{}",
            input.attempt.answered_count(),
            input.attempt.question_count()
        )?;

        for question in input.questions.iter() {
            let answer = input.attempt.answer(question.id().position());
            let correct = question.correct_option();

            writeln!(f)?;
            writeln!(f, "{}. {}", question.id(), question.prompt())?;
            for (index, option) in question.options().iter().enumerate() {
                let marker = match (Some(index) == answer, index == correct) {
                    (true, true) => "[x]",
                    (true, false) => "[!]",
                    (false, true) => "[*]",
                    (false, false) => "[ ]",
                };
                writeln!(f, "   {marker} {option}")?;
            }
            let verdict = match answer {
                None => "unanswered",
                Some(_) if question.is_correct(answer) => "correct",
                Some(_) => "incorrect",
            };
            writeln!(f, "   Result: {verdict}")?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "Legend: [x] your correct answer, [!] your incorrect answer, [*] correct answer"
        )
    }
}
