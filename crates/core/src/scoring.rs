use std::fmt;

use crate::model::QuestionSet;

//
// ─── GRADE ─────────────────────────────────────────────────────────────────────
//

/// Letter grade derived from a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    APlus,
    A,
    B,
    C,
    D,
    F,
}

/// Ordered `(minimum percentage, grade)` bands; the first band satisfied wins.
pub const GRADE_BANDS: [(u8, Grade); 5] = [
    (90, Grade::APlus),
    (80, Grade::A),
    (70, Grade::B),
    (60, Grade::C),
    (50, Grade::D),
];

impl Grade {
    /// Highest band whose threshold is met (`>=`), `F` otherwise.
    #[must_use]
    pub fn from_percentage(percentage: u8) -> Self {
        GRADE_BANDS
            .iter()
            .find(|(min, _)| percentage >= *min)
            .map_or(Grade::F, |(_, grade)| *grade)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

/// Number of answers matching their question's correct option.
///
/// Unanswered slots and slots past the end of the set never count.
#[must_use]
pub fn score(questions: &QuestionSet, answers: &[Option<usize>]) -> u32 {
    let correct = questions
        .iter()
        .zip(answers)
        .filter(|(question, answer)| question.is_correct(**answer))
        .count();
    u32::try_from(correct).unwrap_or(u32::MAX)
}

/// `round(100 * score / total)` with halves rounded up; zero for an empty total.
#[must_use]
pub fn percentage(score: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let score = u64::from(score.min(total));
    let total = u64::from(total);
    let rounded = (200 * score + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(100)
}

/// Score summary for a finished attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreCard {
    pub score: u32,
    pub total: u32,
    pub percentage: u8,
    pub grade: Grade,
}

impl ScoreCard {
    #[must_use]
    pub fn compute(questions: &QuestionSet, answers: &[Option<usize>]) -> Self {
        let total = u32::try_from(questions.len()).unwrap_or(u32::MAX);
        Self::from_score(score(questions, answers), total)
    }

    #[must_use]
    pub fn from_score(score: u32, total: u32) -> Self {
        let percentage = percentage(score, total);
        Self {
            score,
            total,
            percentage,
            grade: Grade::from_percentage(percentage),
        }
    }

    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.score == self.total
    }
}
