use serde::{Deserialize, Serialize};

/// Minimum percentage for an attempt to count as passed.
pub const PASS_THRESHOLD_PERCENT: u8 = 80;

/// Outcome of grading one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub correct_count: usize,
    pub total_questions: usize,
    pub percentage: u8,
    pub passed: bool,
}

impl ScoreResult {
    /// Build a result from raw counts.
    ///
    /// `percentage` is `100 * correct / total` rounded half up; an empty quiz
    /// scores zero. `correct` is clamped to `total`.
    #[must_use]
    pub fn from_counts(correct: usize, total: usize) -> Self {
        let correct = correct.min(total);
        let percentage = if total == 0 {
            0
        } else {
            let rounded = (correct * 200 + total) / (total * 2);
            u8::try_from(rounded).unwrap_or(100)
        };

        Self {
            correct_count: correct,
            total_questions: total,
            percentage,
            passed: percentage >= PASS_THRESHOLD_PERCENT,
        }
    }

    #[must_use]
    pub fn incorrect_count(&self) -> usize {
        self.total_questions - self.correct_count
    }
}
