//! Grading of a submitted attempt.
//!
//! `evaluate` is a pure function: no clock, no storage, no I/O. A question
//! without a submitted answer is simply incorrect.

use std::collections::BTreeMap;

use crate::model::{OptionId, QuestionId, QuizDefinition, ScoreResult};

/// Grade `answers` against `definition`.
///
/// Answers for question ids that are not part of the definition are ignored.
///
/// # Examples
///
/// ```
/// # use std::collections::BTreeMap;
/// # use quiz_core::model::*;
/// let definition = QuizDefinitionDraft {
///     id: QuizId::new(1),
///     slug: "demo".into(),
///     title: String::new(),
///     time_limit_secs: None,
///     questions: vec![QuestionDraft {
///         id: QuestionId::new(1),
///         prompt: "2 + 2?".into(),
///         options: vec![
///             AnswerOption { id: OptionId::new(1), label: "4".into(), correct: true },
///             AnswerOption { id: OptionId::new(2), label: "5".into(), correct: false },
///         ],
///     }],
/// }
/// .validate()
/// .unwrap();
///
/// let mut answers = BTreeMap::new();
/// answers.insert(QuestionId::new(1), OptionId::new(1));
/// let score = quiz_core::evaluate(&definition, &answers);
/// assert_eq!(score.percentage, 100);
/// assert!(score.passed);
/// ```
#[must_use]
pub fn evaluate(
    definition: &QuizDefinition,
    answers: &BTreeMap<QuestionId, OptionId>,
) -> ScoreResult {
    let correct = definition
        .questions()
        .iter()
        .filter(|question| answers.get(&question.id()) == Some(&question.correct_option()))
        .count();

    ScoreResult::from_counts(correct, definition.question_count())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerOption, QuestionDraft, QuizDefinitionDraft, QuizId};

    /// Five questions; question `n` has options `n*10` (correct) and `n*10 + 1`.
    fn five_question_quiz() -> QuizDefinition {
        let questions = (1..=5)
            .map(|n| QuestionDraft {
                id: QuestionId::new(n),
                prompt: format!("Q{n}"),
                options: vec![
                    AnswerOption {
                        id: OptionId::new(n * 10),
                        label: "right".into(),
                        correct: true,
                    },
                    AnswerOption {
                        id: OptionId::new(n * 10 + 1),
                        label: "wrong".into(),
                        correct: false,
                    },
                ],
            })
            .collect();

        QuizDefinitionDraft {
            id: QuizId::new(1),
            slug: "five".into(),
            title: "Five".into(),
            time_limit_secs: Some(300),
            questions,
        }
        .validate()
        .unwrap()
    }

    fn answer(answers: &mut BTreeMap<QuestionId, OptionId>, question: u64, option: u64) {
        answers.insert(QuestionId::new(question), OptionId::new(option));
    }

    #[test]
    fn four_of_five_passes_at_threshold() {
        let quiz = five_question_quiz();
        let mut answers = BTreeMap::new();
        answer(&mut answers, 1, 10);
        answer(&mut answers, 2, 20);
        answer(&mut answers, 3, 30);
        answer(&mut answers, 4, 40);
        answer(&mut answers, 5, 51);

        let score = evaluate(&quiz, &answers);
        assert_eq!(score.correct_count, 4);
        assert_eq!(score.total_questions, 5);
        assert_eq!(score.percentage, 80);
        assert!(score.passed);
    }

    #[test]
    fn missing_answers_count_as_incorrect() {
        let quiz = five_question_quiz();
        let mut answers = BTreeMap::new();
        answer(&mut answers, 1, 10);
        answer(&mut answers, 2, 20);
        answer(&mut answers, 3, 30);

        let score = evaluate(&quiz, &answers);
        assert_eq!(score.correct_count, 3);
        assert_eq!(score.percentage, 60);
        assert!(!score.passed);
    }

    #[test]
    fn no_answers_scores_zero() {
        let score = evaluate(&five_question_quiz(), &BTreeMap::new());
        assert_eq!(score.correct_count, 0);
        assert_eq!(score.percentage, 0);
        assert!(!score.passed);
    }

    #[test]
    fn unknown_questions_are_ignored() {
        let quiz = five_question_quiz();
        let mut answers = BTreeMap::new();
        answer(&mut answers, 99, 990);
        answer(&mut answers, 1, 10);

        let score = evaluate(&quiz, &answers);
        assert_eq!(score.correct_count, 1);
        assert_eq!(score.total_questions, 5);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let quiz = five_question_quiz();
        let mut answers = BTreeMap::new();
        answer(&mut answers, 2, 20);
        answer(&mut answers, 4, 41);

        let first = evaluate(&quiz, &answers);
        let second = evaluate(&quiz, &answers);
        assert_eq!(first, second);
        assert_eq!(first.passed, first.percentage >= 80);
    }
}
