use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId, QuizId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Data-integrity problems found while validating a fetched quiz definition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DefinitionError {
    #[error("quiz slug cannot be empty")]
    EmptySlug,

    #[error("quiz has no questions")]
    NoQuestions,

    #[error("time limit must be > 0 seconds")]
    InvalidTimeLimit,

    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error("question {0} has no options")]
    NoOptions(QuestionId),

    #[error("question {question} lists option {option} more than once")]
    DuplicateOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("question {question} must flag exactly one correct option, found {found}")]
    CorrectOptionCount { question: QuestionId, found: usize },
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Unvalidated quiz definition, as delivered by a definition provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDefinitionDraft {
    pub id: QuizId,
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub time_limit_secs: Option<u32>,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub id: QuestionId,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
}

/// One selectable option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: OptionId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub correct: bool,
}

impl QuizDefinitionDraft {
    /// Validate the draft into a gradeable definition.
    ///
    /// Every question must carry at least one option and exactly one option
    /// flagged correct; question ids are unique within the quiz and option
    /// ids are unique within their question.
    ///
    /// # Errors
    ///
    /// Returns the first `DefinitionError` found, in question order.
    pub fn validate(self) -> Result<QuizDefinition, DefinitionError> {
        let slug = self.slug.trim().to_owned();
        if slug.is_empty() {
            return Err(DefinitionError::EmptySlug);
        }
        if self.time_limit_secs == Some(0) {
            return Err(DefinitionError::InvalidTimeLimit);
        }
        if self.questions.is_empty() {
            return Err(DefinitionError::NoQuestions);
        }

        let mut seen_questions = HashSet::new();
        let mut questions = Vec::with_capacity(self.questions.len());
        for draft in self.questions {
            if !seen_questions.insert(draft.id) {
                return Err(DefinitionError::DuplicateQuestion(draft.id));
            }
            questions.push(draft.validate()?);
        }

        let positions = questions
            .iter()
            .enumerate()
            .map(|(index, question)| (question.id, index))
            .collect();

        Ok(QuizDefinition {
            id: self.id,
            slug,
            title: self.title.trim().to_owned(),
            time_limit_secs: self.time_limit_secs,
            questions,
            positions,
        })
    }
}

impl QuestionDraft {
    fn validate(self) -> Result<Question, DefinitionError> {
        if self.options.is_empty() {
            return Err(DefinitionError::NoOptions(self.id));
        }

        let mut seen = HashSet::new();
        for option in &self.options {
            if !seen.insert(option.id) {
                return Err(DefinitionError::DuplicateOption {
                    question: self.id,
                    option: option.id,
                });
            }
        }

        let mut flagged = self.options.iter().filter(|option| option.correct);
        let correct = match (flagged.next(), flagged.count()) {
            (Some(option), 0) => option.id,
            (first, rest) => {
                return Err(DefinitionError::CorrectOptionCount {
                    question: self.id,
                    found: usize::from(first.is_some()) + rest,
                });
            }
        };

        Ok(Question {
            id: self.id,
            prompt: self.prompt,
            options: self.options,
            correct,
        })
    }
}

//
// ─── VALIDATED DEFINITION ─────────────────────────────────────────────────────
//

/// A question whose correct option has been resolved during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<AnswerOption>,
    correct: OptionId,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn correct_option(&self) -> OptionId {
        self.correct
    }

    #[must_use]
    pub fn has_option(&self, option: OptionId) -> bool {
        self.options.iter().any(|candidate| candidate.id == option)
    }
}

/// Ordered, validated quiz. Only obtainable through [`QuizDefinitionDraft::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizDefinition {
    id: QuizId,
    slug: String,
    title: String,
    time_limit_secs: Option<u32>,
    questions: Vec<Question>,
    positions: BTreeMap<QuestionId, usize>,
}

impl QuizDefinition {
    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Per-quiz time budget, when the definition carries one.
    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.time_limit_secs
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.positions
            .get(&id)
            .and_then(|&index| self.questions.get(index))
    }

    /// Number of questions that have no entry in `answers`.
    #[must_use]
    pub fn unanswered_count(&self, answers: &BTreeMap<QuestionId, OptionId>) -> usize {
        self.questions
            .iter()
            .filter(|question| !answers.contains_key(&question.id))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: u64, correct: bool) -> AnswerOption {
        AnswerOption {
            id: OptionId::new(id),
            label: format!("option {id}"),
            correct,
        }
    }

    fn question(id: u64, options: Vec<AnswerOption>) -> QuestionDraft {
        QuestionDraft {
            id: QuestionId::new(id),
            prompt: format!("Q{id}"),
            options,
        }
    }

    fn draft(questions: Vec<QuestionDraft>) -> QuizDefinitionDraft {
        QuizDefinitionDraft {
            id: QuizId::new(1),
            slug: " rust-basics ".into(),
            title: "Rust basics".into(),
            time_limit_secs: Some(300),
            questions,
        }
    }

    #[test]
    fn validate_resolves_correct_options() {
        let def = draft(vec![
            question(1, vec![option(10, false), option(11, true)]),
            question(2, vec![option(20, true)]),
        ])
        .validate()
        .unwrap();

        assert_eq!(def.slug(), "rust-basics");
        assert_eq!(def.question_count(), 2);
        assert_eq!(
            def.question(QuestionId::new(1)).unwrap().correct_option(),
            OptionId::new(11)
        );
        assert!(def.question_at(1).unwrap().has_option(OptionId::new(20)));
        assert!(def.question(QuestionId::new(3)).is_none());
    }

    #[test]
    fn zero_correct_options_is_rejected() {
        let err = draft(vec![question(1, vec![option(10, false), option(11, false)])])
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::CorrectOptionCount {
                question: QuestionId::new(1),
                found: 0
            }
        );
    }

    #[test]
    fn multiple_correct_options_are_rejected() {
        let err = draft(vec![question(
            4,
            vec![option(1, true), option(2, true), option(3, true)],
        )])
        .validate()
        .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::CorrectOptionCount {
                question: QuestionId::new(4),
                found: 3
            }
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = draft(vec![
            question(1, vec![option(1, true)]),
            question(1, vec![option(1, true)]),
        ])
        .validate()
        .unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateQuestion(QuestionId::new(1)));

        let err = draft(vec![question(2, vec![option(5, true), option(5, false)])])
            .validate()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateOption { .. }));
    }

    #[test]
    fn structural_problems_are_rejected() {
        assert_eq!(draft(Vec::new()).validate().unwrap_err(), DefinitionError::NoQuestions);

        let mut blank = draft(vec![question(1, vec![option(1, true)])]);
        blank.slug = "   ".into();
        assert_eq!(blank.validate().unwrap_err(), DefinitionError::EmptySlug);

        let mut no_time = draft(vec![question(1, vec![option(1, true)])]);
        no_time.time_limit_secs = Some(0);
        assert_eq!(no_time.validate().unwrap_err(), DefinitionError::InvalidTimeLimit);

        let err = draft(vec![question(9, Vec::new())]).validate().unwrap_err();
        assert_eq!(err, DefinitionError::NoOptions(QuestionId::new(9)));
    }

    #[test]
    fn draft_deserializes_from_camel_case_json() {
        let json = r#"{
            "id": 7,
            "slug": "ownership",
            "timeLimitSecs": 120,
            "questions": [
                { "id": 1, "prompt": "Who owns it?", "options": [
                    { "id": 1, "label": "the caller", "correct": true },
                    { "id": 2, "label": "nobody" }
                ] }
            ]
        }"#;
        let def = serde_json::from_str::<QuizDefinitionDraft>(json)
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(def.id(), QuizId::new(7));
        assert_eq!(def.time_limit_secs(), Some(120));
        assert_eq!(def.question_at(0).unwrap().options().len(), 2);
    }
}
