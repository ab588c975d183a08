use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::{OptionId, QuestionId, QuizId, UserId};
use crate::time::whole_seconds_between;

/// A session whose last mutation is older than this is treated as abandoned.
pub const MAX_SESSION_AGE_SECS: i64 = 30 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizSessionError {
    #[error("session slug cannot be empty")]
    EmptySlug,

    #[error("session time limit must be > 0 seconds")]
    InvalidTimeLimit,

    #[error("last_saved is before start_time")]
    InvalidTimeRange,
}

/// The single persisted record of an in-progress timed quiz attempt.
///
/// Remaining time is never stored; it is always derived from `start_time`
/// and `initial_time_limit_secs`, which keeps it correct across reloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSession {
    user_id: UserId,
    quiz_id: QuizId,
    slug: String,
    start_time: DateTime<Utc>,
    initial_time_limit_secs: u32,
    answers: BTreeMap<QuestionId, OptionId>,
    current_question_index: usize,
    is_active: bool,
    last_saved: DateTime<Utc>,
}

impl QuizSession {
    /// Create a fresh attempt starting at `now` with no answers and the cursor on the first question.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError` if the slug is blank or the limit is zero.
    pub fn new(
        user_id: UserId,
        quiz_id: QuizId,
        slug: impl Into<String>,
        initial_time_limit_secs: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, QuizSessionError> {
        Self::from_persisted(
            user_id,
            quiz_id,
            slug.into(),
            now,
            initial_time_limit_secs,
            BTreeMap::new(),
            0,
            true,
            now,
        )
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError` if the record is structurally invalid.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        quiz_id: QuizId,
        slug: String,
        start_time: DateTime<Utc>,
        initial_time_limit_secs: u32,
        answers: BTreeMap<QuestionId, OptionId>,
        current_question_index: usize,
        is_active: bool,
        last_saved: DateTime<Utc>,
    ) -> Result<Self, QuizSessionError> {
        if slug.trim().is_empty() {
            return Err(QuizSessionError::EmptySlug);
        }
        if initial_time_limit_secs == 0 {
            return Err(QuizSessionError::InvalidTimeLimit);
        }
        if last_saved < start_time {
            return Err(QuizSessionError::InvalidTimeRange);
        }

        Ok(Self {
            user_id,
            quiz_id,
            slug,
            start_time,
            initial_time_limit_secs,
            answers,
            current_question_index,
            is_active,
            last_saved,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    #[must_use]
    pub fn initial_time_limit_secs(&self) -> u32 {
        self.initial_time_limit_secs
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<QuestionId, OptionId> {
        &self.answers
    }

    #[must_use]
    pub fn answer_for(&self, question: QuestionId) -> Option<OptionId> {
        self.answers.get(&question).copied()
    }

    #[must_use]
    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn last_saved(&self) -> DateTime<Utc> {
        self.last_saved
    }

    /// `max(0, limit - floor((now - start_time) / 1s))`.
    #[must_use]
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u32 {
        let elapsed = whole_seconds_between(self.start_time, now);
        let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
        self.initial_time_limit_secs.saturating_sub(elapsed)
    }

    /// True when the last mutation is older than [`MAX_SESSION_AGE_SECS`].
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.last_saved > Duration::seconds(MAX_SESSION_AGE_SECS)
    }

    #[must_use]
    pub fn belongs_to(&self, user_id: UserId, slug: &str) -> bool {
        self.user_id == user_id && self.slug == slug
    }

    /// Whether `user_id` may continue this record at `now`: it is active, owned,
    /// not abandoned, and has time left. `slug` of `None` accepts any quiz.
    #[must_use]
    pub fn is_live_for(&self, user_id: UserId, slug: Option<&str>, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.user_id == user_id
            && slug.is_none_or(|slug| self.slug == slug)
            && !self.is_stale(now)
            && self.remaining_secs(now) > 0
    }

    /// Overwrite the answer for `question`; entries are never removed.
    pub fn record_answer(&mut self, question: QuestionId, option: OptionId, now: DateTime<Utc>) {
        self.answers.insert(question, option);
        self.touch(now);
    }

    pub fn set_current_question_index(&mut self, index: usize, now: DateTime<Utc>) {
        self.current_question_index = index;
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        // last_saved never moves behind start_time, even with a skewed clock.
        self.last_saved = now.max(self.start_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn session() -> QuizSession {
        QuizSession::new(UserId::new(1), QuizId::new(2), "intro", 300, fixed_now()).unwrap()
    }

    #[test]
    fn remaining_is_derived_from_start_time() {
        let s = session();
        assert_eq!(s.remaining_secs(fixed_now()), 300);
        assert_eq!(s.remaining_secs(fixed_now() + Duration::milliseconds(180_900)), 120);
        assert_eq!(s.remaining_secs(fixed_now() + Duration::seconds(3_000)), 0);
    }

    #[test]
    fn staleness_uses_last_saved_not_timer() {
        let mut s = session();
        let later = fixed_now() + Duration::minutes(20);
        s.record_answer(QuestionId::new(1), OptionId::new(1), later);

        assert!(!s.is_stale(later + Duration::minutes(30)));
        assert!(s.is_stale(later + Duration::minutes(30) + Duration::seconds(1)));
    }

    #[test]
    fn liveness_requires_owner_slug_and_time() {
        let s = session();
        let now = fixed_now() + Duration::seconds(10);
        assert!(s.is_live_for(UserId::new(1), Some("intro"), now));
        assert!(s.is_live_for(UserId::new(1), None, now));
        assert!(!s.is_live_for(UserId::new(9), Some("intro"), now));
        assert!(!s.is_live_for(UserId::new(1), Some("other"), now));
        assert!(!s.is_live_for(UserId::new(1), None, fixed_now() + Duration::seconds(300)));
    }

    #[test]
    fn answers_overwrite_and_touch_last_saved() {
        let mut s = session();
        let t1 = fixed_now() + Duration::seconds(5);
        let t2 = fixed_now() + Duration::seconds(9);
        s.record_answer(QuestionId::new(1), OptionId::new(1), t1);
        s.record_answer(QuestionId::new(1), OptionId::new(2), t2);

        assert_eq!(s.answers().len(), 1);
        assert_eq!(s.answer_for(QuestionId::new(1)), Some(OptionId::new(2)));
        assert_eq!(s.last_saved(), t2);
    }

    #[test]
    fn from_persisted_rejects_invalid_records() {
        let now = fixed_now();
        let err = QuizSession::from_persisted(
            UserId::new(1),
            QuizId::new(1),
            "quiz".into(),
            now,
            300,
            BTreeMap::new(),
            0,
            true,
            now - Duration::seconds(1),
        )
        .unwrap_err();
        assert_eq!(err, QuizSessionError::InvalidTimeRange);

        let err = QuizSession::new(UserId::new(1), QuizId::new(1), "quiz", 0, now).unwrap_err();
        assert_eq!(err, QuizSessionError::InvalidTimeLimit);

        let err = QuizSession::new(UserId::new(1), QuizId::new(1), " ", 10, now).unwrap_err();
        assert_eq!(err, QuizSessionError::EmptySlug);
    }
}
