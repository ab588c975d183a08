//! Fail-open facade over the session slot repository.
//!
//! Storage faults never reach the state machine: a failed or undecodable read
//! is "no session", a failed write is logged and dropped.

use std::sync::Arc;

use quiz_core::model::QuizSession;
use storage::repository::{SessionRecord, SessionRepository};

#[derive(Clone)]
pub struct SessionStore {
    repo: Arc<dyn SessionRepository>,
}

impl SessionStore {
    #[must_use]
    pub fn new(repo: Arc<dyn SessionRepository>) -> Self {
        Self { repo }
    }

    /// The stored session, or `None` if the slot is empty, unreadable or invalid.
    pub async fn read(&self) -> Option<QuizSession> {
        let record = match self.repo.load().await {
            Ok(record) => record?,
            Err(err) => {
                tracing::warn!(error = %err, "session slot unreadable, treating as empty");
                return None;
            }
        };

        match record.into_session() {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::warn!(error = %err, "session record invalid, treating as empty");
                None
            }
        }
    }

    /// Persist `session`, replacing the slot. Returns whether the write landed.
    pub async fn write(&self, session: &QuizSession) -> bool {
        match self.repo.save(&SessionRecord::from_session(session)).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    slug = session.slug(),
                    "session write failed; continuing with in-memory state"
                );
                false
            }
        }
    }

    pub async fn clear(&self) {
        if let Err(err) = self.repo.clear().await {
            tracing::warn!(error = %err, "session slot could not be cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{OptionId, QuestionId, QuizId, UserId};
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn session() -> QuizSession {
        QuizSession::new(UserId::new(1), QuizId::new(1), "generics", 60, fixed_now()).unwrap()
    }

    #[tokio::test]
    async fn corrupt_record_reads_as_absent() {
        let repo = InMemoryRepository::new();
        repo.put_raw("<<garbage>>");
        let store = SessionStore::new(Arc::new(repo));
        assert!(store.read().await.is_none());
    }

    #[tokio::test]
    async fn structurally_invalid_record_reads_as_absent() {
        let repo = InMemoryRepository::new();
        let mut record = SessionRecord::from_session(&session());
        record.last_saved = record.start_time - 1;
        repo.put_raw(record.to_json().unwrap());

        let store = SessionStore::new(Arc::new(repo));
        assert!(store.read().await.is_none());
    }

    #[tokio::test]
    async fn failed_write_is_swallowed() {
        let repo = InMemoryRepository::new();
        let store = SessionStore::new(Arc::new(repo.clone()));
        assert!(store.write(&session()).await);

        repo.reject_writes(true);
        let mut changed = session();
        changed.record_answer(QuestionId::new(1), OptionId::new(2), fixed_now());
        assert!(!store.write(&changed).await);

        assert_eq!(store.read().await, Some(session()));
    }

    #[tokio::test]
    async fn clear_then_read_is_empty() {
        let store = SessionStore::new(Arc::new(InMemoryRepository::new()));
        store.write(&session()).await;
        store.clear().await;
        assert!(store.read().await.is_none());
    }
}
