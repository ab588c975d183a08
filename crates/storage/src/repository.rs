use async_trait::async_trait;
use quiz_core::model::{OptionId, QuestionId, QuizId, QuizSession, UserId};
use quiz_core::time::{from_epoch_ms, to_epoch_ms};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("write rejected: {0}")]
    WriteRejected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Persisted shape of the single session slot.
///
/// Field names and units follow the logical record layout
/// (`userId`, `startTime` in epoch milliseconds, ...), so a record written by
/// one backend can be read by any other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub user_id: u64,
    pub quiz_id: u64,
    pub slug: String,
    pub start_time: i64,
    pub initial_time_limit_seconds: u32,
    pub answers: BTreeMap<u64, u64>,
    pub current_question_index: u64,
    pub is_active: bool,
    pub last_saved: i64,
}

impl SessionRecord {
    #[must_use]
    pub fn from_session(session: &QuizSession) -> Self {
        Self {
            user_id: session.user_id().value(),
            quiz_id: session.quiz_id().value(),
            slug: session.slug().to_owned(),
            start_time: to_epoch_ms(session.start_time()),
            initial_time_limit_seconds: session.initial_time_limit_secs(),
            answers: session
                .answers()
                .iter()
                .map(|(question, option)| (question.value(), option.value()))
                .collect(),
            current_question_index: session.current_question_index() as u64,
            is_active: session.is_active(),
            last_saved: to_epoch_ms(session.last_saved()),
        }
    }

    /// Convert the record back into a domain `QuizSession`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a timestamp is out of range or
    /// the session fails validation.
    pub fn into_session(self) -> Result<QuizSession, StorageError> {
        let start_time = from_epoch_ms(self.start_time).ok_or_else(|| {
            StorageError::Serialization(format!("invalid startTime: {}", self.start_time))
        })?;
        let last_saved = from_epoch_ms(self.last_saved).ok_or_else(|| {
            StorageError::Serialization(format!("invalid lastSaved: {}", self.last_saved))
        })?;
        let cursor = usize::try_from(self.current_question_index).map_err(|_| {
            StorageError::Serialization("currentQuestionIndex overflow".into())
        })?;
        let answers = self
            .answers
            .into_iter()
            .map(|(question, option)| (QuestionId::new(question), OptionId::new(option)))
            .collect();

        QuizSession::from_persisted(
            UserId::new(self.user_id),
            QuizId::new(self.quiz_id),
            self.slug,
            start_time,
            self.initial_time_limit_seconds,
            answers,
            cursor,
            self.is_active,
            last_saved,
        )
        .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(|err| StorageError::Serialization(err.to_string()))
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for unparseable or incomplete JSON.
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw).map_err(|err| StorageError::Serialization(err.to_string()))
    }
}

/// Repository contract for the one-slot session store.
///
/// There is no key: a backend holds at most one record, and `save` replaces it.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Fetch the stored record, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read or the record
    /// cannot be decoded.
    async fn load(&self) -> Result<Option<SessionRecord>, StorageError>;

    /// Replace the stored record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Remove the stored record; clearing an empty slot succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory slot holding the JSON text of the record, like a browser's key/value storage.
///
/// Raw text can be injected with [`InMemoryRepository::put_raw`] and writes can be
/// made to fail, which lets tests reproduce corrupt records and quota errors.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    slot: Arc<Mutex<Option<String>>>,
    reject_writes: Arc<AtomicBool>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot with arbitrary text, bypassing encoding.
    pub fn put_raw(&self, raw: impl Into<String>) {
        let mut guard = self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(raw.into());
    }

    /// Current slot contents, as stored.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Make subsequent `save` calls fail (as a full storage quota would).
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn load(&self) -> Result<Option<SessionRecord>, StorageError> {
        let raw = self
            .slot
            .lock()
            .map_err(|_| StorageError::Connection("poisoned lock".into()))?
            .clone();
        raw.as_deref().map(SessionRecord::from_json).transpose()
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StorageError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteRejected("quota exceeded".into()));
        }
        let raw = record.to_json()?;
        let mut guard = self
            .slot
            .lock()
            .map_err(|_| StorageError::Connection("poisoned lock".into()))?;
        *guard = Some(raw);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|_| StorageError::Connection("poisoned lock".into()))?;
        *guard = None;
        Ok(())
    }
}

/// Storage handles used by the services layer.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let sessions: Arc<dyn SessionRepository> = Arc::new(InMemoryRepository::new());
        Self { sessions }
    }
}
