//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{DefinitionError, OptionId, QuestionId, QuizSessionError};
use storage::sqlite::SqliteInitError;

use crate::countdown::CountdownState;
use crate::sessions::SessionState;

/// Errors emitted by collaborator adapters (definition provider, progress recorder).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("definition source unavailable: {0}")]
    Unavailable(String),
    #[error("invalid quiz definition: {0}")]
    InvalidDefinition(#[from] DefinitionError),
    #[error("malformed definition document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors emitted by `Countdown`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CountdownError {
    #[error("countdown cannot start from state {0:?}")]
    NotIdle(CountdownState),
}

/// Errors emitted by the session manager.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("operation requires an active session (state: {0:?})")]
    NotActive(SessionState),
    #[error("retry is only possible after an attempt was started")]
    NothingToRetry,
    #[error("the attempt is still running; submit it before retrying (state: {0:?})")]
    AttemptInProgress(SessionState),
    #[error("quiz '{slug}' was not found")]
    QuizNotFound { slug: String },
    #[error("{unanswered} of {total} questions are unanswered")]
    IncompleteSubmission { unanswered: usize, total: usize },
    #[error("question {question} has no option {option}")]
    UnknownAnswer {
        question: QuestionId,
        option: OptionId,
    },
    #[error(transparent)]
    Session(#[from] QuizSessionError),
    #[error(transparent)]
    Countdown(#[from] CountdownError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
