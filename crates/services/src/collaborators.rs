//! Interfaces to the parts of the platform the session engine does not own.

use std::sync::Arc;

use async_trait::async_trait;
use quiz_core::model::{QuizDefinition, QuizId, UserId};

use crate::error::ProviderError;
use crate::guard::ExitSignalSource;

/// How prominently a notification should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Source of quiz definitions, fetched once per attempt.
#[async_trait]
pub trait QuizDefinitionProvider: Send + Sync {
    /// Fetch and validate the quiz identified by `slug`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the source fails or the definition is invalid.
    async fn fetch_by_slug(&self, slug: &str) -> Result<Option<QuizDefinition>, ProviderError>;
}

/// Records that a learner passed a quiz.
#[async_trait]
pub trait ProgressRecorder: Send + Sync {
    /// # Errors
    ///
    /// Returns `ProviderError` if the completion cannot be recorded.
    async fn mark_complete(&self, user_id: UserId, quiz_id: QuizId) -> Result<(), ProviderError>;
}

/// User-visible notification sink (toasts, banners).
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Page navigation.
pub trait Router: Send + Sync {
    fn navigate_to(&self, path: &str);
}

/// Notifier that only writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => tracing::info!(target: "quiz::notify", "{message}"),
            Severity::Warning => tracing::warn!(target: "quiz::notify", "{message}"),
            Severity::Error => tracing::error!(target: "quiz::notify", "{message}"),
        }
    }
}

/// Everything the session engine calls out to, bundled for wiring.
#[derive(Clone)]
pub struct Collaborators {
    pub definitions: Arc<dyn QuizDefinitionProvider>,
    pub progress: Arc<dyn ProgressRecorder>,
    pub notifier: Arc<dyn Notifier>,
    pub router: Arc<dyn Router>,
    pub signals: Arc<dyn ExitSignalSource>,
}
