//! In-process collaborator implementations for tests and headless runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use quiz_core::model::{QuizDefinition, QuizId, UserId};

use crate::collaborators::{Notifier, ProgressRecorder, QuizDefinitionProvider, Router, Severity};
use crate::error::ProviderError;
use crate::guard::{ExitHandler, ExitResponse, ExitSignal, ExitSignalSource, SubscriptionId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Definitions ───────────────────────────────────────────────────────────────

/// Definitions keyed by slug. Can be switched into an "unavailable" mode to
/// exercise fetch failures.
#[derive(Debug, Default)]
pub struct InMemoryDefinitions {
    definitions: Mutex<HashMap<String, QuizDefinition>>,
    unavailable: AtomicBool,
    fetches: AtomicUsize,
}

impl InMemoryDefinitions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(definitions: impl IntoIterator<Item = QuizDefinition>) -> Self {
        let provider = Self::new();
        for definition in definitions {
            provider.insert(definition);
        }
        provider
    }

    pub fn insert(&self, definition: QuizDefinition) {
        lock(&self.definitions).insert(definition.slug().to_string(), definition);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `fetch_by_slug` calls so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuizDefinitionProvider for InMemoryDefinitions {
    async fn fetch_by_slug(&self, slug: &str) -> Result<Option<QuizDefinition>, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("in-memory provider offline".into()));
        }
        Ok(lock(&self.definitions).get(slug).cloned())
    }
}

// ─── Progress ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingProgress {
    completions: Mutex<Vec<(UserId, QuizId)>>,
    failing: AtomicBool,
}

impl RecordingProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder whose every call fails.
    #[must_use]
    pub fn failing() -> Self {
        let recorder = Self::new();
        recorder.failing.store(true, Ordering::SeqCst);
        recorder
    }

    #[must_use]
    pub fn completions(&self) -> Vec<(UserId, QuizId)> {
        lock(&self.completions).clone()
    }
}

#[async_trait]
impl ProgressRecorder for RecordingProgress {
    async fn mark_complete(&self, user_id: UserId, quiz_id: QuizId) -> Result<(), ProviderError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("progress service offline".into()));
        }
        lock(&self.completions).push((user_id, quiz_id));
        Ok(())
    }
}

// ─── Notifier / Router ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, Severity)>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<(String, Severity)> {
        lock(&self.messages).clone()
    }

    #[must_use]
    pub fn messages_with(&self, severity: Severity) -> Vec<String> {
        lock(&self.messages)
            .iter()
            .filter(|(_, s)| *s == severity)
            .map(|(message, _)| message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        lock(&self.messages).push((message.to_string(), severity));
    }
}

#[derive(Debug, Default)]
pub struct RecordingRouter {
    paths: Mutex<Vec<String>>,
}

impl RecordingRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        lock(&self.paths).clone()
    }
}

impl Router for RecordingRouter {
    fn navigate_to(&self, path: &str) {
        lock(&self.paths).push(path.to_string());
    }
}

// ─── Exit signals ──────────────────────────────────────────────────────────────

/// Exit-signal source driven by hand.
#[derive(Default)]
pub struct ManualSignalSource {
    handlers: Mutex<BTreeMap<SubscriptionId, (ExitSignal, ExitHandler)>>,
    next_id: AtomicU64,
    unsubscribe_calls: AtomicUsize,
}

impl ManualSignalSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `signal` to its subscribers. Returns the first subscriber's
    /// response, or `None` when nobody listens.
    pub fn emit(&self, signal: ExitSignal) -> Option<ExitResponse> {
        let handlers: Vec<ExitHandler> = lock(&self.handlers)
            .values()
            .filter(|(subscribed, _)| *subscribed == signal)
            .map(|(_, handler)| handler.clone())
            .collect();
        handlers
            .into_iter()
            .map(|handler| handler(signal))
            .reduce(|first, _| first)
    }

    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        lock(&self.handlers).len()
    }

    #[must_use]
    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }
}

impl ExitSignalSource for ManualSignalSource {
    fn subscribe(&self, signal: ExitSignal, handler: ExitHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.handlers).insert(id, (signal, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.handlers).remove(&id);
    }
}

impl std::fmt::Debug for ManualSignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualSignalSource")
            .field("active_subscriptions", &self.active_subscriptions())
            .finish_non_exhaustive()
    }
}
