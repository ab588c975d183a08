use std::path::PathBuf;

use quiz_core::model::EngineSettings;
use storage::repository::Storage;

use crate::Clock;
use crate::collaborators::Collaborators;
use crate::detector::ActiveSessionDetector;
use crate::error::AppServicesError;
use crate::sessions::SessionManager;
use crate::store::SessionStore;

/// Assembles the session engine over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    settings: EngineSettings,
    store: SessionStore,
    collaborators: Collaborators,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: EngineSettings,
        collaborators: Collaborators,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, settings, collaborators))
    }

    /// Build services whose session slot is a JSON file.
    #[must_use]
    pub fn new_json_file(
        path: impl Into<PathBuf>,
        clock: Clock,
        settings: EngineSettings,
        collaborators: Collaborators,
    ) -> Self {
        Self::from_storage(&Storage::json_file(path), clock, settings, collaborators)
    }

    #[must_use]
    pub fn in_memory(clock: Clock, settings: EngineSettings, collaborators: Collaborators) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, settings, collaborators)
    }

    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        settings: EngineSettings,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            clock,
            settings,
            store: SessionStore::new(storage.sessions.clone()),
            collaborators,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> SessionStore {
        self.store.clone()
    }

    /// A manager for one page's worth of attempts.
    #[must_use]
    pub fn session_manager(&self) -> SessionManager {
        SessionManager::new(
            self.clock,
            self.settings.clone(),
            self.store.clone(),
            self.collaborators.clone(),
        )
    }

    #[must_use]
    pub fn detector(&self) -> ActiveSessionDetector {
        ActiveSessionDetector::new(
            self.clock,
            self.settings.clone(),
            self.store.clone(),
            self.collaborators.notifier.clone(),
            self.collaborators.router.clone(),
        )
    }
}
