//! File-backed session slot: the record lives in a single JSON file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use std::sync::Arc;

use async_trait::async_trait;

use crate::repository::{SessionRecord, SessionRepository, Storage, StorageError};

#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }
}

#[async_trait]
impl SessionRepository for JsonFileRepository {
    async fn load(&self) -> Result<Option<SessionRecord>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => SessionRecord::from_json(&raw).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let raw = record.to_json()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write-then-rename; readers never see a partial record.
        let staging = self.staging_path();
        tokio::fs::write(&staging, raw).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Storage {
    /// Storage whose session slot is the JSON file at `path`.
    #[must_use]
    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        let sessions: Arc<dyn SessionRepository> = Arc::new(JsonFileRepository::new(path));
        Self { sessions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{OptionId, QuestionId, QuizId, QuizSession, UserId};
    use quiz_core::time::fixed_now;

    fn record() -> SessionRecord {
        let mut session =
            QuizSession::new(UserId::new(1), QuizId::new(2), "lifetimes", 120, fixed_now())
                .unwrap();
        session.record_answer(QuestionId::new(4), OptionId::new(40), fixed_now());
        SessionRecord::from_session(&session)
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty_slot() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("session.json"));
        assert!(repo.load().await.unwrap().is_none());
        repo.clear().await.unwrap();
    }

    #[tokio::test]
    async fn save_load_clear_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("nested").join("session.json"));

        repo.save(&record()).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), Some(record()));
        assert!(!repo.staging_path().exists());

        repo.clear().await.unwrap();
        assert!(repo.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"userId": 1, "quizId""#).unwrap();

        let repo = JsonFileRepository::new(path);
        assert!(matches!(
            repo.load().await,
            Err(StorageError::Serialization(_))
        ));
    }
}
