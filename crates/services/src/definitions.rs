//! Quiz definitions loaded from JSON documents on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use quiz_core::model::{QuizDefinition, QuizDefinitionDraft};
use serde::Deserialize;

use crate::collaborators::QuizDefinitionProvider;
use crate::error::ProviderError;

/// A document holds either one definition or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Many(Vec<QuizDefinitionDraft>),
    One(Box<QuizDefinitionDraft>),
}

impl Document {
    fn into_drafts(self) -> Vec<QuizDefinitionDraft> {
        match self {
            Document::Many(drafts) => drafts,
            Document::One(draft) => vec![*draft],
        }
    }
}

/// Definitions validated up front and served by slug.
#[derive(Debug, Clone, Default)]
pub struct JsonDefinitionProvider {
    by_slug: HashMap<String, QuizDefinition>,
}

impl JsonDefinitionProvider {
    /// Load a `.json` file, or every `.json` file in a directory.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if a document cannot be read or parsed, or if
    /// any definition in it fails validation.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let files = if tokio::fs::metadata(path).await?.is_dir() {
            json_files_in(path).await?
        } else {
            vec![path.to_path_buf()]
        };

        let mut drafts = Vec::new();
        for file in files {
            let text = tokio::fs::read_to_string(&file).await?;
            let document: Document = serde_json::from_str(&text)?;
            drafts.extend(document.into_drafts());
        }

        let provider = Self::from_drafts(drafts)?;
        tracing::info!(
            path = %path.display(),
            quizzes = provider.by_slug.len(),
            "quiz definitions loaded"
        );
        Ok(provider)
    }

    /// # Errors
    ///
    /// Returns `ProviderError::InvalidDefinition` for the first invalid draft.
    pub fn from_drafts(
        drafts: impl IntoIterator<Item = QuizDefinitionDraft>,
    ) -> Result<Self, ProviderError> {
        let mut by_slug = HashMap::new();
        for draft in drafts {
            let definition = draft.validate()?;
            if let Some(previous) = by_slug.insert(definition.slug().to_string(), definition) {
                tracing::warn!(slug = previous.slug(), "duplicate quiz slug; keeping the last one");
            }
        }
        Ok(Self { by_slug })
    }

    /// Known slugs, sorted.
    #[must_use]
    pub fn slugs(&self) -> Vec<&str> {
        let mut slugs: Vec<&str> = self.by_slug.keys().map(String::as_str).collect();
        slugs.sort_unstable();
        slugs
    }
}

async fn json_files_in(dir: &Path) -> Result<Vec<PathBuf>, ProviderError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[async_trait]
impl QuizDefinitionProvider for JsonDefinitionProvider {
    async fn fetch_by_slug(&self, slug: &str) -> Result<Option<QuizDefinition>, ProviderError> {
        Ok(self.by_slug.get(slug).cloned())
    }
}
