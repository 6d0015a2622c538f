//! Template lookup.
//!
//! The store is an external collaborator: the pipeline only calls
//! [`TemplateStore::find_by_name`]. Two implementations live here, an
//! in-memory store fed from JSON files and a TTL cache wrapping any store.

use async_trait::async_trait;
use moka::future::Cache;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::Template;

#[derive(Debug, Error)]
pub enum TemplateStoreError {
    #[error("template store unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid template definition {}: {source}", .path.display())]
    InvalidDefinition {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl TemplateStoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        TemplateStoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Look up a template by its unique name. `Ok(None)` means not found.
    async fn find_by_name(&self, name: &str) -> Result<Option<Template>, TemplateStoreError>;
}

/// Template store backed by a map, optionally seeded from a directory.
#[derive(Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<HashMap<String, Template>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates<I>(templates: I) -> Self
    where
        I: IntoIterator<Item = Template>,
    {
        let store = Self::new();
        for template in templates {
            store.insert(template);
        }
        store
    }

    /// Load every `*.json` template definition found in `dir`.
    ///
    /// A missing directory yields an empty store; a malformed file is an error.
    pub fn load_from_dir(dir: &Path) -> Result<Self, TemplateStoreError> {
        let store = Self::new();

        if !dir.exists() {
            log::warn!(
                "Templates directory {} does not exist, starting with an empty store",
                dir.display()
            );
            return Ok(store);
        }

        let entries = fs::read_dir(dir).map_err(|e| TemplateStoreError::io(dir, e))?;

        for entry in entries {
            let path = entry.map_err(|e| TemplateStoreError::io(dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let raw = fs::read_to_string(&path).map_err(|e| TemplateStoreError::io(&path, e))?;
            let template: Template = serde_json::from_str(&raw).map_err(|source| {
                TemplateStoreError::InvalidDefinition {
                    path: path.clone(),
                    source,
                }
            })?;

            log::debug!("Loaded template '{}' from {}", template.name, path.display());
            store.insert(template);
        }

        log::info!("Loaded {} templates from {}", store.len(), dir.display());
        Ok(store)
    }

    pub fn insert(&self, template: Template) {
        self.templates.write().insert(template.name.clone(), template);
    }

    pub fn remove(&self, name: &str) -> Option<Template> {
        self.templates.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Template>, TemplateStoreError> {
        Ok(self.templates.read().get(name).cloned())
    }
}

/// Read-through TTL cache in front of another store.
///
/// Misses are never cached so a template created after a failed lookup
/// becomes visible immediately.
pub struct CachedTemplateStore {
    inner: Arc<dyn TemplateStore>,
    cache: Cache<String, Template>,
}

impl CachedTemplateStore {
    pub fn new(inner: Arc<dyn TemplateStore>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(1_000)
            .build();

        Self { inner, cache }
    }

    pub async fn invalidate(&self, name: &str) {
        self.cache.invalidate(name).await;
    }
}

#[async_trait]
impl TemplateStore for CachedTemplateStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Template>, TemplateStoreError> {
        if let Some(template) = self.cache.get(name).await {
            log::debug!("Template cache hit for '{}'", name);
            return Ok(Some(template));
        }

        let found = self.inner.find_by_name(name).await?;
        if let Some(ref template) = found {
            self.cache.insert(name.to_string(), template.clone()).await;
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::DocumentType;

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let store = InMemoryTemplateStore::with_templates(vec![Template::new(
            "invoice",
            DocumentType::Pdf,
            "<p>{{ total }}</p>",
        )]);

        assert!(store.find_by_name("invoice").await.unwrap().is_some());
        assert!(store.find_by_name("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cached_store_keeps_hits_and_skips_misses() {
        let inner = Arc::new(InMemoryTemplateStore::new());
        let cached = CachedTemplateStore::new(inner.clone(), Duration::from_secs(60));

        assert!(cached.find_by_name("late").await.unwrap().is_none());

        inner.insert(Template::new("late", DocumentType::Sms, "hi"));
        assert!(cached.find_by_name("late").await.unwrap().is_some());

        // Served from cache after removal from the backing store.
        inner.remove("late");
        assert!(cached.find_by_name("late").await.unwrap().is_some());

        cached.invalidate("late").await;
        assert!(cached.find_by_name("late").await.unwrap().is_none());
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("receipt.json"),
            r#"{"name":"receipt","type":"PDF","content":"<h1>{{ id }}</h1>"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = InMemoryTemplateStore::load_from_dir(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_malformed_definition_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        match InMemoryTemplateStore::load_from_dir(dir.path()) {
            Err(TemplateStoreError::InvalidDefinition { path, .. }) => {
                assert!(path.ends_with("broken.json"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("malformed definition was accepted"),
        }
    }

    #[test]
    fn test_load_from_missing_dir_is_empty() {
        let store = InMemoryTemplateStore::load_from_dir(Path::new("/nonexistent/templates")).unwrap();
        assert!(store.is_empty());
    }
}
