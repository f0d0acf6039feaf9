//! Local content store over the key-value and document stores

use async_trait::async_trait;
use postcraft_storage::{
    Direction, DocumentStore, ErrorKind, GetAllOptions, KeyValueStore, KvBackend, Record,
    SqliteKvBackend, StorageKey,
};
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::content::{Document, GeneratedContent, Layout, Project};
use crate::error::CoreError;
use crate::strategy::{ContentStore, StorageMode};
use crate::Result;

pub struct LocalContentStore {
    kv: KeyValueStore,
    documents: DocumentStore,
}

impl LocalContentStore {
    pub fn new(kv: KeyValueStore, documents: DocumentStore) -> Self {
        Self { kv, documents }
    }

    pub fn from_config(config: &Config) -> Self {
        let backend = match &config.settings_path {
            Some(path) => SqliteKvBackend::open(path, config.kv_quota_bytes),
            None => SqliteKvBackend::open_in_memory(config.kv_quota_bytes),
        };

        let kv = match backend {
            Ok(backend) => {
                let backend: Arc<dyn KvBackend> = Arc::new(backend);
                KeyValueStore::new(backend, config.diagnostic_capacity)
            }
            Err(e) => {
                tracing::warn!("Key-value storage unavailable, settings will not persist: {}", e);
                KeyValueStore::unavailable()
            }
        };

        Self::new(kv, DocumentStore::new(config.documents.clone()))
    }

    pub fn kv(&self) -> &KeyValueStore {
        &self.kv
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    async fn put<D: Document>(&self, document: &D) -> Result<String> {
        let record = document.to_record()?;
        Ok(self.documents.put(D::COLLECTION, record).await?)
    }

    async fn get<D: Document>(&self, id: &str) -> Result<Option<D>> {
        self.documents
            .get(D::COLLECTION, id)
            .await?
            .map(D::from_record)
            .transpose()
    }

    async fn list<D: Document>(&self, options: GetAllOptions) -> Result<Vec<D>> {
        let records = self.documents.get_all(D::COLLECTION, options).await?;
        Ok(decode_all(records))
    }

    pub async fn save_project(&self, project: &Project) -> Result<String> {
        self.put(project).await
    }

    pub async fn load_project(&self, id: &str) -> Result<Option<Project>> {
        self.get(id).await
    }

    /// Most recently updated first.
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.list(GetAllOptions::new().order_by("updatedAt", Direction::Desc))
            .await
    }
}

fn decode_all<D: Document>(records: Vec<Record>) -> Vec<D> {
    records
        .into_iter()
        .filter_map(|record| match D::from_record(record) {
            Ok(document) => Some(document),
            Err(e) => {
                tracing::warn!(collection = %D::COLLECTION, "Skipping unreadable record: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl ContentStore for LocalContentStore {
    fn mode(&self) -> StorageMode {
        StorageMode::Local
    }

    async fn load_settings(&self, key: StorageKey) -> Result<Option<Value>> {
        Ok(self.kv.get(key, None))
    }

    async fn save_settings(&self, key: StorageKey, value: Value) -> Result<()> {
        if self.kv.set(key, &value) {
            Ok(())
        } else {
            Err(CoreError::SettingsNotSaved {
                key,
                kind: self.kv.last_failure().unwrap_or(ErrorKind::Other),
            })
        }
    }

    async fn save_content(&self, content: GeneratedContent) -> Result<String> {
        let id = self.put(&content).await?;
        tracing::info!(id = %id, platform = %content.platform, "Saved generated content");
        Ok(id)
    }

    async fn load_content(&self, id: &str) -> Result<Option<GeneratedContent>> {
        self.get(id).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<GeneratedContent>> {
        self.list(
            GetAllOptions::new()
                .order_by("createdAt", Direction::Desc)
                .limit(limit),
        )
        .await
    }

    /// Full scan with substring matching, O(n) in the collection size.
    async fn search(&self, text: &str) -> Result<Vec<GeneratedContent>> {
        let needle = text.trim().to_lowercase();
        let all: Vec<GeneratedContent> = self
            .list(GetAllOptions::new().order_by("createdAt", Direction::Desc))
            .await?;

        Ok(all
            .into_iter()
            .filter(|content| content.matches(&needle))
            .collect())
    }

    async fn delete_content(&self, id: &str) -> Result<bool> {
        let removed = self.documents.delete(GeneratedContent::COLLECTION, id).await?;
        if removed {
            tracing::info!(id = %id, "Deleted generated content");
        }
        Ok(removed)
    }

    async fn save_layout(&self, layout: Layout) -> Result<String> {
        self.put(&layout).await
    }

    async fn list_layouts_for_content(&self, image_id: &str) -> Result<Vec<Layout>> {
        self.list(GetAllOptions::new().filter("imageId", Value::String(image_id.to_string())))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postcraft_storage::{DocumentLocation, MemoryKvBackend};

    fn store() -> LocalContentStore {
        LocalContentStore::from_config(&Config::in_memory())
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let store = store();
        assert_eq!(store.load_settings(StorageKey::UserInfo).await.unwrap(), None);

        let value = serde_json::json!({ "name": "Ada" });
        store
            .save_settings(StorageKey::UserInfo, value.clone())
            .await
            .unwrap();
        assert_eq!(
            store.load_settings(StorageKey::UserInfo).await.unwrap(),
            Some(value)
        );
    }

    #[tokio::test]
    async fn test_settings_save_failure_carries_kind() {
        let backend = Arc::new(MemoryKvBackend::new());
        backend.set_available(false);
        let store = LocalContentStore::new(
            KeyValueStore::new(backend, 10),
            DocumentStore::new(DocumentLocation::Memory),
        );

        let err = store
            .save_settings(StorageKey::BrandKit, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::SettingsNotSaved {
                key: StorageKey::BrandKit,
                kind: ErrorKind::Unavailable
            }
        ));

        // Reads still degrade to nothing stored
        assert_eq!(store.load_settings(StorageKey::BrandKit).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_layouts_filtered_by_content() {
        let store = store();
        let a = store
            .save_content(GeneratedContent::new("a", "instagram"))
            .await
            .unwrap();
        let b = store
            .save_content(GeneratedContent::new("b", "twitter"))
            .await
            .unwrap();

        store.save_layout(Layout::new(&a, "instagram")).await.unwrap();
        store.save_layout(Layout::new(&a, "story")).await.unwrap();
        store.save_layout(Layout::new(&b, "twitter")).await.unwrap();

        let layouts = store.list_layouts_for_content(&a).await.unwrap();
        assert_eq!(layouts.len(), 2);
        assert!(layouts.iter().all(|l| l.image_id == a));
    }

    #[tokio::test]
    async fn test_deleting_content_leaves_layouts() {
        let store = store();
        let id = store
            .save_content(GeneratedContent::new("a", "instagram"))
            .await
            .unwrap();
        store.save_layout(Layout::new(&id, "instagram")).await.unwrap();

        assert!(store.delete_content(&id).await.unwrap());
        assert!(store.load_content(&id).await.unwrap().is_none());
        assert_eq!(store.list_layouts_for_content(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_projects_newest_updated_first() {
        let store = store();
        let first = store.save_project(&Project::new("First")).await.unwrap();
        store.save_project(&Project::new("Second")).await.unwrap();

        let mut project = store.load_project(&first).await.unwrap().unwrap();
        project.description = "touched".to_string();
        store.save_project(&project).await.unwrap();

        let names: Vec<String> = store
            .list_projects()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["First", "Second"]);
    }
}
