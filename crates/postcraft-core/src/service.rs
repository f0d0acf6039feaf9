//! Storage façade
//!
//! The single persistence entry point. Settings, content and layouts are
//! routed through the configured [`ContentStore`]; export, import, reset,
//! maintenance and status act on top of those routes or on the local stores.
//!
//! No operation holds a lock across stores. A partial failure during
//! `clear_all` or `import_all` leaves some entities updated and others not.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use postcraft_storage::{
    Collection, DiagnosticEntry, DocumentStoreInfo, ErrorKind, GetAllOptions, KvInfo,
    StorageKey,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::content::{GeneratedContent, Layout, Project};
use crate::local::LocalContentStore;
use crate::maintenance::{is_expired, MaintenanceOptions, MaintenanceReport};
use crate::remote::RemoteContentStore;
use crate::settings::{AppPreferences, BrandKit, CampaignVariable, RecentPrompts, Settings, UserInfo};
use crate::snapshot::{ExportMetadata, ExportSnapshot, EXPORT_FORMAT_VERSION};
use crate::strategy::{ContentStore, Served, ServedTracker, StorageMode};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub initialized: bool,
    pub mode: StorageMode,
    pub key_value: KvInfo,
    pub documents: Option<DocumentStoreInfo>,
    pub documents_error: Option<String>,
}

pub struct StorageService {
    config: Config,
    local: Arc<LocalContentStore>,
    primary: Arc<dyn ContentStore>,
    initialized: AtomicBool,
    init_lock: tokio::sync::Mutex<()>,
}

impl StorageService {
    /// Build the local stores, plus the remote strategy when the
    /// configuration names a remote endpoint.
    pub fn new(config: Config) -> Result<Self> {
        let local = Arc::new(LocalContentStore::from_config(&config));
        let primary: Arc<dyn ContentStore> = match &config.remote {
            Some(remote) => Arc::new(RemoteContentStore::new(remote)?),
            None => local.clone(),
        };

        Ok(Self::with_strategy(config, local, primary))
    }

    pub fn with_strategy(
        config: Config,
        local: Arc<LocalContentStore>,
        primary: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            config,
            local,
            primary,
            initialized: AtomicBool::new(false),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> StorageMode {
        self.primary.mode()
    }

    pub fn local(&self) -> &LocalContentStore {
        &self.local
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Open the local stores. Safe to call repeatedly; every operation calls
    /// it implicitly.
    ///
    /// Document store failures never stop initialization. Settings keep
    /// working from the key-value store and content operations report the
    /// failure. After a failed schema upgrade the document store stays
    /// unusable for the rest of the session (see [`Self::documents_fatal`]).
    pub async fn initialize(&self) {
        if self.is_initialized() {
            return;
        }

        let _guard = self.init_lock.lock().await;
        if self.is_initialized() {
            return;
        }

        let kv_available = self.local.kv().is_available();
        if let Err(e) = self.local.documents().open().await {
            self.record_failure("initialize", e.kind(), e.to_string());
        }

        self.initialized.store(true, Ordering::Release);
        tracing::info!(
            mode = %self.mode(),
            kv_available,
            documents_open = self.local.documents().is_open(),
            "Storage initialized"
        );
    }

    /// Why the document store cannot be used this session, if it cannot.
    pub fn documents_fatal(&self) -> Option<String> {
        self.local.documents().fatal_error()
    }

    /// Release the document store connection. A later call initializes
    /// again.
    pub fn dispose(&self) {
        self.local.documents().close();
        self.initialized.store(false, Ordering::Release);
        tracing::info!("Storage disposed");
    }

    fn record_failure(&self, operation: &str, kind: ErrorKind, message: String) {
        self.local
            .kv()
            .record_diagnostic(DiagnosticEntry::new(operation, None, kind, message));
    }

    /// Run `op` on the configured store. When that store is remote and
    /// fails, run it once more against local storage.
    async fn route<'a, T, F>(&'a self, operation: &'static str, op: F) -> Result<Served<T>>
    where
        F: Fn(&'a dyn ContentStore) -> BoxFuture<'a, Result<T>>,
    {
        self.initialize().await;

        let primary: &'a dyn ContentStore = self.primary.as_ref();
        let err = match op(primary).await {
            Ok(value) => return Ok(Served::new(value, primary.mode())),
            Err(err) => err,
        };
        self.record_failure(operation, err.kind(), err.to_string());

        if primary.mode() != StorageMode::Remote {
            return Err(err);
        }

        tracing::warn!(
            operation = operation,
            "Remote storage failed, retrying locally: {}",
            err
        );

        let local: &'a dyn ContentStore = self.local.as_ref();
        match op(local).await {
            Ok(value) => Ok(Served::fallback(value, err.to_string())),
            Err(local_err) => {
                self.record_failure(operation, local_err.kind(), local_err.to_string());
                Err(local_err)
            }
        }
    }

    // === Settings ===

    /// Load a settings category, backfilled with defaults. Never fails: if
    /// no path can serve it, the defaults are returned.
    pub async fn load_settings<S: Settings>(&self) -> Served<S> {
        match self
            .route("load_settings", |store| store.load_settings(S::KEY))
            .await
        {
            Ok(served) => served.map(|stored| {
                stored
                    .map(|value| S::with_defaults(&value))
                    .unwrap_or_default()
            }),
            Err(e) => {
                tracing::warn!(key = %S::KEY, "Settings unavailable, using defaults: {}", e);
                Served::fallback(S::default(), e.to_string())
            }
        }
    }

    pub async fn save_settings<S: Settings>(&self, value: &S) -> Result<Served<()>> {
        let normalized = serde_json::to_value(S::with_defaults(&serde_json::to_value(value)?))?;
        let served = self
            .route("save_settings", |store| {
                store.save_settings(S::KEY, normalized.clone())
            })
            .await?;

        tracing::debug!(key = %S::KEY, served_by = %served.served_by, "Saved settings");
        Ok(served)
    }

    pub async fn load_brand_kit(&self) -> Served<BrandKit> {
        self.load_settings().await
    }

    pub async fn save_brand_kit(&self, kit: &BrandKit) -> Result<Served<()>> {
        self.save_settings(kit).await
    }

    pub async fn load_user_info(&self) -> Served<UserInfo> {
        self.load_settings().await
    }

    pub async fn save_user_info(&self, info: &UserInfo) -> Result<Served<()>> {
        self.save_settings(info).await
    }

    pub async fn load_campaign_variable(&self) -> Served<CampaignVariable> {
        self.load_settings().await
    }

    pub async fn save_campaign_variable(&self, variable: &CampaignVariable) -> Result<Served<()>> {
        self.save_settings(variable).await
    }

    pub async fn load_app_preferences(&self) -> Served<AppPreferences> {
        self.load_settings().await
    }

    pub async fn save_app_preferences(&self, preferences: &AppPreferences) -> Result<Served<()>> {
        self.save_settings(preferences).await
    }

    pub async fn load_recent_prompts(&self) -> Served<RecentPrompts> {
        self.load_settings().await
    }

    pub async fn save_recent_prompts(&self, prompts: &RecentPrompts) -> Result<Served<()>> {
        self.save_settings(prompts).await
    }

    /// Put `prompt` at the front of the recent-prompt history.
    pub async fn add_recent_prompt(&self, prompt: &str) -> Result<Served<RecentPrompts>> {
        let mut tracker = ServedTracker::new(self.mode());
        let mut recent = tracker.take(self.load_recent_prompts().await);
        recent.push(prompt);
        tracker.take(self.save_recent_prompts(&recent).await?);
        Ok(tracker.finish(recent))
    }

    // === Generated content ===

    pub async fn save_generated_content(&self, content: GeneratedContent) -> Result<Served<String>> {
        self.route("save_generated_content", |store| {
            store.save_content(content.clone())
        })
        .await
    }

    pub async fn load_generated_content(
        &self,
        id: &str,
    ) -> Result<Served<Option<GeneratedContent>>> {
        self.route("load_generated_content", |store| store.load_content(id))
            .await
    }

    /// Newest first.
    pub async fn list_recent(&self, limit: usize) -> Result<Served<Vec<GeneratedContent>>> {
        self.route("list_recent", |store| store.list_recent(limit))
            .await
    }

    pub async fn search(&self, text: &str) -> Result<Served<Vec<GeneratedContent>>> {
        self.route("search", |store| store.search(text)).await
    }

    pub async fn delete_generated_content(&self, id: &str) -> Result<Served<bool>> {
        self.route("delete_generated_content", |store| store.delete_content(id))
            .await
    }

    // === Layouts ===

    pub async fn save_layout(&self, layout: Layout) -> Result<Served<String>> {
        self.route("save_layout", |store| store.save_layout(layout.clone()))
            .await
    }

    pub async fn list_layouts_for_content(&self, image_id: &str) -> Result<Served<Vec<Layout>>> {
        self.route("list_layouts_for_content", |store| {
            store.list_layouts_for_content(image_id)
        })
        .await
    }

    // === Projects (local only) ===

    pub async fn save_project(&self, project: &Project) -> Result<String> {
        self.initialize().await;
        self.local.save_project(project).await
    }

    pub async fn load_project(&self, id: &str) -> Result<Option<Project>> {
        self.initialize().await;
        self.local.load_project(id).await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.initialize().await;
        self.local.list_projects().await
    }

    // === Export / import ===

    /// Snapshot of every settings category, the most recent content records
    /// and store introspection. Reads only.
    pub async fn export_all(&self) -> Result<Served<ExportSnapshot>> {
        let mut tracker = ServedTracker::new(self.mode());

        let brand_kit = tracker.take(self.load_brand_kit().await);
        let user_info = tracker.take(self.load_user_info().await);
        let campaign_variable = tracker.take(self.load_campaign_variable().await);
        let app_preferences = tracker.take(self.load_app_preferences().await);
        let recent_prompts = tracker.take(self.load_recent_prompts().await);
        let images = tracker.take(self.list_recent(self.config.export_limit).await?);

        let database_info = match self.local.documents().info().await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!("Export without document store info: {}", e);
                None
            }
        };

        tracing::info!(images = images.len(), "Exported data");

        Ok(tracker.finish(ExportSnapshot {
            brand_kit: Some(brand_kit),
            user_info: Some(user_info),
            campaign_variable: Some(campaign_variable),
            app_preferences: Some(app_preferences),
            recent_prompts: Some(recent_prompts),
            images: Some(images),
            metadata: Some(ExportMetadata {
                exported_at: Utc::now(),
                version: EXPORT_FORMAT_VERSION.to_string(),
            }),
            database_info,
        }))
    }

    /// Write every field present in `snapshot` through the normal save
    /// paths. Absent fields leave existing data alone. The value is `true`
    /// only if every write succeeded.
    pub async fn import_all(&self, snapshot: &ExportSnapshot) -> Result<Served<bool>> {
        self.initialize().await;

        let mut tracker = ServedTracker::new(self.mode());
        let mut ok = true;

        if let Some(kit) = &snapshot.brand_kit {
            ok &= import_step("brandKit", self.save_brand_kit(kit).await, &mut tracker);
        }
        if let Some(info) = &snapshot.user_info {
            ok &= import_step("userInfo", self.save_user_info(info).await, &mut tracker);
        }
        if let Some(variable) = &snapshot.campaign_variable {
            ok &= import_step(
                "campaignVariable",
                self.save_campaign_variable(variable).await,
                &mut tracker,
            );
        }
        if let Some(preferences) = &snapshot.app_preferences {
            ok &= import_step(
                "appPreferences",
                self.save_app_preferences(preferences).await,
                &mut tracker,
            );
        }
        if let Some(prompts) = &snapshot.recent_prompts {
            ok &= import_step(
                "recentPrompts",
                self.save_recent_prompts(prompts).await,
                &mut tracker,
            );
        }

        let mut imported = 0usize;
        for image in snapshot.images.iter().flatten() {
            let step = import_step(
                "images",
                self.save_generated_content(image.clone()).await,
                &mut tracker,
            );
            imported += usize::from(step);
            ok &= step;
        }

        tracing::info!(images = imported, complete = ok, "Imported data");
        Ok(tracker.finish(ok))
    }

    pub async fn export_to_file(&self, path: impl AsRef<Path>) -> Result<Served<ExportSnapshot>> {
        let path = path.as_ref();
        let served = self.export_all().await?;
        let raw = served.value.to_json_pretty()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, raw).await?;

        tracing::info!(path = %path.display(), "Wrote export file");
        Ok(served)
    }

    pub async fn import_from_file(&self, path: impl AsRef<Path>) -> Result<Served<bool>> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let snapshot = ExportSnapshot::from_json(&raw)?;
        self.import_all(&snapshot).await
    }

    // === Reset / maintenance / status ===

    /// Clear every settings key and every document collection. Keeps going
    /// past failures and reports whether all of it succeeded.
    pub async fn clear_all(&self) -> bool {
        self.initialize().await;

        let mut ok = self.local.kv().clear(&StorageKey::SETTINGS);
        for collection in Collection::ALL {
            match self.local.documents().clear(collection).await {
                Ok(cleared) => ok &= cleared,
                Err(e) => {
                    self.record_failure("clear_all", e.kind(), e.to_string());
                    ok = false;
                }
            }
        }

        tracing::info!(success = ok, "Cleared local data");
        ok
    }

    /// Age threshold from the stored app preferences, or the configured
    /// default when none are stored.
    pub async fn default_maintenance_options(&self) -> MaintenanceOptions {
        let stored = self
            .route("load_settings", |store| {
                store.load_settings(StorageKey::AppPreferences)
            })
            .await;

        let max_age_days = match stored {
            Ok(Served {
                value: Some(value), ..
            }) => AppPreferences::with_defaults(&value).maintenance_max_age_days,
            _ => self.config.maintenance_max_age_days,
        };

        MaintenanceOptions { max_age_days }
    }

    pub async fn perform_maintenance(&self, options: MaintenanceOptions) -> Result<MaintenanceReport> {
        self.perform_maintenance_at(Utc::now(), options).await
    }

    /// Delete content records created strictly before `now - max_age_days`.
    /// Records without a readable creation time are kept.
    pub async fn perform_maintenance_at(
        &self,
        now: DateTime<Utc>,
        options: MaintenanceOptions,
    ) -> Result<MaintenanceReport> {
        self.initialize().await;

        let cutoff = options.cutoff(now);
        let documents = self.local.documents();
        let records = documents
            .get_all(Collection::Images, GetAllOptions::new())
            .await?;

        let mut deleted_count = 0;
        let mut skipped_count = 0;
        for record in records {
            let Some(id) = record.get("id").and_then(Value::as_str) else {
                skipped_count += 1;
                continue;
            };

            match is_expired(&record, cutoff) {
                Some(true) => match documents.delete(Collection::Images, id).await {
                    Ok(true) => deleted_count += 1,
                    Ok(false) => {}
                    Err(e) => {
                        self.record_failure("perform_maintenance", e.kind(), e.to_string());
                    }
                },
                Some(false) => {}
                None => skipped_count += 1,
            }
        }

        tracing::info!(
            deleted = deleted_count,
            skipped = skipped_count,
            max_age_days = options.max_age_days,
            "Maintenance finished"
        );

        Ok(MaintenanceReport {
            deleted_count,
            skipped_count,
            cutoff,
        })
    }

    pub async fn status(&self) -> ServiceStatus {
        let initialized = self.is_initialized();
        let (documents, documents_error) = if initialized {
            match self.local.documents().info().await {
                Ok(info) => (Some(info), None),
                Err(e) => (None, Some(e.to_string())),
            }
        } else {
            (None, None)
        };

        ServiceStatus {
            initialized,
            mode: self.mode(),
            key_value: self.local.kv().info(),
            documents,
            documents_error,
        }
    }

    pub fn diagnostics(&self) -> Vec<DiagnosticEntry> {
        self.local.kv().diagnostics()
    }
}

fn import_step<T>(what: &str, result: Result<Served<T>>, tracker: &mut ServedTracker) -> bool {
    match result {
        Ok(served) => {
            tracker.take(served);
            true
        }
        Err(e) => {
            tracing::warn!(field = what, "Import step failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use async_trait::async_trait;
    use chrono::{Duration, SubsecRound};
    use postcraft_storage::DocumentLocation;

    /// Remote strategy whose server never answers.
    struct OfflineStore;

    fn offline() -> CoreError {
        CoreError::RemoteUnreachable("connection refused".to_string())
    }

    #[async_trait]
    impl ContentStore for OfflineStore {
        fn mode(&self) -> StorageMode {
            StorageMode::Remote
        }

        async fn load_settings(&self, _key: StorageKey) -> Result<Option<Value>> {
            Err(offline())
        }

        async fn save_settings(&self, _key: StorageKey, _value: Value) -> Result<()> {
            Err(offline())
        }

        async fn save_content(&self, _content: GeneratedContent) -> Result<String> {
            Err(offline())
        }

        async fn load_content(&self, _id: &str) -> Result<Option<GeneratedContent>> {
            Err(offline())
        }

        async fn list_recent(&self, _limit: usize) -> Result<Vec<GeneratedContent>> {
            Err(offline())
        }

        async fn search(&self, _text: &str) -> Result<Vec<GeneratedContent>> {
            Err(offline())
        }

        async fn delete_content(&self, _id: &str) -> Result<bool> {
            Err(offline())
        }

        async fn save_layout(&self, _layout: Layout) -> Result<String> {
            Err(offline())
        }

        async fn list_layouts_for_content(&self, _image_id: &str) -> Result<Vec<Layout>> {
            Err(offline())
        }
    }

    fn service() -> StorageService {
        StorageService::new(Config::in_memory()).unwrap()
    }

    fn offline_service() -> StorageService {
        let config = Config::in_memory();
        let local = Arc::new(LocalContentStore::from_config(&config));
        StorageService::with_strategy(config, local, Arc::new(OfflineStore))
    }

    fn content_at(prompt: &str, created_at: DateTime<Utc>) -> GeneratedContent {
        let mut content = GeneratedContent::new(prompt, "instagram");
        content.created_at = Some(created_at);
        content
    }

    fn custom_kit() -> BrandKit {
        BrandKit {
            colors: vec!["#000000".to_string(), "#FF5500".to_string()],
            typography: "Inter".to_string(),
            style_keywords: vec!["bold".to_string(), "minimal".to_string()],
            campaign_directive: "Autumn launch".to_string(),
        }
    }

    #[tokio::test]
    async fn test_settings_default_then_round_trip() {
        let service = service();

        assert_eq!(service.load_brand_kit().await.value, BrandKit::default());
        assert_eq!(service.load_user_info().await.value, UserInfo::default());
        assert_eq!(
            service.load_app_preferences().await.value,
            AppPreferences::default()
        );

        let kit = custom_kit();
        let served = service.save_brand_kit(&kit).await.unwrap();
        assert_eq!(served.served_by, StorageMode::Local);
        assert!(!served.is_fallback());
        assert_eq!(service.load_brand_kit().await.value, kit);

        let info = UserInfo {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            ..UserInfo::default()
        };
        service.save_user_info(&info).await.unwrap();
        assert_eq!(service.load_user_info().await.value, info);

        let variable = CampaignVariable {
            name: "season".to_string(),
            value: "autumn".to_string(),
        };
        service.save_campaign_variable(&variable).await.unwrap();
        assert_eq!(service.load_campaign_variable().await.value, variable);
    }

    #[tokio::test]
    async fn test_save_normalizes_brand_colors() {
        let service = service();
        let mut kit = custom_kit();
        kit.colors = (0..8).map(|i| format!("#00000{i}")).collect();

        service.save_brand_kit(&kit).await.unwrap();
        let loaded = service.load_brand_kit().await.value;
        assert_eq!(loaded.colors.len(), crate::settings::MAX_BRAND_COLORS);
    }

    #[tokio::test]
    async fn test_add_recent_prompt() {
        let service = service();
        service.add_recent_prompt("sunset over hills").await.unwrap();
        service.add_recent_prompt("city at night").await.unwrap();
        let served = service.add_recent_prompt("sunset over hills").await.unwrap();

        assert_eq!(
            served.value.prompts,
            vec!["sunset over hills".to_string(), "city at night".to_string()]
        );
        assert_eq!(service.load_recent_prompts().await.value, served.value);
    }

    #[tokio::test]
    async fn test_content_save_load_delete() {
        let service = service();
        let id = service
            .save_generated_content(GeneratedContent::new("a red fox", "instagram"))
            .await
            .unwrap()
            .value;

        let loaded = service.load_generated_content(&id).await.unwrap().value.unwrap();
        assert_eq!(loaded.id.as_deref(), Some(id.as_str()));
        assert_eq!(loaded.prompt, "a red fox");
        assert!(loaded.created_at.is_some());

        assert!(service.delete_generated_content(&id).await.unwrap().value);
        assert!(!service.delete_generated_content(&id).await.unwrap().value);
        assert!(service.load_generated_content(&id).await.unwrap().value.is_none());
    }

    #[tokio::test]
    async fn test_layouts_for_content() {
        let service = service();
        let id = service
            .save_generated_content(GeneratedContent::new("poster", "linkedin"))
            .await
            .unwrap()
            .value;

        service.save_layout(Layout::new(&id, "linkedin")).await.unwrap();
        service.save_layout(Layout::new(&id, "twitter")).await.unwrap();
        service.save_layout(Layout::new("other", "linkedin")).await.unwrap();

        let layouts = service.list_layouts_for_content(&id).await.unwrap().value;
        assert_eq!(layouts.len(), 2);
        assert!(layouts.iter().all(|l| l.image_id == id));
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let service = service();
        let base = Utc::now().trunc_subsecs(0) - Duration::hours(1);
        for i in 0..8 {
            service
                .save_generated_content(content_at(&format!("prompt {i}"), base + Duration::minutes(i)))
                .await
                .unwrap();
        }

        let recent = service.list_recent(5).await.unwrap().value;
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].prompt, "prompt 7");
        for pair in recent.windows(2) {
            assert!(pair[0].created_at > pair[1].created_at);
        }
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let service = service();
        for prompt in [
            "Golden SUNSET at the beach",
            "morning coffee",
            "sunset skyline",
            "mountain lake",
            "neon city",
        ] {
            service
                .save_generated_content(GeneratedContent::new(prompt, "instagram"))
                .await
                .unwrap();
        }

        let found = service.search("Sunset").await.unwrap().value;
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| c.prompt.to_lowercase().contains("sunset")));

        assert!(service.search("desert").await.unwrap().value.is_empty());
    }

    #[tokio::test]
    async fn test_maintenance_deletes_strictly_older() {
        let service = service();
        let now = Utc::now().trunc_subsecs(0);

        for age in [0, 6, 7, 8, 30] {
            service
                .save_generated_content(content_at(&format!("{age} days"), now - Duration::days(age)))
                .await
                .unwrap();
        }

        let report = service
            .perform_maintenance_at(now, MaintenanceOptions { max_age_days: 7 })
            .await
            .unwrap();
        assert_eq!(report.deleted_count, 2);
        assert_eq!(report.skipped_count, 0);

        let mut left: Vec<String> = service
            .list_recent(10)
            .await
            .unwrap()
            .value
            .into_iter()
            .map(|c| c.prompt)
            .collect();
        left.sort();
        assert_eq!(left, vec!["0 days", "6 days", "7 days"]);
    }

    #[tokio::test]
    async fn test_maintenance_keeps_unreadable_timestamps() {
        let service = service();
        service.initialize().await;

        let mut record = postcraft_storage::Record::new();
        record.insert("id".to_string(), Value::from("legacy"));
        record.insert("prompt".to_string(), Value::from("old import"));
        record.insert("createdAt".to_string(), Value::from("last tuesday"));
        service
            .local()
            .documents()
            .put(Collection::Images, record)
            .await
            .unwrap();

        let report = service
            .perform_maintenance(MaintenanceOptions { max_age_days: 0 })
            .await
            .unwrap();
        assert_eq!(report.deleted_count, 0);
        assert_eq!(report.skipped_count, 1);
    }

    #[tokio::test]
    async fn test_default_maintenance_options_follow_preferences() {
        let service = service();
        assert_eq!(service.default_maintenance_options().await.max_age_days, 30);

        let preferences = AppPreferences {
            maintenance_max_age_days: 14,
            ..AppPreferences::default()
        };
        service.save_app_preferences(&preferences).await.unwrap();
        assert_eq!(service.default_maintenance_options().await.max_age_days, 14);
    }

    #[tokio::test]
    async fn test_huge_stored_age_deletes_nothing() {
        let service = service();
        service
            .save_generated_content(content_at("ancient", Utc::now() - Duration::days(3650)))
            .await
            .unwrap();

        let preferences = AppPreferences {
            maintenance_max_age_days: u32::MAX,
            ..AppPreferences::default()
        };
        service.save_app_preferences(&preferences).await.unwrap();

        let options = service.default_maintenance_options().await;
        let report = service.perform_maintenance(options).await.unwrap();
        assert_eq!(report.deleted_count, 0);
        assert_eq!(service.list_recent(10).await.unwrap().value.len(), 1);
    }

    #[tokio::test]
    async fn test_update_keeps_original_creation_time() {
        let service = service();
        let created = Utc::now().trunc_subsecs(0) - Duration::days(2);
        let id = service
            .save_generated_content(content_at("fox", created))
            .await
            .unwrap()
            .value;

        let mut loaded = service.load_generated_content(&id).await.unwrap().value.unwrap();
        loaded.created_at = Some(created - Duration::days(365));
        loaded.prompt = "red fox".to_string();
        service.save_generated_content(loaded).await.unwrap();

        let stored = service.load_generated_content(&id).await.unwrap().value.unwrap();
        assert_eq!(stored.created_at, Some(created));
        assert_eq!(stored.prompt, "red fox");
    }

    #[tokio::test]
    async fn test_newer_document_schema_keeps_settings_working() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf());

        let first = StorageService::new(config.clone()).unwrap();
        first.save_brand_kit(&custom_kit()).await.unwrap();
        first
            .save_generated_content(GeneratedContent::new("kept on disk", "instagram"))
            .await
            .unwrap();
        first.dispose();
        drop(first);

        let documents_path = match &config.documents {
            DocumentLocation::Disk(path) => path.clone(),
            other => panic!("expected a disk location, got {other:?}"),
        };
        rusqlite::Connection::open(&documents_path)
            .unwrap()
            .execute("UPDATE schema_version SET version = 99", [])
            .unwrap();

        let second = StorageService::new(config).unwrap();
        second.initialize().await;
        assert!(second.is_initialized());
        assert!(second.documents_fatal().is_some());

        let loaded = second.load_brand_kit().await;
        assert!(!loaded.is_fallback());
        assert_eq!(loaded.value, custom_kit());

        let mut kit = custom_kit();
        kit.typography = "Bold".to_string();
        second.save_brand_kit(&kit).await.unwrap();
        assert_eq!(second.load_brand_kit().await.value, kit);

        let err = second
            .save_generated_content(GeneratedContent::new("new", "instagram"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaUpgradeFailed);
        assert!(second.list_recent(5).await.is_err());

        let status = second.status().await;
        assert!(status.documents.is_none());
        assert!(status.documents_error.is_some());
    }

    #[tokio::test]
    async fn test_export_clear_import_restores() {
        let service = service();
        let kit = custom_kit();
        service.save_brand_kit(&kit).await.unwrap();
        service.add_recent_prompt("sunset").await.unwrap();

        let base = Utc::now().trunc_subsecs(0) - Duration::days(1);
        for i in 0..3 {
            service
                .save_generated_content(content_at(&format!("image {i}"), base + Duration::hours(i)))
                .await
                .unwrap();
        }

        let snapshot = service.export_all().await.unwrap().value;
        assert_eq!(snapshot.images.as_ref().map(Vec::len), Some(3));
        let metadata = snapshot.metadata.clone().unwrap();
        assert_eq!(metadata.version, EXPORT_FORMAT_VERSION);
        assert_eq!(snapshot.database_info.as_ref().unwrap().total_items, 3);

        assert!(service.clear_all().await);
        assert_eq!(service.load_brand_kit().await.value, BrandKit::default());
        assert!(service.list_recent(10).await.unwrap().value.is_empty());

        assert!(service.import_all(&snapshot).await.unwrap().value);
        assert_eq!(service.load_brand_kit().await.value, kit);
        assert_eq!(
            service.load_recent_prompts().await.value.prompts,
            vec!["sunset".to_string()]
        );

        let restored = service.list_recent(10).await.unwrap().value;
        let exported = snapshot.images.unwrap();
        assert_eq!(restored.len(), exported.len());
        for (a, b) in restored.iter().zip(&exported) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.prompt, b.prompt);
            assert_eq!(a.created_at, b.created_at);
        }
    }

    #[tokio::test]
    async fn test_import_leaves_absent_fields_alone() {
        let service = service();
        let info = UserInfo {
            name: "Grace".to_string(),
            ..UserInfo::default()
        };
        service.save_user_info(&info).await.unwrap();

        let snapshot = ExportSnapshot {
            brand_kit: Some(custom_kit()),
            ..ExportSnapshot::default()
        };
        assert!(service.import_all(&snapshot).await.unwrap().value);

        assert_eq!(service.load_user_info().await.value, info);
        assert_eq!(service.load_brand_kit().await.value, custom_kit());
    }

    #[tokio::test]
    async fn test_export_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backups").join("postcraft.json");

        let source = service();
        source.save_brand_kit(&custom_kit()).await.unwrap();
        source
            .save_generated_content(GeneratedContent::new("harbor at dawn", "instagram"))
            .await
            .unwrap();
        source.export_to_file(&path).await.unwrap();

        let target = service();
        assert!(target.import_from_file(&path).await.unwrap().value);
        assert_eq!(target.load_brand_kit().await.value, custom_kit());
        assert_eq!(target.search("harbor").await.unwrap().value.len(), 1);
    }

    #[tokio::test]
    async fn test_settings_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf());

        let first = StorageService::new(config.clone()).unwrap();
        first.save_brand_kit(&custom_kit()).await.unwrap();
        let id = first
            .save_generated_content(GeneratedContent::new("lighthouse", "instagram"))
            .await
            .unwrap()
            .value;
        first.dispose();
        drop(first);

        let second = StorageService::new(config).unwrap();
        assert_eq!(second.load_brand_kit().await.value, custom_kit());
        let loaded = second.load_generated_content(&id).await.unwrap().value;
        assert_eq!(loaded.map(|c| c.prompt).as_deref(), Some("lighthouse"));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let service = service();
        assert!(!service.is_initialized());

        service.initialize().await;
        service.initialize().await;
        assert!(service.is_initialized());

        service.dispose();
        assert!(!service.is_initialized());
        service.initialize().await;
        assert!(service.is_initialized());
    }

    #[tokio::test]
    async fn test_status_reports_both_stores() {
        let service = service();

        let before = service.status().await;
        assert!(!before.initialized);
        assert!(before.documents.is_none());
        assert_eq!(before.mode, StorageMode::Local);

        service.save_brand_kit(&custom_kit()).await.unwrap();
        service
            .save_generated_content(GeneratedContent::new("status", "instagram"))
            .await
            .unwrap();

        let after = service.status().await;
        assert!(after.initialized);
        assert!(after.key_value.available);
        assert!(after.key_value.total_bytes > 0);

        let documents = after.documents.unwrap();
        assert_eq!(documents.version, postcraft_storage::SCHEMA_VERSION);
        assert_eq!(documents.collections.len(), Collection::ALL.len());
        assert_eq!(documents.total_items, 1);
    }

    #[tokio::test]
    async fn test_unavailable_documents_keep_settings_working() {
        let config = Config {
            documents: DocumentLocation::Disabled,
            ..Config::in_memory()
        };
        let service = StorageService::new(config).unwrap();

        service.initialize().await;
        service.save_brand_kit(&custom_kit()).await.unwrap();
        assert_eq!(service.load_brand_kit().await.value, custom_kit());

        let err = service
            .save_generated_content(GeneratedContent::new("x", "instagram"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        let status = service.status().await;
        assert!(status.documents.is_none());
        assert!(status.documents_error.is_some());
        assert!(!service.clear_all().await);
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_local() {
        let service = offline_service();
        assert_eq!(service.mode(), StorageMode::Remote);

        let saved = service.save_brand_kit(&custom_kit()).await.unwrap();
        assert_eq!(saved.served_by, StorageMode::Local);
        assert!(saved.is_fallback());

        let loaded = service.load_brand_kit().await;
        assert!(loaded.is_fallback());
        assert_eq!(loaded.value, custom_kit());

        let id = service
            .save_generated_content(GeneratedContent::new("offline", "instagram"))
            .await
            .unwrap();
        assert!(id.is_fallback());
        assert_eq!(
            service.local().documents().count(Collection::Images).await.unwrap(),
            1
        );

        let diagnostics = service.diagnostics();
        assert!(diagnostics
            .iter()
            .any(|entry| entry.kind == ErrorKind::RemoteUnreachable
                && entry.operation == "save_settings"));
    }

    #[tokio::test]
    async fn test_export_marks_fallback() {
        let service = offline_service();
        let served = service.export_all().await.unwrap();
        assert_eq!(served.served_by, StorageMode::Local);
        assert!(served.fallback_reason.is_some());
    }
}
