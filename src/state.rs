use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::browser::TabsApi;
use crate::config::{self, ClassifierConfig};
use crate::data::{MetadataStore, SettingsStore, SqliteStore};
use crate::error::AppError;
use crate::models::tab::TabQuery;
use crate::services::classifier_service::ClassificationClient;
use crate::services::metadata_cache::{PersistenceObserver, TabMetadataCache};
use crate::services::settings_service;

/// Owns every collaborator of the grouping core for one browser session.
pub struct AppState {
    pub settings: Arc<dyn SettingsStore>,
    pub tabs: Arc<dyn TabsApi>,
    pub cache: TabMetadataCache,
    pub classifier: ClassificationClient,
    grouping_guard: Mutex<()>,
}

impl AppState {
    /// Writes default settings, restores the tab metadata cache and backfills
    /// it from the tabs that are already open.
    pub async fn start(
        settings: Arc<dyn SettingsStore>,
        metadata: Arc<dyn MetadataStore>,
        tabs: Arc<dyn TabsApi>,
        classifier: ClassifierConfig,
        on_persist_error: Option<PersistenceObserver>,
    ) -> Result<Self, AppError> {
        settings_service::initialize_defaults(settings.as_ref()).await?;

        let cache = TabMetadataCache::load(metadata, on_persist_error).await;
        let open_tabs = tabs.query_tabs(TabQuery::all()).await?;
        let backfilled = cache.initialize(&open_tabs);
        tracing::info!(
            "Tab sorter started: {} open tabs, {backfilled} backfilled",
            open_tabs.len()
        );

        Ok(Self {
            settings,
            tabs,
            cache,
            classifier: ClassificationClient::new(classifier),
            grouping_guard: Mutex::new(()),
        })
    }

    /// Starts against the SQLite store in the platform data directory, with the
    /// classifier configured from the environment.
    pub async fn start_default(tabs: Arc<dyn TabsApi>) -> Result<Self, AppError> {
        let path = config::default_store_path()
            .ok_or_else(|| AppError::General("failed to resolve app data dir".to_string()))?;
        let store = Arc::new(SqliteStore::open(&path)?);
        Self::start(
            store.clone(),
            store,
            tabs,
            ClassifierConfig::from_env(),
            None,
        )
        .await
    }

    /// Claims the grouping slot or fails with [`AppError::Busy`].
    pub fn try_begin_grouping(&self) -> Result<MutexGuard<'_, ()>, AppError> {
        self.grouping_guard.try_lock().map_err(|_| AppError::Busy)
    }

    /// Waits for the grouping slot.
    pub async fn begin_grouping(&self) -> MutexGuard<'_, ()> {
        self.grouping_guard.lock().await
    }
}
