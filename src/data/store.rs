use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;

use crate::data::{migrations, repository};
use crate::error::AppError;
use crate::models::settings::Settings;
use crate::models::tab::TabMetadataMap;

/// Durable, user-editable settings (the extension's synced storage area).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_settings(&self) -> Result<Settings, AppError>;

    async fn save_settings(&self, settings: &Settings) -> Result<(), AppError>;

    /// Loads the settings, applies `edit` and saves the result as one step, so
    /// concurrent edits never overwrite each other.
    async fn update_settings(
        &self,
        edit: &mut (dyn for<'s> FnMut(&'s mut Settings) -> Result<(), AppError> + Send),
    ) -> Result<Settings, AppError>;

    /// Writes `defaults` for keys never stored before, leaving existing values alone.
    async fn initialize_defaults(&self, defaults: &Settings) -> Result<(), AppError>;
}

/// Device-local storage backing the tab metadata cache.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn load_tab_metadata(&self) -> Result<TabMetadataMap, AppError>;

    async fn save_tab_metadata(&self, entries: &TabMetadataMap) -> Result<(), AppError>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::General(format!("Failed to create {parent:?}: {e}")))?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| AppError::General(e.to_string()))?;
        f(&mut conn)
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn load_settings(&self) -> Result<Settings, AppError> {
        self.with_conn(|conn| repository::load_settings(conn))
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), AppError> {
        self.with_conn(|conn| repository::save_settings(conn, settings))
    }

    async fn update_settings(
        &self,
        edit: &mut (dyn for<'s> FnMut(&'s mut Settings) -> Result<(), AppError> + Send),
    ) -> Result<Settings, AppError> {
        self.with_conn(|conn| {
            let mut settings = repository::load_settings(conn)?;
            edit(&mut settings)?;
            repository::save_settings(conn, &settings)?;
            Ok(settings)
        })
    }

    async fn initialize_defaults(&self, defaults: &Settings) -> Result<(), AppError> {
        let written = self.with_conn(|conn| repository::initialize_settings(conn, defaults))?;
        if !written.is_empty() {
            tracing::info!("Initialized default settings: {}", written.join(", "));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn load_tab_metadata(&self) -> Result<TabMetadataMap, AppError> {
        self.with_conn(|conn| repository::load_tab_metadata(conn))
    }

    async fn save_tab_metadata(&self, entries: &TabMetadataMap) -> Result<(), AppError> {
        self.with_conn(|conn| repository::save_tab_metadata(conn, entries))
    }
}
