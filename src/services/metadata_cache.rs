use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot};

use crate::data::MetadataStore;
use crate::error::AppError;
use crate::models::tab::{Tab, TabId, TabMetadataEntry, TabMetadataMap};

/// Called for every failed write of the cache to durable storage.
pub type PersistenceObserver = Arc<dyn Fn(&AppError) + Send + Sync>;

enum PersistJob {
    Save(TabMetadataMap),
    Flush(oneshot::Sender<()>),
}

/// Creation time and opener of each open HTTP(S) tab.
///
/// The in-memory map answers every read. Each mutation happens under one
/// short lock and queues a full snapshot to a single writer task, so writes
/// reach storage in mutation order and never block the caller.
pub struct TabMetadataCache {
    entries: Mutex<TabMetadataMap>,
    writer: mpsc::UnboundedSender<PersistJob>,
}

impl TabMetadataCache {
    /// Restores the map persisted by a previous session. Must run inside a Tokio runtime.
    pub async fn load(
        store: Arc<dyn MetadataStore>,
        observer: Option<PersistenceObserver>,
    ) -> Self {
        let entries = match store.load_tab_metadata().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to restore tab metadata, starting empty: {e}");
                if let Some(observer) = &observer {
                    observer(&e);
                }
                TabMetadataMap::new()
            }
        };
        Self::with_entries(store, entries, observer)
    }

    pub fn with_entries(
        store: Arc<dyn MetadataStore>,
        entries: TabMetadataMap,
        observer: Option<PersistenceObserver>,
    ) -> Self {
        let (writer, jobs) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(store, jobs, observer));
        Self {
            entries: Mutex::new(entries),
            writer,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TabMetadataMap> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, entries: &TabMetadataMap) {
        if self.writer.send(PersistJob::Save(entries.clone())).is_err() {
            tracing::debug!("Tab metadata writer stopped, change kept in memory only");
        }
    }

    /// Returns true when the tab had no entry yet. A second call for the same
    /// tab keeps the original `created_at` and only fills a missing opener.
    pub fn record_created(&self, tab_id: TabId, opener_tab_id: Option<TabId>) -> bool {
        let mut entries = self.lock();
        let created = match entries.get_mut(&tab_id) {
            Some(entry) => {
                if entry.opener_tab_id.is_some() || opener_tab_id.is_none() {
                    return false;
                }
                entry.opener_tab_id = opener_tab_id;
                false
            }
            None => {
                entries.insert(
                    tab_id,
                    TabMetadataEntry {
                        created_at: now_millis(),
                        opener_tab_id,
                    },
                );
                true
            }
        };
        self.persist(&entries);
        created
    }

    pub fn record_removed(&self, tab_id: TabId) -> bool {
        let mut entries = self.lock();
        if entries.remove(&tab_id).is_none() {
            return false;
        }
        self.persist(&entries);
        true
    }

    /// Backfills `created_at` for open HTTP(S) tabs the cache has never seen and
    /// drops entries for tabs that are no longer open. Openers are never
    /// backfilled. Returns the number of backfilled tabs.
    pub fn initialize(&self, open_tabs: &[Tab]) -> usize {
        let open_ids: HashSet<TabId> = open_tabs.iter().map(|tab| tab.id).collect();
        let now = now_millis();

        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|id, _| open_ids.contains(id));
        let pruned = before - entries.len();

        let mut backfilled = 0;
        for tab in open_tabs.iter().filter(|tab| tab.has_http_url()) {
            entries.entry(tab.id).or_insert_with(|| {
                backfilled += 1;
                TabMetadataEntry {
                    created_at: now,
                    opener_tab_id: None,
                }
            });
        }

        if backfilled > 0 || pruned > 0 {
            tracing::debug!("Tab metadata initialized: {backfilled} backfilled, {pruned} pruned");
            self.persist(&entries);
        }
        backfilled
    }

    pub fn get(&self, tab_id: TabId) -> Option<TabMetadataEntry> {
        self.lock().get(&tab_id).copied()
    }

    pub fn snapshot(&self) -> TabMetadataMap {
        self.lock().clone()
    }

    /// Waits until every write queued so far has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.writer.send(PersistJob::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

async fn run_writer(
    store: Arc<dyn MetadataStore>,
    mut jobs: mpsc::UnboundedReceiver<PersistJob>,
    observer: Option<PersistenceObserver>,
) {
    while let Some(job) = jobs.recv().await {
        match job {
            PersistJob::Save(entries) => {
                if let Err(e) = store.save_tab_metadata(&entries).await {
                    tracing::warn!(
                        "Failed to persist tab metadata ({} entries): {e}",
                        entries.len()
                    );
                    if let Some(observer) = &observer {
                        observer(&e);
                    }
                }
            }
            PersistJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::browser::fake::tab;
    use crate::data::SqliteStore;

    struct BrokenStore;

    #[async_trait]
    impl MetadataStore for BrokenStore {
        async fn load_tab_metadata(&self) -> Result<TabMetadataMap, AppError> {
            Ok(TabMetadataMap::new())
        }

        async fn save_tab_metadata(&self, _entries: &TabMetadataMap) -> Result<(), AppError> {
            Err(AppError::General("disk full".to_string()))
        }
    }

    async fn sqlite_cache() -> (Arc<SqliteStore>, TabMetadataCache) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let cache = TabMetadataCache::load(store.clone(), None).await;
        (store, cache)
    }

    #[tokio::test]
    async fn record_created_is_idempotent() {
        let (_store, cache) = sqlite_cache().await;
        assert!(cache.record_created(7, None));
        let first = cache.get(7).unwrap().created_at;

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!cache.record_created(7, None));
        assert_eq!(cache.get(7).unwrap().created_at, first);
    }

    #[tokio::test]
    async fn opener_is_set_once() {
        let (_store, cache) = sqlite_cache().await;
        cache.record_created(2, Some(1));
        cache.record_created(2, Some(9));
        assert_eq!(cache.get(2).unwrap().opener_tab_id, Some(1));
    }

    #[tokio::test]
    async fn record_removed_drops_entry() {
        let (_store, cache) = sqlite_cache().await;
        cache.record_created(3, Some(1));
        assert!(cache.record_removed(3));
        assert!(cache.get(3).is_none());
        assert!(!cache.record_removed(3));
    }

    #[tokio::test]
    async fn mutations_are_written_behind() {
        let (store, cache) = sqlite_cache().await;
        cache.record_created(1, None);
        cache.record_created(2, Some(1));
        cache.record_removed(1);
        cache.flush().await;

        let stored = store.load_tab_metadata().await.unwrap();
        assert_eq!(stored, cache.snapshot());
        assert_eq!(stored.keys().copied().collect::<Vec<_>>(), vec![2]);

        let restored = TabMetadataCache::load(store.clone(), None).await;
        assert_eq!(restored.get(2).unwrap().opener_tab_id, Some(1));
    }

    #[tokio::test]
    async fn initialize_backfills_http_tabs_without_opener() {
        let (_store, cache) = sqlite_cache().await;
        cache.record_created(1, None);
        let kept = cache.get(1).unwrap().created_at;
        cache.record_created(99, None);

        let open = vec![
            tab(1, "A", "https://a.com"),
            tab(2, "B", "https://b.com"),
            tab(3, "Settings", "chrome://settings"),
        ];
        assert_eq!(cache.initialize(&open), 1);

        assert_eq!(cache.get(1).unwrap().created_at, kept);
        assert_eq!(cache.get(2).unwrap().opener_tab_id, None);
        assert!(cache.get(3).is_none());
        // 99 is no longer open
        assert!(cache.get(99).is_none());
    }

    #[tokio::test]
    async fn snapshot_is_detached() {
        let (_store, cache) = sqlite_cache().await;
        cache.record_created(1, None);
        let snapshot = cache.snapshot();
        cache.record_created(2, None);
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn persistence_failure_notifies_observer_and_keeps_memory() {
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();
        let observer: PersistenceObserver = Arc::new(move |_e: &AppError| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let cache = TabMetadataCache::load(Arc::new(BrokenStore), Some(observer)).await;
        cache.record_created(1, None);
        cache.record_created(2, None);
        cache.flush().await;

        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert_eq!(cache.snapshot().len(), 2);
    }
}
