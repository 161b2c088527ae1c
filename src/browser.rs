//! The browser's tab and tab-group surface, as seen by the grouping core.

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::tab::{GroupId, Tab, TabGroupInfo, TabId, TabQuery};

#[async_trait]
pub trait TabsApi: Send + Sync {
    async fn query_tabs(&self, query: TabQuery) -> Result<Vec<Tab>, AppError>;

    async fn get_tab(&self, tab_id: TabId) -> Result<Option<Tab>, AppError>;

    async fn query_groups(&self) -> Result<Vec<TabGroupInfo>, AppError>;

    /// Moves `tab_ids` into `group_id`, or into a fresh group when `None`.
    /// Returns the id of the group the tabs ended up in.
    async fn group_tabs(
        &self,
        tab_ids: &[TabId],
        group_id: Option<GroupId>,
    ) -> Result<GroupId, AppError>;

    async fn update_group_title(&self, group_id: GroupId, title: &str) -> Result<(), AppError>;

    async fn ungroup_tabs(&self, tab_ids: &[TabId]) -> Result<(), AppError>;
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;
    use crate::models::tab::TAB_GROUP_ID_NONE;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Group(Vec<TabId>, Option<GroupId>),
        Title(GroupId, String),
        Ungroup(Vec<TabId>),
    }

    #[derive(Default)]
    struct Inner {
        tabs: Vec<Tab>,
        groups: Vec<TabGroupInfo>,
        next_group_id: GroupId,
        calls: Vec<Call>,
        fail_batches: bool,
        failing_tabs: HashSet<TabId>,
        fail_join_existing: bool,
        seeded_groups: HashSet<GroupId>,
    }

    impl Inner {
        /// Browsers delete a group once its last tab leaves it.
        fn drop_empty_groups(&mut self, touched: &HashSet<GroupId>) {
            let tabs = &self.tabs;
            self.groups
                .retain(|g| !touched.contains(&g.id) || tabs.iter().any(|t| t.group_id == g.id));
        }

        fn previous_groups(&self, tab_ids: &[TabId]) -> HashSet<GroupId> {
            self.tabs
                .iter()
                .filter(|t| tab_ids.contains(&t.id) && t.group_id != TAB_GROUP_ID_NONE)
                .map(|t| t.group_id)
                .collect()
        }
    }

    /// In-memory browser that records every mutation.
    #[derive(Default)]
    pub struct FakeBrowser {
        inner: Mutex<Inner>,
    }

    pub fn tab(id: TabId, title: &str, url: &str) -> Tab {
        Tab {
            id,
            title: title.to_string(),
            url: Some(url.to_string()),
            pending_url: None,
            pinned: false,
            group_id: TAB_GROUP_ID_NONE,
        }
    }

    impl FakeBrowser {
        pub fn with_tabs(tabs: Vec<Tab>) -> Self {
            let browser = Self::default();
            browser.lock().tabs = tabs;
            browser.lock().next_group_id = 100;
            browser
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
            self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        pub fn add_tab(&self, tab: Tab) {
            self.lock().tabs.push(tab);
        }

        pub fn add_group(&self, id: GroupId, title: &str, members: &[TabId]) {
            let mut inner = self.lock();
            inner.seeded_groups.insert(id);
            inner.groups.push(TabGroupInfo {
                id,
                title: title.to_string(),
            });
            for tab in inner.tabs.iter_mut().filter(|t| members.contains(&t.id)) {
                tab.group_id = id;
            }
        }

        /// Every multi-tab group call fails.
        pub fn fail_batches(&self) {
            self.lock().fail_batches = true;
        }

        pub fn fail_tab(&self, tab_id: TabId) {
            self.lock().failing_tabs.insert(tab_id);
        }

        /// Joining a group registered through [`FakeBrowser::add_group`] fails.
        pub fn fail_join_existing(&self) {
            self.lock().fail_join_existing = true;
        }

        pub fn calls(&self) -> Vec<Call> {
            self.lock().calls.clone()
        }

        pub fn groups(&self) -> Vec<TabGroupInfo> {
            self.lock().groups.clone()
        }

        pub fn group_of(&self, tab_id: TabId) -> Option<GroupId> {
            self.lock()
                .tabs
                .iter()
                .find(|t| t.id == tab_id)
                .map(|t| t.group_id)
                .filter(|id| *id != TAB_GROUP_ID_NONE)
        }

        pub fn group_title(&self, group_id: GroupId) -> Option<String> {
            self.lock()
                .groups
                .iter()
                .find(|g| g.id == group_id)
                .map(|g| g.title.clone())
        }
    }

    #[async_trait]
    impl TabsApi for FakeBrowser {
        async fn query_tabs(&self, query: TabQuery) -> Result<Vec<Tab>, AppError> {
            Ok(self
                .lock()
                .tabs
                .iter()
                .filter(|t| query.matches(t))
                .cloned()
                .collect())
        }

        async fn get_tab(&self, tab_id: TabId) -> Result<Option<Tab>, AppError> {
            Ok(self.lock().tabs.iter().find(|t| t.id == tab_id).cloned())
        }

        async fn query_groups(&self) -> Result<Vec<TabGroupInfo>, AppError> {
            Ok(self.lock().groups.clone())
        }

        async fn group_tabs(
            &self,
            tab_ids: &[TabId],
            group_id: Option<GroupId>,
        ) -> Result<GroupId, AppError> {
            let mut inner = self.lock();
            inner.calls.push(Call::Group(tab_ids.to_vec(), group_id));

            if inner.fail_batches && tab_ids.len() > 1 {
                return Err(AppError::Browser("batch grouping failed".to_string()));
            }
            if let Some(id) = group_id {
                if !inner.groups.iter().any(|g| g.id == id) {
                    return Err(AppError::Browser(format!("No group with id: {id}")));
                }
                if inner.fail_join_existing && inner.seeded_groups.contains(&id) {
                    return Err(AppError::Browser(format!("Cannot join group {id}")));
                }
            }
            if let Some(bad) = tab_ids.iter().find(|id| inner.failing_tabs.contains(id)) {
                return Err(AppError::Browser(format!("No tab with id: {bad}")));
            }
            if let Some(missing) = tab_ids
                .iter()
                .find(|id| !inner.tabs.iter().any(|t| t.id == **id))
            {
                return Err(AppError::Browser(format!("No tab with id: {missing}")));
            }

            let target = match group_id {
                Some(id) => id,
                None => {
                    let id = inner.next_group_id;
                    inner.next_group_id += 1;
                    inner.groups.push(TabGroupInfo {
                        id,
                        title: String::new(),
                    });
                    id
                }
            };
            let previous = inner.previous_groups(tab_ids);
            for tab in inner.tabs.iter_mut().filter(|t| tab_ids.contains(&t.id)) {
                tab.group_id = target;
            }
            inner.drop_empty_groups(&previous);
            Ok(target)
        }

        async fn update_group_title(&self, group_id: GroupId, title: &str) -> Result<(), AppError> {
            let mut inner = self.lock();
            inner.calls.push(Call::Title(group_id, title.to_string()));
            match inner.groups.iter_mut().find(|g| g.id == group_id) {
                Some(group) => {
                    group.title = title.to_string();
                    Ok(())
                }
                None => Err(AppError::Browser(format!("No group with id: {group_id}"))),
            }
        }

        async fn ungroup_tabs(&self, tab_ids: &[TabId]) -> Result<(), AppError> {
            let mut inner = self.lock();
            inner.calls.push(Call::Ungroup(tab_ids.to_vec()));
            let previous = inner.previous_groups(tab_ids);
            for tab in inner.tabs.iter_mut().filter(|t| tab_ids.contains(&t.id)) {
                tab.group_id = TAB_GROUP_ID_NONE;
            }
            inner.drop_empty_groups(&previous);
            Ok(())
        }
    }
}
