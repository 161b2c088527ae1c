use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type TabId = i64;
pub type GroupId = i64;

/// Group id the browser reports for a tab that belongs to no group.
pub const TAB_GROUP_ID_NONE: GroupId = -1;

const EXTENSION_URL_PREFIX: &str = "chrome-extension://";

fn ungrouped() -> GroupId {
    TAB_GROUP_ID_NONE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pending_url: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default = "ungrouped")]
    pub group_id: GroupId,
}

impl Tab {
    /// The committed URL, or the pending one while the tab is still loading.
    pub fn effective_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or_else(|| self.pending_url.as_deref().filter(|url| !url.is_empty()))
    }

    pub fn is_grouped(&self) -> bool {
        self.group_id != TAB_GROUP_ID_NONE
    }

    pub fn has_http_url(&self) -> bool {
        self.effective_url().is_some_and(is_http_url)
    }

    /// Unpinned HTTP(S) tab that is not one of the extension's own pages.
    pub fn is_sortable(&self) -> bool {
        !self.pinned
            && self
                .effective_url()
                .is_some_and(|url| is_http_url(url) && !url.starts_with(EXTENSION_URL_PREFIX))
    }
}

pub fn is_http_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabGroupInfo {
    pub id: GroupId,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabCreatedEvent {
    pub tab_id: TabId,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pending_url: Option<String>,
    #[serde(default)]
    pub opener_tab_id: Option<TabId>,
}

impl TabCreatedEvent {
    pub fn effective_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or_else(|| self.pending_url.as_deref().filter(|url| !url.is_empty()))
    }
}

/// Filter handed to the browser when listing tabs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabQuery {
    pub pinned: Option<bool>,
    pub http_only: bool,
    pub grouped: Option<bool>,
}

impl TabQuery {
    pub fn all() -> Self {
        Self::default()
    }

    /// Unpinned HTTP(S) tabs, the set every sort operates on.
    pub fn sortable() -> Self {
        Self {
            pinned: Some(false),
            http_only: true,
            grouped: None,
        }
    }

    pub fn grouped() -> Self {
        Self {
            pinned: None,
            http_only: false,
            grouped: Some(true),
        }
    }

    pub fn matches(&self, tab: &Tab) -> bool {
        if self.pinned.is_some_and(|pinned| pinned != tab.pinned) {
            return false;
        }
        if self.http_only && !tab.has_http_url() {
            return false;
        }
        if self.grouped.is_some_and(|grouped| grouped != tab.is_grouped()) {
            return false;
        }
        true
    }
}

/// Provenance tracked for a tab from the moment its creation was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabMetadataEntry {
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    #[serde(default)]
    pub opener_tab_id: Option<TabId>,
}

pub type TabMetadataMap = BTreeMap<TabId, TabMetadataEntry>;
