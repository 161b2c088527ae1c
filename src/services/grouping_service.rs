use serde::Serialize;

use crate::browser::TabsApi;
use crate::error::AppError;
use crate::models::grouping::Grouping;
use crate::models::tab::{GroupId, TabGroupInfo, TabId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedGroup {
    pub name: String,
    pub group_id: GroupId,
    pub tab_ids: Vec<TabId>,
    pub reused_existing: bool,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub groups: Vec<AppliedGroup>,
    pub failed_tabs: Vec<TabId>,
}

impl ReconcileReport {
    pub fn applied_tab_ids(&self) -> impl Iterator<Item = TabId> + '_ {
        self.groups.iter().flat_map(|group| group.tab_ids.iter().copied())
    }

    pub fn applied_tab_count(&self) -> usize {
        self.groups.iter().map(|group| group.tab_ids.len()).sum()
    }

    pub fn group_id(&self, name: &str) -> Option<GroupId> {
        self.groups
            .iter()
            .find(|group| group.name == name)
            .map(|group| group.group_id)
    }
}

/// Existing group whose title equals `name`, ignoring case.
pub fn find_group_by_title<'a>(groups: &'a [TabGroupInfo], name: &str) -> Option<&'a TabGroupInfo> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    groups
        .iter()
        .find(|group| group.title.trim().to_lowercase() == wanted)
}

async fn group_and_title(
    api: &dyn TabsApi,
    tab_ids: &[TabId],
    target: Option<GroupId>,
    name: &str,
    retitle: bool,
) -> Result<GroupId, AppError> {
    let group_id = api.group_tabs(tab_ids, target).await?;
    if retitle {
        api.update_group_title(group_id, name).await?;
    }
    Ok(group_id)
}

/// Applies `grouping` to the live browser.
///
/// Each group is first applied as one batch: tabs go into the existing group
/// whose title matches case-insensitively (which is then retitled to `name`),
/// or into a new group. When the batch fails, tabs are applied one at a time
/// under the same name; tabs that still fail are reported in `failed_tabs`.
/// Existing groups are read once, so two runs racing each other may each
/// create a group with the same title.
pub async fn apply_grouping(api: &dyn TabsApi, grouping: &Grouping) -> ReconcileReport {
    let existing = api.query_groups().await.unwrap_or_else(|e| {
        tracing::warn!("Could not list existing tab groups, creating new ones: {e}");
        Vec::new()
    });
    apply_grouping_with(api, grouping, &existing).await
}

/// Like [`apply_grouping`], matching names only against `existing`.
/// Passing an empty slice always creates new groups.
///
/// Names that differ only in case share one group: the first of them decides
/// the title and later ones join it untouched.
pub async fn apply_grouping_with(
    api: &dyn TabsApi,
    grouping: &Grouping,
    existing: &[TabGroupInfo],
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let mut placed: Vec<TabGroupInfo> = Vec::new();

    for assignment in grouping.groups() {
        let name = assignment.name.as_str();
        let tab_ids = &assignment.tab_ids;
        if tab_ids.is_empty() {
            continue;
        }

        let (reuse, retitle) = match find_group_by_title(&placed, name) {
            Some(group) => (Some(group.id), false),
            None => (find_group_by_title(existing, name).map(|group| group.id), true),
        };
        let applied = match group_and_title(api, tab_ids, reuse, name, retitle).await {
            Ok(group_id) => {
                tracing::debug!("Group {name:?} ({group_id}) now holds tabs {tab_ids:?}");
                report.groups.push(AppliedGroup {
                    name: name.to_string(),
                    group_id,
                    tab_ids: tab_ids.clone(),
                    reused_existing: reuse.is_some(),
                    used_fallback: false,
                });
                Some(group_id)
            }
            Err(e) => {
                tracing::warn!(
                    "Error creating or updating group {name:?} for tabs {tab_ids:?}: {e}; grouping tabs individually"
                );
                apply_individually(api, name, tab_ids, reuse, retitle, &mut report).await
            }
        };

        if let Some(group_id) = applied {
            if find_group_by_title(&placed, name).is_none() {
                placed.push(TabGroupInfo {
                    id: group_id,
                    title: name.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "Applied {} groups covering {} tabs ({} failed)",
        report.groups.len(),
        report.applied_tab_count(),
        report.failed_tabs.len()
    );
    report
}

/// Groups one tab into `target`. When `target` is the reused group and
/// joining it fails, the tab starts a new group instead.
async fn group_single(
    api: &dyn TabsApi,
    tab_id: TabId,
    target: Option<GroupId>,
    reuse: Option<GroupId>,
) -> Result<GroupId, AppError> {
    match api.group_tabs(&[tab_id], target).await {
        Ok(group_id) => Ok(group_id),
        Err(e) if target.is_some() && target == reuse => {
            tracing::warn!(
                "Could not add tab {tab_id} to group {target:?}: {e}; starting a new group"
            );
            api.group_tabs(&[tab_id], None).await
        }
        Err(e) => Err(e),
    }
}

async fn apply_individually(
    api: &dyn TabsApi,
    name: &str,
    tab_ids: &[TabId],
    reuse: Option<GroupId>,
    retitle: bool,
    report: &mut ReconcileReport,
) -> Option<GroupId> {
    let mut target = reuse;
    let mut titled = false;
    let mut applied = Vec::new();

    for &tab_id in tab_ids {
        let group_id = match group_single(api, tab_id, target, reuse).await {
            Ok(group_id) => group_id,
            Err(e) => {
                tracing::warn!("Error individually grouping tab {tab_id} into {name:?}: {e}");
                report.failed_tabs.push(tab_id);
                continue;
            }
        };
        let keep_title = !retitle && Some(group_id) == reuse;
        if !titled && !keep_title {
            match api.update_group_title(group_id, name).await {
                Ok(()) => titled = true,
                Err(e) => tracing::warn!("Could not title group {group_id} as {name:?}: {e}"),
            }
        }
        target = Some(group_id);
        applied.push(tab_id);
    }

    let group_id = target.filter(|_| !applied.is_empty())?;
    report.groups.push(AppliedGroup {
        name: name.to_string(),
        group_id,
        tab_ids: applied,
        reused_existing: Some(group_id) == reuse,
        used_fallback: true,
    });
    Some(group_id)
}
