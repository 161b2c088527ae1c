use serde::Serialize;

use crate::browser::TabsApi;
use crate::error::AppError;
use crate::models::grouping::Grouping;
use crate::models::settings::Settings;
use crate::models::tab::{is_http_url, GroupId, Tab, TabCreatedEvent, TabGroupInfo, TabId, TabQuery};
use crate::services::classifier_service::ClassificationClient;
use crate::services::domain_service;
use crate::services::grouping_service::{apply_grouping_with, find_group_by_title};
use crate::services::metadata_cache::TabMetadataCache;
use crate::services::prompt_service::{self, IncrementalPromptInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    Disabled,
    NoApiKey,
    TabClosed,
    Pinned,
    NotHttp,
    AlreadyGrouped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum IncrementalOutcome {
    Skipped { reason: SkipReason },
    JoinedExisting { group_id: GroupId, group_name: String },
    CreatedGroup { group_id: GroupId, group_name: String },
}

pub struct IncrementalContext<'a> {
    pub api: &'a dyn TabsApi,
    pub client: &'a ClassificationClient,
    pub cache: &'a TabMetadataCache,
    pub settings: &'a Settings,
}

fn skipped(reason: SkipReason) -> Result<IncrementalOutcome, AppError> {
    tracing::debug!("Incremental grouping skipped: {reason:?}");
    Ok(IncrementalOutcome::Skipped { reason })
}

/// Places one newly created tab into an existing or new group.
pub async fn classify_new_tab(
    ctx: &IncrementalContext<'_>,
    event: &TabCreatedEvent,
) -> Result<IncrementalOutcome, AppError> {
    if !ctx.settings.yolo_mode {
        return skipped(SkipReason::Disabled);
    }
    if !ctx.settings.has_api_key() {
        return skipped(SkipReason::NoApiKey);
    }

    let Some(tab) = ctx.api.get_tab(event.tab_id).await? else {
        return skipped(SkipReason::TabClosed);
    };
    if tab.pinned {
        return skipped(SkipReason::Pinned);
    }
    let url = match event.effective_url().or_else(|| tab.effective_url()) {
        Some(url) if is_http_url(url) => url.to_string(),
        _ => return skipped(SkipReason::NotHttp),
    };
    if tab.is_grouped() {
        return skipped(SkipReason::AlreadyGrouped);
    }

    let (open_tabs, groups) = tokio::join!(
        ctx.api.query_tabs(TabQuery::sortable()),
        ctx.api.query_groups()
    );
    let (open_tabs, groups) = (open_tabs?, groups?);
    let others: Vec<Tab> = open_tabs
        .into_iter()
        .filter(|other| other.id != tab.id && other.is_sortable())
        .collect();

    let group_name = if others.is_empty() {
        let key = domain_service::domain_key(&url).ok_or_else(|| {
            AppError::General(format!("Tab {} has an unparsable URL: {url}", tab.id))
        })?;
        tracing::debug!("Tab {} is the only open tab, grouping by domain {key:?}", tab.id);
        key
    } else {
        suggest_group(ctx, &tab, &url, &others, &groups).await?
    };

    join_or_create(ctx.api, &groups, tab.id, &group_name).await
}

async fn suggest_group(
    ctx: &IncrementalContext<'_>,
    tab: &Tab,
    url: &str,
    others: &[Tab],
    groups: &[TabGroupInfo],
) -> Result<String, AppError> {
    let metadata = ctx.cache.snapshot();
    let other_facts = prompt_service::enrich_tabs(others, &metadata, groups);

    let mut new_tab = prompt_service::enrich_tabs(std::slice::from_ref(tab), &metadata, groups)
        .pop()
        .ok_or_else(|| AppError::General("failed to describe new tab".to_string()))?;
    new_tab.url = url.to_string();

    let chain = prompt_service::opener_chain(&new_tab, &other_facts);
    let titles: Vec<String> = groups
        .iter()
        .map(|group| group.title.trim())
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .collect();

    let payload = prompt_service::build_incremental_prompt(&IncrementalPromptInput {
        instruction: ctx.settings.incremental_prompt(),
        new_tab: &new_tab,
        opener_chain: &chain,
        other_tabs: &other_facts,
        existing_group_titles: &titles,
    });

    let choice = ctx
        .client
        .classify_incremental(&payload, &ctx.settings.api_key)
        .await?;
    tracing::debug!("Suggested group {:?} for tab {}", choice.group_name, tab.id);
    Ok(choice.group_name)
}

/// Adds the tab to the group titled `name` (ignoring case) or creates one.
async fn join_or_create(
    api: &dyn TabsApi,
    groups: &[TabGroupInfo],
    tab_id: TabId,
    name: &str,
) -> Result<IncrementalOutcome, AppError> {
    if let Some(existing) = find_group_by_title(groups, name) {
        match api.group_tabs(&[tab_id], Some(existing.id)).await {
            Ok(group_id) => {
                tracing::info!("Tab {tab_id} joined group {:?} ({group_id})", existing.title);
                return Ok(IncrementalOutcome::JoinedExisting {
                    group_id,
                    group_name: existing.title.clone(),
                });
            }
            Err(e) => {
                tracing::warn!(
                    "Could not add tab {tab_id} to group {:?} ({}): {e}; creating a new group",
                    existing.title,
                    existing.id
                );
            }
        }
    }

    let mut grouping = Grouping::new();
    grouping.assign(name, tab_id);
    let report = apply_grouping_with(api, &grouping, &[]).await;
    match report.group_id(name) {
        Some(group_id) => {
            tracing::info!("Tab {tab_id} placed in new group {name:?} ({group_id})");
            Ok(IncrementalOutcome::CreatedGroup {
                group_id,
                group_name: name.to_string(),
            })
        }
        None => Err(AppError::Browser(format!(
            "could not place tab {tab_id} in group {name:?}"
        ))),
    }
}
