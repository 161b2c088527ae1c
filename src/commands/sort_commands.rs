use crate::commands::CommandResponse;
use crate::error::AppError;
use crate::models::tab::{Tab, TabId, TabQuery};
use crate::services::domain_service;
use crate::services::grouping_service::{self, ReconcileReport};
use crate::services::prompt_service::{self, BulkPromptInput};
use crate::state::AppState;

async fn sortable_tabs(state: &AppState) -> Result<Vec<Tab>, AppError> {
    let tabs = state.tabs.query_tabs(TabQuery::sortable()).await?;
    Ok(tabs.into_iter().filter(Tab::is_sortable).collect())
}

fn report_response(message: String, report: &ReconcileReport) -> Result<CommandResponse, AppError> {
    Ok(CommandResponse::with_data(message, serde_json::to_value(report)?))
}

/// Groups every sortable tab with the classification service.
pub async fn sort_tabs(state: &AppState) -> Result<CommandResponse, AppError> {
    let _guard = state.try_begin_grouping()?;

    let settings = state.settings.load_settings().await?;
    if !settings.has_api_key() {
        return Err(AppError::missing_api_key());
    }

    let tabs = sortable_tabs(state).await?;
    if tabs.is_empty() {
        return Ok(CommandResponse::ok("No tabs to sort."));
    }
    let groups = state.tabs.query_groups().await?;

    let facts = prompt_service::enrich_tabs(&tabs, &state.cache.snapshot(), &groups);
    let payload = prompt_service::build_bulk_prompt(&BulkPromptInput {
        instruction: settings.bulk_prompt(),
        tabs: &facts,
        sorting_mode: settings.sorting_mode,
        user_groups: &settings.user_groups,
    });
    let tab_ids: Vec<TabId> = tabs.iter().map(|tab| tab.id).collect();

    tracing::info!("Sorting {} tabs ({} mode)", tabs.len(), settings.sorting_mode);
    let grouping = state
        .classifier
        .classify_bulk(&payload, &settings.api_key, &tab_ids)
        .await?;

    let report =
        grouping_service::apply_grouping_with(state.tabs.as_ref(), &grouping, &groups).await;
    report_response(
        format!(
            "Sorted {} tabs into {} groups.",
            report.applied_tab_count(),
            report.groups.len()
        ),
        &report,
    )
}

pub async fn group_tabs_by_domain(state: &AppState) -> Result<CommandResponse, AppError> {
    let _guard = state.try_begin_grouping()?;

    let tabs = sortable_tabs(state).await?;
    if tabs.is_empty() {
        return Ok(CommandResponse::ok("No tabs to sort."));
    }

    let grouping = domain_service::group_by_domain(&tabs);
    let report = grouping_service::apply_grouping(state.tabs.as_ref(), &grouping).await;
    report_response(
        format!(
            "Grouped {} tabs into {} domain groups.",
            report.applied_tab_count(),
            report.groups.len()
        ),
        &report,
    )
}

pub async fn ungroup_all(state: &AppState) -> Result<CommandResponse, AppError> {
    let _guard = state.try_begin_grouping()?;

    let tab_ids: Vec<TabId> = state
        .tabs
        .query_tabs(TabQuery::grouped())
        .await?
        .iter()
        .map(|tab| tab.id)
        .collect();
    if tab_ids.is_empty() {
        return Ok(CommandResponse::ok("No grouped tabs."));
    }

    state.tabs.ungroup_tabs(&tab_ids).await?;
    tracing::info!("Ungrouped tabs {tab_ids:?}");
    Ok(CommandResponse::ok(format!("Ungrouped {} tabs.", tab_ids.len())))
}
