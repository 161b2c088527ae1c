use crate::error::AppError;
use crate::models::tab::{is_http_url, TabCreatedEvent, TabId};
use crate::services::incremental_service::{
    self, IncrementalContext, IncrementalOutcome, SkipReason,
};
use crate::state::AppState;

/// Records the new tab in the metadata cache, then runs incremental grouping
/// when it is enabled. Errors are logged and swallowed.
pub async fn on_tab_created(
    state: &AppState,
    event: &TabCreatedEvent,
) -> Option<IncrementalOutcome> {
    match handle_tab_created(state, event).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::warn!("Incremental grouping for tab {} failed: {e}", event.tab_id);
            None
        }
    }
}

async fn handle_tab_created(
    state: &AppState,
    event: &TabCreatedEvent,
) -> Result<IncrementalOutcome, AppError> {
    let url = match event.effective_url() {
        Some(url) => Some(url.to_string()),
        None => state
            .tabs
            .get_tab(event.tab_id)
            .await?
            .and_then(|tab| tab.effective_url().map(str::to_string)),
    };
    if url.as_deref().is_some_and(is_http_url) {
        state.cache.record_created(event.tab_id, event.opener_tab_id);
    }

    let settings = state.settings.load_settings().await?;
    if !settings.yolo_mode {
        return Ok(IncrementalOutcome::Skipped {
            reason: SkipReason::Disabled,
        });
    }

    let _guard = state.begin_grouping().await;
    let ctx = IncrementalContext {
        api: state.tabs.as_ref(),
        client: &state.classifier,
        cache: &state.cache,
        settings: &settings,
    };
    incremental_service::classify_new_tab(&ctx, event).await
}

pub fn on_tab_removed(state: &AppState, tab_id: TabId) {
    if state.cache.record_removed(tab_id) {
        tracing::debug!("Forgot metadata for closed tab {tab_id}");
    }
}
