use crate::commands::CommandResponse;
use crate::error::AppError;
use crate::models::settings::SortingMode;
use crate::services::settings_service;
use crate::state::AppState;

pub async fn get_settings(state: &AppState) -> Result<CommandResponse, AppError> {
    let settings = state.settings.load_settings().await?;
    Ok(CommandResponse::with_data(
        "Settings loaded.",
        serde_json::to_value(&settings)?,
    ))
}

pub async fn save_api_key(state: &AppState, api_key: &str) -> Result<CommandResponse, AppError> {
    settings_service::save_api_key(state.settings.as_ref(), api_key).await?;
    Ok(CommandResponse::ok("API key saved."))
}

pub async fn save_user_prompt(state: &AppState, prompt: &str) -> Result<CommandResponse, AppError> {
    settings_service::save_user_prompt(state.settings.as_ref(), prompt).await?;
    Ok(CommandResponse::ok("Prompt saved."))
}

pub async fn save_yolo_prompt(state: &AppState, prompt: &str) -> Result<CommandResponse, AppError> {
    settings_service::save_yolo_prompt(state.settings.as_ref(), prompt).await?;
    Ok(CommandResponse::ok("YOLO prompt saved."))
}

pub async fn add_user_group(
    state: &AppState,
    name: &str,
    description: &str,
) -> Result<CommandResponse, AppError> {
    let group = settings_service::add_user_group(state.settings.as_ref(), name, description).await?;
    Ok(CommandResponse::with_data(
        format!("Group \"{}\" added.", group.name),
        serde_json::to_value(&group)?,
    ))
}

pub async fn delete_user_group(state: &AppState, id: &str) -> Result<CommandResponse, AppError> {
    if !settings_service::delete_user_group(state.settings.as_ref(), id).await? {
        tracing::debug!("No user group with id {id} to delete");
    }
    Ok(CommandResponse::ok("Group deleted."))
}

pub async fn save_sorting_mode(
    state: &AppState,
    mode: SortingMode,
) -> Result<CommandResponse, AppError> {
    settings_service::save_sorting_mode(state.settings.as_ref(), mode).await?;
    Ok(CommandResponse::ok(format!("Sorting mode set to {mode}.")))
}

pub async fn set_yolo_mode(state: &AppState, enabled: bool) -> Result<CommandResponse, AppError> {
    settings_service::set_yolo_mode(state.settings.as_ref(), enabled).await?;
    Ok(CommandResponse::ok(if enabled {
        "YOLO mode enabled."
    } else {
        "YOLO mode disabled."
    }))
}
