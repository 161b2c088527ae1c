pub mod settings_commands;
pub mod sort_commands;
pub mod tab_events;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::settings::SortingMode;
use crate::state::AppState;

/// Messages accepted from the popup and options pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    SortTabs,
    GroupTabsByDomain,
    UngroupAll,
    SaveApiKey { api_key: String },
    SaveUserPrompt { prompt: String },
    SaveYoloPrompt { prompt: String },
    AddUserGroup { name: String, description: String },
    DeleteUserGroup { id: String },
    SaveSortingMode { mode: SortingMode },
    SetYoloMode { enabled: bool },
    GetSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(error: &AppError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            data: None,
        }
    }
}

/// Runs one command. Failures are logged and reported in the response, never raised.
pub async fn dispatch(state: &AppState, command: Command) -> CommandResponse {
    let result = match command {
        Command::SortTabs => sort_commands::sort_tabs(state).await,
        Command::GroupTabsByDomain => sort_commands::group_tabs_by_domain(state).await,
        Command::UngroupAll => sort_commands::ungroup_all(state).await,
        Command::SaveApiKey { api_key } => settings_commands::save_api_key(state, &api_key).await,
        Command::SaveUserPrompt { prompt } => {
            settings_commands::save_user_prompt(state, &prompt).await
        }
        Command::SaveYoloPrompt { prompt } => {
            settings_commands::save_yolo_prompt(state, &prompt).await
        }
        Command::AddUserGroup { name, description } => {
            settings_commands::add_user_group(state, &name, &description).await
        }
        Command::DeleteUserGroup { id } => settings_commands::delete_user_group(state, &id).await,
        Command::SaveSortingMode { mode } => {
            settings_commands::save_sorting_mode(state, mode).await
        }
        Command::SetYoloMode { enabled } => settings_commands::set_yolo_mode(state, enabled).await,
        Command::GetSettings => settings_commands::get_settings(state).await,
    };

    match result {
        Ok(response) => response,
        Err(e) => CommandResponse::failure(&e.capture()),
    }
}

/// Decodes a raw JSON message and dispatches it.
pub async fn dispatch_json(state: &AppState, message: &str) -> CommandResponse {
    match serde_json::from_str::<Command>(message) {
        Ok(command) => dispatch(state, command).await,
        Err(e) => {
            tracing::warn!("Unrecognized command message: {e}");
            CommandResponse::failure(&AppError::General(format!("Unrecognized command: {e}")))
        }
    }
}
