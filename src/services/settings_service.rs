use crate::data::SettingsStore;
use crate::error::AppError;
use crate::models::settings::{Settings, SortingMode, UserGroup};

pub async fn initialize_defaults(store: &dyn SettingsStore) -> Result<(), AppError> {
    store.initialize_defaults(&Settings::default()).await
}

async fn update(
    store: &dyn SettingsStore,
    mut apply: impl FnMut(&mut Settings) -> Result<(), AppError> + Send,
) -> Result<Settings, AppError> {
    store.update_settings(&mut apply).await
}

pub async fn save_api_key(store: &dyn SettingsStore, key: &str) -> Result<(), AppError> {
    update(store, |settings| {
        settings.api_key = key.trim().to_string();
        Ok(())
    })
    .await?;
    tracing::info!("API key saved");
    Ok(())
}

pub async fn save_user_prompt(store: &dyn SettingsStore, prompt: &str) -> Result<(), AppError> {
    update(store, |settings| {
        settings.user_prompt = prompt.trim().to_string();
        Ok(())
    })
    .await?;
    Ok(())
}

/// An empty prompt clears the override so the bulk prompt is used instead.
pub async fn save_yolo_prompt(store: &dyn SettingsStore, prompt: &str) -> Result<(), AppError> {
    let prompt = prompt.trim();
    update(store, |settings| {
        settings.yolo_user_prompt = (!prompt.is_empty()).then(|| prompt.to_string());
        Ok(())
    })
    .await?;
    Ok(())
}

pub async fn save_sorting_mode(
    store: &dyn SettingsStore,
    mode: SortingMode,
) -> Result<(), AppError> {
    update(store, |settings| {
        settings.sorting_mode = mode;
        Ok(())
    })
    .await?;
    tracing::info!("Sorting mode saved: {mode}");
    Ok(())
}

pub async fn set_yolo_mode(store: &dyn SettingsStore, enabled: bool) -> Result<(), AppError> {
    update(store, |settings| {
        settings.yolo_mode = enabled;
        Ok(())
    })
    .await?;
    tracing::info!("Incremental grouping {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

pub async fn add_user_group(
    store: &dyn SettingsStore,
    name: &str,
    description: &str,
) -> Result<UserGroup, AppError> {
    let name = name.trim();
    let description = description.trim();
    if name.is_empty() || description.is_empty() {
        return Err(AppError::General(
            "Please enter both a name and a description for the group.".to_string(),
        ));
    }

    let group = UserGroup {
        id: format!("group_{}", uuid::Uuid::new_v4().simple()),
        name: name.to_string(),
        description: description.to_string(),
    };
    update(store, |settings| {
        settings.user_groups.push(group.clone());
        Ok(())
    })
    .await?;
    tracing::info!("User group added: {:?}", group.name);
    Ok(group)
}

/// Returns whether a group with `id` existed.
pub async fn delete_user_group(store: &dyn SettingsStore, id: &str) -> Result<bool, AppError> {
    let mut removed = false;
    update(store, |settings| {
        let before = settings.user_groups.len();
        settings.user_groups.retain(|group| group.id != id);
        removed = settings.user_groups.len() != before;
        Ok(())
    })
    .await?;
    Ok(removed)
}
