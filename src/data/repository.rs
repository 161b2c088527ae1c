use std::collections::BTreeMap;

use rusqlite::{params, Connection};

use crate::error::AppError;
use crate::models::settings::{Settings, SortingMode, UserGroup};
use crate::models::tab::{TabId, TabMetadataEntry, TabMetadataMap};

pub const SYNC_SCOPE: &str = "sync";
pub const LOCAL_SCOPE: &str = "local";

pub const KEY_API_KEY: &str = "apiKey";
pub const KEY_USER_PROMPT: &str = "userPrompt";
pub const KEY_USER_GROUPS: &str = "userGroups";
pub const KEY_SORTING_MODE: &str = "sortingMode";
pub const KEY_YOLO_MODE: &str = "yoloMode";
pub const KEY_YOLO_USER_PROMPT: &str = "yoloUserPrompt";

pub const KEY_TAB_CREATION_TIMES: &str = "tabCreationTimes";
pub const KEY_TAB_OPENER_INFO: &str = "tabOpenerInfo";

pub fn get_value(conn: &Connection, scope: &str, key: &str) -> Result<Option<String>, AppError> {
    let mut stmt = conn.prepare("SELECT value FROM kv_store WHERE scope = ?1 AND key = ?2")?;
    let value = stmt
        .query_row(params![scope, key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

pub fn set_value(conn: &Connection, scope: &str, key: &str, value: &str) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO kv_store (scope, key, value, updated_at) VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
         ON CONFLICT(scope, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![scope, key, value],
    )?;
    Ok(())
}

/// Writes the value only when the key has never been stored.
pub fn insert_if_missing(
    conn: &Connection,
    scope: &str,
    key: &str,
    value: &str,
) -> Result<bool, AppError> {
    let count = conn.execute(
        "INSERT OR IGNORE INTO kv_store (scope, key, value) VALUES (?1, ?2, ?3)",
        params![scope, key, value],
    )?;
    Ok(count > 0)
}

fn get_json<T: serde::de::DeserializeOwned>(
    conn: &Connection,
    scope: &str,
    key: &str,
) -> Result<Option<T>, AppError> {
    let Some(raw) = get_value(conn, scope, key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!("Ignoring unreadable stored value {scope}.{key}: {e}");
            Ok(None)
        }
    }
}

fn settings_entries(settings: &Settings) -> Result<Vec<(&'static str, String)>, AppError> {
    Ok(vec![
        (KEY_API_KEY, serde_json::to_string(&settings.api_key)?),
        (KEY_USER_PROMPT, serde_json::to_string(&settings.user_prompt)?),
        (KEY_USER_GROUPS, serde_json::to_string(&settings.user_groups)?),
        (KEY_SORTING_MODE, serde_json::to_string(&settings.sorting_mode)?),
        (KEY_YOLO_MODE, serde_json::to_string(&settings.yolo_mode)?),
        (
            KEY_YOLO_USER_PROMPT,
            serde_json::to_string(&settings.yolo_user_prompt)?,
        ),
    ])
}

pub fn load_settings(conn: &Connection) -> Result<Settings, AppError> {
    let defaults = Settings::default();
    Ok(Settings {
        api_key: get_json::<String>(conn, SYNC_SCOPE, KEY_API_KEY)?.unwrap_or(defaults.api_key),
        user_prompt: get_json::<String>(conn, SYNC_SCOPE, KEY_USER_PROMPT)?
            .unwrap_or(defaults.user_prompt),
        user_groups: get_json::<Vec<UserGroup>>(conn, SYNC_SCOPE, KEY_USER_GROUPS)?
            .unwrap_or_default(),
        sorting_mode: get_json::<SortingMode>(conn, SYNC_SCOPE, KEY_SORTING_MODE)?
            .unwrap_or_default(),
        yolo_mode: get_json::<bool>(conn, SYNC_SCOPE, KEY_YOLO_MODE)?.unwrap_or(false),
        yolo_user_prompt: get_json::<Option<String>>(conn, SYNC_SCOPE, KEY_YOLO_USER_PROMPT)?
            .flatten(),
    })
}

pub fn save_settings(conn: &mut Connection, settings: &Settings) -> Result<(), AppError> {
    let entries = settings_entries(settings)?;
    let tx = conn.transaction()?;
    for (key, value) in &entries {
        set_value(&tx, SYNC_SCOPE, key, value)?;
    }
    tx.commit()?;
    Ok(())
}

/// Stores `defaults` for every settings key that is absent. Returns the keys written.
pub fn initialize_settings(
    conn: &mut Connection,
    defaults: &Settings,
) -> Result<Vec<&'static str>, AppError> {
    let entries = settings_entries(defaults)?;
    let tx = conn.transaction()?;
    let mut written = Vec::new();
    for (key, value) in &entries {
        if insert_if_missing(&tx, SYNC_SCOPE, key, value)? {
            written.push(*key);
        }
    }
    tx.commit()?;
    Ok(written)
}

pub fn load_tab_metadata(conn: &Connection) -> Result<TabMetadataMap, AppError> {
    let created: BTreeMap<String, i64> =
        get_json(conn, LOCAL_SCOPE, KEY_TAB_CREATION_TIMES)?.unwrap_or_default();
    let openers: BTreeMap<String, TabId> =
        get_json(conn, LOCAL_SCOPE, KEY_TAB_OPENER_INFO)?.unwrap_or_default();

    let mut entries = TabMetadataMap::new();
    for (raw_id, created_at) in created {
        let Ok(tab_id) = raw_id.parse::<TabId>() else {
            tracing::warn!("Skipping stored creation time with invalid tab id {raw_id:?}");
            continue;
        };
        entries.insert(
            tab_id,
            TabMetadataEntry {
                created_at,
                opener_tab_id: openers.get(&raw_id).copied(),
            },
        );
    }
    Ok(entries)
}

pub fn save_tab_metadata(conn: &mut Connection, entries: &TabMetadataMap) -> Result<(), AppError> {
    let created: BTreeMap<String, i64> = entries
        .iter()
        .map(|(id, entry)| (id.to_string(), entry.created_at))
        .collect();
    let openers: BTreeMap<String, TabId> = entries
        .iter()
        .filter_map(|(id, entry)| entry.opener_tab_id.map(|opener| (id.to_string(), opener)))
        .collect();

    let tx = conn.transaction()?;
    set_value(
        &tx,
        LOCAL_SCOPE,
        KEY_TAB_CREATION_TIMES,
        &serde_json::to_string(&created)?,
    )?;
    set_value(
        &tx,
        LOCAL_SCOPE,
        KEY_TAB_OPENER_INFO,
        &serde_json::to_string(&openers)?,
    )?;
    tx.commit()?;
    Ok(())
}

// Needed for rusqlite optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
