use std::path::PathBuf;

use directories::ProjectDirs;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

const ENV_API_URL: &str = "TAB_SORTER_API_URL";
const ENV_MODEL: &str = "TAB_SORTER_MODEL";
const ENV_TEMPERATURE: &str = "TAB_SORTER_TEMPERATURE";

const STORE_FILE_NAME: &str = "tab_sorter.db";

/// Where and how the classification service is reached.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl ClassifierConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
            config.model = model.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TEMPERATURE) {
            match raw.trim().parse::<f32>() {
                Ok(value) if (0.0..=2.0).contains(&value) => config.temperature = value,
                _ => tracing::warn!("Ignoring invalid {ENV_TEMPERATURE}={raw:?}"),
            }
        }
        config
    }

    pub fn with_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

/// `<platform data dir>/tab_sorter.db`, or `None` when no home directory resolves.
pub fn default_store_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "tab-sorter", "tab-sorter")
        .map(|dirs| dirs.data_dir().join(STORE_FILE_NAME))
}
