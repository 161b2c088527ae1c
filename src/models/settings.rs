use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_PROMPT: &str =
    "Organize these browser tabs into logical groups based on their content and purpose.";

pub const DEFAULT_YOLO_PROMPT: &str =
    "Decide which tab group a newly opened browser tab belongs to.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortingMode {
    #[default]
    Respect,
    Autonomous,
}

impl std::fmt::Display for SortingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Respect => write!(f, "respect"),
            Self::Autonomous => write!(f, "autonomous"),
        }
    }
}

impl std::str::FromStr for SortingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "respect" => Ok(Self::Respect),
            "autonomous" => Ok(Self::Autonomous),
            _ => Err(format!("unknown sorting mode: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub user_prompt: String,
    #[serde(default)]
    pub user_groups: Vec<UserGroup>,
    #[serde(default)]
    pub sorting_mode: SortingMode,
    #[serde(default)]
    pub yolo_mode: bool,
    #[serde(default)]
    pub yolo_user_prompt: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            user_prompt: DEFAULT_USER_PROMPT.to_string(),
            user_groups: Vec::new(),
            sorting_mode: SortingMode::Respect,
            yolo_mode: false,
            yolo_user_prompt: None,
        }
    }
}

impl Settings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn bulk_prompt(&self) -> &str {
        let prompt = self.user_prompt.trim();
        if prompt.is_empty() {
            DEFAULT_USER_PROMPT
        } else {
            prompt
        }
    }

    /// The incremental instruction, or the bulk one when none was configured.
    pub fn incremental_prompt(&self) -> &str {
        match self.yolo_user_prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => prompt,
            _ if !self.user_prompt.trim().is_empty() => self.user_prompt.trim(),
            _ => DEFAULT_YOLO_PROMPT,
        }
    }
}
