use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::models::settings::{SortingMode, UserGroup};
use crate::models::tab::{GroupId, Tab, TabGroupInfo, TabId, TabMetadataMap};

pub const MISCELLANEOUS_GROUP: &str = "Miscellaneous";

/// Longest opener chain described for a new tab.
pub const MAX_OPENER_DEPTH: usize = 5;

const SYSTEM_PROMPT: &str = "You organize browser tabs into groups. \
Always answer with one strict JSON object and no other text.";

/// What the classifier is told about one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTab {
    pub id: TabId,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_by_tab_id: Option<TabId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_title: Option<String>,
}

/// The request text handed to the classification client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, Copy)]
pub struct BulkPromptInput<'a> {
    pub instruction: &'a str,
    pub tabs: &'a [PromptTab],
    pub sorting_mode: SortingMode,
    pub user_groups: &'a [UserGroup],
}

#[derive(Debug, Clone, Copy)]
pub struct IncrementalPromptInput<'a> {
    pub instruction: &'a str,
    pub new_tab: &'a PromptTab,
    pub opener_chain: &'a [PromptTab],
    pub other_tabs: &'a [PromptTab],
    pub existing_group_titles: &'a [String],
}

/// Joins live tabs with their tracked provenance and current group title.
pub fn enrich_tabs(
    tabs: &[Tab],
    metadata: &TabMetadataMap,
    groups: &[TabGroupInfo],
) -> Vec<PromptTab> {
    let titles: HashMap<GroupId, &str> = groups
        .iter()
        .map(|group| (group.id, group.title.as_str()))
        .collect();

    tabs.iter()
        .map(|tab| {
            let entry = metadata.get(&tab.id);
            PromptTab {
                id: tab.id,
                title: tab.title.clone(),
                url: tab.effective_url().unwrap_or_default().to_string(),
                opened_at: entry.map(|e| e.created_at),
                opened_by_tab_id: entry.and_then(|e| e.opener_tab_id),
                group_title: tab
                    .is_grouped()
                    .then(|| titles.get(&tab.group_id).copied())
                    .flatten()
                    .filter(|title| !title.is_empty())
                    .map(str::to_string),
            }
        })
        .collect()
}

/// Walks `opened_by_tab_id` links from `start` through `tabs`, nearest opener first.
/// Stops at unknown tabs, cycles, and `MAX_OPENER_DEPTH`.
pub fn opener_chain(start: &PromptTab, tabs: &[PromptTab]) -> Vec<PromptTab> {
    let by_id: HashMap<TabId, &PromptTab> = tabs.iter().map(|tab| (tab.id, tab)).collect();
    let mut chain: Vec<PromptTab> = Vec::new();
    let mut next = start.opened_by_tab_id;

    while let Some(id) = next {
        if chain.len() >= MAX_OPENER_DEPTH || id == start.id || chain.iter().any(|t| t.id == id) {
            break;
        }
        let Some(tab) = by_id.get(&id) else {
            break;
        };
        chain.push((*tab).clone());
        next = tab.opened_by_tab_id;
    }
    chain
}

fn format_timestamp(millis: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|at| at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

fn describe_tab(tab: &PromptTab) -> String {
    let mut line = format!(
        "Tab ID: {}, Title: {:?}, URL: {}",
        tab.id, tab.title, tab.url
    );
    if let Some(opened) = tab.opened_at.and_then(format_timestamp) {
        let _ = write!(line, ", Opened: {opened}");
    }
    if let Some(opener) = tab.opened_by_tab_id {
        let _ = write!(line, ", Opened from tab: {opener}");
    }
    if let Some(group) = &tab.group_title {
        let _ = write!(line, ", Current group: {group:?}");
    }
    line
}

pub fn build_bulk_prompt(input: &BulkPromptInput<'_>) -> PromptPayload {
    let mut prompt = format!("{}\n\n", input.instruction.trim());

    prompt.push_str("Here are the currently open tabs:\n");
    for (index, tab) in input.tabs.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", index + 1, describe_tab(tab));
    }
    prompt.push('\n');

    match input.sorting_mode {
        SortingMode::Respect if !input.user_groups.is_empty() => {
            prompt.push_str(
                "Please try to assign tabs to the following user-defined groups based on their \
descriptions. For tabs that don't fit, create new logical groups.\n",
            );
            for group in input.user_groups {
                let _ = writeln!(
                    prompt,
                    "- Group Name: {:?}, Description: {:?}",
                    group.name, group.description
                );
            }
        }
        SortingMode::Respect => {
            prompt.push_str("Please create logical groups for these tabs.\n");
        }
        SortingMode::Autonomous => {
            prompt.push_str("Please autonomously create logical groups for these tabs.\n");
        }
    }

    let example_ids: Vec<String> = input
        .tabs
        .iter()
        .take(3)
        .map(|tab| tab.id.to_string())
        .collect();
    let _ = write!(
        prompt,
        "\nYour response must be a JSON object. The top-level keys are group names. Each group \
name maps to an array of tab IDs (integers) that belong to that group, for example:\n\
{{\n  \"Research\": [{}]\n}}\n\
Use the exact Tab ID values listed above. Never renumber tabs or invent sequential numbers.\n\
Every listed tab ID must appear in exactly one group. If a tab doesn't fit well into any other \
group, place it in a general {MISCELLANEOUS_GROUP:?} group.\n\
Only include tab IDs that were provided in the input.\n",
        example_ids.join(", ")
    );

    PromptPayload {
        system: SYSTEM_PROMPT.to_string(),
        user: prompt,
    }
}

pub fn build_incremental_prompt(input: &IncrementalPromptInput<'_>) -> PromptPayload {
    let mut prompt = format!("{}\n\n", input.instruction.trim());

    let _ = writeln!(prompt, "A new tab was just opened:\n{}", describe_tab(input.new_tab));

    if !input.opener_chain.is_empty() {
        prompt.push_str("\nIt was opened from these tabs (nearest first):\n");
        for tab in input.opener_chain {
            let _ = writeln!(prompt, "- {}", describe_tab(tab));
        }
    }

    if !input.other_tabs.is_empty() {
        prompt.push_str("\nOther open tabs:\n");
        for (index, tab) in input.other_tabs.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}", index + 1, describe_tab(tab));
        }
    }

    if input.existing_group_titles.is_empty() {
        prompt.push_str("\nThere are no existing tab groups yet.\n");
    } else {
        prompt.push_str("\nExisting tab groups:\n");
        for title in input.existing_group_titles {
            let _ = writeln!(prompt, "- {title:?}");
        }
        prompt.push_str(
            "\nStrongly prefer one of the existing groups. If one fits, repeat its title exactly \
(matching ignores letter case). Only invent a new group name when none of them fits.\n",
        );
    }

    prompt.push_str(
        "\nYour response must be a JSON object with a single field, for example:\n\
{\"groupName\": \"Research\"}\n",
    );

    PromptPayload {
        system: SYSTEM_PROMPT.to_string(),
        user: prompt,
    }
}
