use std::collections::HashSet;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};

use super::tab::TabId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupAssignment {
    pub name: String,
    pub tab_ids: Vec<TabId>,
}

/// Group name to tab ids, keeping first-seen order of groups and of tabs.
/// A tab id is held by at most one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grouping {
    groups: Vec<GroupAssignment>,
    assigned: HashSet<TabId>,
}

impl Grouping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the tab is already held by some group.
    pub fn assign(&mut self, name: &str, tab_id: TabId) -> bool {
        if !self.assigned.insert(tab_id) {
            return false;
        }
        match self.groups.iter_mut().find(|group| group.name == name) {
            Some(group) => group.tab_ids.push(tab_id),
            None => self.groups.push(GroupAssignment {
                name: name.to_string(),
                tab_ids: vec![tab_id],
            }),
        }
        true
    }

    pub fn groups(&self) -> &[GroupAssignment] {
        &self.groups
    }

    pub fn get(&self, name: &str) -> Option<&[TabId]> {
        self.groups
            .iter()
            .find(|group| group.name == name)
            .map(|group| group.tab_ids.as_slice())
    }

    pub fn contains_tab(&self, tab_id: TabId) -> bool {
        self.assigned.contains(&tab_id)
    }

    pub fn tab_ids(&self) -> impl Iterator<Item = TabId> + '_ {
        self.groups.iter().flat_map(|group| group.tab_ids.iter().copied())
    }

    pub fn tab_count(&self) -> usize {
        self.assigned.len()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Serialize for Grouping {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for group in &self.groups {
            map.serialize_entry(&group.name, &group.tab_ids)?;
        }
        map.end()
    }
}

/// The group picked for a single new tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalChoice {
    pub group_name: String,
}
