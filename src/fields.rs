use crate::query::IssueQueryService;
use std::collections::HashMap;

pub const STORY_POINTS_KEY: &str = "Story Points";
pub const PROGRAM_KEY: &str = "Program / Project";
pub const SPRINT_KEY: &str = "Sprint";
pub const EPIC_LINK_KEY: &str = "Epic Link";

const STANDARD_FIELDS: [&str; 16] = [
    "project",
    "key",
    "summary",
    "description",
    "status",
    "issuetype",
    "created",
    "resolutiondate",
    "labels",
    "assignee",
    "reporter",
    "priority",
    "fixVersions",
    "duedate",
    "components",
    "issuelinks",
];

/// Custom field names to tracker ids, loaded once per session.
#[derive(Debug, Clone, Default)]
pub struct CustomFields {
    ids: HashMap<String, String>,
}

impl CustomFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: HashMap<String, String>) -> Self {
        Self { ids }
    }

    pub fn is_loaded(&self) -> bool {
        !self.ids.is_empty()
    }

    pub fn id(&self, name: &str) -> Option<&str> {
        self.ids.get(name).map(String::as_str)
    }

    pub fn story_points(&self) -> Option<&str> {
        self.id(STORY_POINTS_KEY)
    }

    pub fn sprint(&self) -> Option<&str> {
        self.id(SPRINT_KEY)
    }

    pub fn epic_link(&self) -> Option<&str> {
        self.id(EPIC_LINK_KEY)
    }

    pub fn program(&self) -> Option<&str> {
        self.id(PROGRAM_KEY)
    }

    /// Loads the mapping for `project` unless it is already present. Failures
    /// are logged and leave the mapping empty; the next call tries again.
    pub async fn ensure_loaded(&mut self, service: &dyn IssueQueryService, project: &str) {
        if self.is_loaded() {
            return;
        }

        match service.custom_field_mapping(project).await {
            Ok(ids) => {
                log::info!("Loaded {} custom field ids for project {}", ids.len(), project);
                self.ids = ids;
            }
            Err(e) => log::warn!("Failed to load custom fields for project {}: {}", project, e),
        }
    }

    /// Unresolved custom fields are left out.
    pub fn requested_fields(&self) -> Vec<String> {
        STANDARD_FIELDS
            .iter()
            .map(|field| field.to_string())
            .chain(
                [STORY_POINTS_KEY, SPRINT_KEY, EPIC_LINK_KEY, PROGRAM_KEY]
                    .iter()
                    .filter_map(|name| self.id(name))
                    .map(str::to_string),
            )
            .collect()
    }
}
