use crate::fields::CustomFields;
use crate::models::{ChangeLog, JiraIssue, JiraUser};
use crate::sprint::{self, SprintRecord};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::borrow::Borrow;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub const UNASSIGNED_EPIC_KEY: &str = "Unassigned Epic";
pub const UNASSIGNED_FIELD_VALUE: &str = "Unassigned";
pub const COMPLETION_STATUSES: [&str; 2] = ["Done", "Resolved"];

/// A node of the hierarchy: either an issue fetched from the tracker or the
/// synthetic "Unassigned Epic" placeholder. Identity is the key.
#[derive(Debug, Clone)]
pub enum Issue {
    Tracked(Arc<JiraIssue>),
    Unassigned,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRef<'a> {
    Missing,
    Unassigned,
    Value(&'a Value),
}

impl<'a> FieldRef<'a> {
    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            FieldRef::Missing => None,
            FieldRef::Unassigned => Some(UNASSIGNED_FIELD_VALUE),
            FieldRef::Value(value) => value.as_str(),
        }
    }

    /// Numeric value; numeric strings are accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldRef::Value(Value::Number(number)) => number.as_f64(),
            FieldRef::Value(Value::String(text)) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&'a Value> {
        match *self {
            FieldRef::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl From<JiraIssue> for Issue {
    fn from(issue: JiraIssue) -> Self {
        Issue::Tracked(Arc::new(issue))
    }
}

impl PartialEq for Issue {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Issue {}

impl Hash for Issue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Borrow<str> for Issue {
    fn borrow(&self) -> &str {
        self.key()
    }
}

impl Issue {
    pub fn key(&self) -> &str {
        match self {
            Issue::Tracked(issue) => &issue.key,
            Issue::Unassigned => UNASSIGNED_EPIC_KEY,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            Issue::Tracked(issue) => &issue.fields.summary,
            Issue::Unassigned => UNASSIGNED_FIELD_VALUE,
        }
    }

    pub fn status_name(&self) -> &str {
        match self {
            Issue::Tracked(issue) => issue.fields.status.as_ref().map_or("", |s| s.name.as_str()),
            Issue::Unassigned => UNASSIGNED_FIELD_VALUE,
        }
    }

    pub fn project_name(&self) -> &str {
        match self {
            Issue::Tracked(issue) => issue.fields.project.as_ref().map_or("", |p| p.name.as_str()),
            Issue::Unassigned => UNASSIGNED_FIELD_VALUE,
        }
    }

    pub fn issue_type(&self) -> &str {
        match self {
            Issue::Tracked(issue) => issue.fields.issuetype.as_ref().map_or("", |t| t.name.as_str()),
            Issue::Unassigned => UNASSIGNED_FIELD_VALUE,
        }
    }

    pub fn is_epic(&self) -> bool {
        self.issue_type().eq_ignore_ascii_case("Epic")
    }

    pub fn labels(&self) -> &[String] {
        match self {
            Issue::Tracked(issue) => &issue.fields.labels,
            Issue::Unassigned => &[],
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels().iter().any(|candidate| candidate == label)
    }

    pub fn assignee(&self) -> Option<&JiraUser> {
        match self {
            Issue::Tracked(issue) => issue.fields.assignee.as_ref(),
            Issue::Unassigned => None,
        }
    }

    pub fn assignee_name(&self) -> Option<&str> {
        match self {
            Issue::Tracked(_) => self.assignee().and_then(JiraUser::label),
            Issue::Unassigned => Some(UNASSIGNED_FIELD_VALUE),
        }
    }

    pub fn reporter_name(&self) -> Option<&str> {
        match self {
            Issue::Tracked(issue) => issue.fields.reporter.as_ref().and_then(JiraUser::label),
            Issue::Unassigned => Some(UNASSIGNED_FIELD_VALUE),
        }
    }

    pub fn priority(&self) -> Option<&str> {
        match self {
            Issue::Tracked(issue) => issue.fields.priority.as_ref().map(|p| p.name.as_str()),
            Issue::Unassigned => Some(UNASSIGNED_FIELD_VALUE),
        }
    }

    pub fn components(&self) -> Vec<&str> {
        match self {
            Issue::Tracked(issue) => issue.fields.components.iter().map(|c| c.name.as_str()).collect(),
            Issue::Unassigned => Vec::new(),
        }
    }

    pub fn fix_versions(&self) -> Vec<&str> {
        match self {
            Issue::Tracked(issue) => issue.fields.fix_versions.iter().map(|v| v.name.as_str()).collect(),
            Issue::Unassigned => Vec::new(),
        }
    }

    pub fn due_date(&self) -> Option<&str> {
        match self {
            Issue::Tracked(issue) => issue.fields.duedate.as_deref(),
            Issue::Unassigned => Some(UNASSIGNED_FIELD_VALUE),
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Issue::Tracked(issue) => issue.fields.description.as_deref(),
            Issue::Unassigned => Some(UNASSIGNED_FIELD_VALUE),
        }
    }

    /// Raw custom field by tracker id. An unknown id (mapping not loaded) is `Missing`.
    pub fn field(&self, id: Option<&str>) -> FieldRef<'_> {
        match self {
            Issue::Unassigned => FieldRef::Unassigned,
            Issue::Tracked(issue) => match id.and_then(|id| issue.fields.custom.get(id)) {
                None | Some(Value::Null) => FieldRef::Missing,
                Some(value) => FieldRef::Value(value),
            },
        }
    }

    pub fn epic_link(&self, fields: &CustomFields) -> Option<&str> {
        match self {
            Issue::Tracked(_) => self
                .field(fields.epic_link())
                .value()
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|link| !link.is_empty()),
            Issue::Unassigned => Some(UNASSIGNED_FIELD_VALUE),
        }
    }

    /// Story points; missing or non-numeric values count as zero.
    pub fn story_points(&self, fields: &CustomFields) -> f64 {
        self.field(fields.story_points()).as_f64().unwrap_or(0.0)
    }

    pub fn raw_story_points(&self, fields: &CustomFields) -> Option<f64> {
        self.field(fields.story_points()).as_f64()
    }

    pub fn program(&self, fields: &CustomFields) -> Option<&str> {
        match self.field(fields.program()) {
            FieldRef::Value(Value::Object(option)) => option.get("value").and_then(Value::as_str),
            other => other.as_str(),
        }
    }

    pub fn sprint_records(&self, fields: &CustomFields) -> Vec<SprintRecord> {
        sprint::sprint_records(self.field(fields.sprint()).value())
    }

    /// The last sprint the issue joined.
    pub fn current_sprint(&self, fields: &CustomFields) -> Option<String> {
        self.sprint_records(fields)
            .last()
            .and_then(|record| record.name().map(str::to_string))
    }

    pub fn resolution_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Issue::Tracked(issue) => issue
                .fields
                .resolutiondate
                .as_deref()
                .and_then(sprint::parse_timestamp_logged),
            Issue::Unassigned => None,
        }
    }

    pub fn change_log(&self) -> Option<&ChangeLog> {
        match self {
            Issue::Tracked(issue) => issue.changelog.as_ref(),
            Issue::Unassigned => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        is_complete_status(self.status_name())
    }
}

pub fn is_complete_status(status: &str) -> bool {
    COMPLETION_STATUSES
        .iter()
        .any(|done| done.eq_ignore_ascii_case(status))
}
