use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraUser {
    pub name: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "emailAddress")]
    pub email: Option<String>,
}

impl JiraUser {
    /// Display name, falling back to the login name.
    pub fn label(&self) -> Option<&str> {
        self.display_name.as_deref().or(self.name.as_deref())
    }
}

#[derive(Deserialize)]
pub struct IssueListResponse {
    #[serde(rename = "startAt", default)]
    pub start_at: u64,
    #[serde(rename = "maxResults", default)]
    pub max_results: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<JiraIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    pub fields: JiraIssueFields,
    #[serde(default)]
    pub changelog: Option<ChangeLog>,
}

/// Anything carrying a `name`: projects, statuses, issue types, versions.
#[derive(Debug, Clone, Deserialize)]
pub struct Named {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssueFields {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default)]
    pub project: Option<Named>,
    #[serde(default)]
    pub status: Option<Named>,
    #[serde(default)]
    pub issuetype: Option<Named>,
    #[serde(default)]
    pub assignee: Option<JiraUser>,
    #[serde(default)]
    pub reporter: Option<JiraUser>,
    #[serde(default)]
    pub priority: Option<Named>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub components: Vec<Named>,
    #[serde(rename = "fixVersions", default, deserialize_with = "null_as_default")]
    pub fix_versions: Vec<Named>,
    #[serde(default)]
    pub duedate: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub resolutiondate: Option<String>,
    /// Custom fields, keyed by tracker id (`customfield_10002`, ...).
    #[serde(flatten)]
    pub custom: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeLog {
    #[serde(default, deserialize_with = "null_as_default")]
    pub histories: Vec<ChangeHistory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeHistory {
    pub created: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<ChangeItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub field: String,
    #[serde(rename = "fromString", default)]
    pub from_string: Option<String>,
    #[serde(rename = "toString", default)]
    pub to_string: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateMetaResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub projects: Vec<CreateMetaProject>,
}

#[derive(Deserialize)]
pub struct CreateMetaProject {
    #[serde(default, deserialize_with = "null_as_default")]
    pub issuetypes: Vec<CreateMetaIssueType>,
}

#[derive(Deserialize)]
pub struct CreateMetaIssueType {
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: HashMap<String, CreateMetaField>,
}

#[derive(Deserialize)]
pub struct CreateMetaField {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_issue_with_nulls_and_custom_fields() {
        let issue: JiraIssue = serde_json::from_value(json!({
            "key": "ALPHA-1",
            "fields": {
                "summary": "Login page",
                "project": { "name": "Alpha" },
                "status": { "name": "In Progress" },
                "labels": null,
                "fixVersions": null,
                "assignee": { "name": "ada", "displayName": "Ada Lovelace" },
                "customfield_10002": 5.0,
                "customfield_10006": null
            }
        }))
        .unwrap();

        assert_eq!(issue.fields.summary, "Login page");
        assert!(issue.fields.labels.is_empty());
        assert!(issue.fields.fix_versions.is_empty());
        assert_eq!(
            issue.fields.assignee.as_ref().and_then(JiraUser::label),
            Some("Ada Lovelace")
        );
        assert_eq!(issue.fields.custom.get("customfield_10002"), Some(&json!(5.0)));
        assert_eq!(issue.fields.custom.get("customfield_10006"), Some(&Value::Null));
        assert!(issue.changelog.is_none());
    }

    #[test]
    fn decodes_search_page() {
        let page: IssueListResponse = serde_json::from_value(json!({
            "startAt": 50,
            "maxResults": 50,
            "total": 120,
            "issues": [{ "key": "ALPHA-2", "fields": {} }]
        }))
        .unwrap();

        assert_eq!(page.start_at, 50);
        assert_eq!(page.total, 120);
        assert_eq!(page.issues[0].key, "ALPHA-2");
        assert_eq!(page.issues[0].fields.summary, "");
    }
}
