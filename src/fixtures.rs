//! Builders shared by the unit tests. Issues go through `serde_json` so the
//! wire decoding is exercised as well.

use crate::models::JiraIssue;
use crate::query::{IssueQueryService, QueryError, SearchPage};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const STORY_POINTS_ID: &str = "customfield_10002";
pub const SPRINT_ID: &str = "customfield_10004";
pub const EPIC_LINK_ID: &str = "customfield_10006";
pub const PROGRAM_ID: &str = "customfield_10100";

pub fn field_ids() -> HashMap<String, String> {
    HashMap::from([
        ("Story Points".to_string(), STORY_POINTS_ID.to_string()),
        ("Sprint".to_string(), SPRINT_ID.to_string()),
        ("Epic Link".to_string(), EPIC_LINK_ID.to_string()),
        ("Program / Project".to_string(), PROGRAM_ID.to_string()),
    ])
}

/// A legacy sprint blob as the tracker stores it.
pub fn sprint_blob(name: &str, start: Option<&str>, end: Option<&str>) -> String {
    format!(
        "com.atlassian.greenhopper.service.sprint.Sprint@1a2b[id=1,rapidViewId=3,state=CLOSED,name={},startDate={},endDate={},completeDate=<null>,sequence=1]",
        name,
        start.unwrap_or("<null>"),
        end.unwrap_or("<null>")
    )
}

pub struct IssueFixture {
    key: String,
    fields: Map<String, Value>,
    histories: Option<Vec<Value>>,
}

impl IssueFixture {
    pub fn new(key: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("summary".into(), json!(format!("Summary of {}", key)));
        fields.insert("project".into(), json!({ "name": "Alpha" }));
        fields.insert("status".into(), json!({ "name": "To Do" }));
        fields.insert("issuetype".into(), json!({ "name": "Story" }));
        fields.insert("labels".into(), json!([]));
        Self {
            key: key.to_string(),
            fields,
            histories: None,
        }
    }

    fn set(mut self, field: &str, value: Value) -> Self {
        self.fields.insert(field.to_string(), value);
        self
    }

    pub fn project(self, name: &str) -> Self {
        self.set("project", json!({ "name": name }))
    }

    pub fn status(self, name: &str) -> Self {
        self.set("status", json!({ "name": name }))
    }

    pub fn issue_type(self, name: &str) -> Self {
        self.set("issuetype", json!({ "name": name }))
    }

    pub fn epic(self) -> Self {
        self.issue_type("Epic")
    }

    pub fn initiative(self) -> Self {
        self.issue_type("Initiative")
    }

    pub fn labels(self, labels: &[&str]) -> Self {
        self.set("labels", json!(labels))
    }

    pub fn assignee(self, display_name: &str) -> Self {
        self.set(
            "assignee",
            json!({ "name": display_name.to_lowercase(), "displayName": display_name }),
        )
    }

    pub fn points(self, points: f64) -> Self {
        self.set(STORY_POINTS_ID, json!(points))
    }

    pub fn points_value(self, value: Value) -> Self {
        self.set(STORY_POINTS_ID, value)
    }

    pub fn epic_link(self, epic_key: &str) -> Self {
        self.set(EPIC_LINK_ID, json!(epic_key))
    }

    pub fn program(self, name: &str) -> Self {
        self.set(PROGRAM_ID, json!({ "value": name, "id": "1" }))
    }

    pub fn sprints(self, blobs: Vec<String>) -> Self {
        self.set(SPRINT_ID, json!(blobs))
    }

    pub fn resolved_at(self, timestamp: &str) -> Self {
        self.set("resolutiondate", json!(timestamp))
    }

    /// Adds a change-history entry moving the issue between sprints.
    pub fn moved_to_sprint(mut self, created: &str, from: Option<&str>, to: &str) -> Self {
        self.histories.get_or_insert_with(Vec::new).push(json!({
            "created": created,
            "items": [{ "field": "Sprint", "fromString": from, "toString": to }]
        }));
        self
    }

    /// Marks the change log as fetched, even when it has no entries.
    pub fn with_empty_history(mut self) -> Self {
        self.histories.get_or_insert_with(Vec::new);
        self
    }

    pub fn build(self) -> JiraIssue {
        let mut issue = json!({ "key": self.key, "fields": Value::Object(self.fields) });
        if let Some(histories) = self.histories {
            issue["changelog"] = json!({ "histories": histories });
        }
        serde_json::from_value(issue).expect("fixture issue should decode")
    }
}

/// In-memory tracker. Results are registered against a substring of the
/// query text; the first registration contained in the query answers it.
pub struct FakeTracker {
    results: Vec<(String, Vec<JiraIssue>)>,
    failing: Vec<String>,
    delays: Vec<(String, Duration)>,
    page_size: usize,
    field_mapping: Option<HashMap<String, String>>,
    search_calls: AtomicUsize,
    field_mapping_calls: AtomicUsize,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            failing: Vec::new(),
            delays: Vec::new(),
            page_size: 50,
            field_mapping: Some(field_ids()),
            search_calls: AtomicUsize::new(0),
            field_mapping_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_results(mut self, needle: &str, issues: Vec<JiraIssue>) -> Self {
        self.results.push((needle.to_string(), issues));
        self
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.failing.push(needle.to_string());
        self
    }

    pub fn delayed(mut self, needle: &str, delay: Duration) -> Self {
        self.delays.push((needle.to_string(), delay));
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn without_field_mapping(mut self) -> Self {
        self.field_mapping = None;
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn field_mapping_calls(&self) -> usize {
        self.field_mapping_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IssueQueryService for FakeTracker {
    async fn search(
        &self,
        jql: &str,
        _fields: &[String],
        _expand: &str,
        start_at: u64,
    ) -> Result<SearchPage, QueryError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        if let Some((_, delay)) = self.delays.iter().find(|(needle, _)| jql.contains(needle.as_str())) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.iter().any(|needle| jql.contains(needle.as_str())) {
            return Err(QueryError::Other(format!("query rejected: {}", jql)));
        }

        let all = self
            .results
            .iter()
            .find(|(needle, _)| jql.contains(needle.as_str()))
            .map(|(_, issues)| issues.clone())
            .unwrap_or_default();
        let start = (start_at as usize).min(all.len());
        let end = (start + self.page_size).min(all.len());

        Ok(SearchPage {
            issues: all[start..end].to_vec(),
            start_at,
            max_results: self.page_size as u64,
            total: all.len() as u64,
        })
    }

    async fn custom_field_mapping(&self, project: &str) -> Result<HashMap<String, String>, QueryError> {
        self.field_mapping_calls.fetch_add(1, Ordering::SeqCst);
        self.field_mapping
            .clone()
            .ok_or_else(|| QueryError::Other(format!("no field metadata for {}", project)))
    }
}
