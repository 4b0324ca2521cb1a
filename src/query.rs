use crate::models::JiraIssue;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Request to issue tracker failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Issue tracker answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid request header: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Other(String),
}

/// One page of a search.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub issues: Vec<JiraIssue>,
    pub start_at: u64,
    pub max_results: u64,
    pub total: u64,
}

impl SearchPage {
    /// Offset of the following page, if any.
    pub fn next_start(&self) -> Option<u64> {
        let next = self.start_at + self.issues.len() as u64;
        if self.issues.is_empty() || next >= self.total {
            None
        } else {
            Some(next)
        }
    }
}

/// Upstream source of issues and custom field metadata.
#[async_trait]
pub trait IssueQueryService: Send + Sync {
    async fn search(
        &self,
        jql: &str,
        fields: &[String],
        expand: &str,
        start_at: u64,
    ) -> Result<SearchPage, QueryError>;

    /// Human readable field name to tracker id, e.g. `"Story Points" -> "customfield_10002"`.
    async fn custom_field_mapping(&self, project: &str) -> Result<HashMap<String, String>, QueryError>;
}

/// Drains every page of `jql`. A key seen on an earlier page is not repeated.
pub async fn search_all(
    service: &dyn IssueQueryService,
    jql: &str,
    fields: &[String],
    expand: &str,
) -> Result<Vec<JiraIssue>, QueryError> {
    let mut issues: Vec<JiraIssue> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut start_at = 0;

    loop {
        let page = service.search(jql, fields, expand, start_at).await?;
        log::debug!(
            "Fetched {} issues at offset {} of {} for `{}`",
            page.issues.len(),
            page.start_at,
            page.total,
            jql
        );
        let next = page.next_start();

        issues.extend(
            page.issues
                .into_iter()
                .filter(|issue| seen.insert(issue.key.clone())),
        );

        match next {
            Some(next) if next > start_at => start_at = next,
            _ => break,
        }
    }

    Ok(issues)
}
