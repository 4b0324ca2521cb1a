use crate::models::*;
use crate::query::{IssueQueryService, QueryError, SearchPage};
use async_trait::async_trait;
use std::collections::HashMap;

const PAGE_SIZE: u64 = 100;

pub struct JiraClient {
    client: reqwest::Client,
    base_url: String,
}

impl JiraClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, QueryError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", token).parse()?,
        );

        Ok(Self {
            client: reqwest::Client::builder().default_headers(headers).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn _get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, QueryError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn get_myself(&self) -> Result<JiraUser, QueryError> {
        self._get("/rest/api/2/myself", &[]).await
    }
}

/// Custom field ids by display name. The first id seen for a name wins.
pub fn custom_field_ids(meta: CreateMetaResponse) -> HashMap<String, String> {
    let mut ids = HashMap::new();
    for issue_type in meta.projects.into_iter().flat_map(|project| project.issuetypes) {
        let mut fields: Vec<(String, CreateMetaField)> = issue_type.fields.into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        for (id, field) in fields {
            if id.starts_with("customfield_") {
                ids.entry(field.name).or_insert(id);
            }
        }
    }
    ids
}

#[async_trait]
impl IssueQueryService for JiraClient {
    async fn search(
        &self,
        jql: &str,
        fields: &[String],
        expand: &str,
        start_at: u64,
    ) -> Result<SearchPage, QueryError> {
        let mut query = vec![
            ("jql", jql.to_string()),
            ("fields", fields.join(",")),
            ("startAt", start_at.to_string()),
            ("maxResults", PAGE_SIZE.to_string()),
        ];
        if !expand.is_empty() {
            query.push(("expand", expand.to_string()));
        }

        let response: IssueListResponse = self._get("/rest/api/2/search", &query).await?;
        Ok(SearchPage {
            issues: response.issues,
            start_at: response.start_at,
            max_results: response.max_results,
            total: response.total,
        })
    }

    async fn custom_field_mapping(&self, project: &str) -> Result<HashMap<String, String>, QueryError> {
        let meta: CreateMetaResponse = self
            ._get(
                "/rest/api/2/issue/createmeta",
                &[
                    ("projectKeys", project.to_string()),
                    ("expand", "projects.issuetypes.fields".to_string()),
                ],
            )
            .await?;
        Ok(custom_field_ids(meta))
    }
}
