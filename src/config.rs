use crate::hierarchy::BuildOptions;
use crate::projection::Selection;
use std::collections::HashSet;
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub token: String,
    pub projects: Vec<String>,
    pub load_initiatives: bool,
    pub issues_jql: String,
    pub include_changelog: bool,
    pub query_timeout: Option<Duration>,
    pub refresh_interval: Duration,
    pub bind_address: String,
    pub selection: Selection,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let flag = |name: &'static str, default: bool| match lookup(name) {
            None => Ok(default),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "" => Ok(default),
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigError::Invalid { name, value }),
            },
        };
        let number = |name: &'static str, default: u64| match lookup(name) {
            None => Ok(default),
            Some(value) if value.trim().is_empty() => Ok(default),
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid { name, value }),
        };
        let list = |name: &'static str| lookup(name).map(|value| split_list(&value)).unwrap_or_default();
        let set = |name: &'static str| list(name).into_iter().collect::<HashSet<String>>();

        let projects = split_list(&required("JIRA_PROJECTS")?);
        if projects.is_empty() {
            return Err(ConfigError::Missing("JIRA_PROJECTS"));
        }

        let timeout_secs = number("JIRA_QUERY_TIMEOUT_SECS", 120)?;
        let refresh_minutes = number("REFRESH_INTERVAL_MINUTES", 10)?;
        if refresh_minutes == 0 {
            return Err(ConfigError::Invalid {
                name: "REFRESH_INTERVAL_MINUTES",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            base_url: required("JIRA_BASE_URL")?.trim_end_matches('/').to_string(),
            token: required("JIRA_TOKEN")?,
            projects,
            load_initiatives: flag("JIRA_LOAD_INITIATIVES", true)?,
            issues_jql: lookup("JIRA_ISSUES_JQL").unwrap_or_default().trim().to_string(),
            include_changelog: flag("JIRA_INCLUDE_CHANGELOG", true)?,
            query_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            refresh_interval: Duration::from_secs(refresh_minutes * 60),
            bind_address: lookup("BIND_ADDRESS")
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            selection: Selection {
                initiatives: set("REPORT_INITIATIVES"),
                epics: set("REPORT_EPICS"),
                sprints: set("REPORT_SPRINTS"),
                labels: set("REPORT_LABELS"),
                presence_labels: list("REPORT_PRESENCE_LABELS"),
            },
        })
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            projects: self.projects.clone(),
            load_initiatives: self.load_initiatives,
            issues_jql: self.issues_jql.clone(),
            include_changelog: self.include_changelog,
            task_timeout: self.query_timeout,
        }
    }
}
