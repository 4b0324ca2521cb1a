use crate::fields::CustomFields;
use crate::issue::Issue;
use crate::query::{search_all, IssueQueryService, QueryError};
use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type IssueMap = IndexMap<Issue, Vec<Issue>>;

/// Initiative → Epic and Epic → Story ownership, read-only once built.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    initiative_epics: IssueMap,
    epic_stories: IssueMap,
}

impl Hierarchy {
    pub fn new(initiative_epics: IssueMap, epic_stories: IssueMap) -> Self {
        Self {
            initiative_epics,
            epic_stories,
        }
    }

    pub fn initiative_epics(&self) -> &IssueMap {
        &self.initiative_epics
    }

    pub fn epic_stories(&self) -> &IssueMap {
        &self.epic_stories
    }

    pub fn is_empty(&self) -> bool {
        self.initiative_epics.is_empty() && self.epic_stories.is_empty()
    }

    pub fn epics_of(&self, initiative: &Issue) -> &[Issue] {
        self.initiative_epics.get(initiative).map_or(&[], Vec::as_slice)
    }

    pub fn stories_of(&self, epic: &Issue) -> &[Issue] {
        self.epic_stories.get(epic).map_or(&[], Vec::as_slice)
    }

    /// Every story under any epic, once each, in map order.
    pub fn all_stories(&self) -> Vec<&Issue> {
        self.epic_stories
            .values()
            .flatten()
            .unique_by(|story| story.key().to_string())
            .collect()
    }

    /// Folds `other` in. Existing lists are extended, never replaced, and an
    /// issue already in a list is not added twice.
    pub fn merge(&mut self, other: Hierarchy) {
        for (initiative, epics) in other.initiative_epics {
            extend_unique(self.initiative_epics.entry(initiative).or_default(), epics);
        }
        for (epic, stories) in other.epic_stories {
            extend_unique(self.epic_stories.entry(epic).or_default(), stories);
        }
    }

    /// Drops epics without stories, then initiatives without surviving epics.
    pub fn prune(&mut self) {
        self.epic_stories.retain(|_, stories| !stories.is_empty());

        let epic_stories = &self.epic_stories;
        for epics in self.initiative_epics.values_mut() {
            epics.retain(|epic| epic_stories.contains_key(epic));
        }
        self.initiative_epics.retain(|_, epics| !epics.is_empty());
    }
}

fn extend_unique(target: &mut Vec<Issue>, issues: Vec<Issue>) {
    for issue in issues {
        if !target.contains(&issue) {
            target.push(issue);
        }
    }
}

/// Groups one batch into epics and their stories.
///
/// An in-scope issue without an epic link is registered as an epic. Every
/// other issue goes to the epic its link names, or to the Unassigned Epic
/// when that epic is not part of the batch. Only Epics registered here are
/// kept out of the story lists.
pub fn epic_story_map(issues: &[Issue], projects: &HashSet<String>, fields: &CustomFields) -> IssueMap {
    let mut map = IssueMap::new();

    for issue in issues {
        if issue.epic_link(fields).is_none() && projects.contains(issue.project_name()) {
            map.entry(issue.clone()).or_default();
        }
    }

    for story in issues {
        if story.is_epic() && map.contains_key(story.key()) {
            continue;
        }
        let epic = story
            .epic_link(fields)
            .and_then(|link| map.get_key_value(link))
            .map(|(epic, _)| epic.clone())
            .unwrap_or(Issue::Unassigned);

        extend_unique(map.entry(epic).or_default(), vec![story.clone()]);
    }

    map
}

/// Task-local result for one initiative and its descendants.
pub fn initiative_partial(
    initiative: Issue,
    children: &[Issue],
    projects: &HashSet<String>,
    fields: &CustomFields,
) -> Hierarchy {
    let epics = children
        .iter()
        .filter(|child| child.is_epic() && projects.contains(child.project_name()))
        .cloned()
        .collect();

    let mut initiative_epics = IssueMap::new();
    initiative_epics.insert(initiative, epics);

    Hierarchy::new(initiative_epics, epic_story_map(children, projects, fields))
}

/// Merges per-initiative results in initiative order, whatever order they finished in.
pub fn merge_partials(mut partials: Vec<(usize, Hierarchy)>) -> Hierarchy {
    partials.sort_by_key(|(index, _)| *index);

    let mut merged = Hierarchy::default();
    for (_, partial) in partials {
        merged.merge(partial);
    }
    merged.prune();
    merged
}

/// Hierarchy for a single flat batch: every epic hangs under an "Unassigned Epic" initiative.
pub fn flat_hierarchy(issues: &[Issue], projects: &HashSet<String>, fields: &CustomFields) -> Hierarchy {
    let mut epic_stories = epic_story_map(issues, projects, fields);
    epic_stories.retain(|_, stories| !stories.is_empty());

    let mut initiative_epics = IssueMap::new();
    initiative_epics.insert(Issue::Unassigned, epic_stories.keys().cloned().collect());

    let mut hierarchy = Hierarchy::new(initiative_epics, epic_stories);
    hierarchy.prune();
    hierarchy
}

pub fn initiatives_jql(projects: &[String]) -> String {
    format!("project in ({}) AND issuetype = Initiative", projects.join(","))
}

pub fn children_jql(initiative_key: &str, extra: &str) -> String {
    if extra.trim().is_empty() {
        format!("issuekey in childIssuesOf({})", initiative_key)
    } else {
        format!("issuekey in childIssuesOf({}) AND ({})", initiative_key, extra.trim())
    }
}

pub fn flat_jql(projects: &[String], extra: &str) -> String {
    if extra.trim().is_empty() {
        format!("project in ({})", projects.join(","))
    } else {
        extra.trim().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub projects: Vec<String>,
    pub load_initiatives: bool,
    pub issues_jql: String,
    pub include_changelog: bool,
    pub task_timeout: Option<Duration>,
}

pub struct HierarchyBuilder {
    service: Arc<dyn IssueQueryService>,
    options: BuildOptions,
}

impl HierarchyBuilder {
    pub fn new(service: Arc<dyn IssueQueryService>, options: BuildOptions) -> Self {
        Self { service, options }
    }

    fn scope(&self) -> HashSet<String> {
        self.options.projects.iter().cloned().collect()
    }

    fn expand(&self) -> &'static str {
        if self.options.include_changelog {
            "changelog"
        } else {
            ""
        }
    }

    /// Queries the tracker and builds the pruned hierarchy. Never fails: a
    /// failed top-level query is logged and yields an empty hierarchy.
    pub async fn build(&self, fields: &mut CustomFields) -> Hierarchy {
        log::info!("Loading initiatives, epics, and stories");
        let started = Instant::now();

        let Some(first_project) = self.options.projects.first() else {
            log::error!("No projects to query");
            return Hierarchy::default();
        };
        fields.ensure_loaded(self.service.as_ref(), first_project).await;

        let result = if self.options.load_initiatives {
            self.build_from_initiatives(fields).await
        } else {
            self.build_flat(fields).await
        };

        match result {
            Ok(hierarchy) => {
                log::info!(
                    "Finished querying in {:.2} seconds: {} initiatives, {} epics",
                    started.elapsed().as_secs_f64(),
                    hierarchy.initiative_epics.len(),
                    hierarchy.epic_stories.len()
                );
                hierarchy
            }
            Err(e) => {
                log::error!("Failed to search issues: {}", e);
                Hierarchy::default()
            }
        }
    }

    async fn build_from_initiatives(&self, fields: &CustomFields) -> Result<Hierarchy, QueryError> {
        let requested = Arc::new(fields.requested_fields());
        let initiatives = search_all(
            self.service.as_ref(),
            &initiatives_jql(&self.options.projects),
            &requested,
            "",
        )
        .await?;

        log::info!("Querying children of {} initiatives", initiatives.len());

        let scope = Arc::new(self.scope());
        let shared_fields = Arc::new(fields.clone());

        let tasks: Vec<_> = initiatives
            .into_iter()
            .map(Issue::from)
            .enumerate()
            .map(|(index, initiative)| {
                let service = Arc::clone(&self.service);
                let requested = Arc::clone(&requested);
                let scope = Arc::clone(&scope);
                let fields = Arc::clone(&shared_fields);
                let jql = children_jql(initiative.key(), &self.options.issues_jql);
                let expand = self.expand();
                let timeout = self.options.task_timeout;
                let key = initiative.key().to_string();

                log::info!("Queued up children of: {}", key);
                let handle = tokio::spawn(async move {
                    let fetch = search_all(service.as_ref(), &jql, &requested, expand);
                    let children = match timeout {
                        Some(limit) => tokio::time::timeout(limit, fetch)
                            .await
                            .map_err(|_| QueryError::Timeout(limit))??,
                        None => fetch.await?,
                    };
                    let children: Vec<Issue> = children.into_iter().map(Issue::from).collect();
                    Ok::<_, QueryError>(initiative_partial(initiative, &children, &scope, &fields))
                });
                (index, key, handle)
            })
            .collect();

        let mut partials = Vec::with_capacity(tasks.len());
        for (index, key, handle) in tasks {
            match handle.await {
                Ok(Ok(partial)) => {
                    log::info!("Successfully queried children of: {}", key);
                    partials.push((index, partial));
                }
                Ok(Err(e)) => log::warn!("Failed to query children of {}: {}", key, e),
                Err(e) => log::warn!("Child query for {} did not complete: {}", key, e),
            }
        }

        Ok(merge_partials(partials))
    }

    async fn build_flat(&self, fields: &CustomFields) -> Result<Hierarchy, QueryError> {
        let issues = search_all(
            self.service.as_ref(),
            &flat_jql(&self.options.projects, &self.options.issues_jql),
            &fields.requested_fields(),
            self.expand(),
        )
        .await?;

        log::info!("Successfully queried {} issues", issues.len());

        let issues: Vec<Issue> = issues.into_iter().map(Issue::from).collect();
        Ok(flat_hierarchy(&issues, &self.scope(), fields))
    }
}
