use crate::hierarchy::Hierarchy;
use crate::issue::Issue;
use itertools::Itertools;
use std::collections::HashSet;

/// What a header row shows in its status column.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusDisplay {
    Percent(f64),
    Status(String),
}

/// Which map a node is read from. The flat-mode initiative and the Unassigned
/// Epic share a key, so the level cannot be inferred from map membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLevel {
    Initiative,
    Epic,
}

/// Leaf issues under `node`: the stories of every epic of an initiative, or
/// the stories of an epic. Each issue appears once.
pub fn nested_issues<'a>(hierarchy: &'a Hierarchy, node: &Issue, level: NodeLevel) -> Vec<&'a Issue> {
    if level == NodeLevel::Initiative {
        hierarchy
            .epics_of(node)
            .iter()
            .flat_map(|epic| hierarchy.stories_of(epic))
            .unique_by(|story| story.key().to_string())
            .collect()
    } else {
        hierarchy
            .stories_of(node)
            .iter()
            .unique_by(|story| story.key().to_string())
            .collect()
    }
}

/// Fraction of nested issues that are complete, `None` when there are none.
pub fn percent_complete(hierarchy: &Hierarchy, node: &Issue, level: NodeLevel) -> Option<f64> {
    let nested = nested_issues(hierarchy, node, level);
    if nested.is_empty() {
        return None;
    }
    let complete = nested.iter().filter(|issue| issue.is_complete()).count();
    Some(complete as f64 / nested.len() as f64)
}

pub fn status_display(hierarchy: &Hierarchy, node: &Issue, level: NodeLevel) -> StatusDisplay {
    match percent_complete(hierarchy, node, level) {
        Some(ratio) => StatusDisplay::Percent(ratio),
        None => StatusDisplay::Status(node.status_name().to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct NodeCompletion {
    pub issue: Issue,
    pub ratio: Option<f64>,
}

/// Completion of the selected initiatives and epics.
#[derive(Debug, Clone, Default)]
pub struct GoalMetrics {
    pub initiatives: Vec<NodeCompletion>,
    pub epics: Vec<NodeCompletion>,
}

/// Empty key sets select everything.
pub fn goal_metrics(
    hierarchy: &Hierarchy,
    initiative_keys: &HashSet<String>,
    epic_keys: &HashSet<String>,
) -> GoalMetrics {
    let mut metrics = GoalMetrics::default();
    let mut seen_epics: HashSet<&str> = HashSet::new();

    for (initiative, epics) in hierarchy.initiative_epics() {
        if !initiative_keys.is_empty() && !initiative_keys.contains(initiative.key()) {
            continue;
        }
        metrics.initiatives.push(NodeCompletion {
            issue: initiative.clone(),
            ratio: percent_complete(hierarchy, initiative, NodeLevel::Initiative),
        });

        for epic in epics {
            if (!epic_keys.is_empty() && !epic_keys.contains(epic.key())) || !seen_epics.insert(epic.key()) {
                continue;
            }
            metrics.epics.push(NodeCompletion {
                issue: epic.clone(),
                ratio: percent_complete(hierarchy, epic, NodeLevel::Epic),
            });
        }
    }

    metrics
}
