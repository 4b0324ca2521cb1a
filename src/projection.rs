use crate::completion::{status_display, NodeLevel, StatusDisplay};
use crate::fields::CustomFields;
use crate::hierarchy::Hierarchy;
use crate::issue::Issue;
use std::cmp::Ordering;
use std::collections::HashSet;

/// What to show. Empty key, sprint and label sets select everything.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub initiatives: HashSet<String>,
    pub epics: HashSet<String>,
    pub sprints: HashSet<String>,
    pub labels: HashSet<String>,
    /// Labels checked per row, in column order.
    pub presence_labels: Vec<String>,
}

impl Selection {
    fn selects(keys: &HashSet<String>, key: &str) -> bool {
        keys.is_empty() || keys.contains(key)
    }

    pub fn includes_initiative(&self, initiative: &Issue) -> bool {
        Self::selects(&self.initiatives, initiative.key())
    }

    pub fn includes_epic(&self, epic: &Issue) -> bool {
        Self::selects(&self.epics, epic.key())
    }

    /// Label filter and sprint filter combined. An issue outside any sprint
    /// passes the sprint filter.
    pub fn includes_story(&self, story: &Issue, fields: &CustomFields) -> bool {
        let labels_pass =
            self.labels.is_empty() || story.labels().iter().any(|label| self.labels.contains(label));
        if !labels_pass {
            return false;
        }
        self.sprints.is_empty()
            || story
                .current_sprint(fields)
                .map_or(true, |sprint| self.sprints.contains(&sprint))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRole {
    Initiative,
    Epic,
    Story,
}

impl RowRole {
    /// Outline depth of the group opened below a row of this role.
    pub fn depth(self) -> u8 {
        match self {
            RowRole::Initiative => 1,
            RowRole::Epic => 2,
            RowRole::Story => 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowColumns {
    pub key: String,
    pub summary: String,
    pub program: Option<String>,
    pub project: String,
    pub sprint: Option<String>,
    pub story_points: Option<f64>,
    pub issue_type: String,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub priority: Option<String>,
    pub labels: Vec<String>,
    pub components: Vec<String>,
    pub fix_versions: Vec<String>,
    pub due_date: Option<String>,
    pub description: Option<String>,
}

impl RowColumns {
    pub fn resolve(issue: &Issue, fields: &CustomFields) -> Self {
        let owned = |value: Option<&str>| value.map(str::to_string);
        Self {
            key: issue.key().to_string(),
            summary: issue.summary().to_string(),
            program: owned(issue.program(fields)),
            project: issue.project_name().to_string(),
            sprint: issue.current_sprint(fields),
            story_points: issue.raw_story_points(fields),
            issue_type: issue.issue_type().to_string(),
            assignee: owned(issue.assignee_name()),
            reporter: owned(issue.reporter_name()),
            priority: owned(issue.priority()),
            labels: issue.labels().to_vec(),
            components: issue.components().into_iter().map(str::to_string).collect(),
            fix_versions: issue.fix_versions().into_iter().map(str::to_string).collect(),
            due_date: owned(issue.due_date()),
            description: owned(issue.description()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Row {
    pub role: RowRole,
    pub issue: Issue,
    pub columns: RowColumns,
    pub status: StatusDisplay,
    /// One flag per presence label.
    pub presence: Vec<bool>,
}

/// Inclusive range of rows that collapse under the row before `first`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowGroup {
    pub role: RowRole,
    pub depth: u8,
    pub first: usize,
    pub last: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub rows: Vec<Row>,
    pub groups: Vec<RowGroup>,
    pub presence_labels: Vec<String>,
}

/// Orders stories by project name, with complete issues after open ones in
/// each project. Anything else compares equal so a stable sort keeps source order.
pub fn compare_stories(a: &Issue, b: &Issue) -> Ordering {
    a.project_name()
        .cmp(b.project_name())
        .then_with(|| a.is_complete().cmp(&b.is_complete()))
}

struct ProjectionBuilder<'a> {
    hierarchy: &'a Hierarchy,
    fields: &'a CustomFields,
    selection: &'a Selection,
    projection: Projection,
}

impl<'a> ProjectionBuilder<'a> {
    fn push_header(&mut self, level: NodeLevel, issue: &Issue) -> usize {
        let role = match level {
            NodeLevel::Initiative => RowRole::Initiative,
            NodeLevel::Epic => RowRole::Epic,
        };
        self.projection.rows.push(Row {
            role,
            issue: issue.clone(),
            columns: RowColumns::resolve(issue, self.fields),
            status: status_display(self.hierarchy, issue, level),
            presence: vec![true; self.selection.presence_labels.len()],
        });
        self.projection.rows.len() - 1
    }

    fn push_story(&mut self, story: &Issue) {
        let presence = self
            .selection
            .presence_labels
            .iter()
            .map(|label| story.has_label(label))
            .collect();
        self.projection.rows.push(Row {
            role: RowRole::Story,
            issue: story.clone(),
            columns: RowColumns::resolve(story, self.fields),
            status: StatusDisplay::Status(story.status_name().to_string()),
            presence,
        });
    }

    /// Closes a group over the rows after `header`, if there are any.
    fn close_group(&mut self, role: RowRole, header: usize) {
        let last = self.projection.rows.len() - 1;
        if last > header {
            self.push_group(role, header + 1, last);
        }
    }

    fn push_group(&mut self, role: RowRole, first: usize, last: usize) {
        self.projection.groups.push(RowGroup {
            role,
            depth: role.depth(),
            first,
            last,
        });
    }

    fn epic(&mut self, epic: &Issue) {
        let header = self.push_header(NodeLevel::Epic, epic);
        let (hierarchy, fields, selection) = (self.hierarchy, self.fields, self.selection);

        let mut stories: Vec<&Issue> = hierarchy
            .stories_of(epic)
            .iter()
            .filter(|story| selection.includes_story(story, fields))
            .collect();
        stories.sort_by(|a, b| compare_stories(a, b));

        // Start row of the current run of same-project stories.
        let mut run: Option<(&str, usize)> = None;
        for story in stories {
            let row = self.projection.rows.len();
            if run.map_or(true, |(project, _)| project != story.project_name()) {
                if let Some((_, first)) = run {
                    self.push_group(RowRole::Story, first, row - 1);
                }
                run = Some((story.project_name(), row));
            }
            self.push_story(story);
        }
        if let Some((_, first)) = run {
            let last = self.projection.rows.len() - 1;
            self.push_group(RowRole::Story, first, last);
        }

        self.close_group(RowRole::Epic, header);
    }

    fn build(mut self) -> Projection {
        let (hierarchy, selection) = (self.hierarchy, self.selection);
        for (initiative, epics) in hierarchy.initiative_epics() {
            if !selection.includes_initiative(initiative) {
                continue;
            }
            let header = self.push_header(NodeLevel::Initiative, initiative);
            for epic in epics.iter().filter(|epic| selection.includes_epic(epic)) {
                self.epic(epic);
            }
            self.close_group(RowRole::Initiative, header);
        }

        self.projection
            .groups
            .sort_by_key(|group| (group.first, group.depth));
        self.projection
    }
}

/// Flattens the hierarchy into ordered rows and outline groups.
pub fn project(hierarchy: &Hierarchy, fields: &CustomFields, selection: &Selection) -> Projection {
    let projection = ProjectionBuilder {
        hierarchy,
        fields,
        selection,
        projection: Projection {
            presence_labels: selection.presence_labels.clone(),
            ..Default::default()
        },
    }
    .build();

    log::debug!(
        "Projected {} rows in {} groups",
        projection.rows.len(),
        projection.groups.len()
    );
    projection
}
