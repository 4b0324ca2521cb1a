use crate::fields::CustomFields;
use crate::hierarchy::Hierarchy;
use crate::issue::Issue;
use crate::models::ChangeLog;
use crate::sprint::{self, SprintRecord};
use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use std::collections::{BTreeMap, HashSet};

/// Name of the change-history field that records sprint moves.
const SPRINT_FIELD: &str = "Sprint";

/// A sprint seen on at least one assigned story.
#[derive(Debug, Clone, PartialEq)]
pub struct SprintInfo {
    pub name: String,
    pub start: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VelocityMetrics {
    pub starting_commitment: f64,
    pub points_added: f64,
    pub points_completed: f64,
    pub average_ticket_size: f64,
    pub issue_count: usize,
}

impl VelocityMetrics {
    pub fn delta(&self) -> f64 {
        self.points_completed - self.starting_commitment
    }

    pub fn total_points(&self) -> f64 {
        self.starting_commitment + self.points_added
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SprintVelocity {
    pub sprint: String,
    pub start: Option<DateTime<Utc>>,
    pub metrics: VelocityMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssigneeVelocity {
    pub assignee: String,
    pub sprints: Vec<SprintVelocity>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VelocityReport {
    pub assignees: Vec<AssigneeVelocity>,
    /// Per-sprint sums across every assignee.
    pub team: Vec<SprintVelocity>,
}

/// Distinct sprints of every assigned story, ordered by start date (unknown
/// starts last) and then name. The start date is the first one found.
pub fn sprint_universe(stories: &[&Issue], fields: &CustomFields) -> Vec<SprintInfo> {
    let mut starts: BTreeMap<String, Option<DateTime<Utc>>> = BTreeMap::new();

    for story in stories.iter().filter(|story| story.assignee_name().is_some()) {
        for record in story.sprint_records(fields) {
            let Some(name) = record.name() else {
                continue;
            };
            let start = starts.entry(name.to_string()).or_insert(None);
            if start.is_none() {
                *start = record.start_date().and_then(sprint::parse_timestamp_logged);
            }
        }
    }

    starts
        .into_iter()
        .map(|(name, start)| SprintInfo { name, start })
        .sorted_by(|a, b| match (a.start, b.start) {
            (Some(left), Some(right)) => left.cmp(&right).then_with(|| a.name.cmp(&b.name)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        })
        .collect()
}

/// Whether the change history moved the issue into `sprint` more than a day
/// after the sprint started.
pub fn was_added_after_start(change_log: Option<&ChangeLog>, sprint: &str, start: DateTime<Utc>) -> bool {
    let Some(change_log) = change_log else {
        return false;
    };
    let cutoff = start + TimeDelta::days(1);

    change_log.histories.iter().any(|history| {
        let Some(created) = sprint::parse_timestamp_logged(&history.created) else {
            return false;
        };
        created > cutoff
            && history.items.iter().any(|item| {
                item.field.eq_ignore_ascii_case(SPRINT_FIELD)
                    && names_sprint(item.to_string.as_deref(), sprint)
                    && !names_sprint(item.from_string.as_deref(), sprint)
            })
    })
}

/// Whether a comma-separated sprint list holds `sprint` as a whole name.
fn names_sprint(names: Option<&str>, sprint: &str) -> bool {
    names.is_some_and(|names| names.split(',').any(|name| name.trim() == sprint))
}

/// When work had to be resolved to count for `sprint`: the end date of the
/// issue's last record for it, or the epoch when that is unknown.
fn completion_deadline(records: &[SprintRecord], sprint: &str) -> DateTime<Utc> {
    records
        .iter()
        .rev()
        .find(|record| record.name() == Some(sprint))
        .and_then(SprintRecord::end_date)
        .and_then(sprint::parse_timestamp_logged)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Metrics of one assignee's issues in one sprint. The issues must already be
/// filtered to that sprint.
pub fn sprint_metrics(issues: &[&Issue], sprint: &SprintInfo, fields: &CustomFields) -> VelocityMetrics {
    let mut metrics = VelocityMetrics {
        issue_count: issues.len(),
        ..Default::default()
    };
    let mut total = 0.0;

    for issue in issues.iter().sorted_by(|a, b| a.key().cmp(b.key())) {
        let points = issue.story_points(fields);
        total += points;

        let added = sprint
            .start
            .is_some_and(|start| was_added_after_start(issue.change_log(), &sprint.name, start));
        if !added {
            metrics.starting_commitment += points;
        }

        let deadline = completion_deadline(&issue.sprint_records(fields), &sprint.name);
        if issue.resolution_date().is_some_and(|resolved| resolved < deadline) {
            metrics.points_completed += points;
        }
    }

    metrics.points_added = total - metrics.starting_commitment;
    if !issues.is_empty() {
        metrics.average_ticket_size = total / issues.len() as f64;
    }
    metrics
}

fn passes_labels(issue: &Issue, labels: &HashSet<String>) -> bool {
    labels.is_empty() || issue.labels().iter().any(|label| labels.contains(label))
}

fn in_sprint(issue: &Issue, sprint: &str, fields: &CustomFields) -> bool {
    issue
        .sprint_records(fields)
        .iter()
        .any(|record| record.name() == Some(sprint))
}

/// Per-assignee and team velocity over every story in the hierarchy.
pub fn velocity_report(hierarchy: &Hierarchy, fields: &CustomFields, labels: &HashSet<String>) -> VelocityReport {
    let stories = hierarchy.all_stories();
    let sprints = sprint_universe(&stories, fields);

    let by_assignee: BTreeMap<&str, Vec<&Issue>> = stories
        .iter()
        .filter(|story| passes_labels(story, labels))
        .filter_map(|story| story.assignee_name().map(|name| (name, *story)))
        .into_group_map()
        .into_iter()
        .collect();

    let assignees: Vec<AssigneeVelocity> = by_assignee
        .into_iter()
        .map(|(assignee, issues)| {
            let sprints = sprints
                .iter()
                .filter_map(|sprint| {
                    let in_scope: Vec<&Issue> = issues
                        .iter()
                        .copied()
                        .filter(|issue| in_sprint(issue, &sprint.name, fields))
                        .collect();
                    if in_scope.is_empty() {
                        return None;
                    }
                    Some(SprintVelocity {
                        sprint: sprint.name.clone(),
                        start: sprint.start,
                        metrics: sprint_metrics(&in_scope, sprint, fields),
                    })
                })
                .collect();
            AssigneeVelocity {
                assignee: assignee.to_string(),
                sprints,
            }
        })
        .filter(|velocity| !velocity.sprints.is_empty())
        .collect();

    let team = team_rollup(&sprints, &assignees);
    log::info!(
        "Computed velocity for {} assignees over {} sprints",
        assignees.len(),
        team.len()
    );

    VelocityReport { assignees, team }
}

/// Sums each sprint across assignees. Ticket size is weighted by issue count.
pub fn team_rollup(sprints: &[SprintInfo], assignees: &[AssigneeVelocity]) -> Vec<SprintVelocity> {
    sprints
        .iter()
        .filter_map(|sprint| {
            let rows: Vec<&VelocityMetrics> = assignees
                .iter()
                .flat_map(|assignee| &assignee.sprints)
                .filter(|row| row.sprint == sprint.name)
                .map(|row| &row.metrics)
                .collect();
            if rows.is_empty() {
                return None;
            }

            let mut metrics = VelocityMetrics::default();
            let mut weighted_size = 0.0;
            for row in rows {
                metrics.starting_commitment += row.starting_commitment;
                metrics.points_added += row.points_added;
                metrics.points_completed += row.points_completed;
                metrics.issue_count += row.issue_count;
                weighted_size += row.average_ticket_size * row.issue_count as f64;
            }
            if metrics.issue_count > 0 {
                metrics.average_ticket_size = weighted_size / metrics.issue_count as f64;
            }

            Some(SprintVelocity {
                sprint: sprint.name.clone(),
                start: sprint.start,
                metrics,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{field_ids, sprint_blob, IssueFixture};
    use crate::hierarchy::IssueMap;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const S1_START: &str = "2019-01-07T15:00:00.000Z";
    const S1_END: &str = "2019-01-21T15:00:00.000Z";

    fn s1() -> String {
        sprint_blob("S1", Some(S1_START), Some(S1_END))
    }

    fn s1_info() -> SprintInfo {
        SprintInfo {
            name: "S1".to_string(),
            start: Some(Utc.with_ymd_and_hms(2019, 1, 7, 15, 0, 0).unwrap()),
        }
    }

    fn stories_hierarchy(stories: Vec<Issue>) -> Hierarchy {
        let mut epic_stories = IssueMap::new();
        epic_stories.insert(Issue::Unassigned, stories);
        Hierarchy::new(IssueMap::new(), epic_stories)
    }

    #[test]
    fn issue_moved_in_after_start_counts_as_added() {
        let fields = CustomFields::from_ids(field_ids());
        let late = Issue::from(
            IssueFixture::new("A-1")
                .assignee("Ada")
                .points(3.0)
                .sprints(vec![s1()])
                .moved_to_sprint("2019-01-09T15:00:00.000+0000", None, "S1")
                .build(),
        );
        let planned = Issue::from(
            IssueFixture::new("A-2")
                .assignee("Ada")
                .points(5.0)
                .sprints(vec![s1()])
                .resolved_at("2019-01-15T10:00:00.000+0000")
                .with_empty_history()
                .build(),
        );

        let metrics = sprint_metrics(&[&late, &planned], &s1_info(), &fields);

        assert_eq!(metrics.starting_commitment, 5.0);
        assert_eq!(metrics.points_added, 3.0);
        assert_eq!(metrics.points_completed, 5.0);
        assert_eq!(metrics.average_ticket_size, 4.0);
        assert_eq!(metrics.delta(), 0.0);
        assert_eq!(metrics.issue_count, 2);
    }

    #[test]
    fn move_within_first_day_is_commitment() {
        let start = s1_info().start.unwrap();
        let issue = IssueFixture::new("A-1")
            .moved_to_sprint("2019-01-08T15:00:00.000Z", None, "S1")
            .build();
        assert!(!was_added_after_start(issue.changelog.as_ref(), "S1", start));
    }

    #[test]
    fn move_between_lists_already_holding_sprint_is_not_added() {
        let start = s1_info().start.unwrap();
        let issue = IssueFixture::new("A-1")
            .moved_to_sprint("2019-01-10T15:00:00.000Z", Some("S0, S1"), "S1")
            .build();
        assert!(!was_added_after_start(issue.changelog.as_ref(), "S1", start));
        assert!(!was_added_after_start(None, "S1", start));
    }

    #[test]
    fn sprint_names_match_whole_not_by_prefix() {
        let start = s1_info().start.unwrap();
        let later = IssueFixture::new("A-1")
            .moved_to_sprint("2019-01-10T15:00:00.000Z", None, "S10")
            .build();
        assert!(!was_added_after_start(later.changelog.as_ref(), "S1", start));

        let from_s10 = IssueFixture::new("A-2")
            .moved_to_sprint("2019-01-10T15:00:00.000Z", Some("S10"), "S10, S1")
            .build();
        assert!(was_added_after_start(from_s10.changelog.as_ref(), "S1", start));

        let joined = IssueFixture::new("A-3")
            .moved_to_sprint("2019-01-10T15:00:00.000Z", Some("S0"), "S0, S1")
            .build();
        assert!(was_added_after_start(joined.changelog.as_ref(), "S1", start));
    }

    #[test]
    fn repeated_sprint_record_uses_last_end_date() {
        let fields = CustomFields::from_ids(field_ids());
        let issue = Issue::from(
            IssueFixture::new("A-1")
                .assignee("Ada")
                .points(2.0)
                .sprints(vec![
                    sprint_blob("S1", Some(S1_START), Some("2019-01-09T15:00:00.000Z")),
                    s1(),
                ])
                .resolved_at("2019-01-15T10:00:00.000Z")
                .build(),
        );

        let metrics = sprint_metrics(&[&issue], &s1_info(), &fields);
        assert_eq!(metrics.points_completed, 2.0);
    }

    #[test]
    fn missing_end_date_never_counts_completion() {
        let fields = CustomFields::from_ids(field_ids());
        let issue = Issue::from(
            IssueFixture::new("A-1")
                .assignee("Ada")
                .points(2.0)
                .sprints(vec![sprint_blob("S1", Some(S1_START), None)])
                .resolved_at("2019-01-10T10:00:00.000Z")
                .build(),
        );

        let metrics = sprint_metrics(&[&issue], &s1_info(), &fields);
        assert_eq!(metrics.points_completed, 0.0);
        assert_eq!(metrics.starting_commitment, 2.0);
    }

    #[test]
    fn universe_orders_by_start_then_name() {
        let fields = CustomFields::from_ids(field_ids());
        let a = Issue::from(
            IssueFixture::new("A-1")
                .assignee("Ada")
                .sprints(vec![
                    sprint_blob("Later", Some("2019-02-01T00:00:00.000Z"), None),
                    sprint_blob("Backlog", None, None),
                ])
                .build(),
        );
        let b = Issue::from(
            IssueFixture::new("A-2")
                .assignee("Bob")
                .sprints(vec![
                    sprint_blob("Earlier", Some("2019-01-01T00:00:00.000Z"), None),
                    sprint_blob("Backlog", Some("2019-03-01T00:00:00.000Z"), None),
                ])
                .build(),
        );
        let unassigned = Issue::from(
            IssueFixture::new("A-3")
                .sprints(vec![sprint_blob("Ghost", None, None)])
                .build(),
        );

        let names: Vec<String> = sprint_universe(&[&a, &b, &unassigned], &fields)
            .into_iter()
            .map(|sprint| sprint.name)
            .collect();

        assert_eq!(names, vec!["Earlier", "Later", "Backlog"]);
    }

    #[test]
    fn report_rolls_up_team_and_filters_labels() {
        let fields = CustomFields::from_ids(field_ids());
        let hierarchy = stories_hierarchy(vec![
            Issue::from(
                IssueFixture::new("A-1")
                    .assignee("Bob")
                    .points(2.0)
                    .labels(&["infra"])
                    .sprints(vec![s1()])
                    .build(),
            ),
            Issue::from(
                IssueFixture::new("A-2")
                    .assignee("Ada")
                    .points(4.0)
                    .labels(&["infra"])
                    .sprints(vec![s1()])
                    .build(),
            ),
            Issue::from(
                IssueFixture::new("A-3")
                    .assignee("Ada")
                    .points(8.0)
                    .labels(&["infra"])
                    .sprints(vec![s1()])
                    .build(),
            ),
            Issue::from(
                IssueFixture::new("A-4")
                    .assignee("Ada")
                    .points(100.0)
                    .labels(&["docs"])
                    .sprints(vec![s1()])
                    .build(),
            ),
        ]);

        let report = velocity_report(&hierarchy, &fields, &HashSet::from(["infra".to_string()]));

        let names: Vec<&str> = report.assignees.iter().map(|a| a.assignee.as_str()).collect();
        assert_eq!(names, vec!["Ada", "Bob"]);
        assert_eq!(report.assignees[0].sprints[0].metrics.starting_commitment, 12.0);
        assert_eq!(report.team.len(), 1);
        let team = report.team[0].metrics;
        assert_eq!(team.starting_commitment, 14.0);
        assert_eq!(team.issue_count, 3);
        assert!((team.average_ticket_size - 14.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn sprint_without_start_is_reported_without_additions() {
        let fields = CustomFields::from_ids(field_ids());
        let hierarchy = stories_hierarchy(vec![Issue::from(
            IssueFixture::new("A-1")
                .assignee("Ada")
                .points(3.0)
                .sprints(vec![sprint_blob("Future", None, None)])
                .moved_to_sprint("2019-01-09T15:00:00.000Z", None, "Future")
                .build(),
        )]);

        let report = velocity_report(&hierarchy, &fields, &HashSet::new());
        let row = &report.assignees[0].sprints[0];
        assert_eq!(row.sprint, "Future");
        assert_eq!(row.start, None);
        assert_eq!(row.metrics.points_added, 0.0);
        assert_eq!(row.metrics.starting_commitment, 3.0);
    }

    proptest! {
        #[test]
        fn commitment_and_added_sum_to_total(cases in prop::collection::vec((0u32..21, any::<bool>()), 0..12)) {
            let fields = CustomFields::from_ids(field_ids());
            let issues: Vec<Issue> = cases
                .iter()
                .enumerate()
                .map(|(index, (points, late))| {
                    let fixture = IssueFixture::new(&format!("A-{}", index))
                        .assignee("Ada")
                        .points(*points as f64)
                        .sprints(vec![s1()]);
                    let fixture = if *late {
                        fixture.moved_to_sprint("2019-01-12T00:00:00.000Z", None, "S1")
                    } else {
                        fixture
                    };
                    Issue::from(fixture.build())
                })
                .collect();
            let refs: Vec<&Issue> = issues.iter().collect();

            let metrics = sprint_metrics(&refs, &s1_info(), &fields);
            let total: u32 = cases.iter().map(|(points, _)| points).sum();
            let late: u32 = cases.iter().filter(|(_, late)| *late).map(|(points, _)| points).sum();

            prop_assert_eq!(metrics.total_points(), total as f64);
            prop_assert_eq!(metrics.points_added, late as f64);
            prop_assert_eq!(metrics.issue_count, cases.len());
        }
    }
}
