use crate::completion::{goal_metrics, GoalMetrics};
use crate::fields::CustomFields;
use crate::hierarchy::{Hierarchy, HierarchyBuilder};
use crate::projection::{project, Projection, Selection};
use crate::velocity::{velocity_report, VelocityReport};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Everything the report pages show, computed in one pass.
#[derive(Debug, Clone)]
pub struct ReportSnapshot {
    pub generated_at: DateTime<Utc>,
    pub hierarchy: Hierarchy,
    pub projection: Projection,
    pub velocity: VelocityReport,
    pub goals: GoalMetrics,
}

pub type SharedSnapshot = Arc<RwLock<Option<ReportSnapshot>>>;

/// Derives every report section from an already built hierarchy.
pub fn analyze(hierarchy: Hierarchy, fields: &CustomFields, selection: &Selection) -> ReportSnapshot {
    let projection = project(&hierarchy, fields, selection);
    let velocity = velocity_report(&hierarchy, fields, &selection.labels);
    let goals = goal_metrics(&hierarchy, &selection.initiatives, &selection.epics);

    ReportSnapshot {
        generated_at: Utc::now(),
        hierarchy,
        projection,
        velocity,
        goals,
    }
}

/// Builds the hierarchy and every derived section. `None` when nothing could be loaded.
pub async fn generate_report(
    builder: &HierarchyBuilder,
    fields: &mut CustomFields,
    selection: &Selection,
) -> Option<ReportSnapshot> {
    log::info!("Generating report...");

    let hierarchy = builder.build(fields).await;
    if hierarchy.is_empty() {
        log::warn!("No issues found, skipping report");
        return None;
    }

    let snapshot = analyze(hierarchy, fields, selection);
    log::info!(
        "Report generated: {} rows, {} assignees",
        snapshot.projection.rows.len(),
        snapshot.velocity.assignees.len()
    );
    Some(snapshot)
}

/// Refreshes `shared` forever. A failed cycle keeps the previous snapshot.
pub async fn run_data_collector(
    builder: HierarchyBuilder,
    selection: Selection,
    interval: Duration,
    shared: SharedSnapshot,
) {
    let mut fields = CustomFields::new();
    loop {
        if let Some(snapshot) = generate_report(&builder, &mut fields, &selection).await {
            *shared.write().await = Some(snapshot);
        }

        log::info!("Sleeping for {} minutes...", interval.as_secs() / 60);
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sprint_blob, FakeTracker, IssueFixture};
    use crate::hierarchy::BuildOptions;

    fn options() -> BuildOptions {
        BuildOptions {
            projects: vec!["Alpha".to_string()],
            load_initiatives: true,
            issues_jql: String::new(),
            include_changelog: true,
            task_timeout: None,
        }
    }

    #[tokio::test]
    async fn generates_every_section() {
        let sprint = sprint_blob("S1", Some("2019-01-07T15:00:00.000Z"), Some("2019-01-21T15:00:00.000Z"));
        let tracker = FakeTracker::new()
            .with_results("issuetype = Initiative", vec![IssueFixture::new("IN-1").initiative().build()])
            .with_results(
                "childIssuesOf(IN-1)",
                vec![
                    IssueFixture::new("EP-1").epic().build(),
                    IssueFixture::new("A-1")
                        .epic_link("EP-1")
                        .assignee("Ada")
                        .points(3.0)
                        .status("Done")
                        .sprints(vec![sprint.clone()])
                        .resolved_at("2019-01-10T10:00:00.000Z")
                        .build(),
                    IssueFixture::new("A-2")
                        .epic_link("EP-1")
                        .assignee("Ada")
                        .points(2.0)
                        .sprints(vec![sprint])
                        .build(),
                ],
            );
        let builder = HierarchyBuilder::new(Arc::new(tracker), options());
        let mut fields = CustomFields::new();

        let snapshot = generate_report(&builder, &mut fields, &Selection::default())
            .await
            .unwrap();

        assert!(fields.is_loaded());
        assert_eq!(snapshot.projection.rows.len(), 4);
        assert_eq!(snapshot.goals.epics[0].ratio, Some(0.5));
        let team = &snapshot.velocity.team[0];
        assert_eq!(team.sprint, "S1");
        assert_eq!(team.metrics.points_completed, 3.0);
        assert_eq!(team.metrics.starting_commitment, 5.0);
    }

    #[tokio::test]
    async fn empty_hierarchy_means_no_report() {
        let tracker = FakeTracker::new().failing_on("issuetype = Initiative");
        let builder = HierarchyBuilder::new(Arc::new(tracker), options());

        let snapshot = generate_report(&builder, &mut CustomFields::new(), &Selection::default()).await;

        assert!(snapshot.is_none());
    }
}
