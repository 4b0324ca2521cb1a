use crate::completion::{GoalMetrics, NodeCompletion, StatusDisplay};
use crate::projection::{Projection, Row, RowRole};
use crate::velocity::{SprintVelocity, VelocityReport};
use itertools::Itertools;

/// Consumer of the computed report.
pub trait TabularSink {
    type Output;

    fn write_hierarchy(&mut self, projection: &Projection);
    fn write_velocity(&mut self, velocity: &VelocityReport);
    fn write_goals(&mut self, goals: &GoalMetrics);
    fn finish(self) -> Self::Output;
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn format_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{:.0}", points)
    } else {
        format!("{:.2}", points)
    }
}

fn format_status(status: &StatusDisplay) -> String {
    match status {
        StatusDisplay::Percent(ratio) => format!("{:.0}%", ratio * 100.0),
        StatusDisplay::Status(name) => escape_html(name),
    }
}

fn optional(value: &Option<String>) -> String {
    value.as_deref().map(escape_html).unwrap_or_default()
}

fn list(values: &[String]) -> String {
    escape_html(&values.join(", "))
}

/// Plain HTML tables. Outline nesting is carried in `data-depth` attributes.
#[derive(Default)]
pub struct HtmlReport {
    sections: Vec<String>,
    /// Prefix of the per-assignee chart links; no charts when unset.
    chart_base: Option<String>,
}

impl HtmlReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_charts(chart_base: &str) -> Self {
        Self {
            chart_base: Some(chart_base.trim_end_matches('/').to_string()),
            ..Self::default()
        }
    }

    fn hierarchy_row(row: &Row, depth: u8, presence_labels: usize) -> String {
        let columns = &row.columns;
        let presence = row
            .presence
            .iter()
            .take(presence_labels)
            .map(|present| format!("<td>{}</td>", if *present { "yes" } else { "no" }))
            .join("");
        format!(
            "<tr data-role=\"{}\" data-depth=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>{}</tr>",
            match row.role {
                RowRole::Initiative => "initiative",
                RowRole::Epic => "epic",
                RowRole::Story => "story",
            },
            depth,
            escape_html(&columns.key),
            escape_html(&columns.summary),
            optional(&columns.program),
            escape_html(&columns.project),
            optional(&columns.sprint),
            columns.story_points.map(format_points).unwrap_or_default(),
            escape_html(&columns.issue_type),
            optional(&columns.assignee),
            optional(&columns.reporter),
            optional(&columns.priority),
            list(&columns.labels),
            list(&columns.components),
            list(&columns.fix_versions),
            optional(&columns.due_date),
            optional(&columns.description),
            format_status(&row.status),
            presence
        )
    }

    fn velocity_table(title: &str, rows: &[SprintVelocity], chart: Option<String>) -> String {
        let body = rows
            .iter()
            .map(|row| {
                let metrics = &row.metrics;
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape_html(&row.sprint),
                    row.start.map(|start| start.format("%Y-%m-%d").to_string()).unwrap_or_default(),
                    format_points(metrics.starting_commitment),
                    format_points(metrics.points_added),
                    format_points(metrics.points_completed),
                    format_points(metrics.delta()),
                    format_points(metrics.average_ticket_size)
                )
            })
            .join("");
        let chart = chart
            .map(|src| format!("<img src=\"{}\" alt=\"velocity chart\">", escape_html(&src)))
            .unwrap_or_default();
        format!(
            "<h3>{}</h3>{}<table><tr><th>Sprint</th><th>Start</th><th>Starting Commitment</th><th>Points Added</th><th>Points Completed</th><th>Delta</th><th>Average Ticket Size</th></tr>{}</table>",
            escape_html(title),
            chart,
            body
        )
    }

    fn goal_rows(nodes: &[NodeCompletion]) -> String {
        nodes
            .iter()
            .map(|node| {
                let completion = node
                    .ratio
                    .map(|ratio| format!("{:.0}%", ratio * 100.0))
                    .unwrap_or_else(|| escape_html(node.issue.status_name()));
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape_html(node.issue.key()),
                    escape_html(node.issue.summary()),
                    completion
                )
            })
            .join("")
    }
}

impl TabularSink for HtmlReport {
    type Output = String;

    fn write_hierarchy(&mut self, projection: &Projection) {
        // Rows inside a group take the group's depth; headers stay one level up.
        let depths: Vec<u8> = (0..projection.rows.len())
            .map(|index| {
                projection
                    .groups
                    .iter()
                    .filter(|group| group.first <= index && index <= group.last)
                    .map(|group| group.depth)
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header = ["Key", "Summary", "Program", "Project", "Sprint", "Story Points", "Type", "Assignee",
            "Reporter", "Priority", "Labels", "Components", "Fix Versions", "Due Date", "Description", "Status"]
            .iter()
            .map(|title| title.to_string())
            .chain(projection.presence_labels.iter().map(|label| escape_html(label)))
            .map(|title| format!("<th>{}</th>", title))
            .join("");

        let body = projection
            .rows
            .iter()
            .zip(depths)
            .map(|(row, depth)| Self::hierarchy_row(row, depth, projection.presence_labels.len()))
            .join("");

        self.sections
            .push(format!("<h2>Hierarchy</h2><table><tr>{}</tr>{}</table>", header, body));
    }

    fn write_velocity(&mut self, velocity: &VelocityReport) {
        let chart = |slot: String| self.chart_base.as_ref().map(|base| format!("{}/{}/chart.svg", base, slot));

        let mut section = String::from("<h2>Velocity</h2>");
        for (index, assignee) in velocity.assignees.iter().enumerate() {
            section.push_str(&Self::velocity_table(
                &assignee.assignee,
                &assignee.sprints,
                chart(index.to_string()),
            ));
        }
        section.push_str(&Self::velocity_table("Team", &velocity.team, chart("team".to_string())));
        self.sections.push(section);
    }

    fn write_goals(&mut self, goals: &GoalMetrics) {
        let header = "<tr><th>Key</th><th>Summary</th><th>Complete</th></tr>";
        self.sections.push(format!(
            "<h2>Goals</h2><h3>Initiatives</h3><table>{}{}</table><h3>Epics</h3><table>{}{}</table>",
            header,
            Self::goal_rows(&goals.initiatives),
            header,
            Self::goal_rows(&goals.epics)
        ));
    }

    fn finish(self) -> String {
        format!(
            r#"
        <!DOCTYPE html>
        <html>
            <body>
                <h1>Sprint Health</h1>
                <p><a href="/">Hierarchy</a> | <a href="/velocity">Velocity</a> | <a href="/goals">Goals</a></p>
                {}
            </body>
        </html>
        "#,
            self.sections.join("\n")
        )
    }
}
