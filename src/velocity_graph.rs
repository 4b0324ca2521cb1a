use crate::renderer::{Point, Renderer, Series, SeriesStyle};
use crate::velocity::{SprintVelocity, VelocityMetrics};

static SERIES: [(&str, &str, fn(&VelocityMetrics) -> f64); 4] = [
    ("Completed", "#27AE60", |metrics| metrics.points_completed),
    ("Commitment", "#4A90E2", |metrics| metrics.starting_commitment),
    ("Added", "#E74C3C", |metrics| metrics.points_added),
    ("Average Size", "#8E44AD", |metrics| metrics.average_ticket_size),
];

pub struct VelocityGraph {
    renderer: Renderer,
}

impl VelocityGraph {
    pub fn new(width: i32, height: i32, margin: i32) -> Self {
        Self {
            renderer: Renderer::new(width, height, margin),
        }
    }

    fn x(&self, index: usize, count: usize) -> f64 {
        if count <= 1 {
            self.renderer.width as f64 / 2.0
        } else {
            index as f64 / (count - 1) as f64 * self.renderer.width as f64
        }
    }

    /// Maps every series onto the plot area, sharing one vertical scale.
    fn normalize(&self, sprints: &[SprintVelocity]) -> Vec<Series> {
        let max_value = sprints
            .iter()
            .flat_map(|row| SERIES.iter().map(move |(_, _, value)| value(&row.metrics)))
            .fold(0.0_f64, f64::max);
        let height = self.renderer.height as f64;
        let y = |value: f64| {
            if max_value <= 0.0 {
                height
            } else {
                height - (value.max(0.0) / max_value) * height
            }
        };

        SERIES
            .iter()
            .map(|&(name, color, value)| Series {
                points: sprints
                    .iter()
                    .enumerate()
                    .map(|(index, row)| Point {
                        x: self.x(index, sprints.len()),
                        y: y(value(&row.metrics)),
                    })
                    .collect(),
                style: SeriesStyle { name, color },
            })
            .collect()
    }

    pub fn render(&self, sprints: &[SprintVelocity]) -> String {
        let labels: Vec<(f64, String)> = sprints
            .iter()
            .enumerate()
            .map(|(index, row)| (self.x(index, sprints.len()), row.sprint.clone()))
            .collect();
        self.renderer
            .render_line_chart(&self.normalize(sprints), &labels)
    }
}

pub fn render_velocity_chart(sprints: &[SprintVelocity]) -> String {
    VelocityGraph::new(300, 120, 20).render(sprints)
}
