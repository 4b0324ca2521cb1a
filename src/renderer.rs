use svg::node::element::{path::Data, Circle, Line, Path, Text};
use svg::Document;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

pub struct SeriesStyle {
    pub name: &'static str,
    pub color: &'static str,
}

pub struct Series {
    pub points: Vec<Point>,
    pub style: SeriesStyle,
}

/// Line charts over a `width` x `height` plot area, padded by `margin` on every side.
pub struct Renderer {
    pub width: i32,
    pub height: i32,
    margin: i32,
}

impl Renderer {
    pub fn new(width: i32, height: i32, margin: i32) -> Self {
        Self { width, height, margin }
    }

    /// Renders each series as a polyline with a marker per point. `labels`
    /// are written under the x axis at the matching point positions.
    pub fn render_line_chart(&self, series: &[Series], labels: &[(f64, String)]) -> String {
        let mut document = Document::new()
            .set(
                "viewBox",
                (-self.margin, -self.margin, self.width + 2 * self.margin, self.height + 2 * self.margin),
            )
            .set("width", self.width + 2 * self.margin)
            .set("height", self.height + 2 * self.margin)
            .add(self.axis());

        for line in series.iter().filter(|line| !line.points.is_empty()) {
            document = document.add(self.path(&line.points, line.style.color));
            for point in &line.points {
                document = document.add(
                    Circle::new()
                        .set("cx", point.x)
                        .set("cy", point.y)
                        .set("r", 2)
                        .set("fill", line.style.color),
                );
            }
        }

        for (index, line) in series.iter().enumerate() {
            document = document.add(
                Text::new(line.style.name)
                    .set("x", self.width)
                    .set("y", 10 * index as i32)
                    .set("text-anchor", "end")
                    .set("font-size", 8)
                    .set("fill", line.style.color),
            );
        }

        for (x, label) in labels {
            document = document.add(
                Text::new(label.as_str())
                    .set("x", *x)
                    .set("y", self.height + self.margin / 2)
                    .set("text-anchor", "middle")
                    .set("font-size", 6),
            );
        }

        document.to_string()
    }

    fn axis(&self) -> Line {
        Line::new()
            .set("x1", 0)
            .set("y1", self.height)
            .set("x2", self.width)
            .set("y2", self.height)
            .set("stroke", "#999999")
            .set("stroke-width", 1)
    }

    fn path(&self, points: &[Point], color: &str) -> Path {
        let mut data = Data::new();
        if let Some(first) = points.first() {
            data = data.move_to((first.x, first.y));
            for point in &points[1..] {
                data = data.line_to((point.x, point.y));
            }
        }
        Path::new()
            .set("d", data)
            .set("stroke", color)
            .set("stroke-width", "2")
            .set("fill", "none")
    }
}
