mod goals;
mod root;
mod velocity;
mod velocity_chart;

use crate::collector::{ReportSnapshot, SharedSnapshot};
use crate::sink::{HtmlReport, TabularSink};

#[derive(Clone)]
pub struct AppState {
    pub snapshot: SharedSnapshot,
}

pub fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/", axum::routing::get(root::root))
        .route("/velocity", axum::routing::get(velocity::velocity))
        .route("/goals", axum::routing::get(goals::goals))
        .route("/velocity/{slot}/chart.svg", axum::routing::get(velocity_chart::velocity_chart))
        .with_state(state)
}

/// Renders one page from the current snapshot, or a placeholder before the first report.
async fn render_page<F>(state: &AppState, write: F) -> axum::response::Html<String>
where
    F: FnOnce(&ReportSnapshot, &mut HtmlReport),
{
    let snapshot = state.snapshot.read().await;
    let Some(snapshot) = snapshot.as_ref() else {
        return axum::response::Html(
            "<!DOCTYPE html><html><body><p>No report available yet</p></body></html>".to_string(),
        );
    };

    let mut report = HtmlReport::with_charts("/velocity");
    write(snapshot, &mut report);
    axum::response::Html(format!(
        "{}<p>Generated at {}</p>",
        report.finish(),
        snapshot.generated_at.format("%Y-%m-%d %H:%M UTC")
    ))
}
