use super::{render_page, AppState};
use crate::sink::TabularSink;

pub async fn velocity(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::response::Html<String> {
    render_page(&state, |snapshot, report| report.write_velocity(&snapshot.velocity)).await
}
