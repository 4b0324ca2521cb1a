use super::{render_page, AppState};
use crate::sink::TabularSink;

pub async fn root(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::response::Html<String> {
    render_page(&state, |snapshot, report| report.write_hierarchy(&snapshot.projection)).await
}
