use super::AppState;
use crate::velocity_graph::render_velocity_chart;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Chart for one assignee (by position on the velocity page) or for `team`.
pub async fn velocity_chart(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(slot): axum::extract::Path<String>,
) -> axum::response::Response {
    let snapshot = state.snapshot.read().await;
    let Some(snapshot) = snapshot.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let sprints = if slot == "team" {
        Some(&snapshot.velocity.team)
    } else {
        slot.parse::<usize>()
            .ok()
            .and_then(|index| snapshot.velocity.assignees.get(index))
            .map(|assignee| &assignee.sprints)
    };

    match sprints {
        Some(sprints) => (
            [(axum::http::header::CONTENT_TYPE, "image/svg+xml")],
            render_velocity_chart(sprints),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
