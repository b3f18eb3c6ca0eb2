use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::warn;

use super::AppState;

/// Any path the API does not claim belongs to the single-page app.
pub async fn index(State(state): State<AppState>) -> Response {
    let Some(path) = state.settings.index_html.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match tokio::fs::read_to_string(path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            warn!(target: "frontend", "cannot read {}: {}", path.display(), e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
