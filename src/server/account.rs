use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use super::{clear_session_cookie, AppState};
use crate::identity::RequestContext;

/// `{is_authenticated, user_display_name?}` for the frontend header.
pub async fn get_user(ctx: RequestContext) -> Json<Value> {
    let mut body = json!({"is_authenticated": ctx.auth.is_authenticated});
    if let Some(name) = &ctx.auth.user_display_name {
        body["user_display_name"] = json!(name);
    }
    Json(body)
}

/// Keep-alive probe: refreshes a live session, 401 otherwise.
pub async fn get_session(State(state): State<AppState>, ctx: RequestContext) -> StatusCode {
    match ctx.session_token.as_deref() {
        Some(token) if ctx.is_authenticated() && state.sessions.touch(token) => StatusCode::OK,
        _ => StatusCode::UNAUTHORIZED,
    }
}

/// Drop the session locally. Answers with the negated authentication flag, i.e. `true`.
pub async fn delete_session(State(state): State<AppState>, ctx: RequestContext) -> impl IntoResponse {
    if let Some(token) = ctx.session_token.as_deref() {
        state.sessions.logout(token);
    }
    let still_authenticated = ctx
        .session_token
        .as_deref()
        .and_then(|t| state.sessions.get(t))
        .is_some_and(|p| p.has_attributes());
    let mut headers = HeaderMap::new();
    headers.insert("set-cookie", clear_session_cookie(state.settings.secure_cookies));
    (StatusCode::OK, headers, Json(!still_authenticated))
}
