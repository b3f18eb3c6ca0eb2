//! SAML service-provider endpoints. The broker does the protocol work; these handlers
//! only move the browser around and bind the resulting principal to a session cookie.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde_json::json;
use tracing::{info, warn};

use super::{clear_session_cookie, set_session_cookie, AppState};
use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;

const RELAY_STATE: &str = "RelayState";

pub async fn metadata(State(state): State<AppState>) -> Response {
    match state.broker.metadata() {
        Ok(xml) => ([(header::CONTENT_TYPE, "text/xml")], xml).into_response(),
        Err(errors) => (StatusCode::INTERNAL_SERVER_ERROR, errors.join(", ")).into_response(),
    }
}

/// Session attributes of the caller, for debugging the IdP release.
pub async fn attributes(ctx: RequestContext) -> Json<serde_json::Value> {
    let attributes = ctx.principal.as_ref().map(|p| p.attributes.clone()).unwrap_or_default();
    Json(json!({"logged_in": ctx.is_authenticated(), "attributes": attributes}))
}

pub async fn single_sign_on(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Redirect> {
    let relay = params.get(RELAY_STATE).map(String::as_str).filter(|r| is_local_target(&state.settings.server_url, r));
    let url = state.broker.login_url(relay)?;
    Ok(Redirect::to(&url))
}

pub async fn single_logout(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Redirect> {
    let principal = ctx.principal.as_ref();
    let url = state.broker.logout_url(
        principal.and_then(|p| p.name_id.as_deref()),
        principal.and_then(|p| p.session_index.as_deref()),
    )?;
    Ok(Redirect::to(&url))
}

/// Relay targets are limited to this service so the ACS cannot be used as an open redirect.
/// Browsers read a backslash as `/` and drop tabs and newlines, so both are refused outright.
fn is_local_target(server_url: &str, target: &str) -> bool {
    if target.chars().any(|c| c == '\\' || c.is_control()) { return false; }
    if let Some(path) = target.strip_prefix('/') {
        return !path.starts_with('/');
    }
    if server_url.is_empty() { return false; }
    match target.strip_prefix(server_url) {
        Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
        None => false,
    }
}

fn after_login_target(server_url: &str, form: &HashMap<String, String>) -> String {
    match form.get(RELAY_STATE) {
        Some(r) if r != server_url && is_local_target(server_url, r) => r.clone(),
        _ => "/".to_string(),
    }
}

pub async fn assertion_consumer(
    State(state): State<AppState>,
    ctx: RequestContext,
    Form(form): Form<HashMap<String, String>>,
) -> AppResult<impl IntoResponse> {
    let principal = state.broker.consume_assertion(&form).await.map_err(|e| {
        warn!(target: "saml", request_id = %ctx.request_id, error = %e, "assertion rejected");
        AppError::auth("saml_assertion_rejected", "Login failed")
    })?;
    if let Some(old) = ctx.session_token.as_deref() {
        state.sessions.logout(old);
    }
    let session = state.sessions.issue(principal)?;
    info!(target: "saml", user = session.principal.user_id().unwrap_or(""), "user logged in");

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, set_session_cookie(&session.token, state.settings.secure_cookies)?);
    let target = after_login_target(&state.settings.server_url, &form);
    Ok((headers, Redirect::to(&target)))
}

pub async fn single_logout_service(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.broker.process_logout(&query).await.map_err(|e| {
        warn!(target: "saml", request_id = %ctx.request_id, error = %e, "logout request rejected");
        AppError::auth("saml_logout_rejected", "Logout failed")
    })?;
    if let Some(token) = ctx.session_token.as_deref() {
        state.sessions.logout(token);
    }
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, clear_session_cookie(state.settings.secure_cookies));
    let target = outcome.redirect.unwrap_or_else(|| "/".to_string());
    Ok((headers, Redirect::to(&target)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_state_stays_on_this_service() {
        let base = "https://etsin.test";
        assert!(is_local_target(base, "/dataset/1"));
        assert!(is_local_target(base, "https://etsin.test/dataset/1"));
        assert!(!is_local_target(base, "https://evil.example/"));
        assert!(!is_local_target(base, "//evil.example/"));
    }

    #[test]
    fn relay_state_lookalikes_are_refused() {
        let base = "https://etsin.test";
        assert!(!is_local_target(base, "https://etsin.test.evil.example/phish"));
        assert!(!is_local_target(base, "https://etsin.test@evil.example/"));
        assert!(!is_local_target(base, "/\\evil.example/"));
        assert!(!is_local_target(base, "/\t/evil.example/"));
        assert!(is_local_target(base, "https://etsin.test?lang=fi"));
        assert!(!is_local_target("", "https://evil.example/"));

        let mut form = HashMap::new();
        for target in ["https://etsin.test.evil.example/phish", "https://etsin.test@evil.example/", "/\\evil.example/"] {
            form.insert(RELAY_STATE.to_string(), target.to_string());
            assert_eq!(after_login_target(base, &form), "/");
        }
    }

    #[test]
    fn login_target_falls_back_to_root() {
        let base = "https://etsin.test";
        let mut form = HashMap::new();
        assert_eq!(after_login_target(base, &form), "/");
        form.insert(RELAY_STATE.to_string(), base.to_string());
        assert_eq!(after_login_target(base, &form), "/");
        form.insert(RELAY_STATE.to_string(), "https://etsin.test/dataset/9".to_string());
        assert_eq!(after_login_target(base, &form), "https://etsin.test/dataset/9");
        form.insert(RELAY_STATE.to_string(), "https://evil.example/".to_string());
        assert_eq!(after_login_target(base, &form), "/");
    }
}
