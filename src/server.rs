//!
//! Etsin finder HTTP server
//! ------------------------
//! Axum router for the single-page frontend.
//!
//! Responsibilities:
//! - Session management with an opaque cookie token backed by `identity::SessionManager`.
//! - Per-request `RequestContext` extraction (auth state, request id); nothing reads the
//!   session behind the handler's back.
//! - Dataset, file listing, download and contact endpoints that fetch from Metax, decide
//!   access and shape the response.
//! - SAML service-provider routes delegating to the identity broker.
//! - One request-logging middleware over the JSON API.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tracing::info;
use uuid::Uuid;

use crate::client::build_http_client;
use crate::config::AppConfig;
use crate::download::{DownloadClient, Downloader};
use crate::error::{AppError, AppResult};
use crate::identity::{HttpIdentityBroker, IdentityBroker, RequestContext, SamlSettings, SessionManager};
use crate::mail::{Mailer, SmtpMailer};
use crate::metax::{MetadataClient, MetaxClient};
use crate::rems::{NoPermits, PermitRegistry, RemsClient};
use crate::shaping::RestrictedFields;

pub mod account;
pub mod contact;
pub mod dataset;
pub mod download;
pub mod files;
pub mod frontend;
pub mod saml;

pub const SESSION_COOKIE: &str = "etsin_session";

/// Static settings the handlers need besides the collaborators.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub restricted_fields: RestrictedFields,
    pub mail_sender: String,
    pub server_url: String,
    pub secure_cookies: bool,
    pub index_html: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            restricted_fields: RestrictedFields::default(),
            mail_sender: crate::config::DEFAULT_SENDER.to_string(),
            server_url: "http://localhost:7878".to_string(),
            secure_cookies: true,
            index_html: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub metax: Arc<dyn MetadataClient>,
    pub permits: Arc<dyn PermitRegistry>,
    pub downloader: Arc<dyn Downloader>,
    pub mailer: Arc<dyn Mailer>,
    pub broker: Arc<dyn IdentityBroker>,
    pub sessions: SessionManager,
    pub settings: Arc<ServerSettings>,
}

impl AppState {
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let metax_http = build_http_client(cfg.http_timeout, cfg.metax.verify_ssl).context("While building Metax HTTP client")?;
        let http = build_http_client(cfg.http_timeout, true).context("While building HTTP client")?;

        let permits: Arc<dyn PermitRegistry> = if cfg.rems.enabled {
            Arc::new(RemsClient::new(http.clone(), &cfg.rems)?)
        } else {
            info!(target: "startup", "REMS disabled; permit-gated datasets are not downloadable");
            Arc::new(NoPermits)
        };
        let broker = HttpIdentityBroker::new(
            http.clone(),
            SamlSettings {
                broker_url: cfg.saml.broker_url.clone(),
                sp_entity_id: cfg.saml.sp_entity_id.clone(),
                server_url: cfg.server_url.clone(),
            },
        );

        Ok(Self {
            metax: Arc::new(MetaxClient::new(metax_http, cfg.metax.clone())),
            permits,
            downloader: Arc::new(DownloadClient::new(http, cfg.download.clone())),
            mailer: Arc::new(SmtpMailer::new(&cfg.mail)?),
            broker: Arc::new(broker),
            sessions: SessionManager::new(cfg.session_ttl),
            settings: Arc::new(ServerSettings {
                restricted_fields: cfg.restricted_fields.clone(),
                mail_sender: cfg.mail.default_sender.clone(),
                server_url: cfg.server_url.clone(),
                secure_cookies: cfg.secure_cookies,
                index_html: cfg.index_html.clone(),
            }),
        })
    }
}

#[derive(Debug, Clone)]
struct RequestId(String);

pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie")?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some((k, v)) = p.split_once('=') {
            if k == name { return Some(v.to_string()); }
        }
    }
    None
}

pub fn set_session_cookie(token: &str, secure: bool) -> AppResult<HeaderValue> {
    let secure = if secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!("{}={}; HttpOnly{}; SameSite=Lax; Path=/", SESSION_COOKIE, token, secure))
        .map_err(|e| AppError::internal("cookie".to_string(), e.to_string()))
}

pub fn clear_session_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("etsin_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Lax; Path=/")
    } else {
        HeaderValue::from_static("etsin_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax; Path=/")
    }
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parse_cookie(&parts.headers, SESSION_COOKIE);
        let principal = token.as_deref().and_then(|t| state.sessions.get(t));
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Ok(RequestContext::new(principal, token, request_id))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `{real ip} - {user id} - {method} - {path} - {user agent}` for every API call.
async fn log_request(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let headers = req.headers();
    let user_id = parse_cookie(headers, SESSION_COOKIE)
        .and_then(|t| state.sessions.get(&t))
        .and_then(|p| p.user_id().map(str::to_string))
        .unwrap_or_default();
    info!(
        target: "request",
        request_id = %request_id,
        "{} - {} - {} - {} - {}",
        header_str(headers, "x-real-ip").unwrap_or("N/A"),
        user_id,
        req.method(),
        req.uri().path(),
        header_str(headers, "user-agent").unwrap_or("")
    );
    req.extensions_mut().insert(RequestId(request_id));
    next.run(req).await
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/dataset/{id}", get(dataset::get_dataset))
        .route("/files/{id}", get(files::get_files))
        .route("/download", get(download::get_download))
        .route("/contact/{id}", axum::routing::post(contact::post_contact))
        .route("/user", get(account::get_user))
        .route("/session", get(account::get_session).delete(account::delete_session))
        .layer(middleware::from_fn_with_state(state.clone(), log_request));

    let sso = Router::new()
        .route("/saml_metadata/", get(saml::metadata))
        .route("/saml_attributes/", get(saml::attributes))
        .route("/sso/", get(saml::single_sign_on))
        .route("/slo/", get(saml::single_logout))
        .route("/acs/", get(saml::assertion_consumer).post(saml::assertion_consumer))
        .route("/sls/", get(saml::single_logout_service).post(saml::single_logout_service));

    api.merge(sso).fallback(frontend::index).with_state(state)
}

pub async fn run_with_config(cfg: AppConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&cfg)?;
    info!(
        target: "startup",
        "Metax at {}, download service at {}, REMS enabled={}, server url {}",
        cfg.metax.url, cfg.download.url, cfg.rems.enabled, cfg.server_url
    );
    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convenience entry point reading configuration from the environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(AppConfig::from_env()?).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cookie_finds_named_value() {
        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_static("a=1; etsin_session=tok=en; b=2"));
        assert_eq!(parse_cookie(&h, SESSION_COOKIE).as_deref(), Some("tok=en"));
        assert_eq!(parse_cookie(&h, "missing"), None);
    }

    #[test]
    fn session_cookie_respects_secure_flag() {
        let v = set_session_cookie("abc", false).unwrap();
        assert_eq!(v.to_str().unwrap(), "etsin_session=abc; HttpOnly; SameSite=Lax; Path=/");
        assert!(set_session_cookie("abc", true).unwrap().to_str().unwrap().contains("Secure"));
        assert!(!clear_session_cookie(false).to_str().unwrap().contains("Secure"));
    }
}
