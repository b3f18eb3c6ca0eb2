//! Runtime configuration read from `FINDER_*` environment variables.
//! Parsing goes through a lookup closure so tests never touch the process environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::shaping::RestrictedFields;

#[derive(Debug, Clone)]
pub struct MetaxConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub verify_ssl: bool,
}

#[derive(Debug, Clone)]
pub struct RemsConfig {
    pub enabled: bool,
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub url: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    pub default_sender: String,
}

#[derive(Debug, Clone)]
pub struct SamlConfig {
    pub broker_url: String,
    pub sp_entity_id: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_port: u16,
    /// Public base URL of this service, e.g. `https://etsin.fairdata.fi`.
    pub server_url: String,
    pub http_timeout: Duration,
    pub session_ttl: Duration,
    pub secure_cookies: bool,
    pub index_html: Option<PathBuf>,
    pub metax: MetaxConfig,
    pub rems: RemsConfig,
    pub download: DownloadConfig,
    pub mail: MailConfig,
    pub saml: SamlConfig,
    pub restricted_fields: RestrictedFields,
}

pub const DEFAULT_SENDER: &str = "etsin-no-reply@fairdata.fi";

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("{} must be a boolean, got '{}'", key, other)),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> { Self::from_lookup(|k| std::env::var(k).ok()) }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str, default: &str| lookup(k).unwrap_or_else(|| default.to_string());
        let get_bool = |k: &str, default: bool| -> Result<bool> {
            match lookup(k) { Some(v) => parse_bool(k, &v), None => Ok(default) }
        };
        let get_u64 = |k: &str, default: u64| -> Result<u64> {
            match lookup(k) {
                Some(v) => v.trim().parse::<u64>().with_context(|| format!("{} must be an integer", k)),
                None => Ok(default),
            }
        };

        let http_port = u16::try_from(get_u64("FINDER_HTTP_PORT", 7878)?).context("FINDER_HTTP_PORT out of range")?;
        let mail_port = u16::try_from(get_u64("FINDER_MAIL_PORT", 25)?).context("FINDER_MAIL_PORT out of range")?;
        let server_url = get("FINDER_SERVER_URL", "http://localhost:7878").trim_end_matches('/').to_string();

        let restricted_fields = match lookup("FINDER_RESTRICTED_FIELDS") {
            Some(path) => RestrictedFields::from_file(&path)
                .with_context(|| format!("While loading restricted fields from {}", path))?,
            None => RestrictedFields::default(),
        };

        Ok(Self {
            http_port,
            http_timeout: Duration::from_secs(get_u64("FINDER_HTTP_TIMEOUT_SECS", 30)?),
            session_ttl: Duration::from_secs(get_u64("FINDER_SESSION_TTL_SECS", 60 * 60)?),
            secure_cookies: get_bool("FINDER_SECURE_COOKIES", true)?,
            index_html: lookup("FINDER_INDEX_HTML").map(PathBuf::from),
            metax: MetaxConfig {
                url: get("FINDER_METAX_URL", "https://metax.fairdata.fi").trim_end_matches('/').to_string(),
                user: get("FINDER_METAX_USER", "etsin"),
                password: get("FINDER_METAX_PASSWORD", ""),
                verify_ssl: get_bool("FINDER_METAX_VERIFY_SSL", true)?,
            },
            rems: RemsConfig {
                enabled: get_bool("FINDER_REMS_ENABLED", false)?,
                url: get("FINDER_REMS_URL", "").trim_end_matches('/').to_string(),
                api_key: get("FINDER_REMS_API_KEY", ""),
            },
            download: DownloadConfig {
                url: get("FINDER_DOWNLOAD_URL", "https://download.fairdata.fi").trim_end_matches('/').to_string(),
                user: get("FINDER_DOWNLOAD_USER", "etsin"),
                password: get("FINDER_DOWNLOAD_PASSWORD", ""),
            },
            mail: MailConfig {
                server: get("FINDER_MAIL_SERVER", "localhost"),
                port: mail_port,
                username: lookup("FINDER_MAIL_USERNAME").filter(|s| !s.is_empty()),
                password: lookup("FINDER_MAIL_PASSWORD").filter(|s| !s.is_empty()),
                use_tls: get_bool("FINDER_MAIL_USE_TLS", false)?,
                default_sender: get("FINDER_MAIL_DEFAULT_SENDER", DEFAULT_SENDER),
            },
            saml: SamlConfig {
                broker_url: get("FINDER_SAML_BROKER_URL", "").trim_end_matches('/').to_string(),
                sp_entity_id: get("FINDER_SAML_SP_ENTITY_ID", &format!("{}/saml_metadata/", server_url)),
            },
            server_url,
            restricted_fields,
        })
    }
}
