//! Shared plumbing for the upstream HTTP collaborators (Metax, REMS, download
//! service, identity broker) and their error type.

use std::time::Duration;

use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} responded with HTTP {status}")]
    Status { service: &'static str, status: u16 },
    #[error("invalid response from {service}: {message}")]
    Decode { service: &'static str, message: String },
    #[error("{service} is not configured: {message}")]
    Config { service: &'static str, message: String },
    #[error("mail delivery failed: {0}")]
    Mail(String),
}

impl ClientError {
    pub fn transport(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| ClientError::Transport { service, source }
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Mail(m) => AppError::delivery("mail_delivery_failed".to_string(), m),
            other => AppError::upstream("upstream_unavailable".to_string(), other.to_string()),
        }
    }
}

/// reqwest client with the shared timeout; `verify_ssl = false` is only meant for test Metax instances.
pub fn build_http_client(timeout: Duration, verify_ssl: bool) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(!verify_ssl)
        .build()
}
