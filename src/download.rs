//! Fairdata download service proxy. The response body is streamed through untouched.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use futures_util::TryStreamExt;

use crate::client::ClientError;
use crate::config::DownloadConfig;

#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, cr_id: &str, file_ids: &[String], dir_ids: &[String]) -> Result<Response, ClientError>;
}

const SERVICE: &str = "download";

/// Headers copied from the download service to the caller.
const FORWARDED_HEADERS: [header::HeaderName; 3] = [header::CONTENT_TYPE, header::CONTENT_DISPOSITION, header::CONTENT_LENGTH];

pub struct DownloadClient {
    client: reqwest::Client,
    cfg: DownloadConfig,
}

impl DownloadClient {
    pub fn new(client: reqwest::Client, cfg: DownloadConfig) -> Self { Self { client, cfg } }
}

pub fn download_params<'a>(cr_id: &'a str, file_ids: &'a [String], dir_ids: &'a [String]) -> Vec<(&'static str, &'a str)> {
    let mut params = vec![("dataset", cr_id)];
    params.extend(file_ids.iter().map(|f| ("file", f.as_str())));
    params.extend(dir_ids.iter().map(|d| ("dir", d.as_str())));
    params
}

#[async_trait]
impl Downloader for DownloadClient {
    async fn download(&self, cr_id: &str, file_ids: &[String], dir_ids: &[String]) -> Result<Response, ClientError> {
        let url = format!("{}/dl", self.cfg.url);
        let resp = self
            .client
            .get(url)
            .query(&download_params(cr_id, file_ids, dir_ids))
            .basic_auth(&self.cfg.user, Some(&self.cfg.password))
            .send()
            .await
            .map_err(ClientError::transport(SERVICE))?;
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut out = Response::builder().status(status);
        for name in FORWARDED_HEADERS.iter() {
            if let Some(v) = resp.headers().get(name).and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok()) {
                out = out.header(name, v);
            }
        }
        let stream = resp.bytes_stream().map_err(std::io::Error::other);
        out.body(Body::from_stream(stream))
            .map_err(|e| ClientError::Decode { service: SERVICE, message: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_repeat_file_and_dir() {
        let files = vec!["f1".to_string(), "f2".to_string()];
        let dirs = vec!["d1".to_string()];
        assert_eq!(
            download_params("cr-1", &files, &dirs),
            vec![("dataset", "cr-1"), ("file", "f1"), ("file", "f2"), ("dir", "d1")]
        );
    }
}
