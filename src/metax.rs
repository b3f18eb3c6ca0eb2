//! Metax REST client. Only read endpoints are used; a 404 is reported as an absent
//! document, everything else that is not a success is an upstream error.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::ClientError;
use crate::config::MetaxConfig;
use crate::record::{CatalogRecord, DirectoryListing};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// Fall back to the removed-records view when the live lookup misses.
    pub include_removed: bool,
    /// Ask Metax to expand file and directory details into the record.
    pub file_details: bool,
}

#[async_trait]
pub trait MetadataClient: Send + Sync {
    async fn get_catalog_record(&self, cr_id: &str, query: RecordQuery) -> Result<Option<CatalogRecord>, ClientError>;

    async fn get_directory_listing(
        &self,
        cr_id: &str,
        dir_id: &str,
        file_fields: Option<&str>,
        directory_fields: Option<&str>,
    ) -> Result<Option<DirectoryListing>, ClientError>;
}

const SERVICE: &str = "metax";

pub struct MetaxClient {
    client: reqwest::Client,
    cfg: MetaxConfig,
}

impl MetaxClient {
    pub fn new(client: reqwest::Client, cfg: MetaxConfig) -> Self { Self { client, cfg } }

    async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Option<Value>, ClientError> {
        let resp = self
            .client
            .get(url)
            .query(params)
            .basic_auth(&self.cfg.user, Some(&self.cfg.password))
            .header("accept", "application/json")
            .send()
            .await
            .map_err(ClientError::transport(SERVICE))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(target: "metax", url, "not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ClientError::Status { service: SERVICE, status: status.as_u16() });
        }
        let body = resp
            .json::<Value>()
            .await
            .map_err(|e| ClientError::Decode { service: SERVICE, message: e.to_string() })?;
        Ok(Some(body))
    }
}

fn record_params(query: RecordQuery, removed: bool) -> Vec<(&'static str, &'static str)> {
    let mut params = Vec::new();
    if query.file_details { params.push(("file_details", "true")); }
    if removed { params.push(("removed", "true")); }
    params
}

fn listing_params<'a>(cr_id: &'a str, file_fields: Option<&'a str>, directory_fields: Option<&'a str>) -> Vec<(&'static str, &'a str)> {
    let mut params = vec![("cr_identifier", cr_id)];
    if let Some(f) = file_fields.filter(|s| !s.is_empty()) { params.push(("file_fields", f)); }
    if let Some(d) = directory_fields.filter(|s| !s.is_empty()) { params.push(("directory_fields", d)); }
    params
}

#[async_trait]
impl MetadataClient for MetaxClient {
    async fn get_catalog_record(&self, cr_id: &str, query: RecordQuery) -> Result<Option<CatalogRecord>, ClientError> {
        let url = format!("{}/rest/datasets/{}", self.cfg.url, urlencoding::encode(cr_id));
        if let Some(v) = self.get_json(&url, &record_params(query, false)).await? {
            return Ok(Some(CatalogRecord::new(v)));
        }
        if !query.include_removed { return Ok(None); }
        info!(target: "metax", cr_id, "record not found, checking removed records");
        Ok(self.get_json(&url, &record_params(query, true)).await?.map(CatalogRecord::new))
    }

    async fn get_directory_listing(
        &self,
        cr_id: &str,
        dir_id: &str,
        file_fields: Option<&str>,
        directory_fields: Option<&str>,
    ) -> Result<Option<DirectoryListing>, ClientError> {
        let url = format!("{}/rest/directories/{}/files", self.cfg.url, urlencoding::encode(dir_id));
        let params = listing_params(cr_id, file_fields, directory_fields);
        Ok(self.get_json(&url, &params).await?.map(DirectoryListing::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_params_follow_query() {
        assert!(record_params(RecordQuery::default(), false).is_empty());
        let q = RecordQuery { include_removed: true, file_details: true };
        assert_eq!(record_params(q, true), vec![("file_details", "true"), ("removed", "true")]);
    }

    #[test]
    fn listing_params_skip_empty_field_lists() {
        assert_eq!(listing_params("cr", None, Some("")), vec![("cr_identifier", "cr")]);
        assert_eq!(
            listing_params("cr", Some("file_name,byte_size"), Some("directory_name")),
            vec![("cr_identifier", "cr"), ("file_fields", "file_name,byte_size"), ("directory_fields", "directory_name")]
        );
    }
}
