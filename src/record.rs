//! Catalog record and directory listing wrappers.
//! -------------------------------------------------
//! Metax owns the schema of both documents; we only read a handful of well-known
//! paths and otherwise pass the JSON through untouched.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Agent roles in `research_dataset` that may carry contact details.
pub const AGENT_ROLES: [&str; 5] = ["creator", "contributor", "publisher", "curator", "rights_holder"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessType {
    Open,
    Login,
    Permit,
    Embargo,
    Restricted,
    Unknown(String),
}

const LEGACY_OPEN_VALUES: [&str; 2] = ["access_type_open_access", "open_access"];

impl AccessType {
    /// Parse an access type identifier URI such as
    /// `http://uri.suomi.fi/codelist/fairdata/access_type/code/permit`.
    /// Only the trailing path segment is significant.
    pub fn from_identifier(identifier: &str) -> Self {
        let code = identifier.trim().trim_end_matches('/').rsplit('/').next().unwrap_or("");
        match code {
            "open" => AccessType::Open,
            "login" => AccessType::Login,
            "permit" => AccessType::Permit,
            "embargo" => AccessType::Embargo,
            "restricted" => AccessType::Restricted,
            c if LEGACY_OPEN_VALUES.contains(&c) => AccessType::Open,
            _ => AccessType::Unknown(identifier.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogRecord(pub Value);

impl CatalogRecord {
    pub fn new(value: Value) -> Self { Self(value) }

    pub fn identifier(&self) -> Option<&str> { self.0.get("identifier").and_then(Value::as_str) }

    pub fn research_dataset(&self) -> Option<&Value> { self.0.get("research_dataset") }

    pub fn preferred_identifier(&self) -> Option<&str> {
        self.research_dataset()?.get("preferred_identifier")?.as_str()
    }

    /// `None` when the record carries no access type at all.
    pub fn access_type(&self) -> Option<AccessType> {
        let id = self
            .research_dataset()?
            .get("access_rights")?
            .get("access_type")?
            .get("identifier")?
            .as_str()?;
        Some(AccessType::from_identifier(id))
    }

    pub fn is_permit_gated(&self) -> bool { matches!(self.access_type(), Some(AccessType::Permit)) }

    pub fn is_harvested(&self) -> bool {
        self.0
            .pointer("/data_catalog/catalog_json/harvested")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Embargo end from `access_rights.available`, either a bare date or an RFC 3339 timestamp.
    pub fn embargo_available(&self) -> Option<NaiveDate> {
        let raw = self.research_dataset()?.get("access_rights")?.get("available")?.as_str()?;
        parse_date(raw)
    }

    /// True when the record references files or directories hosted in IDA.
    pub fn has_gated_data(&self) -> bool {
        let Some(rd) = self.research_dataset() else { return false; };
        ["files", "directories"]
            .iter()
            .any(|k| rd.get(*k).and_then(Value::as_array).map(|a| !a.is_empty()).unwrap_or(false))
    }

    /// Agents under a role, normalized to a list (Metax uses both single objects and arrays).
    pub fn agents(&self, role: &str) -> Vec<&Value> {
        match self.research_dataset().and_then(|rd| rd.get(role)) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(obj @ Value::Object(_)) => vec![obj],
            _ => Vec::new(),
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") { return Some(d); }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc).date_naive())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryListing(pub Value);

impl DirectoryListing {
    pub fn new(value: Value) -> Self { Self(value) }

    pub fn files(&self) -> Option<&Vec<Value>> { self.0.get("files").and_then(Value::as_array) }

    pub fn directories(&self) -> Option<&Vec<Value>> { self.0.get("directories").and_then(Value::as_array) }
}
